use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use tokio_postgres::{Client, NoTls};
use tracing::{debug, error, info, warn};

use crate::models::audit::CreateAuditRecord;

const CREATE_AUDIT_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS notification_audit (
        id BIGSERIAL PRIMARY KEY,
        job_id TEXT NOT NULL,
        kind TEXT NOT NULL,
        status TEXT NOT NULL,
        recipients TEXT[] NOT NULL DEFAULT '{}',
        message_id TEXT,
        resolved_id TEXT,
        error_detail TEXT,
        payload JSONB NOT NULL DEFAULT '{}'::jsonb,
        received_at TIMESTAMPTZ NOT NULL,
        recorded_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
"#;

#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn insert(&self, record: &CreateAuditRecord) -> Result<(), Error>;
}

pub struct DatabaseClient {
    client: Client,
}

impl DatabaseClient {
    pub async fn connect(database_url: &str) -> Result<Self, Error> {
        info!("Connecting to PostgreSQL database");

        let (client, connection) = tokio_postgres::connect(database_url, NoTls)
            .await
            .map_err(|e| anyhow!("Failed to connect to database: {}", e))?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!(error = %e, "PostgreSQL connection terminated");
            }
        });

        client
            .batch_execute(CREATE_AUDIT_TABLE)
            .await
            .map_err(|e| anyhow!("Failed to prepare audit table: {}", e))?;

        info!("PostgreSQL connection established");

        Ok(Self { client })
    }
}

#[async_trait]
impl AuditStore for DatabaseClient {
    async fn insert(&self, record: &CreateAuditRecord) -> Result<(), Error> {
        let status = record.status.to_string();

        self.client
            .execute(
                r#"
                INSERT INTO notification_audit (
                    job_id,
                    kind,
                    status,
                    recipients,
                    message_id,
                    resolved_id,
                    error_detail,
                    payload,
                    received_at,
                    recorded_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                "#,
                &[
                    &record.job_id,
                    &record.kind.as_str(),
                    &status,
                    &record.recipients,
                    &record.message_id,
                    &record.resolved_id,
                    &record.error_detail,
                    &record.payload,
                    &record.received_at,
                    &record.recorded_at,
                ],
            )
            .await
            .map_err(|e| {
                error!(
                    error = %e,
                    job_id = %record.job_id,
                    "Failed to write audit record to database"
                );
                anyhow!("Database write failed: {}", e)
            })?;

        debug!(
            job_id = %record.job_id,
            status = %status,
            "Audit record written to database"
        );

        Ok(())
    }
}

/// Stand-in used when the database is unreachable at startup.
pub struct LogOnlyAuditStore;

#[async_trait]
impl AuditStore for LogOnlyAuditStore {
    async fn insert(&self, record: &CreateAuditRecord) -> Result<(), Error> {
        warn!(
            job_id = %record.job_id,
            status = %record.status,
            recipients = ?record.recipients,
            "Audit store unavailable, record not persisted"
        );
        Ok(())
    }
}
