use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::models::{
    job::{JobKind, NotificationJob},
    status::{JobOutcome, JobStatus},
};

#[derive(Debug, Clone, Serialize)]
pub struct CreateAuditRecord {
    pub job_id: String,
    pub kind: JobKind,
    pub status: JobStatus,
    pub recipients: Vec<String>,
    pub message_id: Option<String>,
    pub resolved_id: Option<String>,
    pub error_detail: Option<String>,
    pub payload: JsonValue,
    pub received_at: DateTime<Utc>,
    pub recorded_at: DateTime<Utc>,
}

impl CreateAuditRecord {
    pub fn new(job_id: String, kind: JobKind, status: JobStatus) -> Self {
        let now = Utc::now();

        Self {
            job_id,
            kind,
            status,
            recipients: Vec::new(),
            message_id: None,
            resolved_id: None,
            error_detail: None,
            payload: serde_json::json!({}),
            received_at: now,
            recorded_at: now,
        }
    }

    pub fn from_outcome(job: &NotificationJob, outcome: &JobOutcome) -> Self {
        let mut record = Self::new(job.id.clone(), job.kind, outcome.status)
            .with_recipients(outcome.delivered_recipients.clone())
            .with_payload(job.raw().clone());

        record.received_at = job.received_at;
        record.message_id = outcome.message_id.clone();
        record.resolved_id = outcome.resolved_id.clone();

        match &outcome.error_detail {
            Some(detail) => record.with_error(detail.clone()),
            None => record,
        }
    }

    pub fn with_error(mut self, error: String) -> Self {
        self.error_detail = Some(error);
        self
    }

    pub fn with_recipients(mut self, recipients: Vec<String>) -> Self {
        self.recipients = recipients;
        self
    }

    pub fn with_payload(mut self, payload: JsonValue) -> Self {
        self.payload = payload;
        self
    }
}
