use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::{
    clients::database::AuditStore,
    models::{audit::CreateAuditRecord, job::NotificationJob, status::JobOutcome},
};

/// Persists terminal job outcomes to the audit store.
pub struct StatusTracker {
    store: Arc<dyn AuditStore>,
}

impl StatusTracker {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }

    /// `terminal` must be true only once the broker message has been acked.
    /// Returns whether a record was written. Persistence failures are logged
    /// and swallowed; the ack already stands.
    pub async fn record(&self, job: &NotificationJob, outcome: &JobOutcome, terminal: bool) -> bool {
        if !terminal {
            debug!(
                job_id = %job.id,
                status = %outcome.status,
                "Outcome not terminal, skipping audit"
            );
            return false;
        }

        let record = CreateAuditRecord::from_outcome(job, outcome);

        match self.store.insert(&record).await {
            Ok(()) => {
                info!(
                    job_id = %job.id,
                    status = %outcome.status,
                    "Job outcome recorded"
                );
                true
            }
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "Failed to write audit record");
                false
            }
        }
    }
}
