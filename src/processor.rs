use std::{collections::HashMap, panic::AssertUnwindSafe, sync::Arc};

use anyhow::{Error, Result};
use async_trait::async_trait;
use futures_util::FutureExt;
use tracing::{error, info, warn};

use crate::{
    error::DeliveryError,
    models::{
        job::{JobKind, NotificationJob},
        status::{Decision, JobOutcome},
    },
    tracker::StatusTracker,
};

/// Broker-side settlement of the message currently being processed.
#[async_trait]
pub trait Acknowledger: Send + Sync {
    async fn ack(&self) -> Result<(), Error>;

    async fn reject(&self, requeue: bool) -> Result<(), Error>;
}

/// Delivers one kind of job. `Err` means the job may succeed on redelivery.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: &NotificationJob) -> Result<JobOutcome, DeliveryError>;
}

#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<JobKind, Arc<dyn JobHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, kind: JobKind, handler: Arc<dyn JobHandler>) -> Self {
        self.handlers.insert(kind, handler);
        self
    }

    pub fn get(&self, kind: JobKind) -> Option<Arc<dyn JobHandler>> {
        self.handlers.get(&kind).cloned()
    }
}

pub struct JobProcessor {
    registry: HandlerRegistry,
    tracker: StatusTracker,
}

impl JobProcessor {
    pub fn new(registry: HandlerRegistry, tracker: StatusTracker) -> Self {
        Self { registry, tracker }
    }

    /// Validates and routes a parsed job. Handler errors and panics become a
    /// requeue decision here so nothing escapes the dispatch boundary.
    pub async fn dispatch(&self, job: &NotificationJob) -> Decision {
        if job.kind == JobKind::Generic {
            if let Some(field) = job.missing_field() {
                warn!(
                    job_id = %job.id,
                    missing_field = field.as_str(),
                    "Job is missing a required field, dropping"
                );
                return Decision::ack(JobOutcome::missing_field(field));
            }
        }

        let Some(handler) = self.registry.get(job.kind) else {
            let e = DeliveryError::Unhandled(job.kind);
            error!(job_id = %job.id, error = %e, "Cannot route job");
            return Decision::requeue(JobOutcome::transient(e.to_string()));
        };

        match AssertUnwindSafe(handler.handle(job)).catch_unwind().await {
            Ok(Ok(outcome)) => Decision::ack(outcome),
            Ok(Err(e)) => {
                warn!(job_id = %job.id, error = %e, "Transient delivery failure, requeueing");
                Decision::requeue(JobOutcome::transient(e.to_string()))
            }
            Err(_) => {
                error!(job_id = %job.id, "Delivery handler panicked, requeueing");
                Decision::requeue(JobOutcome::transient("delivery handler panicked"))
            }
        }
    }

    /// Handles one raw broker message: parse, dispatch, settle exactly once,
    /// then audit if the message was acked.
    pub async fn handle_delivery(&self, body: &[u8], acker: &dyn Acknowledger) -> Decision {
        let job = match NotificationJob::parse(body) {
            Ok(job) => job,
            Err(e) => {
                warn!(error = %e, "Malformed job payload, requeueing");
                let decision =
                    Decision::requeue(JobOutcome::transient(format!("malformed payload: {}", e)));
                settle(acker, &decision, "unparsed").await;
                return decision;
            }
        };

        info!(
            job_id = %job.id,
            kind = %job.kind,
            recipient = ?job.recipient,
            "Processing notification job"
        );

        let decision = self.dispatch(&job).await;
        let acked = settle(acker, &decision, &job.id).await && decision.should_ack;

        self.tracker.record(&job, &decision.outcome, acked).await;

        decision
    }
}

/// Issues the single ack or requeue for a message. Returns whether the broker
/// accepted it.
async fn settle(acker: &dyn Acknowledger, decision: &Decision, job_id: &str) -> bool {
    let result = if decision.should_ack {
        acker.ack().await
    } else {
        acker.reject(true).await
    };

    match result {
        Ok(()) => {
            info!(
                job_id,
                status = %decision.outcome.status,
                acked = decision.should_ack,
                "Message settled"
            );
            true
        }
        Err(e) => {
            error!(
                job_id,
                acked = decision.should_ack,
                error = %e,
                "Failed to settle message with broker"
            );
            false
        }
    }
}
