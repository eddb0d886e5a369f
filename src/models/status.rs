use std::fmt::{Display, Formatter, Result};

use serde::{Deserialize, Serialize};

use crate::models::job::MissingField;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Delivered,
    Partial,
    UndeliverableRecipient,
    MissingField,
    TransientFailure,
}

impl Display for JobStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            JobStatus::Delivered => write!(f, "delivered"),
            JobStatus::Partial => write!(f, "partial"),
            JobStatus::UndeliverableRecipient => write!(f, "undeliverable_recipient"),
            JobStatus::MissingField => write!(f, "missing_field"),
            JobStatus::TransientFailure => write!(f, "transient_failure"),
        }
    }
}

/// Result of handling one job. Assigned once; never revised after ack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobOutcome {
    pub status: JobStatus,
    pub delivered_recipients: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_id: Option<String>,
}

impl JobOutcome {
    fn with_status(status: JobStatus) -> Self {
        Self {
            status,
            delivered_recipients: Vec::new(),
            error_detail: None,
            message_id: None,
            resolved_id: None,
        }
    }

    pub fn delivered(recipient: String, resolved_id: String, message_id: String) -> Self {
        Self {
            delivered_recipients: vec![recipient],
            message_id: Some(message_id),
            resolved_id: Some(resolved_id),
            ..Self::with_status(JobStatus::Delivered)
        }
    }

    /// `delivered` when every recipient succeeded, `partial` otherwise.
    pub fn fanned_out(delivered: Vec<String>, attempted: usize) -> Self {
        let status = if delivered.len() >= attempted {
            JobStatus::Delivered
        } else {
            JobStatus::Partial
        };

        Self {
            delivered_recipients: delivered,
            ..Self::with_status(status)
        }
    }

    pub fn undeliverable(recipient: &str) -> Self {
        Self {
            error_detail: Some(format!("recipient {} is not reachable", recipient)),
            ..Self::with_status(JobStatus::UndeliverableRecipient)
        }
    }

    pub fn missing_field(field: MissingField) -> Self {
        Self {
            error_detail: Some(field.as_str().to_string()),
            ..Self::with_status(JobStatus::MissingField)
        }
    }

    pub fn transient(detail: impl Into<String>) -> Self {
        Self {
            error_detail: Some(detail.into()),
            ..Self::with_status(JobStatus::TransientFailure)
        }
    }
}

/// What the processor decided for a broker message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub outcome: JobOutcome,
    pub should_ack: bool,
}

impl Decision {
    pub fn ack(outcome: JobOutcome) -> Self {
        Self {
            outcome,
            should_ack: true,
        }
    }

    pub fn requeue(outcome: JobOutcome) -> Self {
        Self {
            outcome,
            should_ack: false,
        }
    }
}
