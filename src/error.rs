use thiserror::Error;

use crate::models::job::JobKind;

/// Delivery failures that leave the job eligible for redelivery.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("recipient lookup failed: {0}")]
    Lookup(String),

    #[error("send failed: {0}")]
    Send(String),

    #[error("no recipient received the notification ({failures} failed)")]
    NoneDelivered { failures: usize },

    #[error("no handler registered for {0} jobs")]
    Unhandled(JobKind),
}
