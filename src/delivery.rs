use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::{
    clients::{
        chat::to_jid,
        media::{MediaAttachment, MediaFetcher},
    },
    error::DeliveryError,
    models::{
        chat::{OutgoingMessage, PresenceState},
        job::{MissingField, NotificationJob},
        status::JobOutcome,
    },
    processor::JobHandler,
    session::ChatSession,
};

/// Per-recipient results of a fan-out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FanOutReport {
    pub delivered: Vec<String>,
    pub failed: Vec<String>,
    pub with_media: bool,
}

impl FanOutReport {
    pub fn attempted(&self) -> usize {
        self.delivered.len() + self.failed.len()
    }
}

pub struct DeliveryHandler {
    session: Arc<ChatSession>,
    media: MediaFetcher,
}

impl DeliveryHandler {
    pub fn new(session: Arc<ChatSession>, media: MediaFetcher) -> Self {
        Self { session, media }
    }

    /// Unknown recipients are a permanent outcome; lookup and send errors
    /// are transient. The session is held from lookup through send.
    pub async fn deliver_single(
        &self,
        recipient: &str,
        text: &str,
    ) -> Result<JobOutcome, DeliveryError> {
        let session = self.session.exclusive().await;

        let lookup = session
            .lookup(recipient)
            .await
            .map_err(|e| DeliveryError::Lookup(e.to_string()))?;

        if !lookup.exists {
            info!(recipient, "Recipient not on chat channel, giving up");
            return Ok(JobOutcome::undeliverable(recipient));
        }

        let target = lookup
            .resolved_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| to_jid(recipient));

        if let Err(e) = session
            .presence_update(PresenceState::Composing, &target)
            .await
        {
            debug!(recipient, error = %e, "Presence update failed");
        }

        let message = OutgoingMessage::Text {
            text: text.to_string(),
        };

        let sent = session
            .send(&target, &message)
            .await
            .map_err(|e| DeliveryError::Send(e.to_string()))?;

        let resolved_id = sent
            .remote_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or(target);

        info!(
            recipient,
            resolved_id = %resolved_id,
            message_id = %sent.message_id,
            "Notification delivered"
        );

        Ok(JobOutcome::delivered(
            recipient.to_string(),
            resolved_id,
            sent.message_id,
        ))
    }

    /// Sends `text` to every recipient, with the media attached when it can
    /// be fetched. One recipient failing never stops the rest. Any temporary
    /// media file is gone when this returns, unwinds or is cancelled.
    pub async fn fan_out(
        &self,
        recipients: &[String],
        text: &str,
        media_locator: Option<&str>,
    ) -> FanOutReport {
        let attachment = match media_locator {
            Some(locator) => self.fetch_media(locator).await,
            None => None,
        };

        let message = match &attachment {
            Some(media) => OutgoingMessage::Media {
                path: media.path().to_path_buf(),
                caption: text.to_string(),
            },
            None => OutgoingMessage::Text {
                text: text.to_string(),
            },
        };

        let mut report = FanOutReport {
            with_media: attachment.is_some(),
            ..FanOutReport::default()
        };

        for recipient in recipients {
            debug!(recipient = %recipient, "Sending fan-out message");

            match self.session.send(recipient, &message).await {
                Ok(sent) => {
                    debug!(recipient = %recipient, message_id = %sent.message_id, "Message sent");
                    report.delivered.push(recipient.clone());
                }
                Err(e) => {
                    warn!(recipient = %recipient, error = %e, "Fan-out send failed");
                    report.failed.push(recipient.clone());
                }
            }
        }

        if let Some(media) = attachment {
            media.cleanup();
        }

        info!(
            delivered = report.delivered.len(),
            failed = report.failed.len(),
            with_media = report.with_media,
            "Fan-out finished"
        );

        report
    }

    async fn fetch_media(&self, locator: &str) -> Option<MediaAttachment> {
        match self.media.fetch(locator).await {
            Ok(media) => Some(media),
            Err(e) => {
                warn!(
                    locator,
                    error = %e,
                    "Media unavailable, falling back to text-only"
                );
                None
            }
        }
    }
}

/// Generic jobs: one recipient, text only.
pub struct SingleRecipientHandler {
    delivery: Arc<DeliveryHandler>,
}

impl SingleRecipientHandler {
    pub fn new(delivery: Arc<DeliveryHandler>) -> Self {
        Self { delivery }
    }
}

#[async_trait]
impl JobHandler for SingleRecipientHandler {
    async fn handle(&self, job: &NotificationJob) -> Result<JobOutcome, DeliveryError> {
        match (job.recipient.as_deref(), job.payload.text.as_deref()) {
            (Some(recipient), Some(text)) => self.delivery.deliver_single(recipient, text).await,
            _ => Ok(JobOutcome::missing_field(
                job.missing_field().unwrap_or(MissingField::Recipient),
            )),
        }
    }
}

/// Alert jobs: the payload goes to the configured recipient set.
pub struct AlertFanoutHandler {
    delivery: Arc<DeliveryHandler>,
    recipients: Vec<String>,
}

impl AlertFanoutHandler {
    pub fn new(delivery: Arc<DeliveryHandler>, recipients: Vec<String>) -> Self {
        Self {
            delivery,
            recipients,
        }
    }
}

#[async_trait]
impl JobHandler for AlertFanoutHandler {
    async fn handle(&self, job: &NotificationJob) -> Result<JobOutcome, DeliveryError> {
        let Some(text) = job.payload.text.as_deref() else {
            warn!(job_id = %job.id, "Alert job has no message, dropping");
            return Ok(JobOutcome::missing_field(MissingField::Message));
        };

        if self.recipients.is_empty() {
            warn!(job_id = %job.id, "No alert recipients configured");
            return Ok(JobOutcome::fanned_out(Vec::new(), 0));
        }

        let report = self
            .delivery
            .fan_out(&self.recipients, text, job.payload.media_locator.as_deref())
            .await;

        if report.delivered.is_empty() {
            return Err(DeliveryError::NoneDelivered {
                failures: report.failed.len(),
            });
        }

        let attempted = report.attempted();
        Ok(JobOutcome::fanned_out(report.delivered, attempted))
    }
}
