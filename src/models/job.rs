use std::fmt::{Display, Formatter, Result as FmtResult};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Generic,
    AlertFanout,
}

impl JobKind {
    /// Unknown or absent tags fall back to `Generic`.
    pub fn from_tag(tag: Option<&str>) -> Self {
        match tag {
            Some("alert_fanout") | Some("tibia_notification") => JobKind::AlertFanout,
            _ => JobKind::Generic,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Generic => "generic",
            JobKind::AlertFanout => "alert_fanout",
        }
    }
}

impl Display for JobKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Wire shape of a queued job body. Legacy producers use `type`, `phone`
/// and `image_url`; those are kept as separate fields so a body carrying
/// both spellings still parses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub legacy_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, rename = "mediaLocator", skip_serializing_if = "Option::is_none")]
    pub media_locator: Option<String>,
    #[serde(default, rename = "media_locator", skip_serializing_if = "Option::is_none")]
    pub media_locator_snake: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobPayload {
    pub text: Option<String>,
    pub media_locator: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingField {
    Recipient,
    Message,
}

impl MissingField {
    pub fn as_str(&self) -> &'static str {
        match self {
            MissingField::Recipient => "recipient",
            MissingField::Message => "message",
        }
    }
}

/// One delivery task consumed from the queue. Never mutated after parsing.
#[derive(Debug, Clone)]
pub struct NotificationJob {
    pub id: String,
    pub kind: JobKind,
    pub recipient: Option<String>,
    pub payload: JobPayload,
    pub received_at: DateTime<Utc>,
    raw: JsonValue,
}

impl NotificationJob {
    pub fn parse(body: &[u8]) -> Result<Self, serde_json::Error> {
        let raw: JsonValue = serde_json::from_slice(body)?;
        let envelope: JobEnvelope = serde_json::from_value(raw.clone())?;

        let kind = non_empty(envelope.kind).or_else(|| non_empty(envelope.legacy_type));
        let media_locator = non_empty(envelope.media_locator)
            .or_else(|| non_empty(envelope.media_locator_snake))
            .or_else(|| non_empty(envelope.image_url));

        Ok(Self {
            id: non_empty(envelope.id).unwrap_or_else(|| Uuid::new_v4().to_string()),
            kind: JobKind::from_tag(kind.as_deref()),
            recipient: non_empty(envelope.recipient).or_else(|| non_empty(envelope.phone)),
            payload: JobPayload {
                text: non_empty(envelope.message),
                media_locator,
            },
            received_at: Utc::now(),
            raw,
        })
    }

    /// First required field a generic job lacks, recipient before message.
    pub fn missing_field(&self) -> Option<MissingField> {
        if self.recipient.is_none() {
            Some(MissingField::Recipient)
        } else if self.payload.text.is_none() {
            Some(MissingField::Message)
        } else {
            None
        }
    }

    pub fn raw(&self) -> &JsonValue {
        &self.raw
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
