use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LookupResult {
    pub exists: bool,

    /// Absent when the gateway does not report a canonical id.
    #[serde(rename = "jid", default)]
    pub resolved_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutgoingMessage {
    Text { text: String },
    Media { path: PathBuf, caption: String },
}

impl OutgoingMessage {
    pub fn text(&self) -> &str {
        match self {
            OutgoingMessage::Text { text } => text,
            OutgoingMessage::Media { caption, .. } => caption,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SentMessage {
    pub message_id: String,

    #[serde(default)]
    pub remote_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceState {
    Available,
    Unavailable,
    Composing,
    Paused,
}

#[derive(Debug, Serialize)]
pub struct LookupRequest<'a> {
    pub jid: &'a str,
}

#[derive(Debug, Serialize)]
pub struct TextMessageRequest<'a> {
    pub to: &'a str,
    pub text: &'a str,
}

#[derive(Debug, Serialize)]
pub struct PresenceRequest<'a> {
    pub to: &'a str,
    pub state: PresenceState,
}
