use std::sync::Arc;

use anyhow::{Error, Result};
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

use crate::{
    clients::chat::ChatChannel,
    models::chat::{LookupResult, OutgoingMessage, PresenceState, SentMessage},
};

/// The process-wide chat session. Every component that messages users goes
/// through one of these. Each call takes the session lock, so queue-driven
/// deliveries and broadcasts never interleave on the underlying session.
pub struct ChatSession {
    channel: Arc<dyn ChatChannel>,
    lock: Mutex<()>,
}

impl ChatSession {
    pub fn new(channel: Arc<dyn ChatChannel>) -> Self {
        Self {
            channel,
            lock: Mutex::new(()),
        }
    }

    /// Holds the session until the guard is dropped, for call sequences
    /// that must not be split by other senders.
    pub async fn exclusive(&self) -> SessionGuard<'_> {
        let guard = self.lock.lock().await;
        debug!("Chat session acquired");

        SessionGuard {
            channel: self.channel.as_ref(),
            _guard: guard,
        }
    }

    pub async fn lookup(&self, recipient_id: &str) -> Result<LookupResult, Error> {
        self.exclusive().await.lookup(recipient_id).await
    }

    pub async fn send(&self, to: &str, message: &OutgoingMessage) -> Result<SentMessage, Error> {
        self.exclusive().await.send(to, message).await
    }

    pub async fn presence_update(
        &self,
        state: PresenceState,
        recipient_id: &str,
    ) -> Result<(), Error> {
        self.exclusive()
            .await
            .presence_update(state, recipient_id)
            .await
    }
}

pub struct SessionGuard<'a> {
    channel: &'a dyn ChatChannel,
    _guard: MutexGuard<'a, ()>,
}

impl SessionGuard<'_> {
    pub async fn lookup(&self, recipient_id: &str) -> Result<LookupResult, Error> {
        self.channel.lookup(recipient_id).await
    }

    pub async fn send(&self, to: &str, message: &OutgoingMessage) -> Result<SentMessage, Error> {
        self.channel.send(to, message).await
    }

    pub async fn presence_update(
        &self,
        state: PresenceState,
        recipient_id: &str,
    ) -> Result<(), Error> {
        self.channel.presence_update(state, recipient_id).await
    }
}
