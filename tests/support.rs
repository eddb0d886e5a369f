#![allow(dead_code)]

use std::{
    collections::{HashMap, HashSet, VecDeque},
    path::PathBuf,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU32, AtomicUsize, Ordering},
    },
    time::Duration,
};

use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use chat_relay::{
    clients::{
        chat::ChatChannel, database::AuditStore, game_data::AlertProvider, media::MediaFetcher,
        redis::DedupCache,
    },
    delivery::{AlertFanoutHandler, DeliveryHandler, SingleRecipientHandler},
    models::{
        alert::AlertContent,
        audit::CreateAuditRecord,
        chat::{LookupResult, OutgoingMessage, PresenceState, SentMessage},
        job::JobKind,
    },
    processor::{Acknowledger, HandlerRegistry, JobProcessor},
    session::ChatSession,
    tracker::StatusTracker,
};

#[derive(Default)]
pub struct FakeAcker {
    pub acks: AtomicU32,
    pub requeues: AtomicU32,
    pub drops: AtomicU32,
    pub fail_ack: bool,
}

impl FakeAcker {
    pub fn failing() -> Self {
        Self {
            fail_ack: true,
            ..Self::default()
        }
    }

    pub fn acks(&self) -> u32 {
        self.acks.load(Ordering::SeqCst)
    }

    pub fn requeues(&self) -> u32 {
        self.requeues.load(Ordering::SeqCst)
    }

    pub fn settlements(&self) -> u32 {
        self.acks() + self.requeues() + self.drops.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Acknowledger for FakeAcker {
    async fn ack(&self) -> Result<(), Error> {
        if self.fail_ack {
            return Err(anyhow!("channel closed"));
        }
        self.acks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn reject(&self, requeue: bool) -> Result<(), Error> {
        if requeue {
            self.requeues.fetch_add(1, Ordering::SeqCst);
        } else {
            self.drops.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SendRecord {
    pub to: String,
    pub message: OutgoingMessage,
    pub media_existed: bool,
}

/// Chat channel double. Recipients listed in `known` exist; sends to anyone
/// in `failing` error out.
#[derive(Default)]
pub struct FakeChatChannel {
    pub known: HashSet<String>,
    pub failing: HashSet<String>,
    pub lookup_fails: bool,
    /// Report known recipients without a canonical id.
    pub omit_resolved_id: bool,
    pub hang_on_send: bool,
    pub send_delay: Option<Duration>,
    pub presence_delay: Option<Duration>,
    pub sends: Mutex<Vec<SendRecord>>,
    pub presence: Mutex<Vec<(PresenceState, String)>>,
    /// Every call in arrival order, e.g. `send:120363@g.us`.
    pub events: Mutex<Vec<String>>,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl FakeChatChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_known(mut self, ids: &[&str]) -> Self {
        self.known.extend(ids.iter().map(|id| id.to_string()));
        self
    }

    pub fn with_failing(mut self, ids: &[&str]) -> Self {
        self.failing.extend(ids.iter().map(|id| id.to_string()));
        self
    }

    pub fn sends(&self) -> Vec<SendRecord> {
        self.sends.lock().unwrap().clone()
    }

    pub fn send_count(&self) -> usize {
        self.sends.lock().unwrap().len()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn log(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

#[async_trait]
impl ChatChannel for FakeChatChannel {
    async fn lookup(&self, recipient_id: &str) -> Result<LookupResult, Error> {
        self.log(format!("lookup:{}", recipient_id));

        if self.lookup_fails {
            return Err(anyhow!("session not connected"));
        }

        Ok(LookupResult {
            exists: self.known.contains(recipient_id),
            resolved_id: (!self.omit_resolved_id)
                .then(|| format!("{}@s.whatsapp.net", recipient_id)),
        })
    }

    async fn send(
        &self,
        resolved_id: &str,
        message: &OutgoingMessage,
    ) -> Result<SentMessage, Error> {
        self.log(format!("send:{}", resolved_id));

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if self.hang_on_send {
            std::future::pending::<()>().await;
        }

        if let Some(delay) = self.send_delay {
            tokio::time::sleep(delay).await;
        }

        let media_existed = match message {
            OutgoingMessage::Media { path, .. } => path.exists(),
            OutgoingMessage::Text { .. } => false,
        };

        self.sends.lock().unwrap().push(SendRecord {
            to: resolved_id.to_string(),
            message: message.clone(),
            media_existed,
        });

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let bare = resolved_id.trim_end_matches("@s.whatsapp.net");
        if self.failing.contains(bare) {
            return Err(anyhow!("connection reset while sending to {}", resolved_id));
        }

        Ok(SentMessage {
            message_id: format!("MSG-{}", self.send_count()),
            remote_id: None,
        })
    }

    async fn presence_update(
        &self,
        state: PresenceState,
        recipient_id: &str,
    ) -> Result<(), Error> {
        self.log(format!("presence:{}", recipient_id));

        if let Some(delay) = self.presence_delay {
            tokio::time::sleep(delay).await;
        }

        self.presence
            .lock()
            .unwrap()
            .push((state, recipient_id.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryCache {
    pub entries: Mutex<HashMap<String, (String, u64)>>,
    pub gets: AtomicU32,
    pub sets: AtomicU32,
    pub fail_get: bool,
}

impl MemoryCache {
    pub fn entry(&self, key: &str) -> Option<(String, u64)> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    /// Simulates the TTL running out.
    pub fn expire(&self, key: &str) {
        self.entries.lock().unwrap().remove(key);
    }
}

#[async_trait]
impl DedupCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        self.gets.fetch_add(1, Ordering::SeqCst);

        if self.fail_get {
            return Err(anyhow!("connection refused"));
        }

        Ok(self.entry(key).map(|(value, _)| value))
    }

    async fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), Error> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), (value.to_string(), ttl_seconds));
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryAuditStore {
    pub records: Mutex<Vec<CreateAuditRecord>>,
    pub fail: bool,
}

impl MemoryAuditStore {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn records(&self) -> Vec<CreateAuditRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuditStore for MemoryAuditStore {
    async fn insert(&self, record: &CreateAuditRecord) -> Result<(), Error> {
        if self.fail {
            return Err(anyhow!("Database write failed: connection refused"));
        }
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}

/// Replays scripted provider responses, repeating the last one.
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<Result<AlertContent, String>>>,
    last: Mutex<Option<Result<AlertContent, String>>>,
    pub calls: AtomicU32,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<Result<AlertContent, String>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            last: Mutex::new(None),
            calls: AtomicU32::new(0),
        }
    }

    pub fn always(text: &str) -> Self {
        Self::new(vec![Ok(alert(text))])
    }
}

#[async_trait]
impl AlertProvider for ScriptedProvider {
    async fn fetch_current_alert(&self) -> Result<AlertContent, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let next = self.responses.lock().unwrap().pop_front();
        let response = match next {
            Some(response) => {
                *self.last.lock().unwrap() = Some(response.clone());
                response
            }
            None => self
                .last
                .lock()
                .unwrap()
                .clone()
                .unwrap_or_else(|| Err("no response scripted".to_string())),
        };

        response.map_err(|e| anyhow!(e))
    }
}

pub fn alert(text: &str) -> AlertContent {
    AlertContent {
        display_text: text.to_string(),
        media_locator: None,
    }
}

pub fn recipients(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|id| id.to_string()).collect()
}

pub fn media_fetcher(timeout: Duration, media_dir: Option<PathBuf>) -> MediaFetcher {
    MediaFetcher::with_settings(timeout, media_dir).unwrap()
}

pub fn delivery_handler(channel: Arc<FakeChatChannel>) -> Arc<DeliveryHandler> {
    delivery_handler_with_media(channel, media_fetcher(Duration::from_millis(500), None))
}

pub fn delivery_handler_with_media(
    channel: Arc<FakeChatChannel>,
    media: MediaFetcher,
) -> Arc<DeliveryHandler> {
    Arc::new(DeliveryHandler::new(
        Arc::new(ChatSession::new(channel)),
        media,
    ))
}

pub fn processor(
    delivery: Arc<DeliveryHandler>,
    store: Arc<MemoryAuditStore>,
    alert_recipients: Vec<String>,
) -> JobProcessor {
    let registry = HandlerRegistry::new()
        .register(
            JobKind::Generic,
            Arc::new(SingleRecipientHandler::new(delivery.clone())),
        )
        .register(
            JobKind::AlertFanout,
            Arc::new(AlertFanoutHandler::new(delivery, alert_recipients)),
        );

    JobProcessor::new(registry, StatusTracker::new(store))
}
