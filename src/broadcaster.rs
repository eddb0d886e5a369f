use std::sync::Arc;

use chrono::Utc;
use tokio::{
    sync::watch,
    time::{MissedTickBehavior, interval},
};
use tracing::{debug, info, warn};

use crate::{
    clients::{game_data::AlertProvider, redis::DedupCache},
    config::Config,
    delivery::DeliveryHandler,
    models::schedule::BroadcastSchedule,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastSettings {
    pub cache_key: String,
    pub ttl_seconds: u64,
    pub recipients: Vec<String>,
}

impl BroadcastSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            cache_key: config.dedup_cache_key.clone(),
            ttl_seconds: config.dedup_ttl_seconds,
            recipients: config.alert_recipients(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleResult {
    /// Provider errored; cache neither read nor written.
    ProviderUnavailable,
    CacheUnavailable,
    Unchanged,
    /// Content changed but no recipient got it; cache left as is so the
    /// next cycle tries again.
    Undelivered { failed: usize },
    Broadcast { delivered: usize, failed: usize },
}

/// Sends the current alert to the configured recipients whenever it differs
/// from the last one sent.
pub struct Broadcaster {
    provider: Arc<dyn AlertProvider>,
    cache: Arc<dyn DedupCache>,
    delivery: Arc<DeliveryHandler>,
    settings: BroadcastSettings,
    schedule: BroadcastSchedule,
}

impl Broadcaster {
    pub fn new(
        provider: Arc<dyn AlertProvider>,
        cache: Arc<dyn DedupCache>,
        delivery: Arc<DeliveryHandler>,
        settings: BroadcastSettings,
        schedule: BroadcastSchedule,
    ) -> Self {
        Self {
            provider,
            cache,
            delivery,
            settings,
            schedule,
        }
    }

    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.schedule.tick());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(schedule = ?self.schedule, "Broadcaster started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if self.schedule.should_fire(Utc::now()) {
                        let result = self.run_cycle().await;
                        debug!(result = ?result, "Broadcast cycle finished");
                    }
                }
                _ = shutdown.changed() => break,
            }
        }

        info!("Broadcaster stopped");
    }

    /// The cache read and write are not atomic; two broadcasters sharing a
    /// cache can both send the same change.
    pub async fn run_cycle(&self) -> CycleResult {
        let alert = match self.provider.fetch_current_alert().await {
            Ok(alert) => alert,
            Err(e) => {
                warn!(error = %e, "Alert provider failed, skipping cycle");
                return CycleResult::ProviderUnavailable;
            }
        };

        let cached = match self.cache.get(&self.settings.cache_key).await {
            Ok(cached) => cached,
            Err(e) => {
                warn!(error = %e, "Dedup cache unavailable, skipping cycle");
                return CycleResult::CacheUnavailable;
            }
        };

        if cached.as_deref() == Some(alert.display_text.as_str()) {
            debug!(alert = %alert.display_text, "Alert unchanged, nothing to send");
            return CycleResult::Unchanged;
        }

        info!(alert = %alert.display_text, "New alert content detected, broadcasting");

        let report = self
            .delivery
            .fan_out(
                &self.settings.recipients,
                &alert.display_text,
                alert.media_locator.as_deref(),
            )
            .await;

        if report.delivered.is_empty() && report.attempted() > 0 {
            warn!(failed = report.failed.len(), "Alert reached no recipient");
            return CycleResult::Undelivered {
                failed: report.failed.len(),
            };
        }

        if let Err(e) = self
            .cache
            .set(
                &self.settings.cache_key,
                &alert.display_text,
                self.settings.ttl_seconds,
            )
            .await
        {
            warn!(error = %e, "Failed to update dedup cache");
        }

        CycleResult::Broadcast {
            delivered: report.delivered.len(),
            failed: report.failed.len(),
        }
    }
}
