use std::{path::PathBuf, time::Duration};

use anyhow::{Error, Result, anyhow};
use dotenvy::dotenv;
use serde::Deserialize;

use crate::{
    models::{
        retry::RetryConfig,
        schedule::{BroadcastSchedule, DailyWindow},
    },
    supervisor::ReconnectPolicy,
};

#[derive(Clone, Deserialize, Debug)]
pub struct Config {
    pub rabbitmq_url: String,
    #[serde(default = "default_queue_name")]
    pub notification_queue_name: String,
    #[serde(default = "default_reconnect_backoff_seconds")]
    pub reconnect_backoff_seconds: u64,
    #[serde(default = "default_reconnect_jitter_ms")]
    pub reconnect_jitter_ms: u64,

    pub redis_url: String,
    #[serde(default = "default_dedup_cache_key")]
    pub dedup_cache_key: String,
    #[serde(default = "default_dedup_ttl_seconds")]
    pub dedup_ttl_seconds: u64,

    pub database_url: String,

    pub chat_gateway_url: String,
    #[serde(default)]
    pub chat_gateway_token: Option<String>,

    #[serde(default = "default_game_data_url")]
    pub game_data_url: String,

    #[serde(default = "default_media_fetch_timeout_seconds")]
    pub media_fetch_timeout_seconds: u64,
    #[serde(default)]
    pub media_dir: Option<PathBuf>,

    #[serde(default)]
    pub alert_recipients: Vec<String>,

    #[serde(default = "default_broadcast_mode")]
    pub broadcast_mode: String,
    #[serde(default = "default_broadcast_interval_seconds")]
    pub broadcast_interval_seconds: u64,
    #[serde(default = "default_broadcast_timezone")]
    pub broadcast_timezone: String,
    #[serde(default = "default_broadcast_window_start")]
    pub broadcast_window_start: String,
    #[serde(default = "default_broadcast_window_end")]
    pub broadcast_window_end: String,

    #[serde(default = "default_max_retry_attempts")]
    pub max_retry_attempts: u32,
    #[serde(default = "default_initial_retry_delay_ms")]
    pub initial_retry_delay_ms: u64,
    #[serde(default = "default_max_retry_delay_ms")]
    pub max_retry_delay_ms: u64,
    #[serde(default = "default_retry_backoff_multiplier")]
    pub retry_backoff_multiplier: u64,

    #[serde(default = "default_rust_log")]
    pub rust_log: String,
}

impl Config {
    pub fn load() -> Result<Self, Error> {
        dotenv().ok();

        let config = envy::from_env::<Self>()
            .map_err(|e| anyhow!("Invalid or missing environmental variable: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_iter<I>(vars: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let config = envy::from_iter::<_, Self>(vars)
            .map_err(|e| anyhow!("Invalid or missing environmental variable: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), Error> {
        self.broadcast_schedule()?;

        if self.media_fetch_timeout_seconds == 0 {
            return Err(anyhow!("MEDIA_FETCH_TIMEOUT_SECONDS must be positive"));
        }

        Ok(())
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_retry_attempts,
            initial_delay_ms: self.initial_retry_delay_ms,
            max_delay_ms: self.max_retry_delay_ms,
            backoff_multiplier: self.retry_backoff_multiplier,
        }
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            backoff: Duration::from_secs(self.reconnect_backoff_seconds),
            max_jitter: Duration::from_millis(self.reconnect_jitter_ms),
        }
    }

    pub fn alert_recipients(&self) -> Vec<String> {
        self.alert_recipients
            .iter()
            .map(|recipient| recipient.trim().to_string())
            .filter(|recipient| !recipient.is_empty())
            .collect()
    }

    pub fn media_fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.media_fetch_timeout_seconds)
    }

    pub fn broadcast_schedule(&self) -> Result<BroadcastSchedule, Error> {
        match self.broadcast_mode.as_str() {
            "interval" => {
                if self.broadcast_interval_seconds == 0 {
                    return Err(anyhow!("BROADCAST_INTERVAL_SECONDS must be positive"));
                }
                Ok(BroadcastSchedule::Interval(Duration::from_secs(
                    self.broadcast_interval_seconds,
                )))
            }
            "window" => Ok(BroadcastSchedule::DailyWindow(DailyWindow::parse(
                &self.broadcast_timezone,
                &self.broadcast_window_start,
                &self.broadcast_window_end,
            )?)),
            other => Err(anyhow!("Unknown BROADCAST_MODE '{}'", other)),
        }
    }
}

fn default_queue_name() -> String {
    "notification_queue".to_string()
}

fn default_reconnect_backoff_seconds() -> u64 {
    5
}

fn default_reconnect_jitter_ms() -> u64 {
    500
}

fn default_dedup_cache_key() -> String {
    "last_boss_response".to_string()
}

fn default_dedup_ttl_seconds() -> u64 {
    36 * 60 * 60
}

fn default_game_data_url() -> String {
    "https://api.tibiadata.com/v4".to_string()
}

fn default_media_fetch_timeout_seconds() -> u64 {
    10
}

fn default_broadcast_mode() -> String {
    "window".to_string()
}

fn default_broadcast_interval_seconds() -> u64 {
    60
}

fn default_broadcast_timezone() -> String {
    "Europe/Berlin".to_string()
}

fn default_broadcast_window_start() -> String {
    "10:10".to_string()
}

fn default_broadcast_window_end() -> String {
    "11:00".to_string()
}

fn default_max_retry_attempts() -> u32 {
    3
}

fn default_initial_retry_delay_ms() -> u64 {
    200
}

fn default_max_retry_delay_ms() -> u64 {
    2000
}

fn default_retry_backoff_multiplier() -> u64 {
    2
}

fn default_rust_log() -> String {
    "info".to_string()
}
