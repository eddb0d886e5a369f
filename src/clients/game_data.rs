use std::time::Duration;

use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info};

use crate::{
    config::Config,
    models::alert::{AlertContent, BoostableBossesResponse},
};

#[async_trait]
pub trait AlertProvider: Send + Sync {
    async fn fetch_current_alert(&self) -> Result<AlertContent, Error>;
}

pub struct TibiaDataClient {
    http_client: Client,
    base_url: String,
}

impl TibiaDataClient {
    pub fn new(config: &Config) -> Result<Self, Error> {
        Self::with_base_url(&config.game_data_url)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self, Error> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|_| anyhow!("Failed to create HTTP client"))?;

        info!(base_url = %base_url, "Game data client initialized");

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl AlertProvider for TibiaDataClient {
    async fn fetch_current_alert(&self) -> Result<AlertContent, Error> {
        let url = format!("{}/boostablebosses", self.base_url);

        debug!(url = %url, "Fetching boosted boss");

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| anyhow!("Game data request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("Game data provider returned status {}", status));
        }

        let body: BoostableBossesResponse = response
            .json()
            .await
            .map_err(|e| anyhow!("Failed to parse boosted boss JSON: {}", e))?;

        let boss = body
            .boostable_bosses
            .and_then(|bosses| bosses.boosted)
            .ok_or_else(|| anyhow!("Game data response has no boosted boss"))?;

        Ok(boss.into())
    }
}
