use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use redis::{AsyncCommands, Client, aio::MultiplexedConnection};
use tracing::{debug, info};

use crate::{config::Config, models::retry::RetryConfig, utils::retry_with_backoff};

/// TTL-keyed string cache consulted by the broadcaster.
#[async_trait]
pub trait DedupCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, Error>;

    async fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), Error>;
}

pub struct RedisClient {
    connection: MultiplexedConnection,
    retry_config: RetryConfig,
}

impl RedisClient {
    pub async fn connect(config: &Config) -> Result<Self, Error> {
        info!("Connecting to Redis");

        let client = Client::open(config.redis_url.as_str())
            .map_err(|_| anyhow!("Failed to create redis client"))?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| anyhow!("Failed to connect to redis: {}", e))?;

        info!("Redis connection established");

        Ok(Self {
            connection,
            retry_config: config.retry_config(),
        })
    }
}

#[async_trait]
impl DedupCache for RedisClient {
    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let mut conn = self.connection.clone();

        let value: Option<String> = conn
            .get(key)
            .await
            .map_err(|e| anyhow!("Failed to get cached value: {}", e))?;

        debug!(key, hit = value.is_some(), "Dedup cache lookup");

        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), Error> {
        retry_with_backoff(&self.retry_config, || {
            let key = key.to_string();
            let value = value.to_string();
            let mut conn = self.connection.clone();

            async move {
                conn.set_ex::<_, _, ()>(&key, &value, ttl_seconds)
                    .await
                    .map_err(|e| e.to_string())
            }
        })
        .await
        .map_err(|e| anyhow!("Failed to store cached value: {}", e))?;

        debug!(key, ttl_seconds, "Dedup cache updated");

        Ok(())
    }
}
