use std::{sync::Arc, time::Duration};

use anyhow::{Error, Result};
use async_trait::async_trait;
use tokio::{sync::watch, time::sleep};
use tracing::{debug, info, warn};

use crate::processor::JobProcessor;

/// Fixed backoff between broker connection attempts, plus up to `max_jitter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub backoff: Duration,
    pub max_jitter: Duration,
}

impl ReconnectPolicy {
    pub fn next_delay(&self) -> Duration {
        let jitter_ms = self.max_jitter.as_millis() as u64;

        if jitter_ms == 0 {
            return self.backoff;
        }

        self.backoff + Duration::from_millis(rand::random_range(0..=jitter_ms))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    ConnectionLost,
    Shutdown,
}

/// A live subscription to the job queue.
#[async_trait]
pub trait QueueSession: Send {
    /// Feeds deliveries to the processor one at a time until the connection
    /// goes away or shutdown is signalled.
    async fn consume(
        &mut self,
        processor: &JobProcessor,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<SessionEnd, Error>;

    async fn close(self: Box<Self>) -> Result<(), Error>;
}

#[async_trait]
pub trait QueueConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn QueueSession>, Error>;
}

/// Keeps a queue subscription alive for the lifetime of the process.
pub struct Supervisor<C> {
    connector: C,
    processor: Arc<JobProcessor>,
    policy: ReconnectPolicy,
}

impl<C: QueueConnector> Supervisor<C> {
    pub fn new(connector: C, processor: Arc<JobProcessor>, policy: ReconnectPolicy) -> Self {
        Self {
            connector,
            processor,
            policy,
        }
    }

    /// Connects, consumes, and reconnects after every loss with no attempt
    /// ceiling. Returns only once shutdown is signalled.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut attempt: u64 = 0;

        while !*shutdown.borrow() {
            attempt += 1;

            let connected = tokio::select! {
                connected = self.connector.connect() => connected,
                _ = shutdown.changed() => break,
            };

            match connected {
                Ok(mut session) => {
                    info!(attempt, "Queue consumer subscribed");

                    let end = session.consume(&self.processor, &mut shutdown).await;

                    if let Err(e) = session.close().await {
                        debug!(error = %e, "Error closing broker session");
                    }

                    match end {
                        Ok(SessionEnd::Shutdown) => {
                            info!("Queue consumer stopped");
                            return;
                        }
                        Ok(SessionEnd::ConnectionLost) => {
                            warn!("Broker connection closed, reconnecting");
                        }
                        Err(e) => {
                            warn!(error = %e, "Broker connection failed, reconnecting");
                        }
                    }
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Failed to connect to broker");
                }
            }

            let delay = self.policy.next_delay();
            debug!(delay_ms = delay.as_millis() as u64, "Waiting before reconnect");

            tokio::select! {
                _ = sleep(delay) => {}
                _ = shutdown.changed() => break,
            }
        }

        info!("Queue consumer stopped");
    }
}
