use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use futures_util::StreamExt;
use lapin::{
    Channel, Connection, ConnectionProperties, Consumer,
    options::{
        BasicAckOptions, BasicConsumeOptions, BasicQosOptions, BasicRejectOptions,
        QueueDeclareOptions,
    },
    types::FieldTable,
};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::{
    config::Config,
    processor::{Acknowledger, JobProcessor},
    supervisor::{QueueConnector, QueueSession, SessionEnd},
};

/// One message in flight per connection; all chat sends are serialized
/// behind it.
const PREFETCH_COUNT: u16 = 1;
const CONSUMER_TAG: &str = "notification_worker";

pub struct RabbitMqClient {
    connection: Connection,
    channel: Channel,
    queue_name: String,
}

impl RabbitMqClient {
    pub async fn connect(config: &Config) -> Result<Self, Error> {
        info!("Connecting to RabbitMQ");

        let connection = Connection::connect(&config.rabbitmq_url, ConnectionProperties::default())
            .await
            .map_err(|e| anyhow!("Failed to connect to RabbitMQ: {}", e))?;

        debug!("RabbitMQ connection established");

        let channel = connection
            .create_channel()
            .await
            .map_err(|_| anyhow!("RabbitMQ channel creation failed"))?;

        channel
            .basic_qos(PREFETCH_COUNT, BasicQosOptions::default())
            .await
            .map_err(|_| anyhow!("Failed to set up QoS"))?;

        channel
            .queue_declare(
                &config.notification_queue_name,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|_| anyhow!("Failed to declare notification queue"))?;

        info!(
            queue = %config.notification_queue_name,
            prefetch = PREFETCH_COUNT,
            "Notification queue declared"
        );

        Ok(Self {
            connection,
            channel,
            queue_name: config.notification_queue_name.clone(),
        })
    }

    pub async fn create_consumer(&self) -> Result<Consumer, Error> {
        let consumer = self
            .channel
            .basic_consume(
                &self.queue_name,
                CONSUMER_TAG,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|_| anyhow!("Failed to create consumer"))?;

        info!(queue = %self.queue_name, "Consumer created for queue");

        Ok(consumer)
    }

    pub async fn acknowledge(&self, delivery_tag: u64) -> Result<(), Error> {
        self.channel
            .basic_ack(delivery_tag, BasicAckOptions::default())
            .await
            .map_err(|_| anyhow!("Failed to acknowledge message"))?;

        Ok(())
    }

    pub async fn reject(&self, delivery_tag: u64, requeue: bool) -> Result<(), Error> {
        self.channel
            .basic_reject(delivery_tag, BasicRejectOptions { requeue })
            .await
            .map_err(|_| anyhow!("Failed to reject message"))?;

        Ok(())
    }

    pub async fn close(&self) -> Result<(), Error> {
        self.channel
            .close(200u16.into(), "Normal shutdown".into())
            .await
            .map_err(|e| anyhow!("Failed to close RabbitMQ channel: {}", e))?;

        self.connection
            .close(200u16.into(), "Normal shutdown".into())
            .await
            .map_err(|e| anyhow!("Failed to close RabbitMQ connection: {}", e))?;

        info!("RabbitMQ channel and connection closed");

        Ok(())
    }
}

/// Settles a single delivery on the channel it arrived on.
pub struct BrokerDelivery<'a> {
    client: &'a RabbitMqClient,
    delivery_tag: u64,
}

impl<'a> BrokerDelivery<'a> {
    pub fn new(client: &'a RabbitMqClient, delivery_tag: u64) -> Self {
        Self {
            client,
            delivery_tag,
        }
    }
}

#[async_trait]
impl<'a> Acknowledger for BrokerDelivery<'a> {
    async fn ack(&self) -> Result<(), Error> {
        self.client.acknowledge(self.delivery_tag).await
    }

    async fn reject(&self, requeue: bool) -> Result<(), Error> {
        self.client.reject(self.delivery_tag, requeue).await
    }
}

pub struct RabbitMqConnector {
    config: Config,
}

impl RabbitMqConnector {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

#[async_trait]
impl QueueConnector for RabbitMqConnector {
    async fn connect(&self) -> Result<Box<dyn QueueSession>, Error> {
        let client = RabbitMqClient::connect(&self.config).await?;
        let consumer = client.create_consumer().await?;

        Ok(Box::new(RabbitMqSession { client, consumer }))
    }
}

pub struct RabbitMqSession {
    client: RabbitMqClient,
    consumer: Consumer,
}

#[async_trait]
impl QueueSession for RabbitMqSession {
    async fn consume(
        &mut self,
        processor: &JobProcessor,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<SessionEnd, Error> {
        loop {
            tokio::select! {
                _ = shutdown.changed() => return Ok(SessionEnd::Shutdown),
                delivery = self.consumer.next() => match delivery {
                    Some(Ok(delivery)) => {
                        let acker = BrokerDelivery::new(&self.client, delivery.delivery_tag);
                        processor.handle_delivery(&delivery.data, &acker).await;
                    }
                    Some(Err(e)) => return Err(anyhow!("Consumer stream failed: {}", e)),
                    None => return Ok(SessionEnd::ConnectionLost),
                },
            }
        }
    }

    async fn close(self: Box<Self>) -> Result<(), Error> {
        self.client.close().await
    }
}
