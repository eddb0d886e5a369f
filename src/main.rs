use std::sync::Arc;

use anyhow::{Error, Result};
use chat_relay::{
    broadcaster::{BroadcastSettings, Broadcaster},
    clients::{
        chat::HttpChatChannel,
        database::{AuditStore, DatabaseClient, LogOnlyAuditStore},
        game_data::TibiaDataClient,
        media::MediaFetcher,
        rbmq::RabbitMqConnector,
        redis::RedisClient,
    },
    config::Config,
    delivery::{AlertFanoutHandler, DeliveryHandler, SingleRecipientHandler},
    models::job::JobKind,
    processor::{HandlerRegistry, JobProcessor},
    session::ChatSession,
    supervisor::Supervisor,
    tracker::StatusTracker,
};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = Config::load()?;

    tracing_subscriber::registry()
        .with(EnvFilter::new(&config.rust_log))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        warn!("A TLS crypto provider was already installed");
    }

    info!("Configuration validated, starting chat relay");

    let cache = Arc::new(RedisClient::connect(&config).await?);

    let audit_store: Arc<dyn AuditStore> = match DatabaseClient::connect(&config.database_url).await
    {
        Ok(client) => Arc::new(client),
        Err(e) => {
            warn!(error = %e, "Audit store unavailable, outcomes will only be logged");
            Arc::new(LogOnlyAuditStore)
        }
    };

    let session = Arc::new(ChatSession::new(Arc::new(HttpChatChannel::new(&config)?)));
    let delivery = Arc::new(DeliveryHandler::new(session, MediaFetcher::new(&config)?));

    let registry = HandlerRegistry::new()
        .register(
            JobKind::Generic,
            Arc::new(SingleRecipientHandler::new(delivery.clone())),
        )
        .register(
            JobKind::AlertFanout,
            Arc::new(AlertFanoutHandler::new(
                delivery.clone(),
                config.alert_recipients(),
            )),
        );

    let processor = Arc::new(JobProcessor::new(registry, StatusTracker::new(audit_store)));

    let supervisor = Supervisor::new(
        RabbitMqConnector::new(config.clone()),
        processor,
        config.reconnect_policy(),
    );

    let broadcaster = Broadcaster::new(
        Arc::new(TibiaDataClient::new(&config)?),
        cache,
        delivery,
        BroadcastSettings::from_config(&config),
        config.broadcast_schedule()?,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let consumer_task = tokio::spawn({
        let shutdown = shutdown_rx.clone();
        async move { supervisor.run(shutdown).await }
    });
    let broadcaster_task = tokio::spawn(async move { broadcaster.run(shutdown_rx).await });

    wait_for_shutdown_signal().await;
    info!("Shutdown signal received, stopping consumers");

    let _ = shutdown_tx.send(true);
    let (consumer, broadcaster) = tokio::join!(consumer_task, broadcaster_task);

    if let Err(e) = consumer {
        warn!(error = %e, "Queue consumer task ended abnormally");
    }
    if let Err(e) = broadcaster {
        warn!(error = %e, "Broadcaster task ended abnormally");
    }

    info!("Chat relay stopped");

    Ok(())
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => {}
                    _ = tokio::signal::ctrl_c() => {}
                }
            }
            Err(e) => {
                warn!(error = %e, "Cannot listen for SIGTERM, waiting for Ctrl-C only");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.ok();
    }
}
