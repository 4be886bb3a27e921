//! Long-running subscriber for the gateway's rejection notifications.
//!
//! Exits non-zero when the subscription fails.

use anyhow::{Context, Result};
use geo_gateway::{
    config::ConsumerConfig,
    services::rejection_consumer::{RedisStreamSource, run_consumer},
    telemetry::init_tracing,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cfg = ConsumerConfig::from_env_and_args()?;
    init_tracing(&cfg.log_level)?;

    let mut source = RedisStreamSource::connect(&cfg)
        .await
        .with_context(|| format!("subscribing to `{}` at {}", cfg.stream, cfg.redis_url))?;
    info!(
        consumer = %cfg.consumer_name,
        "Listening for messages on {}...",
        source.subscription()
    );

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            tokio::signal::ctrl_c().await.ok();
            info!("received shutdown signal, cancelling subscription");
            shutdown.cancel();
        }
    });

    match run_consumer(&mut source, cfg.poll_interval, shutdown.clone()).await {
        Ok(processed) => {
            info!(processed, "subscriber stopped");
            Ok(())
        }
        Err(err) => {
            shutdown.cancel();
            error!(error = %err, "Subscriber failed");
            Err(err).context("rejection subscription failed")
        }
    }
}
