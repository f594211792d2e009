// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{anyhow, Result};
use chrono::Utc;
use fabstir_placeholder_node::{
    api::{start_server, AppState},
    config::NodeConfig,
    pipeline::FanOutPipeline,
    placeholder::BlurPlaceholderGenerator,
    rate_limit::{InMemoryRateLimitStore, RateLimitStore, RateLimiter, RedisRateLimitStore},
    version,
};
use std::{env, sync::Arc, time::Duration};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    info!("Starting {}", version::get_version_string());

    let config = NodeConfig::from_env();
    config.validate().map_err(|e| anyhow!(e))?;
    let addr = config.listen_addr().map_err(|e| anyhow!(e))?;

    let shutdown = CancellationToken::new();
    let rate_limit = config.rate_limit();

    let store: Arc<dyn RateLimitStore> = match &config.redis_url {
        Some(url) => {
            let store = RedisRateLimitStore::connect(url)
                .await
                .map_err(|e| anyhow!("Failed to connect rate limit store: {}", e))?;
            info!("Rate limit store: redis");
            Arc::new(store)
        }
        None => {
            warn!("REDIS_URL not set; rate limits are tracked in memory and not shared between instances");
            let store = Arc::new(InMemoryRateLimitStore::new());
            spawn_eviction(Arc::clone(&store), rate_limit.window, shutdown.clone());
            store
        }
    };

    info!(
        "Rate limit: {} requests per {}s, policy {:?}, key strategy {:?}",
        rate_limit.limit,
        rate_limit.window.as_secs(),
        rate_limit.failure_policy,
        config.client_key_strategy
    );

    let limiter = Arc::new(RateLimiter::new(store, rate_limit));
    let generator = Arc::new(BlurPlaceholderGenerator::new(config.placeholder()));
    let pipeline = Arc::new(FanOutPipeline::new(limiter, generator, config.pipeline()));
    let state = AppState::new(pipeline, Arc::from(config.client_key_strategy.resolver()));

    let server = tokio::spawn(start_server(addr, state, shutdown.clone()));

    shutdown_signal().await;
    shutdown.cancel();

    match server.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("Server error: {}", e),
        Err(e) => error!("Server task failed: {}", e),
    }

    info!("Placeholder node shutdown complete");
    Ok(())
}

/// Drop idle in-memory buckets once per window
fn spawn_eviction(store: Arc<InMemoryRateLimitStore>, window: Duration, shutdown: CancellationToken) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(window);
        interval.tick().await;
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    let evicted = store
                        .evict_idle(Utc::now().timestamp_millis(), window.as_millis() as u64)
                        .await;
                    if evicted > 0 {
                        info!("Evicted {} idle rate limit bucket(s)", evicted);
                    }
                }
            }
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
