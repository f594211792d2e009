// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    extract::{DefaultBodyLimit, State},
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use super::middleware::rate_limit_middleware;
use super::placeholders::generate_placeholders_handler;
use crate::pipeline::FanOutPipeline;
use crate::rate_limit::ClientKeyResolver;

/// Slack on top of the image bytes for multipart framing and form fields
const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<FanOutPipeline>,
    pub key_resolver: Arc<dyn ClientKeyResolver>,
}

impl AppState {
    pub fn new(pipeline: Arc<FanOutPipeline>, key_resolver: Arc<dyn ClientKeyResolver>) -> Self {
        Self {
            pipeline,
            key_resolver,
        }
    }

    /// Largest request body the placeholder routes accept
    pub fn body_limit(&self) -> usize {
        let limits = &self.pipeline.config().limits;
        limits
            .max_images
            .saturating_mul(limits.max_image_bytes)
            .saturating_add(MULTIPART_OVERHEAD_BYTES)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub store: String,
    pub store_reachable: bool,
    pub key_strategy: String,
}

/// Build the router. `/api/*` sits behind the gateway limiter; the action
/// route performs its own check inside the pipeline.
pub fn create_app(state: AppState) -> Router {
    let gateway = Router::new()
        .route("/placeholders", post(generate_placeholders_handler))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ));

    Router::new()
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .route(
            "/actions/generate-placeholder",
            post(generate_placeholders_handler),
        )
        .nest("/api", gateway)
        .layer(DefaultBodyLimit::max(state.body_limit()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve until `shutdown` is cancelled, then drain in-flight requests
pub async fn start_server(
    addr: SocketAddr,
    state: AppState,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let app = create_app(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("API server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move { shutdown.cancelled().await })
    .await?;

    info!("API server stopped");
    Ok(())
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let limiter = state.pipeline.limiter();
    let store = limiter.store();
    let store_reachable =
        match tokio::time::timeout(limiter.config().store_timeout, store.ping()).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!("Health check: rate limit store unreachable: {}", e);
                false
            }
            Err(_) => {
                warn!("Health check: rate limit store ping timed out");
                false
            }
        };

    Json(HealthResponse {
        status: if store_reachable { "ok" } else { "degraded" }.to_string(),
        version: crate::version::VERSION_NUMBER.to_string(),
        store: store.name().to_string(),
        store_reachable,
        key_strategy: state.key_resolver.name().to_string(),
    })
}

async fn version_handler() -> impl IntoResponse {
    Json(crate::version::get_version_info())
}
