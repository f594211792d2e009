// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Gateway rate limiting for everything nested under `/api`
//!
//! The check runs before the handler sees the request. Admitted requests
//! carry a [`GatewayAdmission`] extension so the handler does not consult
//! the limiter a second time.

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use std::net::SocketAddr;
use tracing::debug;

use super::errors::{apply_rate_limit_headers, ApiError};
use super::http_server::AppState;
use crate::rate_limit::{ClientKey, RateDecision};

/// Limiter decision already taken for this request
#[derive(Debug, Clone)]
pub struct GatewayAdmission {
    pub key: ClientKey,
    pub decision: RateDecision,
}

pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let key = state.key_resolver.resolve(request.headers(), peer);
    let decision = state.pipeline.limiter().check(&key, Utc::now()).await;

    if !decision.allowed {
        debug!(
            "Gateway rejected {} {} for {}",
            request.method(),
            request.uri().path(),
            key
        );
        let error = if decision.degraded {
            ApiError::ServiceUnavailable(
                "Rate limiting is temporarily unavailable, please retry shortly".to_string(),
            )
        } else {
            ApiError::RateLimitExceeded { decision }
        };
        return error.into_response();
    }

    request.extensions_mut().insert(GatewayAdmission {
        key,
        decision: decision.clone(),
    });

    let mut response = next.run(request).await;
    apply_rate_limit_headers(response.headers_mut(), &decision);
    response
}
