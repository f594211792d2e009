// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Placeholder generation endpoint handler

use axum::{
    extract::{ConnectInfo, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    Extension, Json,
};
use axum_extra::extract::Multipart;
use std::net::SocketAddr;
use tracing::{debug, warn};

use super::request::read_image_parts;
use super::response::GeneratePlaceholdersResponse;
use crate::api::errors::{apply_rate_limit_headers, ApiError};
use crate::api::http_server::AppState;
use crate::api::middleware::GatewayAdmission;
use crate::pipeline::BatchRequest;

/// POST /api/placeholders and POST /actions/generate-placeholder
///
/// Pipeline:
/// 1. Read `imageFiles` parts from the multipart body
/// 2. Reuse the gateway decision if present, otherwise resolve the caller
///    and let the pipeline check the limiter
/// 3. Validate and generate every placeholder concurrently
/// 4. Return results in upload order with rate limit headers
pub async fn generate_placeholders_handler(
    State(state): State<AppState>,
    admission: Option<Extension<GatewayAdmission>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let images = read_image_parts(multipart).await?;
    debug!("Placeholder request with {} image part(s)", images.len());

    let result = match admission {
        Some(Extension(admission)) => {
            let batch = BatchRequest::new(admission.key, images);
            state.pipeline.run_admitted(batch, admission.decision).await
        }
        None => {
            let peer = connect_info.map(|ConnectInfo(addr)| addr);
            let key = state.key_resolver.resolve(&headers, peer);
            state.pipeline.run(BatchRequest::new(key, images)).await
        }
    };

    let outcome = result.map_err(|e| {
        warn!("Placeholder request rejected: {}", e);
        ApiError::from(e)
    })?;

    let mut response = Json(GeneratePlaceholdersResponse::from(&outcome)).into_response();
    apply_rate_limit_headers(response.headers_mut(), &outcome.decision);
    Ok(response)
}
