// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Download source images by URL (used by the CLI)

use bytes::{Bytes, BytesMut};
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur while fetching a remote image
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Invalid URL '{0}'")]
    InvalidUrl(String),

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Server returned HTTP {0}")]
    Status(u16),

    #[error("Image is too large: more than {max} bytes")]
    TooLarge { max: usize },
}

/// Build the HTTP client used for image downloads
pub fn build_client(timeout: Duration) -> Result<Client, FetchError> {
    Ok(Client::builder()
        .timeout(timeout)
        .user_agent(concat!("fabstir-placeholder/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// Download `url`, refusing bodies larger than `max_bytes`
pub async fn fetch_image(client: &Client, url: &str, max_bytes: usize) -> Result<Bytes, FetchError> {
    let parsed = reqwest::Url::parse(url).map_err(|_| FetchError::InvalidUrl(url.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(FetchError::InvalidUrl(url.to_string()));
    }

    let mut response = client.get(parsed).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status(status.as_u16()));
    }

    if let Some(length) = response.content_length() {
        if length as usize > max_bytes {
            return Err(FetchError::TooLarge { max: max_bytes });
        }
    }

    let mut body = BytesMut::new();
    while let Some(chunk) = response.chunk().await? {
        if body.len() + chunk.len() > max_bytes {
            return Err(FetchError::TooLarge { max: max_bytes });
        }
        body.extend_from_slice(&chunk);
    }

    debug!("Fetched {} bytes from {}", body.len(), url);
    Ok(body.freeze())
}
