// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{anyhow, Result};
use clap::Args;
use futures::future::join_all;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::placeholder::{
    fetch::build_client, fetch_image, format_to_mime, BlurPlaceholderGenerator,
    PlaceholderConfig, PlaceholderGenerator,
};

/// Arguments for the generate command
#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Image files, processed in the order given
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Longest edge of the preview in pixels (4-64)
    #[arg(long, default_value_t = 4)]
    pub size: u32,

    /// Print one JSON document instead of text lines
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the fetch command
#[derive(Args, Debug)]
pub struct FetchArgs {
    /// http(s) image URLs, processed in the order given
    #[arg(required = true)]
    pub urls: Vec<String>,

    #[arg(long, default_value_t = 4)]
    pub size: u32,

    /// Refuse downloads larger than this
    #[arg(long, default_value_t = 10 * 1024 * 1024)]
    pub max_bytes: usize,

    /// Per-download timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,

    #[arg(long)]
    pub json: bool,
}

/// One line of CLI output
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SourceResult {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    /// MIME type detected from the source bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SourceResult {
    fn failed(source: String, error: tokio::task::JoinError) -> Self {
        Self {
            source,
            placeholder: None,
            source_type: None,
            error: Some(format!("generation task failed: {}", error)),
        }
    }

    fn from_bytes(
        source: String,
        bytes: Result<Vec<u8>, String>,
        generator: &dyn PlaceholderGenerator,
    ) -> Self {
        match bytes.and_then(|b| generator.generate(&b).map_err(|e| e.to_string())) {
            Ok(placeholder) => Self {
                source,
                source_type: Some(format_to_mime(placeholder.source_format).to_string()),
                placeholder: Some(placeholder.data_uri),
                error: None,
            },
            Err(error) => Self {
                source,
                placeholder: None,
                source_type: None,
                error: Some(error),
            },
        }
    }
}

/// Read and process every path concurrently, keeping input order
pub async fn generate_files(paths: &[PathBuf], size: u32) -> Vec<SourceResult> {
    let generator = Arc::new(BlurPlaceholderGenerator::new(PlaceholderConfig { size }));

    let tasks = paths.iter().map(|path| {
        let generator = Arc::clone(&generator);
        let path = path.clone();
        async move {
            let source = path.display().to_string();
            let bytes = tokio::fs::read(&path).await.map_err(|e| e.to_string());
            let joined = tokio::task::spawn_blocking(move || {
                SourceResult::from_bytes(source, bytes, generator.as_ref())
            })
            .await;
            joined.unwrap_or_else(|e| SourceResult::failed(path.display().to_string(), e))
        }
    });

    join_all(tasks).await
}

/// Download and process every URL concurrently, keeping input order
pub async fn fetch_urls(
    urls: &[String],
    size: u32,
    max_bytes: usize,
    timeout: Duration,
) -> Result<Vec<SourceResult>> {
    let client = build_client(timeout)?;
    let generator = Arc::new(BlurPlaceholderGenerator::new(PlaceholderConfig { size }));

    let tasks = urls.iter().map(|url| {
        let generator = Arc::clone(&generator);
        let client = &client;
        async move {
            let bytes = fetch_image(client, url, max_bytes)
                .await
                .map(|b| b.to_vec())
                .map_err(|e| e.to_string());
            let source = url.clone();
            tokio::task::spawn_blocking(move || {
                SourceResult::from_bytes(source, bytes, generator.as_ref())
            })
            .await
            .unwrap_or_else(|e| SourceResult::failed(url.clone(), e))
        }
    });

    Ok(join_all(tasks).await)
}

pub async fn generate(args: GenerateArgs) -> Result<()> {
    info!("Generating placeholders for {} file(s)", args.paths.len());
    let results = generate_files(&args.paths, args.size).await;
    report(&results, args.json)
}

pub async fn fetch(args: FetchArgs) -> Result<()> {
    info!("Fetching {} image(s)", args.urls.len());
    let results = fetch_urls(
        &args.urls,
        args.size,
        args.max_bytes,
        Duration::from_secs(args.timeout_secs),
    )
    .await?;
    report(&results, args.json)
}

fn report(results: &[SourceResult], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(results)?);
    } else {
        for result in results {
            match (&result.placeholder, &result.error) {
                (Some(uri), _) => println!("{}\t{}", result.source, uri),
                (None, Some(error)) => println!("{}\tERROR: {}", result.source, error),
                (None, None) => {}
            }
        }
    }

    let failed = results.iter().filter(|r| r.error.is_some()).count();
    if failed > 0 {
        warn!("{} of {} source(s) failed", failed, results.len());
        return Err(anyhow!("{} of {} source(s) failed", failed, results.len()));
    }
    Ok(())
}
