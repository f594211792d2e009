// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use async_trait::async_trait;
use chrono::Utc;
use fabstir_placeholder_node::pipeline::{
    BatchRequest, FanOutPipeline, ImageInput, PipelineConfig, PipelineError,
};
use fabstir_placeholder_node::placeholder::{Placeholder, PlaceholderError, PlaceholderGenerator};
use fabstir_placeholder_node::rate_limit::{
    ClientKey, InMemoryRateLimitStore, RateLimitConfig, RateLimitStore, RateLimiter, StoreError,
    StoreFailurePolicy, WindowOutcome,
};
use image::ImageFormat;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct CountingGenerator {
    calls: AtomicUsize,
}

impl PlaceholderGenerator for CountingGenerator {
    fn generate(&self, _bytes: &[u8]) -> Result<Placeholder, PlaceholderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Placeholder {
            data_uri: "data:image/png;base64,AA==".to_string(),
            width: 1,
            height: 1,
            source_format: ImageFormat::Png,
        })
    }
}

struct DownStore;

#[async_trait]
impl RateLimitStore for DownStore {
    async fn record(&self, _: &str, _: i64, _: u64, _: u32) -> Result<WindowOutcome, StoreError> {
        Err(StoreError::Connection("connection refused".to_string()))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Err(StoreError::Connection("connection refused".to_string()))
    }

    fn name(&self) -> &'static str {
        "down"
    }
}

fn limited(limit: u32) -> Arc<RateLimiter> {
    Arc::new(RateLimiter::new(
        Arc::new(InMemoryRateLimitStore::new()),
        RateLimitConfig {
            limit,
            ..RateLimitConfig::default()
        },
    ))
}

fn images(n: usize) -> Vec<ImageInput> {
    (0..n)
        .map(|_| ImageInput::new(vec![1u8, 2, 3]).with_content_type("image/png"))
        .collect()
}

fn key() -> ClientKey {
    ClientKey::new("198.51.100.7")
}

#[tokio::test]
async fn test_denied_batch_starts_no_generation() {
    let generator = Arc::new(CountingGenerator::default());
    let pipeline = FanOutPipeline::new(limited(1), generator.clone(), PipelineConfig::default());

    let first = pipeline.run(BatchRequest::new(key(), images(3))).await.unwrap();
    assert_eq!(first.decision.remaining, 0);
    assert_eq!(generator.calls.load(Ordering::SeqCst), 3);

    let second = pipeline.run(BatchRequest::new(key(), images(3))).await;
    match second {
        Err(PipelineError::RateLimited(decision)) => {
            assert!(!decision.allowed);
            assert!(decision.retry_after(Utc::now()) > 0);
        }
        other => panic!("expected rate limit, got {:?}", other.map(|o| o.items.len())),
    }
    assert_eq!(generator.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_one_check_per_batch_regardless_of_size() {
    let generator = Arc::new(CountingGenerator::default());
    let pipeline = FanOutPipeline::new(limited(2), generator, PipelineConfig::default());

    let outcome = pipeline.run(BatchRequest::new(key(), images(10))).await.unwrap();
    assert_eq!(outcome.decision.remaining, 1);
    assert_eq!(outcome.succeeded(), 10);
}

#[tokio::test]
async fn test_invalid_batch_is_not_counted() {
    let generator = Arc::new(CountingGenerator::default());
    let limiter = limited(1);
    let pipeline = FanOutPipeline::new(limiter.clone(), generator.clone(), PipelineConfig::default());

    let empty = pipeline.run(BatchRequest::new(key(), vec![])).await;
    assert!(matches!(empty, Err(PipelineError::Validation(_))));

    let wrong_type = vec![ImageInput::new(vec![1u8]).with_content_type("text/html")];
    let rejected = pipeline.run(BatchRequest::new(key(), wrong_type)).await;
    match rejected {
        Err(PipelineError::Validation(errors)) => assert_eq!(errors[0].field, "imageFiles[0]"),
        other => panic!("expected validation error, got {:?}", other.map(|o| o.items.len())),
    }

    // The single slot is still free
    assert!(pipeline.run(BatchRequest::new(key(), images(1))).await.is_ok());
    assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_run_admitted_reuses_upstream_decision() {
    let generator = Arc::new(CountingGenerator::default());
    let limiter = limited(2);
    let pipeline = FanOutPipeline::new(limiter.clone(), generator, PipelineConfig::default());

    let decision = limiter.check(&key(), Utc::now()).await;
    let outcome = pipeline
        .run_admitted(BatchRequest::new(key(), images(2)), decision.clone())
        .await
        .unwrap();
    assert_eq!(outcome.decision, decision);

    // Only the upstream check was counted
    let next = limiter.check(&key(), Utc::now()).await;
    assert!(next.allowed);
    assert_eq!(next.remaining, 0);

    let denied = limiter.check(&key(), Utc::now()).await;
    let result = pipeline
        .run_admitted(BatchRequest::new(key(), images(1)), denied)
        .await;
    assert!(matches!(result, Err(PipelineError::RateLimited(_))));
}

#[tokio::test]
async fn test_fail_closed_outage_is_distinct_from_rate_limit() {
    let generator = Arc::new(CountingGenerator::default());
    let limiter = Arc::new(RateLimiter::new(
        Arc::new(DownStore),
        RateLimitConfig {
            failure_policy: StoreFailurePolicy::FailClosed,
            store_timeout: Duration::from_millis(50),
            ..RateLimitConfig::default()
        },
    ));
    let pipeline = FanOutPipeline::new(limiter, generator.clone(), PipelineConfig::default());

    let result = pipeline.run(BatchRequest::new(key(), images(2))).await;
    assert!(matches!(result, Err(PipelineError::StoreUnavailable(_))));
    assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_fail_open_outage_still_generates() {
    let generator = Arc::new(CountingGenerator::default());
    let limiter = Arc::new(RateLimiter::new(Arc::new(DownStore), RateLimitConfig::default()));
    let pipeline = FanOutPipeline::new(limiter, generator, PipelineConfig::default());

    let outcome = pipeline.run(BatchRequest::new(key(), images(2))).await.unwrap();
    assert!(outcome.decision.degraded);
    assert_eq!(outcome.succeeded(), 2);
}
