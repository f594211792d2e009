// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use async_trait::async_trait;
use axum::http::StatusCode;
use fabstir_placeholder_node::rate_limit::{
    RateLimitConfig, RateLimitStore, StoreError, StoreFailurePolicy, WindowOutcome,
};
use std::sync::Arc;
use std::time::Duration;
use tower::util::ServiceExt;

use super::helpers::{app, app_with_store, header_str, json_body, png_bytes, upload, Part};

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

fn one_image() -> [Part<'static>; 1] {
    [Part::image("a.png", png_bytes())]
}

#[tokio::test]
async fn test_eleventh_request_gets_429() {
    let app = app(10);

    for i in 0..10 {
        let response = app
            .clone()
            .oneshot(upload("/actions/generate-placeholder", "198.51.100.1", &one_image()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "request {}", i);
    }

    let response = app
        .oneshot(upload("/actions/generate-placeholder", "198.51.100.1", &one_image()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    let retry_after: u64 = header_str(&response, "retry-after").unwrap().parse().unwrap();
    assert!(retry_after > 590 && retry_after <= 600);
    assert_eq!(header_str(&response, "x-ratelimit-limit"), Some("10"));
    assert_eq!(header_str(&response, "x-ratelimit-remaining"), Some("0"));
    assert!(header_str(&response, "x-ratelimit-reset").is_some());

    let body = json_body(response).await;
    assert_eq!(body["errorType"], "rate_limit_exceeded");
    let message = body["message"].as_str().unwrap();
    assert!(message.starts_with("Rate limit exceeded. Try again in "));
    assert!(message.ends_with("m.") || message.ends_with("s."));
    assert_eq!(body["details"]["remaining"], 0);
}

#[tokio::test]
async fn test_callers_have_separate_buckets() {
    let app = app(1);

    let first = app
        .clone()
        .oneshot(upload("/api/placeholders", "198.51.100.1", &one_image()))
        .await
        .unwrap();
    let other = app
        .clone()
        .oneshot(upload("/api/placeholders", "198.51.100.2", &one_image()))
        .await
        .unwrap();
    let again = app
        .oneshot(upload("/api/placeholders", "198.51.100.1", &one_image()))
        .await
        .unwrap();

    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(other.status(), StatusCode::OK);
    assert_eq!(again.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_fail_closed_outage_returns_503_on_both_routes() {
    let app = app_with_store(
        Arc::new(DownStore),
        RateLimitConfig {
            failure_policy: StoreFailurePolicy::FailClosed,
            store_timeout: Duration::from_millis(50),
            ..RateLimitConfig::default()
        },
    );

    for uri in ["/api/placeholders", "/actions/generate-placeholder"] {
        let response = app
            .clone()
            .oneshot(upload(uri, "198.51.100.1", &one_image()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE, "{}", uri);
        assert!(response.headers().get("retry-after").is_none());
        let body = json_body(response).await;
        assert_eq!(body["errorType"], "service_unavailable");
    }
}

#[tokio::test]
async fn test_fail_open_outage_serves_requests() {
    let app = app_with_store(
        Arc::new(DownStore),
        RateLimitConfig {
            limit: 1,
            store_timeout: Duration::from_millis(50),
            ..RateLimitConfig::default()
        },
    );

    for _ in 0..3 {
        let response = app
            .clone()
            .oneshot(upload("/api/placeholders", "198.51.100.1", &one_image()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
