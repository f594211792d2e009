// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use fabstir_placeholder_node::rate_limit::{
    ClientKey, InMemoryRateLimitStore, RateLimitConfig, RateLimiter,
};
use std::sync::Arc;
use std::time::Duration;

fn limiter(limit: u32, window_secs: u64) -> RateLimiter {
    RateLimiter::new(
        Arc::new(InMemoryRateLimitStore::new()),
        RateLimitConfig {
            limit,
            window: Duration::from_secs(window_secs),
            ..RateLimitConfig::default()
        },
    )
}

fn start() -> DateTime<Utc> {
    Utc.timestamp_millis_opt(1_700_000_000_000).unwrap()
}

#[tokio::test]
async fn test_quota_then_denial() {
    let limiter = limiter(10, 600);
    let key = ClientKey::new("203.0.113.1");
    let t0 = start();

    for i in 0..10 {
        let decision = limiter.check(&key, t0 + ChronoDuration::seconds(i)).await;
        assert!(decision.allowed, "request {} should be admitted", i);
        assert_eq!(decision.remaining, 9 - i as u32);
        assert!(!decision.degraded);
    }

    let denied = limiter.check(&key, t0 + ChronoDuration::seconds(10)).await;
    assert!(!denied.allowed);
    assert_eq!(denied.remaining, 0);
    assert_eq!(denied.reset_at, t0 + ChronoDuration::seconds(600));
    assert_eq!(denied.retry_after(t0 + ChronoDuration::seconds(10)), 590);
}

#[tokio::test]
async fn test_remaining_never_increases_within_window() {
    let limiter = limiter(4, 60);
    let key = ClientKey::new("a");
    let t0 = start();

    let mut last = u32::MAX;
    for i in 0..8 {
        let decision = limiter.check(&key, t0 + ChronoDuration::seconds(i)).await;
        assert!(decision.remaining <= last);
        last = decision.remaining;
    }
    assert_eq!(last, 0);
}

#[tokio::test]
async fn test_window_slides_one_slot_at_a_time() {
    let limiter = limiter(2, 60);
    let key = ClientKey::new("a");
    let t0 = start();

    assert!(limiter.check(&key, t0).await.allowed);
    assert!(limiter.check(&key, t0 + ChronoDuration::seconds(30)).await.allowed);
    assert!(!limiter.check(&key, t0 + ChronoDuration::seconds(59)).await.allowed);

    // The first request leaves the window; only its slot frees up
    assert!(limiter.check(&key, t0 + ChronoDuration::seconds(60)).await.allowed);
    let denied = limiter.check(&key, t0 + ChronoDuration::seconds(61)).await;
    assert!(!denied.allowed);
    assert_eq!(denied.reset_at, t0 + ChronoDuration::seconds(90));
}

#[tokio::test]
async fn test_denied_checks_do_not_extend_the_window() {
    let limiter = limiter(1, 60);
    let key = ClientKey::new("a");
    let t0 = start();

    assert!(limiter.check(&key, t0).await.allowed);
    for i in 1..20 {
        assert!(!limiter.check(&key, t0 + ChronoDuration::seconds(i)).await.allowed);
    }
    assert!(limiter.check(&key, t0 + ChronoDuration::seconds(60)).await.allowed);
}

#[tokio::test]
async fn test_keys_are_independent() {
    let limiter = limiter(1, 60);
    let t0 = start();

    assert!(limiter.check(&ClientKey::new("a"), t0).await.allowed);
    assert!(!limiter.check(&ClientKey::new("a"), t0).await.allowed);
    assert!(limiter.check(&ClientKey::new("b"), t0).await.allowed);
    assert!(limiter.check(&ClientKey::unknown(), t0).await.allowed);
}

#[tokio::test]
async fn test_limiters_sharing_a_store_share_quota() {
    let store = Arc::new(InMemoryRateLimitStore::new());
    let config = RateLimitConfig {
        limit: 2,
        ..RateLimitConfig::default()
    };
    let gateway = RateLimiter::new(store.clone(), config.clone());
    let action = RateLimiter::new(store, config);
    let key = ClientKey::new("a");
    let t0 = start();

    assert!(gateway.check(&key, t0).await.allowed);
    assert!(action.check(&key, t0).await.allowed);
    assert!(!gateway.check(&key, t0).await.allowed);
}

#[tokio::test]
async fn test_eviction_drops_idle_keys() {
    let store = Arc::new(InMemoryRateLimitStore::new());
    let limiter = RateLimiter::new(
        store.clone(),
        RateLimitConfig {
            limit: 5,
            window: Duration::from_secs(60),
            ..RateLimitConfig::default()
        },
    );
    let t0 = start();

    limiter.check(&ClientKey::new("a"), t0).await;
    limiter
        .check(&ClientKey::new("b"), t0 + ChronoDuration::seconds(50))
        .await;
    assert_eq!(store.tracked_keys().await, 2);

    let now = t0 + ChronoDuration::seconds(61);
    let evicted = store.evict_idle(now.timestamp_millis(), 60_000).await;
    assert_eq!(evicted, 1);
    assert_eq!(store.tracked_keys().await, 1);
}
