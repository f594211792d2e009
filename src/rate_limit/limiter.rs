// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Sliding-window rate limiter shared by every enforcement point

use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

use super::store::RateLimitStore;
use super::types::{
    to_chrono, ClientKey, RateDecision, RateLimitConfig, StoreError, StoreFailurePolicy,
};

/// Per-key sliding-window rate limiter
///
/// A request at time T is counted against `(T - window, T]`; at most `limit`
/// admitted requests ever share one window. Construct one instance and hand
/// the same `Arc` to the gateway middleware and to the placeholder pipeline.
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>, config: RateLimitConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn RateLimitStore> {
        &self.store
    }

    /// Check and count one request for `key`.
    ///
    /// Not idempotent: every call is recorded exactly once, so a logical
    /// request must be checked only once. Never fails; a store outage is
    /// answered according to the configured failure policy.
    pub async fn check(&self, key: &ClientKey, now: DateTime<Utc>) -> RateDecision {
        match self.record(key, now).await {
            Ok(decision) => decision,
            Err(e) => self.degraded(key, now, e),
        }
    }

    async fn record(&self, key: &ClientKey, now: DateTime<Utc>) -> Result<RateDecision, StoreError> {
        let store_key = self.config.store_key(key);
        let outcome = tokio::time::timeout(
            self.config.store_timeout,
            self.store.record(
                &store_key,
                now.timestamp_millis(),
                self.config.window_ms(),
                self.config.limit,
            ),
        )
        .await
        .map_err(|_| StoreError::Timeout(self.config.store_timeout))??;

        let window_opens = Utc
            .timestamp_millis_opt(outcome.oldest_ms)
            .single()
            .unwrap_or(now);
        let reset_at = (window_opens + to_chrono(self.config.window)).max(now);
        let remaining = self.config.limit.saturating_sub(outcome.count);

        if outcome.admitted {
            debug!(
                "Rate limit check passed for {}: {}/{} used",
                key, outcome.count, self.config.limit
            );
        } else {
            warn!(
                "Rate limit exceeded for {} ({} rejected in window), resets at {}",
                key, outcome.rejected, reset_at
            );
        }

        Ok(RateDecision {
            allowed: outcome.admitted,
            limit: self.config.limit,
            remaining: if outcome.admitted { remaining } else { 0 },
            reset_at,
            degraded: false,
        })
    }

    fn degraded(&self, key: &ClientKey, now: DateTime<Utc>, error: StoreError) -> RateDecision {
        match self.config.failure_policy {
            StoreFailurePolicy::FailOpen => {
                warn!(
                    "Rate limit store '{}' unavailable, admitting {}: {}",
                    self.store.name(),
                    key,
                    error
                );
                RateDecision::fail_open(self.config.limit, now)
            }
            StoreFailurePolicy::FailClosed => {
                warn!(
                    "Rate limit store '{}' unavailable, denying {}: {}",
                    self.store.name(),
                    key,
                    error
                );
                RateDecision::fail_closed(self.config.limit, now, self.config.window)
            }
        }
    }
}
