// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Core types for placeholder rate limiting

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Key under which all anonymous callers are bucketed
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Identity used to bucket rate-limit accounting (usually a caller address)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientKey(String);

impl ClientKey {
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        if key.trim().is_empty() {
            return Self::unknown();
        }
        Self(key.trim().to_string())
    }

    /// Shared bucket for callers whose identity could not be derived
    pub fn unknown() -> Self {
        Self(UNKNOWN_CLIENT.to_string())
    }

    pub fn is_unknown(&self) -> bool {
        self.0 == UNKNOWN_CLIENT
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the limiter answers when its backing store cannot be reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreFailurePolicy {
    /// Admit the request and log the outage
    #[default]
    FailOpen,
    /// Deny the request; callers surface it as a service outage
    FailClosed,
}

impl FromStr for StoreFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "open" | "fail_open" | "fail-open" => Ok(Self::FailOpen),
            "closed" | "fail_closed" | "fail-closed" => Ok(Self::FailClosed),
            other => Err(format!(
                "invalid failure policy '{}'; expected 'open' or 'closed'",
                other
            )),
        }
    }
}

/// Rate limit configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum admitted requests per key inside one window
    pub limit: u32,
    /// Sliding window length
    pub window: Duration,
    /// Prefix for every store key
    pub prefix: String,
    /// Upper bound on one store round-trip
    pub store_timeout: Duration,
    pub failure_policy: StoreFailurePolicy,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            limit: 10,
            window: Duration::from_secs(600),
            prefix: "image-generation-rate-limit".to_string(),
            store_timeout: Duration::from_secs(5),
            failure_policy: StoreFailurePolicy::FailOpen,
        }
    }
}

impl RateLimitConfig {
    /// Full store key for a client
    pub fn store_key(&self, key: &ClientKey) -> String {
        format!("{}:{}", self.prefix, key.as_str())
    }

    pub fn window_ms(&self) -> u64 {
        self.window.as_millis() as u64
    }
}

/// Result of a limiter check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Earliest instant at which a new slot frees up (never before the check time)
    pub reset_at: DateTime<Utc>,
    /// Set when the decision came from the failure policy, not the store
    pub degraded: bool,
}

impl RateDecision {
    /// Seconds until `reset_at`, rounded up
    pub fn retry_after(&self, now: DateTime<Utc>) -> u64 {
        let millis = (self.reset_at - now).num_milliseconds();
        if millis <= 0 {
            0
        } else {
            ((millis as u64) + 999) / 1000
        }
    }

    pub(crate) fn fail_open(limit: u32, now: DateTime<Utc>) -> Self {
        Self {
            allowed: true,
            limit,
            remaining: limit,
            reset_at: now,
            degraded: true,
        }
    }

    pub(crate) fn fail_closed(limit: u32, now: DateTime<Utc>, window: Duration) -> Self {
        Self {
            allowed: false,
            limit,
            remaining: 0,
            reset_at: now + to_chrono(window),
            degraded: true,
        }
    }
}

/// Raw result of one atomic check-and-increment in a store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowOutcome {
    /// Whether this request took a slot
    pub admitted: bool,
    /// Admitted requests inside the window, this one included
    pub count: u32,
    /// Timestamp (ms) of the oldest admitted request still in the window
    pub oldest_ms: i64,
    /// Denied checks recorded for the key while its state is live
    pub rejected: u64,
}

/// Errors from a rate limit store backend
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Rate limit store connection failed: {0}")]
    Connection(String),

    #[error("Rate limit store command failed: {0}")]
    Command(String),

    #[error("Rate limit store timed out after {0:?}")]
    Timeout(Duration),
}

impl From<redis::RedisError> for StoreError {
    fn from(e: redis::RedisError) -> Self {
        if e.is_connection_refusal() || e.is_connection_dropped() || e.is_io_error() {
            StoreError::Connection(e.to_string())
        } else {
            StoreError::Command(e.to_string())
        }
    }
}

pub(crate) fn to_chrono(duration: Duration) -> ChronoDuration {
    ChronoDuration::milliseconds(duration.as_millis() as i64)
}
