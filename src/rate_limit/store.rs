// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Rate limit storage backends
//!
//! Both backends keep a sliding log of admitted request timestamps per key
//! and perform the prune / count / admit sequence as one atomic step:
//! - Redis (or Dragonfly) through a Lua script, shared by every node instance
//! - In-memory behind a mutex, for development and single-instance deployments

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use super::types::{StoreError, WindowOutcome};

/// Atomic sliding-log check-and-increment.
///
/// KEYS[1] log of admitted timestamps, KEYS[2] rejected counter.
/// ARGV: now_ms, window_ms, limit, unique member.
/// Returns {admitted, count, oldest_ms, rejected}.
const SLIDING_LOG_SCRIPT: &str = r#"
local log_key = KEYS[1]
local rejected_key = KEYS[2]
local now = tonumber(ARGV[1])
local window = tonumber(ARGV[2])
local limit = tonumber(ARGV[3])

redis.call('ZREMRANGEBYSCORE', log_key, '-inf', now - window)
local count = redis.call('ZCARD', log_key)
local admitted = 0
if count < limit then
  redis.call('ZADD', log_key, now, ARGV[4])
  count = count + 1
  admitted = 1
end

local rejected = tonumber(redis.call('GET', rejected_key) or '0')
if admitted == 0 then
  rejected = redis.call('INCR', rejected_key)
end
redis.call('PEXPIRE', rejected_key, window)

local oldest = now
local first = redis.call('ZRANGE', log_key, 0, 0, 'WITHSCORES')
if first[2] then
  oldest = tonumber(first[2])
end
if count > 0 then
  redis.call('PEXPIRE', log_key, window)
end
return {admitted, count, oldest, rejected}
"#;

/// Trait for rate limit storage backends
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Record one check for `key` and report the window state.
    ///
    /// Must be atomic with respect to concurrent calls for the same key,
    /// across every process sharing the store.
    async fn record(
        &self,
        key: &str,
        now_ms: i64,
        window_ms: u64,
        limit: u32,
    ) -> Result<WindowOutcome, StoreError>;

    /// Liveness probe
    async fn ping(&self) -> Result<(), StoreError>;

    /// Backend name for logs and health output
    fn name(&self) -> &'static str;
}

/// Redis / Dragonfly storage backend
pub struct RedisRateLimitStore {
    connection_manager: ConnectionManager,
    script: redis::Script,
}

impl RedisRateLimitStore {
    /// Connect and verify the server answers PING
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url).map_err(|e| {
            warn!("Failed to create Redis client for rate limiting: {}", e);
            StoreError::Connection(format!("Failed to create Redis client: {}", e))
        })?;

        let connection_manager = ConnectionManager::new(client).await.map_err(|e| {
            warn!(
                "Failed to create connection manager for rate limiting: {}",
                e
            );
            StoreError::Connection(format!("Failed to create connection manager: {}", e))
        })?;

        let store = Self {
            connection_manager,
            script: redis::Script::new(SLIDING_LOG_SCRIPT),
        };
        store.ping().await?;

        debug!("Connected to Redis for rate limiting");
        Ok(store)
    }
}

#[async_trait]
impl RateLimitStore for RedisRateLimitStore {
    async fn record(
        &self,
        key: &str,
        now_ms: i64,
        window_ms: u64,
        limit: u32,
    ) -> Result<WindowOutcome, StoreError> {
        let mut conn = self.connection_manager.clone();
        let member = format!("{}-{}", now_ms, Uuid::new_v4());

        let reply: Vec<i64> = self
            .script
            .key(key)
            .key(format!("{}:rejected", key))
            .arg(now_ms)
            .arg(window_ms)
            .arg(limit)
            .arg(member)
            .invoke_async(&mut conn)
            .await?;

        match reply.as_slice() {
            [admitted, count, oldest, rejected] => Ok(WindowOutcome {
                admitted: *admitted == 1,
                count: (*count).max(0) as u32,
                oldest_ms: *oldest,
                rejected: (*rejected).max(0) as u64,
            }),
            other => Err(StoreError::Command(format!(
                "unexpected sliding log reply with {} fields",
                other.len()
            ))),
        }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.connection_manager.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

#[derive(Debug, Default)]
struct KeyState {
    admitted: Vec<i64>,
    rejected: u64,
    last_seen_ms: i64,
}

/// In-memory storage backend for development/single instance
///
/// State does not survive restarts and is not shared between processes.
#[derive(Default)]
pub struct InMemoryRateLimitStore {
    entries: Mutex<HashMap<String, KeyState>>,
}

impl InMemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop keys with no admitted request inside the window
    pub async fn evict_idle(&self, now_ms: i64, window_ms: u64) -> usize {
        let cutoff = now_ms - window_ms as i64;
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, state| {
            state.admitted.retain(|&t| t > cutoff);
            !state.admitted.is_empty() || state.last_seen_ms > cutoff
        });
        before - entries.len()
    }

    pub async fn tracked_keys(&self) -> usize {
        self.entries.lock().await.len()
    }
}

#[async_trait]
impl RateLimitStore for InMemoryRateLimitStore {
    async fn record(
        &self,
        key: &str,
        now_ms: i64,
        window_ms: u64,
        limit: u32,
    ) -> Result<WindowOutcome, StoreError> {
        let cutoff = now_ms - window_ms as i64;
        let mut entries = self.entries.lock().await;
        let state = entries.entry(key.to_string()).or_default();

        state.admitted.retain(|&t| t > cutoff);
        if state.last_seen_ms <= cutoff {
            state.rejected = 0;
        }
        state.last_seen_ms = state.last_seen_ms.max(now_ms);

        let admitted = state.admitted.len() < limit as usize;
        if admitted {
            state.admitted.push(now_ms);
        } else {
            state.rejected += 1;
        }

        Ok(WindowOutcome {
            admitted,
            count: state.admitted.len() as u32,
            oldest_ms: state.admitted.iter().copied().min().unwrap_or(now_ms),
            rejected: state.rejected,
        })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
