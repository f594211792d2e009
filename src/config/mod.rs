// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Node configuration loaded from environment variables

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use crate::pipeline::{BatchLimits, PipelineConfig};
use crate::placeholder::PlaceholderConfig;
use crate::rate_limit::{KeyStrategy, RateLimitConfig, StoreFailurePolicy};

/// Configuration for the placeholder node
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Interface the HTTP server binds to
    pub api_host: String,
    pub api_port: u16,
    /// Redis/Dragonfly URL; `None` selects the in-process store
    pub redis_url: Option<String>,
    /// Requests admitted per caller per window
    pub rate_limit_requests: u32,
    pub rate_limit_window_secs: u64,
    pub rate_limit_prefix: String,
    pub rate_limit_fail_policy: StoreFailurePolicy,
    pub rate_limit_store_timeout_ms: u64,
    pub client_key_strategy: KeyStrategy,
    pub max_batch_size: usize,
    pub max_image_bytes: usize,
    /// Longest edge of the generated preview
    pub placeholder_size: u32,
    pub generation_timeout_ms: u64,
    pub max_concurrent_generations: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        let rate_limit = RateLimitConfig::default();
        let limits = BatchLimits::default();
        Self {
            api_host: "0.0.0.0".to_string(),
            api_port: 8080,
            redis_url: None,
            rate_limit_requests: rate_limit.limit,
            rate_limit_window_secs: rate_limit.window.as_secs(),
            rate_limit_prefix: rate_limit.prefix,
            rate_limit_fail_policy: rate_limit.failure_policy,
            rate_limit_store_timeout_ms: rate_limit.store_timeout.as_millis() as u64,
            client_key_strategy: KeyStrategy::default(),
            max_batch_size: limits.max_images,
            max_image_bytes: limits.max_image_bytes,
            placeholder_size: PlaceholderConfig::default().size,
            generation_timeout_ms: 10_000,
            max_concurrent_generations: 8,
        }
    }
}

impl NodeConfig {
    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_host: env::var("API_HOST").unwrap_or(defaults.api_host),
            api_port: parse_var("API_PORT").unwrap_or(defaults.api_port),
            redis_url: env::var("REDIS_URL")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            rate_limit_requests: parse_var("RATE_LIMIT_REQUESTS")
                .unwrap_or(defaults.rate_limit_requests),
            rate_limit_window_secs: parse_var("RATE_LIMIT_WINDOW_SECS")
                .unwrap_or(defaults.rate_limit_window_secs),
            rate_limit_prefix: env::var("RATE_LIMIT_PREFIX")
                .unwrap_or(defaults.rate_limit_prefix),
            rate_limit_fail_policy: parse_var("RATE_LIMIT_FAIL_POLICY")
                .unwrap_or(defaults.rate_limit_fail_policy),
            rate_limit_store_timeout_ms: parse_var("RATE_LIMIT_STORE_TIMEOUT_MS")
                .unwrap_or(defaults.rate_limit_store_timeout_ms),
            client_key_strategy: parse_var("CLIENT_KEY_STRATEGY")
                .unwrap_or(defaults.client_key_strategy),
            max_batch_size: parse_var("MAX_BATCH_SIZE").unwrap_or(defaults.max_batch_size),
            max_image_bytes: parse_var("MAX_IMAGE_BYTES").unwrap_or(defaults.max_image_bytes),
            placeholder_size: parse_var("PLACEHOLDER_SIZE").unwrap_or(defaults.placeholder_size),
            generation_timeout_ms: parse_var("GENERATION_TIMEOUT_MS")
                .unwrap_or(defaults.generation_timeout_ms),
            max_concurrent_generations: parse_var("MAX_CONCURRENT_GENERATIONS")
                .unwrap_or(defaults.max_concurrent_generations),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.rate_limit_requests == 0 {
            return Err("RATE_LIMIT_REQUESTS must be greater than 0".to_string());
        }
        if self.rate_limit_window_secs == 0 {
            return Err("RATE_LIMIT_WINDOW_SECS must be greater than 0".to_string());
        }
        if self.rate_limit_prefix.trim().is_empty() {
            return Err("RATE_LIMIT_PREFIX must not be empty".to_string());
        }
        if self.rate_limit_store_timeout_ms == 0 {
            return Err("RATE_LIMIT_STORE_TIMEOUT_MS must be greater than 0".to_string());
        }
        if self.max_batch_size == 0 {
            return Err("MAX_BATCH_SIZE must be greater than 0".to_string());
        }
        if self.max_image_bytes == 0 {
            return Err("MAX_IMAGE_BYTES must be greater than 0".to_string());
        }
        if self.generation_timeout_ms == 0 {
            return Err("GENERATION_TIMEOUT_MS must be greater than 0".to_string());
        }
        if self.max_concurrent_generations == 0 {
            return Err("MAX_CONCURRENT_GENERATIONS must be greater than 0".to_string());
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.api_host, self.api_port)
            .parse()
            .map_err(|e| format!("Invalid API_HOST/API_PORT: {}", e))
    }

    pub fn rate_limit(&self) -> RateLimitConfig {
        RateLimitConfig {
            limit: self.rate_limit_requests,
            window: Duration::from_secs(self.rate_limit_window_secs),
            prefix: self.rate_limit_prefix.clone(),
            store_timeout: Duration::from_millis(self.rate_limit_store_timeout_ms),
            failure_policy: self.rate_limit_fail_policy,
        }
    }

    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            limits: BatchLimits {
                max_images: self.max_batch_size,
                max_image_bytes: self.max_image_bytes,
            },
            generation_timeout: Duration::from_millis(self.generation_timeout_ms),
            max_concurrency: self.max_concurrent_generations,
        }
    }

    pub fn placeholder(&self) -> PlaceholderConfig {
        PlaceholderConfig {
            size: self.placeholder_size,
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
