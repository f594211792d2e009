// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Per-client sliding-window rate limiting
//!
//! Key features:
//! - Exact sliding log (no fixed-bucket approximation)
//! - Atomic check-and-increment in Redis/Dragonfly, shared across instances
//! - Explicit fail-open / fail-closed policy when the store is unreachable
//! - Pluggable caller identity derivation

pub mod format;
pub mod key;
pub mod limiter;
pub mod store;
pub mod types;

pub use format::{format_reset, ResetFormat};
pub use key::{ClientKeyResolver, ForwardedHeaderResolver, KeyStrategy, PeerAddressResolver};
pub use limiter::RateLimiter;
pub use store::{InMemoryRateLimitStore, RateLimitStore, RedisRateLimitStore};
pub use types::{
    ClientKey, RateDecision, RateLimitConfig, StoreError, StoreFailurePolicy, WindowOutcome,
};
