// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Caller identity derivation for rate limiting
//!
//! Both enforcement points (gateway middleware and the placeholder action)
//! resolve keys through the same `ClientKeyResolver`, so a caller always lands
//! in the same bucket.
//!
//! Spoofing resistance:
//! - `ForwardedHeaderResolver` trusts `X-Forwarded-For` / `X-Real-IP` as sent.
//!   Any client that reaches the node directly can pick its own bucket. Only
//!   deploy it behind a proxy that overwrites both headers.
//! - `PeerAddressResolver` uses the TCP peer address. It cannot be spoofed, but
//!   behind a proxy every caller shares the proxy's bucket.

use axum::http::HeaderMap;
use std::net::SocketAddr;
use std::str::FromStr;

use super::types::ClientKey;

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
pub const X_REAL_IP: &str = "x-real-ip";

/// Strategy for turning a request into a `ClientKey`
pub trait ClientKeyResolver: Send + Sync {
    fn resolve(&self, headers: &HeaderMap, peer: Option<SocketAddr>) -> ClientKey;

    fn name(&self) -> &'static str;
}

/// First `X-Forwarded-For` hop, then `X-Real-IP`, then the shared "unknown" bucket
#[derive(Debug, Clone, Copy, Default)]
pub struct ForwardedHeaderResolver;

impl ClientKeyResolver for ForwardedHeaderResolver {
    fn resolve(&self, headers: &HeaderMap, _peer: Option<SocketAddr>) -> ClientKey {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|h| h.to_str().ok())
                .map(str::trim)
                .filter(|s| !s.is_empty())
        };

        header(X_FORWARDED_FOR)
            .and_then(|xff| xff.split(',').next())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .or_else(|| header(X_REAL_IP))
            .map(ClientKey::new)
            .unwrap_or_else(ClientKey::unknown)
    }

    fn name(&self) -> &'static str {
        "forwarded"
    }
}

/// TCP peer IP address; "unknown" when the connection info is missing
#[derive(Debug, Clone, Copy, Default)]
pub struct PeerAddressResolver;

impl ClientKeyResolver for PeerAddressResolver {
    fn resolve(&self, _headers: &HeaderMap, peer: Option<SocketAddr>) -> ClientKey {
        peer.map(|addr| ClientKey::new(addr.ip().to_string()))
            .unwrap_or_else(ClientKey::unknown)
    }

    fn name(&self) -> &'static str {
        "peer"
    }
}

/// Which resolver the node uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyStrategy {
    #[default]
    Forwarded,
    Peer,
}

impl KeyStrategy {
    pub fn resolver(self) -> Box<dyn ClientKeyResolver> {
        match self {
            KeyStrategy::Forwarded => Box::new(ForwardedHeaderResolver),
            KeyStrategy::Peer => Box::new(PeerAddressResolver),
        }
    }
}

impl FromStr for KeyStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "forwarded" | "header" => Ok(Self::Forwarded),
            "peer" | "socket" => Ok(Self::Peer),
            other => Err(format!(
                "invalid client key strategy '{}'; expected 'forwarded' or 'peer'",
                other
            )),
        }
    }
}
