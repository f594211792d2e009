// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Version information for the Fabstir Placeholder Node

/// Full version string with feature description
pub const VERSION: &str = "v1.0.0-placeholder-rate-limit-2026-10-18";

/// Semantic version number
pub const VERSION_NUMBER: &str = "1.0.0";

pub const VERSION_MAJOR: u32 = 1;
pub const VERSION_MINOR: u32 = 0;
pub const VERSION_PATCH: u32 = 0;

/// Build date
pub const BUILD_DATE: &str = "2026-10-18";

/// Supported features in this version
pub const FEATURES: &[&str] = &[
    "blur-placeholders",
    "batch-fan-out",
    "sliding-window-rate-limit",
    "redis-store",
    "gateway-rate-limit",
    "action-rate-limit",
    "fail-open-policy",
];

/// Get formatted version string for logging
pub fn get_version_string() -> String {
    format!("Fabstir Placeholder Node {} ({})", VERSION_NUMBER, BUILD_DATE)
}

/// Get full version info for API responses
pub fn get_version_info() -> serde_json::Value {
    serde_json::json!({
        "version": VERSION_NUMBER,
        "build": VERSION,
        "date": BUILD_DATE,
        "features": FEATURES,
    })
}
