// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Human-friendly rendering of rate limit reset times

use chrono::{DateTime, Utc};

/// How a reset time is rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResetFormat {
    /// "2h 5m 12s", "45s", or "now"
    #[default]
    Relative,
    /// "Resets at 17:23:45 UTC"
    Absolute,
}

/// Render `reset_at` relative to `now` (or as a clock time)
pub fn format_reset(reset_at: DateTime<Utc>, now: DateTime<Utc>, format: ResetFormat) -> String {
    if format == ResetFormat::Absolute {
        return format!("Resets at {} UTC", reset_at.format("%H:%M:%S"));
    }

    let millis = (reset_at - now).num_milliseconds();
    if millis <= 0 {
        return "now".to_string();
    }

    let mut seconds = (millis + 999) / 1000;
    let hours = seconds / 3600;
    seconds %= 3600;
    let minutes = seconds / 60;
    seconds %= 60;

    let mut parts = Vec::with_capacity(3);
    if hours > 0 {
        parts.push(format!("{}h", hours));
    }
    if minutes > 0 {
        parts.push(format!("{}m", minutes));
    }
    if seconds > 0 {
        parts.push(format!("{}s", seconds));
    }
    parts.join(" ")
}
