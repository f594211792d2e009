// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod api;
pub mod cli;
pub mod config;
pub mod pipeline;
pub mod placeholder;
pub mod rate_limit;
pub mod version;

// Re-export main types
pub use api::{create_app, AppState};
pub use config::NodeConfig;
pub use pipeline::{BatchOutcome, BatchRequest, FanOutPipeline, ImageInput, PipelineError};
pub use placeholder::{BlurPlaceholderGenerator, Placeholder, PlaceholderError, PlaceholderGenerator};
pub use rate_limit::{ClientKey, RateDecision, RateLimitConfig, RateLimiter};
