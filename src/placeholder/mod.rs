// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Blurred image placeholders for progressive loading

pub mod decode;
pub mod fetch;
pub mod generator;

pub use decode::{detect_format, format_to_mime};
pub use fetch::{fetch_image, FetchError};
pub use generator::{
    BlurPlaceholderGenerator, Placeholder, PlaceholderConfig, PlaceholderError,
    PlaceholderGenerator,
};
