// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Blur placeholder generation
//!
//! Decodes an uploaded image, shrinks it to a few pixels and returns the
//! result as a PNG data URI. Browsers upscale the tiny image with smoothing,
//! which paints the blurred stand-in while the real image loads.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{imageops::FilterType, DynamicImage, ImageFormat};
use std::io::Cursor;
use thiserror::Error;

use super::decode::decode_image;

/// Smallest and largest accepted placeholder edge (pixels)
pub const MIN_PLACEHOLDER_SIZE: u32 = 4;
pub const MAX_PLACEHOLDER_SIZE: u32 = 64;

const DATA_URI_PREFIX: &str = "data:image/png;base64,";

/// Errors that can occur while generating a placeholder
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlaceholderError {
    /// Bytes are empty or not a supported raster image
    #[error("Unsupported image format")]
    UnsupportedFormat,

    /// Decode, resize, encode or scheduling failure
    #[error("Failed to process image: {0}")]
    Processing(String),
}

impl PlaceholderError {
    /// Stable identifier for API responses
    pub fn error_type(&self) -> &'static str {
        match self {
            PlaceholderError::UnsupportedFormat => "unsupported_format",
            PlaceholderError::Processing(_) => "processing_error",
        }
    }
}

/// A generated placeholder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    /// `data:image/png;base64,...`, renderable without a separate fetch
    pub data_uri: String,
    /// Source image width in pixels
    pub width: u32,
    /// Source image height in pixels
    pub height: u32,
    pub source_format: ImageFormat,
}

/// Turns raw image bytes into a placeholder.
///
/// Implementations must be pure functions of their input bytes and fixed
/// parameters, and safe to call from many threads at once.
pub trait PlaceholderGenerator: Send + Sync {
    fn generate(&self, bytes: &[u8]) -> Result<Placeholder, PlaceholderError>;
}

/// Placeholder parameters
#[derive(Debug, Clone)]
pub struct PlaceholderConfig {
    /// Longest edge of the downsampled preview
    pub size: u32,
}

impl Default for PlaceholderConfig {
    fn default() -> Self {
        Self { size: 4 }
    }
}

/// Downsample-and-encode generator backed by the `image` crate
#[derive(Debug, Clone)]
pub struct BlurPlaceholderGenerator {
    size: u32,
}

impl BlurPlaceholderGenerator {
    pub fn new(config: PlaceholderConfig) -> Self {
        Self {
            size: config
                .size
                .clamp(MIN_PLACEHOLDER_SIZE, MAX_PLACEHOLDER_SIZE),
        }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    fn downsample(&self, img: &DynamicImage) -> DynamicImage {
        let small = img.resize(self.size, self.size, FilterType::Triangle);
        DynamicImage::ImageRgba8(small.to_rgba8())
    }
}

impl Default for BlurPlaceholderGenerator {
    fn default() -> Self {
        Self::new(PlaceholderConfig::default())
    }
}

impl PlaceholderGenerator for BlurPlaceholderGenerator {
    fn generate(&self, bytes: &[u8]) -> Result<Placeholder, PlaceholderError> {
        let (img, source_format) = decode_image(bytes)?;
        let small = self.downsample(&img);

        let mut png = Cursor::new(Vec::new());
        small
            .write_to(&mut png, ImageFormat::Png)
            .map_err(|e| PlaceholderError::Processing(format!("failed to encode PNG: {}", e)))?;

        Ok(Placeholder {
            data_uri: format!("{}{}", DATA_URI_PREFIX, STANDARD.encode(png.into_inner())),
            width: img.width(),
            height: img.height(),
            source_format,
        })
    }
}
