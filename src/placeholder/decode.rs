// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Format detection and decoding of uploaded image bytes

use image::{DynamicImage, ImageFormat};

use super::generator::PlaceholderError;

/// Detect image format from magic bytes
///
/// # Returns
/// * `Ok(ImageFormat)` - Detected format
/// * `Err(PlaceholderError::UnsupportedFormat)` - Empty, truncated or non-raster data
pub fn detect_format(bytes: &[u8]) -> Result<ImageFormat, PlaceholderError> {
    if bytes.len() < 4 {
        return Err(PlaceholderError::UnsupportedFormat);
    }

    match bytes {
        // PNG: 89 50 4E 47 (0x89 P N G)
        [0x89, 0x50, 0x4E, 0x47, ..] => Ok(ImageFormat::Png),

        // JPEG: FF D8 FF
        [0xFF, 0xD8, 0xFF, ..] => Ok(ImageFormat::Jpeg),

        // WebP: RIFF .... WEBP
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50, ..] => Ok(ImageFormat::WebP),

        // GIF: GIF87a or GIF89a
        [0x47, 0x49, 0x46, 0x38, x, ..] if *x == 0x37 || *x == 0x39 => Ok(ImageFormat::Gif),

        // BMP: BM
        [0x42, 0x4D, ..] => Ok(ImageFormat::Bmp),

        // TIFF: II (little-endian) or MM (big-endian)
        [0x49, 0x49, 0x2A, 0x00, ..] | [0x4D, 0x4D, 0x00, 0x2A, ..] => Ok(ImageFormat::Tiff),

        _ => Err(PlaceholderError::UnsupportedFormat),
    }
}

/// Decode raw bytes into pixels
pub fn decode_image(bytes: &[u8]) -> Result<(DynamicImage, ImageFormat), PlaceholderError> {
    let format = detect_format(bytes)?;
    let img = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| PlaceholderError::Processing(format!("failed to decode image: {}", e)))?;
    Ok((img, format))
}

/// MIME type for a detected format
pub fn format_to_mime(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Png => "image/png",
        ImageFormat::Jpeg => "image/jpeg",
        ImageFormat::WebP => "image/webp",
        ImageFormat::Gif => "image/gif",
        ImageFormat::Bmp => "image/bmp",
        ImageFormat::Tiff => "image/tiff",
        _ => "application/octet-stream",
    }
}
