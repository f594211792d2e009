// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Multipart request parsing

use axum_extra::extract::Multipart;
use tracing::debug;

use crate::api::errors::ApiError;
use crate::pipeline::{ImageInput, IMAGE_FILES_FIELD};

/// Collect every `imageFiles` part, in upload order.
///
/// Parts under other field names are skipped. Size and type checks are left
/// to batch validation so that all problems are reported together.
pub async fn read_image_parts(mut multipart: Multipart) -> Result<Vec<ImageInput>, ApiError> {
    let mut images = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::InvalidRequest(format!("Malformed multipart body: {}", e)))?
    {
        let field_name = field.name().unwrap_or_default().to_string();
        if !is_image_field(&field_name) {
            debug!("Skipping multipart field '{}'", field_name);
            continue;
        }

        let name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(|e| {
            ApiError::InvalidRequest(format!("Failed to read '{}': {}", field_name, e))
        })?;

        images.push(ImageInput {
            bytes,
            name,
            content_type,
        });
    }

    Ok(images)
}

/// Accepts `imageFiles`, `imageFiles[]` and `imageFiles[N]`
fn is_image_field(name: &str) -> bool {
    match name.strip_prefix(IMAGE_FILES_FIELD) {
        Some("") => true,
        Some(rest) => rest.starts_with('[') && rest.ends_with(']'),
        None => false,
    }
}
