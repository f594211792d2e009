// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Batch request types and validation

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::rate_limit::ClientKey;

/// MIME types accepted for uploads
pub const ALLOWED_MIME_TYPES: &[&str] = &[
    "image/png",
    "image/jpeg",
    "image/jpg",
    "image/webp",
    "image/gif",
    "image/bmp",
    "image/tiff",
];

/// Form field carrying the uploaded files
pub const IMAGE_FILES_FIELD: &str = "imageFiles";

/// One uploaded image, owned by the request carrying it
#[derive(Debug, Clone)]
pub struct ImageInput {
    pub bytes: Bytes,
    /// Display name (usually the uploaded file name)
    pub name: Option<String>,
    /// Declared MIME type, if the client sent one
    pub content_type: Option<String>,
}

impl ImageInput {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
            name: None,
            content_type: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// Ordered images plus the caller they are accounted to
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub key: ClientKey,
    pub images: Vec<ImageInput>,
}

/// Bounds on one batch
#[derive(Debug, Clone)]
pub struct BatchLimits {
    pub max_images: usize,
    pub max_image_bytes: usize,
}

impl Default for BatchLimits {
    fn default() -> Self {
        Self {
            max_images: 20,
            max_image_bytes: 10 * 1024 * 1024,
        }
    }
}

/// A validation failure tied to a request field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl BatchRequest {
    pub fn new(key: ClientKey, images: Vec<ImageInput>) -> Self {
        Self { key, images }
    }

    /// Check the batch against `limits`, reporting every failing field
    pub fn validate(&self, limits: &BatchLimits) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();

        if self.images.is_empty() {
            errors.push(FieldError::new(
                IMAGE_FILES_FIELD,
                "at least one image is required",
            ));
        }

        if self.images.len() > limits.max_images {
            errors.push(FieldError::new(
                IMAGE_FILES_FIELD,
                format!(
                    "at most {} images per request, got {}",
                    limits.max_images,
                    self.images.len()
                ),
            ));
        }

        for (index, image) in self.images.iter().enumerate() {
            let field = format!("{}[{}]", IMAGE_FILES_FIELD, index);

            if image.bytes.is_empty() {
                errors.push(FieldError::new(field.clone(), "file is empty"));
            } else if image.bytes.len() > limits.max_image_bytes {
                errors.push(FieldError::new(
                    field.clone(),
                    format!(
                        "file is {} bytes; the limit is {} bytes",
                        image.bytes.len(),
                        limits.max_image_bytes
                    ),
                ));
            }

            if let Some(content_type) = &image.content_type {
                if !is_allowed_mime(content_type) {
                    errors.push(FieldError::new(
                        field,
                        format!("unsupported file type '{}'", content_type),
                    ));
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn is_allowed_mime(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase();
    ALLOWED_MIME_TYPES.contains(&essence.as_str())
}
