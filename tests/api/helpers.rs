// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Shared router fixtures and multipart builders

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, Response},
    Router,
};
use fabstir_placeholder_node::{
    api::{create_app, AppState},
    pipeline::{FanOutPipeline, PipelineConfig},
    placeholder::BlurPlaceholderGenerator,
    rate_limit::{
        ForwardedHeaderResolver, InMemoryRateLimitStore, RateLimitConfig, RateLimitStore,
        RateLimiter,
    },
};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::sync::Arc;

pub const BOUNDARY: &str = "placeholder-test-boundary";

pub fn app_with_store(store: Arc<dyn RateLimitStore>, config: RateLimitConfig) -> Router {
    let limiter = Arc::new(RateLimiter::new(store, config));
    let pipeline = Arc::new(FanOutPipeline::new(
        limiter,
        Arc::new(BlurPlaceholderGenerator::default()),
        PipelineConfig::default(),
    ));
    create_app(AppState::new(pipeline, Arc::new(ForwardedHeaderResolver)))
}

pub fn app(limit: u32) -> Router {
    app_with_store(
        Arc::new(InMemoryRateLimitStore::new()),
        RateLimitConfig {
            limit,
            ..RateLimitConfig::default()
        },
    )
}

pub fn png_bytes() -> Vec<u8> {
    let img = RgbImage::from_fn(32, 16, |x, y| Rgb([(x * 8) as u8, (y * 16) as u8, 64]));
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut out, ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

/// One multipart part: field name, file name, content type, payload
pub struct Part<'a> {
    pub field: &'a str,
    pub file_name: Option<&'a str>,
    pub content_type: Option<&'a str>,
    pub data: Vec<u8>,
}

impl<'a> Part<'a> {
    pub fn image(file_name: &'a str, data: Vec<u8>) -> Self {
        Self {
            field: "imageFiles",
            file_name: Some(file_name),
            content_type: Some("image/png"),
            data,
        }
    }
}

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        let mut disposition = format!("Content-Disposition: form-data; name=\"{}\"", part.field);
        if let Some(file_name) = part.file_name {
            disposition.push_str(&format!("; filename=\"{}\"", file_name));
        }
        body.extend_from_slice(disposition.as_bytes());
        body.extend_from_slice(b"\r\n");
        if let Some(content_type) = part.content_type {
            body.extend_from_slice(format!("Content-Type: {}\r\n", content_type).as_bytes());
        }
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(&part.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn upload(uri: &str, client_ip: &str, parts: &[Part<'_>]) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .header("x-forwarded-for", client_ip)
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn header_str<'a>(response: &'a Response<Body>, name: &str) -> Option<&'a str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}
