// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::pipeline::{FieldError, PipelineError};
use crate::rate_limit::{format_reset, RateDecision, ResetFormat};

pub const X_RATELIMIT_LIMIT: &str = "x-ratelimit-limit";
pub const X_RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";
pub const X_RATELIMIT_RESET: &str = "x-ratelimit-reset";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error_type: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HashMap<String, serde_json::Value>>,
}

#[derive(Debug, Clone)]
pub enum ApiError {
    InvalidRequest(String),
    ValidationError { errors: Vec<FieldError> },
    RateLimitExceeded { decision: RateDecision },
    ServiceUnavailable(String),
    InternalError(String),
}

impl ApiError {
    pub fn to_response(&self, now: DateTime<Utc>) -> ErrorResponse {
        let (error_type, message, details) = match self {
            ApiError::InvalidRequest(msg) => ("invalid_request", msg.clone(), None),
            ApiError::ValidationError { errors } => {
                let mut field_errors: HashMap<String, Vec<String>> = HashMap::new();
                for error in errors {
                    field_errors
                        .entry(error.field.clone())
                        .or_default()
                        .push(error.message.clone());
                }
                let mut details = HashMap::new();
                details.insert(
                    "fieldErrors".to_string(),
                    serde_json::to_value(field_errors).unwrap_or_default(),
                );
                (
                    "validation_error",
                    "Request validation failed".to_string(),
                    Some(details),
                )
            }
            ApiError::RateLimitExceeded { decision } => {
                let mut details = HashMap::new();
                details.insert(
                    "retryAfter".to_string(),
                    serde_json::Value::Number(decision.retry_after(now).into()),
                );
                details.insert(
                    "limit".to_string(),
                    serde_json::Value::Number(decision.limit.into()),
                );
                details.insert(
                    "remaining".to_string(),
                    serde_json::Value::Number(decision.remaining.into()),
                );
                details.insert(
                    "resetAt".to_string(),
                    serde_json::Value::String(decision.reset_at.to_rfc3339()),
                );
                (
                    "rate_limit_exceeded",
                    format!(
                        "Rate limit exceeded. Try again in {}.",
                        format_reset(decision.reset_at, now, ResetFormat::Relative)
                    ),
                    Some(details),
                )
            }
            ApiError::ServiceUnavailable(msg) => ("service_unavailable", msg.clone(), None),
            ApiError::InternalError(msg) => ("internal_error", msg.clone(), None),
        };

        ErrorResponse {
            error_type: error_type.to_string(),
            message,
            details,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidRequest(_) | ApiError::ValidationError { .. } => {
                StatusCode::BAD_REQUEST
            }
            ApiError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            ApiError::ValidationError { errors } => {
                write!(f, "Validation failed for {} field(s)", errors.len())
            }
            ApiError::RateLimitExceeded { decision } => {
                write!(f, "Rate limit exceeded, resets at {}", decision.reset_at)
            }
            ApiError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::Validation(errors) => ApiError::ValidationError { errors },
            PipelineError::RateLimited(decision) => ApiError::RateLimitExceeded { decision },
            PipelineError::StoreUnavailable(_) => ApiError::ServiceUnavailable(
                "Rate limiting is temporarily unavailable, please retry shortly".to_string(),
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let now = Utc::now();
        let mut response = (self.status_code(), Json(self.to_response(now))).into_response();

        if let ApiError::RateLimitExceeded { decision } = &self {
            let headers = response.headers_mut();
            apply_rate_limit_headers(headers, decision);
            if let Ok(value) = HeaderValue::from_str(&decision.retry_after(now).to_string()) {
                headers.insert(axum::http::header::RETRY_AFTER, value);
            }
        }
        response
    }
}

/// Set `X-RateLimit-*` headers describing `decision`
pub fn apply_rate_limit_headers(headers: &mut HeaderMap, decision: &RateDecision) {
    let values = [
        (X_RATELIMIT_LIMIT, decision.limit.to_string()),
        (X_RATELIMIT_REMAINING, decision.remaining.to_string()),
        (X_RATELIMIT_RESET, decision.reset_at.timestamp().to_string()),
    ];
    for (name, value) in values {
        if let Ok(value) = HeaderValue::from_str(&value) {
            headers.insert(HeaderName::from_static(name), value);
        }
    }
}
