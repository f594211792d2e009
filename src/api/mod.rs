// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod errors;
pub mod http_server;
pub mod middleware;
pub mod placeholders;

pub use errors::{apply_rate_limit_headers, ApiError, ErrorResponse};
pub use http_server::{create_app, start_server, AppState, HealthResponse};
pub use middleware::{rate_limit_middleware, GatewayAdmission};
pub use placeholders::{
    generate_placeholders_handler, GeneratePlaceholdersResponse, PlaceholderFailure,
};
