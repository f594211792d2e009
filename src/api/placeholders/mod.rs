// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Placeholder generation endpoints
//!
//! The same multipart contract is served at two enforcement points:
//! `POST /api/placeholders` (gateway middleware) and
//! `POST /actions/generate-placeholder` (checked inside the pipeline).

pub mod handler;
pub mod request;
pub mod response;

pub use handler::generate_placeholders_handler;
pub use request::read_image_parts;
pub use response::{GeneratePlaceholdersResponse, PlaceholderFailure};
