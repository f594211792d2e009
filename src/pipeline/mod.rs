// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Batch placeholder pipeline: validation, rate limiting and concurrent fan-out

pub mod batch;
pub mod fanout;

pub use batch::{BatchLimits, BatchRequest, FieldError, ImageInput, IMAGE_FILES_FIELD};
pub use fanout::{BatchOutcome, FanOutPipeline, ItemOutcome, PipelineConfig, PipelineError};
