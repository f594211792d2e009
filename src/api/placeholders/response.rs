// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Placeholder generation response types

use serde::{Deserialize, Serialize};

use crate::pipeline::BatchOutcome;

/// Per-image results in upload order
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratePlaceholdersResponse {
    pub message: String,
    /// Data URI per image, `null` where generation failed
    pub results: Vec<Option<String>>,
    pub failures: Vec<PlaceholderFailure>,
}

/// Why one image has no placeholder
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlaceholderFailure {
    pub index: usize,
    pub name: Option<String>,
    pub error_type: String,
    pub message: String,
}

impl From<&BatchOutcome> for GeneratePlaceholdersResponse {
    fn from(outcome: &BatchOutcome) -> Self {
        let mut results = Vec::with_capacity(outcome.items.len());
        let mut failures = Vec::new();

        for item in &outcome.items {
            match &item.result {
                Ok(placeholder) => results.push(Some(placeholder.data_uri.clone())),
                Err(e) => {
                    results.push(None);
                    failures.push(PlaceholderFailure {
                        index: item.index,
                        name: item.name.clone(),
                        error_type: e.error_type().to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }

        let message = if failures.is_empty() {
            "Placeholders generated successfully.".to_string()
        } else {
            format!(
                "Generated {} of {} placeholders",
                outcome.succeeded(),
                outcome.items.len()
            )
        };

        Self {
            message,
            results,
            failures,
        }
    }
}
