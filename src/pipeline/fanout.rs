// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Concurrent placeholder generation for a batch of uploads
//!
//! Pipeline:
//! 1. Validate the batch (before any limiter or generation work)
//! 2. One rate limit check for the whole batch
//! 3. Fan out one task per image, bounded by a semaphore
//! 4. Collect results back into input order
//!
//! Failure policy is per-item isolation: a bad image yields an error entry in
//! its slot and never aborts its siblings.

use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::batch::{BatchLimits, BatchRequest, FieldError, ImageInput};
use crate::placeholder::{Placeholder, PlaceholderError, PlaceholderGenerator};
use crate::rate_limit::{RateDecision, RateLimiter};

/// Fan-out tuning
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub limits: BatchLimits,
    /// Upper bound on one image's decode + encode
    pub generation_timeout: Duration,
    /// Images processed at the same time within one batch
    pub max_concurrency: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            limits: BatchLimits::default(),
            generation_timeout: Duration::from_secs(10),
            max_concurrency: 8,
        }
    }
}

/// Result for one image, in its input position
#[derive(Debug, Clone)]
pub struct ItemOutcome {
    pub index: usize,
    pub name: Option<String>,
    pub result: Result<Placeholder, PlaceholderError>,
}

/// Ordered per-image results plus the limiter decision that admitted them
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub decision: RateDecision,
    pub items: Vec<ItemOutcome>,
}

impl BatchOutcome {
    pub fn succeeded(&self) -> usize {
        self.items.iter().filter(|i| i.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.items.len() - self.succeeded()
    }
}

/// Errors that reject a whole batch before any generation starts
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    #[error("Invalid batch ({} field error(s))", .0.len())]
    Validation(Vec<FieldError>),

    #[error("Rate limit exceeded, resets at {}", .0.reset_at)]
    RateLimited(RateDecision),

    #[error("Rate limit store unavailable")]
    StoreUnavailable(RateDecision),
}

/// Rate-limited, concurrent placeholder generation
pub struct FanOutPipeline {
    limiter: Arc<RateLimiter>,
    generator: Arc<dyn PlaceholderGenerator>,
    config: PipelineConfig,
}

impl FanOutPipeline {
    pub fn new(
        limiter: Arc<RateLimiter>,
        generator: Arc<dyn PlaceholderGenerator>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            limiter,
            generator,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Validate, check the limiter once, then generate every placeholder
    pub async fn run(&self, batch: BatchRequest) -> Result<BatchOutcome, PipelineError> {
        batch
            .validate(&self.config.limits)
            .map_err(PipelineError::Validation)?;

        let decision = self.limiter.check(&batch.key, Utc::now()).await;
        self.dispatch(batch, decision).await
    }

    /// Like `run`, for requests whose limiter decision was already taken
    /// upstream (the gateway middleware). The limiter is not consulted again.
    pub async fn run_admitted(
        &self,
        batch: BatchRequest,
        decision: RateDecision,
    ) -> Result<BatchOutcome, PipelineError> {
        batch
            .validate(&self.config.limits)
            .map_err(PipelineError::Validation)?;

        self.dispatch(batch, decision).await
    }

    async fn dispatch(
        &self,
        batch: BatchRequest,
        decision: RateDecision,
    ) -> Result<BatchOutcome, PipelineError> {
        if !decision.allowed {
            return Err(if decision.degraded {
                PipelineError::StoreUnavailable(decision)
            } else {
                PipelineError::RateLimited(decision)
            });
        }

        let started = Instant::now();
        let key = batch.key;
        let items = self.fan_out(batch.images).await;
        let outcome = BatchOutcome { decision, items };

        info!(
            "Generated {}/{} placeholders for {} in {}ms",
            outcome.succeeded(),
            outcome.items.len(),
            key,
            started.elapsed().as_millis()
        );
        Ok(outcome)
    }

    /// Run every image concurrently and return results in input order.
    ///
    /// Dropping the returned future aborts all tasks that are still queued.
    async fn fan_out(&self, images: Vec<ImageInput>) -> Vec<ItemOutcome> {
        let names: Vec<Option<String>> = images.iter().map(|i| i.name.clone()).collect();
        let permits = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let timeout = self.config.generation_timeout;
        let mut tasks = JoinSet::new();

        for (index, image) in images.into_iter().enumerate() {
            let generator = Arc::clone(&self.generator);
            let permits = Arc::clone(&permits);

            tasks.spawn(async move {
                let permit = match permits.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return (
                            index,
                            Err(PlaceholderError::Processing("generation queue closed".into())),
                        )
                    }
                };

                // The permit lives in the blocking closure: a timed-out decode
                // keeps running and must keep its slot until it returns.
                let bytes = image.bytes;
                let work = tokio::task::spawn_blocking(move || {
                    let _permit = permit;
                    generator.generate(&bytes)
                });
                let result = match tokio::time::timeout(timeout, work).await {
                    Ok(Ok(result)) => result,
                    Ok(Err(e)) => Err(PlaceholderError::Processing(format!(
                        "generation task failed: {}",
                        e
                    ))),
                    Err(_) => Err(PlaceholderError::Processing(format!(
                        "generation timed out after {}ms",
                        timeout.as_millis()
                    ))),
                };
                (index, result)
            });
        }

        let mut slots: Vec<Option<Result<Placeholder, PlaceholderError>>> =
            names.iter().map(|_| None).collect();

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => {
                    debug!("Placeholder {} finished (ok={})", index, result.is_ok());
                    slots[index] = Some(result);
                }
                Err(e) => warn!("Placeholder task ended abnormally: {}", e),
            }
        }

        slots
            .into_iter()
            .zip(names)
            .enumerate()
            .map(|(index, (slot, name))| {
                let result = slot.unwrap_or_else(|| {
                    Err(PlaceholderError::Processing("generation task aborted".into()))
                });
                if let Err(ref e) = result {
                    warn!(
                        "Placeholder {} ({}) failed: {}",
                        index,
                        name.as_deref().unwrap_or("unnamed"),
                        e
                    );
                }
                ItemOutcome {
                    index,
                    name,
                    result,
                }
            })
            .collect()
    }
}
