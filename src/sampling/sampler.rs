// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Bounded-concurrency multi-sample executor
//!
//! Runs `samples` independent attempts of a probabilistic stage. At most
//! `concurrency` attempts hold an admission permit at any instant; a permit is
//! held for the whole attempt, backoff sleeps included. Each attempt retries up
//! to `max_retries` times with delays of 1, 2, 4, ... backoff units. Exhausted
//! attempts are dropped and the survivors are reduced as one batch once every
//! attempt has resolved.

use anyhow::Result;
use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use super::attempt::{survivors, SampleAttempt};

/// A pipeline stage whose model call is sampled several times and reduced
#[async_trait]
pub trait SampledStage: Send + Sync {
    type Input: Send + Sync;
    type Output: Send;
    type Aggregate;

    /// Stage name used in logs
    fn name(&self) -> &'static str;

    /// One sample of the probabilistic operation; any error is retried
    async fn run_sample(&self, input: &Self::Input) -> Result<Self::Output>;

    /// Combine the surviving samples. Receives an empty vector when every
    /// attempt was exhausted and decides the failure semantics itself.
    fn reduce(&self, outputs: Vec<Self::Output>) -> Result<Self::Aggregate>;
}

/// Sample count, admission ceiling and retry ceiling for one stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplingPlan {
    pub samples: usize,
    pub concurrency: usize,
    pub max_retries: u32,
}

impl SamplingPlan {
    pub fn new(samples: usize, concurrency: usize, max_retries: u32) -> Self {
        Self {
            samples,
            concurrency,
            max_retries,
        }
    }

    /// Admission permits actually handed out: never zero, never above the sample count
    pub fn effective_concurrency(&self) -> usize {
        self.concurrency.clamp(1, self.samples.max(1))
    }
}

impl Default for SamplingPlan {
    fn default() -> Self {
        Self::new(1, 1, 3)
    }
}

pub struct ConcurrentSampler {
    plan: SamplingPlan,
    backoff_unit: Duration,
    gate: Arc<Semaphore>,
}

impl ConcurrentSampler {
    pub fn new(plan: SamplingPlan, backoff_unit: Duration) -> Self {
        let permits = plan.effective_concurrency();
        Self {
            plan,
            backoff_unit,
            gate: Arc::new(Semaphore::new(permits)),
        }
    }

    /// Delay slept after failed try number `attempt` (1-based)
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.backoff_unit.saturating_mul(factor)
    }

    /// Run every attempt and return the raw per-attempt outcomes
    pub async fn collect<S: SampledStage>(
        &self,
        stage: &S,
        input: &S::Input,
    ) -> Vec<SampleAttempt<S::Output>> {
        info!(
            "{}: running {} samples (concurrency {}, retries {})",
            stage.name(),
            self.plan.samples,
            self.plan.effective_concurrency(),
            self.plan.max_retries
        );

        let attempts = (0..self.plan.samples).map(|index| self.attempt(stage, input, index));
        join_all(attempts).await
    }

    /// Run every attempt, then reduce the survivors
    pub async fn run<S: SampledStage>(&self, stage: &S, input: &S::Input) -> Result<S::Aggregate> {
        let outcomes = self.collect(stage, input).await;
        let outputs = survivors(outcomes);

        info!(
            "{}: {}/{} samples succeeded",
            stage.name(),
            outputs.len(),
            self.plan.samples
        );

        stage.reduce(outputs)
    }

    async fn attempt<S: SampledStage>(
        &self,
        stage: &S,
        input: &S::Input,
        index: usize,
    ) -> SampleAttempt<S::Output> {
        let _permit = match self.gate.acquire().await {
            Ok(permit) => permit,
            Err(e) => {
                error!("{}: admission gate closed: {}", stage.name(), e);
                return SampleAttempt::Exhausted { attempts: 0 };
            }
        };

        let max_retries = self.plan.max_retries;
        for attempt in 1..=max_retries {
            match stage.run_sample(input).await {
                Ok(output) => {
                    debug!(
                        "{}: sample {} succeeded on try {}",
                        stage.name(),
                        index,
                        attempt
                    );
                    return SampleAttempt::Success(output);
                }
                Err(e) => {
                    warn!(
                        "{}: sample {} try {}/{} failed: {:#}",
                        stage.name(),
                        index,
                        attempt,
                        max_retries,
                        e
                    );
                    if attempt < max_retries {
                        tokio::time::sleep(self.backoff_delay(attempt)).await;
                    }
                }
            }
        }

        error!(
            "{}: sample {} dropped after {} tries",
            stage.name(),
            index,
            max_retries
        );
        SampleAttempt::Exhausted {
            attempts: max_retries,
        }
    }
}
