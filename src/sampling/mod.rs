// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Multi-sample execution of probabilistic model calls

pub mod attempt;
pub mod sampler;

pub use attempt::{survivors, SampleAttempt};
pub use sampler::{ConcurrentSampler, SampledStage, SamplingPlan};
