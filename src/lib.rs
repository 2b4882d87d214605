// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod aggregation;
pub mod api;
pub mod cli;
pub mod config;
pub mod detection;
pub mod diffusion;
pub mod logging;
pub mod pipeline;
pub mod prompts;
pub mod sampling;
pub mod segmentation;
pub mod stages;
pub mod storage;
pub mod version;
pub mod vision;

// Re-export main types
pub use config::AppConfig;
pub use pipeline::{Backends, ImageProcessor, PipelineError, PipelineSettings, TransformOutcome};
pub use sampling::{ConcurrentSampler, SampleAttempt, SampledStage, SamplingPlan};
