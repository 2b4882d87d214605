// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use std::fmt;
use thiserror::Error;

use crate::prompts::PromptError;
use crate::storage::StorageError;

/// Pipeline stage, as named in errors and logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Keywords,
    Detection,
    Segmentation,
    Description,
    Style,
    Synthesis,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Keywords => "keyword extraction",
            Stage::Detection => "object detection",
            Stage::Segmentation => "segmentation",
            Stage::Description => "description",
            Stage::Style => "toy description",
            Stage::Synthesis => "image generation",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{stage} stage failed: {reason}")]
    StageFailed { stage: Stage, reason: String },

    #[error("could not create working directory: {0}")]
    Workspace(#[source] std::io::Error),

    #[error("failed to save output: {0}")]
    Storage(#[from] StorageError),

    #[error("prompt catalog: {0}")]
    Prompts(#[from] PromptError),
}

impl PipelineError {
    pub fn stage_failed(stage: Stage, error: &anyhow::Error) -> Self {
        PipelineError::StageFailed {
            stage,
            reason: format!("{:#}", error),
        }
    }

    /// Stage that failed, if the error came from a stage
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::StageFailed { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}
