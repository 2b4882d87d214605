// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use std::path::PathBuf;
use std::time::Duration;

use crate::detection::ScoringWeights;
use crate::sampling::SamplingPlan;

/// Raw upload as received at the boundary
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl UploadedImage {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }
}

/// Complete result of one successful run
#[derive(Debug, Clone, PartialEq)]
pub struct TransformOutcome {
    pub request_id: String,
    pub image_url: String,
    pub description: String,
    pub toy_description: String,
    pub main_object: Option<String>,
    pub detected_objects: Vec<String>,
    pub image_bytes: Vec<u8>,
    pub output_path: PathBuf,
}

/// Tunables for the coordinator
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub keywords: SamplingPlan,
    pub description: SamplingPlan,
    pub style: SamplingPlan,
    /// Base delay before the first retry; doubles on each further retry
    pub backoff_unit: Duration,
    pub similarity_threshold: f64,
    pub min_cluster_size: usize,
    pub scoring: ScoringWeights,
    pub max_upload_bytes: usize,
    /// Parent of the per-request workspaces; the system temp dir when unset
    pub workspace_root: Option<PathBuf>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            keywords: SamplingPlan::new(4, 4, 3),
            description: SamplingPlan::new(4, 4, 3),
            style: SamplingPlan::new(2, 2, 3),
            backoff_unit: Duration::from_secs(1),
            similarity_threshold: 0.5,
            min_cluster_size: 1,
            scoring: ScoringWeights::default(),
            max_upload_bytes: crate::vision::DEFAULT_MAX_IMAGE_SIZE,
            workspace_root: None,
        }
    }
}
