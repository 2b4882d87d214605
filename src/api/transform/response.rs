// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Transform response types

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use crate::pipeline::{PipelineError, TransformOutcome};

/// Result of `POST /transform`. Failures carry only `success` and `error`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Base64 of the generated image exactly as the generator returned it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_bytes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toy_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_object: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_objects: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TransformResponse {
    pub fn success(outcome: TransformOutcome) -> Self {
        Self {
            success: true,
            image_url: Some(outcome.image_url),
            image_bytes: Some(STANDARD.encode(&outcome.image_bytes)),
            description: Some(outcome.description),
            toy_description: Some(outcome.toy_description),
            main_object: outcome.main_object,
            detected_objects: Some(outcome.detected_objects),
            error: None,
        }
    }

    pub fn failure(error: &PipelineError) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
            ..Default::default()
        }
    }
}
