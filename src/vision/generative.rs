// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Generative text/vision model seam used by the sampled pipeline stages

use anyhow::Result;
use async_trait::async_trait;
use image::DynamicImage;
use std::fmt;
use std::sync::Arc;

/// One element of a prompt sequence
#[derive(Clone)]
pub enum PromptPart {
    Text(String),
    Image(Arc<DynamicImage>),
}

impl fmt::Debug for PromptPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromptPart::Text(text) => write!(f, "Text({} chars)", text.len()),
            PromptPart::Image(img) => write!(f, "Image({}x{})", img.width(), img.height()),
        }
    }
}

/// Sampling options forwarded to the backend
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationOptions {
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
    /// Ask the backend for a JSON object instead of free text
    pub json_response: bool,
}

#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    pub system_prompt: Option<String>,
    pub parts: Vec<PromptPart>,
    pub options: GenerationOptions,
}

impl GenerationRequest {
    pub fn new(system_prompt: Option<String>, parts: Vec<PromptPart>) -> Self {
        Self {
            system_prompt,
            parts,
            options: GenerationOptions::default(),
        }
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn image_count(&self) -> usize {
        self.parts
            .iter()
            .filter(|p| matches!(p, PromptPart::Image(_)))
            .count()
    }
}

/// A probabilistic model call: same request, possibly different text every time,
/// and any call may fail transiently.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;

    fn model_name(&self) -> &str;
}
