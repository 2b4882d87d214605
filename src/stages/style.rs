// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Toy restyling of a description, grounded on the original photo

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use image::DynamicImage;
use std::sync::Arc;
use tracing::info;

use super::build_request;
use crate::aggregation::select_longest;
use crate::prompts::{PromptManager, STYLE_PROMPT};
use crate::sampling::SampledStage;
use crate::vision::{GenerationOptions, GenerativeModel, PromptPart};

#[derive(Debug, Clone)]
pub struct StyleInput {
    pub image: Arc<DynamicImage>,
    pub description: String,
}

pub struct StyleStage {
    model: Arc<dyn GenerativeModel>,
    prompts: Arc<PromptManager>,
}

impl StyleStage {
    pub fn new(model: Arc<dyn GenerativeModel>, prompts: Arc<PromptManager>) -> Self {
        Self { model, prompts }
    }
}

#[async_trait]
impl SampledStage for StyleStage {
    type Input = StyleInput;
    type Output = String;
    type Aggregate = String;

    fn name(&self) -> &'static str {
        "style"
    }

    async fn run_sample(&self, input: &StyleInput) -> Result<String> {
        let parts = vec![
            PromptPart::Image(Arc::clone(&input.image)),
            PromptPart::Text(format!("Original description: {}", input.description)),
        ];
        let request =
            build_request(&self.prompts, STYLE_PROMPT, parts, GenerationOptions::default()).await?;

        let text = self.model.generate(&request).await?;
        let text = text.trim();
        if text.is_empty() {
            return Err(anyhow!("model returned an empty toy description"));
        }
        Ok(text.to_string())
    }

    fn reduce(&self, outputs: Vec<String>) -> Result<String> {
        let styled =
            select_longest(outputs).map_err(|_| anyhow!("every toy description sample failed"))?;
        info!("Longest toy description: {}", styled);
        Ok(styled)
    }
}
