// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Object description: vision samples reduced to the longest text

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use image::DynamicImage;
use std::sync::Arc;
use tracing::info;

use super::build_request;
use crate::aggregation::select_longest;
use crate::prompts::{PromptManager, DESCRIPTION_PROMPT};
use crate::sampling::SampledStage;
use crate::vision::{GenerationOptions, GenerativeModel, PromptPart};

/// Labels beyond this many are not shown to the model
const MAX_PROMPT_KEYWORDS: usize = 4;

#[derive(Debug, Clone)]
pub struct DescriptionInput {
    /// Isolated object on white, or the whole photo when detection fell back
    pub image: Arc<DynamicImage>,
    pub keywords: Vec<String>,
    pub main_keyword: Option<String>,
}

impl DescriptionInput {
    fn prompt_parts(&self) -> Vec<PromptPart> {
        let shown = &self.keywords[..self.keywords.len().min(MAX_PROMPT_KEYWORDS)];
        let mut parts = vec![
            PromptPart::Image(Arc::clone(&self.image)),
            PromptPart::Text(format!("Keywords: {}", shown.join(", "))),
        ];
        if let Some(main) = &self.main_keyword {
            parts.push(PromptPart::Text(format!("Main keyword of the image: {}", main)));
        }
        parts
    }
}

pub struct DescriptionStage {
    model: Arc<dyn GenerativeModel>,
    prompts: Arc<PromptManager>,
}

impl DescriptionStage {
    pub fn new(model: Arc<dyn GenerativeModel>, prompts: Arc<PromptManager>) -> Self {
        Self { model, prompts }
    }
}

#[async_trait]
impl SampledStage for DescriptionStage {
    type Input = DescriptionInput;
    type Output = String;
    type Aggregate = String;

    fn name(&self) -> &'static str {
        "description"
    }

    async fn run_sample(&self, input: &DescriptionInput) -> Result<String> {
        let options = GenerationOptions {
            temperature: Some(0.95),
            ..Default::default()
        };
        let request =
            build_request(&self.prompts, DESCRIPTION_PROMPT, input.prompt_parts(), options).await?;

        let text = self.model.generate(&request).await?;
        let text = text.trim();
        if text.is_empty() {
            return Err(anyhow!("model returned an empty description"));
        }
        Ok(text.to_string())
    }

    fn reduce(&self, outputs: Vec<String>) -> Result<String> {
        let description =
            select_longest(outputs).map_err(|_| anyhow!("every description sample failed"))?;
        info!("Longest description: {}", description);
        Ok(description)
    }
}
