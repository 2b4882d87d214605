// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Keyword extraction: JSON-mode samples merged by label consensus

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use super::build_request;
use crate::aggregation::{dedup_preserving_order, FuzzyAggregator};
use crate::prompts::{PromptManager, KEYWORD_PROMPT};
use crate::sampling::SampledStage;
use crate::vision::{GenerationOptions, GenerativeModel, PromptPart};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeywordResponse {
    pub reasoning: String,
    pub main_objects: Vec<String>,
}

impl KeywordResponse {
    /// Parse a model reply, tolerating a surrounding markdown code fence
    pub fn parse(raw: &str) -> Result<Self> {
        let body = strip_code_fence(raw);
        serde_json::from_str(body).with_context(|| format!("malformed keyword response: {}", raw))
    }
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

pub struct KeywordStage {
    model: Arc<dyn GenerativeModel>,
    prompts: Arc<PromptManager>,
    aggregator: FuzzyAggregator,
}

impl KeywordStage {
    pub fn new(
        model: Arc<dyn GenerativeModel>,
        prompts: Arc<PromptManager>,
        aggregator: FuzzyAggregator,
    ) -> Self {
        Self {
            model,
            prompts,
            aggregator,
        }
    }
}

#[async_trait]
impl SampledStage for KeywordStage {
    type Input = Arc<DynamicImage>;
    type Output = KeywordResponse;
    type Aggregate = KeywordResponse;

    fn name(&self) -> &'static str {
        "keywords"
    }

    async fn run_sample(&self, image: &Arc<DynamicImage>) -> Result<KeywordResponse> {
        let options = GenerationOptions {
            max_output_tokens: Some(512),
            json_response: true,
            ..Default::default()
        };
        let request = build_request(
            &self.prompts,
            KEYWORD_PROMPT,
            vec![PromptPart::Image(Arc::clone(image))],
            options,
        )
        .await?;

        let raw = self.model.generate(&request).await?;
        KeywordResponse::parse(&raw)
    }

    fn reduce(&self, outputs: Vec<KeywordResponse>) -> Result<KeywordResponse> {
        let sample_count = outputs.len();
        let mut labels = Vec::new();
        let mut reasonings = Vec::new();

        for output in outputs {
            labels.extend(
                output
                    .main_objects
                    .into_iter()
                    .map(|label| label.trim().to_string())
                    .filter(|label| !label.is_empty()),
            );
            let reasoning = output.reasoning.trim();
            if !reasoning.is_empty() {
                reasonings.push(reasoning.to_string());
            }
        }

        if labels.is_empty() {
            return Err(anyhow!(
                "no main objects in {} keyword samples",
                sample_count
            ));
        }
        debug!("Keyword labels before consensus: {:?}", labels);

        let main_objects = if sample_count > 1 {
            self.aggregator.aggregate_or_fallback(&labels)
        } else {
            labels
        };
        info!("Keywords: {:?}", main_objects);

        Ok(KeywordResponse {
            reasoning: dedup_preserving_order(&reasonings).join("\n"),
            main_objects,
        })
    }
}
