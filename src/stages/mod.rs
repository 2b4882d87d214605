// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Sampled model stages: keyword extraction, description, toy restyling

pub mod description;
pub mod keywords;
pub mod style;

pub use description::{DescriptionInput, DescriptionStage};
pub use keywords::{KeywordResponse, KeywordStage};
pub use style::{StyleInput, StyleStage};

use anyhow::Result;

use crate::prompts::PromptManager;
use crate::vision::{GenerationOptions, GenerationRequest, PromptPart};

/// Catalog sequence for `prompt_key` followed by the per-call inputs
pub(crate) async fn build_request(
    prompts: &PromptManager,
    prompt_key: &str,
    inputs: Vec<PromptPart>,
    options: GenerationOptions,
) -> Result<GenerationRequest> {
    let system_prompt = prompts.system_prompt(prompt_key).await?;
    let mut parts = prompts.sequence(prompt_key).await?;
    parts.extend(inputs);
    Ok(GenerationRequest::new(system_prompt, parts).with_options(options))
}
