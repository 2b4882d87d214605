// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Prompt catalog schema and the built-in default catalog

use serde::Deserialize;
use std::collections::HashMap;

pub const KEYWORD_PROMPT: &str = "keyword_extractor";
pub const DESCRIPTION_PROMPT: &str = "image_descriptor";
pub const STYLE_PROMPT: &str = "toy_desc_modifier";

/// Text given inline or as a path relative to the asset directory
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TextSource {
    Inline(String),
    File { file: String },
}

/// One few-shot example item; images are keys into `[assets.images]`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "lowercase")]
pub enum SequenceItem {
    Text(TextSource),
    Image(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StagePrompt {
    #[serde(default)]
    pub system_prompt: Option<TextSource>,
    pub task_prompt: TextSource,
    #[serde(default)]
    pub example_sequence: Vec<SequenceItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AssetTable {
    #[serde(default)]
    pub images: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PromptCatalog {
    #[serde(default)]
    pub prompts: HashMap<String, StagePrompt>,
    #[serde(default)]
    pub assets: AssetTable,
}

pub const BUILTIN_CATALOG: &str = r#"
[prompts.keyword_extractor]
system_prompt = "You identify the physical objects that are the subject of a photo."
task_prompt = """
List the main objects visible in the image. Respond with a JSON object of the form
{"reasoning": "<one sentence>", "main_objects": ["<short noun phrase>", ...]}.
Use short, common English nouns. Do not list background elements."""

[prompts.image_descriptor]
system_prompt = "You write precise visual descriptions of isolated objects."
task_prompt = """
Describe the object in the image in one paragraph: its shape, colours, materials,
proportions and distinguishing details. Describe only the object."""

[prompts.toy_desc_modifier]
system_prompt = "You rewrite object descriptions as descriptions of toys."
task_prompt = """
Rewrite the original description so that it describes the same object as a cute,
colourful toy with rounded shapes and a plastic or plush finish, suitable as a prompt
for an image generator. Keep the identifying details. Respond with the description only."""
"#;
