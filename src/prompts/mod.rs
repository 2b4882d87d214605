// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Prompt catalog and asset cache

pub mod catalog;
pub mod manager;

pub use catalog::{
    PromptCatalog, SequenceItem, StagePrompt, TextSource, DESCRIPTION_PROMPT, KEYWORD_PROMPT,
    STYLE_PROMPT,
};
pub use manager::{PromptError, PromptManager};
