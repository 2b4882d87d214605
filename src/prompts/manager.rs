// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Read-through prompt asset cache
//!
//! Text and image assets are loaded on first use and kept for the lifetime of
//! the manager. There is no eviction.

use image::DynamicImage;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::catalog::{PromptCatalog, SequenceItem, StagePrompt, TextSource, BUILTIN_CATALOG};
use crate::vision::{decode_image_bytes, ImageError, PromptPart, DEFAULT_MAX_IMAGE_SIZE};

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("failed to read prompt asset {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid prompt catalog: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("no prompt configured for '{0}'")]
    UnknownStage(String),

    #[error("no image asset named '{0}'")]
    UnknownImage(String),

    #[error("prompt image {key}: {source}")]
    Image {
        key: String,
        #[source]
        source: ImageError,
    },
}

pub struct PromptManager {
    catalog: PromptCatalog,
    assets_dir: PathBuf,
    texts: RwLock<HashMap<PathBuf, String>>,
    images: RwLock<HashMap<String, Arc<DynamicImage>>>,
}

impl PromptManager {
    pub fn new(catalog: PromptCatalog, assets_dir: impl Into<PathBuf>) -> Self {
        Self {
            catalog,
            assets_dir: assets_dir.into(),
            texts: RwLock::new(HashMap::new()),
            images: RwLock::new(HashMap::new()),
        }
    }

    /// Catalog compiled into the binary; inline texts only
    pub fn builtin() -> Result<Self, PromptError> {
        let catalog: PromptCatalog = toml::from_str(BUILTIN_CATALOG)?;
        Ok(Self::new(catalog, PathBuf::from(".")))
    }

    pub async fn from_file(path: &Path, assets_dir: impl Into<PathBuf>) -> Result<Self, PromptError> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| PromptError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let catalog: PromptCatalog = toml::from_str(&raw)?;
        info!(
            "Loaded prompt catalog from {} ({} stages)",
            path.display(),
            catalog.prompts.len()
        );
        Ok(Self::new(catalog, assets_dir))
    }

    pub fn stage(&self, stage: &str) -> Result<&StagePrompt, PromptError> {
        self.catalog
            .prompts
            .get(stage)
            .ok_or_else(|| PromptError::UnknownStage(stage.to_string()))
    }

    /// Every listed stage exists and every image its examples name is in the asset table.
    /// Asset files themselves are only read on first use.
    pub fn check_stages(&self, stages: &[&str]) -> Result<(), PromptError> {
        for stage in stages {
            let prompt = self.stage(stage)?;
            for item in &prompt.example_sequence {
                if let SequenceItem::Image(key) = item {
                    if !self.catalog.assets.images.contains_key(key) {
                        return Err(PromptError::UnknownImage(key.clone()));
                    }
                }
            }
        }
        Ok(())
    }

    pub async fn system_prompt(&self, stage: &str) -> Result<Option<String>, PromptError> {
        match &self.stage(stage)?.system_prompt {
            Some(source) => Ok(Some(self.text(source).await?)),
            None => Ok(None),
        }
    }

    /// Few-shot examples followed by the task prompt. Callers append per-call inputs.
    pub async fn sequence(&self, stage: &str) -> Result<Vec<PromptPart>, PromptError> {
        let prompt = self.stage(stage)?;
        let mut parts = Vec::with_capacity(prompt.example_sequence.len() + 1);

        for item in &prompt.example_sequence {
            let part = match item {
                SequenceItem::Text(source) => PromptPart::Text(self.text(source).await?),
                SequenceItem::Image(key) => PromptPart::Image(self.image(key).await?),
            };
            parts.push(part);
        }
        parts.push(PromptPart::Text(self.text(&prompt.task_prompt).await?));

        Ok(parts)
    }

    async fn text(&self, source: &TextSource) -> Result<String, PromptError> {
        let relative = match source {
            TextSource::Inline(text) => return Ok(text.trim().to_string()),
            TextSource::File { file } => file,
        };

        let path = self.assets_dir.join(relative);
        if let Some(text) = self.texts.read().await.get(&path) {
            return Ok(text.clone());
        }

        let text = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| PromptError::Io {
                path: path.clone(),
                source,
            })?
            .trim()
            .to_string();
        debug!("Cached prompt text {}", path.display());

        self.texts.write().await.insert(path, text.clone());
        Ok(text)
    }

    async fn image(&self, key: &str) -> Result<Arc<DynamicImage>, PromptError> {
        if let Some(image) = self.images.read().await.get(key) {
            return Ok(Arc::clone(image));
        }

        let relative = self
            .catalog
            .assets
            .images
            .get(key)
            .ok_or_else(|| PromptError::UnknownImage(key.to_string()))?;
        let path = self.assets_dir.join(relative);

        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|source| PromptError::Io {
                path: path.clone(),
                source,
            })?;
        let (image, _) =
            decode_image_bytes(&bytes, DEFAULT_MAX_IMAGE_SIZE).map_err(|source| PromptError::Image {
                key: key.to_string(),
                source,
            })?;
        debug!("Cached prompt image {} from {}", key, path.display());

        let image = Arc::new(image);
        self.images
            .write()
            .await
            .insert(key.to_string(), Arc::clone(&image));
        Ok(image)
    }
}
