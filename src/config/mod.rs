// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Service configuration
//!
//! Loaded from an optional TOML file, then overridden from the environment,
//! then validated. Every field has a default so an empty file (or no file) is a
//! valid configuration.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::detection::ScoringWeights;
use crate::diffusion::ImageSize;
use crate::pipeline::PipelineSettings;
use crate::sampling::SamplingPlan;
use crate::vision::DEFAULT_MAX_IMAGE_SIZE;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {var}: '{value}'")]
    InvalidEnv { var: String, value: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            max_upload_bytes: DEFAULT_MAX_IMAGE_SIZE,
        }
    }
}

/// Vision-language model sidecar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8081".to_string(),
            model: "qwen2.5-vl-7b-instruct".to_string(),
            api_key: None,
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub endpoint: String,
    pub timeout_secs: u64,
    pub weights: ScoringWeights,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8082".to_string(),
            timeout_secs: 60,
            weights: ScoringWeights::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmenterConfig {
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8083".to_string(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageGenerationConfig {
    pub base_url: String,
    /// `WIDTHxHEIGHT`; omitted lets the service choose
    pub size: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ImageGenerationConfig {
    fn default() -> Self {
        Self {
            base_url: "https://image.pollinations.ai/prompt/".to_string(),
            size: None,
            timeout_secs: 120,
        }
    }
}

impl ImageGenerationConfig {
    pub fn image_size(&self) -> Result<Option<ImageSize>, ConfigError> {
        self.size
            .as_deref()
            .map(|s| ImageSize::parse(s).map_err(ConfigError::Invalid))
            .transpose()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub upload_dir: PathBuf,
    pub output_dir: PathBuf,
    pub max_uploads: usize,
    pub max_outputs: usize,
    /// Where per-request workspaces are created; the system temp dir when unset
    pub workspace_dir: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("uploads"),
            output_dir: PathBuf::from("outputs"),
            max_uploads: 50,
            max_outputs: 50,
            workspace_dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    pub keywords: SamplingPlan,
    pub description: SamplingPlan,
    pub style: SamplingPlan,
    pub backoff_ms: u64,
    pub similarity_threshold: f64,
    pub min_cluster_size: usize,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        let pipeline = PipelineSettings::default();
        Self {
            keywords: pipeline.keywords,
            description: pipeline.description,
            style: pipeline.style,
            backoff_ms: pipeline.backoff_unit.as_millis() as u64,
            similarity_threshold: pipeline.similarity_threshold,
            min_cluster_size: pipeline.min_cluster_size,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    /// TOML prompt catalog; the built-in catalog is used when unset
    pub catalog: Option<PathBuf>,
    pub assets_dir: PathBuf,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            catalog: None,
            assets_dir: PathBuf::from("assets"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub path: PathBuf,
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("logs/toy_transformer.log"),
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub models: ModelConfig,
    pub detector: DetectorConfig,
    pub segmenter: SegmenterConfig,
    pub image_generation: ImageGenerationConfig,
    pub storage: StorageConfig,
    pub sampling: SamplingConfig,
    pub prompts: PromptConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// File (if any), then process environment, then validation
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|var| env::var(var).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: AppConfig = toml::from_str(&raw)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Apply overrides from a variable lookup (the process environment in production)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        if let Some(v) = text("TOY_HOST") {
            self.server.host = v;
        }
        if let Some(v) = text("TOY_PORT") {
            self.server.port = parse_var("TOY_PORT", &v)?;
        }
        if let Some(v) = text("VLM_ENDPOINT") {
            self.models.endpoint = v;
        }
        if let Some(v) = text("VLM_MODEL") {
            self.models.model = v;
        }
        if let Some(v) = text("VLM_API_KEY") {
            self.models.api_key = Some(v);
        }
        if let Some(v) = text("DETECTOR_ENDPOINT") {
            self.detector.endpoint = v;
        }
        if let Some(v) = text("SEGMENTER_ENDPOINT") {
            self.segmenter.endpoint = v;
        }
        if let Some(v) = text("IMAGE_GEN_BASE_URL") {
            self.image_generation.base_url = v;
        }
        if let Some(v) = text("UPLOAD_DIR") {
            self.storage.upload_dir = PathBuf::from(v);
        }
        if let Some(v) = text("OUTPUT_DIR") {
            self.storage.output_dir = PathBuf::from(v);
        }
        if let Some(v) = text("WORKSPACE_DIR") {
            self.storage.workspace_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = text("MAX_UPLOADS") {
            self.storage.max_uploads = parse_var("MAX_UPLOADS", &v)?;
        }
        if let Some(v) = text("MAX_OUTPUTS") {
            self.storage.max_outputs = parse_var("MAX_OUTPUTS", &v)?;
        }
        if let Some(v) = text("LOG_PATH") {
            self.logging.path = PathBuf::from(v);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.storage.max_uploads == 0 || self.storage.max_outputs == 0 {
            return invalid("storage capacities must be greater than 0".to_string());
        }
        if self.server.max_upload_bytes == 0 {
            return invalid("max_upload_bytes must be greater than 0".to_string());
        }

        for (name, endpoint) in [
            ("models.endpoint", &self.models.endpoint),
            ("detector.endpoint", &self.detector.endpoint),
            ("segmenter.endpoint", &self.segmenter.endpoint),
            ("image_generation.base_url", &self.image_generation.base_url),
        ] {
            if endpoint.trim().is_empty() {
                return invalid(format!("{} must not be empty", name));
            }
        }
        self.image_generation.image_size()?;

        self.detector.weights.validate().map_err(ConfigError::Invalid)?;

        let threshold = self.sampling.similarity_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return invalid(format!(
                "similarity_threshold must be within [0, 1], got {}",
                threshold
            ));
        }
        if self.sampling.min_cluster_size == 0 {
            return invalid("min_cluster_size must be greater than 0".to_string());
        }

        for (stage, plan) in [
            ("keywords", &self.sampling.keywords),
            ("description", &self.sampling.description),
            ("style", &self.sampling.style),
        ] {
            if plan.samples == 0 {
                return invalid(format!("{}: samples must be greater than 0", stage));
            }
            if plan.concurrency > plan.samples {
                return invalid(format!(
                    "{}: concurrency {} exceeds samples {}",
                    stage, plan.concurrency, plan.samples
                ));
            }
            if plan.max_retries == 0 {
                return invalid(format!("{}: max_retries must be greater than 0", stage));
            }
        }
        Ok(())
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            keywords: self.sampling.keywords,
            description: self.sampling.description,
            style: self.sampling.style,
            backoff_unit: Duration::from_millis(self.sampling.backoff_ms),
            similarity_threshold: self.sampling.similarity_threshold,
            min_cluster_size: self.sampling.min_cluster_size,
            scoring: self.detector.weights,
            max_upload_bytes: self.server.max_upload_bytes,
            workspace_root: self.storage.workspace_dir.clone(),
        }
    }
}

fn parse_var<T: std::str::FromStr>(var: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        var: var.to_string(),
        value: value.to_string(),
    })
}
