// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! In-process stand-ins for the model, segmenter and image generator

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use image::{DynamicImage, GrayImage, ImageFormat, Luma, Rgb, RgbImage};
use mockall::mock;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use toy_transformer::detection::{BoxXyxy, DetectionCandidate, ObjectDetector};
use toy_transformer::diffusion::{ImageSynthesizer, SynthesizedImage};
use toy_transformer::pipeline::{Backends, ImageProcessor, PipelineSettings};
use toy_transformer::prompts::PromptManager;
use toy_transformer::segmentation::{SegmentationResult, Segmenter};
use toy_transformer::storage::StorageGovernor;
use toy_transformer::vision::{GenerationRequest, GenerativeModel, PromptPart};

pub const KEYWORD_JSON: &str =
    r#"{"reasoning": "A cat sitting on a sofa", "main_objects": ["cat", "sofa"]}"#;
pub const EMPTY_KEYWORD_JSON: &str = r#"{"reasoning": "Nothing in focus", "main_objects": []}"#;
pub const DESCRIPTION: &str = "A small grey tabby cat with green eyes and a striped tail";
pub const TOY_DESCRIPTION: &str = "A plush grey tabby cat toy with button eyes";
pub const GENERATED_URL: &str = "https://images.test/prompt/toy";

mock! {
    pub Detector {}

    #[async_trait]
    impl ObjectDetector for Detector {
        async fn detect(&self, image: &DynamicImage, classes: &[String]) -> Result<Vec<DetectionCandidate>>;
    }
}

/// Solid-colour PNG of the given size
pub fn png_bytes(width: u32, height: u32, colour: [u8; 3]) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb(colour));
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buffer, ImageFormat::Png)
        .unwrap();
    buffer.into_inner()
}

fn last_text(request: &GenerationRequest) -> &str {
    request
        .parts
        .iter()
        .rev()
        .find_map(|part| match part {
            PromptPart::Text(text) => Some(text.as_str()),
            PromptPart::Image(_) => None,
        })
        .unwrap_or_default()
}

/// Answers each stage from its request shape
#[derive(Default)]
pub struct ScriptedModel {
    pub fail_keywords: bool,
    pub empty_keywords: bool,
    pub fail_descriptions: bool,
    pub fail_styles: bool,
    pub keyword_calls: AtomicUsize,
    pub description_calls: AtomicUsize,
    pub style_calls: AtomicUsize,
    /// Text parts of every description request, joined with '\n'
    pub description_prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn failing_descriptions() -> Self {
        Self {
            fail_descriptions: true,
            ..Default::default()
        }
    }

    pub fn failing_keywords() -> Self {
        Self {
            fail_keywords: true,
            ..Default::default()
        }
    }

    pub fn empty_keywords() -> Self {
        Self {
            empty_keywords: true,
            ..Default::default()
        }
    }

    pub fn failing_styles() -> Self {
        Self {
            fail_styles: true,
            ..Default::default()
        }
    }
}

#[async_trait]
impl GenerativeModel for ScriptedModel {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        if request.options.json_response {
            self.keyword_calls.fetch_add(1, Ordering::SeqCst);
            return match (self.fail_keywords, self.empty_keywords) {
                (true, _) => Err(anyhow!("model overloaded")),
                (false, true) => Ok(EMPTY_KEYWORD_JSON.to_string()),
                (false, false) => Ok(KEYWORD_JSON.to_string()),
            };
        }

        let last = last_text(request);
        if last.starts_with("Original description:") {
            self.style_calls.fetch_add(1, Ordering::SeqCst);
            return if self.fail_styles {
                Err(anyhow!("model overloaded"))
            } else {
                Ok(TOY_DESCRIPTION.to_string())
            };
        }

        self.description_calls.fetch_add(1, Ordering::SeqCst);
        let texts: Vec<&str> = request
            .parts
            .iter()
            .filter_map(|part| match part {
                PromptPart::Text(text) => Some(text.as_str()),
                PromptPart::Image(_) => None,
            })
            .collect();
        self.description_prompts.lock().unwrap().push(texts.join("\n"));

        if self.fail_descriptions {
            Err(anyhow!("model overloaded"))
        } else {
            Ok(DESCRIPTION.to_string())
        }
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// Keeps every pixel as foreground, or finds no mask at all
#[derive(Default)]
pub struct FullMaskSegmenter {
    pub no_mask: bool,
    pub calls: AtomicUsize,
}

impl FullMaskSegmenter {
    pub fn without_mask() -> Self {
        Self {
            no_mask: true,
            ..Default::default()
        }
    }
}

#[async_trait]
impl Segmenter for FullMaskSegmenter {
    async fn segment(
        &self,
        image: &DynamicImage,
        box_xyxy: &BoxXyxy,
    ) -> Result<Option<SegmentationResult>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.no_mask {
            return Ok(None);
        }
        let mask = GrayImage::from_pixel(image.width(), image.height(), Luma([255]));
        Ok(Some(SegmentationResult::isolate(image, mask, box_xyxy)?))
    }
}

/// Returns the same PNG for every prompt and records the prompts
pub struct FixedSynthesizer {
    pub payload: Vec<u8>,
    pub prompts: Mutex<Vec<String>>,
}

impl FixedSynthesizer {
    pub fn new() -> Self {
        Self::with_payload(png_bytes(16, 16, [250, 120, 40]))
    }

    pub fn with_payload(payload: Vec<u8>) -> Self {
        Self {
            payload,
            prompts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ImageSynthesizer for FixedSynthesizer {
    async fn synthesize(&self, description: &str) -> Result<SynthesizedImage> {
        self.prompts.lock().unwrap().push(description.to_string());
        Ok(SynthesizedImage {
            bytes: self.payload.clone(),
            reference_url: GENERATED_URL.to_string(),
        })
    }
}

pub fn fast_settings() -> PipelineSettings {
    PipelineSettings {
        backoff_unit: Duration::from_millis(1),
        ..Default::default()
    }
}

pub struct Harness {
    pub processor: Arc<ImageProcessor>,
    pub model: Arc<ScriptedModel>,
    pub segmenter: Arc<FullMaskSegmenter>,
    pub synthesizer: Arc<FixedSynthesizer>,
    pub outputs: Arc<StorageGovernor>,
    /// Parent of the per-request workspaces
    pub workspaces: PathBuf,
    pub _dir: TempDir,
}

pub async fn harness(model: ScriptedModel, detector: MockDetector) -> Harness {
    harness_with(
        model,
        detector,
        FullMaskSegmenter::default(),
        FixedSynthesizer::new(),
    )
    .await
}

pub async fn harness_with(
    model: ScriptedModel,
    detector: MockDetector,
    segmenter: FullMaskSegmenter,
    synthesizer: FixedSynthesizer,
) -> Harness {
    let dir = TempDir::new().unwrap();
    let outputs = Arc::new(StorageGovernor::new(dir.path().join("outputs"), 5).await.unwrap());
    let workspaces = dir.path().join("workspaces");
    std::fs::create_dir(&workspaces).unwrap();

    let model = Arc::new(model);
    let segmenter = Arc::new(segmenter);
    let synthesizer = Arc::new(synthesizer);
    let settings = PipelineSettings {
        workspace_root: Some(workspaces.clone()),
        ..fast_settings()
    };

    let processor = ImageProcessor::new(
        Backends {
            model: model.clone(),
            detector: Arc::new(detector),
            segmenter: segmenter.clone(),
            synthesizer: synthesizer.clone(),
            prompts: Arc::new(PromptManager::builtin().unwrap()),
        },
        &settings,
        outputs.clone(),
    )
    .unwrap();

    Harness {
        processor: Arc::new(processor),
        model,
        segmenter,
        synthesizer,
        outputs,
        workspaces,
        _dir: dir,
    }
}

/// Entries directly under `dir`
pub fn entry_count(dir: &std::path::Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}
