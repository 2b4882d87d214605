// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Photo-to-toy pipeline coordinator
//!
//! Stages run strictly in sequence:
//!
//! ```text
//! KEYWORDS -> DETECT -> [fallback] -> SEGMENT -> DESCRIBE -> STYLE -> SYNTHESIZE
//! ```
//!
//! When detection finds nothing (or the detector is unreachable) segmentation is
//! skipped and the whole photo is described with the keyword labels. Any other
//! stage failure ends the run. Intermediate files live in a per-request temp
//! directory that is removed when the run ends either way.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::error::{PipelineError, Stage};
use super::types::{PipelineSettings, TransformOutcome, UploadedImage};
use crate::aggregation::FuzzyAggregator;
use crate::detection::{DetectionResult, ObjectDetector, ScoredSelector};
use crate::diffusion::ImageSynthesizer;
use crate::prompts::{PromptManager, DESCRIPTION_PROMPT, KEYWORD_PROMPT, STYLE_PROMPT};
use crate::sampling::ConcurrentSampler;
use crate::segmentation::Segmenter;
use crate::stages::{DescriptionInput, DescriptionStage, KeywordStage, StyleInput, StyleStage};
use crate::storage::StorageGovernor;
use crate::vision::{decode_image_bytes, detect_format, encode_png, format_to_extension, GenerativeModel};

/// External collaborators of the pipeline
pub struct Backends {
    pub model: Arc<dyn GenerativeModel>,
    pub detector: Arc<dyn ObjectDetector>,
    pub segmenter: Arc<dyn Segmenter>,
    pub synthesizer: Arc<dyn ImageSynthesizer>,
    pub prompts: Arc<PromptManager>,
}

pub struct ImageProcessor {
    keyword_stage: KeywordStage,
    keyword_sampler: ConcurrentSampler,
    description_stage: DescriptionStage,
    description_sampler: ConcurrentSampler,
    style_stage: StyleStage,
    style_sampler: ConcurrentSampler,
    detector: Arc<dyn ObjectDetector>,
    selector: ScoredSelector,
    segmenter: Arc<dyn Segmenter>,
    synthesizer: Arc<dyn ImageSynthesizer>,
    outputs: Arc<StorageGovernor>,
    max_upload_bytes: usize,
    workspace_root: Option<PathBuf>,
}

/// Where the description stage looks
struct Subject {
    image: Arc<image::DynamicImage>,
    main_object: Option<String>,
    detected_objects: Vec<String>,
}

impl ImageProcessor {
    /// Fails when the prompt catalog lacks a stage or names an unknown example image
    pub fn new(
        backends: Backends,
        settings: &PipelineSettings,
        outputs: Arc<StorageGovernor>,
    ) -> Result<Self, PipelineError> {
        backends
            .prompts
            .check_stages(&[KEYWORD_PROMPT, DESCRIPTION_PROMPT, STYLE_PROMPT])?;

        let aggregator =
            FuzzyAggregator::new(settings.similarity_threshold, settings.min_cluster_size);

        info!(
            "Image processor initialized: model={}, keywords={:?}, description={:?}, style={:?}",
            backends.model.model_name(),
            settings.keywords,
            settings.description,
            settings.style
        );

        Ok(Self {
            keyword_stage: KeywordStage::new(
                Arc::clone(&backends.model),
                Arc::clone(&backends.prompts),
                aggregator,
            ),
            keyword_sampler: ConcurrentSampler::new(settings.keywords, settings.backoff_unit),
            description_stage: DescriptionStage::new(
                Arc::clone(&backends.model),
                Arc::clone(&backends.prompts),
            ),
            description_sampler: ConcurrentSampler::new(
                settings.description,
                settings.backoff_unit,
            ),
            style_stage: StyleStage::new(backends.model, backends.prompts),
            style_sampler: ConcurrentSampler::new(settings.style, settings.backoff_unit),
            detector: backends.detector,
            selector: ScoredSelector::new(settings.scoring),
            segmenter: backends.segmenter,
            synthesizer: backends.synthesizer,
            outputs,
            max_upload_bytes: settings.max_upload_bytes,
            workspace_root: settings.workspace_root.clone(),
        })
    }

    /// Run the whole pipeline for one upload
    pub async fn process(&self, upload: UploadedImage) -> Result<TransformOutcome, PipelineError> {
        let request_id = Uuid::new_v4().simple().to_string()[..8].to_string();
        let span = info_span!("transform", request_id = %request_id);

        async move {
            info!(
                "Processing upload '{}' ({} bytes)",
                upload.file_name,
                upload.bytes.len()
            );
            let result = self.run(&request_id, upload).await;
            match &result {
                Ok(outcome) => info!("Transform complete: {}", outcome.output_path.display()),
                Err(e) => error!("Transform failed: {}", e),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run(
        &self,
        request_id: &str,
        upload: UploadedImage,
    ) -> Result<TransformOutcome, PipelineError> {
        if upload.bytes.is_empty() {
            return Err(PipelineError::InvalidInput("uploaded file is empty".to_string()));
        }
        let (decoded, info) = decode_image_bytes(&upload.bytes, self.max_upload_bytes)
            .map_err(|e| PipelineError::InvalidInput(e.to_string()))?;
        info!("Image loaded: {}x{} {:?}", info.width, info.height, info.format);

        let mut builder = tempfile::Builder::new();
        builder.prefix("toy-transform-");
        let workspace = match &self.workspace_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .map_err(PipelineError::Workspace)?;
        let input_path = workspace
            .path()
            .join(format!("input.{}", format_to_extension(info.format)));
        tokio::fs::write(&input_path, &upload.bytes)
            .await
            .map_err(PipelineError::Workspace)?;

        let image = Arc::new(decoded);

        let keywords = self
            .keyword_sampler
            .run(&self.keyword_stage, &image)
            .await
            .map_err(|e| PipelineError::stage_failed(Stage::Keywords, &e))?;
        info!("Keywords extracted: {:?}", keywords.main_objects);

        let detection = self.detect(&image, &keywords.main_objects).await;
        let subject = match detection.best_candidate {
            Some(best) => {
                info!(
                    "Main object detected: {} (classes {:?})",
                    best.class_label, detection.all_labels
                );
                let segmented = self.segment(&image, &best.box_xyxy, &workspace).await?;
                Subject {
                    image: Arc::new(segmented),
                    main_object: Some(best.class_label),
                    detected_objects: detection.all_labels,
                }
            }
            None => {
                warn!("No object detected; describing the whole image");
                Subject {
                    image: Arc::clone(&image),
                    main_object: None,
                    detected_objects: keywords.main_objects,
                }
            }
        };

        let description_input = DescriptionInput {
            image: subject.image,
            keywords: subject.detected_objects.clone(),
            main_keyword: subject.main_object.clone(),
        };
        let description = self
            .description_sampler
            .run(&self.description_stage, &description_input)
            .await
            .map_err(|e| PipelineError::stage_failed(Stage::Description, &e))?;

        let style_input = StyleInput {
            image: Arc::clone(&image),
            description: description.clone(),
        };
        let toy_description = self
            .style_sampler
            .run(&self.style_stage, &style_input)
            .await
            .map_err(|e| PipelineError::stage_failed(Stage::Style, &e))?;

        let synthesized = self
            .synthesizer
            .synthesize(&toy_description)
            .await
            .map_err(|e| PipelineError::stage_failed(Stage::Synthesis, &e))?;
        let format = detect_format(&synthesized.bytes).map_err(|e| PipelineError::StageFailed {
            stage: Stage::Synthesis,
            reason: format!("generated payload is not an image: {}", e),
        })?;
        image::load_from_memory_with_format(&synthesized.bytes, format).map_err(|e| {
            PipelineError::StageFailed {
                stage: Stage::Synthesis,
                reason: format!("generated image does not decode: {}", e),
            }
        })?;
        info!("Image generated: {}", synthesized.reference_url);

        let name = output_name(&upload.file_name, request_id, format_to_extension(format));
        let output_path = self.outputs.store(&name, &synthesized.bytes).await?;

        drop(workspace);

        Ok(TransformOutcome {
            request_id: request_id.to_string(),
            image_url: synthesized.reference_url,
            description,
            toy_description,
            main_object: subject.main_object,
            detected_objects: subject.detected_objects,
            image_bytes: synthesized.bytes,
            output_path,
        })
    }

    /// Detector call plus scoring. Transport failures degrade to the empty result.
    async fn detect(&self, image: &image::DynamicImage, classes: &[String]) -> DetectionResult {
        match self.detector.detect(image, classes).await {
            Ok(candidates) => {
                info!("Detector returned {} candidates", candidates.len());
                self.selector
                    .select(candidates, image.width(), image.height())
            }
            Err(e) => {
                warn!("{} stage unavailable, falling back: {:#}", Stage::Detection, e);
                DetectionResult::empty()
            }
        }
    }

    /// Isolate the object and keep the intermediate images in the workspace
    async fn segment(
        &self,
        image: &image::DynamicImage,
        box_xyxy: &crate::detection::BoxXyxy,
        workspace: &TempDir,
    ) -> Result<image::DynamicImage, PipelineError> {
        let segmentation = self
            .segmenter
            .segment(image, box_xyxy)
            .await
            .map_err(|e| PipelineError::stage_failed(Stage::Segmentation, &e))?
            .ok_or_else(|| PipelineError::StageFailed {
                stage: Stage::Segmentation,
                reason: "segmenter returned no mask".to_string(),
            })?;

        for (file, img) in [
            ("segmented.png", &segmentation.isolated_object_image),
            ("box_crop.png", &segmentation.isolated_box_crop),
        ] {
            let path = workspace.path().join(file);
            let bytes = encode_png(img).map_err(|e| PipelineError::StageFailed {
                stage: Stage::Segmentation,
                reason: e.to_string(),
            })?;
            tokio::fs::write(&path, bytes)
                .await
                .map_err(PipelineError::Workspace)?;
        }
        info!("Object segmented into {}", workspace.path().display());

        Ok(segmentation.isolated_object_image)
    }
}

/// `{stem}_{id}_toy.{ext}` with the stem reduced to safe characters
pub fn output_name(file_name: &str, request_id: &str, extension: &str) -> String {
    let stem: String = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    let stem = if stem.is_empty() { "upload".to_string() } else { stem };
    format!("{}_{}_toy.{}", stem, request_id, extension)
}
