// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! End-to-end pipeline runs against in-process backends

use super::support::*;
use anyhow::anyhow;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tempfile::TempDir;
use toy_transformer::api::TransformResponse;
use toy_transformer::detection::{BoxXyxy, DetectionCandidate};
use toy_transformer::pipeline::{Backends, ImageProcessor, PipelineError, Stage, UploadedImage};
use toy_transformer::prompts::{PromptCatalog, PromptError, PromptManager};
use toy_transformer::storage::StorageGovernor;

fn cat_photo() -> UploadedImage {
    UploadedImage::new("my cat.png", png_bytes(32, 32, [90, 90, 90]))
}

fn detector_finding_cat() -> MockDetector {
    let mut detector = MockDetector::new();
    detector.expect_detect().returning(|_, _| {
        Ok(vec![DetectionCandidate::from_xyxy(
            BoxXyxy::new(4.0, 4.0, 28.0, 28.0),
            "cat",
            0.9,
        )])
    });
    detector
}

#[tokio::test]
async fn test_single_detection_becomes_main_object() {
    let mut detector = MockDetector::new();
    detector
        .expect_detect()
        .withf(|_, classes| classes.to_vec() == vec!["cat".to_string(), "sofa".to_string()])
        .times(1)
        .returning(|_, _| {
            Ok(vec![DetectionCandidate::from_xyxy(
                BoxXyxy::new(4.0, 4.0, 28.0, 28.0),
                "cat",
                0.9,
            )])
        });
    let h = harness(ScriptedModel::default(), detector).await;

    let outcome = h.processor.process(cat_photo()).await.unwrap();

    assert_eq!(outcome.main_object.as_deref(), Some("cat"));
    assert_eq!(outcome.detected_objects, vec!["cat".to_string()]);
    assert_eq!(outcome.description, DESCRIPTION);
    assert_eq!(outcome.toy_description, TOY_DESCRIPTION);
    assert_eq!(outcome.image_url, GENERATED_URL);
    assert_eq!(h.segmenter.calls.load(Ordering::SeqCst), 1);

    let prompts = h.model.description_prompts.lock().unwrap().clone();
    assert!(!prompts.is_empty());
    assert!(prompts
        .iter()
        .all(|p| p.contains("Keywords: cat") && p.contains("Main keyword of the image: cat")));

    assert_eq!(
        h.synthesizer.prompts.lock().unwrap().as_slice(),
        [TOY_DESCRIPTION.to_string()]
    );
}

#[tokio::test]
async fn test_no_detection_falls_back_to_keywords() {
    let mut detector = MockDetector::new();
    detector.expect_detect().returning(|_, _| Ok(Vec::new()));
    let h = harness(ScriptedModel::default(), detector).await;

    let outcome = h.processor.process(cat_photo()).await.unwrap();

    assert_eq!(outcome.main_object, None);
    assert_eq!(
        outcome.detected_objects,
        vec!["cat".to_string(), "sofa".to_string()]
    );
    assert_eq!(h.segmenter.calls.load(Ordering::SeqCst), 0);

    let prompts = h.model.description_prompts.lock().unwrap().clone();
    assert!(prompts
        .iter()
        .all(|p| p.contains("Keywords: cat, sofa") && !p.contains("Main keyword")));
}

#[tokio::test]
async fn test_unreachable_detector_falls_back_to_keywords() {
    let mut detector = MockDetector::new();
    detector
        .expect_detect()
        .returning(|_, _| Err(anyhow!("connection refused")));
    let h = harness(ScriptedModel::default(), detector).await;

    let outcome = h.processor.process(cat_photo()).await.unwrap();

    assert_eq!(outcome.main_object, None);
    assert_eq!(outcome.detected_objects.len(), 2);
}

#[tokio::test]
async fn test_failed_descriptions_stop_the_run() {
    let mut detector = MockDetector::new();
    detector.expect_detect().returning(|_, _| Ok(Vec::new()));
    let h = harness(ScriptedModel::failing_descriptions(), detector).await;

    let err = h.processor.process(cat_photo()).await.unwrap_err();

    assert_eq!(err.stage(), Some(Stage::Description));
    assert!(err.to_string().contains("description"));
    // 4 samples x 3 tries
    assert_eq!(h.model.description_calls.load(Ordering::SeqCst), 12);
    assert_eq!(h.model.style_calls.load(Ordering::SeqCst), 0);
    assert!(h.synthesizer.prompts.lock().unwrap().is_empty());

    let response = TransformResponse::failure(&err);
    assert!(!response.success);
    assert!(response.image_bytes.is_none());
    assert!(response.error.unwrap().contains("description"));
}

#[tokio::test]
async fn test_generated_bytes_survive_the_response() {
    let mut detector = MockDetector::new();
    detector.expect_detect().returning(|_, _| Ok(Vec::new()));
    let h = harness(ScriptedModel::default(), detector).await;

    let outcome = h.processor.process(cat_photo()).await.unwrap();
    assert_eq!(outcome.image_bytes, h.synthesizer.payload);

    let stored = tokio::fs::read(&outcome.output_path).await.unwrap();
    assert_eq!(stored, h.synthesizer.payload);
    assert!(outcome.output_path.starts_with(h.outputs.dir()));
    let name = outcome.output_path.file_name().unwrap().to_str().unwrap();
    assert_eq!(name, format!("my_cat_{}_toy.png", outcome.request_id));

    let response = TransformResponse::success(outcome);
    let json = serde_json::to_string(&response).unwrap();
    let parsed: TransformResponse = serde_json::from_str(&json).unwrap();
    let decoded = STANDARD.decode(parsed.image_bytes.unwrap()).unwrap();

    assert_eq!(decoded, h.synthesizer.payload);
    let img = image::load_from_memory(&decoded).unwrap();
    assert_eq!((img.width(), img.height()), (16, 16));
}

#[tokio::test]
async fn test_rejects_empty_and_undecodable_uploads() {
    let h = harness(ScriptedModel::default(), MockDetector::new()).await;

    let empty = h
        .processor
        .process(UploadedImage::new("a.png", Vec::new()))
        .await
        .unwrap_err();
    assert!(matches!(empty, PipelineError::InvalidInput(_)));

    let garbage = h
        .processor
        .process(UploadedImage::new("a.png", b"not an image at all".to_vec()))
        .await
        .unwrap_err();
    assert!(matches!(garbage, PipelineError::InvalidInput(_)));
    assert_eq!(h.model.keyword_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_workspace_removed_after_segmented_run() {
    let h = harness(ScriptedModel::default(), detector_finding_cat()).await;

    let outcome = h.processor.process(cat_photo()).await.unwrap();

    assert_eq!(outcome.main_object.as_deref(), Some("cat"));
    assert_eq!(h.segmenter.calls.load(Ordering::SeqCst), 1);
    assert_eq!(entry_count(&h.workspaces), 0);
}

#[tokio::test]
async fn test_workspace_removed_after_failed_run() {
    let mut detector = MockDetector::new();
    detector.expect_detect().returning(|_, _| Ok(Vec::new()));
    let h = harness(ScriptedModel::failing_descriptions(), detector).await;

    let err = h.processor.process(cat_photo()).await.unwrap_err();

    assert_eq!(err.stage(), Some(Stage::Description));
    assert_eq!(entry_count(&h.workspaces), 0);
}

#[tokio::test]
async fn test_missing_mask_stops_the_run() {
    let h = harness_with(
        ScriptedModel::default(),
        detector_finding_cat(),
        FullMaskSegmenter::without_mask(),
        FixedSynthesizer::new(),
    )
    .await;

    let err = h.processor.process(cat_photo()).await.unwrap_err();

    assert_eq!(err.stage(), Some(Stage::Segmentation));
    assert_eq!(h.segmenter.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.model.description_calls.load(Ordering::SeqCst), 0);
    assert!(h.synthesizer.prompts.lock().unwrap().is_empty());
    assert_eq!(entry_count(&h.workspaces), 0);
}

#[tokio::test]
async fn test_failed_keywords_skip_detection() {
    let mut detector = MockDetector::new();
    detector.expect_detect().never();
    let h = harness(ScriptedModel::failing_keywords(), detector).await;

    let err = h.processor.process(cat_photo()).await.unwrap_err();

    assert_eq!(err.stage(), Some(Stage::Keywords));
    // 4 samples x 3 tries
    assert_eq!(h.model.keyword_calls.load(Ordering::SeqCst), 12);
    assert_eq!(h.model.description_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_empty_keywords_skip_detection() {
    let mut detector = MockDetector::new();
    detector.expect_detect().never();
    let h = harness(ScriptedModel::empty_keywords(), detector).await;

    let err = h.processor.process(cat_photo()).await.unwrap_err();

    assert_eq!(err.stage(), Some(Stage::Keywords));
    assert_eq!(h.model.description_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_failed_styles_stop_before_synthesis() {
    let mut detector = MockDetector::new();
    detector.expect_detect().returning(|_, _| Ok(Vec::new()));
    let h = harness(ScriptedModel::failing_styles(), detector).await;

    let err = h.processor.process(cat_photo()).await.unwrap_err();

    assert_eq!(err.stage(), Some(Stage::Style));
    // 2 samples x 3 tries
    assert_eq!(h.model.style_calls.load(Ordering::SeqCst), 6);
    assert!(h.synthesizer.prompts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_non_image_payload_is_not_stored() {
    let mut detector = MockDetector::new();
    detector.expect_detect().returning(|_, _| Ok(Vec::new()));
    let h = harness_with(
        ScriptedModel::default(),
        detector,
        FullMaskSegmenter::default(),
        FixedSynthesizer::with_payload(b"<html>rate limited</html>".to_vec()),
    )
    .await;

    let err = h.processor.process(cat_photo()).await.unwrap_err();

    assert_eq!(err.stage(), Some(Stage::Synthesis));
    assert!(err.to_string().contains("not an image"));
    assert_eq!(h.synthesizer.prompts.lock().unwrap().len(), 1);
    assert_eq!(entry_count(h.outputs.dir()), 0);
}

#[tokio::test]
async fn test_incomplete_catalog_rejected_at_construction() {
    let dir = TempDir::new().unwrap();
    let outputs = Arc::new(StorageGovernor::new(dir.path().join("outputs"), 5).await.unwrap());
    let catalog: PromptCatalog = toml::from_str(
        r#"
        [prompts.keyword_extractor]
        task_prompt = "List the objects."
        "#,
    )
    .unwrap();
    let model = Arc::new(ScriptedModel::default());

    let result = ImageProcessor::new(
        Backends {
            model: model.clone(),
            detector: Arc::new(MockDetector::new()),
            segmenter: Arc::new(FullMaskSegmenter::default()),
            synthesizer: Arc::new(FixedSynthesizer::new()),
            prompts: Arc::new(PromptManager::new(catalog, dir.path())),
        },
        &fast_settings(),
        outputs,
    );

    assert!(matches!(
        result,
        Err(PipelineError::Prompts(PromptError::UnknownStage(ref s))) if s == "image_descriptor"
    ));
    assert_eq!(model.keyword_calls.load(Ordering::SeqCst), 0);
}
