// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Router-level tests for GET /health and POST /transform

use super::support::*;
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tower::util::ServiceExt;
use toy_transformer::api::{
    create_app, AppState, ErrorResponse, HealthResponse, TransformResponse, UPLOAD_FIELD,
};
use toy_transformer::storage::StorageGovernor;

const BOUNDARY: &str = "toy-test-boundary";
const MAX_UPLOAD: usize = 4 * 1024;

async fn test_app(model: ScriptedModel) -> (Router, Harness) {
    let mut detector = MockDetector::new();
    detector.expect_detect().returning(|_, _| Ok(Vec::new()));
    let h = harness(model, detector).await;

    let uploads = StorageGovernor::new(h._dir.path().join("uploads"), 10)
        .await
        .unwrap();
    let state = AppState {
        processor: Arc::clone(&h.processor),
        uploads: Arc::new(uploads),
        max_upload_bytes: MAX_UPLOAD,
    };
    (create_app(Arc::new(state)), h)
}

fn multipart_body(field: &str, file_name: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, file_name
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn transform_request(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/transform")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn json_body<T: DeserializeOwned>(response: Response) -> T {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn count_files(dir: &Path) -> usize {
    let mut count = 0;
    let mut reader = tokio::fs::read_dir(dir).await.unwrap();
    while reader.next_entry().await.unwrap().is_some() {
        count += 1;
    }
    count
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _h) = test_app(ScriptedModel::default()).await;

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let health: HealthResponse = json_body(response).await;
    assert_eq!(health.status, "healthy");
    assert_eq!(health.version, toy_transformer::version::VERSION);
}

#[tokio::test]
async fn test_transform_returns_generated_image() {
    let (app, h) = test_app(ScriptedModel::default()).await;
    let photo = png_bytes(24, 24, [10, 200, 10]);

    let response = app
        .oneshot(transform_request(multipart_body(
            UPLOAD_FIELD,
            "garden cat.png",
            "image/png",
            &photo,
        )))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: TransformResponse = json_body(response).await;
    assert!(body.success, "{:?}", body.error);
    assert_eq!(body.image_url.as_deref(), Some(GENERATED_URL));
    assert_eq!(body.description.as_deref(), Some(DESCRIPTION));
    assert_eq!(body.toy_description.as_deref(), Some(TOY_DESCRIPTION));
    assert_eq!(body.main_object, None);
    assert_eq!(
        body.detected_objects,
        Some(vec!["cat".to_string(), "sofa".to_string()])
    );
    assert!(body.error.is_none());

    let image = STANDARD.decode(body.image_bytes.unwrap()).unwrap();
    assert_eq!(image, h.synthesizer.payload);

    assert_eq!(count_files(&h._dir.path().join("uploads")).await, 1);
    assert_eq!(count_files(h.outputs.dir()).await, 1);
}

#[tokio::test]
async fn test_pipeline_failure_is_reported_in_body() {
    let (app, h) = test_app(ScriptedModel::failing_descriptions()).await;
    let photo = png_bytes(24, 24, [10, 200, 10]);

    let response = app
        .oneshot(transform_request(multipart_body(
            UPLOAD_FIELD,
            "cat.png",
            "image/png",
            &photo,
        )))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: TransformResponse = json_body(response).await;
    assert!(!body.success);
    assert!(body.error.unwrap().contains("description"));
    assert!(body.image_bytes.is_none());
    assert!(body.description.is_none());
    assert_eq!(count_files(h.outputs.dir()).await, 0);
}

#[tokio::test]
async fn test_missing_file_field_is_rejected() {
    let (app, h) = test_app(ScriptedModel::default()).await;

    let response = app
        .oneshot(transform_request(multipart_body(
            "photo",
            "cat.png",
            "image/png",
            &png_bytes(8, 8, [0, 0, 0]),
        )))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error: ErrorResponse = json_body(response).await;
    assert_eq!(error.error_type, "validation_error");
    assert_eq!(
        h.model
            .keyword_calls
            .load(std::sync::atomic::Ordering::SeqCst),
        0
    );
}

#[tokio::test]
async fn test_non_image_upload_is_rejected() {
    let (app, _h) = test_app(ScriptedModel::default()).await;

    let response = app
        .oneshot(transform_request(multipart_body(
            UPLOAD_FIELD,
            "notes.txt",
            "text/plain",
            b"hello",
        )))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn test_oversized_upload_is_rejected() {
    let (app, _h) = test_app(ScriptedModel::default()).await;

    let response = app
        .oneshot(transform_request(multipart_body(
            UPLOAD_FIELD,
            "big.png",
            "image/png",
            &vec![0u8; MAX_UPLOAD + 1],
        )))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let error: ErrorResponse = json_body(response).await;
    assert_eq!(error.error_type, "payload_too_large");
}
