// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Transform endpoint handler

use axum::{extract::State, Json};
use axum_extra::extract::Multipart;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::response::TransformResponse;
use crate::api::errors::ApiError;
use crate::api::http_server::AppState;
use crate::pipeline::UploadedImage;

/// Multipart field carrying the photo
pub const UPLOAD_FIELD: &str = "file";

/// POST /transform - Turn an uploaded photo into a toy rendition
///
/// Rejects missing, oversized or non-image uploads with a 4xx status before any
/// model is called. Pipeline failures are reported in the body with
/// `success: false`.
pub async fn transform_handler(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<TransformResponse>, ApiError> {
    let upload = read_upload(&mut multipart, state.max_upload_bytes).await?;
    info!(
        "Received upload '{}' ({} bytes)",
        upload.file_name,
        upload.bytes.len()
    );

    let staged_name = format!(
        "{}_{}",
        &Uuid::new_v4().simple().to_string()[..8],
        sanitize_file_name(&upload.file_name)
    );
    state
        .uploads
        .store(&staged_name, &upload.bytes)
        .await
        .map_err(|e| ApiError::InternalError(format!("failed to stage upload: {}", e)))?;

    match state.processor.process(upload).await {
        Ok(outcome) => Ok(Json(TransformResponse::success(outcome))),
        Err(e) => {
            warn!("Transform failed: {:?}", e);
            Ok(Json(TransformResponse::failure(&e)))
        }
    }
}

async fn read_upload(
    multipart: &mut Multipart,
    max_upload_bytes: usize,
) -> Result<UploadedImage, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::InvalidRequest(format!("Multipart error: {}", e)))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let content_type = field.content_type().unwrap_or("").to_string();
        if !content_type.starts_with("image/") {
            return Err(ApiError::UnsupportedMediaType(content_type));
        }
        let file_name = field.file_name().unwrap_or("upload").to_string();

        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::InvalidRequest(format!("Read error: {}", e)))?;
        if data.len() > max_upload_bytes {
            return Err(ApiError::PayloadTooLarge {
                size: data.len(),
                limit: max_upload_bytes,
            });
        }
        if data.is_empty() {
            return Err(ApiError::ValidationError {
                field: UPLOAD_FIELD.to_string(),
                message: "uploaded file is empty".to_string(),
            });
        }

        return Ok(UploadedImage::new(file_name, data.to_vec()));
    }

    Err(ApiError::ValidationError {
        field: UPLOAD_FIELD.to_string(),
        message: format!("multipart field '{}' is required", UPLOAD_FIELD),
    })
}

/// Base name only, restricted to characters safe in a file name
fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}
