// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Upload client for `POST /transform`

use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use super::ClientArgs;
use crate::api::{TransformResponse, UPLOAD_FIELD};
use crate::vision::{detect_format, format_to_extension};

/// Guess the upload MIME type from the file extension
pub fn mime_for_path(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("bmp") => "image/bmp",
        _ => "image/jpeg",
    }
}

/// Default output path: `<stem>_toy.<ext>` beside the input
pub fn default_output_path(input: &Path, extension: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("upload");
    input.with_file_name(format!("{}_toy.{}", stem, extension))
}

/// Upload the photo, print the result, save the generated image
pub async fn run(args: ClientArgs) -> Result<()> {
    let bytes = tokio::fs::read(&args.file)
        .await
        .with_context(|| format!("failed to read {}", args.file.display()))?;
    let file_name = args
        .file
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload.jpg")
        .to_string();

    let part = Part::bytes(bytes)
        .file_name(file_name)
        .mime_str(mime_for_path(&args.file))?;
    let form = Form::new().part(UPLOAD_FIELD, part);

    let client = Client::builder()
        .timeout(Duration::from_secs(args.timeout_secs))
        .build()?;
    let url = format!("{}/transform", args.server.trim_end_matches('/'));
    debug!("POST {}", url);

    let response = client.post(&url).multipart(form).send().await?;
    if !response.status().is_success() {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        return Err(anyhow!("server returned {}: {}", status, text));
    }

    let result: TransformResponse = response.json().await?;
    if !result.success {
        return Err(anyhow!(
            "transformation failed: {}",
            result.error.unwrap_or_else(|| "unknown error".to_string())
        ));
    }

    println!("Image transformed successfully!");
    if let Some(url) = &result.image_url {
        println!("Image URL: {}", url);
    }
    if let Some(description) = &result.description {
        println!("Description: {}", description);
    }
    if let Some(toy) = &result.toy_description {
        println!("Toy description: {}", toy);
    }

    let encoded = result
        .image_bytes
        .ok_or_else(|| anyhow!("response did not include image bytes"))?;
    let image = STANDARD.decode(encoded)?;
    let extension = detect_format(&image)
        .map(format_to_extension)
        .unwrap_or("png");
    let output = args
        .output
        .unwrap_or_else(|| default_output_path(&args.file, extension));

    tokio::fs::write(&output, &image)
        .await
        .with_context(|| format!("failed to write {}", output.display()))?;
    info!("Saved {} bytes to {}", image.len(), output.display());
    println!("Saved: {}", output.display());

    Ok(())
}
