// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Box-prompted segmenter sidecar client

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use image::DynamicImage;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use super::result::SegmentationResult;
use crate::detection::BoxXyxy;
use crate::vision::{decode_base64_image, encode_base64_png, DEFAULT_MAX_IMAGE_SIZE};

/// Produces an object mask for a box prompt. `Ok(None)` means no mask was found.
#[async_trait]
pub trait Segmenter: Send + Sync {
    async fn segment(
        &self,
        image: &DynamicImage,
        box_xyxy: &BoxXyxy,
    ) -> Result<Option<SegmentationResult>>;
}

#[derive(Serialize)]
struct SegmentRequest {
    image: String,
    box_xyxy: [f32; 4],
}

#[derive(Debug, Deserialize)]
struct SegmentResponse {
    mask: Option<String>,
}

/// Client for a segmenter sidecar exposing `/v1/segment`
pub struct SegmenterClient {
    client: Client,
    endpoint: String,
}

impl SegmenterClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        let endpoint = endpoint.trim_end_matches('/').to_string();
        info!("Segmenter client configured: endpoint={}", endpoint);

        Ok(Self { client, endpoint })
    }

    pub async fn health_check(&self) -> bool {
        match self
            .client
            .get(format!("{}/health", self.endpoint))
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!("Segmenter health check failed: {}", e);
                false
            }
        }
    }
}

#[async_trait]
impl Segmenter for SegmenterClient {
    async fn segment(
        &self,
        image: &DynamicImage,
        box_xyxy: &BoxXyxy,
    ) -> Result<Option<SegmentationResult>> {
        let body = SegmentRequest {
            image: encode_base64_png(image)?,
            box_xyxy: [box_xyxy.x1, box_xyxy.y1, box_xyxy.x2, box_xyxy.y2],
        };

        let url = format!("{}/v1/segment", self.endpoint);
        debug!("Segmenter POST {}", url);

        let response = self.client.post(&url).json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("segmenter sidecar returned {}: {}", status, text));
        }

        let parsed: SegmentResponse = response.json().await?;
        let Some(mask_b64) = parsed.mask.filter(|m| !m.is_empty()) else {
            return Ok(None);
        };

        let (mask, _) = decode_base64_image(&mask_b64, DEFAULT_MAX_IMAGE_SIZE)?;
        let result = SegmentationResult::isolate(image, mask.to_luma8(), box_xyxy)?;
        Ok(Some(result))
    }
}
