// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Open-vocabulary detector sidecar client

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use image::DynamicImage;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::types::{BoxXyxy, DetectionCandidate};
use crate::vision::encode_base64_png;

/// Finds instances of the given class vocabulary in an image
#[async_trait]
pub trait ObjectDetector: Send + Sync {
    async fn detect(
        &self,
        image: &DynamicImage,
        classes: &[String],
    ) -> Result<Vec<DetectionCandidate>>;
}

#[derive(Serialize)]
struct DetectRequest<'a> {
    image: String,
    classes: &'a [String],
}

#[derive(Debug, Deserialize)]
struct DetectResponse {
    #[serde(default)]
    detections: Vec<RawDetection>,
}

#[derive(Debug, Deserialize)]
struct RawDetection {
    box_xyxy: [f32; 4],
    class_id: usize,
    confidence: f32,
}

/// Client for a detector sidecar exposing `/v1/detect`
pub struct DetectorClient {
    client: Client,
    endpoint: String,
}

impl DetectorClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        let endpoint = endpoint.trim_end_matches('/').to_string();
        info!("Detector client configured: endpoint={}", endpoint);

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
                debug!("Detector health check failed: {}", e);
                false
            }
        }
    }
}

/// Map raw sidecar hits onto the vocabulary, dropping unknown class ids
fn into_candidates(raw: Vec<RawDetection>, classes: &[String]) -> Vec<DetectionCandidate> {
    raw.into_iter()
        .filter_map(|d| match classes.get(d.class_id) {
            Some(label) => {
                let [x1, y1, x2, y2] = d.box_xyxy;
                Some(DetectionCandidate::from_xyxy(
                    BoxXyxy::new(x1, y1, x2, y2),
                    label.clone(),
                    d.confidence,
                ))
            }
            None => {
                warn!(
                    "Detector returned class id {} outside vocabulary of {}",
                    d.class_id,
                    classes.len()
                );
                None
            }
        })
        .collect()
}

#[async_trait]
impl ObjectDetector for DetectorClient {
    async fn detect(
        &self,
        image: &DynamicImage,
        classes: &[String],
    ) -> Result<Vec<DetectionCandidate>> {
        let body = DetectRequest {
            image: encode_base64_png(image)?,
            classes,
        };

        let url = format!("{}/v1/detect", self.endpoint);
        debug!("Detector POST {} ({} classes)", url, classes.len());

        let response = self.client.post(&url).json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("detector sidecar returned {}: {}", status, text));
        }

        let parsed: DetectResponse = response.json().await?;
        Ok(into_candidates(parsed.detections, classes))
    }
}
