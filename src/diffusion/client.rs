// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Prompt-to-image backend client (GET `{base_url}/{prompt}`)

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Raw synthesizer payload plus the URL it was fetched from
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedImage {
    pub bytes: Vec<u8>,
    pub reference_url: String,
}

/// Turns a text description into an encoded image
#[async_trait]
pub trait ImageSynthesizer: Send + Sync {
    async fn synthesize(&self, description: &str) -> Result<SynthesizedImage>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    /// Parse a size string like "1024x1024" into an ImageSize
    pub fn parse(s: &str) -> std::result::Result<Self, String> {
        let parts: Vec<&str> = s.split('x').collect();
        if parts.len() != 2 {
            return Err(format!(
                "invalid size format '{}'; expected WIDTHxHEIGHT",
                s
            ));
        }
        let width = parts[0]
            .parse::<u32>()
            .map_err(|_| format!("invalid width in '{}'", s))?;
        let height = parts[1]
            .parse::<u32>()
            .map_err(|_| format!("invalid height in '{}'", s))?;
        if width == 0 || height == 0 {
            return Err(format!("width and height must be > 0 in '{}'", s));
        }
        Ok(Self { width, height })
    }
}

/// Client for a prompt-in-path image generation service
pub struct PromptImageClient {
    client: Client,
    base_url: Url,
    size: Option<ImageSize>,
}

impl PromptImageClient {
    pub fn new(base_url: &str, size: Option<ImageSize>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(anyhow!("image generation URL cannot take a path: {}", base_url));
        }

        info!(
            "Image generation client configured: base_url={}, size={:?}",
            base_url, size
        );

        Ok(Self {
            client,
            base_url,
            size,
        })
    }

    /// Request URL for a description; the description becomes one percent-encoded path segment
    pub fn request_url(&self, description: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("image generation URL cannot take a path"))?
            .pop_if_empty()
            .push(description);

        if let Some(size) = self.size {
            url.query_pairs_mut()
                .append_pair("width", &size.width.to_string())
                .append_pair("height", &size.height.to_string());
        }
        Ok(url)
    }
}

#[async_trait]
impl ImageSynthesizer for PromptImageClient {
    async fn synthesize(&self, description: &str) -> Result<SynthesizedImage> {
        if description.trim().is_empty() {
            return Err(anyhow!("description must not be empty"));
        }

        let url = self.request_url(description)?;
        debug!("Image generation GET {}", url);

        let start = std::time::Instant::now();
        let response = self.client.get(url.clone()).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "image generation service returned {}: {}",
                status,
                text
            ));
        }

        let bytes = response.bytes().await?.to_vec();
        if bytes.is_empty() {
            return Err(anyhow!("empty response from image generation service"));
        }

        info!(
            "Synthesized {} bytes in {}ms",
            bytes.len(),
            start.elapsed().as_millis()
        );

        Ok(SynthesizedImage {
            bytes,
            reference_url: url.to_string(),
        })
    }
}
