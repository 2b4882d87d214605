// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! VLM sidecar client (OpenAI-compatible chat completions) backing the keyword,
//! description and style stages

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};

use super::generative::{GenerationRequest, GenerativeModel, PromptPart};
use super::image_utils::encode_base64_png;

// --- OpenAI-compatible serde structs ---

#[derive(serde::Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<serde_json::Value>,
}

#[derive(serde::Serialize)]
struct ChatMessage {
    role: String,
    content: serde_json::Value,
}

#[derive(serde::Deserialize)]
struct ChatUsage {
    total_tokens: u32,
}

#[derive(serde::Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(serde::Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(serde::Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

/// Client for a VLM sidecar exposing `/v1/chat/completions`
pub struct VlmClient {
    client: Client,
    endpoint: String,
    model_name: String,
    api_key: Option<String>,
}

impl VlmClient {
    pub fn new(endpoint: &str, model_name: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        let endpoint = endpoint.trim_end_matches('/').to_string();
        info!(
            "VLM client configured: endpoint={}, model={}",
            endpoint, model_name
        );

        Ok(Self {
            client,
            endpoint,
            model_name: model_name.to_string(),
            api_key: None,
        })
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|k| !k.is_empty());
        self
    }

    /// Check if the VLM sidecar is healthy
    pub async fn health_check(&self) -> bool {
        match self
            .client
            .get(format!("{}/health", self.endpoint))
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!("VLM health check failed: {}", e);
                false
            }
        }
    }

    fn build_chat_request(&self, request: &GenerationRequest) -> Result<ChatRequest> {
        let mut messages = Vec::with_capacity(2);

        if let Some(system) = request.system_prompt.as_deref() {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: serde_json::Value::String(system.to_string()),
            });
        }

        let mut content = Vec::with_capacity(request.parts.len());
        for part in &request.parts {
            match part {
                PromptPart::Text(text) => {
                    content.push(serde_json::json!({"type": "text", "text": text}));
                }
                PromptPart::Image(img) => {
                    let data_url = format!("data:image/png;base64,{}", encode_base64_png(img)?);
                    content.push(serde_json::json!({
                        "type": "image_url",
                        "image_url": {"url": data_url}
                    }));
                }
            }
        }

        messages.push(ChatMessage {
            role: "user".to_string(),
            content: serde_json::Value::Array(content),
        });

        Ok(ChatRequest {
            model: self.model_name.clone(),
            messages,
            max_tokens: request.options.max_output_tokens,
            temperature: request.options.temperature,
            response_format: request
                .options
                .json_response
                .then(|| serde_json::json!({"type": "json_object"})),
        })
    }
}

#[async_trait]
impl GenerativeModel for VlmClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let start = std::time::Instant::now();
        let chat_request = self.build_chat_request(request)?;

        let url = format!("{}/v1/chat/completions", self.endpoint);
        debug!(
            "VLM generate POST {} ({} parts, {} images)",
            url,
            request.parts.len(),
            request.image_count()
        );

        let mut http_request = self.client.post(&url).json(&chat_request);
        if let Some(ref key) = self.api_key {
            http_request = http_request.bearer_auth(key);
        }
        let response = http_request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("VLM sidecar returned {}: {}", status, text));
        }

        let chat_response: ChatResponse = response.json().await?;
        let text = chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| anyhow!("empty completion from VLM sidecar"))?;

        debug!(
            "VLM completion: {} chars, {} tokens, {}ms",
            text.len(),
            chat_response.usage.map(|u| u.total_tokens).unwrap_or(0),
            start.elapsed().as_millis()
        );

        Ok(text)
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
