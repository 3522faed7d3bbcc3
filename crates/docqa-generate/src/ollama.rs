//! Client for Ollama's non-streaming `/api/generate` endpoint.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use docqa_core::config::GenerationSettings;

use crate::error::GenerationError;
use crate::Generator;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DecodingOptions {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
}

impl Default for DecodingOptions {
    fn default() -> Self { Self { temperature: 0.7, top_p: 0.9, top_k: 40 } }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: DecodingOptions,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    options: DecodingOptions,
    timeout: Duration,
}

impl OllamaClient {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        options: DecodingOptions,
        timeout: Duration,
    ) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GenerationError::Client(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            options,
            timeout,
        })
    }

    pub fn from_settings(settings: &GenerationSettings) -> Result<Self, GenerationError> {
        Self::new(
            settings.base_url.clone(),
            settings.model.clone(),
            DecodingOptions { temperature: settings.temperature, top_p: settings.top_p, top_k: settings.top_k },
            Duration::from_secs(settings.timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str { &self.base_url }
    pub fn model(&self) -> &str { &self.model }

    fn endpoint(&self) -> String { format!("{}/api/generate", self.base_url) }

    fn transport_error(&self, endpoint: &str, e: reqwest::Error) -> GenerationError {
        if e.is_timeout() {
            GenerationError::Timeout { endpoint: endpoint.to_string(), secs: self.timeout.as_secs() }
        } else {
            GenerationError::Unreachable { endpoint: endpoint.to_string(), message: e.to_string() }
        }
    }
}

#[async_trait]
impl Generator for OllamaClient {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let endpoint = self.endpoint();
        let request = GenerateRequest { model: &self.model, prompt, stream: false, options: self.options };
        tracing::debug!(endpoint = %endpoint, model = %self.model, prompt_len = prompt.len(), "generate request");

        let response = self
            .client
            .post(&endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.transport_error(&endpoint, e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport_error(&endpoint, e))?;
        if !status.is_success() {
            tracing::warn!(endpoint = %endpoint, status = status.as_u16(), "generation backend returned an error");
            return Err(GenerationError::Status { endpoint, status: status.as_u16(), body });
        }

        let parsed: GenerateResponse = serde_json::from_str(&body)
            .map_err(|e| GenerationError::Malformed { endpoint: endpoint.clone(), message: e.to_string() })?;
        tracing::debug!(response_len = parsed.response.len(), "generate response");
        Ok(parsed.response)
    }
}
