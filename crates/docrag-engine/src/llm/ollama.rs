use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use docrag_core::config::GenerationSettings;
use docrag_core::traits::{GenerationRequest, Generator};

pub const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";
pub const DEFAULT_MODEL: &str = "qwen2.5:7b-instruct";

/// Non-streaming client for Ollama's `POST /api/generate`.
#[derive(Debug, Clone)]
pub struct OllamaGenerator {
    client: Client,
    base_url: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: usize,
}

#[derive(Debug, Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

impl OllamaGenerator {
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build().context("building HTTP client")?;
        Ok(Self { client, base_url: base_url.trim_end_matches('/').to_string(), model: model.to_string() })
    }

    pub fn from_settings(settings: &GenerationSettings) -> anyhow::Result<Self> {
        Self::new(&settings.base_url, &settings.model, Duration::from_secs(settings.timeout_secs))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn body<'a>(&'a self, request: &'a GenerationRequest) -> OllamaGenerateRequest<'a> {
        OllamaGenerateRequest {
            model: &self.model,
            prompt: &request.prompt,
            stream: false,
            options: OllamaOptions { temperature: request.temperature, num_predict: request.max_tokens },
        }
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    async fn generate(&self, request: &GenerationRequest) -> anyhow::Result<String> {
        let url = format!("{}/api/generate", self.base_url);
        debug!(%url, model = %self.model, prompt_chars = request.prompt.len(), "calling generator");
        let response = self
            .client
            .post(&url)
            .json(&self.body(request))
            .send()
            .await
            .with_context(|| format!("Failed to send request to {url}"))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow!("HTTP {}: {}", status, text));
        }
        let body: OllamaGenerateResponse = response.json().await.context("Failed to parse generate response")?;
        Ok(body.response.trim().to_string())
    }
}
