//! HTTP embedding provider speaking the Gemini `embedContent` shape.
//!
//! Request: `{"model": "models/<name>", "content": {"parts": [{"text": ...}]}}`.
//! Response: `{"embedding": {"values": [...]}}`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::EmbeddingProvider;
use crate::config::EmbeddingConfig;

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: String,
    content: EmbedContent<'a>,
}

#[derive(Serialize)]
struct EmbedContent<'a> {
    parts: Vec<EmbedPart<'a>>,
}

#[derive(Serialize)]
struct EmbedPart<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

pub struct GeminiEmbeddingProvider {
    endpoint: String,
    model: String,
    api_key: Option<String>,
    http_client: reqwest::Client,
}

impl GeminiEmbeddingProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .context("failed to build embedding HTTP client")?;
        Ok(Self {
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            http_client,
        })
    }

    fn request_body<'a>(&self, text: &'a str) -> EmbedRequest<'a> {
        EmbedRequest {
            model: format!("models/{}", self.model),
            content: EmbedContent {
                parts: vec![EmbedPart { text }],
            },
        }
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut request = self
            .http_client
            .post(&self.endpoint)
            .json(&self.request_body(text));
        if let Some(ref key) = self.api_key {
            request = request.header("x-goog-api-key", key);
        }

        let response = request.send().await.context("embedding request failed")?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("embedding backend returned {status}: {body}");
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .context("malformed embedding response")?;
        Ok(parsed.embedding.values)
    }

    fn model(&self) -> &str {
        &self.model
    }
}
