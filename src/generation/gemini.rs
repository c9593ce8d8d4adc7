//! `generateContent`-shaped chat backend.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{ChatModel, GenerationRequest, TurnRole};
use crate::config::GenerationConfig;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<TurnRole>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

pub struct GeminiChatModel {
    endpoint: String,
    model: String,
    api_key: Option<String>,
    http_client: reqwest::Client,
}

impl GeminiChatModel {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .build()
            .context("failed to build generation HTTP client")?;
        Ok(Self {
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            http_client,
        })
    }
}

fn request_body(request: &GenerationRequest) -> GenerateBody<'_> {
    let system_instruction = (!request.system.is_empty()).then(|| Content {
        role: None,
        parts: vec![Part {
            text: &request.system,
        }],
    });
    let contents = request
        .turns
        .iter()
        .map(|turn| Content {
            role: Some(turn.role),
            parts: vec![Part { text: &turn.text }],
        })
        .collect();
    GenerateBody {
        system_instruction,
        contents,
    }
}

fn reply_text(response: GenerateResponse) -> Result<String> {
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .context("response had no candidates")?;
    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().map(|p| p.text).collect())
        .unwrap_or_default();
    if text.trim().is_empty() {
        anyhow::bail!("first candidate carried no text");
    }
    Ok(text)
}

#[async_trait]
impl ChatModel for GeminiChatModel {
    async fn complete(&self, request: &GenerationRequest) -> Result<String> {
        let mut http = self.http_client.post(&self.endpoint).json(&request_body(request));
        if let Some(ref key) = self.api_key {
            http = http.header("x-goog-api-key", key);
        }

        let response = http.send().await.context("generation request failed")?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("generation backend returned {status}: {body}");
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .context("malformed generation response")?;
        reply_text(parsed)
    }

    fn model(&self) -> &str {
        &self.model
    }
}
