//! Chat completion against an external model.
//!
//! [`ChatModel`] is the backend seam; [`GenerationClient`] wraps it with a
//! timeout and the degraded-mode fallback so a chat turn always gets a reply.

pub mod gemini;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::config::GenerationConfig;
use crate::memory::truncate_chars;

/// Fixed reply used when the model cannot be reached.
pub const DEGRADED_REPLY: &str = "Sorry, I'm having trouble connecting to my brain right now!";

/// Speaker of a replayed turn, in the model protocol's two-role vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Turn {
    pub role: TurnRole,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Model,
            text: text.into(),
        }
    }
}

/// An assembled request: one system block followed by ordered turns.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GenerationRequest {
    pub system: String,
    pub turns: Vec<Turn>,
}

/// Outcome of [`GenerationClient::generate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Generated(String),
    /// Fallback text. Never persisted to conversation memory.
    Degraded(String),
}

impl Reply {
    pub fn text(&self) -> &str {
        match self {
            Self::Generated(text) | Self::Degraded(text) => text,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded(_))
    }
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, request: &GenerationRequest) -> Result<String>;

    fn model(&self) -> &str;
}

pub fn create_model(config: &GenerationConfig) -> Result<Arc<dyn ChatModel>> {
    match config.provider.as_str() {
        "gemini" => Ok(Arc::new(gemini::GeminiChatModel::new(config)?)),
        other => anyhow::bail!("unknown generation provider: {other}. Supported: gemini"),
    }
}

/// Build the degraded reply, appending an excerpt of retrieved context if any.
pub fn degraded_reply(context: Option<&str>, excerpt_chars: usize) -> String {
    match context {
        Some(ctx) if !ctx.is_empty() && excerpt_chars > 0 => {
            format!("{DEGRADED_REPLY}\n\n{}", truncate_chars(ctx, excerpt_chars))
        }
        _ => DEGRADED_REPLY.to_string(),
    }
}

/// Whether a stored or returned text is a degraded-mode reply.
pub fn is_degraded(text: &str) -> bool {
    text.starts_with(DEGRADED_REPLY)
}

/// Time-bounded generation with a degraded fallback.
#[derive(Clone)]
pub struct GenerationClient {
    model: Arc<dyn ChatModel>,
    timeout: Duration,
    excerpt_chars: usize,
}

impl GenerationClient {
    pub fn new(model: Arc<dyn ChatModel>, timeout: Duration, excerpt_chars: usize) -> Self {
        Self {
            model,
            timeout,
            excerpt_chars,
        }
    }

    pub fn from_config(config: &GenerationConfig) -> Result<Self> {
        Ok(Self::new(
            create_model(config)?,
            config.timeout(),
            config.degraded_excerpt_chars,
        ))
    }

    pub fn model(&self) -> &str {
        self.model.model()
    }

    /// Generate a reply. Never fails: any error or timeout yields
    /// [`Reply::Degraded`], carrying an excerpt of `context` when present.
    pub async fn generate(&self, request: &GenerationRequest, context: Option<&str>) -> Reply {
        match self.complete_within(request, self.timeout).await {
            Ok(text) => Reply::Generated(text),
            Err(e) => {
                tracing::warn!(model = self.model(), error = %e, "generation failed, replying in degraded mode");
                Reply::Degraded(degraded_reply(context, self.excerpt_chars))
            }
        }
    }

    /// Raw completion bounded by `timeout`. Empty output counts as an error.
    pub async fn complete_within(
        &self,
        request: &GenerationRequest,
        timeout: Duration,
    ) -> Result<String> {
        let text = tokio::time::timeout(timeout, self.model.complete(request))
            .await
            .map_err(|_| anyhow::anyhow!("generation timed out after {}ms", timeout.as_millis()))??;
        let text = text.trim();
        if text.is_empty() {
            anyhow::bail!("model returned an empty reply");
        }
        Ok(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl ChatModel for Echo {
        async fn complete(&self, request: &GenerationRequest) -> Result<String> {
            Ok(format!(" {} ", request.turns.len()))
        }
        fn model(&self) -> &str {
            "echo"
        }
    }

    struct Failing;

    #[async_trait]
    impl ChatModel for Failing {
        async fn complete(&self, _request: &GenerationRequest) -> Result<String> {
            anyhow::bail!("503 Service Unavailable")
        }
        fn model(&self) -> &str {
            "failing"
        }
    }

    struct Hanging;

    #[async_trait]
    impl ChatModel for Hanging {
        async fn complete(&self, _request: &GenerationRequest) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok("too late".into())
        }
        fn model(&self) -> &str {
            "hanging"
        }
    }

    fn request() -> GenerationRequest {
        GenerationRequest {
            system: "sys".into(),
            turns: vec![Turn::user("hi")],
        }
    }

    #[tokio::test]
    async fn generated_reply_is_trimmed() {
        let client = GenerationClient::new(Arc::new(Echo), Duration::from_secs(1), 200);
        assert_eq!(
            client.generate(&request(), None).await,
            Reply::Generated("1".into())
        );
    }

    #[tokio::test]
    async fn failure_yields_degraded_reply_with_excerpt() {
        let client = GenerationClient::new(Arc::new(Failing), Duration::from_secs(1), 5);
        let reply = client.generate(&request(), Some("Relevant facts")).await;
        assert!(reply.is_degraded());
        assert_eq!(reply.text(), format!("{DEGRADED_REPLY}\n\nRelev"));
    }

    #[tokio::test]
    async fn timeout_yields_degraded_reply() {
        let client = GenerationClient::new(Arc::new(Hanging), Duration::from_millis(50), 200);
        let reply = client.generate(&request(), None).await;
        assert_eq!(reply, Reply::Degraded(DEGRADED_REPLY.into()));
    }

    #[test]
    fn degraded_detection_matches_excerpt_variant() {
        assert!(is_degraded(&degraded_reply(Some("ctx"), 200)));
        assert!(is_degraded(DEGRADED_REPLY));
        assert!(!is_degraded("Hello there!"));
    }
}
