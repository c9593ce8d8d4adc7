//! Text-to-vector embedding.
//!
//! Provides the [`EmbeddingProvider`] trait for backends and the
//! [`EmbeddingClient`] wrapper the rest of the crate uses. The client bounds
//! every call with a timeout and turns any failure into `None`, so callers can
//! degrade to keyword search instead of failing.

pub mod gemini;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::EmbeddingConfig;

/// Backend that turns text into a vector.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Model identifier recorded alongside stored vectors.
    fn model(&self) -> &str;
}

/// Provider used when embeddings are switched off. Always unavailable.
pub struct DisabledEmbeddingProvider;

#[async_trait]
impl EmbeddingProvider for DisabledEmbeddingProvider {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        anyhow::bail!("embedding provider disabled")
    }

    fn model(&self) -> &str {
        "none"
    }
}

/// Create an embedding provider from config.
pub fn create_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "gemini" => Ok(Arc::new(gemini::GeminiEmbeddingProvider::new(config)?)),
        "none" => Ok(Arc::new(DisabledEmbeddingProvider)),
        other => anyhow::bail!("unknown embedding provider: {other}. Supported: gemini, none"),
    }
}

/// Soft-failing, time-bounded embedding calls.
#[derive(Clone)]
pub struct EmbeddingClient {
    provider: Arc<dyn EmbeddingProvider>,
    timeout: Duration,
}

impl EmbeddingClient {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        Ok(Self::new(create_provider(config)?, config.timeout()))
    }

    pub fn model(&self) -> &str {
        self.provider.model()
    }

    /// Embed `text`, or `None` on timeout, error, or an empty vector.
    ///
    /// The in-flight request is dropped when the timeout fires.
    pub async fn embed(&self, text: &str) -> Option<Vec<f32>> {
        match tokio::time::timeout(self.timeout, self.provider.embed(text)).await {
            Ok(Ok(vector)) if !vector.is_empty() => Some(vector),
            Ok(Ok(_)) => {
                tracing::warn!(model = self.model(), "embedding backend returned an empty vector");
                None
            }
            Ok(Err(e)) => {
                tracing::warn!(model = self.model(), error = %e, "embedding failed");
                None
            }
            Err(_) => {
                tracing::warn!(
                    model = self.model(),
                    timeout_ms = self.timeout.as_millis() as u64,
                    "embedding timed out"
                );
                None
            }
        }
    }
}
