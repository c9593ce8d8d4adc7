#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use memoria::chat::ChatService;
use memoria::config::MemoriaConfig;
use memoria::db::Database;
use memoria::embedding::{EmbeddingClient, EmbeddingProvider};
use memoria::generation::{ChatModel, GenerationClient, GenerationRequest};
use memoria::memory::conversation;
use memoria::memory::types::Role;

/// Embeds known texts to fixed vectors. Unknown texts fail, like an
/// unreachable backend.
pub struct TableEmbedder {
    table: HashMap<String, Vec<f32>>,
}

impl TableEmbedder {
    pub fn new(entries: &[(&str, Vec<f32>)]) -> Self {
        Self {
            table: entries
                .iter()
                .map(|(text, v)| (text.to_string(), v.clone()))
                .collect(),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for TableEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.table
            .get(text)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no vector for {text:?}"))
    }

    fn model(&self) -> &str {
        "table"
    }
}

/// Replies with queued texts in order, then with `fallback`. Keeps every
/// request it receives.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<String>>,
    fallback: String,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedModel {
    pub fn new(fallback: &str) -> Self {
        Self::with_replies(&[], fallback)
    }

    pub fn with_replies(replies: &[&str], fallback: &str) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            fallback: fallback.to_string(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, request: &GenerationRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        let next = self.replies.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| self.fallback.clone()))
    }

    fn model(&self) -> &str {
        "scripted"
    }
}

/// Always fails, like a backend returning 503.
pub struct FailingModel;

#[async_trait]
impl ChatModel for FailingModel {
    async fn complete(&self, _request: &GenerationRequest) -> Result<String> {
        anyhow::bail!("503 Service Unavailable")
    }

    fn model(&self) -> &str {
        "failing"
    }
}

pub fn embedding_client(provider: Arc<dyn EmbeddingProvider>) -> EmbeddingClient {
    EmbeddingClient::new(provider, Duration::from_secs(1))
}

pub fn generation_client(model: Arc<dyn ChatModel>) -> GenerationClient {
    GenerationClient::new(model, Duration::from_secs(1), 200)
}

pub fn test_config() -> MemoriaConfig {
    let mut config = MemoriaConfig::default();
    config.persona.knowledge_path = None;
    config
}

/// A service over a fresh in-memory database.
pub fn service(embedder: Arc<dyn EmbeddingProvider>, model: Arc<dyn ChatModel>) -> ChatService {
    ChatService::new(
        Database::in_memory().unwrap(),
        embedding_client(embedder),
        generation_client(model),
        &test_config(),
    )
}

/// Append `count` entries alternating user/agent, texts `m0`, `m1`, ...
pub async fn seed_history(db: &Database, user_id: &str, count: usize) {
    let uid = user_id.to_string();
    db.run(move |conn| {
        for i in 0..count {
            let role = if i % 2 == 0 { Role::User } else { Role::Agent };
            conversation::append_entry(conn, &uid, role, &format!("m{i}"))?;
        }
        Ok(())
    })
    .await
    .unwrap();
}

pub async fn history_len(db: &Database, user_id: &str) -> usize {
    let uid = user_id.to_string();
    db.run(move |conn| conversation::history_len(conn, &uid))
        .await
        .unwrap()
}
