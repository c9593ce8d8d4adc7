//! The chat service: one object owning the store and both external clients.
//!
//! A chat turn embeds the message, retrieves knowledge (semantic, then keyword
//! fallback), folds old history into the summary when the log is long,
//! assembles the prompt, and generates a reply. Only real replies are written
//! back, as a (user, agent) pair in one transaction.

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::auth;
use crate::config::{expand_tilde, MemoriaConfig};
use crate::db::Database;
use crate::embedding::EmbeddingClient;
use crate::error::{ChatError, Result};
use crate::generation::{is_degraded, GenerationClient, Reply};
use crate::memory::search::{self, RankConfig, Retrieval};
use crate::memory::summarize::{self, SummaryPolicy};
use crate::memory::types::{ChatEntry, NewChunk, ProfileUpdate, UserProfile};
use crate::memory::{conversation, documents, profiles};
use crate::plan::{self, ParsedReply};
use crate::prompt::{self, PageElement, PromptInputs};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub page_context: Vec<PageElement>,
    #[serde(default)]
    pub project_knowledge: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    /// The model output as generated, or the degraded-mode text.
    pub reply: String,
    /// Parsed steps, motions and emotions, when the reply carried any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actions: Option<ParsedReply>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub user_id: String,
    pub token: String,
    pub profile: UserProfile,
}

pub struct ChatService {
    db: Database,
    embeddings: EmbeddingClient,
    generation: GenerationClient,
    rank: RankConfig,
    summary_policy: SummaryPolicy,
    history_window: usize,
    anonymous_user_id: String,
    assistant_name: String,
    persona: String,
    default_knowledge: Option<String>,
}

fn required(value: Option<String>, field: &'static str) -> Result<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or(ChatError::MissingField(field))
}

fn load_knowledge(path: &str) -> Option<String> {
    let path = expand_tilde(path);
    match std::fs::read_to_string(&path) {
        Ok(text) => Some(text),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "could not read project knowledge file");
            None
        }
    }
}

impl ChatService {
    pub fn new(
        db: Database,
        embeddings: EmbeddingClient,
        generation: GenerationClient,
        config: &MemoriaConfig,
    ) -> Self {
        Self {
            db,
            embeddings,
            generation,
            rank: RankConfig::from(&config.retrieval),
            summary_policy: SummaryPolicy::from_config(config),
            history_window: config.memory.history_window,
            anonymous_user_id: config.memory.anonymous_user_id.clone(),
            assistant_name: config.persona.assistant_name.clone(),
            persona: config.persona.character.clone(),
            default_knowledge: config.persona.knowledge_path.as_deref().and_then(load_knowledge),
        }
    }

    /// Open the configured database and build both HTTP clients.
    pub fn from_config(config: &MemoriaConfig) -> anyhow::Result<Self> {
        let db = Database::open(config.resolved_db_path())?;
        let embeddings = EmbeddingClient::from_config(&config.embedding)?;
        let generation = GenerationClient::from_config(&config.generation)?;
        Ok(Self::new(db, embeddings, generation, config))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// The caller's id, or the shared anonymous id when none was sent.
    pub fn resolve_user_id(&self, user_id: Option<&str>) -> String {
        match user_id.map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => self.anonymous_user_id.clone(),
        }
    }

    /// Embed and store each chunk. Chunks whose embedding fails are stored
    /// without one. Returns the number stored.
    pub async fn ingest(&self, chunks: Vec<NewChunk>) -> Result<usize> {
        if chunks.iter().any(|c| c.text.trim().is_empty()) {
            return Err(ChatError::MissingField("text"));
        }

        let mut prepared = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let embedding = self.embeddings.embed(&chunk.text).await;
            prepared.push(documents::prepare_chunk(chunk, embedding));
        }
        let embedded = prepared.iter().filter(|c| c.embedding.is_some()).count();
        let model = self.embeddings.model().to_string();

        let count = self
            .db
            .run(move |conn| {
                let tx = conn.transaction()?;
                for chunk in &prepared {
                    documents::append_chunk(&tx, chunk)?;
                }
                if embedded > 0 {
                    crate::db::migrations::set_embedding_model(&tx, &model)?;
                }
                tx.commit()?;
                Ok(prepared.len())
            })
            .await
            .context("failed to store chunks")?;

        tracing::info!(count, embedded, "ingested chunks");
        Ok(count)
    }

    /// Retrieve knowledge for `query` the same way a chat turn does.
    pub async fn search(&self, query: &str) -> Retrieval {
        let embedding = self.embeddings.embed(query).await;
        let chunks = self.load_chunks().await;
        search::retrieve(query, embedding.as_deref(), &chunks, &self.rank)
    }

    pub async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let message = required(request.message, "message")?;
        let user_id = self.resolve_user_id(request.user_id.as_deref());

        let retrieval = self.search(&message).await;
        let context = retrieval.context();

        summarize::maybe_summarize(&self.db, &self.generation, &user_id, &self.summary_policy)
            .await;

        let (history, summary, user_name) = self.load_memory(&user_id).await;
        let knowledge = request
            .project_knowledge
            .as_deref()
            .or(self.default_knowledge.as_deref());

        let generation_request = prompt::assemble(&PromptInputs {
            assistant_name: &self.assistant_name,
            persona: &self.persona,
            user_name: user_name.as_deref(),
            summary: &summary,
            project_knowledge: knowledge,
            page_context: &request.page_context,
            retrieved_context: context.as_deref(),
            history: &history,
            history_window: self.history_window,
            message: &message,
        });

        let reply = self
            .generation
            .generate(&generation_request, context.as_deref())
            .await;

        if let Reply::Generated(ref text) = reply {
            let uid = user_id.clone();
            let agent_text = text.clone();
            self.db
                .run(move |conn| conversation::append_turn(conn, &uid, &message, &agent_text))
                .await
                .context("failed to persist chat turn")?;
        }

        tracing::info!(
            user_id = %user_id,
            retrieval = retrieval.path.as_str(),
            degraded = reply.is_degraded(),
            "chat turn"
        );

        let text = match reply {
            Reply::Generated(text) | Reply::Degraded(text) => text,
        };
        let parsed = plan::parse_reply(&text);
        Ok(ChatResponse {
            actions: parsed.has_actions().then_some(parsed),
            reply: text,
        })
    }

    /// Last entries of a user's log, without degraded-mode replies.
    pub async fn history(&self, user_id: &str) -> Vec<ChatEntry> {
        let uid = user_id.to_string();
        let window = self.history_window;
        match self
            .db
            .run(move |conn| conversation::recent_entries(conn, &uid, window))
            .await
        {
            Ok(entries) => entries
                .into_iter()
                .filter(|e| !is_degraded(&e.text))
                .collect(),
            Err(e) => {
                tracing::warn!(user_id, error = %e, "failed to read history");
                Vec::new()
            }
        }
    }

    /// The stored profile, or a placeholder for unknown ids.
    pub async fn profile(&self, user_id: &str) -> UserProfile {
        let uid = user_id.to_string();
        match self.db.run(move |conn| profiles::get_profile(conn, &uid)).await {
            Ok(Some(profile)) => profile,
            Ok(None) => UserProfile::placeholder(user_id),
            Err(e) => {
                tracing::warn!(user_id, error = %e, "failed to read profile");
                UserProfile::placeholder(user_id)
            }
        }
    }

    pub async fn update_profile(
        &self,
        user_id: Option<String>,
        update: ProfileUpdate,
    ) -> Result<UserProfile> {
        let uid = required(user_id, "userId")?;
        let profile = self
            .db
            .run(move |conn| profiles::merge_profile(conn, &uid, &update))
            .await
            .context("failed to update profile")?;
        Ok(profile)
    }

    pub async fn register(&self, request: RegisterRequest) -> Result<AuthResponse> {
        let username = required(request.username, "username")?;
        let password = required(request.password, "password")?;

        let hash = tokio::task::spawn_blocking(move || auth::hash_password(&password))
            .await
            .context("password hashing task failed")??;

        let name = request.name;
        let outcome = self
            .db
            .run(move |conn| profiles::register_user(conn, &username, &hash, name.as_deref()))
            .await
            .context("failed to register user")?;

        match outcome {
            profiles::RegisterOutcome::Created(profile) => {
                tracing::info!(user_id = %profile.id, "user registered");
                Ok(AuthResponse {
                    user_id: profile.id.clone(),
                    token: auth::new_session_token(),
                    profile,
                })
            }
            profiles::RegisterOutcome::UsernameTaken => Err(ChatError::UsernameTaken),
        }
    }

    pub async fn login(&self, request: LoginRequest) -> Result<AuthResponse> {
        let username = required(request.username, "username")?;
        let password = required(request.password, "password")?;

        let Some((user_id, stored_hash)) = self
            .db
            .run(move |conn| profiles::find_credentials(conn, &username))
            .await
            .context("failed to look up credentials")?
        else {
            return Err(ChatError::InvalidCredentials);
        };

        let verified =
            tokio::task::spawn_blocking(move || auth::verify_password(&password, &stored_hash))
                .await
                .context("password verification task failed")?;
        if !verified {
            return Err(ChatError::InvalidCredentials);
        }

        let uid = user_id.clone();
        let profile = self
            .db
            .run(move |conn| {
                profiles::touch_last_seen(conn, &uid)?;
                profiles::get_profile(conn, &uid)
            })
            .await
            .context("failed to load profile")?
            .unwrap_or_else(|| UserProfile::placeholder(&user_id));

        Ok(AuthResponse {
            user_id,
            token: auth::new_session_token(),
            profile,
        })
    }

    async fn load_chunks(&self) -> Vec<crate::memory::types::KnowledgeChunk> {
        match self.db.run(|conn| documents::all_chunks(conn)).await {
            Ok(chunks) => chunks,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read knowledge store, continuing without it");
                Vec::new()
            }
        }
    }

    /// Recent history, summary and display name, each empty on read failure.
    async fn load_memory(&self, user_id: &str) -> (Vec<ChatEntry>, String, Option<String>) {
        let uid = user_id.to_string();
        let window = self.history_window;
        let loaded = self
            .db
            .run(move |conn| {
                let history = conversation::recent_entries(conn, &uid, window)?;
                let profile = profiles::get_profile(conn, &uid)?;
                Ok((history, profile))
            })
            .await;

        match loaded {
            Ok((history, Some(profile))) => (history, profile.summary, profile.name),
            Ok((history, None)) => (history, String::new(), None),
            Err(e) => {
                tracing::warn!(user_id, error = %e, "failed to read conversation memory");
                (Vec::new(), String::new(), None)
            }
        }
    }
}
