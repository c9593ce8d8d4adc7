//! HTTP adapter over [`ChatService`].
//!
//! # Endpoints
//!
//! - `GET /health`
//! - `POST /api/embed` — `{documents: [{id?, text, metadata?}]}` → `{count}`
//! - `POST /api/chat` — `{message, userId?, pageContext?, projectKnowledge?}` → `{reply, actions?}`
//! - `GET /api/chat/history/{user_id}` → `{history}`
//! - `GET /api/user/{user_id}` → profile
//! - `POST /api/user` — `{userId, profile}` → profile
//! - `POST /api/auth/register` — `{username, password, name?}` → `{userId, token, profile}`
//! - `POST /api/auth/login` — `{username, password}` → `{userId, token, profile}`

use std::sync::Arc;

use anyhow::Result;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::chat::{ChatRequest, ChatResponse, ChatService, LoginRequest, RegisterRequest};
use crate::config::MemoriaConfig;
use crate::db;
use crate::error::ChatError;
use crate::memory::types::{ChatEntry, NewChunk, ProfileUpdate, UserProfile};

type AppState = Arc<ChatService>;

#[derive(Deserialize)]
struct EmbedRequest {
    #[serde(default)]
    documents: Vec<NewChunk>,
}

#[derive(Serialize)]
struct EmbedResponse {
    count: usize,
}

#[derive(Serialize)]
struct HistoryResponse {
    history: Vec<ChatEntry>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateProfileRequest {
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    profile: ProfileUpdate,
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::MissingField(_) | Self::InvalidBody(_) => StatusCode::BAD_REQUEST,
            Self::UsernameTaken => StatusCode::CONFLICT,
            Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::Storage(ref e) => {
                tracing::error!(error = %format!("{e:#}"), "request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let message = if self.is_client_error() {
            self.to_string()
        } else {
            "internal storage error".to_string()
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<JsonRejection> for ChatError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidBody(rejection.body_text())
    }
}

pub fn create_router(service: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/embed", post(embed))
        .route("/api/chat", post(chat))
        .route("/api/chat/history/{user_id}", get(history))
        .route("/api/user/{user_id}", get(get_profile))
        .route("/api/user", post(update_profile))
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(service)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn embed(
    State(service): State<AppState>,
    payload: Result<Json<EmbedRequest>, JsonRejection>,
) -> Result<Json<EmbedResponse>, ChatError> {
    let Json(request) = payload?;
    let count = service.ingest(request.documents).await?;
    Ok(Json(EmbedResponse { count }))
}

async fn chat(
    State(service): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ChatError> {
    let Json(request) = payload?;
    Ok(Json(service.chat(request).await?))
}

async fn history(
    State(service): State<AppState>,
    Path(user_id): Path<String>,
) -> Json<HistoryResponse> {
    Json(HistoryResponse {
        history: service.history(&user_id).await,
    })
}

async fn get_profile(
    State(service): State<AppState>,
    Path(user_id): Path<String>,
) -> Json<UserProfile> {
    Json(service.profile(&user_id).await)
}

async fn update_profile(
    State(service): State<AppState>,
    payload: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> Result<Json<UserProfile>, ChatError> {
    let Json(request) = payload?;
    let profile = service
        .update_profile(request.user_id, request.profile)
        .await?;
    Ok(Json(profile))
}

async fn register(
    State(service): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ChatError> {
    let Json(request) = payload?;
    let response = service.register(request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

async fn login(
    State(service): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ChatError> {
    let Json(request) = payload?;
    Ok(Json(service.login(request).await?))
}

/// Open the store, build the clients and serve until ctrl-c.
pub async fn serve(config: MemoriaConfig) -> Result<()> {
    let service = ChatService::from_config(&config)?;

    let configured = config.embedding.model.clone();
    let stored = service
        .database()
        .run(|conn| Ok(db::migrations::get_embedding_model(conn)?))
        .await?;
    if let Some(stored) = stored.filter(|s| *s != configured) {
        tracing::warn!(
            stored = %stored,
            configured = %configured,
            "embedding model changed since ingestion, re-ingest documents for semantic search"
        );
    }

    let bind_addr = config.bind_addr();
    let router = create_router(Arc::new(service));
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "memoria listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
            }
            tracing::info!("shutting down");
        })
        .await?;

    Ok(())
}
