use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct MemoriaConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub generation: GenerationConfig,
    pub retrieval: RetrievalConfig,
    pub memory: MemoryConfig,
    pub persona: PersonaConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// `"gemini"` or `"none"`.
    pub provider: String,
    pub model: String,
    pub endpoint: String,
    pub api_key: Option<String>,
    pub timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GenerationConfig {
    pub provider: String,
    pub model: String,
    pub endpoint: String,
    pub api_key: Option<String>,
    pub timeout_ms: u64,
    pub summary_timeout_ms: u64,
    /// Characters of retrieved context appended to a degraded reply.
    pub degraded_excerpt_chars: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub min_similarity: f64,
    /// Keyword tokens shorter than this are ignored.
    pub min_token_len: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MemoryConfig {
    pub history_window: usize,
    pub summarize_threshold: usize,
    pub summarize_batch: usize,
    /// Shared identity for every caller that does not send a user id.
    pub anonymous_user_id: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PersonaConfig {
    /// Name the assistant introduces itself with. Empty leaves it unnamed.
    pub assistant_name: String,
    pub character: String,
    /// Markdown file injected as project knowledge when a request carries none.
    pub knowledge_path: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8080,
            log_level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_memoria_dir()
            .join("memoria.db")
            .to_string_lossy()
            .into_owned();
        Self { db_path }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".into(),
            model: "text-embedding-004".into(),
            endpoint: "https://generativelanguage.googleapis.com/v1beta/models/text-embedding-004:embedContent".into(),
            api_key: None,
            timeout_ms: 5_000,
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".into(),
            model: "gemini-2.5-flash".into(),
            endpoint: "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent".into(),
            api_key: None,
            timeout_ms: 10_000,
            summary_timeout_ms: 10_000,
            degraded_excerpt_chars: 200,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            min_similarity: 0.5,
            min_token_len: 3,
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            history_window: 20,
            summarize_threshold: 20,
            summarize_batch: 10,
            anonymous_user_id: "anonymous".into(),
        }
    }
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            assistant_name: "Hiyori".into(),
            character: "You are a cheerful and curious virtual assistant who lives on this \
                        website. You speak warmly and concisely, you know the site well, and you \
                        help visitors find and operate its tools."
                .into(),
            knowledge_path: None,
        }
    }
}

impl EmbeddingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl GenerationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn summary_timeout(&self) -> Duration {
        Duration::from_millis(self.summary_timeout_ms)
    }
}

/// Returns `~/.memoria/`, or `./.memoria/` when no home directory is known.
pub fn default_memoria_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".memoria")
}

/// Returns the default config file path: `~/.memoria/config.toml`
pub fn default_config_path() -> PathBuf {
    default_memoria_dir().join("config.toml")
}

impl MemoriaConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            MemoriaConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides.
    ///
    /// `MEMORIA_API_KEY` only fills keys that the file left unset.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("MEMORIA_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("MEMORIA_LOG_LEVEL") {
            self.server.log_level = val;
        }
        if let Ok(val) = std::env::var("MEMORIA_HOST") {
            self.server.host = val;
        }
        if let Ok(val) = std::env::var("MEMORIA_PORT") {
            match val.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!(value = %val, "ignoring invalid MEMORIA_PORT"),
            }
        }
        if let Ok(val) = std::env::var("MEMORIA_API_KEY") {
            self.embedding.api_key.get_or_insert_with(|| val.clone());
            self.generation.api_key.get_or_insert(val);
        }
        if let Ok(val) = std::env::var("MEMORIA_ANON_USER") {
            self.memory.anonymous_user_id = val;
        }
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
