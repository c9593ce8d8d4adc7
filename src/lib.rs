//! Retrieval-augmented chat with long-term memory.
//!
//! memoria answers chat messages for a website assistant. Each turn pulls
//! relevant knowledge from a small document store, remembers the user across
//! visits, and returns the model's reply together with any UI-automation
//! steps it asked for.
//!
//! # Architecture
//!
//! - **Storage**: one SQLite database (chunks, users, messages) behind a
//!   single mutex, so every write is serialized and multi-row changes are
//!   transactional
//! - **Retrieval**: cosine similarity over stored embeddings, top 3 above
//!   0.5, with keyword-overlap fallback when that finds nothing
//! - **Memory**: the last 20 messages are replayed; once a log passes 20
//!   entries the oldest 10 are folded into a rolling summary
//! - **Backends**: embedding and generation are HTTP calls with hard
//!   timeouts; failures degrade (keyword search, fixed apology reply) rather
//!   than error
//! - **Plans**: replies may carry `keyword: value` commands and `plan:` JSON
//!   arrays, parsed by [`plan::parse_reply`]
//!
//! # Modules
//!
//! - [`config`] — Configuration loading from TOML files and environment variables
//! - [`db`] — SQLite initialization, schema, migrations, and the shared handle
//! - [`embedding`] — Text-to-vector embedding over HTTP
//! - [`generation`] — Chat completion with degraded fallback
//! - [`memory`] — Knowledge store, retrieval, conversation log, profiles, summarization
//! - [`prompt`] — System prompt and request assembly
//! - [`plan`] — Command grammar, reply parser, and plan progress tracking
//! - [`auth`] — Password hashing and session tokens
//! - [`chat`] — The service tying it all together
//! - [`server`] — axum HTTP adapter

pub mod auth;
pub mod chat;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod memory;
pub mod plan;
pub mod prompt;
pub mod server;
