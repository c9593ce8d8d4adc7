//! Core record types for the knowledge store and conversational memory.
//!
//! Defines [`KnowledgeChunk`] (an ingested unit of knowledge), [`Role`] and
//! [`ChatEntry`] (one line of a user's conversation log), [`UserProfile`] with
//! its typed [`Preferences`], and the ephemeral [`ScoredCandidate`] used while
//! ranking.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Structured chunk metadata, validated when a chunk is ingested.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// File or document the chunk was cut from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Heading or section within the source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// A unit of ingested knowledge text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeChunk {
    /// Caller-supplied or generated id. Not unique: duplicates coexist.
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub metadata: ChunkMetadata,
    /// `None` when embedding failed at ingestion. Never recomputed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

/// A chunk submitted for ingestion.
#[derive(Debug, Clone, Deserialize)]
pub struct NewChunk {
    #[serde(default)]
    pub id: Option<String>,
    pub text: String,
    #[serde(default)]
    pub metadata: Option<ChunkMetadata>,
}

/// Who wrote a conversation entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Agent,
}

impl Role {
    /// SQL-compatible string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Agent => "agent",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "agent" => Ok(Self::Agent),
            _ => Err(format!("unknown role: {s}")),
        }
    }
}

/// One entry of a user's conversation log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatEntry {
    /// Log position; strictly increasing per user.
    #[serde(skip)]
    pub seq: i64,
    pub role: Role,
    pub text: String,
    /// RFC 3339 timestamp.
    pub timestamp: String,
}

/// A single preference value. Preferences are shallow: lists hold scalars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PreferenceValue {
    Flag(bool),
    Number(f64),
    Text(String),
    List(Vec<PreferenceValue>),
}

pub type Preferences = BTreeMap<String, PreferenceValue>;

/// A user's profile, including the rolling conversation summary.
///
/// The password hash lives only in storage and is never part of this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub summary: String,
    #[serde(default)]
    pub visits: u64,
    #[serde(default)]
    pub preferences: Preferences,
}

impl UserProfile {
    /// The minimal profile reported for an id that has never been stored.
    pub fn placeholder(id: &str) -> Self {
        Self {
            id: id.to_string(),
            username: None,
            name: None,
            created_at: None,
            last_seen: None,
            summary: String::new(),
            visits: 0,
            preferences: Preferences::new(),
        }
    }
}

/// Client-writable profile fields. Each present field replaces the stored one
/// wholesale; absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub visits: Option<u64>,
    #[serde(default)]
    pub preferences: Option<Preferences>,
}

/// A chunk paired with its ranking score. Exists only during retrieval.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredCandidate {
    pub chunk: KnowledgeChunk,
    pub score: f64,
}
