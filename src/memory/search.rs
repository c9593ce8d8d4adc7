//! Retrieval over the knowledge store.
//!
//! [`retrieve`] runs the semantic path (cosine similarity against stored
//! embeddings, top-k above a threshold) and falls back to keyword overlap when
//! that yields nothing, including when the query could not be embedded.
//! [`render_context`] turns the winners into the prompt's context block.

use serde::Serialize;

use crate::config::RetrievalConfig;
use crate::memory::types::{KnowledgeChunk, ScoredCandidate};

/// Header placed above retrieved context in the prompt.
pub const CONTEXT_HEADER: &str =
    "Relevant knowledge retrieved for this question (use it when it helps, ignore it otherwise):";

// ── Public types ──────────────────────────────────────────────────────────────

/// Ranking knobs.
#[derive(Debug, Clone)]
pub struct RankConfig {
    pub top_k: usize,
    /// Semantic candidates must score strictly above this.
    pub min_similarity: f64,
    /// Keyword tokens need at least this many characters.
    pub min_token_len: usize,
}

impl Default for RankConfig {
    fn default() -> Self {
        Self::from(&RetrievalConfig::default())
    }
}

impl From<&RetrievalConfig> for RankConfig {
    fn from(config: &RetrievalConfig) -> Self {
        Self {
            top_k: config.top_k,
            min_similarity: config.min_similarity,
            min_token_len: config.min_token_len,
        }
    }
}

/// Which path produced the retrieved candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalPath {
    Semantic,
    Keyword,
    None,
}

impl RetrievalPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Semantic => "semantic",
            Self::Keyword => "keyword",
            Self::None => "none",
        }
    }
}

/// Outcome of [`retrieve`].
#[derive(Debug, Clone, Serialize)]
pub struct Retrieval {
    pub path: RetrievalPath,
    pub candidates: Vec<ScoredCandidate>,
}

impl Retrieval {
    /// Rendered context block, or `None` when nothing was retrieved.
    pub fn context(&self) -> Option<String> {
        render_context(&self.candidates)
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Cosine similarity of two vectors.
///
/// Mismatched lengths, empty input, or a zero-magnitude vector score `0.0`
/// instead of propagating NaN.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let x = f64::from(x);
        let y = f64::from(y);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom <= f64::EPSILON {
        return 0.0;
    }
    dot / denom
}

/// Semantic path: score embedded chunks, keep the top-k above the threshold.
pub fn rank_by_embedding(
    query: &[f32],
    chunks: &[KnowledgeChunk],
    config: &RankConfig,
) -> Vec<ScoredCandidate> {
    let scored = chunks
        .iter()
        .filter_map(|chunk| {
            chunk.embedding.as_deref().map(|emb| ScoredCandidate {
                chunk: chunk.clone(),
                score: cosine_similarity(query, emb),
            })
        })
        .collect();

    select_top(scored, config.top_k, config.min_similarity)
}

/// Keyword path: sum literal occurrences of each query token in every chunk.
pub fn rank_by_keywords(
    query: &str,
    chunks: &[KnowledgeChunk],
    config: &RankConfig,
) -> Vec<ScoredCandidate> {
    let tokens = query_tokens(query, config.min_token_len);
    if tokens.is_empty() {
        return Vec::new();
    }

    let scored = chunks
        .iter()
        .map(|chunk| {
            let haystack = chunk.text.to_lowercase();
            let hits: usize = tokens
                .iter()
                .map(|token| count_occurrences(&haystack, token))
                .sum();
            ScoredCandidate {
                chunk: chunk.clone(),
                score: hits as f64,
            }
        })
        .collect();

    select_top(scored, config.top_k, 0.0)
}

/// Full retrieval: semantic first, keyword fallback when it finds nothing.
pub fn retrieve(
    query_text: &str,
    query_embedding: Option<&[f32]>,
    chunks: &[KnowledgeChunk],
    config: &RankConfig,
) -> Retrieval {
    if let Some(embedding) = query_embedding {
        let semantic = rank_by_embedding(embedding, chunks, config);
        if !semantic.is_empty() {
            return Retrieval {
                path: RetrievalPath::Semantic,
                candidates: semantic,
            };
        }
    }

    let keyword = rank_by_keywords(query_text, chunks, config);
    let path = if keyword.is_empty() {
        RetrievalPath::None
    } else {
        RetrievalPath::Keyword
    };
    tracing::debug!(
        embedded_query = query_embedding.is_some(),
        path = path.as_str(),
        hits = keyword.len(),
        "semantic search empty, used keyword fallback"
    );

    Retrieval {
        path,
        candidates: keyword,
    }
}

/// Render candidates as a bulleted block under [`CONTEXT_HEADER`].
pub fn render_context(candidates: &[ScoredCandidate]) -> Option<String> {
    if candidates.is_empty() {
        return None;
    }
    let mut out = String::from(CONTEXT_HEADER);
    for candidate in candidates {
        out.push_str("\n- ");
        out.push_str(candidate.chunk.text.trim());
    }
    Some(out)
}

/// Lower-cased whitespace tokens with at least `min_len` characters.
pub fn query_tokens(query: &str, min_len: usize) -> Vec<String> {
    query
        .to_lowercase()
        .split_whitespace()
        .filter(|t| t.chars().count() >= min_len)
        .map(str::to_string)
        .collect()
}

// ── Internal helpers ──────────────────────────────────────────────────────────

/// Non-overlapping occurrences of `needle` in `haystack`.
fn count_occurrences(haystack: &str, needle: &str) -> usize {
    if needle.is_empty() {
        return 0;
    }
    haystack.matches(needle).count()
}

/// Stable descending sort, then keep the first `k` scoring above `floor`.
fn select_top(mut scored: Vec<ScoredCandidate>, k: usize, floor: f64) -> Vec<ScoredCandidate> {
    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(k);
    scored.retain(|c| c.score > floor);
    scored
}
