//! Rolling summarization of long conversation logs.
//!
//! When a user's stored log grows past the threshold, the oldest batch of
//! entries is rendered as a transcript and merged with the previous summary by
//! the generation backend. The new summary and the removal of the folded
//! entries commit together; any failure leaves both untouched.

use std::time::Duration;

use crate::config::MemoriaConfig;
use crate::db::Database;
use crate::generation::{GenerationClient, GenerationRequest, Turn};

use super::conversation;
use super::profiles;
use super::types::ChatEntry;

const SUMMARIZER_INSTRUCTION: &str = "You maintain the long-term memory of a website assistant. \
Merge the previous summary and the new conversation excerpt into a single coherent paragraph \
that keeps the user's facts, preferences and open requests. Reply with the paragraph only.";

#[derive(Debug, Clone)]
pub struct SummaryPolicy {
    /// Summarize once the stored log is longer than this.
    pub threshold: usize,
    /// Number of oldest entries folded per run.
    pub batch: usize,
    pub timeout: Duration,
}

impl Default for SummaryPolicy {
    fn default() -> Self {
        Self {
            threshold: 20,
            batch: 10,
            timeout: Duration::from_secs(10),
        }
    }
}

impl SummaryPolicy {
    pub fn from_config(config: &MemoriaConfig) -> Self {
        Self {
            threshold: config.memory.summarize_threshold,
            batch: config.memory.summarize_batch,
            timeout: config.generation.summary_timeout(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryOutcome {
    /// Log at or under the threshold.
    Skipped,
    Folded { count: usize },
    /// Backend or storage failure; nothing changed.
    Failed,
    /// The log head moved between read and write; nothing changed.
    Stale,
}

/// `role: text` lines, oldest first.
pub fn build_transcript(entries: &[ChatEntry]) -> String {
    entries
        .iter()
        .map(|e| format!("{}: {}", e.role, e.text))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn build_summary_request(previous: &str, transcript: &str) -> GenerationRequest {
    let previous = if previous.trim().is_empty() {
        "None"
    } else {
        previous
    };
    GenerationRequest {
        system: SUMMARIZER_INSTRUCTION.to_string(),
        turns: vec![Turn::user(format!(
            "Previous summary:\n{previous}\n\nNew conversation:\n{transcript}"
        ))],
    }
}

/// Fold the oldest batch of `user_id`'s log into their summary if the log is
/// over the threshold. Never fails; the outcome says what happened.
pub async fn maybe_summarize(
    db: &Database,
    generation: &GenerationClient,
    user_id: &str,
    policy: &SummaryPolicy,
) -> SummaryOutcome {
    let uid = user_id.to_string();
    let (threshold, batch) = (policy.threshold, policy.batch);
    let snapshot = db
        .run(move |conn| {
            if conversation::history_len(conn, &uid)? <= threshold {
                return Ok(None);
            }
            let head = conversation::oldest_entries(conn, &uid, batch)?;
            let previous = profiles::get_summary(conn, &uid)?;
            Ok(Some((head, previous)))
        })
        .await;

    let (head, previous) = match snapshot {
        Ok(Some((head, previous))) if !head.is_empty() => (head, previous),
        Ok(_) => return SummaryOutcome::Skipped,
        Err(e) => {
            tracing::warn!(user_id, error = %e, "could not read history for summarization");
            return SummaryOutcome::Failed;
        }
    };

    let request = build_summary_request(&previous, &build_transcript(&head));
    let summary = match generation.complete_within(&request, policy.timeout).await {
        Ok(summary) => summary,
        Err(e) => {
            tracing::warn!(user_id, error = %e, "summarization failed, keeping previous summary");
            return SummaryOutcome::Failed;
        }
    };

    let count = head.len();
    let uid = user_id.to_string();
    match db
        .run(move |conn| conversation::fold_into_summary(conn, &uid, &head, &summary))
        .await
    {
        Ok(true) => {
            tracing::info!(user_id, folded = count, "conversation folded into summary");
            SummaryOutcome::Folded { count }
        }
        Ok(false) => SummaryOutcome::Stale,
        Err(e) => {
            tracing::warn!(user_id, error = %e, "failed to store summary");
            SummaryOutcome::Failed
        }
    }
}
