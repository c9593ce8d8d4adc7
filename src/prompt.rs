//! Generation request assembly.
//!
//! The system block is built in a fixed order: persona, user name, long-term
//! summary, command grammar, project knowledge, live page context, retrieved
//! context. Recent history follows as alternating turns, then the new
//! message. Wording may change freely; the order and the grammar section are
//! what the reply parser relies on.

use serde::{Deserialize, Serialize};

use crate::generation::{GenerationRequest, Turn};
use crate::memory::types::{ChatEntry, Role};
use crate::plan::grammar;

/// Page elements beyond this many are not sent to the model.
pub const PAGE_CONTEXT_LIMIT: usize = 50;

pub const GUEST_NAME: &str = "Guest";

/// Stands in for the summary when nothing has been folded yet.
pub const NO_MEMORY: &str = "No prior memory of this user.";

/// A visible, interactive element reported by the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageElement {
    pub tag: String,
    #[serde(default)]
    pub text: String,
    pub selector: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub in_viewport: bool,
}

/// Everything a single request is assembled from.
#[derive(Debug, Clone, Copy)]
pub struct PromptInputs<'a> {
    pub assistant_name: &'a str,
    pub persona: &'a str,
    pub user_name: Option<&'a str>,
    pub summary: &'a str,
    pub project_knowledge: Option<&'a str>,
    pub page_context: &'a [PageElement],
    pub retrieved_context: Option<&'a str>,
    /// Stored conversation, oldest first.
    pub history: &'a [ChatEntry],
    pub history_window: usize,
    pub message: &'a str,
}

pub fn build_system_prompt(inputs: &PromptInputs<'_>) -> String {
    let mut sections: Vec<String> = Vec::with_capacity(7);

    let persona = inputs.persona.trim();
    sections.push(match inputs.assistant_name.trim() {
        "" => persona.to_string(),
        name => format!("Your name is {name}.\n{persona}"),
    });

    let name = inputs
        .user_name
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(GUEST_NAME);
    sections.push(format!("## User\nYou are talking to: {name}"));

    let summary = match inputs.summary.trim() {
        "" => NO_MEMORY,
        s => s,
    };
    sections.push(format!("## Long-term memory\n{summary}"));

    sections.push(grammar::grammar_reference().trim_end().to_string());

    if let Some(knowledge) = inputs.project_knowledge.map(str::trim).filter(|k| !k.is_empty()) {
        sections.push(format!("## Project knowledge\n{knowledge}"));
    }

    sections.push(format!(
        "## Page context\nVisible interactive elements (JSON):\n{}",
        render_page_context(inputs.page_context)
    ));

    if let Some(context) = inputs.retrieved_context {
        sections.push(context.to_string());
    }

    sections.join("\n\n")
}

/// Serialize the first [`PAGE_CONTEXT_LIMIT`] elements as a JSON array.
pub fn render_page_context(elements: &[PageElement]) -> String {
    let shown = &elements[..elements.len().min(PAGE_CONTEXT_LIMIT)];
    serde_json::to_string(shown).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to serialize page context");
        "[]".to_string()
    })
}

/// Build the full request: system block, recent history, new message.
pub fn assemble(inputs: &PromptInputs<'_>) -> GenerationRequest {
    let skip = inputs.history.len().saturating_sub(inputs.history_window);
    let mut turns: Vec<Turn> = inputs.history[skip..]
        .iter()
        .map(|entry| match entry.role {
            Role::User => Turn::user(entry.text.clone()),
            Role::Agent => Turn::model(entry.text.clone()),
        })
        .collect();
    turns.push(Turn::user(inputs.message));

    GenerationRequest {
        system: build_system_prompt(inputs),
        turns,
    }
}
