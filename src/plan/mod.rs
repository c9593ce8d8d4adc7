//! UI-automation commands embedded in model replies.
//!
//! The model is taught a small line-oriented language (see [`grammar`]):
//! `keyword: value` directives, a multi-step `plan:` JSON array, `motion:`
//! avatar tags and bracketed emotion tags. [`parse_reply`] separates those
//! from the prose so a downstream executor can run the steps in order.
//!
//! # Modules
//!
//! - [`grammar`] — the directive table and the prompt text generated from it
//! - [`lexer`] — splits a reply into directive and prose lines
//! - [`parser`] — builds a [`ParsedReply`] from the lexed lines
//! - [`progress`] — the step-by-step execution record an executor persists

pub mod grammar;
pub mod lexer;
pub mod parser;
pub mod progress;

pub use parser::parse_reply;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Prefix marking a selector that is resolved by visible text.
pub const TEXT_SELECTOR_PREFIX: &str = "text:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    Navigate,
    Highlight,
    Click,
    Input,
    Hover,
    Scroll,
    Press,
    Wait,
}

impl StepKind {
    pub const ALL: [StepKind; 8] = [
        Self::Navigate,
        Self::Highlight,
        Self::Click,
        Self::Input,
        Self::Hover,
        Self::Scroll,
        Self::Press,
        Self::Wait,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Navigate => "navigate",
            Self::Highlight => "highlight",
            Self::Click => "click",
            Self::Input => "input",
            Self::Hover => "hover",
            Self::Scroll => "scroll",
            Self::Press => "press",
            Self::Wait => "wait",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown step type: {s}"))
    }
}

/// How an executor should locate a step's target element. Part of the public
/// API for plan executors; progress labels use it too.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector<'a> {
    Css(&'a str),
    /// Resolve by rendered text content.
    Text(&'a str),
}

impl<'a> Selector<'a> {
    pub fn parse(raw: &'a str) -> Self {
        let raw = raw.trim();
        match raw.strip_prefix(TEXT_SELECTOR_PREFIX) {
            Some(text) => Self::Text(text.trim()),
            None => Self::Css(raw),
        }
    }
}

/// One executable step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    #[serde(rename = "type")]
    pub kind: StepKind,
    /// Selector, or the path/URL for `navigate`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Text for `input`, key for `press`, milliseconds for `wait`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl PlanStep {
    pub fn new(kind: StepKind, target: Option<String>, value: Option<String>) -> Self {
        Self {
            kind,
            target,
            value,
        }
    }

    /// `navigate` reloads the page, so the executor loses control mid-step
    /// and must resume afterwards.
    pub fn interrupts_execution(&self) -> bool {
        self.kind == StepKind::Navigate
    }

    /// The element this step acts on. `None` for `navigate`, `wait` and
    /// steps without a target.
    pub fn selector(&self) -> Option<Selector<'_>> {
        match self.kind {
            StepKind::Navigate | StepKind::Wait => None,
            _ => self.target.as_deref().map(Selector::parse),
        }
    }

    /// Short human-readable label for progress displays.
    pub fn describe(&self) -> String {
        let target = match self.selector() {
            Some(Selector::Text(text)) => format!("\"{text}\""),
            Some(Selector::Css(css)) => css.to_string(),
            None => self.target.clone().unwrap_or_else(|| "?".into()),
        };
        let value = self.value.as_deref().unwrap_or("");
        match self.kind {
            StepKind::Navigate => format!("Go to {target}"),
            StepKind::Click => format!("Click {target}"),
            StepKind::Input => format!("Type \"{value}\" into {target}"),
            StepKind::Highlight => format!("Find {target}"),
            StepKind::Hover => format!("Hover over {target}"),
            StepKind::Scroll => format!("Scroll to {target}"),
            StepKind::Press => match self.target {
                Some(_) => format!("Press {value} on {target}"),
                None => format!("Press {value}"),
            },
            StepKind::Wait => format!("Wait for {}ms", self.value.as_deref().unwrap_or("1000")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Happy,
    Sad,
    Surprised,
    Angry,
    Thinking,
    Neutral,
}

impl Emotion {
    pub const ALL: [Emotion; 6] = [
        Self::Happy,
        Self::Sad,
        Self::Surprised,
        Self::Angry,
        Self::Thinking,
        Self::Neutral,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Happy => "happy",
            Self::Sad => "sad",
            Self::Surprised => "surprised",
            Self::Angry => "angry",
            Self::Thinking => "thinking",
            Self::Neutral => "neutral",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|e| e.as_str().eq_ignore_ascii_case(tag.trim()))
    }
}

/// A model reply split into prose and machine-readable actions.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParsedReply {
    /// The reply with directives and tags removed.
    pub text: String,
    pub steps: Vec<PlanStep>,
    pub motions: Vec<String>,
    pub emotions: Vec<Emotion>,
}

impl ParsedReply {
    pub fn has_actions(&self) -> bool {
        !(self.steps.is_empty() && self.motions.is_empty() && self.emotions.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_distinguishes_text_and_css() {
        assert_eq!(Selector::parse("text:Login"), Selector::Text("Login"));
        assert_eq!(Selector::parse(" text: Sign up "), Selector::Text("Sign up"));
        assert_eq!(Selector::parse("#submit-btn"), Selector::Css("#submit-btn"));
    }

    #[test]
    fn only_navigate_interrupts() {
        for kind in StepKind::ALL {
            let step = PlanStep::new(kind, Some("/x".into()), None);
            assert_eq!(step.interrupts_execution(), kind == StepKind::Navigate);
        }
    }

    #[test]
    fn navigate_target_is_not_a_selector() {
        let nav = PlanStep::new(StepKind::Navigate, Some("/pricing".into()), None);
        assert_eq!(nav.selector(), None);
        let click = PlanStep::new(StepKind::Click, Some("text:Buy".into()), None);
        assert_eq!(click.selector(), Some(Selector::Text("Buy")));
    }

    #[test]
    fn step_kind_parses_case_insensitively() {
        assert_eq!("Click".parse::<StepKind>().unwrap(), StepKind::Click);
        assert!("teleport".parse::<StepKind>().is_err());
    }

    #[test]
    fn step_serializes_with_type_field() {
        let step = PlanStep::new(StepKind::Input, Some("#q".into()), Some("rust".into()));
        assert_eq!(
            serde_json::to_value(&step).unwrap(),
            serde_json::json!({"type": "input", "target": "#q", "value": "rust"})
        );
    }

    #[test]
    fn descriptions_read_naturally() {
        let step = PlanStep::new(StepKind::Input, Some("#email".into()), Some("a@b.c".into()));
        assert_eq!(step.describe(), "Type \"a@b.c\" into #email");
        let wait = PlanStep::new(StepKind::Wait, None, Some("500".into()));
        assert_eq!(wait.describe(), "Wait for 500ms");
    }

    #[test]
    fn descriptions_quote_text_selectors() {
        let click = PlanStep::new(StepKind::Click, Some("text: Log in".into()), None);
        assert_eq!(click.describe(), "Click \"Log in\"");
        let nav = PlanStep::new(StepKind::Navigate, Some("text:odd/path".into()), None);
        assert_eq!(nav.describe(), "Go to text:odd/path");
        let press = PlanStep::new(StepKind::Press, Some("#q".into()), Some("Enter".into()));
        assert_eq!(press.describe(), "Press Enter on #q");
    }
}
