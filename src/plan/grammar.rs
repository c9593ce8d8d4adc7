//! The directive vocabulary.
//!
//! [`DIRECTIVES`] is the single source for both the lexer's keyword lookup
//! and the command reference placed in the system prompt. Adding a command
//! means adding a row here and handling it in the parser.

use super::{Emotion, StepKind, TEXT_SELECTOR_PREFIX};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveKind {
    Step(StepKind),
    /// JSON array of steps.
    Plan,
    /// Avatar animation.
    Motion,
}

#[derive(Debug, Clone, Copy)]
pub struct Directive {
    pub keyword: &'static str,
    pub kind: DirectiveKind,
    pub syntax: &'static str,
    pub summary: &'static str,
}

pub const DIRECTIVES: &[Directive] = &[
    Directive {
        keyword: "navigate",
        kind: DirectiveKind::Step(StepKind::Navigate),
        syntax: "navigate: /route",
        summary: "open a page of this site (path) or an external URL",
    },
    Directive {
        keyword: "highlight",
        kind: DirectiveKind::Step(StepKind::Highlight),
        syntax: "highlight: <selector>",
        summary: "draw attention to an element",
    },
    Directive {
        keyword: "click",
        kind: DirectiveKind::Step(StepKind::Click),
        syntax: "click: <selector>",
        summary: "click an element",
    },
    Directive {
        keyword: "input",
        kind: DirectiveKind::Step(StepKind::Input),
        syntax: "input: <selector> | <text>",
        summary: "type text into a field",
    },
    Directive {
        keyword: "hover",
        kind: DirectiveKind::Step(StepKind::Hover),
        syntax: "hover: <selector>",
        summary: "move the pointer over an element",
    },
    Directive {
        keyword: "scroll",
        kind: DirectiveKind::Step(StepKind::Scroll),
        syntax: "scroll: <selector>",
        summary: "scroll an element into view",
    },
    Directive {
        keyword: "press",
        kind: DirectiveKind::Step(StepKind::Press),
        syntax: "press: <key> [on <selector>]",
        summary: "press a keyboard key, optionally on an element",
    },
    Directive {
        keyword: "plan",
        kind: DirectiveKind::Plan,
        syntax: r#"plan: [{"type": "...", "target": "...", "value": "..."}]"#,
        summary: "run several steps in order; type is one of navigate, highlight, click, \
                  input, hover, scroll, press, wait",
    },
    Directive {
        keyword: "motion",
        kind: DirectiveKind::Motion,
        syntax: "motion: <name>",
        summary: "play an avatar animation",
    },
];

/// Look up a directive by keyword, ignoring ASCII case.
pub fn lookup(keyword: &str) -> Option<&'static Directive> {
    DIRECTIVES
        .iter()
        .find(|d| d.keyword.eq_ignore_ascii_case(keyword))
}

/// Prompt text telling the model exactly which commands are legal.
pub fn grammar_reference() -> String {
    let mut out = String::from(
        "## Commands\nTo act on the page, put each command on its own line. \
         Only these forms are understood:\n",
    );
    for d in DIRECTIVES {
        out.push_str(&format!("- `{}`: {}\n", d.syntax, d.summary));
    }
    out.push_str(&format!(
        "\nA <selector> is a CSS selector taken from the page context, or \
         `{TEXT_SELECTOR_PREFIX}<visible text>` to target an element by the text it shows.\n\
         Use `plan:` for tasks that need more than one step. A `navigate` step reloads \
         the page; the remaining steps continue afterwards.\n"
    ));
    let tags: Vec<String> = Emotion::ALL
        .iter()
        .map(|e| format!("[{}]", e.as_str()))
        .collect();
    out.push_str(&format!(
        "\nStart your reply with one emotion tag: {}.\n",
        tags.join(" ")
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_step_kind_but_wait_has_a_line_directive() {
        for kind in StepKind::ALL {
            let found = DIRECTIVES
                .iter()
                .any(|d| d.kind == DirectiveKind::Step(kind));
            assert_eq!(found, kind != StepKind::Wait, "{kind}");
        }
    }

    #[test]
    fn lookup_ignores_case() {
        assert_eq!(lookup("NAVIGATE").map(|d| d.keyword), Some("navigate"));
        assert!(lookup("teleport").is_none());
    }

    #[test]
    fn reference_lists_every_keyword_and_the_text_selector() {
        let reference = grammar_reference();
        for d in DIRECTIVES {
            assert!(reference.contains(d.syntax), "{}", d.keyword);
        }
        assert!(reference.contains("text:<visible text>"));
        assert!(reference.contains("[thinking]"));
    }
}
