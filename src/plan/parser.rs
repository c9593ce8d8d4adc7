use serde::Deserialize;
use serde_json::Value;

use super::grammar::DirectiveKind;
use super::lexer::{Lexer, LineKind};
use super::{Emotion, ParsedReply, PlanStep, StepKind};

/// A `plan:` element before validation.
#[derive(Deserialize)]
struct RawStep {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    target: Option<Value>,
    #[serde(default)]
    value: Option<Value>,
}

/// Split a model reply into prose and actions.
///
/// Steps come out in reply order, one per directive, with `plan:` arrays
/// expanded in place. Unknown plan step types are dropped; a `plan:` whose
/// JSON does not parse is left in the prose.
pub fn parse_reply(reply: &str) -> ParsedReply {
    let mut parsed = ParsedReply::default();
    let mut prose: Vec<String> = Vec::new();
    let mut lexer = Lexer::new(reply);

    while let Some(line) = lexer.next() {
        let LineKind::Directive {
            directive,
            lead,
            value,
            value_offset,
        } = line.kind
        else {
            push_prose(&mut prose, line.text, &mut parsed.emotions);
            continue;
        };

        match directive.kind {
            DirectiveKind::Step(kind) => {
                strip_emotion_tags(lead, &mut parsed.emotions);
                parsed.steps.push(line_step(kind, value));
            }
            DirectiveKind::Motion => {
                strip_emotion_tags(lead, &mut parsed.emotions);
                parsed.motions.push(value.to_string());
            }
            DirectiveKind::Plan => match read_plan(&lexer.source()[value_offset..]) {
                Some((steps, consumed)) => {
                    strip_emotion_tags(lead, &mut parsed.emotions);
                    parsed.steps.extend(steps);
                    lexer.seek(skip_blank_tail(reply, value_offset + consumed));
                }
                None => push_prose(&mut prose, line.text, &mut parsed.emotions),
            },
        }
    }

    parsed.text = prose.join("\n").trim().to_string();
    parsed
}

/// Build a step from a single-line directive value.
fn line_step(kind: StepKind, value: &str) -> PlanStep {
    match kind {
        StepKind::Input => match value.split_once('|') {
            Some((target, text)) => PlanStep::new(
                kind,
                Some(target.trim().to_string()),
                non_empty(text.trim()),
            ),
            None => PlanStep::new(kind, Some(value.to_string()), None),
        },
        StepKind::Press => {
            // ASCII lowercasing keeps byte offsets aligned with `value`
            match value.to_ascii_lowercase().find(" on ") {
                Some(i) => PlanStep::new(
                    kind,
                    non_empty(value[i + 4..].trim()),
                    Some(value[..i].trim().to_string()),
                ),
                None => PlanStep::new(kind, None, Some(value.to_string())),
            }
        }
        _ => PlanStep::new(kind, Some(value.to_string()), None),
    }
}

/// Parse the JSON array at the start of `src`. Returns the valid steps and the
/// number of bytes the array occupied.
fn read_plan(src: &str) -> Option<(Vec<PlanStep>, usize)> {
    let mut stream = serde_json::Deserializer::from_str(src).into_iter::<Vec<RawStep>>();
    match stream.next() {
        Some(Ok(raw)) => {
            let steps = raw.into_iter().filter_map(validate_step).collect();
            Some((steps, stream.byte_offset()))
        }
        Some(Err(e)) => {
            tracing::warn!(error = %e, "malformed plan JSON, keeping it as text");
            None
        }
        None => None,
    }
}

fn validate_step(raw: RawStep) -> Option<PlanStep> {
    let Some(name) = raw.kind else {
        tracing::warn!("plan step without a type, dropping");
        return None;
    };
    match name.parse::<StepKind>() {
        Ok(kind) => Some(PlanStep::new(
            kind,
            raw.target.and_then(stringify),
            raw.value.and_then(stringify),
        )),
        Err(_) => {
            tracing::warn!(step_type = %name, "unknown plan step type, dropping");
            None
        }
    }
}

/// Past the end of the current line if only whitespace or backticks remain on it.
fn skip_blank_tail(src: &str, pos: usize) -> usize {
    let rest = &src[pos..];
    let line_end = rest.find('\n').map_or(rest.len(), |i| i + 1);
    if rest[..line_end].trim().trim_matches('`').is_empty() {
        pos + line_end
    } else {
        pos
    }
}

fn stringify(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

fn push_prose(prose: &mut Vec<String>, line: &str, emotions: &mut Vec<Emotion>) {
    let before = emotions.len();
    let stripped = strip_emotion_tags(line, emotions);
    let text = if emotions.len() > before {
        stripped.trim().to_string()
    } else {
        stripped.trim_end().to_string()
    };

    if is_fence(&text) {
        return;
    }
    let previous_blank = prose.last().is_some_and(|l| l.is_empty());
    if text.is_empty() && previous_blank {
        return;
    }
    prose.push(text);
}

/// A bare code fence such as ```` ``` ```` or ```` ```json ````.
fn is_fence(text: &str) -> bool {
    text.trim_start()
        .strip_prefix("```")
        .is_some_and(|lang| lang.chars().all(|c| c.is_ascii_alphanumeric()))
}

fn strip_emotion_tags(line: &str, emotions: &mut Vec<Emotion>) -> String {
    let mut out = String::with_capacity(line.len());
    let mut rest = line;
    while let Some(open) = rest.find('[') {
        let after = &rest[open + 1..];
        let Some(close) = after.find(']') else {
            break;
        };
        match Emotion::from_tag(&after[..close]) {
            Some(emotion) => {
                emotions.push(emotion);
                out.push_str(&rest[..open]);
                rest = &after[close + 1..];
            }
            None => {
                out.push_str(&rest[..=open]);
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_array_expands_in_order() {
        let reply = r#"Let me log you in.
plan: [{"type":"navigate","target":"/pricing"},{"type":"click","target":"text:Login"}]"#;
        let parsed = parse_reply(reply);
        assert_eq!(parsed.steps.len(), 2);
        assert_eq!(parsed.steps[0].kind, StepKind::Navigate);
        assert_eq!(parsed.steps[0].target.as_deref(), Some("/pricing"));
        assert_eq!(parsed.steps[1].kind, StepKind::Click);
        assert_eq!(parsed.steps[1].target.as_deref(), Some("text:Login"));
        assert_eq!(parsed.text, "Let me log you in.");
    }

    #[test]
    fn plan_may_span_lines() {
        let reply = "[thinking] On it!\n```json\nplan: [\n  {\"type\": \"input\", \"target\": \"#q\", \"value\": \"noodles\"},\n  {\"type\": \"wait\", \"value\": 500}\n]\n```\nDone soon.";
        let parsed = parse_reply(reply);
        assert_eq!(parsed.emotions, vec![Emotion::Thinking]);
        assert_eq!(parsed.steps.len(), 2);
        assert_eq!(parsed.steps[0].value.as_deref(), Some("noodles"));
        assert_eq!(parsed.steps[1].kind, StepKind::Wait);
        assert_eq!(parsed.steps[1].value.as_deref(), Some("500"));
        assert_eq!(parsed.text, "On it!\nDone soon.");
    }

    #[test]
    fn unknown_plan_types_are_dropped() {
        let parsed = parse_reply(
            r##"plan: [{"type":"teleport","target":"/moon"},{"type":"hover","target":".menu"},{"target":"#x"}]"##,
        );
        assert_eq!(parsed.steps, vec![PlanStep::new(StepKind::Hover, Some(".menu".into()), None)]);
    }

    #[test]
    fn malformed_plan_stays_in_prose() {
        let parsed = parse_reply("plan: [{\"type\": \"click\",");
        assert!(parsed.steps.is_empty());
        assert_eq!(parsed.text, "plan: [{\"type\": \"click\",");
    }

    #[test]
    fn single_line_directives_become_steps() {
        let reply = "Here you go.\nnavigate: /nutrition\ninput: #food-search | banana bread\npress: Enter on #food-search\nscroll: text:Results\nmotion: wave";
        let parsed = parse_reply(reply);
        let kinds: Vec<StepKind> = parsed.steps.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![StepKind::Navigate, StepKind::Input, StepKind::Press, StepKind::Scroll]
        );
        assert_eq!(parsed.steps[1].target.as_deref(), Some("#food-search"));
        assert_eq!(parsed.steps[1].value.as_deref(), Some("banana bread"));
        assert_eq!(parsed.steps[2].value.as_deref(), Some("Enter"));
        assert_eq!(parsed.steps[2].target.as_deref(), Some("#food-search"));
        assert_eq!(parsed.motions, vec!["wave"]);
        assert_eq!(parsed.text, "Here you go.");
    }

    #[test]
    fn directive_after_leading_emotion_tag() {
        let parsed = parse_reply("[happy] navigate: /pricing");
        assert_eq!(parsed.emotions, vec![Emotion::Happy]);
        assert_eq!(parsed.steps, vec![PlanStep::new(StepKind::Navigate, Some("/pricing".into()), None)]);
        assert_eq!(parsed.text, "");
    }

    #[test]
    fn plan_after_leading_emotion_tag() {
        let parsed = parse_reply(
            r#"[thinking] plan: [{"type":"navigate","target":"/pricing"},{"type":"click","target":"text:Login"}]"#,
        );
        assert_eq!(parsed.emotions, vec![Emotion::Thinking]);
        let kinds: Vec<StepKind> = parsed.steps.iter().map(|s| s.kind).collect();
        assert_eq!(kinds, vec![StepKind::Navigate, StepKind::Click]);
        assert_eq!(parsed.steps[1].target.as_deref(), Some("text:Login"));
        assert!(parsed.text.is_empty());
    }

    #[test]
    fn listed_directives_become_steps() {
        let reply = "[happy] Follow me:\n1. navigate: /nutrition\n2. input: #food-search | rice\n- press: Enter on #food-search";
        let parsed = parse_reply(reply);
        let kinds: Vec<StepKind> = parsed.steps.iter().map(|s| s.kind).collect();
        assert_eq!(kinds, vec![StepKind::Navigate, StepKind::Input, StepKind::Press]);
        assert_eq!(parsed.emotions, vec![Emotion::Happy]);
        assert_eq!(parsed.text, "Follow me:");
    }

    #[test]
    fn malformed_plan_after_tag_counts_the_tag_once() {
        let parsed = parse_reply("[sad] plan: [oops");
        assert_eq!(parsed.emotions, vec![Emotion::Sad]);
        assert!(parsed.steps.is_empty());
        assert_eq!(parsed.text, "plan: [oops");
    }

    #[test]
    fn press_without_target() {
        let parsed = parse_reply("press: Escape");
        assert_eq!(parsed.steps[0].value.as_deref(), Some("Escape"));
        assert_eq!(parsed.steps[0].target, None);
    }

    #[test]
    fn unknown_brackets_survive() {
        let parsed = parse_reply("[happy] See [1] and [Sad]!");
        assert_eq!(parsed.emotions, vec![Emotion::Happy, Emotion::Sad]);
        assert_eq!(parsed.text, "See [1] and !");
    }

    #[test]
    fn plain_reply_has_no_actions() {
        let parsed = parse_reply("Just chatting.\n\n\nBye.");
        assert!(!parsed.has_actions());
        assert_eq!(parsed.text, "Just chatting.\n\nBye.");
    }
}
