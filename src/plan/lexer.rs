//! Line classification.
//!
//! A line of the form `^\s*<keyword>\s*:\s*<value>` with a known keyword is a
//! directive; everything else is prose. Leading emotion tags, a list marker
//! (`- `, `* `, `1. `) and a single pair of backticks around a directive are
//! tolerated. Byte offsets are kept so the parser can read a
//! `plan:` value that continues over several lines and then [`Lexer::seek`]
//! past it.

use super::grammar::{self, Directive, DirectiveKind};
use super::Emotion;

#[derive(Debug, Clone, Copy)]
pub enum LineKind<'a> {
    Prose,
    Directive {
        directive: &'static Directive,
        /// Whatever preceded the keyword: emotion tags, a list marker.
        lead: &'a str,
        /// Value on this line, trimmed. May be empty only for `plan`.
        value: &'a str,
        /// Absolute byte offset where the value starts.
        value_offset: usize,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct Line<'a> {
    /// Line content without its terminator.
    pub text: &'a str,
    pub kind: LineKind<'a>,
}

pub struct Lexer<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    pub fn source(&self) -> &'a str {
        self.src
    }

    /// Continue lexing from byte offset `pos`, clamped to the input.
    pub fn seek(&mut self, pos: usize) {
        let mut pos = pos.min(self.src.len());
        while !self.src.is_char_boundary(pos) {
            pos += 1;
        }
        self.pos = pos;
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Line<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.src.len() {
            return None;
        }
        let start = self.pos;
        let rest = &self.src[start..];
        let (raw, consumed) = match rest.find('\n') {
            Some(i) => (&rest[..i], i + 1),
            None => (rest, rest.len()),
        };
        self.pos = start + consumed;

        let text = raw.strip_suffix('\r').unwrap_or(raw);
        Some(Line {
            text,
            kind: classify(text, start),
        })
    }
}

fn leading_ws(s: &str) -> usize {
    s.len() - s.trim_start().len()
}

/// Length of a leading `[tag]` naming a known emotion.
fn emotion_tag_len(s: &str) -> Option<usize> {
    let inner = s.strip_prefix('[')?;
    let close = inner.find(']')?;
    Emotion::from_tag(&inner[..close]).map(|_| close + 2)
}

/// Length of a leading `- `, `* ` or `12. ` list marker.
fn list_marker_len(s: &str) -> Option<usize> {
    if s.starts_with("- ") || s.starts_with("* ") {
        return Some(2);
    }
    let digits = s.bytes().take_while(u8::is_ascii_digit).count();
    (digits > 0 && s[digits..].starts_with(". ")).then_some(digits + 2)
}

/// Byte offset of the first character after tags, a list marker and spaces.
fn skip_lead(line: &str) -> usize {
    let mut offset = leading_ws(line);
    let mut marker_seen = false;
    loop {
        let rest = &line[offset..];
        let skipped = match emotion_tag_len(rest) {
            Some(n) => n,
            None if !marker_seen => match list_marker_len(rest) {
                Some(n) => {
                    marker_seen = true;
                    n
                }
                None => break,
            },
            None => break,
        };
        offset += skipped;
        offset += leading_ws(&line[offset..]);
    }
    offset
}

fn classify(line: &str, line_start: usize) -> LineKind<'_> {
    let mut offset = skip_lead(line);
    let lead = &line[..offset];
    if line[offset..].starts_with('`') {
        offset += 1;
    }

    let keyword_len = line[offset..]
        .bytes()
        .take_while(|b| b.is_ascii_alphabetic())
        .count();
    if keyword_len == 0 {
        return LineKind::Prose;
    }
    let Some(directive) = grammar::lookup(&line[offset..offset + keyword_len]) else {
        return LineKind::Prose;
    };
    offset += keyword_len;
    offset += leading_ws(&line[offset..]);
    if !line[offset..].starts_with(':') {
        return LineKind::Prose;
    }
    offset += 1;
    offset += leading_ws(&line[offset..]);

    let value = line[offset..].trim_end().trim_end_matches('`').trim_end();
    if value.is_empty() && directive.kind != DirectiveKind::Plan {
        return LineKind::Prose;
    }
    LineKind::Directive {
        directive,
        lead,
        value,
        value_offset: line_start + offset,
    }
}
