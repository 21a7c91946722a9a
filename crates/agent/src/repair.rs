//! Repair pass for tool calls the model emitted as plain text.
//!
//! Some models, especially smaller routed ones, print their tool calls
//! into the content instead of the structured field. Three heuristics run
//! in order; the first that matches wins, and at most one repair is
//! applied per message. Repairing already-clean prose is a no-op.

use kaio_core::message::{ToolInvocation, EMPTY_RESPONSE_PLACEHOLDER};
use regex::Regex;
use std::sync::LazyLock;

/// Result of a successful repair: the remaining prose and the calls that
/// were lifted out of it.
#[derive(Debug, Clone, PartialEq)]
pub struct RepairedCalls {
    pub content: String,
    pub calls: Vec<ToolInvocation>,
}

static FENCED_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:json)?\s*\n?(.*?)```").expect("fenced block regex")
});

static PSEUDO_XML_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<([a-zA-Z_][a-zA-Z0-9_]*)((?:\s+[a-zA-Z_][a-zA-Z0-9_]*="[^"]*")*)\s*/>"#)
        .expect("pseudo-xml regex")
});

static XML_ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([a-zA-Z_][a-zA-Z0-9_]*)="([^"]*)""#).expect("xml attr regex")
});

static NAME_COMMA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([a-zA-Z_][a-zA-Z0-9_]*)\s*,\s*(\{.*\})$").expect("name-comma regex"));

/// Try to lift tool calls out of assistant text. `None` means no heuristic
/// matched and the content stands as-is.
pub fn repair(content: &str) -> Option<RepairedCalls> {
    parse_json_array(content)
        .or_else(|| parse_pseudo_xml(content))
        .or_else(|| parse_name_comma(content))
}

/// Heuristic 1: a fenced code block or bare JSON array whose elements are
/// call objects (`{name, arguments}` or `{function: {name, arguments}}`).
fn parse_json_array(content: &str) -> Option<RepairedCalls> {
    // Fenced block first: its body may be an array or a single object.
    if let Some(m) = FENCED_BLOCK_RE.captures(content) {
        let body = m.get(1)?.as_str().trim();
        if let Some(calls) = calls_from_json_text(body) {
            let whole = m.get(0)?;
            return Some(finish(content, whole.start(), whole.end(), calls));
        }
    }

    // Bare array embedded in the text.
    for (start, _) in content.match_indices('[') {
        let Some(end) = matching_bracket(&content[start..]) else {
            continue;
        };
        let candidate = &content[start..start + end + 1];
        if let Some(calls) = calls_from_json_text(candidate) {
            return Some(finish(content, start, start + end + 1, calls));
        }
    }

    None
}

/// Heuristic 2: self-closing pseudo-XML tags with string attributes, e.g.
/// `<list_files directory="." />`. Every tag in the message becomes a call.
fn parse_pseudo_xml(content: &str) -> Option<RepairedCalls> {
    let mut calls = Vec::new();
    for caps in PSEUDO_XML_RE.captures_iter(content) {
        let name = caps.get(1)?.as_str();
        let attrs = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        let mut arguments = serde_json::Map::new();
        for attr in XML_ATTR_RE.captures_iter(attrs) {
            arguments.insert(
                attr[1].to_string(),
                serde_json::Value::String(attr[2].to_string()),
            );
        }
        calls.push(ToolInvocation::new(
            name,
            serde_json::Value::Object(arguments).to_string(),
        ));
    }

    if calls.is_empty() {
        return None;
    }

    let stripped = PSEUDO_XML_RE.replace_all(content, " ");
    Some(RepairedCalls {
        content: tidy(&stripped),
        calls,
    })
}

/// Heuristic 3: the whole message is `name, {json}` on one line.
fn parse_name_comma(content: &str) -> Option<RepairedCalls> {
    let trimmed = content.trim();
    if trimmed.contains('\n') {
        return None;
    }
    let caps = NAME_COMMA_RE.captures(trimmed)?;
    let name = caps.get(1)?.as_str();
    let json = caps.get(2)?.as_str();
    let value: serde_json::Value = serde_json::from_str(json).ok()?;
    if !value.is_object() {
        return None;
    }
    Some(RepairedCalls {
        content: String::new(),
        calls: vec![ToolInvocation::new(name, value.to_string())],
    })
}

/// Parse JSON text into calls if it is an array of call objects (or one
/// bare call object).
fn calls_from_json_text(text: &str) -> Option<Vec<ToolInvocation>> {
    let value: serde_json::Value = serde_json::from_str(text).ok()?;
    let items: Vec<&serde_json::Value> = match &value {
        serde_json::Value::Array(arr) if !arr.is_empty() => arr.iter().collect(),
        serde_json::Value::Object(_) => vec![&value],
        _ => return None,
    };

    let mut calls = Vec::new();
    for item in items {
        calls.push(call_from_value(item)?);
    }
    Some(calls)
}

fn call_from_value(value: &serde_json::Value) -> Option<ToolInvocation> {
    let inner = value.get("function").unwrap_or(value);
    let name = inner.get("name")?.as_str()?;

    // Arguments may be an object, a JSON-encoded string, or absent.
    let arguments = match inner.get("arguments") {
        Some(serde_json::Value::Object(map)) => {
            serde_json::Value::Object(map.clone()).to_string()
        }
        Some(serde_json::Value::String(s)) => {
            match serde_json::from_str::<serde_json::Value>(s) {
                Ok(v) if v.is_object() => v.to_string(),
                _ => "{}".to_string(),
            }
        }
        _ => "{}".to_string(),
    };

    Some(ToolInvocation::new(name, arguments))
}

/// Find the index of the `]` matching the `[` at position 0, respecting
/// strings and nesting.
fn matching_bracket(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '[' | '{' => depth += 1,
            ']' | '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn finish(content: &str, start: usize, end: usize, calls: Vec<ToolInvocation>) -> RepairedCalls {
    let remainder = format!("{} {}", &content[..start], &content[end..]);
    RepairedCalls {
        content: tidy(&remainder),
        calls,
    }
}

/// Collapse runs of whitespace left behind by stripping, preserving line
/// breaks between paragraphs.
fn tidy(s: &str) -> String {
    let collapsed = s
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .collect::<Vec<_>>()
        .join("\n");
    collapsed.trim().to_string()
}

/// Content to store for a repaired message: stripped prose, or the
/// placeholder when nothing but the call text was there.
pub fn repaired_content(repaired: &RepairedCalls) -> String {
    if repaired.content.is_empty() {
        EMPTY_RESPONSE_PLACEHOLDER.to_string()
    } else {
        repaired.content.clone()
    }
}
