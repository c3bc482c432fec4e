use crate::types::ToolCallChunk;
use serde_json::Value;
use std::collections::BTreeMap;

/// Best current reading of a tool call's argument text.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedArgs {
    /// The accumulated text parses as-is.
    Complete(Value),
    /// The text only parses after closing what was still open.
    Partial(Value),
    /// Nothing usable yet; consumers show the raw text.
    Loading,
}

impl ParsedArgs {
    pub fn value(&self) -> Option<&Value> {
        match self {
            ParsedArgs::Complete(value) | ParsedArgs::Partial(value) => Some(value),
            ParsedArgs::Loading => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, ParsedArgs::Complete(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingToolCall {
    pub index: usize,
    pub id: Option<String>,
    pub name: Option<String>,
    pub raw_args: String,
    pub args: ParsedArgs,
}

impl PendingToolCall {
    fn new(index: usize) -> Self {
        Self {
            index,
            id: None,
            name: None,
            raw_args: String::new(),
            args: ParsedArgs::Loading,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.args, ParsedArgs::Loading)
    }

    /// String argument whose closing quote has already arrived, so the value
    /// will not grow any further.
    pub fn settled_str_arg(&self, key: &str) -> Option<&str> {
        let value = self.args.value()?.get(key)?.as_str()?;
        if self.args.is_complete() {
            return Some(value);
        }
        let encoded_key = serde_json::to_string(key).ok()?;
        let encoded_value = serde_json::to_string(value).ok()?;
        self.raw_args
            .match_indices(&encoded_key)
            .any(|(at, _)| {
                let rest = self.raw_args[at + encoded_key.len()..].trim_start();
                rest.strip_prefix(':')
                    .is_some_and(|rest| rest.trim_start().starts_with(&encoded_value))
            })
            .then_some(value)
    }
}

/// Finished tool call as recorded on the AI message.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub index: usize,
    pub id: String,
    pub name: String,
    pub arguments: Value,
    /// False when the stream ended before the arguments became valid JSON.
    pub complete: bool,
}

/// Rebuilds tool invocations from index-keyed fragments.
#[derive(Debug, Default)]
pub struct ToolCallAssembler {
    calls: BTreeMap<usize, PendingToolCall>,
}

impl ToolCallAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges one fragment and re-parses that call's arguments. Name and id are
    /// only ever replaced by non-empty values; argument text is append-only.
    pub fn push(&mut self, chunk: &ToolCallChunk) -> &PendingToolCall {
        let call = self
            .calls
            .entry(chunk.index)
            .or_insert_with(|| PendingToolCall::new(chunk.index));

        if let Some(name) = chunk.name.as_deref().filter(|n| !n.is_empty()) {
            call.name = Some(name.to_string());
        }
        if let Some(id) = chunk.id.as_deref().filter(|i| !i.is_empty()) {
            call.id = Some(id.to_string());
        }
        if let Some(fragment) = chunk.args.as_deref().filter(|a| !a.is_empty()) {
            call.raw_args.push_str(fragment);
            call.args = parse_partial_args(&call.raw_args);
        }

        call
    }

    pub fn get(&self, index: usize) -> Option<&PendingToolCall> {
        self.calls.get(&index)
    }

    pub fn calls(&self) -> impl Iterator<Item = &PendingToolCall> {
        self.calls.values()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Ends the message: every accumulator becomes a [`ToolCall`], ordered by
    /// index. Calls that never learned a name are dropped.
    pub fn finalize(&mut self) -> Vec<ToolCall> {
        std::mem::take(&mut self.calls)
            .into_values()
            .filter_map(|call| {
                let name = call.name?;
                let complete = call.raw_args.trim().is_empty() || call.args.is_complete();
                let arguments = call
                    .args
                    .value()
                    .cloned()
                    .unwrap_or_else(|| Value::Object(serde_json::Map::new()));
                Some(ToolCall {
                    index: call.index,
                    id: call.id.unwrap_or_else(|| format!("call_{}", call.index)),
                    name,
                    arguments,
                    complete,
                })
            })
            .collect()
    }
}

/// Strict parse, then structural completion, then the plain `"}` / `}`
/// suffixes. Anything still unparseable is `Loading`.
pub fn parse_partial_args(raw: &str) -> ParsedArgs {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return ParsedArgs::Loading;
    }
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return ParsedArgs::Complete(value);
    }

    let mut candidates = Vec::with_capacity(3);
    if let Some(completed) = complete_partial_json(trimmed) {
        candidates.push(completed);
    }
    candidates.push(format!("{trimmed}\"}}"));
    candidates.push(format!("{trimmed}}}"));

    candidates
        .iter()
        .find_map(|candidate| serde_json::from_str::<Value>(candidate).ok())
        .map(ParsedArgs::Partial)
        .unwrap_or(ParsedArgs::Loading)
}

/// Closes an unterminated JSON prefix: finishes an open string, drops a
/// trailing comma, colon or dangling key, then closes open brackets.
fn complete_partial_json(prefix: &str) -> Option<String> {
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    // Byte offset where the string currently open (if any) started.
    let mut string_start = 0usize;
    // Whether the open string sits in key position of an object.
    let mut string_is_key = false;

    for (offset, ch) in prefix.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => {
                in_string = true;
                string_start = offset;
                string_is_key = stack.last() == Some(&'{') && expects_key(&prefix[..offset]);
            }
            '{' | '[' => stack.push(ch),
            '}' | ']' => {
                stack.pop()?;
            }
            _ => {}
        }
    }

    let mut out = prefix.to_string();
    if in_string {
        if string_is_key {
            out.truncate(string_start);
        } else {
            if escaped {
                out.pop();
            }
            // A cut \uXXXX escape cannot be closed; drop it.
            if let Some(pos) = out.rfind("\\u") {
                if pos > string_start && out.len() - pos < 6 && !is_escaped_backslash(&out, pos) {
                    out.truncate(pos);
                }
            }
            out.push('"');
        }
    }

    loop {
        let trimmed_len = out.trim_end().len();
        out.truncate(trimmed_len);
        if out.ends_with(',') || out.ends_with(':') {
            if out.ends_with(':') {
                out.pop();
                strip_trailing_key(&mut out);
            } else {
                out.pop();
            }
            continue;
        }
        if stack.last() == Some(&'{') && ends_with_dangling_key(&out) {
            strip_trailing_key(&mut out);
            continue;
        }
        break;
    }

    // A bare literal cut short (`tru`, `nul`, `12.`) has no safe completion.
    if let Some(last) = out.chars().last() {
        if last.is_ascii_alphabetic() || last == '.' || last == '-' {
            let literal_start = out
                .rfind(|c: char| !(c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '+'))
                .map(|p| p + 1)
                .unwrap_or(0);
            let literal = &out[literal_start..];
            if !matches!(literal, "true" | "false" | "null") && literal.parse::<f64>().is_err() {
                out.truncate(literal_start);
                loop {
                    let trimmed_len = out.trim_end().len();
                    out.truncate(trimmed_len);
                    if out.ends_with(':') {
                        out.pop();
                        strip_trailing_key(&mut out);
                    } else if out.ends_with(',') {
                        out.pop();
                    } else {
                        break;
                    }
                }
            }
        }
    }

    for open in stack.iter().rev() {
        out.push(if *open == '{' { '}' } else { ']' });
    }
    Some(out)
}

fn expects_key(before: &str) -> bool {
    matches!(before.trim_end().chars().last(), Some('{') | Some(','))
}

fn is_escaped_backslash(text: &str, pos: usize) -> bool {
    text[..pos].chars().rev().take_while(|c| *c == '\\').count() % 2 == 1
}

/// `..., "key"` with no colon yet, inside an object.
fn ends_with_dangling_key(text: &str) -> bool {
    if !text.ends_with('"') {
        return false;
    }
    match string_literal_start(text) {
        Some(start) => expects_key(&text[..start]),
        None => false,
    }
}

fn strip_trailing_key(text: &mut String) {
    let trimmed_len = text.trim_end().len();
    text.truncate(trimmed_len);
    if let Some(start) = string_literal_start(text) {
        text.truncate(start);
        let trimmed_len = text.trim_end().len();
        text.truncate(trimmed_len);
        if text.ends_with(',') {
            text.pop();
        }
    }
}

/// Start offset of the string literal that ends at the end of `text`.
fn string_literal_start(text: &str) -> Option<usize> {
    if !text.ends_with('"') || text.len() < 2 {
        return None;
    }
    let body = &text[..text.len() - 1];
    let mut search_end = body.len();
    while let Some(pos) = body[..search_end].rfind('"') {
        if !is_escaped_backslash(body, pos) {
            return Some(pos);
        }
        search_end = pos;
    }
    None
}
