//! Transcript parsing for recorded agent sessions
//!
//! Sessions are stored as newline-delimited JSON. Each line is one event:
//! a user or assistant message, a system notice, or bookkeeping markers
//! (progress heartbeats, file-history snapshots) that carry nothing useful
//! for replay and are dropped at parse time. Parsing is resilient: a
//! malformed line is skipped, never fatal.

use std::collections::HashMap;
use std::path::Path;

use serde_json::Value;

use crate::error::ReplayResult;

/// Entry kinds that carry no replay-relevant information
const SKIP_KINDS: &[&str] = &[
    "file-history-snapshot",
    "progress",
    "hook_progress",
    "bash_progress",
    "summary",
];

/// A tool invocation recorded in an assistant message
#[derive(Debug, Clone, PartialEq)]
pub struct ToolUse {
    /// Unique id within the transcript
    pub id: String,
    /// Tool name as recorded (e.g. "Bash", "Edit")
    pub name: String,
    /// Structured tool input
    pub input: serde_json::Map<String, Value>,
}

/// The captured outcome of a tool invocation
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    /// Foreign key into [`ToolUse::id`]
    pub tool_use_id: String,
    /// Captured output text
    pub content: String,
    /// Whether the agent runtime recorded this call as rejected
    pub is_error: bool,
}

/// A content block within a message entry
#[derive(Debug, Clone, PartialEq)]
pub enum ContentBlock {
    Text(String),
    Thinking(String),
    ToolUse(ToolUse),
    ToolResult(ToolResult),
    /// Recognized structure but irrelevant to replay
    Other,
}

/// The kind discriminator of a transcript entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    User,
    Assistant,
    System,
    Other(String),
}

impl EntryKind {
    fn from_type(entry_type: &str) -> Self {
        match entry_type {
            "user" => Self::User,
            "assistant" => Self::Assistant,
            "system" => Self::System,
            other => Self::Other(other.to_string()),
        }
    }
}

/// A single entry in a recorded transcript, immutable after parse
#[derive(Debug, Clone)]
pub struct TranscriptEntry {
    pub kind: EntryKind,
    pub uuid: String,
    pub parent_uuid: Option<String>,
    pub timestamp: String,
    /// Message role, when the entry wraps a message payload
    pub role: Option<String>,
    /// Working directory the session recorded for this event
    pub cwd: Option<String>,
    pub content: Vec<ContentBlock>,
}

impl TranscriptEntry {
    /// Concatenated text content from all text blocks
    pub fn text_content(&self) -> String {
        let texts: Vec<&str> = self
            .content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect();
        texts.join("\n")
    }

    /// All tool uses in this entry
    pub fn tool_uses(&self) -> impl Iterator<Item = &ToolUse> {
        self.content.iter().filter_map(|block| match block {
            ContentBlock::ToolUse(tool_use) => Some(tool_use),
            _ => None,
        })
    }

    /// All tool results in this entry
    pub fn tool_results(&self) -> impl Iterator<Item = &ToolResult> {
        self.content.iter().filter_map(|block| match block {
            ContentBlock::ToolResult(result) => Some(result),
            _ => None,
        })
    }

    fn has_tool_results(&self) -> bool {
        self.tool_results().next().is_some()
    }

    /// Whether this entry is a fresh user prompt, i.e. the start of a
    /// conversation turn. User entries that only carry tool results are
    /// feedback to the preceding assistant turn, not prompts.
    pub fn is_user_prompt(&self) -> bool {
        self.kind == EntryKind::User
            && self.role.as_deref() == Some("user")
            && !self.has_tool_results()
    }
}

/// Tool-result payloads are either a bare string or a list of text blocks.
fn result_content_text(content: &Value) -> String {
    match content {
        Value::String(text) => text.clone(),
        Value::Array(items) => {
            let texts: Vec<&str> = items
                .iter()
                .filter_map(|item| {
                    if item.get("type").and_then(Value::as_str) == Some("text") {
                        item.get("text").and_then(Value::as_str)
                    } else {
                        None
                    }
                })
                .collect();
            texts.join("\n")
        }
        _ => String::new(),
    }
}

fn parse_block(item: &Value) -> ContentBlock {
    let Some(block_type) = item.get("type").and_then(Value::as_str) else {
        return ContentBlock::Other;
    };

    match block_type {
        "text" => ContentBlock::Text(
            item.get("text")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        ),
        "thinking" => ContentBlock::Thinking(
            item.get("thinking")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        ),
        "tool_use" => ContentBlock::ToolUse(ToolUse {
            id: item
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            name: item
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            input: item
                .get("input")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
        }),
        "tool_result" => ContentBlock::ToolResult(ToolResult {
            tool_use_id: item
                .get("tool_use_id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            content: result_content_text(item.get("content").unwrap_or(&Value::Null)),
            is_error: item
                .get("is_error")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        }),
        _ => ContentBlock::Other,
    }
}

/// Normalize a message content payload into a block sequence.
///
/// A bare string payload becomes a single text block.
fn parse_content_blocks(content: &Value) -> Vec<ContentBlock> {
    match content {
        Value::String(text) => vec![ContentBlock::Text(text.clone())],
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(text) => ContentBlock::Text(text.clone()),
                _ => parse_block(item),
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn parse_entry(data: &Value) -> Option<TranscriptEntry> {
    let entry_type = data.get("type").and_then(Value::as_str)?;
    if SKIP_KINDS.contains(&entry_type) {
        return None;
    }

    let message = data.get("message");
    let content = message
        .and_then(|m| m.get("content"))
        .unwrap_or(&Value::Null);

    Some(TranscriptEntry {
        kind: EntryKind::from_type(entry_type),
        uuid: data
            .get("uuid")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        parent_uuid: data
            .get("parentUuid")
            .and_then(Value::as_str)
            .map(String::from),
        timestamp: data
            .get("timestamp")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        role: message
            .and_then(|m| m.get("role"))
            .and_then(Value::as_str)
            .map(String::from),
        cwd: data.get("cwd").and_then(Value::as_str).map(String::from),
        content: parse_content_blocks(content),
    })
}

/// Parse newline-delimited JSON into transcript entries.
///
/// Total over well-formed input: malformed lines and excluded entry kinds
/// are skipped without error.
pub fn parse_str(source: &str) -> Vec<TranscriptEntry> {
    let mut entries = Vec::new();
    for line in source.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Ok(data) = serde_json::from_str::<Value>(line) else {
            tracing::debug!("skipping malformed transcript line");
            continue;
        };
        if let Some(entry) = parse_entry(&data) {
            entries.push(entry);
        }
    }
    entries
}

/// Parse a transcript file
pub fn parse_file(path: &Path) -> ReplayResult<Vec<TranscriptEntry>> {
    let source = std::fs::read_to_string(path)?;
    Ok(parse_str(&source))
}

/// Extract tool use/result pairs in original document order.
///
/// Replay must preserve this order: later calls may depend on earlier side
/// effects. A use with no captured result pairs with `None`.
pub fn extract_tool_calls(entries: &[TranscriptEntry]) -> Vec<(ToolUse, Option<ToolResult>)> {
    let mut results_by_id: HashMap<&str, &ToolResult> = HashMap::new();
    for entry in entries {
        for result in entry.tool_results() {
            results_by_id.insert(result.tool_use_id.as_str(), result);
        }
    }

    let mut pairs = Vec::new();
    for entry in entries {
        for tool_use in entry.tool_uses() {
            let result = results_by_id.get(tool_use.id.as_str()).map(|r| (*r).clone());
            pairs.push((tool_use.clone(), result));
        }
    }
    pairs
}

/// Group entries into conversation turns of (user entry, assistant entries).
///
/// A user entry carrying only tool results belongs to the preceding
/// assistant turn; only a fresh non-tool-result user entry starts a turn.
pub fn conversation_turns(
    entries: &[TranscriptEntry],
) -> Vec<(&TranscriptEntry, Vec<&TranscriptEntry>)> {
    let mut turns = Vec::new();
    let mut current_user: Option<&TranscriptEntry> = None;
    let mut current_assistant: Vec<&TranscriptEntry> = Vec::new();

    for entry in entries {
        match entry.role.as_deref() {
            Some("user") if entry.kind == EntryKind::User => {
                if !entry.is_user_prompt() {
                    current_assistant.push(entry);
                    continue;
                }
                if let Some(user) = current_user.take() {
                    turns.push((user, std::mem::take(&mut current_assistant)));
                }
                current_user = Some(entry);
                current_assistant = Vec::new();
            }
            Some("assistant") => current_assistant.push(entry),
            _ => {}
        }
    }

    if let Some(user) = current_user {
        turns.push((user, current_assistant));
    }
    turns
}

/// The workspace path the session originally ran in, used to map recorded
/// paths onto the ephemeral replay workspace.
pub fn project_directory(entries: &[TranscriptEntry]) -> Option<&str> {
    entries
        .iter()
        .find_map(|entry| entry.cwd.as_deref().filter(|cwd| !cwd.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user_line(uuid: &str, content: Value) -> String {
        json!({
            "type": "user",
            "uuid": uuid,
            "timestamp": "2025-01-01T00:00:00Z",
            "cwd": "/tmp/original",
            "message": {"role": "user", "content": content}
        })
        .to_string()
    }

    fn assistant_line(uuid: &str, content: Value) -> String {
        json!({
            "type": "assistant",
            "uuid": uuid,
            "timestamp": "2025-01-01T00:00:01Z",
            "message": {"role": "assistant", "content": content}
        })
        .to_string()
    }

    #[test]
    fn bare_string_content_becomes_text_block() {
        let entries = parse_str(&user_line("u1", json!("hello")));
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].text_content(), "hello");
        assert_eq!(entries[0].role.as_deref(), Some("user"));
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let source = format!("not json\n{}\n{{\"broken\n", user_line("u1", json!("ok")));
        let entries = parse_str(&source);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].uuid, "u1");
    }

    #[test]
    fn progress_and_snapshot_entries_are_dropped() {
        let source = [
            json!({"type": "progress", "uuid": "p1"}).to_string(),
            json!({"type": "file-history-snapshot", "uuid": "f1"}).to_string(),
            json!({"type": "hook_progress", "uuid": "h1"}).to_string(),
            user_line("u1", json!("hi")),
        ]
        .join("\n");
        let entries = parse_str(&source);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, EntryKind::User);
    }

    #[test]
    fn tool_calls_pair_with_results_in_document_order() {
        let source = [
            assistant_line(
                "a1",
                json!([
                    {"type": "tool_use", "id": "t1", "name": "Bash",
                     "input": {"command": "echo one"}},
                    {"type": "tool_use", "id": "t2", "name": "Bash",
                     "input": {"command": "echo two"}}
                ]),
            ),
            user_line(
                "u2",
                json!([{"type": "tool_result", "tool_use_id": "t1", "content": "one"}]),
            ),
        ]
        .join("\n");

        let entries = parse_str(&source);
        let calls = extract_tool_calls(&entries);
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].0.id, "t1");
        assert_eq!(calls[0].1.as_ref().map(|r| r.content.as_str()), Some("one"));
        assert_eq!(calls[1].0.id, "t2");
        assert!(calls[1].1.is_none());
    }

    #[test]
    fn list_shaped_tool_result_content_is_flattened() {
        let source = user_line(
            "u1",
            json!([{
                "type": "tool_result",
                "tool_use_id": "t1",
                "content": [
                    {"type": "text", "text": "first"},
                    {"type": "text", "text": "second"}
                ]
            }]),
        );
        let entries = parse_str(&source);
        let results: Vec<_> = entries[0].tool_results().collect();
        assert_eq!(results[0].content, "first\nsecond");
    }

    #[test]
    fn tool_result_user_entries_stay_in_previous_turn() {
        let source = [
            user_line("u1", json!("do something")),
            assistant_line(
                "a1",
                json!([{"type": "tool_use", "id": "t1", "name": "Bash", "input": {}}]),
            ),
            user_line(
                "u2",
                json!([{"type": "tool_result", "tool_use_id": "t1", "content": "done"}]),
            ),
            assistant_line("a2", json!([{"type": "text", "text": "finished"}])),
            user_line("u3", json!("next task")),
        ]
        .join("\n");

        let entries = parse_str(&source);
        let turns = conversation_turns(&entries);
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].0.uuid, "u1");
        assert_eq!(turns[0].1.len(), 3);
        assert_eq!(turns[1].0.uuid, "u3");
        assert!(turns[1].1.is_empty());
    }

    #[test]
    fn project_directory_is_first_recorded_cwd() {
        let entries = parse_str(&user_line("u1", json!("hello")));
        assert_eq!(project_directory(&entries), Some("/tmp/original"));
    }
}
