//! End-to-end replay scenarios over synthetic transcripts
//!
//! Each scenario builds a transcript the way the agent records one, replays
//! it through the simulator against a fresh workspace, and checks the
//! outputs and the resulting on-disk state.

use serde_json::{json, Value};
use tempfile::TempDir;

use rewind_core::{snapshot, transcript};
use rewind_tools::{ToolSimulator, TOOL_USE_ERROR_MARKER};

/// Recorded project directory used in every synthetic transcript
const RECORDED_CWD: &str = "/recorded/workspace";

fn assistant_tool_use(uuid: &str, id: &str, name: &str, input: Value) -> String {
    json!({
        "type": "assistant",
        "uuid": uuid,
        "timestamp": "2025-06-01T10:00:00Z",
        "cwd": RECORDED_CWD,
        "message": {
            "role": "assistant",
            "content": [{"type": "tool_use", "id": id, "name": name, "input": input}]
        }
    })
    .to_string()
}

fn user_tool_result(uuid: &str, tool_use_id: &str, content: &str) -> String {
    json!({
        "type": "user",
        "uuid": uuid,
        "timestamp": "2025-06-01T10:00:01Z",
        "cwd": RECORDED_CWD,
        "message": {
            "role": "user",
            "content": [{
                "type": "tool_result",
                "tool_use_id": tool_use_id,
                "content": content
            }]
        }
    })
    .to_string()
}

fn user_prompt(uuid: &str, text: &str) -> String {
    json!({
        "type": "user",
        "uuid": uuid,
        "timestamp": "2025-06-01T09:59:59Z",
        "cwd": RECORDED_CWD,
        "message": {"role": "user", "content": text}
    })
    .to_string()
}

/// Replay every tool call of a transcript, panicking on execution errors.
/// Returns whether each call's output matched its recording.
async fn replay_all(source: &str, workspace: &std::path::Path) -> Vec<bool> {
    let entries = transcript::parse_str(source);
    let mut simulator =
        ToolSimulator::new(workspace.to_path_buf(), std::env::vars().collect());
    if let Some(project_dir) = transcript::project_directory(&entries) {
        simulator.add_path_mapping(project_dir, workspace.to_string_lossy().into_owned());
    }

    let mut matches = Vec::new();
    for (tool_use, recorded) in transcript::extract_tool_calls(&entries) {
        let expected = recorded.as_ref().map(|r| r.content.as_str());
        let result = simulator.simulate(&tool_use, expected).await.unwrap();
        matches.push(result.matched);
    }
    matches
}

#[tokio::test]
async fn shell_command_replays_verbatim() {
    let workspace = TempDir::new().unwrap();
    let source = [
        user_prompt("u0", "print hello"),
        assistant_tool_use("a1", "toolu_1", "Bash", json!({"command": "echo hello"})),
        user_tool_result("u1", "toolu_1", "hello"),
    ]
    .join("\n");

    let matches = replay_all(&source, workspace.path()).await;
    assert_eq!(matches, vec![true]);
}

#[tokio::test]
async fn write_then_read_reproduces_recorded_workspace() {
    let workspace = TempDir::new().unwrap();
    let source = [
        user_prompt("u0", "create notes.txt"),
        assistant_tool_use(
            "a1",
            "toolu_1",
            "Write",
            json!({
                "file_path": format!("{RECORDED_CWD}/notes.txt"),
                "content": "hello\nworld\n"
            }),
        ),
        user_tool_result(
            "u1",
            "toolu_1",
            &format!("File created successfully at: {RECORDED_CWD}/notes.txt"),
        ),
        assistant_tool_use(
            "a2",
            "toolu_2",
            "Read",
            json!({"file_path": format!("{RECORDED_CWD}/notes.txt")}),
        ),
        user_tool_result(
            "u2",
            "toolu_2",
            "     1\u{2192}hello\n     2\u{2192}world\n     3\u{2192}",
        ),
    ]
    .join("\n");

    let matches = replay_all(&source, workspace.path()).await;
    assert_eq!(matches, vec![true, true]);

    // The replayed workspace must hash identically to one holding the
    // recorded end state
    let expected_dir = TempDir::new().unwrap();
    std::fs::write(expected_dir.path().join("notes.txt"), "hello\nworld\n").unwrap();
    let expected = snapshot::capture(expected_dir.path());
    let actual = snapshot::capture(workspace.path());
    assert!(snapshot::compare(&expected, &actual, workspace.path()).is_empty());
}

#[tokio::test]
async fn commit_hashes_match_structurally_across_runs() {
    let workspace = TempDir::new().unwrap();
    // The live run prints a different hash than the recording captured
    let source = [
        user_prompt("u0", "show the log"),
        assistant_tool_use(
            "a1",
            "toolu_1",
            "Bash",
            json!({"command": "echo '1234567 Initial commit'"}),
        ),
        user_tool_result("u1", "toolu_1", "aaaaaaa Initial commit"),
    ]
    .join("\n");

    let matches = replay_all(&source, workspace.path()).await;
    assert_eq!(matches, vec![true]);
}

#[tokio::test]
async fn recorded_rejection_skips_execution() {
    let workspace = TempDir::new().unwrap();
    let source = [
        user_prompt("u0", "edit something unread"),
        assistant_tool_use(
            "a1",
            "toolu_1",
            "Edit",
            json!({
                "file_path": format!("{RECORDED_CWD}/untouched.txt"),
                "old_string": "a",
                "new_string": "b"
            }),
        ),
        user_tool_result(
            "u1",
            "toolu_1",
            &format!("{TOOL_USE_ERROR_MARKER}File has not been read yet."),
        ),
    ]
    .join("\n");

    let matches = replay_all(&source, workspace.path()).await;
    assert_eq!(matches, vec![true]);
    assert!(!workspace.path().join("untouched.txt").exists());
}

#[tokio::test]
async fn placeholder_bindings_hold_across_calls() {
    let workspace = TempDir::new().unwrap();
    let source = [
        user_prompt("u0", "use a generated id twice"),
        assistant_tool_use("a1", "toolu_1", "Bash", json!({"command": "echo 'id is 42'"})),
        user_tool_result("u1", "toolu_1", "id is <<n>>"),
        assistant_tool_use("a2", "toolu_2", "Bash", json!({"command": "echo 'still 42'"})),
        user_tool_result("u2", "toolu_2", "still <<n>>"),
        assistant_tool_use("a3", "toolu_3", "Bash", json!({"command": "echo 'now 43'"})),
        user_tool_result("u3", "toolu_3", "now <<n>>"),
    ]
    .join("\n");

    // Third call reuses <<n>> with a different live value and must diverge
    let matches = replay_all(&source, workspace.path()).await;
    assert_eq!(matches, vec![true, true, false]);
}
