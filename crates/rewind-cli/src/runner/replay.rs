//! Replay execution: re-run a recorded session's tool calls in order
//!
//! The first tool call that cannot be executed aborts the case; output that
//! merely differs from the recording is collected as a warning and the case
//! continues, with the directory snapshot as the real arbiter.

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, instrument};

use rewind_core::env::CaseEnvironment;
use rewind_core::suite::TestCase;
use rewind_core::transcript::{self, ToolResult};
use rewind_core::{ReplayError, ReplayResult};
use rewind_tools::ToolSimulator;

/// Replay every tool call of the case's transcript, returning one warning
/// per output divergence.
///
/// Every entry is walked in document order so tool calls recorded before
/// the first user prompt are replayed too; prompts only mark turn
/// boundaries for the simulator.
#[instrument(skip_all, fields(case = %case.name))]
pub async fn replay_case(
    case: &TestCase,
    env: &CaseEnvironment,
    transcript_path: &Path,
) -> ReplayResult<Vec<String>> {
    let entries = transcript::parse_file(transcript_path)?;
    if entries.is_empty() {
        return Err(ReplayError::other(format!(
            "transcript {} contains no entries",
            transcript_path.display()
        )));
    }

    let workspace = env.workspace().to_path_buf();
    let mut simulator = ToolSimulator::new(workspace.clone(), env.env().clone())
        .with_read_scope(case.config.read_tracking);
    if let Some(timeout_ms) = case.config.shell_timeout_ms {
        simulator = simulator.with_shell_timeout(timeout_ms);
    }
    if let Some(project_dir) = transcript::project_directory(&entries) {
        simulator.add_path_mapping(project_dir, workspace.to_string_lossy().into_owned());
    }

    let mut results_by_id: HashMap<&str, &ToolResult> = HashMap::new();
    for entry in &entries {
        for result in entry.tool_results() {
            results_by_id.insert(result.tool_use_id.as_str(), result);
        }
    }

    let mut mismatches = Vec::new();
    for entry in &entries {
        if entry.is_user_prompt() {
            simulator.begin_turn();
            debug!(prompt = %truncate(&entry.text_content(), 80), "replaying turn");
            continue;
        }
        for tool_use in entry.tool_uses() {
            let expected = results_by_id
                .get(tool_use.id.as_str())
                .map(|r| r.content.as_str());
            let result = simulator.simulate(tool_use, expected).await?;
            if !result.matched {
                mismatches.push(format!(
                    "{} output diverged from recording\n  expected: {}\n  actual: {}",
                    tool_use.name,
                    truncate(expected.unwrap_or_default(), 200),
                    truncate(&result.comparable_output(), 200),
                ));
            }
        }
    }

    Ok(mismatches)
}

fn truncate(text: &str, limit: usize) -> String {
    let flat = text.replace('\n', "\\n");
    if flat.chars().count() <= limit {
        flat
    } else {
        let cut: String = flat.chars().take(limit).collect();
        format!("{cut}...")
    }
}
