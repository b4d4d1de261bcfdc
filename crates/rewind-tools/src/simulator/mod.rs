//! Stateful tool simulator for one replay session
//!
//! The simulator owns all per-session matching state: the placeholder
//! registry, one commit tracker per output stream, the set of files read so
//! far, and the recorded-to-live path mappings. It is created per case and
//! never shared between cases.
//!
//! Two failure shapes are distinguished. A structured error is the agent
//! runtime rejecting a call (editing an unread file, ambiguous edit target);
//! it is part of normal session flow, is wrapped in a marker for comparison,
//! and replay continues. An execution error means the simulation itself
//! could not proceed and the case aborts.

mod file_ops;
mod search;
mod shell;

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};

use rewind_core::matcher::{CommitTracker, Direction, PlaceholderRegistry};
use rewind_core::normalize;
use rewind_core::suite::ReadTrackingScope;
use rewind_core::tools::ToolKind;
use rewind_core::transcript::ToolUse;
use rewind_core::{ReplayError, ReplayResult};

/// Marker wrapping structured tool rejections in recorded and live output
pub const TOOL_USE_ERROR_MARKER: &str = "<tool_use_error>";

/// Default shell-command timeout, matching the agent runtime's default
pub const DEFAULT_SHELL_TIMEOUT_MS: u64 = 120_000;

/// Outcome of simulating a single tool call
#[derive(Debug, Clone)]
pub struct SimulationResult {
    /// Raw tool output, or the rejection message for structured errors
    pub output: String,
    /// Whether the call was rejected by tool semantics
    pub is_error: bool,
    /// Whether the output matched the recording after normalization and
    /// fuzzy matching. Always true when there was nothing to compare.
    pub matched: bool,
}

impl SimulationResult {
    fn executed(output: String, is_error: bool) -> Self {
        Self {
            output,
            is_error,
            matched: true,
        }
    }

    /// The output as it participates in comparison, with structured errors
    /// wrapped in the marker the recording uses.
    pub fn comparable_output(&self) -> String {
        if self.is_error {
            format!("{TOOL_USE_ERROR_MARKER}{}", self.output)
        } else {
            self.output.clone()
        }
    }
}

/// Simulates tool calls for one session
#[derive(Debug)]
pub struct ToolSimulator {
    cwd: PathBuf,
    env: BTreeMap<String, String>,
    registry: PlaceholderRegistry,
    expected_commits: CommitTracker,
    actual_commits: CommitTracker,
    path_mappings: Vec<(String, String)>,
    files_read: HashSet<PathBuf>,
    read_scope: ReadTrackingScope,
    shell_timeout_ms: u64,
}

impl ToolSimulator {
    /// A simulator rooted at `cwd`, spawning subprocesses with exactly `env`
    pub fn new(cwd: PathBuf, env: BTreeMap<String, String>) -> Self {
        Self {
            cwd,
            env,
            registry: PlaceholderRegistry::new(),
            expected_commits: CommitTracker::new(),
            actual_commits: CommitTracker::new(),
            path_mappings: Vec::new(),
            files_read: HashSet::new(),
            read_scope: ReadTrackingScope::default(),
            shell_timeout_ms: DEFAULT_SHELL_TIMEOUT_MS,
        }
    }

    pub fn with_read_scope(mut self, scope: ReadTrackingScope) -> Self {
        self.read_scope = scope;
        self
    }

    pub fn with_shell_timeout(mut self, timeout_ms: u64) -> Self {
        self.shell_timeout_ms = timeout_ms;
        self
    }

    /// Map a recorded path prefix to its live equivalent. Applied to every
    /// string argument before execution, most importantly the recorded
    /// project directory onto the live workspace.
    pub fn add_path_mapping(&mut self, recorded: impl Into<String>, live: impl Into<String>) {
        self.path_mappings.push((recorded.into(), live.into()));
    }

    /// Access to the session's placeholder bindings
    pub fn registry(&self) -> &PlaceholderRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut PlaceholderRegistry {
        &mut self.registry
    }

    /// Mark a conversation-turn boundary. Under turn-scoped tracking the
    /// set of read files is forgotten here.
    pub fn begin_turn(&mut self) {
        if self.read_scope == ReadTrackingScope::Turn {
            self.files_read.clear();
        }
    }

    /// Simulate one recorded tool call.
    ///
    /// When the recorded output itself is a structured error the call is
    /// not executed: the recording asserts the rejection happened, and
    /// re-running the arguments that provoked it is not meaningful.
    /// Passthrough tools (sub-agent dispatch, todo bookkeeping) succeed
    /// without side effects.
    #[instrument(skip(self, tool_use, expected), fields(tool = %tool_use.name))]
    pub async fn simulate(
        &mut self,
        tool_use: &ToolUse,
        expected: Option<&str>,
    ) -> ReplayResult<SimulationResult> {
        let Some(kind) = ToolKind::parse(&tool_use.name) else {
            return Err(ReplayError::simulation(
                &tool_use.name,
                "unsupported tool in transcript",
            ));
        };

        if let Some(expected) = expected {
            if expected.contains(TOOL_USE_ERROR_MARKER) {
                debug!("recorded rejection, skipping execution");
                return Ok(SimulationResult {
                    output: expected.to_string(),
                    is_error: true,
                    matched: true,
                });
            }
        }

        if kind.is_passthrough() {
            return Ok(SimulationResult {
                output: expected.unwrap_or_default().to_string(),
                is_error: false,
                matched: true,
            });
        }

        let input = self.substitute_input(&tool_use.input);
        let mut result = match kind {
            ToolKind::Bash => self.simulate_bash(&input).await?,
            ToolKind::Write => self.simulate_write(&input)?,
            ToolKind::Read => self.simulate_read(&input)?,
            ToolKind::Edit => self.simulate_edit(&input)?,
            ToolKind::Glob => self.simulate_glob(&input)?,
            ToolKind::Grep => self.simulate_grep(&input).await?,
            ToolKind::Task | ToolKind::TodoWrite => unreachable!("handled above"),
        };

        if let Some(expected) = expected {
            result.matched = self.output_matches(kind, expected, &result.comparable_output());
            if !result.matched {
                warn!(tool = %kind, "output diverged from recording");
            }
        }
        Ok(result)
    }

    /// Fuzzy-compare live output against the recording.
    ///
    /// Both sides are normalized and recorded paths in the expected text
    /// are mapped onto their live equivalents. If placeholder matching
    /// fails on that text, commit hashes in each stream are rewritten by
    /// that stream's own tracker and collapsed to a canonical marker, then
    /// matched again. Each stream keeps its own tracker because recording
    /// and replay produce unrelated hashes.
    pub fn output_matches(&mut self, tool: ToolKind, expected: &str, actual: &str) -> bool {
        let mut expected = normalize::normalize(expected, Some(tool));
        for (recorded, live) in &self.path_mappings {
            expected = expected.replace(recorded, live);
        }
        let actual = normalize::normalize(actual, Some(tool));
        if self.registry.matches(&expected, &actual) {
            return true;
        }

        let expected = CommitTracker::canonicalize(&self.expected_commits.rewrite(&expected));
        let actual = CommitTracker::canonicalize(&self.actual_commits.rewrite(&actual));
        self.registry.matches(&expected, &actual)
    }

    /// Rewrite recorded arguments for the live environment: expand bound
    /// placeholders, then apply path mappings. Applied recursively to every
    /// string in the argument object.
    pub fn substitute_input(&self, input: &Map<String, Value>) -> Map<String, Value> {
        input
            .iter()
            .map(|(key, value)| (key.clone(), self.substitute_value(value)))
            .collect()
    }

    fn substitute_value(&self, value: &Value) -> Value {
        match value {
            Value::String(text) => Value::String(self.substitute_text(text)),
            Value::Array(items) => {
                Value::Array(items.iter().map(|v| self.substitute_value(v)).collect())
            }
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.substitute_value(v)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    fn substitute_text(&self, text: &str) -> String {
        let mut result = self.registry.substitute(text, Direction::Expect);
        for (recorded, live) in &self.path_mappings {
            result = result.replace(recorded, live);
        }
        result
    }

    /// Resolve a (possibly relative) tool path argument against the cwd
    fn resolve_path(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.cwd.join(path)
        }
    }

    fn cwd(&self) -> &Path {
        &self.cwd
    }

    fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }
}

/// A required string argument, or an execution error naming it
fn str_arg<'a>(
    input: &'a Map<String, Value>,
    tool: ToolKind,
    name: &str,
) -> ReplayResult<&'a str> {
    input
        .get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| ReplayError::simulation(tool.name(), format!("missing argument: {name}")))
}

/// An optional string argument
fn opt_str_arg<'a>(input: &'a Map<String, Value>, name: &str) -> Option<&'a str> {
    input.get(name).and_then(Value::as_str)
}

/// An optional non-negative integer argument
fn opt_u64_arg(input: &Map<String, Value>, name: &str) -> Option<u64> {
    input.get(name).and_then(Value::as_u64)
}

/// An optional boolean argument, defaulting to false
fn bool_arg(input: &Map<String, Value>, name: &str) -> bool {
    input.get(name).and_then(Value::as_bool).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn simulator(cwd: &Path) -> ToolSimulator {
        ToolSimulator::new(cwd.to_path_buf(), std::env::vars().collect())
    }

    fn tool_use(name: &str, input: Value) -> ToolUse {
        ToolUse {
            id: "toolu_test".to_string(),
            name: name.to_string(),
            input: input.as_object().cloned().unwrap_or_default(),
        }
    }

    #[tokio::test]
    async fn recorded_rejection_short_circuits() {
        let dir = TempDir::new().unwrap();
        let mut sim = simulator(dir.path());
        let call = tool_use("Edit", json!({"file_path": "missing.txt"}));

        let expected = format!("{TOOL_USE_ERROR_MARKER}File has not been read yet.");
        let result = sim.simulate(&call, Some(&expected)).await.unwrap();
        assert!(result.is_error);
        assert!(result.matched);
        assert!(!dir.path().join("missing.txt").exists());
    }

    #[tokio::test]
    async fn passthrough_tools_always_succeed() {
        let dir = TempDir::new().unwrap();
        let mut sim = simulator(dir.path());
        let call = tool_use("TodoWrite", json!({"todos": []}));

        let result = sim.simulate(&call, Some("Todos updated")).await.unwrap();
        assert!(!result.is_error);
        assert!(result.matched);
    }

    #[tokio::test]
    async fn unsupported_tool_is_an_execution_error() {
        let dir = TempDir::new().unwrap();
        let mut sim = simulator(dir.path());
        let call = tool_use("WebFetch", json!({"url": "https://example.com"}));

        assert!(sim.simulate(&call, None).await.is_err());
    }

    #[test]
    fn path_mappings_rewrite_arguments() {
        let dir = TempDir::new().unwrap();
        let mut sim = simulator(dir.path());
        sim.add_path_mapping("/recorded/project", "/live/workspace");

        let input = json!({
            "file_path": "/recorded/project/src/main.rs",
            "nested": {"cmd": "cat /recorded/project/README.md"},
        });
        let substituted = sim.substitute_input(input.as_object().unwrap());
        assert_eq!(
            substituted["file_path"],
            json!("/live/workspace/src/main.rs")
        );
        assert_eq!(
            substituted["nested"]["cmd"],
            json!("cat /live/workspace/README.md")
        );
    }

    #[test]
    fn output_matching_binds_placeholders() {
        let dir = TempDir::new().unwrap();
        let mut sim = simulator(dir.path());
        assert!(sim.output_matches(ToolKind::Bash, "issue <<n>> closed", "issue 42 closed"));
        assert!(!sim.output_matches(ToolKind::Bash, "issue <<n>> open", "issue 7 open"));
    }

    #[test]
    fn expected_output_is_mapped_onto_live_paths() {
        let dir = TempDir::new().unwrap();
        let mut sim = simulator(dir.path());
        sim.add_path_mapping("/recorded/project", "/live/workspace");
        assert!(sim.output_matches(
            ToolKind::Glob,
            "/recorded/project/src/a.rs",
            "/live/workspace/src/a.rs"
        ));
    }

    #[test]
    fn output_matching_canonicalizes_commit_hashes() {
        let dir = TempDir::new().unwrap();
        let mut sim = simulator(dir.path());
        assert!(sim.output_matches(
            ToolKind::Bash,
            "007c8c1 Initial commit",
            "f9e3260 Initial commit"
        ));
    }

    #[tokio::test]
    async fn turn_scope_forgets_reads() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "content").unwrap();
        let mut sim = simulator(dir.path()).with_read_scope(ReadTrackingScope::Turn);

        let read = tool_use("Read", json!({"file_path": "a.txt"}));
        sim.simulate(&read, None).await.unwrap();

        sim.begin_turn();
        let edit = tool_use(
            "Edit",
            json!({"file_path": "a.txt", "old_string": "content", "new_string": "changed"}),
        );
        let result = sim.simulate(&edit, None).await.unwrap();
        assert!(result.is_error);
    }
}
