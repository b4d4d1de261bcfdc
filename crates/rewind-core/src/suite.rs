//! Test-suite discovery and per-case results
//!
//! Each test case is a directory under the suite root:
//!
//! ```text
//! tests/basic-stop-hook/
//!     setup.py                  # required; creates the case environment
//!     transcript.jsonl          # recorded session (optional until recorded)
//!     directory-snapshot.json   # recorded workspace state (optional)
//!     post-condition.py         # optional assertions after replay/record
//!     story.md                  # narrative with the record-mode prompt
//!     config.yaml               # optional case options
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{ErrorCategory, ReplayError, ReplayResult};

/// Recorded transcript file name within a case directory
pub const TRANSCRIPT_FILE: &str = "transcript.jsonl";
/// Recorded workspace snapshot file name
pub const SNAPSHOT_FILE: &str = "directory-snapshot.json";
/// Narrative fixture holding the record-mode prompt
pub const STORY_FILE: &str = "story.md";

/// When tracked file reads are forgotten during replay.
///
/// The upstream read-enforcement contract is not fully pinned down, so the
/// scope is configurable per case instead of hard-coded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadTrackingScope {
    /// Reads stay tracked for the whole session
    #[default]
    Session,
    /// Reads are forgotten at each conversation-turn boundary
    Turn,
}

/// Optional per-case configuration from `config.yaml`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CaseConfig {
    /// Read-tracking reset scope for the simulator
    pub read_tracking: ReadTrackingScope,
    /// Override for the default shell-tool timeout
    pub shell_timeout_ms: Option<u64>,
}

/// One discovered test case, immutable after discovery
#[derive(Debug, Clone)]
pub struct TestCase {
    pub name: String,
    pub dir: PathBuf,
    pub setup_script: PathBuf,
    pub transcript_path: Option<PathBuf>,
    pub post_condition: Option<PathBuf>,
    pub config: CaseConfig,
}

impl TestCase {
    /// Path where this case's recorded snapshot lives (whether or not one
    /// has been recorded yet)
    pub fn snapshot_path(&self) -> PathBuf {
        self.dir.join(SNAPSHOT_FILE)
    }

    /// Path to the narrative fixture
    pub fn story_path(&self) -> PathBuf {
        self.dir.join(STORY_FILE)
    }
}

/// Result from running a single case
#[derive(Debug, Clone)]
pub struct TestResult {
    pub name: String,
    pub passed: bool,
    pub error: Option<String>,
    pub error_category: Option<ErrorCategory>,
    pub post_condition_output: String,
}

impl TestResult {
    /// A passing result
    pub fn pass(name: impl Into<String>, post_condition_output: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            error: None,
            error_category: None,
            post_condition_output: post_condition_output.into(),
        }
    }

    /// A failing result with its category
    pub fn fail(
        name: impl Into<String>,
        category: ErrorCategory,
        error: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            passed: false,
            error: Some(error.into()),
            error_category: Some(category),
            post_condition_output: String::new(),
        }
    }
}

fn load_config(case_dir: &Path) -> ReplayResult<CaseConfig> {
    let config_path = case_dir.join("config.yaml");
    if !config_path.exists() {
        return Ok(CaseConfig::default());
    }
    let content = std::fs::read_to_string(&config_path)?;
    serde_yaml::from_str(&content)
        .map_err(|e| ReplayError::config(format!("{}: {e}", config_path.display())))
}

/// Discover test cases under `tests_dir`, sorted by name.
///
/// A valid case requires a setup executable (`setup.py`, falling back to
/// `setup.sh`); directories without one are skipped. Transcript and
/// post-condition files are optional. When `selected` is non-empty, only
/// those case names are returned.
pub fn discover(tests_dir: &Path, selected: &[String]) -> ReplayResult<Vec<TestCase>> {
    let mut cases = Vec::new();

    let mut entries: Vec<PathBuf> = std::fs::read_dir(tests_dir)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    entries.sort();

    for case_dir in entries {
        let Some(name) = case_dir.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        if !selected.is_empty() && !selected.iter().any(|s| s == &name) {
            continue;
        }

        let setup_script = {
            let python = case_dir.join("setup.py");
            let shell = case_dir.join("setup.sh");
            if python.exists() {
                python
            } else if shell.exists() {
                shell
            } else {
                continue;
            }
        };

        let transcript_path = Some(case_dir.join(TRANSCRIPT_FILE)).filter(|p| p.exists());
        let post_condition = Some(case_dir.join("post-condition.py")).filter(|p| p.exists());
        let config = load_config(&case_dir)?;

        cases.push(TestCase {
            name,
            dir: case_dir,
            setup_script,
            transcript_path,
            post_condition,
            config,
        });
    }

    Ok(cases)
}
