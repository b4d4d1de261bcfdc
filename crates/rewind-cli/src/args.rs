//! CLI argument definitions using clap
//!
//! - rewind                          # Replay every discovered case
//! - rewind basic-edit git-commit    # Replay selected cases
//! - rewind --mode record new-case   # Record a case by driving the agent
//! - rewind --save-snapshot case     # Refresh a case's directory snapshot

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Default directory containing test cases
pub const DEFAULT_TESTS_DIR: &str = "tests";

/// Default agent command driven in record mode
pub const DEFAULT_SUBJECT: &str = "claude";

#[derive(Parser)]
#[command(name = "rewind")]
#[command(about = "Replay recorded coding-agent sessions and catch behavioral drift")]
#[command(version)]
pub struct Cli {
    /// Case names to run (all discovered cases when omitted)
    pub cases: Vec<String>,

    /// Replay recorded transcripts, or record new ones by driving the agent
    #[arg(long, value_enum, default_value = "replay")]
    pub mode: Mode,

    /// Directory containing the test cases
    #[arg(long, default_value = DEFAULT_TESTS_DIR)]
    pub tests_dir: PathBuf,

    /// Capture and save the workspace snapshot instead of verifying it
    #[arg(long)]
    pub save_snapshot: bool,

    /// Agent command to drive in record mode, resolved via PATH
    #[arg(long, default_value = DEFAULT_SUBJECT)]
    pub subject: String,

    /// Show per-case detail, including post-condition output
    #[arg(long, short)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Re-execute recorded tool calls against a fresh workspace
    Replay,
    /// Drive the agent with the case's prompt and capture its transcript
    Record,
}
