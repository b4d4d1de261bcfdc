//! Rewind Core Library
//!
//! This crate provides the replay engine for recorded coding-agent sessions:
//! transcript parsing, stateful fuzzy matching (placeholders and commit
//! ordinals), output normalization, directory snapshots, test-suite
//! discovery, and isolated per-case environments.

pub mod env;
pub mod error;
pub mod matcher;
pub mod normalize;
pub mod snapshot;
pub mod suite;
pub mod tools;
pub mod transcript;

// Re-export commonly used types
pub use env::CaseEnvironment;
pub use error::{ErrorCategory, ReplayError, ReplayResult};
pub use matcher::{CommitTracker, PlaceholderRegistry};
pub use snapshot::DirectorySnapshot;
pub use suite::{CaseConfig, ReadTrackingScope, TestCase, TestResult};
pub use tools::ToolKind;
pub use transcript::{ContentBlock, ToolResult, ToolUse, TranscriptEntry};
