//! Error types for the replay engine

use thiserror::Error;

/// Result type alias for replay operations
pub type ReplayResult<T> = Result<T, ReplayError>;

/// Main error type for the replay engine
#[derive(Error, Debug, Clone)]
pub enum ReplayError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A simulated tool call could not be performed at all
    #[error("Tool error: {tool_name}: {message}")]
    Simulation { tool_name: String, message: String },

    /// Environment provisioning errors
    #[error("Provisioning error: {0}")]
    Provision(String),

    /// Record-mode failures (subject agent or transcript capture)
    #[error("Recording error: {0}")]
    Recording(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),

    /// Generic error with context
    #[error("Error: {0}")]
    Other(String),
}

impl ReplayError {
    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a new simulation error
    pub fn simulation(tool_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Simulation {
            tool_name: tool_name.into(),
            message: message.into(),
        }
    }

    /// Create a new provisioning error
    pub fn provision(message: impl Into<String>) -> Self {
        Self::Provision(message.into())
    }

    /// Create a new recording error
    pub fn recording(message: impl Into<String>) -> Self {
        Self::Recording(message.into())
    }

    /// Create a generic error
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

impl From<std::io::Error> for ReplayError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

impl From<serde_json::Error> for ReplayError {
    fn from(error: serde_json::Error) -> Self {
        Self::Json(error.to_string())
    }
}

impl From<serde_yaml::Error> for ReplayError {
    fn from(error: serde_yaml::Error) -> Self {
        Self::Config(error.to_string())
    }
}

/// Categories of case failures, used for control flow and for grouping the
/// final report. Each category maps to a distinct remediation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// A case selected for replay has no recorded transcript
    NoTranscript,
    /// A recorded tool call could not be replayed at all
    ExecutionError,
    /// Post-replay on-disk state differs from the recorded snapshot
    DirectoryMismatch,
    /// The case-specific verifier executable exited nonzero
    PostConditionFailed,
    /// The subject agent failed during record mode
    RecordingFailed,
    /// Any uncategorized failure during provisioning or execution
    Other,
}

impl ErrorCategory {
    /// Short human-readable label for report headings
    pub fn label(&self) -> &'static str {
        match self {
            Self::NoTranscript => "Missing transcripts",
            Self::ExecutionError => "Execution errors",
            Self::DirectoryMismatch => "Directory snapshot mismatches",
            Self::PostConditionFailed => "Post-condition failures",
            Self::RecordingFailed => "Recording failures",
            Self::Other => "Other failures",
        }
    }
}
