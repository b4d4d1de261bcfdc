//! The fixed tool vocabulary recorded in agent transcripts
//!
//! Tool dispatch is a closed enum rather than a string-keyed handler map so
//! that an unrecognized tool name is an explicit error instead of a silent
//! no-op.

use std::fmt;

/// A tool kind the simulator knows how to replay.
///
/// `Task` and `TodoWrite` are orchestration-only calls with no filesystem
/// effect; their recorded presence is informational and they always succeed
/// without execution or comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    /// Shell command execution
    Bash,
    /// File creation/overwrite
    Write,
    /// File read with line numbers
    Read,
    /// String-replacement file edit
    Edit,
    /// File pattern search
    Glob,
    /// Content search
    Grep,
    /// Sub-agent invocation (passthrough)
    Task,
    /// Agent todo-list bookkeeping (passthrough)
    TodoWrite,
}

impl ToolKind {
    /// Parse a recorded tool name. Returns `None` for names outside the
    /// vocabulary; callers surface those as unsupported-tool errors.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "Bash" => Some(Self::Bash),
            "Write" => Some(Self::Write),
            "Read" => Some(Self::Read),
            "Edit" => Some(Self::Edit),
            "Glob" => Some(Self::Glob),
            "Grep" => Some(Self::Grep),
            "Task" => Some(Self::Task),
            "TodoWrite" => Some(Self::TodoWrite),
            _ => None,
        }
    }

    /// The name as it appears in transcripts
    pub fn name(&self) -> &'static str {
        match self {
            Self::Bash => "Bash",
            Self::Write => "Write",
            Self::Read => "Read",
            Self::Edit => "Edit",
            Self::Glob => "Glob",
            Self::Grep => "Grep",
            Self::Task => "Task",
            Self::TodoWrite => "TodoWrite",
        }
    }

    /// Whether this kind is replayed without execution or comparison
    pub fn is_passthrough(&self) -> bool {
        matches!(self, Self::Task | Self::TodoWrite)
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_names() {
        assert_eq!(ToolKind::parse("Bash"), Some(ToolKind::Bash));
        assert_eq!(ToolKind::parse("Edit"), Some(ToolKind::Edit));
        assert_eq!(ToolKind::parse("TodoWrite"), Some(ToolKind::TodoWrite));
    }

    #[test]
    fn unknown_name_is_none() {
        assert_eq!(ToolKind::parse("NotebookEdit"), None);
        assert_eq!(ToolKind::parse(""), None);
    }

    #[test]
    fn passthrough_kinds() {
        assert!(ToolKind::Task.is_passthrough());
        assert!(ToolKind::TodoWrite.is_passthrough());
        assert!(!ToolKind::Bash.is_passthrough());
    }
}
