//! Write, Read, and Edit simulation
//!
//! Enforces the agent runtime's file-access contract: a file must be read
//! before it can be overwritten or edited, and an edit target must be
//! unambiguous. Violations are structured errors so replay continues; a
//! file or edit-target string that should exist but does not means the live
//! workspace has already drifted from the recording, which is fatal.

use rewind_core::tools::ToolKind;
use rewind_core::{ReplayError, ReplayResult};
use serde_json::{Map, Value};
use tracing::debug;

use super::{bool_arg, opt_u64_arg, str_arg, SimulationResult, ToolSimulator};

/// Default number of lines returned by a read without an explicit limit
const DEFAULT_READ_LIMIT: u64 = 2000;

impl ToolSimulator {
    pub(super) fn simulate_write(
        &mut self,
        input: &Map<String, Value>,
    ) -> ReplayResult<SimulationResult> {
        let file_path = str_arg(input, ToolKind::Write, "file_path")?;
        let content = str_arg(input, ToolKind::Write, "content")?;
        let path = self.resolve_path(file_path);

        let existed = path.exists();
        if existed && !self.files_read.contains(&path) {
            return Ok(SimulationResult::executed(
                format!(
                    "File has not been read yet. Read it first before writing to it: {}",
                    path.display()
                ),
                true,
            ));
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, content)?;
        self.files_read.insert(path.clone());
        debug!(path = %path.display(), "wrote file");

        let output = if existed {
            format!("File updated successfully at: {}", path.display())
        } else {
            format!("File created successfully at: {}", path.display())
        };
        Ok(SimulationResult::executed(output, false))
    }

    pub(super) fn simulate_read(
        &mut self,
        input: &Map<String, Value>,
    ) -> ReplayResult<SimulationResult> {
        let file_path = str_arg(input, ToolKind::Read, "file_path")?;
        let path = self.resolve_path(file_path);

        if !path.is_file() {
            return Err(ReplayError::simulation(
                ToolKind::Read.name(),
                format!("file does not exist: {}", path.display()),
            ));
        }
        let content = std::fs::read_to_string(&path)?;
        self.files_read.insert(path);

        let offset = opt_u64_arg(input, "offset").unwrap_or(0) as usize;
        let limit = opt_u64_arg(input, "limit").unwrap_or(DEFAULT_READ_LIMIT) as usize;

        // split keeps a trailing empty line when the file ends in a newline,
        // matching the recorded tool output
        let numbered: Vec<String> = content
            .split('\n')
            .enumerate()
            .skip(offset)
            .take(limit)
            .map(|(index, line)| format!("{:>6}\u{2192}{line}", index + 1))
            .collect();
        Ok(SimulationResult::executed(numbered.join("\n"), false))
    }

    pub(super) fn simulate_edit(
        &mut self,
        input: &Map<String, Value>,
    ) -> ReplayResult<SimulationResult> {
        let file_path = str_arg(input, ToolKind::Edit, "file_path")?;
        let old_string = str_arg(input, ToolKind::Edit, "old_string")?;
        let new_string = str_arg(input, ToolKind::Edit, "new_string")?;
        let replace_all = bool_arg(input, "replace_all");
        let path = self.resolve_path(file_path);

        if old_string == new_string {
            return Ok(SimulationResult::executed(
                "old_string and new_string must be different.".to_string(),
                true,
            ));
        }
        if !path.is_file() {
            return Err(ReplayError::simulation(
                ToolKind::Edit.name(),
                format!("file does not exist: {}", path.display()),
            ));
        }
        if !self.files_read.contains(&path) {
            return Ok(SimulationResult::executed(
                format!(
                    "File has not been read yet. Read it first before editing it: {}",
                    path.display()
                ),
                true,
            ));
        }

        let content = std::fs::read_to_string(&path)?;
        let occurrences = content.matches(old_string).count();
        if occurrences == 0 {
            return Err(ReplayError::simulation(
                ToolKind::Edit.name(),
                format!("old_string not found in {}", path.display()),
            ));
        }
        if occurrences > 1 && !replace_all {
            return Ok(SimulationResult::executed(
                format!(
                    "Found {occurrences} matches of the string to replace. Provide replace_all or a larger unique context."
                ),
                true,
            ));
        }

        let updated = if replace_all {
            content.replace(old_string, new_string)
        } else {
            content.replacen(old_string, new_string, 1)
        };
        std::fs::write(&path, updated)?;
        debug!(path = %path.display(), occurrences, "edited file");

        Ok(SimulationResult::executed(
            format!("The file {} has been updated.", path.display()),
            false,
        ))
    }
}
