//! Bash command simulation
//!
//! Commands run under `bash -c` in the case workspace with the case's
//! explicit environment map. Stdout and stderr are captured separately and
//! concatenated, matching the recorded tool output shape. The exit status
//! is not part of the comparison: recorded sessions routinely contain
//! failing commands (test runs, hooks that block by exiting nonzero), and
//! their output is compared like any other. Only a timeout or a spawn
//! failure aborts the case.

use std::process::Stdio;
use std::time::Duration;

use rewind_core::tools::ToolKind;
use rewind_core::{ReplayError, ReplayResult};
use serde_json::{Map, Value};
use tokio::process::Command;
use tracing::debug;

use super::{opt_u64_arg, str_arg, SimulationResult, ToolSimulator};

impl ToolSimulator {
    pub(super) async fn simulate_bash(
        &mut self,
        input: &Map<String, Value>,
    ) -> ReplayResult<SimulationResult> {
        let command = str_arg(input, ToolKind::Bash, "command")?;
        let timeout_ms = opt_u64_arg(input, "timeout").unwrap_or(self.shell_timeout_ms);
        debug!(%command, timeout_ms, "running shell command");

        let mut child = Command::new("bash");
        child
            .arg("-c")
            .arg(command)
            .current_dir(self.cwd())
            .env_clear()
            .envs(self.env())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(Duration::from_millis(timeout_ms), child.output())
            .await
            .map_err(|_| {
                ReplayError::simulation(
                    ToolKind::Bash.name(),
                    format!("command timed out after {}s: {command}", timeout_ms / 1000),
                )
            })?
            .map_err(|e| {
                ReplayError::simulation(ToolKind::Bash.name(), format!("spawn failed: {e}"))
            })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        let combined = combined.trim_end().to_string();

        Ok(SimulationResult::executed(combined, false))
    }
}
