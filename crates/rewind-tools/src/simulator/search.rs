//! Glob and Grep simulation
//!
//! Glob uses in-process pattern matching; Grep shells out to ripgrep when
//! available and falls back to POSIX grep. Search output ordering and
//! content search both go through output normalization before comparison.

use std::io::ErrorKind;
use std::process::Stdio;

use rewind_core::tools::ToolKind;
use rewind_core::{ReplayError, ReplayResult};
use serde_json::{Map, Value};
use tokio::process::Command;
use tracing::debug;

use super::{opt_str_arg, str_arg, SimulationResult, ToolSimulator};

impl ToolSimulator {
    pub(super) fn simulate_glob(
        &mut self,
        input: &Map<String, Value>,
    ) -> ReplayResult<SimulationResult> {
        let pattern = str_arg(input, ToolKind::Glob, "pattern")?;
        let base = match opt_str_arg(input, "path") {
            Some(path) => self.resolve_path(path),
            None => self.cwd().to_path_buf(),
        };
        let full_pattern = if std::path::Path::new(pattern).is_absolute() {
            pattern.to_string()
        } else {
            base.join(pattern).to_string_lossy().into_owned()
        };

        let entries = glob::glob(&full_pattern).map_err(|e| {
            ReplayError::simulation(ToolKind::Glob.name(), format!("invalid pattern: {e}"))
        })?;
        // Directories match too; recorded listings include them
        let mut matches: Vec<String> = entries
            .filter_map(Result::ok)
            .map(|path| path.to_string_lossy().into_owned())
            .collect();
        matches.sort_unstable();
        debug!(pattern = %full_pattern, count = matches.len(), "glob");

        let output = if matches.is_empty() {
            "No files found".to_string()
        } else {
            matches.join("\n")
        };
        Ok(SimulationResult::executed(output, false))
    }

    pub(super) async fn simulate_grep(
        &mut self,
        input: &Map<String, Value>,
    ) -> ReplayResult<SimulationResult> {
        let pattern = str_arg(input, ToolKind::Grep, "pattern")?;
        let search_path = match opt_str_arg(input, "path") {
            Some(path) => self.resolve_path(path),
            None => self.cwd().to_path_buf(),
        };
        let output_mode = opt_str_arg(input, "output_mode").unwrap_or("files_with_matches");
        let glob_filter = opt_str_arg(input, "glob");

        let mut rg = Command::new("rg");
        rg.arg("--no-heading");
        match output_mode {
            "content" => {
                rg.arg("-n");
            }
            "count" => {
                rg.arg("-c");
            }
            _ => {
                rg.arg("-l");
            }
        }
        if let Some(filter) = glob_filter {
            rg.arg("--glob").arg(filter);
        }
        rg.arg("--").arg(pattern).arg(&search_path);

        let output = match self.run_search(rg).await {
            Ok(output) => output,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let mut grep = Command::new("grep");
                match output_mode {
                    "content" => grep.arg("-rn"),
                    "count" => grep.arg("-rc"),
                    _ => grep.arg("-rl"),
                };
                if let Some(filter) = glob_filter {
                    grep.arg(format!("--include={filter}"));
                }
                grep.arg("--").arg(pattern).arg(&search_path);
                self.run_search(grep).await.map_err(|e| {
                    ReplayError::simulation(ToolKind::Grep.name(), format!("spawn failed: {e}"))
                })?
            }
            Err(e) => {
                return Err(ReplayError::simulation(
                    ToolKind::Grep.name(),
                    format!("spawn failed: {e}"),
                ));
            }
        };

        // Exit code 1 means no matches for both searchers
        match output.status.code() {
            Some(0) => {
                let stdout = String::from_utf8_lossy(&output.stdout)
                    .trim_end()
                    .to_string();
                Ok(SimulationResult::executed(stdout, false))
            }
            Some(1) => Ok(SimulationResult::executed("No matches found".to_string(), false)),
            _ => {
                let stderr = String::from_utf8_lossy(&output.stderr).trim_end().to_string();
                Ok(SimulationResult::executed(stderr, true))
            }
        }
    }

    async fn run_search(&self, mut command: Command) -> std::io::Result<std::process::Output> {
        command
            .current_dir(self.cwd())
            .env_clear()
            .envs(self.env())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
    }
}
