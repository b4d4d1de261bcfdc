//! Case orchestration
//!
//! Each case runs through a fixed pipeline: provision an isolated
//! environment, run the setup script, replay (or record) the session,
//! verify the workspace snapshot, then run the post-condition. Cases run
//! sequentially; output mismatches are warnings, everything else that goes
//! wrong fails the case with a category the report can group on.

mod record;
mod replay;
mod report;

use std::path::Path;
use std::process::Stdio;

use anyhow::bail;
use tokio::process::Command;
use tracing::{info, warn};

use rewind_core::env::CaseEnvironment;
use rewind_core::error::{ErrorCategory, ReplayError, ReplayResult};
use rewind_core::suite::{self, TestCase, TestResult, TRANSCRIPT_FILE};
use rewind_core::snapshot;

use crate::args::{Cli, Mode};

pub async fn run(cli: Cli) -> anyhow::Result<bool> {
    let cases = suite::discover(&cli.tests_dir, &cli.cases)?;
    if cases.is_empty() {
        bail!("no test cases found under {}", cli.tests_dir.display());
    }

    let mut results = Vec::with_capacity(cases.len());
    for case in &cases {
        info!(case = %case.name, "running case");
        let result = match execute_case(&cli, case).await {
            Ok(result) => result,
            Err(e) => TestResult::fail(&case.name, categorize(&e), e.to_string()),
        };
        report::print_case_line(&result, cli.verbose);
        results.push(result);
    }

    Ok(report::print_report(&results))
}

/// Map an execution error onto the report category it belongs to
fn categorize(error: &ReplayError) -> ErrorCategory {
    match error {
        ReplayError::Simulation { .. } => ErrorCategory::ExecutionError,
        ReplayError::Recording(_) => ErrorCategory::RecordingFailed,
        _ => ErrorCategory::Other,
    }
}

async fn execute_case(cli: &Cli, case: &TestCase) -> ReplayResult<TestResult> {
    let env = CaseEnvironment::provision()?;
    // Both modes need the subject on the sandbox PATH before setup runs:
    // replayed shell commands and setup scripts invoke it
    let subject = prepare_subject(&cli.subject, &env)?;
    run_setup(case, &env).await?;

    match cli.mode {
        Mode::Replay => {
            let Some(transcript) = &case.transcript_path else {
                return Ok(TestResult::fail(
                    &case.name,
                    ErrorCategory::NoTranscript,
                    format!("{} is missing", case.dir.join(TRANSCRIPT_FILE).display()),
                ));
            };
            let mismatches = replay::replay_case(case, &env, transcript).await?;
            for mismatch in &mismatches {
                warn!(case = %case.name, "{mismatch}");
            }
        }
        Mode::Record => record::record_case(case, &env, &subject).await?,
    }

    if let Some(failure) = verify_snapshot(cli, case, &env)? {
        return Ok(failure);
    }

    run_post_condition(case, &env).await
}

/// Compare the workspace against the recorded snapshot, or capture a new
/// one when bootstrapping or recording.
fn verify_snapshot(
    cli: &Cli,
    case: &TestCase,
    env: &CaseEnvironment,
) -> ReplayResult<Option<TestResult>> {
    let actual = snapshot::capture(env.workspace());
    let snapshot_path = case.snapshot_path();

    if cli.save_snapshot || cli.mode == Mode::Record {
        snapshot::save(&actual, &snapshot_path)?;
        info!(case = %case.name, path = %snapshot_path.display(), "saved workspace snapshot");
        return Ok(None);
    }

    match snapshot::load(&snapshot_path)? {
        Some(expected) => {
            let differences = snapshot::compare(&expected, &actual, env.workspace());
            if differences.is_empty() {
                Ok(None)
            } else {
                Ok(Some(TestResult::fail(
                    &case.name,
                    ErrorCategory::DirectoryMismatch,
                    differences.join("\n"),
                )))
            }
        }
        None => {
            warn!(case = %case.name, "no recorded snapshot; run with --save-snapshot to create one");
            Ok(None)
        }
    }
}

/// Make the subject executable resolvable inside the case. An explicit
/// path is installed into the sandbox bin and invoked by name; anything
/// else is assumed to already be on the host PATH.
fn prepare_subject(subject: &str, env: &CaseEnvironment) -> ReplayResult<String> {
    let path = Path::new(subject);
    if path.is_file() {
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            env.install_subject(path, name)?;
            return Ok(name.to_string());
        }
    }
    Ok(subject.to_string())
}

async fn run_setup(case: &TestCase, env: &CaseEnvironment) -> ReplayResult<()> {
    let output = run_script(&case.setup_script, env).await.map_err(|e| {
        ReplayError::provision(format!("setup for {}: {e}", case.name))
    })?;
    if !output.status.success() {
        return Err(ReplayError::provision(format!(
            "setup for {} exited with {}: {}",
            case.name,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim_end()
        )));
    }
    Ok(())
}

async fn run_post_condition(case: &TestCase, env: &CaseEnvironment) -> ReplayResult<TestResult> {
    let Some(script) = &case.post_condition else {
        return Ok(TestResult::pass(&case.name, ""));
    };

    let output = run_script(script, env).await.map_err(|e| {
        ReplayError::other(format!("post-condition for {}: {e}", case.name))
    })?;
    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    let combined = combined.trim_end().to_string();

    if output.status.success() {
        Ok(TestResult::pass(&case.name, combined))
    } else {
        Ok(TestResult::fail(
            &case.name,
            ErrorCategory::PostConditionFailed,
            combined,
        ))
    }
}

/// Run a case script in the workspace with the case's explicit environment.
/// Python scripts go through the interpreter, everything else through bash.
async fn run_script(
    script: &Path,
    env: &CaseEnvironment,
) -> std::io::Result<std::process::Output> {
    let is_python = script.extension().is_some_and(|ext| ext == "py");
    let mut command = if is_python {
        let mut c = Command::new("python3");
        c.arg(script);
        c
    } else {
        let mut c = Command::new("bash");
        c.arg(script);
        c
    };
    command
        .current_dir(env.workspace())
        .env_clear()
        .envs(env.env())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use serde_json::json;
    use tempfile::TempDir;

    fn write_transcript(case_dir: &Path, command: &str) {
        let lines = [
            json!({
                "type": "assistant",
                "uuid": "a1",
                "timestamp": "2025-06-01T10:00:00Z",
                "message": {
                    "role": "assistant",
                    "content": [{
                        "type": "tool_use",
                        "id": "toolu_1",
                        "name": "Bash",
                        "input": {"command": command}
                    }]
                }
            })
            .to_string(),
            json!({
                "type": "user",
                "uuid": "u1",
                "timestamp": "2025-06-01T10:00:01Z",
                "message": {
                    "role": "user",
                    "content": [{
                        "type": "tool_result",
                        "tool_use_id": "toolu_1",
                        "content": ""
                    }]
                }
            })
            .to_string(),
        ];
        std::fs::write(case_dir.join("transcript.jsonl"), lines.join("\n")).unwrap();
    }

    #[tokio::test]
    async fn subject_is_on_the_sandbox_path_during_replay() {
        let root = TempDir::new().unwrap();
        let case_dir = root.path().join("bare-invoke");
        std::fs::create_dir(&case_dir).unwrap();
        std::fs::write(case_dir.join("setup.sh"), "").unwrap();
        // The replayed command invokes the subject by bare name
        write_transcript(&case_dir, "marker-agent");

        let marker = root.path().join("subject-ran");
        let subject = root.path().join("marker-agent");
        std::fs::write(
            &subject,
            format!("#!/bin/sh\ntouch {}\n", marker.display()),
        )
        .unwrap();

        let cli = Cli::try_parse_from([
            "rewind",
            "--tests-dir",
            root.path().to_str().unwrap(),
            "--subject",
            subject.to_str().unwrap(),
            "bare-invoke",
        ])
        .unwrap();
        let cases = suite::discover(&cli.tests_dir, &cli.cases).unwrap();
        assert_eq!(cases.len(), 1);

        let result = execute_case(&cli, &cases[0]).await.unwrap();
        assert!(result.passed, "{:?}", result.error);
        assert!(marker.exists());
    }
}
