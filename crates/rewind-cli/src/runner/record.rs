//! Record execution: drive the subject agent and capture its transcript
//!
//! The case's prompt comes from the fenced block under the `## Prompt`
//! heading in story.md. The agent runs under a pseudo-terminal in the case
//! workspace with a fresh session id; without a controlling terminal the
//! agent skips its interactive session lifecycle (including session-end
//! hooks), which is exactly what these cases record. Afterwards its
//! transcript is located under the isolated home's project directory and
//! copied into the case.

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use portable_pty::{native_pty_system, CommandBuilder, PtySize};
use tracing::{info, instrument};

use rewind_core::env::CaseEnvironment;
use rewind_core::suite::{TestCase, TRANSCRIPT_FILE};
use rewind_core::{ReplayError, ReplayResult};

#[instrument(skip_all, fields(case = %case.name))]
pub async fn record_case(
    case: &TestCase,
    env: &CaseEnvironment,
    subject: &str,
) -> ReplayResult<()> {
    let story = std::fs::read_to_string(case.story_path()).map_err(|e| {
        ReplayError::recording(format!("reading {}: {e}", case.story_path().display()))
    })?;
    let Some(prompt) = extract_prompt(&story) else {
        return Err(ReplayError::recording(format!(
            "{} has no fenced block under a '## Prompt' heading",
            case.story_path().display()
        )));
    };

    let session_id = uuid::Uuid::new_v4().to_string();
    info!(%session_id, %subject, "launching subject agent");

    let args = vec!["--session-id".to_string(), session_id.clone(), prompt];
    let status = {
        let subject = subject.to_string();
        let cwd = env.workspace().to_path_buf();
        let envs = env.env().clone();
        tokio::task::spawn_blocking(move || run_subject_in_pty(&subject, &args, &cwd, &envs))
            .await
            .map_err(|e| ReplayError::recording(format!("agent task failed: {e}")))??
    };
    if !status.success() {
        return Err(ReplayError::recording(format!(
            "{subject} exited with code {}",
            status.exit_code()
        )));
    }

    let transcript = find_session_transcript(env, &session_id)?;
    let destination = case.dir.join(TRANSCRIPT_FILE);
    std::fs::copy(&transcript, &destination)?;
    info!(path = %destination.display(), "captured transcript");
    Ok(())
}

/// Run the subject under a pseudo-terminal, mirroring its output.
///
/// Blocking; callers run it on a blocking task. EOF on the master side
/// arrives once the agent exits and the slave end is closed.
fn run_subject_in_pty(
    subject: &str,
    args: &[String],
    cwd: &Path,
    envs: &BTreeMap<String, String>,
) -> ReplayResult<portable_pty::ExitStatus> {
    let system = native_pty_system();
    let pair = system
        .openpty(PtySize {
            rows: 24,
            cols: 80,
            pixel_width: 0,
            pixel_height: 0,
        })
        .map_err(|e| ReplayError::recording(format!("opening pty: {e}")))?;

    let mut cmd = CommandBuilder::new(subject);
    cmd.args(args);
    cmd.cwd(cwd);
    cmd.env_clear();
    for (key, value) in envs {
        cmd.env(key, value);
    }

    let mut child = pair
        .slave
        .spawn_command(cmd)
        .map_err(|e| ReplayError::recording(format!("spawning {subject}: {e}")))?;
    drop(pair.slave);

    let mut reader = pair
        .master
        .try_clone_reader()
        .map_err(|e| ReplayError::recording(format!("cloning pty reader: {e}")))?;
    let mut stdout = std::io::stdout();
    let mut buffer = [0u8; 8192];
    loop {
        match reader.read(&mut buffer) {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let _ = stdout.write_all(&buffer[..n]);
                let _ = stdout.flush();
            }
        }
    }

    child
        .wait()
        .map_err(|e| ReplayError::recording(format!("waiting for {subject}: {e}")))
}

/// The fenced code block following the `## Prompt` heading
fn extract_prompt(story: &str) -> Option<String> {
    let mut in_prompt_section = false;
    let mut in_fence = false;
    let mut lines = Vec::new();

    for line in story.lines() {
        if line.trim() == "## Prompt" {
            in_prompt_section = true;
            continue;
        }
        if !in_prompt_section {
            continue;
        }
        if line.trim_start().starts_with("```") {
            if in_fence {
                return Some(lines.join("\n"));
            }
            in_fence = true;
            continue;
        }
        if in_fence {
            lines.push(line);
        } else if line.starts_with("## ") {
            // Prompt section ended without a fence
            break;
        }
    }
    None
}

/// Locate `<session_id>.jsonl` under the isolated home's agent project
/// directories.
fn find_session_transcript(env: &CaseEnvironment, session_id: &str) -> ReplayResult<PathBuf> {
    let pattern = env
        .home()
        .join(".claude")
        .join("projects")
        .join("*")
        .join(format!("{session_id}.jsonl"));
    let matches = glob::glob(&pattern.to_string_lossy())
        .map_err(|e| ReplayError::recording(format!("bad transcript pattern: {e}")))?;
    matches.filter_map(Result::ok).next().ok_or_else(|| {
        ReplayError::recording(format!(
            "no transcript for session {session_id} under {}",
            env.home().display()
        ))
    })
}
