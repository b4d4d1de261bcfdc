//! Deterministic stand-in for the real agent, used to exercise record mode
//!
//! Invoked exactly like the real agent (`fake-agent --session-id <id>
//! <prompt>`), it replays the tool calls of a pre-written transcript against
//! the current workspace and then publishes that transcript where the
//! recorder expects to find it. Driven entirely by environment variables:
//!
//! - `REWIND_FAKE_TRANSCRIPT`: the transcript whose tool calls to perform
//! - `REWIND_FAKE_STATE`: optional state file, so repeated invocations
//!   continue from the next tool call with placeholder bindings intact
//! - `REWIND_FAKE_CWD`: workspace override (defaults to the current dir)

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use rewind_core::transcript;
use rewind_tools::ToolSimulator;

/// Progress carried across invocations
#[derive(Debug, Default, Serialize, Deserialize)]
struct DriverState {
    call_index: usize,
    bindings: Vec<(String, String)>,
}

fn load_state(path: Option<&PathBuf>) -> Result<DriverState> {
    match path {
        Some(path) if path.exists() => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading state {}", path.display()))?;
            Ok(serde_json::from_str(&content)?)
        }
        _ => Ok(DriverState::default()),
    }
}

fn save_state(path: Option<&PathBuf>, state: &DriverState) -> Result<()> {
    if let Some(path) = path {
        std::fs::write(path, serde_json::to_string_pretty(state)?)?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut session_id = None;
    let mut prompt = None;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--session-id" => session_id = args.next(),
            _ => prompt = Some(arg),
        }
    }
    let session_id = session_id.context("--session-id is required")?;
    if prompt.as_deref().is_none_or(str::is_empty) {
        bail!("a non-empty prompt argument is required");
    }

    let transcript_path: PathBuf = std::env::var_os("REWIND_FAKE_TRANSCRIPT")
        .context("REWIND_FAKE_TRANSCRIPT is not set")?
        .into();
    let state_path: Option<PathBuf> = std::env::var_os("REWIND_FAKE_STATE").map(Into::into);
    let cwd: PathBuf = match std::env::var_os("REWIND_FAKE_CWD") {
        Some(dir) => dir.into(),
        None => std::env::current_dir()?,
    };

    let entries = transcript::parse_file(&transcript_path)?;
    let calls = transcript::extract_tool_calls(&entries);
    let mut state = load_state(state_path.as_ref())?;

    let mut simulator = ToolSimulator::new(cwd.clone(), std::env::vars().collect());
    for (name, value) in &state.bindings {
        simulator.registry_mut().set(name, value);
    }
    if let Some(project_dir) = transcript::project_directory(&entries) {
        simulator.add_path_mapping(project_dir, cwd.to_string_lossy().into_owned());
    }

    for (tool_use, recorded) in calls.iter().skip(state.call_index) {
        let expected = recorded.as_ref().map(|r| r.content.as_str());
        simulator
            .simulate(tool_use, expected)
            .await
            .with_context(|| format!("simulating {} call #{}", tool_use.name, state.call_index))?;
        state.call_index += 1;
    }

    state.bindings = simulator
        .registry()
        .bindings()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect();
    save_state(state_path.as_ref(), &state)?;

    publish_transcript(&transcript_path, &session_id)?;
    println!("session {session_id} complete");
    Ok(())
}

/// Copy the source transcript to where the recorder looks for a finished
/// session: `$HOME/.claude/projects/<dir>/<session_id>.jsonl`.
fn publish_transcript(source: &PathBuf, session_id: &str) -> Result<()> {
    let home: PathBuf = std::env::var_os("HOME").context("HOME is not set")?.into();
    let project_dir = home.join(".claude").join("projects").join("workspace");
    std::fs::create_dir_all(&project_dir)?;
    std::fs::copy(source, project_dir.join(format!("{session_id}.jsonl")))?;
    Ok(())
}
