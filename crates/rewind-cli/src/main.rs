//! Rewind CLI application
//!
//! Discovers test cases, replays or records them sequentially in isolated
//! environments, verifies workspace snapshots and post-conditions, and
//! prints a grouped report. Exits nonzero when any case fails.

mod args;
mod runner;

use clap::Parser;

pub use args::{Cli, Mode};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Set RUST_LOG=debug for verbose logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let all_passed = runner::run(cli).await?;
    if !all_passed {
        std::process::exit(1);
    }
    Ok(())
}
