//! Isolated per-case execution environments
//!
//! Every case runs in a throwaway directory tree so replayed tool calls can
//! never touch the host checkout or the user's real home directory:
//!
//! ```text
//! <tempdir>/
//!     workspace/     # cwd for setup, tools, and the post-condition
//!     sandbox/bin/   # prepended to PATH; holds the subject binary
//!     home/          # isolated HOME
//! ```
//!
//! Child processes receive an explicit environment map built here rather
//! than inheriting mutations to the parent's environment.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::debug;

use crate::error::{ReplayError, ReplayResult};

/// One provisioned case environment. Dropping it removes the entire tree.
#[derive(Debug)]
pub struct CaseEnvironment {
    root: TempDir,
    workspace: PathBuf,
    sandbox_bin: PathBuf,
    home: PathBuf,
    env: BTreeMap<String, String>,
}

impl CaseEnvironment {
    /// Create the directory layout and the environment map for one case
    pub fn provision() -> ReplayResult<Self> {
        let root = TempDir::new()
            .map_err(|e| ReplayError::provision(format!("creating case directory: {e}")))?;

        let workspace = root.path().join("workspace");
        let sandbox_bin = root.path().join("sandbox").join("bin");
        let home = root.path().join("home");
        std::fs::create_dir_all(&workspace)?;
        std::fs::create_dir_all(&sandbox_bin)?;
        std::fs::create_dir_all(&home)?;

        let env = build_env(&sandbox_bin, &home);
        debug!(root = %root.path().display(), "provisioned case environment");

        Ok(Self {
            root,
            workspace,
            sandbox_bin,
            home,
            env,
        })
    }

    /// Working directory for setup scripts, tool execution, and snapshots
    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    /// Isolated home directory
    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Root of the provisioned tree
    pub fn root(&self) -> &Path {
        self.root.path()
    }

    /// The environment map for child processes spawned inside this case
    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// Add or override one environment entry
    pub fn set_env(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.env.insert(key.into(), value.into());
    }

    /// Install an executable into the sandbox bin under `name`, making it
    /// resolvable ahead of anything on the host PATH.
    pub fn install_subject(&self, source: &Path, name: &str) -> ReplayResult<PathBuf> {
        let target = self.sandbox_bin.join(name);
        std::fs::copy(source, &target).map_err(|e| {
            ReplayError::provision(format!(
                "installing {} as {name}: {e}",
                source.display()
            ))
        })?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = std::fs::metadata(&target)?.permissions();
            perms.set_mode(perms.mode() | 0o755);
            std::fs::set_permissions(&target, perms)?;
        }
        Ok(target)
    }
}

/// Build the child environment: the parent environment with HOME redirected
/// into the case tree, the sandbox bin prepended to PATH, toolchain homes
/// pinned to their real locations, and Python's interpreter override
/// removed.
fn build_env(sandbox_bin: &Path, home: &Path) -> BTreeMap<String, String> {
    let mut env: BTreeMap<String, String> = std::env::vars().collect();

    let original_home = env.get("HOME").cloned();
    env.insert("HOME".to_string(), home.to_string_lossy().into_owned());

    let path = env.get("PATH").cloned().unwrap_or_default();
    env.insert(
        "PATH".to_string(),
        format!("{}:{path}", sandbox_bin.display()),
    );

    // Redirecting HOME would otherwise orphan rustup and cargo state
    if let Some(original_home) = original_home {
        env.entry("RUSTUP_HOME".to_string())
            .or_insert_with(|| format!("{original_home}/.rustup"));
        env.entry("CARGO_HOME".to_string())
            .or_insert_with(|| format!("{original_home}/.cargo"));
    }

    env.remove("PYTHONHOME");

    env
}
