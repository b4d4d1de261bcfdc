//! Directory snapshots for byte-exact workspace verification
//!
//! Normalized output comparison deliberately discards file-write and
//! file-edit confirmations, so the snapshot is the source of truth for
//! on-disk correctness: a content-hash map of the workspace tree, captured
//! after recording and compared after replay.

use std::collections::BTreeMap;
use std::path::Path;

use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::error::ReplayResult;

/// Path components excluded from snapshots: version-control metadata,
/// caches, build output, and files whose content varies run to run.
const EXCLUDED_COMPONENTS: &[&str] = &[
    ".git",
    ".venv",
    ".claude",
    "__pycache__",
    "target",
    ".pytest_cache",
    ".coverage",
    "Cargo.lock",
    ".gitignore",
];

/// Excluded file suffixes
const EXCLUDED_SUFFIXES: &[&str] = &[".pyc", ".pyo"];

/// Relative path → lowercase hex SHA-256, sorted for deterministic
/// serialization.
pub type DirectorySnapshot = BTreeMap<String, String>;

fn is_excluded(relative: &Path) -> bool {
    for component in relative.components() {
        let name = component.as_os_str().to_string_lossy();
        if EXCLUDED_COMPONENTS.contains(&name.as_ref()) {
            return true;
        }
    }
    let path_str = relative.to_string_lossy();
    EXCLUDED_SUFFIXES
        .iter()
        .any(|suffix| path_str.ends_with(suffix))
}

/// Capture a content-hash snapshot of every regular file under `root`.
///
/// Infrastructure paths are excluded and unreadable files silently skipped.
pub fn capture(root: &Path) -> DirectorySnapshot {
    let mut snapshot = DirectorySnapshot::new();

    for entry in WalkDir::new(root).into_iter().filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        if is_excluded(relative) {
            continue;
        }
        let Ok(content) = std::fs::read(entry.path()) else {
            continue;
        };
        let hash = format!("{:x}", Sha256::digest(&content));
        snapshot.insert(relative.to_string_lossy().into_owned(), hash);
    }

    snapshot
}

/// Compare two snapshots, reporting every difference.
///
/// An empty result means the snapshots are equivalent. Content mismatches
/// on text files include a short excerpt of the live content to aid
/// diagnosis.
pub fn compare(
    expected: &DirectorySnapshot,
    actual: &DirectorySnapshot,
    root: &Path,
) -> Vec<String> {
    let mut differences = Vec::new();

    for path in expected.keys() {
        if !actual.contains_key(path) {
            differences.push(format!("Missing file: {path}"));
        }
    }

    for path in actual.keys() {
        if !expected.contains_key(path) {
            differences.push(format!("Unexpected file: {path}"));
        }
    }

    for (path, expected_hash) in expected {
        let Some(actual_hash) = actual.get(path) else {
            continue;
        };
        if expected_hash == actual_hash {
            continue;
        }
        match std::fs::read_to_string(root.join(path)) {
            Ok(content) => {
                let excerpt: String = content.chars().take(200).collect();
                differences.push(format!(
                    "Content mismatch: {path}\n  Expected hash: {expected_hash}\n  Actual hash: {actual_hash}\n  First 200 chars: {excerpt}"
                ));
            }
            Err(_) => differences.push(format!(
                "Content mismatch (binary): {path}\n  Expected hash: {expected_hash}\n  Actual hash: {actual_hash}"
            )),
        }
    }

    differences
}

/// Persist a snapshot as sorted JSON
pub fn save(snapshot: &DirectorySnapshot, path: &Path) -> ReplayResult<()> {
    let json = serde_json::to_string_pretty(snapshot)?;
    std::fs::write(path, format!("{json}\n"))?;
    Ok(())
}

/// Load a previously saved snapshot, or `None` if no file exists
pub fn load(path: &Path) -> ReplayResult<Option<DirectorySnapshot>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&content)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_file(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn capture_excludes_infrastructure_paths() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "src/main.rs", "fn main() {}");
        write_file(dir.path(), ".git/HEAD", "ref: refs/heads/main");
        write_file(dir.path(), "target/debug/out", "binary");
        write_file(dir.path(), "cache.pyc", "bytecode");
        write_file(dir.path(), "Cargo.lock", "[[package]]");

        let snapshot = capture(dir.path());
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.contains_key("src/main.rs"));
    }

    #[test]
    fn unchanged_directory_self_compares_clean() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "a.txt", "alpha");
        write_file(dir.path(), "nested/b.txt", "beta");

        let snapshot = capture(dir.path());
        let diffs = compare(&snapshot, &capture(dir.path()), dir.path());
        assert!(diffs.is_empty());
    }

    #[test]
    fn reports_missing_unexpected_and_changed_files() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "keep.txt", "same");
        write_file(dir.path(), "gone.txt", "was here");
        write_file(dir.path(), "change.txt", "before");
        let expected = capture(dir.path());

        std::fs::remove_file(dir.path().join("gone.txt")).unwrap();
        write_file(dir.path(), "change.txt", "after");
        write_file(dir.path(), "new.txt", "surprise");
        let actual = capture(dir.path());

        let diffs = compare(&expected, &actual, dir.path());
        assert_eq!(diffs.len(), 3);
        assert!(diffs.iter().any(|d| d == "Missing file: gone.txt"));
        assert!(diffs.iter().any(|d| d == "Unexpected file: new.txt"));
        assert!(diffs.iter().any(|d| d.starts_with("Content mismatch: change.txt")));
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "a.txt", "alpha");
        let snapshot = capture(dir.path());

        let file = dir.path().join("snapshot.json");
        save(&snapshot, &file).unwrap();
        let loaded = load(&file).unwrap().unwrap();
        assert_eq!(snapshot, loaded);
    }

    #[test]
    fn load_missing_file_is_none() {
        let dir = TempDir::new().unwrap();
        assert!(load(&dir.path().join("absent.json")).unwrap().is_none());
    }
}
