//! Commit-hash ordinals for comparing VCS output across runs
//!
//! Commit identifiers differ between recording and replay. Instead of
//! matching literal hashes, each recognized hash is replaced with
//! `<<commit N>>` where N is assigned by first appearance, then all
//! ordinals are collapsed to a single canonical marker before structural
//! comparison. The comparison cares that a hash occupies a given textual
//! position, not which hash it is.
//!
//! Recognized shapes, as produced by common git subcommands:
//!
//! ```text
//! 007c8c1 Initial commit          # short-log line
//! [main 007c8c1] message          # commit confirmation
//! index cd53e7d..086743a          # range notation
//! ```

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static LINE_LEADING_SHA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^([0-9a-f]{7,40})(\s+)").expect("valid pattern"));

static BRACKETED_SHA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[(\S+)\s+([0-9a-f]{7,40})\]").expect("valid pattern"));

static RANGE_SHA: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b([0-9a-f]{7,40})\.\.([0-9a-f]{7,40})\b").expect("valid pattern")
});

static ORDINAL_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<<commit \d+>>").expect("valid pattern"));

/// Assigns stable increasing ordinals to commit hashes in order of first
/// appearance. Owned by one replay session; expected and actual output
/// streams each get their own tracker.
#[derive(Debug, Clone, Default)]
pub struct CommitTracker {
    ordinals: HashMap<String, usize>,
    next_ordinal: usize,
}

impl CommitTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// The ordinal for a hash, assigning the next one on first sight.
    ///
    /// Hashes are keyed by their 7-character lowercased prefix, so a short
    /// form and the full form of the same commit share an ordinal.
    pub fn ordinal(&mut self, sha: &str) -> usize {
        let key: String = sha.chars().take(7).collect::<String>().to_lowercase();
        if let Some(&ordinal) = self.ordinals.get(&key) {
            return ordinal;
        }
        self.next_ordinal += 1;
        self.ordinals.insert(key, self.next_ordinal);
        self.next_ordinal
    }

    /// Replace every recognized hash occurrence with its ordinal placeholder
    pub fn rewrite(&mut self, text: &str) -> String {
        let rewritten = RANGE_SHA
            .replace_all(text, |caps: &Captures| {
                let first = self.ordinal(&caps[1]);
                let second = self.ordinal(&caps[2]);
                format!("<<commit {first}>>..<<commit {second}>>")
            })
            .into_owned();

        let rewritten = LINE_LEADING_SHA
            .replace_all(&rewritten, |caps: &Captures| {
                format!("<<commit {}>>{}", self.ordinal(&caps[1]), &caps[2])
            })
            .into_owned();

        BRACKETED_SHA
            .replace_all(&rewritten, |caps: &Captures| {
                format!("[{} <<commit {}>>]", &caps[1], self.ordinal(&caps[2]))
            })
            .into_owned()
    }

    /// Collapse all ordinal placeholders to a single canonical marker.
    ///
    /// Two independently tracked texts may legitimately number unrelated
    /// commits differently; canonicalization makes them comparable by
    /// structure alone.
    pub fn canonicalize(text: &str) -> String {
        ORDINAL_MARKER.replace_all(text, "<<commit>>").into_owned()
    }
}
