//! Placeholder substitution for fuzzy matching
//!
//! Placeholders use the syntax `<<name>>` (e.g. `<<commit 1>>`,
//! `<<issue 1>>`) and stand in for values expected to vary between
//! recording and replay, like VCS hashes and generated ids.
//!
//! Matching is a three-phase pipeline: tokenize the expected text into
//! literal and placeholder segments, compile an anchored pattern where each
//! placeholder is a non-greedy capture, then verify or bind each capture in
//! left-to-right order. A name bound once is immutable for the registry's
//! lifetime, so two log lines referencing the same dynamic value cross-check
//! each other while still tolerating a different value across runs.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

static PLACEHOLDER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<<([^>]+)>>").expect("placeholder pattern is valid"));

/// One segment of tokenized expected text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Matched byte-exactly
    Literal(String),
    /// Matched as a non-greedy capture, bound by name
    Placeholder(String),
}

/// Split expected text around placeholder tokens
pub fn tokenize(expected: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut last = 0;
    for caps in PLACEHOLDER_PATTERN.captures_iter(expected) {
        let whole = caps.get(0).expect("group 0 always present");
        if whole.start() > last {
            segments.push(Segment::Literal(expected[last..whole.start()].to_string()));
        }
        segments.push(Segment::Placeholder(caps[1].to_string()));
        last = whole.end();
    }
    if last < expected.len() {
        segments.push(Segment::Literal(expected[last..].to_string()));
    }
    segments
}

/// Compile tokenized segments into a full-string matching pattern
fn compile(segments: &[Segment]) -> Option<Regex> {
    let mut pattern = String::from(r"\A");
    for segment in segments {
        match segment {
            Segment::Literal(text) => pattern.push_str(&regex::escape(text)),
            Segment::Placeholder(_) => pattern.push_str(r"(.+?)"),
        }
    }
    pattern.push_str(r"\z");
    Regex::new(&pattern).ok()
}

/// Substitution direction for [`PlaceholderRegistry::substitute`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Replace `<<name>>` tokens with their bound values
    Expect,
    /// Replace bound values with their `<<name>>` tokens
    Actual,
}

/// Tracks placeholder name → value bindings during one replay session.
///
/// Created per session, discarded at session end; never shared across cases.
#[derive(Debug, Clone, Default)]
pub struct PlaceholderRegistry {
    values: HashMap<String, String>,
    /// First-bind order, for deterministic actual-direction substitution
    order: Vec<String>,
}

impl PlaceholderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether `actual` matches `expected` under placeholder binding.
    ///
    /// Without placeholders this is byte-exact equality. Otherwise the
    /// compiled pattern must match the full string, and each capture must
    /// equal its name's bound value (binding it on first sight).
    pub fn matches(&mut self, expected: &str, actual: &str) -> bool {
        let segments = tokenize(expected);
        let has_placeholders = segments
            .iter()
            .any(|s| matches!(s, Segment::Placeholder(_)));
        if !has_placeholders {
            return expected == actual;
        }

        let Some(pattern) = compile(&segments) else {
            return false;
        };
        let Some(caps) = pattern.captures(actual) else {
            return false;
        };

        let names = segments.iter().filter_map(|s| match s {
            Segment::Placeholder(name) => Some(name),
            _ => None,
        });
        for (index, name) in names.enumerate() {
            let Some(captured) = caps.get(index + 1) else {
                return false;
            };
            let captured = captured.as_str();
            match self.values.get(name) {
                Some(bound) if bound != captured => return false,
                Some(_) => {}
                None => self.bind(name.clone(), captured.to_string()),
            }
        }
        true
    }

    /// Substitute placeholders in one direction.
    ///
    /// `Expect` expands bound names to values, leaving unbound tokens in
    /// place; `Actual` collapses known values back to their tokens, in
    /// first-bind order.
    pub fn substitute(&self, text: &str, direction: Direction) -> String {
        match direction {
            Direction::Expect => PLACEHOLDER_PATTERN
                .replace_all(text, |caps: &regex::Captures| {
                    match self.values.get(&caps[1]) {
                        Some(value) => value.clone(),
                        None => caps[0].to_string(),
                    }
                })
                .into_owned(),
            Direction::Actual => {
                let mut result = text.to_string();
                for name in &self.order {
                    if let Some(value) = self.values.get(name) {
                        result = result.replace(value, &format!("<<{name}>>"));
                    }
                }
                result
            }
        }
    }

    /// The bound value for a name, if any
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Manually bind a name. An existing binding is overwritten.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        if !self.values.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.values.insert(name, value.into());
    }

    /// Clear all bindings
    pub fn reset(&mut self) {
        self.values.clear();
        self.order.clear();
    }

    /// Snapshot of all bindings, for persistence across driver invocations
    pub fn bindings(&self) -> impl Iterator<Item = (&str, &str)> {
        self.order
            .iter()
            .filter_map(|name| Some((name.as_str(), self.values.get(name)?.as_str())))
    }

    fn bind(&mut self, name: String, value: String) {
        self.order.push(name.clone());
        self.values.insert(name, value);
    }
}
