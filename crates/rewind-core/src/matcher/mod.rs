//! Stateful fuzzy matching of recorded output against live output
//!
//! Two mechanisms cooperate here. [`PlaceholderRegistry`] resolves named
//! `<<name>>` placeholders embedded in recorded text, binding each name to
//! the first live value it matches and holding every later occurrence to
//! that same value. [`CommitTracker`] handles version-control identifiers,
//! which are recognized by textual shape and compared by position of first
//! appearance rather than by literal value.

mod commit;
mod placeholder;

pub use commit::CommitTracker;
pub use placeholder::{Direction, PlaceholderRegistry, Segment, tokenize};
