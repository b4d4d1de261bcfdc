//! Output normalization for lenient comparison
//!
//! A pure transform applied to both recorded and live tool output before
//! matching. It removes noise that varies run to run without describing
//! behavior: annotation blocks injected by the agent runtime, filesystem
//! ordering of listings, build progress and timing chatter, and the
//! nondeterministic interleaving of parallel test runners.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::tools::ToolKind;

/// Fixed token replacing edit confirmations; byte-exact file state is
/// verified by the directory snapshot instead.
pub const EDIT_SUCCESS_TOKEN: &str = "edit_success";

/// Fixed token replacing write confirmations
pub const WRITE_SUCCESS_TOKEN: &str = "write_success";

static REMINDER_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<system-reminder>.*?</system-reminder>").expect("valid pattern"));

/// A truncated reminder tag at end-of-text, cut off by output capture limits
static REMINDER_TAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<system-reminder>.*\z").expect("valid pattern"));

static ISO_TIMESTAMP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}(?:\.\d+)?(?:Z|[+-]\d{2}:?\d{2})?")
        .expect("valid pattern")
});

/// Calendar timestamps in git's default date format
static CALENDAR_TIMESTAMP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:Mon|Tue|Wed|Thu|Fri|Sat|Sun) (?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec) +\d{1,2} \d{2}:\d{2}:\d{2} \d{4}(?: [+-]\d{4})?",
    )
    .expect("valid pattern")
});

static ELAPSED_TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bin \d+(?:\.\d+)?s\b").expect("valid pattern"));

/// Cargo content hashes embedded in artifact names (`deps/foo-8a9f0b1c2d3e4f56`)
static ARTIFACT_HASH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-[0-9a-f]{16}\b").expect("valid pattern"));

static DOCTEST_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(line \d+\)").expect("valid pattern"));

/// One test-runner result line ("test foo::bar ... ok")
static TEST_RESULT_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^test \S.* \.\.\. \S+$").expect("valid pattern"));

/// Remove out-of-band annotation blocks, including a truncated one at
/// end-of-text.
pub fn strip_annotation_blocks(text: &str) -> String {
    let stripped = REMINDER_BLOCK.replace_all(text, "");
    REMINDER_TAIL.replace_all(&stripped, "").trim().to_string()
}

/// Drop infrastructure lines from a listing and sort the remainder.
///
/// Virtualenv and plugin-install paths vary between runs, and listing order
/// is filesystem-dependent rather than semantically significant.
fn normalize_listing(text: &str) -> String {
    let mut lines: Vec<&str> = text
        .lines()
        .filter(|line| !line.contains(".venv") && !line.contains(".claude"))
        .collect();
    lines.sort_unstable();
    lines.join("\n")
}

/// Scrub shell output of cache-dependent and timing-dependent noise
fn normalize_shell(text: &str) -> String {
    let kept: Vec<&str> = text
        .lines()
        .filter(|line| {
            let trimmed = line.trim_start();
            !trimmed.starts_with("Compiling ") && !trimmed.starts_with("Building ")
        })
        .collect();
    let text = kept.join("\n");

    let text = ISO_TIMESTAMP.replace_all(&text, "<timestamp>");
    let text = CALENDAR_TIMESTAMP.replace_all(&text, "<timestamp>");
    let text = ELAPSED_TIME.replace_all(&text, "in <elapsed>");
    let text = ARTIFACT_HASH.replace_all(&text, "-<hash>");
    let text = DOCTEST_LINE.replace_all(&text, "(line <n>)");

    sort_test_result_lines(&text)
}

/// Sort individual test-result lines in place.
///
/// Parallel test execution does not guarantee result ordering, so the
/// result lines are extracted, sorted, and spliced back in at the position
/// of the first one.
fn sort_test_result_lines(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let mut result_lines: Vec<&str> = lines
        .iter()
        .copied()
        .filter(|line| TEST_RESULT_LINE.is_match(line))
        .collect();
    if result_lines.len() < 2 {
        return text.to_string();
    }
    result_lines.sort_unstable();

    let mut output = Vec::with_capacity(lines.len());
    let mut spliced = false;
    for line in &lines {
        if TEST_RESULT_LINE.is_match(line) {
            if !spliced {
                output.extend(result_lines.iter().copied());
                spliced = true;
            }
        } else {
            output.push(line);
        }
    }
    output.join("\n")
}

/// Normalize tool output for comparison, parameterized by the producing
/// tool. Applied identically to recorded and live output.
pub fn normalize(text: &str, tool: Option<ToolKind>) -> String {
    let text = strip_annotation_blocks(text);

    let text = match tool {
        Some(ToolKind::Glob) => normalize_listing(&text),
        Some(ToolKind::Edit) => {
            let lowered = text.to_lowercase();
            if lowered.contains("has been updated") || lowered.contains("edited file") {
                return EDIT_SUCCESS_TOKEN.to_string();
            }
            text
        }
        Some(ToolKind::Write) => {
            if text.contains("File created successfully")
                || text.contains("File updated successfully")
            {
                return WRITE_SUCCESS_TOKEN.to_string();
            }
            text
        }
        Some(ToolKind::Bash) => normalize_shell(&text),
        _ => text,
    };

    let lines: Vec<&str> = text.lines().map(str::trim_end).collect();
    lines.join("\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_complete_reminder_blocks() {
        let text = "before <system-reminder>noise</system-reminder> after";
        assert_eq!(strip_annotation_blocks(text), "before  after");
    }

    #[test]
    fn strips_truncated_reminder_at_end() {
        let text = "output\n<system-reminder>cut off mid";
        assert_eq!(strip_annotation_blocks(text), "output");
    }

    #[test]
    fn glob_output_drops_infrastructure_and_sorts() {
        let text = "/work/src/b.rs\n/work/.venv/lib/x.py\n/work/src/a.rs\n/work/.claude/plugin";
        assert_eq!(
            normalize(text, Some(ToolKind::Glob)),
            "/work/src/a.rs\n/work/src/b.rs"
        );
    }

    #[test]
    fn edit_confirmation_collapses_to_token() {
        let text = "The file /work/main.rs has been updated successfully.";
        assert_eq!(normalize(text, Some(ToolKind::Edit)), EDIT_SUCCESS_TOKEN);
    }

    #[test]
    fn write_confirmation_collapses_to_token() {
        let text = "File created successfully at: /work/notes.txt";
        assert_eq!(normalize(text, Some(ToolKind::Write)), WRITE_SUCCESS_TOKEN);
    }

    #[test]
    fn shell_output_drops_compile_progress() {
        let text = "   Compiling serde v1.0.200\nwarning: unused import\n    Building [==> ] 12/40";
        assert_eq!(normalize(text, Some(ToolKind::Bash)), "warning: unused import");
    }

    #[test]
    fn shell_timestamps_and_elapsed_become_tokens() {
        let text = "Finished `test` profile in 0.25s at 2025-03-01T12:00:00Z";
        assert_eq!(
            normalize(text, Some(ToolKind::Bash)),
            "Finished `test` profile in <elapsed> at <timestamp>"
        );
    }

    #[test]
    fn calendar_dates_become_tokens() {
        let text = "Date:   Mon Mar  3 09:15:00 2025 +0100";
        assert_eq!(normalize(text, Some(ToolKind::Bash)), "Date:   <timestamp>");
    }

    #[test]
    fn artifact_hashes_keep_stable_prefix() {
        let text = "Running unittests (target/debug/deps/mycrate-d587f5abb46bb6a2)";
        assert_eq!(
            normalize(text, Some(ToolKind::Bash)),
            "Running unittests (target/debug/deps/mycrate-<hash>)"
        );
    }

    #[test]
    fn doctest_line_numbers_become_tokens() {
        let text = "test src/lib.rs - parse (line 42) ... ok";
        assert_eq!(
            normalize(text, Some(ToolKind::Bash)),
            "test src/lib.rs - parse (line <n>) ... ok"
        );
    }

    #[test]
    fn test_result_lines_are_sorted_in_place() {
        let text = "running 3 tests\ntest z_last ... ok\ntest a_first ... ok\ntest m_mid ... FAILED\ndone";
        assert_eq!(
            normalize(text, Some(ToolKind::Bash)),
            "running 3 tests\ntest a_first ... ok\ntest m_mid ... FAILED\ntest z_last ... ok\ndone"
        );
    }

    #[test]
    fn trailing_whitespace_and_blank_edges_are_stripped() {
        let text = "\n\nline one   \nline two\t\n\n";
        assert_eq!(normalize(text, None), "line one\nline two");
    }
}
