//! Run reporting
//!
//! One status line per case as it finishes, then a summary grouping
//! failures by category with a remediation hint per group.

use console::style;

use rewind_core::error::ErrorCategory;
use rewind_core::suite::TestResult;

/// Grouping order for the failure report
const CATEGORY_ORDER: &[ErrorCategory] = &[
    ErrorCategory::NoTranscript,
    ErrorCategory::ExecutionError,
    ErrorCategory::DirectoryMismatch,
    ErrorCategory::PostConditionFailed,
    ErrorCategory::RecordingFailed,
    ErrorCategory::Other,
];

fn remediation(category: ErrorCategory) -> &'static str {
    match category {
        ErrorCategory::NoTranscript => {
            "record the case first: rewind --mode record <case>"
        }
        ErrorCategory::ExecutionError => {
            "a recorded tool call no longer executes; re-record if the behavior change is intended"
        }
        ErrorCategory::DirectoryMismatch => {
            "inspect the listed files; refresh with --save-snapshot if the new state is correct"
        }
        ErrorCategory::PostConditionFailed => {
            "run post-condition.py by hand in a replayed workspace to debug"
        }
        ErrorCategory::RecordingFailed => {
            "check that the subject agent is on PATH and story.md has a '## Prompt' block"
        }
        ErrorCategory::Other => "re-run with RUST_LOG=debug for details",
    }
}

pub fn print_case_line(result: &TestResult, verbose: bool) {
    if result.passed {
        println!("{} {}", style("PASS").green().bold(), result.name);
        if verbose && !result.post_condition_output.is_empty() {
            for line in result.post_condition_output.lines() {
                println!("       {line}");
            }
        }
    } else {
        println!("{} {}", style("FAIL").red().bold(), result.name);
    }
}

/// Print the summary and failure groups. Returns whether every case passed.
pub fn print_report(results: &[TestResult]) -> bool {
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.len() - passed;

    println!();
    println!(
        "{} {} passed, {} failed",
        style("Summary:").bold(),
        style(passed).green(),
        if failed > 0 {
            style(failed).red()
        } else {
            style(failed).dim()
        },
    );

    for &category in CATEGORY_ORDER {
        let group: Vec<&TestResult> = results
            .iter()
            .filter(|r| !r.passed && r.error_category == Some(category))
            .collect();
        if group.is_empty() {
            continue;
        }

        println!();
        println!("{}", style(category.label()).red().bold());
        for result in group {
            println!("  {}", style(&result.name).bold());
            if let Some(error) = &result.error {
                for line in error.lines() {
                    println!("    {line}");
                }
            }
        }
        println!("  {} {}", style("hint:").yellow(), remediation(category));
    }

    failed == 0
}
