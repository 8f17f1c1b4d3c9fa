//! Human and JSON rendering of a check result.

use serde_json::{json, Value};

use depwatch_core::{AdvisoryResult, ConflictRecord};

use crate::style;

/// Problems listed before the remainder is summarized.
pub const MAX_RENDERED_PROBLEMS: usize = 10;

pub fn conflict_report(record: &ConflictRecord) -> String {
    let mut lines = vec![
        style::error(&format!(
            "{} {}",
            style::header(record.kind.title()),
            style::kind_tag(record.kind)
        )),
        style::dim(&format!("  source: {}", record.source_file)),
        String::new(),
    ];

    for problem in record.problems.iter().take(MAX_RENDERED_PROBLEMS) {
        lines.push(format!("  • {}", problem));
    }
    if record.problems.len() > MAX_RENDERED_PROBLEMS {
        lines.push(style::dim(&format!(
            "  ...and {} more",
            record.problems.len() - MAX_RENDERED_PROBLEMS
        )));
    }
    lines.join("\n")
}

pub fn advisory_report(advice: &AdvisoryResult) -> String {
    let mut lines = vec![style::header("Suggested fix")];
    if !advice.explanation.is_empty() {
        lines.push(format!("  {}", advice.explanation));
    }
    if !advice.steps.is_empty() {
        lines.push(String::new());
        for (i, step) in advice.steps.iter().enumerate() {
            lines.push(format!("  {} {}", style::step_number(i + 1), step));
        }
    }
    lines.join("\n")
}

/// `{ "conflict": <record|null>, "advisory": <result|null> }`
pub fn json_report(conflict: Option<&ConflictRecord>, advisory: Option<&AdvisoryResult>) -> Value {
    json!({
        "conflict": conflict,
        "advisory": advisory,
    })
}
