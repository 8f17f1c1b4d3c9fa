//! Dry-run install probe: ask the manager what an install would do and
//! pick out peer-dependency and resolution warnings.

use std::path::Path;
use std::sync::LazyLock;

use regex_lite::Regex;
use serde_json::Value;
use tracing::{debug, info, instrument};

use super::tree::value_text;
use crate::errors::ProbeError;
use crate::manager::PackageManager;
use crate::models::{ConflictKind, ConflictRecord};
use crate::process::CommandRunner;

/// npm's error code for an unresolvable dependency graph.
pub const RESOLUTION_CONFLICT_CODE: &str = "ERESOLVE";

static WARNING_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)ERESOLVE|peer dep missing|conflict|invalid|required|unmet")
        .expect("warning line pattern is valid")
});

/// Run the manager's install in check mode. stderr is ignored.
#[instrument(skip_all, fields(manager = %manager, root = %project_root.display()))]
pub async fn probe_dry_run<R: CommandRunner>(
    runner: &R,
    manager: PackageManager,
    project_root: &Path,
    source_file: &str,
) -> Result<Option<ConflictRecord>, ProbeError> {
    let output = runner
        .run(manager.binary(), manager.dry_run_args(), project_root)
        .await?;
    Ok(inspect_output(&output.stdout, source_file))
}

/// Structured warnings when stdout is JSON, otherwise a line scan.
pub fn inspect_output(stdout: &str, source_file: &str) -> Option<ConflictRecord> {
    match serde_json::from_str::<Value>(stdout) {
        Ok(parsed) => structured_warnings(&parsed, source_file),
        Err(e) => {
            debug!(error = %e, "dry-run output is not JSON; scanning lines");
            scan_lines(stdout, source_file)
        }
    }
}

fn structured_warnings(parsed: &Value, source_file: &str) -> Option<ConflictRecord> {
    let warnings = parsed.get("warnings").and_then(Value::as_array)?;
    let matched: Vec<String> = warnings
        .iter()
        .filter(|w| is_conflict_warning(w))
        .map(warning_text)
        .collect();
    if matched.is_empty() {
        debug!(total = warnings.len(), "no conflict-related dry-run warnings");
        return None;
    }
    info!(count = matched.len(), "peer dependency warnings from dry-run");
    Some(ConflictRecord::new(
        ConflictKind::PeerDependencyConflict,
        matched,
        source_file,
    ))
}

fn is_conflict_warning(warning: &Value) -> bool {
    if warning.get("code").and_then(Value::as_str) == Some(RESOLUTION_CONFLICT_CODE) {
        return true;
    }
    let text = match warning {
        Value::String(s) => Some(s.as_str()),
        other => other.get("message").and_then(Value::as_str),
    };
    text.map(|t| {
        let lower = t.to_lowercase();
        lower.contains("peer dep missing") || lower.contains("conflict")
    })
    .unwrap_or(false)
}

fn warning_text(warning: &Value) -> String {
    match warning.get("message").and_then(Value::as_str) {
        Some(message) => message.to_string(),
        None => value_text(warning),
    }
}

fn scan_lines(stdout: &str, source_file: &str) -> Option<ConflictRecord> {
    let lines: Vec<String> = stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && WARNING_LINE.is_match(l))
        .map(str::to_string)
        .collect();
    if lines.is_empty() {
        return None;
    }
    info!(count = lines.len(), "dependency warnings in dry-run text");
    Some(ConflictRecord::new(
        ConflictKind::DependencyWarning,
        lines,
        source_file,
    ))
}
