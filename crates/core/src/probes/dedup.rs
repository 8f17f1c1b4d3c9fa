//! Dedup probe: run a deduplication dry-run over the installed tree and
//! collect the `name@version` tokens it mentions.

use std::path::Path;
use std::sync::LazyLock;

use regex_lite::Regex;
use tracing::{debug, info, instrument};

use crate::errors::ProbeError;
use crate::manager::PackageManager;
use crate::models::{ConflictKind, ConflictRecord};
use crate::process::CommandRunner;

/// Reported when the output mentions duplicates but names no package.
pub const DEDUP_FALLBACK_MESSAGE: &str =
    "Duplicate packages detected in the installed tree; run a dedupe to consolidate them";

/// Package names use alphanumerics, `@`, `/` and `-`; versions are plain
/// `major.minor.patch`.
static PACKAGE_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9@/-]+@[0-9]+\.[0-9]+\.[0-9]+").expect("package token pattern is valid")
});

/// Run the manager's dedupe dry-run, only when `cache_dir` exists under
/// `project_root`. The record's source is the cache directory name.
#[instrument(skip_all, fields(manager = %manager, root = %project_root.display(), cache_dir = %cache_dir))]
pub async fn probe_dedup<R: CommandRunner>(
    runner: &R,
    manager: PackageManager,
    project_root: &Path,
    cache_dir: &str,
) -> Result<Option<ConflictRecord>, ProbeError> {
    if !project_root.join(cache_dir).is_dir() {
        debug!("no dependency cache directory; skipping dedup check");
        return Ok(None);
    }
    let output = runner
        .run(manager.binary(), manager.dedupe_args(), project_root)
        .await?;
    Ok(inspect_output(&output.combined(), cache_dir))
}

/// Classify the combined stdout/stderr of a dedupe dry-run.
pub fn inspect_output(blob: &str, cache_dir: &str) -> Option<ConflictRecord> {
    if !blob.contains("duplicate") && !blob.contains("deduped") {
        return None;
    }
    let mut tokens: Vec<String> = PACKAGE_TOKEN
        .find_iter(blob)
        .map(|m| m.as_str().to_string())
        .collect();
    if tokens.is_empty() {
        debug!("dedup output mentions duplicates without package tokens");
        tokens.push(DEDUP_FALLBACK_MESSAGE.to_string());
    }
    info!(count = tokens.len(), "duplicate packages reported");
    Some(ConflictRecord::new(
        ConflictKind::DuplicatePackages,
        tokens,
        cache_dir,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::fake::ScriptedRunner;
    use crate::process::CommandOutput;

    #[test]
    fn test_tokens_extracted_in_order() {
        let blob = "\
found 3 duplicate packages
lodash@4.17.21 deduped
@babel/core@7.24.0 deduped
react-is@16.13.1
";
        let record = inspect_output(blob, "node_modules").unwrap();
        assert_eq!(record.kind, ConflictKind::DuplicatePackages);
        assert_eq!(
            record.problems,
            vec!["lodash@4.17.21", "@babel/core@7.24.0", "react-is@16.13.1"]
        );
        assert_eq!(record.source_file, "node_modules");
    }

    #[test]
    fn test_repeated_tokens_are_kept() {
        let blob = "deduped: ms@2.1.3\ndeduped: ms@2.1.3\n";
        let record = inspect_output(blob, "node_modules").unwrap();
        assert_eq!(record.problems, vec!["ms@2.1.3", "ms@2.1.3"]);
    }

    #[test]
    fn test_trigger_without_tokens_uses_fallback() {
        let record = inspect_output("some packages could be deduped", "node_modules").unwrap();
        assert_eq!(record.problems, vec![DEDUP_FALLBACK_MESSAGE]);
    }

    #[test]
    fn test_no_trigger_no_record() {
        assert!(inspect_output("up to date in 1s\nlodash@4.17.21", "node_modules").is_none());
        assert!(inspect_output("", "node_modules").is_none());
    }

    #[tokio::test]
    async fn test_skipped_without_cache_dir() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new();
        let result = probe_dedup(&runner, PackageManager::Npm, dir.path(), "node_modules")
            .await
            .unwrap();
        assert!(result.is_none());
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_reads_stderr_too() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("node_modules")).unwrap();
        let runner = ScriptedRunner::new().output(
            "npm dedupe --dry-run",
            CommandOutput {
                exit_code: Some(1),
                stdout: String::new(),
                stderr: "npm warn duplicate semver@7.6.0".into(),
            },
        );
        let record = probe_dedup(&runner, PackageManager::Npm, dir.path(), "node_modules")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.problems, vec!["semver@7.6.0"]);
        assert_eq!(runner.calls(), vec!["npm dedupe --dry-run"]);
    }
}
