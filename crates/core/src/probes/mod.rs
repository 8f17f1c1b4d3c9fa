//! The independent heuristics the cascade runs, in priority order:
//! tree inspection, dry-run install, manifest version map, dedup.
//!
//! Every probe answers "conflict record or nothing". Probes that shell out
//! return `Err` only when the manager could not be run at all.

pub mod dedup;
pub mod dry_run;
pub mod tree;

use std::path::Path;

use tracing::instrument;

use crate::errors::ManifestError;
use crate::manifest::{load_manifest, version_map};
use crate::models::ConflictRecord;

pub use dedup::probe_dedup;
pub use dry_run::probe_dry_run;
pub use tree::{inspect_tree, NpmTreeFormat, PnpmTreeFormat, TreeFormat, YarnTreeFormat};

/// Cross-reference the manifest's dependency sections.
#[instrument(skip_all, fields(root = %project_root.display()))]
pub fn probe_manifest(
    project_root: &Path,
    source_file: &str,
) -> Result<Option<ConflictRecord>, ManifestError> {
    let manifest = load_manifest(project_root)?;
    Ok(version_map::check_manifest(&manifest, source_file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ConflictKind;

    #[test]
    fn test_probe_manifest_reads_project_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("package.json"),
            r#"{"dependencies":{"left-pad":"^1.0.0"},"devDependencies":{"left-pad":"^2.0.0"}}"#,
        )
        .unwrap();
        let record = probe_manifest(dir.path(), "package.json").unwrap().unwrap();
        assert_eq!(record.kind, ConflictKind::VersionConflict);
    }

    #[test]
    fn test_probe_manifest_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            probe_manifest(dir.path(), "package.json"),
            Err(ManifestError::NotFound(_))
        ));
    }
}
