//! Package manifest access and the version-map check.
//!
//! The manifest is read as untyped JSON: every field the checks look at is
//! optional, and an absent section simply contributes nothing.

pub mod version_map;

use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::errors::ManifestError;
use crate::manager::{NPM_LOCKFILE, PNPM_LOCKFILE, YARN_LOCKFILE};

pub use version_map::{VersionEntry, VersionMap};

pub const MANIFEST_FILE: &str = "package.json";

/// File names whose change makes the cascade run.
pub const DEPENDENCY_FILES: [&str; 4] = [MANIFEST_FILE, NPM_LOCKFILE, YARN_LOCKFILE, PNPM_LOCKFILE];

/// The dependency sections of a manifest, in the order they are scanned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ManifestSection {
    Dependencies,
    DevDependencies,
    PeerDependencies,
    OptionalDependencies,
}

impl ManifestSection {
    pub const ALL: [ManifestSection; 4] = [
        Self::Dependencies,
        Self::DevDependencies,
        Self::PeerDependencies,
        Self::OptionalDependencies,
    ];

    /// The JSON key of this section.
    pub fn key(self) -> &'static str {
        match self {
            Self::Dependencies => "dependencies",
            Self::DevDependencies => "devDependencies",
            Self::PeerDependencies => "peerDependencies",
            Self::OptionalDependencies => "optionalDependencies",
        }
    }
}

impl std::fmt::Display for ManifestSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Whether `path` names a manifest or a lockfile, judged by file name only.
pub fn is_dependency_manifest(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| DEPENDENCY_FILES.contains(&n))
        .unwrap_or(false)
}

/// Read and parse `package.json` from `project_root`.
pub fn load_manifest(project_root: &Path) -> Result<Value, ManifestError> {
    let path = project_root.join(MANIFEST_FILE);
    if !path.exists() {
        return Err(ManifestError::NotFound(path.display().to_string()));
    }
    let contents = std::fs::read_to_string(&path)?;
    let manifest = serde_json::from_str(&contents).map_err(|e| ManifestError::ParseError {
        path: path.display().to_string(),
        detail: e.to_string(),
    })?;
    debug!(path = %path.display(), bytes = contents.len(), "manifest loaded");
    Ok(manifest)
}
