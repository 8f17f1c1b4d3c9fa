//! Domain model types used throughout depwatch.
//!
//! These types bridge the commit workflow (which supplies a [`ChangeSet`]),
//! the conflict cascade (which emits at most one [`ConflictRecord`]) and the
//! advisory step (which turns a record into an [`AdvisoryResult`]).

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::manifest::is_dependency_manifest;

// ---------------------------------------------------------------------------
// Change set
// ---------------------------------------------------------------------------

/// Ordered, immutable list of file paths known to have changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    paths: Vec<String>,
}

impl ChangeSet {
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Manifest and lockfile paths, in change-set order.
    pub fn manifest_paths(&self) -> Vec<&str> {
        self.paths
            .iter()
            .map(String::as_str)
            .filter(|p| is_dependency_manifest(Path::new(p)))
            .collect()
    }

    /// The first manifest-like path, used as a record's `source_file`.
    pub fn first_manifest(&self) -> Option<&str> {
        self.paths
            .iter()
            .map(String::as_str)
            .find(|p| is_dependency_manifest(Path::new(p)))
    }
}

// ---------------------------------------------------------------------------
// Conflict record
// ---------------------------------------------------------------------------

/// Which probe produced a record, and therefore what its problems mean.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// The manager's list command reported top-level problems.
    NpmDependencyConflict,
    /// Nodes in the resolved tree are marked invalid or carry problems.
    InvalidDependencies,
    /// Structured dry-run warnings about peers or resolution conflicts.
    PeerDependencyConflict,
    /// Suspicious lines scraped from unstructured dry-run output.
    DependencyWarning,
    /// The manifest declares one package at several versions.
    VersionConflict,
    /// Dedup dry-run found duplicated installs.
    DuplicatePackages,
}

impl ConflictKind {
    pub const ALL: [ConflictKind; 6] = [
        Self::NpmDependencyConflict,
        Self::InvalidDependencies,
        Self::PeerDependencyConflict,
        Self::DependencyWarning,
        Self::VersionConflict,
        Self::DuplicatePackages,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NpmDependencyConflict => "npm_dependency_conflict",
            Self::InvalidDependencies => "invalid_dependencies",
            Self::PeerDependencyConflict => "peer_dependency_conflict",
            Self::DependencyWarning => "dependency_warning",
            Self::VersionConflict => "version_conflict",
            Self::DuplicatePackages => "duplicate_packages",
        }
    }

    /// Short human-readable heading.
    pub fn title(self) -> &'static str {
        match self {
            Self::NpmDependencyConflict => "Dependency conflicts reported by the package manager",
            Self::InvalidDependencies => "Invalid dependencies in the installed tree",
            Self::PeerDependencyConflict => "Peer dependency conflicts",
            Self::DependencyWarning => "Dependency warnings",
            Self::VersionConflict => "Package declared with multiple versions",
            Self::DuplicatePackages => "Duplicate packages installed",
        }
    }
}

impl std::fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ConflictKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown conflict kind: {}", s))
    }
}

/// The single conflict report produced by one cascade run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConflictRecord {
    pub kind: ConflictKind,
    /// Human-readable problems in detection order, not deduplicated.
    pub problems: Vec<String>,
    /// The manifest or lockfile implicated (or the cache directory for dedup).
    pub source_file: String,
}

impl ConflictRecord {
    pub fn new(kind: ConflictKind, problems: Vec<String>, source_file: impl Into<String>) -> Self {
        Self {
            kind,
            problems,
            source_file: source_file.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Advisory
// ---------------------------------------------------------------------------

/// Explanation plus ordered remediation steps. Displayed once, never stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdvisoryResult {
    pub explanation: String,
    pub steps: Vec<String>,
}
