//! Package manager selection and per-manager command lines.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::probes::tree::{NpmTreeFormat, PnpmTreeFormat, TreeFormat, YarnTreeFormat};

pub const NPM_LOCKFILE: &str = "package-lock.json";
pub const YARN_LOCKFILE: &str = "yarn.lock";
pub const PNPM_LOCKFILE: &str = "pnpm-lock.yaml";

/// The package manager whose CLI the probes invoke.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PackageManager {
    #[default]
    Npm,
    Pnpm,
    Yarn,
}

impl PackageManager {
    /// Pick the active manager from the lockfiles in `project_root`.
    ///
    /// pnpm wins over yarn, yarn wins over npm; npm is the fallback even
    /// when no lockfile exists at all.
    pub fn detect(project_root: &Path) -> Self {
        let manager = if project_root.join(PNPM_LOCKFILE).exists() {
            Self::Pnpm
        } else if project_root.join(YARN_LOCKFILE).exists() {
            Self::Yarn
        } else {
            Self::Npm
        };
        debug!(root = %project_root.display(), %manager, "selected package manager");
        manager
    }

    pub fn binary(self) -> &'static str {
        match self {
            Self::Npm => "npm",
            Self::Pnpm => "pnpm",
            Self::Yarn => "yarn",
        }
    }

    /// Arguments for the machine-readable dependency listing.
    pub fn list_args(self) -> &'static [&'static str] {
        match self {
            Self::Npm => &["ls", "--json", "--all"],
            Self::Pnpm => &["ls", "--json", "--depth", "Infinity"],
            Self::Yarn => &["list", "--json"],
        }
    }

    /// Arguments for a non-mutating install check.
    pub fn dry_run_args(self) -> &'static [&'static str] {
        match self {
            Self::Npm => &["install", "--dry-run", "--json"],
            Self::Pnpm => &[
                "install",
                "--frozen-lockfile",
                "--lockfile-only",
                "--reporter",
                "ndjson",
            ],
            Self::Yarn => &["check", "--json"],
        }
    }

    /// Arguments for a deduplication dry-run.
    pub fn dedupe_args(self) -> &'static [&'static str] {
        match self {
            Self::Npm => &["dedupe", "--dry-run"],
            Self::Pnpm => &["dedupe", "--check"],
            Self::Yarn => &["dedupe", "--check"],
        }
    }

    /// The parser for this manager's list output.
    pub fn tree_format(self) -> &'static dyn TreeFormat {
        match self {
            Self::Npm => &NpmTreeFormat,
            Self::Pnpm => &PnpmTreeFormat,
            Self::Yarn => &YarnTreeFormat,
        }
    }
}

impl std::fmt::Display for PackageManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.binary())
    }
}

impl std::str::FromStr for PackageManager {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "npm" => Ok(Self::Npm),
            "pnpm" => Ok(Self::Pnpm),
            "yarn" => Ok(Self::Yarn),
            other => Err(format!("unknown package manager: {} (expected npm, pnpm or yarn)", other)),
        }
    }
}
