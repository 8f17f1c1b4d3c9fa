//! The conflict cascade.
//!
//! [`ConflictCascade`] walks a fixed sequence of stages:
//!
//! 1. Filter the change set for dependency manifests and lockfiles.
//! 2. Tree check, dry-run check, manifest check, dedup check.
//! 3. Resolve with the first record any probe produced, or nothing.
//!
//! A probe that cannot run (missing binary, timeout, unreadable manifest)
//! is logged and skipped. Nothing in here fails the commit.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::config::ProbeConfig;
use crate::errors::CoreError;
use crate::manager::PackageManager;
use crate::models::{ChangeSet, ConflictRecord};
use crate::probes::{inspect_tree, probe_dedup, probe_dry_run, probe_manifest};
use crate::process::CommandRunner;

// ---------------------------------------------------------------------------
// Stage machine
// ---------------------------------------------------------------------------

/// Stages of one cascade run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CascadeStage {
    NotStarted,
    Filtering,
    TreeCheck,
    DryRunCheck,
    ManifestCheck,
    DedupCheck,
    Resolved,
}

impl CascadeStage {
    /// The stage that follows `self` when the current one found nothing.
    pub fn next(self) -> Self {
        match self {
            Self::NotStarted => Self::Filtering,
            Self::Filtering => Self::TreeCheck,
            Self::TreeCheck => Self::DryRunCheck,
            Self::DryRunCheck => Self::ManifestCheck,
            Self::ManifestCheck => Self::DedupCheck,
            Self::DedupCheck | Self::Resolved => Self::Resolved,
        }
    }

    /// Whether this stage runs a probe.
    pub fn is_probe(self) -> bool {
        matches!(
            self,
            Self::TreeCheck | Self::DryRunCheck | Self::ManifestCheck | Self::DedupCheck
        )
    }
}

impl std::fmt::Display for CascadeStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not_started"),
            Self::Filtering => write!(f, "filtering"),
            Self::TreeCheck => write!(f, "tree_check"),
            Self::DryRunCheck => write!(f, "dry_run_check"),
            Self::ManifestCheck => write!(f, "manifest_check"),
            Self::DedupCheck => write!(f, "dedup_check"),
            Self::Resolved => write!(f, "resolved"),
        }
    }
}

// ---------------------------------------------------------------------------
// Cascade
// ---------------------------------------------------------------------------

/// Runs the probes against one project in priority order.
pub struct ConflictCascade<R> {
    project_root: PathBuf,
    runner: R,
    probes: ProbeConfig,
}

impl<R: CommandRunner> ConflictCascade<R> {
    pub fn new(project_root: impl Into<PathBuf>, runner: R, probes: ProbeConfig) -> Self {
        Self {
            project_root: project_root.into(),
            runner,
            probes,
        }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// The configured manager, or the one detected from lockfiles.
    pub fn manager(&self) -> PackageManager {
        self.probes
            .manager
            .unwrap_or_else(|| PackageManager::detect(&self.project_root))
    }

    fn is_enabled(&self, stage: CascadeStage) -> bool {
        match stage {
            CascadeStage::TreeCheck => self.probes.tree,
            CascadeStage::DryRunCheck => self.probes.dry_run,
            CascadeStage::ManifestCheck => self.probes.manifest,
            CascadeStage::DedupCheck => self.probes.dedup,
            _ => false,
        }
    }

    /// Run the cascade for one commit attempt.
    ///
    /// Returns `None` when no manifest or lockfile changed, or when every
    /// probe came back clean.
    #[instrument(skip_all, fields(root = %self.project_root.display()))]
    pub async fn detect(&self, changes: &ChangeSet) -> Option<ConflictRecord> {
        let mut stage = CascadeStage::NotStarted.next();
        debug!(%stage, changed = changes.paths().len(), "filtering change set");

        let Some(source_file) = changes.first_manifest() else {
            info!("no dependency manifest changed; skipping probes");
            return None;
        };

        let manager = self.manager();
        info!(
            %manager,
            source_file,
            manifests = changes.manifest_paths().len(),
            "running conflict cascade"
        );

        stage = stage.next();
        while stage.is_probe() {
            if self.is_enabled(stage) {
                debug!(%stage, "entering stage");
                if let Some(record) = self.run_stage(stage, manager, source_file).await {
                    info!(
                        %stage,
                        kind = %record.kind,
                        problems = record.problems.len(),
                        "conflict detected"
                    );
                    return Some(record);
                }
            } else {
                debug!(%stage, "stage disabled");
            }
            stage = stage.next();
        }

        info!(%stage, "no dependency conflicts detected");
        None
    }

    async fn run_stage(
        &self,
        stage: CascadeStage,
        manager: PackageManager,
        source_file: &str,
    ) -> Option<ConflictRecord> {
        let root = self.project_root.as_path();
        let result: Result<Option<ConflictRecord>, CoreError> = match stage {
            CascadeStage::TreeCheck => inspect_tree(&self.runner, manager, root, source_file)
                .await
                .map_err(Into::into),
            CascadeStage::DryRunCheck => probe_dry_run(&self.runner, manager, root, source_file)
                .await
                .map_err(Into::into),
            CascadeStage::ManifestCheck => probe_manifest(root, source_file).map_err(Into::into),
            CascadeStage::DedupCheck => {
                probe_dedup(&self.runner, manager, root, &self.probes.cache_dir)
                    .await
                    .map_err(Into::into)
            }
            CascadeStage::NotStarted | CascadeStage::Filtering | CascadeStage::Resolved => Ok(None),
        };

        match result {
            Ok(record) => record,
            Err(e) => {
                warn!(%stage, error = %e, "probe failed; continuing with next stage");
                None
            }
        }
    }
}
