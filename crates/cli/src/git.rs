//! Change-set discovery through git.

use std::path::Path;

use anyhow::{Context, Result};
use git2::{Repository, Status, StatusOptions};
use tracing::debug;

use depwatch_core::ChangeSet;

/// Paths staged in the index, plus worktree changes when
/// `include_worktree` is set. Paths are relative to the repository root.
pub fn changed_paths(project_root: &Path, include_worktree: bool) -> Result<ChangeSet> {
    let repo = Repository::discover(project_root)
        .with_context(|| format!("not inside a git repository: {}", project_root.display()))?;

    let mut opts = StatusOptions::new();
    opts.include_untracked(include_worktree)
        .recurse_untracked_dirs(include_worktree)
        .include_ignored(false);

    let statuses = repo
        .statuses(Some(&mut opts))
        .context("failed to read git status")?;

    let mut mask = Status::INDEX_NEW
        | Status::INDEX_MODIFIED
        | Status::INDEX_DELETED
        | Status::INDEX_RENAMED
        | Status::INDEX_TYPECHANGE;
    if include_worktree {
        mask |= Status::WT_NEW
            | Status::WT_MODIFIED
            | Status::WT_DELETED
            | Status::WT_RENAMED
            | Status::WT_TYPECHANGE;
    }

    let paths: Vec<String> = statuses
        .iter()
        .filter(|entry| entry.status().intersects(mask))
        .filter_map(|entry| entry.path().map(str::to_string))
        .collect();

    debug!(count = paths.len(), include_worktree, "collected changed paths");
    Ok(ChangeSet::new(paths))
}
