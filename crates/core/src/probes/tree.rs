//! Tree inspection: parse the manager's dependency listing and collect
//! reported problems and invalid nodes.
//!
//! Each manager prints its tree in a different JSON shape, so parsing sits
//! behind [`TreeFormat`]. All field access is optional: a missing key is an
//! empty list, never an error.

use std::path::Path;

use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

use crate::errors::ProbeError;
use crate::manager::PackageManager;
use crate::models::{ConflictKind, ConflictRecord};
use crate::process::CommandRunner;

/// Manager-specific reading of `ls`/`list` output.
pub trait TreeFormat: Send + Sync {
    /// Parse raw stdout. `None` when the text is not in this format.
    fn parse(&self, output: &str) -> Option<Value> {
        serde_json::from_str(output).ok()
    }

    /// Problems the manager reports for the project as a whole.
    fn extract_problems(&self, root: &Value) -> Vec<String>;

    /// `name@version` tokens for invalid nodes, plus per-node problems,
    /// in depth-first order.
    fn extract_invalid(&self, root: &Value) -> Vec<String>;
}

/// `npm ls --json`: one object with `problems` and a nested `dependencies` map.
#[derive(Debug, Clone, Copy)]
pub struct NpmTreeFormat;

/// `pnpm ls --json`: an array of project roots, each with dependency maps.
#[derive(Debug, Clone, Copy)]
pub struct PnpmTreeFormat;

/// `yarn list --json`: newline-delimited events; `tree` events hold nodes
/// with `children`, `error` events hold problems.
#[derive(Debug, Clone, Copy)]
pub struct YarnTreeFormat;

impl TreeFormat for NpmTreeFormat {
    fn extract_problems(&self, root: &Value) -> Vec<String> {
        problem_strings(root.get("problems"))
    }

    fn extract_invalid(&self, root: &Value) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(deps) = root.get("dependencies").and_then(Value::as_object) {
            walk_nodes(deps, &mut out);
        }
        out
    }
}

const PNPM_SECTIONS: [&str; 3] = ["dependencies", "devDependencies", "optionalDependencies"];

impl TreeFormat for PnpmTreeFormat {
    fn extract_problems(&self, root: &Value) -> Vec<String> {
        project_roots(root)
            .flat_map(|project| problem_strings(project.get("problems")))
            .collect()
    }

    fn extract_invalid(&self, root: &Value) -> Vec<String> {
        let mut out = Vec::new();
        for project in project_roots(root) {
            for section in PNPM_SECTIONS {
                if let Some(deps) = project.get(section).and_then(Value::as_object) {
                    walk_nodes(deps, &mut out);
                }
            }
        }
        out
    }
}

impl TreeFormat for YarnTreeFormat {
    fn parse(&self, output: &str) -> Option<Value> {
        let events: Vec<Value> = output
            .lines()
            .filter(|l| !l.trim().is_empty())
            .filter_map(|l| serde_json::from_str(l).ok())
            .collect();
        if events.is_empty() {
            return None;
        }
        Some(Value::Array(events))
    }

    fn extract_problems(&self, root: &Value) -> Vec<String> {
        yarn_events(root, "error")
            .filter_map(|event| event.get("data"))
            .map(value_text)
            .collect()
    }

    fn extract_invalid(&self, root: &Value) -> Vec<String> {
        let mut out = Vec::new();
        for event in yarn_events(root, "tree") {
            if let Some(trees) = event.pointer("/data/trees").and_then(Value::as_array) {
                walk_yarn_nodes(trees, &mut out);
            }
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Probe
// ---------------------------------------------------------------------------

/// Run the manager's list command and inspect its tree.
#[instrument(skip_all, fields(manager = %manager, root = %project_root.display()))]
pub async fn inspect_tree<R: CommandRunner>(
    runner: &R,
    manager: PackageManager,
    project_root: &Path,
    source_file: &str,
) -> Result<Option<ConflictRecord>, ProbeError> {
    let output = runner
        .run(manager.binary(), manager.list_args(), project_root)
        .await?;
    Ok(inspect_output(manager.tree_format(), &output.stdout, source_file))
}

/// Classify captured list output. Top-level problems take precedence over
/// the node walk; unparseable output yields nothing.
pub fn inspect_output(
    format: &dyn TreeFormat,
    output: &str,
    source_file: &str,
) -> Option<ConflictRecord> {
    let Some(root) = format.parse(output) else {
        warn!(bytes = output.len(), "dependency listing is not valid JSON; skipping tree check");
        return None;
    };

    let problems = format.extract_problems(&root);
    if !problems.is_empty() {
        info!(count = problems.len(), "manager reported dependency problems");
        return Some(ConflictRecord::new(
            ConflictKind::NpmDependencyConflict,
            problems,
            source_file,
        ));
    }

    let invalid = format.extract_invalid(&root);
    if !invalid.is_empty() {
        info!(count = invalid.len(), "invalid dependencies in tree");
        return Some(ConflictRecord::new(
            ConflictKind::InvalidDependencies,
            invalid,
            source_file,
        ));
    }

    debug!("dependency tree is clean");
    None
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Depth-first walk of an npm-style `{ name: node }` map.
fn walk_nodes(deps: &Map<String, Value>, out: &mut Vec<String>) {
    for (name, node) in deps {
        if is_invalid(node) {
            let version = node
                .get("version")
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            out.push(format!("{}@{}", name, version));
        }
        out.extend(problem_strings(node.get("problems")));
        if let Some(children) = node.get("dependencies").and_then(Value::as_object) {
            walk_nodes(children, out);
        }
    }
}

/// Depth-first walk of yarn's `[{ name: "pkg@1.0.0", children: [...] }]`.
fn walk_yarn_nodes(nodes: &[Value], out: &mut Vec<String>) {
    for node in nodes {
        if is_invalid(node) {
            if let Some(name) = node.get("name").and_then(Value::as_str) {
                out.push(name.to_string());
            }
        }
        out.extend(problem_strings(node.get("problems")));
        if let Some(children) = node.get("children").and_then(Value::as_array) {
            walk_yarn_nodes(children, out);
        }
    }
}

/// npm 6 marks `invalid: true`; npm 7+ writes a reason string instead.
fn is_invalid(node: &Value) -> bool {
    match node.get("invalid") {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => !s.is_empty(),
        _ => false,
    }
}

fn problem_strings(problems: Option<&Value>) -> Vec<String> {
    problems
        .and_then(Value::as_array)
        .map(|items| items.iter().map(value_text).collect())
        .unwrap_or_default()
}

/// Strings verbatim, anything else as compact JSON.
pub(crate) fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn project_roots(root: &Value) -> Box<dyn Iterator<Item = &Value> + '_> {
    match root {
        Value::Array(items) => Box::new(items.iter()),
        Value::Object(_) => Box::new(std::iter::once(root)),
        _ => Box::new(std::iter::empty()),
    }
}

fn yarn_events<'a>(root: &'a Value, kind: &'a str) -> impl Iterator<Item = &'a Value> + 'a {
    root.as_array()
        .into_iter()
        .flatten()
        .filter(move |event| event.get("type").and_then(Value::as_str) == Some(kind))
}
