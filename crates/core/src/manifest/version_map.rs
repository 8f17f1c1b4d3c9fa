//! Cross-section version map for a single manifest.
//!
//! A package that is declared in several dependency sections must resolve
//! to one version; when the normalized specifiers differ the manifest is
//! internally inconsistent.

use std::collections::{BTreeSet, HashMap};

use serde_json::Value;
use tracing::debug;

use super::ManifestSection;
use crate::models::{ConflictKind, ConflictRecord};

/// One declaration of a package: where it appeared and at what version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionEntry {
    pub section: ManifestSection,
    /// The specifier with leading range operators removed.
    pub version: String,
}

/// Package name -> declarations, kept in order of first appearance.
#[derive(Debug, Clone, Default)]
pub struct VersionMap {
    packages: Vec<(String, Vec<VersionEntry>)>,
    index: HashMap<String, usize>,
}

impl VersionMap {
    /// Build the map from every dependency section present in `manifest`.
    ///
    /// Non-string specifiers are ignored.
    pub fn from_manifest(manifest: &Value) -> Self {
        let mut map = Self::default();
        for section in ManifestSection::ALL {
            let Some(deps) = manifest.get(section.key()).and_then(Value::as_object) else {
                continue;
            };
            for (name, spec) in deps {
                let Some(spec) = spec.as_str() else {
                    continue;
                };
                map.insert(
                    name,
                    VersionEntry {
                        section,
                        version: normalize_version(spec).to_string(),
                    },
                );
            }
        }
        debug!(packages = map.len(), "built version map");
        map
    }

    pub fn insert(&mut self, package: &str, entry: VersionEntry) {
        match self.index.get(package) {
            Some(&i) => self.packages[i].1.push(entry),
            None => {
                self.index.insert(package.to_string(), self.packages.len());
                self.packages.push((package.to_string(), vec![entry]));
            }
        }
    }

    pub fn get(&self, package: &str) -> Option<&[VersionEntry]> {
        self.index
            .get(package)
            .map(|&i| self.packages[i].1.as_slice())
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// One problem line per package declared at two or more distinct
    /// versions, in order of first appearance.
    pub fn conflicts(&self) -> Vec<String> {
        self.packages
            .iter()
            .filter(|(_, entries)| {
                let distinct: BTreeSet<&str> = entries.iter().map(|e| e.version.as_str()).collect();
                distinct.len() > 1
            })
            .map(|(name, entries)| {
                let listed: Vec<String> = entries
                    .iter()
                    .map(|e| format!("{}: {}", e.section, e.version))
                    .collect();
                format!("{} has multiple versions: {}", name, listed.join(", "))
            })
            .collect()
    }
}

/// Strip leading `^ ~ > = <` operators from a version specifier.
pub fn normalize_version(spec: &str) -> &str {
    spec.trim()
        .trim_start_matches(['^', '~', '>', '=', '<'])
        .trim()
}

/// Run the version-map check over a parsed manifest.
pub fn check_manifest(manifest: &Value, source_file: &str) -> Option<ConflictRecord> {
    let problems = VersionMap::from_manifest(manifest).conflicts();
    if problems.is_empty() {
        return None;
    }
    Some(ConflictRecord::new(
        ConflictKind::VersionConflict,
        problems,
        source_file,
    ))
}
