//! Static advice used when no language model is configured or the call
//! failed.

use crate::models::{AdvisoryResult, ConflictKind};

struct Advice {
    explanation: &'static str,
    steps: &'static [&'static str],
}

fn advice_for(kind: ConflictKind) -> Advice {
    match kind {
        ConflictKind::NpmDependencyConflict => Advice {
            explanation: "The package manager reports that the installed dependency tree does \
                not satisfy the ranges declared in package.json.",
            steps: &[
                "Reinstall from the lockfile to bring the tree back in line with the manifest.",
                "If the problem names a specific package, align its declared range with the \
                 version your other dependencies require.",
                "Regenerate the lockfile and commit it together with package.json.",
            ],
        },
        ConflictKind::InvalidDependencies => Advice {
            explanation: "Some installed packages are marked invalid: their installed version \
                falls outside the range that depends on them.",
            steps: &[
                "Remove the dependency cache directory and reinstall.",
                "Update the listed packages to versions inside the required ranges.",
                "Commit the updated lockfile.",
            ],
        },
        ConflictKind::PeerDependencyConflict => Advice {
            explanation: "A package expects a peer dependency at a version your project does \
                not provide, so the resolver cannot build a consistent tree.",
            steps: &[
                "Install the peer dependency at a version inside the range the warning names.",
                "Upgrade the package that declares the peer requirement to a release that \
                 accepts your current version.",
                "As a last resort, relax peer resolution in the package manager settings and \
                 verify the application still works.",
            ],
        },
        ConflictKind::DependencyWarning => Advice {
            explanation: "A dry-run install printed warnings about missing, invalid or \
                conflicting requirements.",
            steps: &[
                "Run the install yourself and read the full warning output.",
                "Add any missing required packages to package.json.",
                "Resolve conflicting ranges, then regenerate the lockfile.",
            ],
        },
        ConflictKind::VersionConflict => Advice {
            explanation: "The same package is declared in more than one dependency section of \
                package.json with different versions.",
            steps: &[
                "Decide which version the project actually needs.",
                "Keep the package in a single dependency section, or use the same range in \
                 every section.",
                "Reinstall so the lockfile records one version.",
            ],
        },
        ConflictKind::DuplicatePackages => Advice {
            explanation: "Several copies of the same package are installed where one would \
                satisfy every dependent.",
            steps: &[
                "Run the package manager's dedupe command.",
                "Reinstall and commit the resulting lockfile.",
            ],
        },
    }
}

/// Generic advice for a conflict kind.
pub fn fallback_advice(kind: ConflictKind) -> AdvisoryResult {
    let advice = advice_for(kind);
    AdvisoryResult {
        explanation: advice.explanation.to_string(),
        steps: advice.steps.iter().map(|s| s.to_string()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_kind_has_advice() {
        for kind in ConflictKind::ALL {
            let advice = fallback_advice(kind);
            assert!(!advice.explanation.is_empty(), "{kind} has no explanation");
            assert!(
                (2..=4).contains(&advice.steps.len()),
                "{kind} has {} steps",
                advice.steps.len()
            );
        }
    }

    #[test]
    fn test_line_continuations_collapse_whitespace() {
        let advice = fallback_advice(ConflictKind::VersionConflict);
        assert!(!advice.explanation.contains("  "));
        assert!(advice.steps.iter().all(|s| !s.contains('\n')));
    }
}
