//! Next-target resolution for a merged release branch.
//!
//! Given the branch a pull request was merged into and its sibling release
//! branches, the resolver picks the next branch in version order. When the
//! merged branch is the newest release, the cascade ends at the development
//! branch: the one named by the repository's branching model if available,
//! otherwise the configured default.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::effects::{PlatformEffect, PlatformInterpreter, PlatformResponse};
use crate::types::BranchName;

use super::version::compare_branch_versions;

/// Where a development-branch target came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DevelopmentSource {
    /// The repository's branching model on the platform.
    BranchingModel,
    /// The statically configured fallback name.
    Configured,
}

/// The branch a forward pull request should target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CascadeTarget {
    /// The next-higher sibling release branch.
    Release { branch: BranchName },
    /// The end of the cascade.
    Development {
        branch: BranchName,
        source: DevelopmentSource,
    },
}

impl CascadeTarget {
    /// Returns the target branch.
    pub fn branch(&self) -> &BranchName {
        match self {
            CascadeTarget::Release { branch } => branch,
            CascadeTarget::Development { branch, .. } => branch,
        }
    }

    /// Returns true if this target ends the cascade.
    pub fn is_development(&self) -> bool {
        matches!(self, CascadeTarget::Development { .. })
    }
}

/// Returns the first sibling strictly newer than `merged`, in version order.
///
/// Siblings are sorted stably, so among branches with equal versions the one
/// listed first wins. `merged` itself (and anything equal to it) is never
/// returned.
pub fn next_release_branch(merged: &BranchName, siblings: &[BranchName]) -> Option<BranchName> {
    let mut sorted: Vec<&BranchName> = siblings.iter().collect();
    sorted.sort_by(|a, b| compare_branch_versions(a, b));

    sorted
        .into_iter()
        .find(|candidate| compare_branch_versions(merged, candidate).is_lt())
        .cloned()
}

/// Returns the name filter for listing the siblings of `merged`.
///
/// Siblings are the branches in the same directory (`release/vergleiche/1.0`
/// lists `release/vergleiche/`). A branch at the top level has no directory,
/// so the configured release prefix is used instead.
pub fn sibling_filter(merged: &BranchName, release_prefix: &str) -> String {
    merged
        .parent_dir()
        .map(str::to_string)
        .unwrap_or_else(|| release_prefix.to_string())
}

/// Resolves cascade targets.
#[derive(Debug, Clone)]
pub struct CascadeResolver {
    /// Used when the branching model names no development branch.
    default_development_branch: BranchName,
}

impl CascadeResolver {
    pub fn new(default_development_branch: impl Into<BranchName>) -> Self {
        CascadeResolver {
            default_development_branch: default_development_branch.into(),
        }
    }

    pub fn default_development_branch(&self) -> &BranchName {
        &self.default_development_branch
    }

    /// Resolves the next target after `merged`.
    ///
    /// Never fails: running past the newest release is the normal end of a
    /// cascade, and a failed branching-model lookup degrades to the configured
    /// development branch.
    pub async fn resolve<I: PlatformInterpreter>(
        &self,
        platform: &I,
        merged: &BranchName,
        siblings: &[BranchName],
    ) -> CascadeTarget {
        if let Some(branch) = next_release_branch(merged, siblings) {
            return CascadeTarget::Release { branch };
        }

        debug!(merged = %merged, "No newer release branch; targeting development branch");
        self.development_target(platform).await
    }

    async fn development_target<I: PlatformInterpreter>(&self, platform: &I) -> CascadeTarget {
        match platform.interpret(PlatformEffect::GetDevelopmentBranch).await {
            Ok(PlatformResponse::DevelopmentBranch(Some(branch))) if !branch.as_str().is_empty() => {
                return CascadeTarget::Development {
                    branch,
                    source: DevelopmentSource::BranchingModel,
                };
            }
            Ok(PlatformResponse::DevelopmentBranch(_)) => {
                debug!(
                    fallback = %self.default_development_branch,
                    "Branching model names no development branch"
                );
            }
            Ok(other) => {
                warn!(
                    response = ?other,
                    fallback = %self.default_development_branch,
                    "Unexpected response to development branch lookup"
                );
            }
            Err(e) => {
                warn!(
                    error = %e,
                    fallback = %self.default_development_branch,
                    "Development branch lookup failed"
                );
            }
        }

        CascadeTarget::Development {
            branch: self.default_development_branch.clone(),
            source: DevelopmentSource::Configured,
        }
    }
}
