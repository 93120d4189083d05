//! Bitbucket API effect types.
//!
//! These types describe hosting-platform operations as data, without executing
//! them. The Bitbucket interpreter executes them against the REST API; tests
//! execute them against an in-memory mock.

use serde::{Deserialize, Serialize};

use crate::types::{AccountUuid, BranchName, CommitHash, Identity, PrId, PullRequest};

/// A platform effect.
///
/// Effects are repo-scoped: the interpreter is obtained for a `RepoId`, so
/// effects don't include it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlatformEffect {
    // ─── Branch Queries ───────────────────────────────────────────────────────
    /// List branches directly under `name_prefix`.
    ///
    /// Branches in nested directories (`release/line/1.0` for `release/`) are
    /// excluded; they belong to another release line.
    ListBranches { name_prefix: String },

    /// Look up the development branch from the repository's branching model.
    GetDevelopmentBranch,

    // ─── PR Queries ───────────────────────────────────────────────────────────
    /// Find an open PR with exactly this source and destination.
    FindOpenPullRequest {
        source: BranchName,
        destination: BranchName,
    },

    /// List open PRs whose title contains `marker`.
    ListOpenPullRequestsByTitle { marker: String },

    // ─── PR Mutations ─────────────────────────────────────────────────────────
    /// Open a PR. The source branch is never closed on merge.
    CreatePullRequest {
        source: BranchName,
        destination: BranchName,
        title: String,
        description: String,
        reviewers: Vec<AccountUuid>,
    },

    /// Approve a PR as the given identity.
    ApprovePullRequest { pr: PrId, identity: Identity },

    /// Merge a PR as the given identity.
    MergePullRequest { pr: PrId, identity: Identity },
}

impl PlatformEffect {
    /// Short operation name for log fields.
    pub fn name(&self) -> &'static str {
        match self {
            PlatformEffect::ListBranches { .. } => "list_branches",
            PlatformEffect::GetDevelopmentBranch => "get_development_branch",
            PlatformEffect::FindOpenPullRequest { .. } => "find_open_pull_request",
            PlatformEffect::ListOpenPullRequestsByTitle { .. } => "list_open_pull_requests",
            PlatformEffect::CreatePullRequest { .. } => "create_pull_request",
            PlatformEffect::ApprovePullRequest { .. } => "approve_pull_request",
            PlatformEffect::MergePullRequest { .. } => "merge_pull_request",
        }
    }
}

// ─── Response Types ───────────────────────────────────────────────────────────

/// Response from a platform effect.
///
/// Each variant corresponds to the response from a particular effect type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum PlatformResponse {
    /// Response to `ListBranches`.
    Branches(Vec<BranchName>),

    /// Response to `GetDevelopmentBranch`.
    ///
    /// `None` when the repository has no branching model or the model names
    /// no development branch.
    DevelopmentBranch(Option<BranchName>),

    /// Response to `FindOpenPullRequest`.
    PullRequest(Option<PullRequest>),

    /// Response to `ListOpenPullRequestsByTitle`.
    PullRequests(Vec<PullRequest>),

    /// Response to `CreatePullRequest`.
    Created(PullRequest),

    /// Response to `ApprovePullRequest`.
    Approved,

    /// Response to `MergePullRequest`.
    Merged { merge_commit: Option<CommitHash> },
}
