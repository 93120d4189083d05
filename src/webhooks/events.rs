//! Bitbucket webhook event types.
//!
//! The bot only distinguishes two kinds of notification:
//!
//! - `pullrequest:fulfilled` - a pull request was merged; start or advance a cascade
//! - anything else (build status updates, approvals, ...) - re-check whether
//!   open cascade pull requests can now be merged

use serde::{Deserialize, Serialize};

use crate::types::{AccountUuid, BranchName, CommitHash, PrId, RepoId};

/// `X-Event-Key` value sent when a pull request is merged.
pub const PULL_REQUEST_FULFILLED: &str = "pullrequest:fulfilled";

/// Classification of an inbound notification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    /// A pull request was merged.
    PullRequestMerged,
    /// Any other event key, kept for logging.
    Other(String),
}

impl TriggerKind {
    /// Classifies an `X-Event-Key` header value. Unknown keys are `Other`.
    pub fn from_event_key(key: &str) -> Self {
        if key == PULL_REQUEST_FULFILLED {
            TriggerKind::PullRequestMerged
        } else {
            TriggerKind::Other(key.to_string())
        }
    }

    pub fn is_merge(&self) -> bool {
        matches!(self, TriggerKind::PullRequestMerged)
    }
}

impl std::fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TriggerKind::PullRequestMerged => write!(f, "{}", PULL_REQUEST_FULFILLED),
            TriggerKind::Other(key) => write!(f, "{}", key),
        }
    }
}

/// A parsed webhook notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadeEvent {
    /// How the event was classified.
    pub trigger: TriggerKind,

    /// The repository the event belongs to.
    pub repo: RepoId,

    /// The pull request the event is about.
    ///
    /// Always present for [`TriggerKind::PullRequestMerged`]; build status and
    /// other repository-level events may not carry one.
    pub pull_request: Option<PullRequestInfo>,
}

/// Pull request details carried by an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestInfo {
    /// The pull request ID, when the payload includes it.
    pub id: Option<PrId>,

    /// The branch that was merged.
    pub source: BranchName,

    /// The branch merged into.
    pub destination: BranchName,

    /// The pull request author.
    pub author: Option<AccountUuid>,

    /// Reviewers of the pull request.
    pub reviewers: Vec<AccountUuid>,

    /// The merge commit, only present once merged.
    pub merge_commit: Option<CommitHash>,
}

impl PullRequestInfo {
    /// Accounts to request as reviewers on the forward pull request: the
    /// original author first, then the original reviewers.
    pub fn forward_reviewers(&self) -> Vec<AccountUuid> {
        self.author
            .iter()
            .chain(self.reviewers.iter())
            .cloned()
            .collect()
    }
}
