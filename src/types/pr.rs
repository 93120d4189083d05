//! Cascade pull request types.
//!
//! A cascade pull request is recognised purely by the marker at the start of its
//! title; Bitbucket is the only record of which pull requests the bot owns.

use serde::{Deserialize, Serialize};

use super::ids::{BranchName, CommitHash, PrId};

/// Title/description marker identifying bot-managed pull requests.
pub const CASCADE_MARKER: &str = "#AutomaticCascade";

/// A pull request as returned by platform queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub id: PrId,
    pub title: String,
    pub source: BranchName,
    pub destination: BranchName,
}

/// Title and description for a new forward pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadeTemplate {
    pub title: String,
    pub description: String,
}

impl CascadeTemplate {
    /// Renders the fixed template for `source -> destination`.
    ///
    /// The merge commit that triggered the cascade, when known, is recorded in
    /// the description so the chain can be traced back.
    pub fn render(
        source: &BranchName,
        destination: &BranchName,
        merge_commit: Option<&CommitHash>,
    ) -> Self {
        let title = format!("{} {} -> {}", CASCADE_MARKER, source, destination);
        let mut description = format!(
            "{} {} -> {}, this branch will automatically be merged on successful build result+approval",
            CASCADE_MARKER, source, destination
        );
        if let Some(commit) = merge_commit {
            description.push_str(&format!("\n\nTriggered by merge commit {}.", commit));
        }
        CascadeTemplate { title, description }
    }
}
