//! Bitbucket webhook payload parser.
//!
//! This module parses raw webhook JSON payloads into a typed [`CascadeEvent`].
//! Parsing happens once, up front; handlers never walk untyped JSON.
//!
//! # Parsing Strategy
//!
//! 1. The trigger kind is determined from the `X-Event-Key` header
//! 2. Every payload must identify its repository
//! 3. `pullrequest:fulfilled` payloads must also carry the pull request with
//!    source and destination branch names
//! 4. Other payloads carry the pull request only if Bitbucket included one
//! 5. Unknown fields are ignored; malformed payloads return `Err` with details

use serde::Deserialize;
use thiserror::Error;

use crate::types::{AccountUuid, BranchName, CommitHash, PrId, RepoId};

use super::events::{CascadeEvent, PullRequestInfo, TriggerKind};

/// Error type for webhook parsing failures.
#[derive(Debug, Error)]
pub enum ParseError {
    /// JSON deserialization failed (includes missing required fields).
    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// The payload does not identify its repository.
    #[error("missing repository information in payload")]
    MissingRepository,

    /// A merge event without its pull request.
    #[error("{0} payload has no pullrequest object")]
    MissingPullRequest(TriggerKind),

    /// Field has invalid value (e.g., empty branch name).
    #[error("invalid field value for {field}: {value:?}")]
    InvalidField { field: &'static str, value: String },
}

/// Parses a webhook payload into a typed event.
///
/// # Arguments
///
/// * `event_key` - The value of the `X-Event-Key` header
/// * `payload` - The raw JSON payload bytes
///
/// # Examples
///
/// ```
/// use cascade_merge::webhooks::{parse_event, TriggerKind};
///
/// let payload = br#"{
///     "pullrequest": {
///         "id": 42,
///         "source": { "branch": { "name": "feature/login" } },
///         "destination": { "branch": { "name": "release/1.0" } },
///         "author": { "uuid": "{123}" },
///         "merge_commit": { "hash": "a1b2c3d4e5f6" }
///     },
///     "repository": { "full_name": "acme/widgets", "name": "widgets" }
/// }"#;
///
/// let event = parse_event("pullrequest:fulfilled", payload).unwrap();
/// assert_eq!(event.trigger, TriggerKind::PullRequestMerged);
/// assert_eq!(event.repo.to_string(), "acme/widgets");
/// ```
pub fn parse_event(event_key: &str, payload: &[u8]) -> Result<CascadeEvent, ParseError> {
    let trigger = TriggerKind::from_event_key(event_key);
    let raw: RawPayload = serde_json::from_slice(payload)?;

    let repo = raw.repository.into_repo_id()?;

    let pull_request = match raw.pullrequest {
        Some(pr) => Some(pr.into_info()?),
        None if trigger.is_merge() => return Err(ParseError::MissingPullRequest(trigger)),
        None => None,
    };

    Ok(CascadeEvent {
        trigger,
        repo,
        pull_request,
    })
}

// ============================================================================
// Raw payload structures for deserialization
//
// These match Bitbucket Cloud's webhook JSON. Only the fields the bot uses are
// declared; serde ignores the rest.
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawPayload {
    repository: RawRepository,
    pullrequest: Option<RawPullRequest>,
}

#[derive(Debug, Deserialize)]
struct RawRepository {
    /// `workspace/repo_slug`.
    full_name: Option<String>,
    name: Option<String>,
    owner: Option<RawAccount>,
}

#[derive(Debug, Deserialize)]
struct RawAccount {
    uuid: Option<String>,
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawPullRequest {
    id: Option<u64>,
    source: RawEndpoint,
    destination: RawEndpoint,
    author: Option<RawAccount>,
    #[serde(default)]
    reviewers: Vec<RawAccount>,
    merge_commit: Option<RawCommit>,
}

#[derive(Debug, Deserialize)]
struct RawEndpoint {
    branch: RawBranch,
}

#[derive(Debug, Deserialize)]
struct RawBranch {
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawCommit {
    hash: String,
}

impl RawRepository {
    /// Prefers `full_name`; older payloads only carry `owner.username` and `name`.
    fn into_repo_id(self) -> Result<RepoId, ParseError> {
        if let Some((owner, slug)) = self
            .full_name
            .as_deref()
            .and_then(|full| full.split_once('/'))
            .filter(|(owner, slug)| !owner.is_empty() && !slug.is_empty())
        {
            return Ok(RepoId::new(owner, slug));
        }

        let owner = self
            .owner
            .and_then(|o| o.username)
            .filter(|u| !u.is_empty())
            .ok_or(ParseError::MissingRepository)?;
        let name = self
            .name
            .filter(|n| !n.is_empty())
            .ok_or(ParseError::MissingRepository)?;

        Ok(RepoId::new(owner, name))
    }
}

impl RawPullRequest {
    fn into_info(self) -> Result<PullRequestInfo, ParseError> {
        let source = non_empty_branch("pullrequest.source.branch.name", self.source.branch.name)?;
        let destination = non_empty_branch(
            "pullrequest.destination.branch.name",
            self.destination.branch.name,
        )?;

        Ok(PullRequestInfo {
            id: self.id.map(PrId),
            source,
            destination,
            author: self.author.and_then(|a| a.uuid).map(AccountUuid::new),
            reviewers: self
                .reviewers
                .into_iter()
                .filter_map(|r| r.uuid)
                .map(AccountUuid::new)
                .collect(),
            merge_commit: self
                .merge_commit
                .map(|c| c.hash)
                .filter(|h| !h.is_empty())
                .map(CommitHash::new),
        })
    }
}

fn non_empty_branch(field: &'static str, name: String) -> Result<BranchName, ParseError> {
    if name.trim().is_empty() {
        return Err(ParseError::InvalidField { field, value: name });
    }
    Ok(BranchName::new(name))
}
