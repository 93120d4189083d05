//! Cascade pull request lifecycle.
//!
//! Two operations, both safe to repeat for the same platform state:
//!
//! - [`PullRequestOrchestrator::ensure_forward_pull_request`] opens the
//!   `source -> destination` pull request unless one is already open.
//! - [`PullRequestOrchestrator::approve_and_merge`] approves every open
//!   cascade pull request with each configured identity and merges it.
//!
//! Neither operation retries. A rejected approval or merge (typically because
//! the build has not passed yet) stops the batch; the next webhook for the
//! repository tries again.

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::effects::{PlatformEffect, PlatformInterpreter, PlatformResponse};
use crate::types::{
    AccountUuid, BranchName, CASCADE_MARKER, CascadeTemplate, CommitHash, Identity, PrId,
    PullRequest, RepoId,
};

use super::locks::KeyedLocks;

/// Errors from cascade pull request operations.
#[derive(Debug, Error)]
pub enum OrchestratorError<E: std::error::Error + 'static> {
    /// A query or creation call failed.
    #[error("{operation} failed: {source}")]
    Platform {
        operation: &'static str,
        #[source]
        source: E,
    },

    /// An approval was rejected.
    #[error("approving PR {pr} as {identity} failed: {source}")]
    Approve {
        pr: PrId,
        identity: Identity,
        #[source]
        source: E,
    },

    /// A merge was rejected.
    #[error("merging PR {pr} failed: {source}")]
    Merge {
        pr: PrId,
        #[source]
        source: E,
    },

    /// The interpreter answered with the wrong response variant.
    #[error("unexpected response to {operation}: {response:?}")]
    UnexpectedResponse {
        operation: &'static str,
        response: PlatformResponse,
    },
}

/// Result of [`PullRequestOrchestrator::ensure_forward_pull_request`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnsureOutcome {
    /// An open pull request for the pair already existed.
    AlreadyOpen(PullRequest),
    /// A new pull request was opened.
    Created(PullRequest),
}

impl EnsureOutcome {
    pub fn pull_request(&self) -> &PullRequest {
        match self {
            EnsureOutcome::AlreadyOpen(pr) | EnsureOutcome::Created(pr) => pr,
        }
    }
}

/// Lock key for the check-then-create sequence.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ForwardKey {
    repo: RepoId,
    source: BranchName,
    destination: BranchName,
}

/// Drives cascade pull requests through create, approve and merge.
#[derive(Debug, Clone)]
pub struct PullRequestOrchestrator {
    /// Identities that approve each pull request, primary first.
    approval_order: Vec<Identity>,
    locks: KeyedLocks<ForwardKey>,
}

impl PullRequestOrchestrator {
    /// Creates an orchestrator approving with the primary identity and
    /// `approver_count` additional approver identities.
    pub fn new(approver_count: usize) -> Self {
        PullRequestOrchestrator {
            approval_order: Identity::approval_order(approver_count),
            locks: KeyedLocks::new(),
        }
    }

    pub fn approval_order(&self) -> &[Identity] {
        &self.approval_order
    }

    /// Opens `source -> destination` unless an open pull request for that
    /// exact pair already exists.
    ///
    /// Concurrent calls for the same repository and pair are serialised, so
    /// two merge events racing each other produce a single pull request.
    pub async fn ensure_forward_pull_request<I: PlatformInterpreter>(
        &self,
        platform: &I,
        repo: &RepoId,
        source: &BranchName,
        destination: &BranchName,
        reviewers: &[AccountUuid],
        merge_commit: Option<&CommitHash>,
    ) -> Result<EnsureOutcome, OrchestratorError<I::Error>> {
        let _guard = self
            .locks
            .lock(ForwardKey {
                repo: repo.clone(),
                source: source.clone(),
                destination: destination.clone(),
            })
            .await;

        let existing = expect_response(
            platform,
            PlatformEffect::FindOpenPullRequest {
                source: source.clone(),
                destination: destination.clone(),
            },
            |response| match response {
                PlatformResponse::PullRequest(pr) => Ok(pr),
                other => Err(other),
            },
        )
        .await?;

        if let Some(pr) = existing {
            info!(
                repo = %repo,
                pr = %pr.id,
                source = %source,
                destination = %destination,
                "Skipping creation, pull request exists"
            );
            return Ok(EnsureOutcome::AlreadyOpen(pr));
        }

        let template = CascadeTemplate::render(source, destination, merge_commit);
        let created = expect_response(
            platform,
            PlatformEffect::CreatePullRequest {
                source: source.clone(),
                destination: destination.clone(),
                title: template.title,
                description: template.description,
                reviewers: dedup_reviewers(reviewers),
            },
            |response| match response {
                PlatformResponse::Created(pr) => Ok(pr),
                other => Err(other),
            },
        )
        .await?;

        info!(
            repo = %repo,
            pr = %created.id,
            source = %source,
            destination = %destination,
            "Created cascade pull request"
        );
        Ok(EnsureOutcome::Created(created))
    }

    /// Approves and merges every open cascade pull request, in listing order.
    ///
    /// Returns the IDs merged. The first rejected approval or merge is
    /// returned as an error and the remaining pull requests are not touched.
    pub async fn approve_and_merge<I: PlatformInterpreter>(
        &self,
        platform: &I,
        repo: &RepoId,
    ) -> Result<Vec<PrId>, OrchestratorError<I::Error>> {
        let candidates = expect_response(
            platform,
            PlatformEffect::ListOpenPullRequestsByTitle {
                marker: CASCADE_MARKER.to_string(),
            },
            |response| match response {
                PlatformResponse::PullRequests(prs) => Ok(prs),
                other => Err(other),
            },
        )
        .await?;

        if candidates.is_empty() {
            debug!(repo = %repo, "No open cascade pull requests");
            return Ok(Vec::new());
        }

        let mut merged = Vec::with_capacity(candidates.len());
        for pr in candidates {
            info!(
                repo = %repo,
                pr = %pr.id,
                title = %pr.title,
                "Trying to auto merge"
            );

            if let Err(e) = self.approve_and_merge_one(platform, &pr).await {
                warn!(
                    repo = %repo,
                    pr = %pr.id,
                    error = %e,
                    "Stopping auto merge"
                );
                return Err(e);
            }

            merged.push(pr.id);
        }

        Ok(merged)
    }

    async fn approve_and_merge_one<I: PlatformInterpreter>(
        &self,
        platform: &I,
        pr: &PullRequest,
    ) -> Result<(), OrchestratorError<I::Error>> {
        for &identity in &self.approval_order {
            let effect = PlatformEffect::ApprovePullRequest {
                pr: pr.id,
                identity,
            };
            match platform.interpret(effect).await {
                Ok(PlatformResponse::Approved) => {
                    debug!(pr = %pr.id, identity = %identity, "Approved");
                }
                Ok(other) => {
                    return Err(OrchestratorError::UnexpectedResponse {
                        operation: "approve_pull_request",
                        response: other,
                    });
                }
                Err(source) => {
                    return Err(OrchestratorError::Approve {
                        pr: pr.id,
                        identity,
                        source,
                    });
                }
            }
        }

        let effect = PlatformEffect::MergePullRequest {
            pr: pr.id,
            identity: Identity::Primary,
        };
        match platform.interpret(effect).await {
            Ok(PlatformResponse::Merged { merge_commit }) => {
                info!(
                    pr = %pr.id,
                    source = %pr.source,
                    destination = %pr.destination,
                    merge_commit = merge_commit.as_ref().map(|c| c.short()).unwrap_or("unknown"),
                    "Merged cascade pull request"
                );
                Ok(())
            }
            Ok(other) => Err(OrchestratorError::UnexpectedResponse {
                operation: "merge_pull_request",
                response: other,
            }),
            Err(source) => Err(OrchestratorError::Merge { pr: pr.id, source }),
        }
    }
}

/// Runs a query effect and extracts the expected response variant.
async fn expect_response<I, T>(
    platform: &I,
    effect: PlatformEffect,
    extract: impl FnOnce(PlatformResponse) -> Result<T, PlatformResponse>,
) -> Result<T, OrchestratorError<I::Error>>
where
    I: PlatformInterpreter,
{
    let operation = effect.name();
    let response = platform
        .interpret(effect)
        .await
        .map_err(|source| OrchestratorError::Platform { operation, source })?;

    extract(response)
        .map_err(|response| OrchestratorError::UnexpectedResponse { operation, response })
}

/// Drops duplicate reviewers, keeping first occurrences.
fn dedup_reviewers(reviewers: &[AccountUuid]) -> Vec<AccountUuid> {
    let mut unique: Vec<AccountUuid> = Vec::with_capacity(reviewers.len());
    for reviewer in reviewers {
        if !unique.contains(reviewer) {
            unique.push(reviewer.clone());
        }
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockPlatform;
    use std::sync::Arc;

    fn b(name: &str) -> BranchName {
        BranchName::from(name)
    }

    fn repo() -> RepoId {
        RepoId::new("acme", "widgets")
    }

    // ─── ensure_forward_pull_request ───

    #[tokio::test]
    async fn creates_when_absent() {
        let platform = MockPlatform::new();
        let orchestrator = PullRequestOrchestrator::new(0);
        let commit = CommitHash::new("abc123def456");

        let outcome = orchestrator
            .ensure_forward_pull_request(
                &platform,
                &repo(),
                &b("release/1.0"),
                &b("release/1.1"),
                &[AccountUuid::new("{author}")],
                Some(&commit),
            )
            .await
            .unwrap();

        let pr = match outcome {
            EnsureOutcome::Created(pr) => pr,
            other => panic!("expected Created, got {:?}", other),
        };
        assert_eq!(pr.title, "#AutomaticCascade release/1.0 -> release/1.1");
        assert_eq!(platform.open_pull_requests().len(), 1);

        let created = platform.created_requests();
        assert_eq!(created.len(), 1);
        assert!(created[0].description.contains("abc123def456"));
        assert_eq!(created[0].reviewers, vec![AccountUuid::new("{author}")]);
    }

    #[tokio::test]
    async fn second_call_is_noop() {
        let platform = MockPlatform::new();
        let orchestrator = PullRequestOrchestrator::new(0);

        for _ in 0..2 {
            orchestrator
                .ensure_forward_pull_request(
                    &platform,
                    &repo(),
                    &b("release/1.0"),
                    &b("release/1.1"),
                    &[],
                    None,
                )
                .await
                .unwrap();
        }

        assert_eq!(platform.open_pull_requests().len(), 1);
        assert_eq!(platform.created_requests().len(), 1);
    }

    #[tokio::test]
    async fn existing_pull_request_is_returned() {
        let platform = MockPlatform::new().with_open_pull_request(
            "Manual forward port",
            "release/1.0",
            "release/1.1",
        );
        let orchestrator = PullRequestOrchestrator::new(0);

        let outcome = orchestrator
            .ensure_forward_pull_request(
                &platform,
                &repo(),
                &b("release/1.0"),
                &b("release/1.1"),
                &[],
                None,
            )
            .await
            .unwrap();

        assert!(matches!(outcome, EnsureOutcome::AlreadyOpen(_)));
        assert_eq!(outcome.pull_request().title, "Manual forward port");
        assert!(platform.created_requests().is_empty());
    }

    #[tokio::test]
    async fn other_pairs_do_not_count_as_existing() {
        let platform = MockPlatform::new().with_open_pull_request(
            "#AutomaticCascade release/1.0 -> develop",
            "release/1.0",
            "develop",
        );
        let orchestrator = PullRequestOrchestrator::new(0);

        let outcome = orchestrator
            .ensure_forward_pull_request(
                &platform,
                &repo(),
                &b("release/1.0"),
                &b("release/1.1"),
                &[],
                None,
            )
            .await
            .unwrap();

        assert!(matches!(outcome, EnsureOutcome::Created(_)));
        assert_eq!(platform.open_pull_requests().len(), 2);
    }

    #[tokio::test]
    async fn concurrent_calls_create_once() {
        let platform = MockPlatform::new().with_latency(std::time::Duration::from_millis(10));
        let orchestrator = Arc::new(PullRequestOrchestrator::new(0));

        let mut tasks = Vec::new();
        for _ in 0..4 {
            let platform = platform.clone();
            let orchestrator = Arc::clone(&orchestrator);
            tasks.push(tokio::spawn(async move {
                orchestrator
                    .ensure_forward_pull_request(
                        &platform,
                        &repo(),
                        &b("release/1.0"),
                        &b("release/1.1"),
                        &[],
                        None,
                    )
                    .await
                    .map(|_| ())
                    .map_err(|e| e.to_string())
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(platform.created_requests().len(), 1);
    }

    #[tokio::test]
    async fn lookup_failure_aborts_creation() {
        let platform = MockPlatform::new().fail_pull_request_queries();
        let orchestrator = PullRequestOrchestrator::new(0);

        let err = orchestrator
            .ensure_forward_pull_request(
                &platform,
                &repo(),
                &b("release/1.0"),
                &b("release/1.1"),
                &[],
                None,
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            OrchestratorError::Platform {
                operation: "find_open_pull_request",
                ..
            }
        ));
        assert!(platform.created_requests().is_empty());
    }

    #[test]
    fn reviewers_are_deduplicated_in_order() {
        let reviewers = vec![
            AccountUuid::new("{a}"),
            AccountUuid::new("{b}"),
            AccountUuid::new("{a}"),
        ];
        assert_eq!(
            dedup_reviewers(&reviewers),
            vec![AccountUuid::new("{a}"), AccountUuid::new("{b}")]
        );
    }

    // ─── approve_and_merge ───

    #[tokio::test]
    async fn approves_with_every_identity_then_merges() {
        let platform = MockPlatform::new().with_open_pull_request(
            "#AutomaticCascade release/1.0 -> release/1.1",
            "release/1.0",
            "release/1.1",
        );
        let orchestrator = PullRequestOrchestrator::new(2);

        let merged = orchestrator
            .approve_and_merge(&platform, &repo())
            .await
            .unwrap();

        let id = merged[0];
        assert_eq!(merged.len(), 1);
        assert_eq!(
            platform.effects(),
            vec![
                PlatformEffect::ListOpenPullRequestsByTitle {
                    marker: CASCADE_MARKER.to_string()
                },
                PlatformEffect::ApprovePullRequest {
                    pr: id,
                    identity: Identity::Primary
                },
                PlatformEffect::ApprovePullRequest {
                    pr: id,
                    identity: Identity::Approver(0)
                },
                PlatformEffect::ApprovePullRequest {
                    pr: id,
                    identity: Identity::Approver(1)
                },
                PlatformEffect::MergePullRequest {
                    pr: id,
                    identity: Identity::Primary
                },
            ]
        );
        assert!(platform.open_pull_requests().is_empty());
    }

    #[tokio::test]
    async fn unmarked_pull_requests_are_ignored() {
        let platform = MockPlatform::new().with_open_pull_request(
            "Feature work",
            "feature/x",
            "release/1.0",
        );
        let orchestrator = PullRequestOrchestrator::new(1);

        let merged = orchestrator
            .approve_and_merge(&platform, &repo())
            .await
            .unwrap();

        assert!(merged.is_empty());
        assert_eq!(platform.open_pull_requests().len(), 1);
    }

    #[tokio::test]
    async fn stops_on_first_failed_approval() {
        let platform = MockPlatform::new()
            .with_open_pull_request("#AutomaticCascade release/1.0 -> release/1.1", "release/1.0", "release/1.1")
            .with_open_pull_request("#AutomaticCascade release/1.1 -> release/1.2", "release/1.1", "release/1.2")
            .with_open_pull_request("#AutomaticCascade release/1.2 -> develop", "release/1.2", "develop");
        let ids: Vec<PrId> = platform.open_pull_requests().iter().map(|pr| pr.id).collect();
        let platform = platform.fail_approval_of(ids[1]);
        let orchestrator = PullRequestOrchestrator::new(1);

        let err = orchestrator
            .approve_and_merge(&platform, &repo())
            .await
            .unwrap_err();

        assert!(matches!(err, OrchestratorError::Approve { pr, .. } if pr == ids[1]));

        let open: Vec<PrId> = platform.open_pull_requests().iter().map(|pr| pr.id).collect();
        assert_eq!(open, vec![ids[1], ids[2]]);

        let touched_third = platform.effects().iter().any(|effect| {
            matches!(
                effect,
                PlatformEffect::ApprovePullRequest { pr, .. }
                    | PlatformEffect::MergePullRequest { pr, .. } if *pr == ids[2]
            )
        });
        assert!(!touched_third, "third pull request must not be attempted");
    }

    #[tokio::test]
    async fn failed_merge_is_surfaced() {
        let platform = MockPlatform::new().with_open_pull_request(
            "#AutomaticCascade release/1.0 -> develop",
            "release/1.0",
            "develop",
        );
        let id = platform.open_pull_requests()[0].id;
        let platform = platform.fail_merge_of(id);
        let orchestrator = PullRequestOrchestrator::new(0);

        let err = orchestrator
            .approve_and_merge(&platform, &repo())
            .await
            .unwrap_err();

        assert!(matches!(err, OrchestratorError::Merge { pr, .. } if pr == id));
        assert_eq!(platform.open_pull_requests().len(), 1);
    }

    #[tokio::test]
    async fn listing_failure_is_surfaced() {
        let platform = MockPlatform::new().fail_pull_request_queries();
        let orchestrator = PullRequestOrchestrator::new(0);

        let err = orchestrator
            .approve_and_merge(&platform, &repo())
            .await
            .unwrap_err();

        assert!(matches!(err, OrchestratorError::Platform { .. }));
    }
}
