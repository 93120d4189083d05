//! Shared test utilities: an in-memory platform and arbitrary generators for
//! property-based testing.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use proptest::prelude::*;
use thiserror::Error;

use crate::effects::{Platform, PlatformEffect, PlatformInterpreter, PlatformResponse};
use crate::types::{AccountUuid, BranchName, CommitHash, PrId, PullRequest, RepoId};

pub fn arb_version() -> impl Strategy<Value = String> {
    prop::collection::vec("[0-9]{1,2}(-(alpha|beta|rc[0-9]))?", 1..4)
        .prop_map(|components| components.join("."))
}

pub fn arb_release_branch() -> impl Strategy<Value = BranchName> {
    (prop_oneof![Just("release/"), Just("release/line/")], arb_version())
        .prop_map(|(prefix, version)| BranchName::new(format!("{}{}", prefix, version)))
}

pub fn branches(names: &[&str]) -> Vec<BranchName> {
    names.iter().map(|n| BranchName::from(*n)).collect()
}

/// Error returned by [`MockPlatform`] for scripted failures.
#[derive(Debug, Clone, Error)]
#[error("mock platform error: {0}")]
pub struct MockError(pub String);

/// A pull request creation as seen by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedRequest {
    pub source: BranchName,
    pub destination: BranchName,
    pub title: String,
    pub description: String,
    pub reviewers: Vec<AccountUuid>,
}

#[derive(Debug, Default)]
struct MockState {
    branches: Vec<BranchName>,
    development_branch: Option<BranchName>,
    fail_development_lookup: bool,
    fail_branch_listing: bool,
    fail_pr_queries: bool,
    failing_approvals: HashSet<PrId>,
    failing_merges: HashSet<PrId>,
    latency: Option<Duration>,
    open: Vec<PullRequest>,
    created: Vec<CreatedRequest>,
    effects: Vec<PlatformEffect>,
    repos: Vec<RepoId>,
    next_id: u64,
}

/// An in-memory hosting platform.
///
/// Pull requests created through it become visible to later queries, and
/// merged pull requests stop being open, so idempotency and stop-on-failure
/// can be observed end to end. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockPlatform {
    state: Arc<Mutex<MockState>>,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub fn with_branches(self, names: &[&str]) -> Self {
        self.state().branches = branches(names);
        self
    }

    pub fn with_development_branch(self, name: Option<&str>) -> Self {
        self.state().development_branch = name.map(BranchName::from);
        self
    }

    pub fn with_open_pull_request(self, title: &str, source: &str, destination: &str) -> Self {
        {
            let mut state = self.state();
            let id = state.allocate_id();
            state.open.push(PullRequest {
                id,
                title: title.to_string(),
                source: BranchName::from(source),
                destination: BranchName::from(destination),
            });
        }
        self
    }

    pub fn with_latency(self, latency: Duration) -> Self {
        self.state().latency = Some(latency);
        self
    }

    pub fn fail_development_branch_lookup(self) -> Self {
        self.state().fail_development_lookup = true;
        self
    }

    pub fn fail_branch_listing(self) -> Self {
        self.state().fail_branch_listing = true;
        self
    }

    pub fn fail_pull_request_queries(self) -> Self {
        self.state().fail_pr_queries = true;
        self
    }

    pub fn fail_approval_of(self, pr: PrId) -> Self {
        self.state().failing_approvals.insert(pr);
        self
    }

    pub fn fail_merge_of(self, pr: PrId) -> Self {
        self.state().failing_merges.insert(pr);
        self
    }

    /// Every effect interpreted so far, in order.
    pub fn effects(&self) -> Vec<PlatformEffect> {
        self.state().effects.clone()
    }

    pub fn open_pull_requests(&self) -> Vec<PullRequest> {
        self.state().open.clone()
    }

    pub fn created_requests(&self) -> Vec<CreatedRequest> {
        self.state().created.clone()
    }

    /// Repositories interpreters were requested for.
    pub fn repos(&self) -> Vec<RepoId> {
        self.state().repos.clone()
    }
}

impl MockState {
    fn allocate_id(&mut self) -> PrId {
        self.next_id += 1;
        PrId(self.next_id)
    }

    fn apply(&mut self, effect: PlatformEffect) -> Result<PlatformResponse, MockError> {
        match effect {
            PlatformEffect::ListBranches { name_prefix } => {
                if self.fail_branch_listing {
                    return Err(MockError("branch listing unavailable".to_string()));
                }
                Ok(PlatformResponse::Branches(
                    self.branches
                        .iter()
                        .filter(|b| b.is_direct_child_of(&name_prefix))
                        .cloned()
                        .collect(),
                ))
            }
            PlatformEffect::GetDevelopmentBranch => {
                if self.fail_development_lookup {
                    return Err(MockError("branching model unavailable".to_string()));
                }
                Ok(PlatformResponse::DevelopmentBranch(
                    self.development_branch.clone(),
                ))
            }
            PlatformEffect::FindOpenPullRequest {
                source,
                destination,
            } => {
                if self.fail_pr_queries {
                    return Err(MockError("pull request query failed".to_string()));
                }
                Ok(PlatformResponse::PullRequest(
                    self.open
                        .iter()
                        .find(|pr| pr.source == source && pr.destination == destination)
                        .cloned(),
                ))
            }
            PlatformEffect::ListOpenPullRequestsByTitle { marker } => {
                if self.fail_pr_queries {
                    return Err(MockError("pull request query failed".to_string()));
                }
                Ok(PlatformResponse::PullRequests(
                    self.open
                        .iter()
                        .filter(|pr| pr.title.contains(&marker))
                        .cloned()
                        .collect(),
                ))
            }
            PlatformEffect::CreatePullRequest {
                source,
                destination,
                title,
                description,
                reviewers,
            } => {
                let pr = PullRequest {
                    id: self.allocate_id(),
                    title: title.clone(),
                    source: source.clone(),
                    destination: destination.clone(),
                };
                self.open.push(pr.clone());
                self.created.push(CreatedRequest {
                    source,
                    destination,
                    title,
                    description,
                    reviewers,
                });
                Ok(PlatformResponse::Created(pr))
            }
            PlatformEffect::ApprovePullRequest { pr, identity } => {
                if self.failing_approvals.contains(&pr) {
                    return Err(MockError(format!(
                        "approval of {} as {} rejected",
                        pr, identity
                    )));
                }
                Ok(PlatformResponse::Approved)
            }
            PlatformEffect::MergePullRequest { pr, .. } => {
                if self.failing_merges.contains(&pr) {
                    return Err(MockError(format!("merge of {} rejected", pr)));
                }
                self.open.retain(|open| open.id != pr);
                Ok(PlatformResponse::Merged {
                    merge_commit: Some(CommitHash::new(format!("{:012x}", pr.0))),
                })
            }
        }
    }
}

impl PlatformInterpreter for MockPlatform {
    type Error = MockError;

    async fn interpret(&self, effect: PlatformEffect) -> Result<PlatformResponse, Self::Error> {
        let latency = self.state().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.state();
        state.effects.push(effect.clone());
        state.apply(effect)
    }
}

impl Platform for MockPlatform {
    type Interpreter = MockPlatform;

    fn for_repo(&self, repo: &RepoId) -> Self::Interpreter {
        self.state().repos.push(repo.clone());
        self.clone()
    }
}
