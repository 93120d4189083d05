//! Event dispatch: routing webhooks to cascade handlers.
//!
//! The dispatcher is a classifier, not a state machine. Each event is routed by
//! its trigger kind alone:
//!
//! ```text
//! ┌─────────────┐     ┌──────────┐  pullrequest:fulfilled   ┌───────────────────────────┐
//! │   axum      │ ──► │ dispatch │ ───────────────────────► │ on_merge: resolve target, │
//! │  (accepts)  │     │ by kind  │                          │ ensure forward PR         │
//! └─────────────┘     └──────────┘                          └───────────────────────────┘
//!       │                  │         anything else          ┌───────────────────────────┐
//!       │ returns 200      └──────────────────────────────► │ try_merge: approve and    │
//!       ▼                                                   │ merge cascade PRs         │
//!                                                           └───────────────────────────┘
//! ```
//!
//! Every event runs on its own spawned task. The webhook caller is answered
//! before the task starts; outcomes are only visible in logs and on Bitbucket.

mod handlers;

use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{Instrument, error, info, info_span};

use crate::cascade::{CascadeResolver, CascadeTarget, EnsureOutcome, PullRequestOrchestrator};
use crate::effects::{Platform, PlatformResponse};
use crate::types::{BranchName, PrId};
use crate::webhooks::{CascadeEvent, ParseError, parse_event};

/// Boxed platform error, so dispatch errors don't depend on the platform type.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while handling an event.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The payload could not be parsed.
    #[error("malformed payload: {0}")]
    Parse(#[from] ParseError),

    /// Listing the merged branch's siblings failed.
    #[error("listing branches matching {filter:?} failed: {source}")]
    ListBranches {
        filter: String,
        #[source]
        source: BoxError,
    },

    /// The interpreter answered a branch listing with the wrong response.
    #[error("unexpected response to list_branches: {0:?}")]
    UnexpectedResponse(PlatformResponse),

    /// Creating, approving or merging a cascade pull request failed.
    #[error("{0}")]
    Orchestrator(#[source] BoxError),
}

/// Result type for dispatch operations.
pub type Result<T> = std::result::Result<T, DispatchError>;

/// What handling an event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A merge into a branch outside the release prefix; nothing to cascade.
    NotReleaseBranch { destination: BranchName },

    /// A merge into a release branch; the forward pull request now exists.
    ForwardPullRequest {
        target: CascadeTarget,
        outcome: EnsureOutcome,
    },

    /// A mergeability re-check; lists the cascade pull requests merged.
    AutoMerge { merged: Vec<PrId> },
}

/// Configuration for the dispatcher.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Only merges into branches starting with this prefix are cascaded.
    pub release_branch_prefix: String,

    /// Cascade target when the branching model names no development branch.
    pub development_branch: BranchName,

    /// Number of approver identities besides the primary one.
    pub approver_count: usize,
}

impl DispatcherConfig {
    /// Creates a new dispatcher configuration without approver identities.
    pub fn new(
        release_branch_prefix: impl Into<String>,
        development_branch: impl Into<BranchName>,
    ) -> Self {
        DispatcherConfig {
            release_branch_prefix: release_branch_prefix.into(),
            development_branch: development_branch.into(),
            approver_count: 0,
        }
    }

    /// Sets the number of approver identities.
    pub fn with_approver_count(mut self, approver_count: usize) -> Self {
        self.approver_count = approver_count;
        self
    }
}

/// Routes events to the cascade handlers.
///
/// Cheap to clone; clones share the platform connection and the
/// pull request creation locks.
#[derive(Clone)]
pub struct EventDispatcher<P: Platform> {
    inner: Arc<DispatcherInner<P>>,
}

struct DispatcherInner<P: Platform> {
    platform: P,
    release_branch_prefix: String,
    resolver: CascadeResolver,
    orchestrator: PullRequestOrchestrator,
}

impl<P: Platform> EventDispatcher<P> {
    /// Creates a new dispatcher.
    pub fn new(platform: P, config: DispatcherConfig) -> Self {
        EventDispatcher {
            inner: Arc::new(DispatcherInner {
                platform,
                release_branch_prefix: config.release_branch_prefix,
                resolver: CascadeResolver::new(config.development_branch),
                orchestrator: PullRequestOrchestrator::new(config.approver_count),
            }),
        }
    }

    /// Parses a raw webhook and routes it.
    pub async fn handle_event(&self, event_key: &str, payload: &[u8]) -> Result<DispatchOutcome> {
        let event = parse_event(event_key, payload)?;
        self.dispatch(event).await
    }

    /// Routes an already-parsed event by its trigger kind.
    pub async fn dispatch(&self, event: CascadeEvent) -> Result<DispatchOutcome> {
        match (&event.trigger, &event.pull_request) {
            (trigger, Some(pr)) if trigger.is_merge() => self.on_merge(&event.repo, pr).await,
            _ => self.try_merge(&event.repo).await,
        }
    }

    /// Handles an event on a detached task.
    ///
    /// Failures are logged; they never reach the caller or other tasks.
    pub fn spawn(
        &self,
        event_key: String,
        payload: impl AsRef<[u8]> + Send + 'static,
    ) -> JoinHandle<()> {
        let dispatcher = self.clone();
        let span = info_span!("cascade_event", event_key = %event_key);

        tokio::spawn(
            async move {
                match dispatcher.handle_event(&event_key, payload.as_ref()).await {
                    Ok(outcome) => info!(outcome = ?outcome, "Event handled"),
                    Err(e) => error!(error = %e, "Event handling failed"),
                }
            }
            .instrument(span),
        )
    }
}
