//! The two event handlers.
//!
//! - `on_merge`: a pull request landed; open the next forward pull request
//! - `try_merge`: something changed; approve and merge what is ready

use tracing::{debug, info};

use crate::cascade::sibling_filter;
use crate::effects::{Platform, PlatformEffect, PlatformInterpreter, PlatformResponse};
use crate::types::{BranchName, RepoId};
use crate::webhooks::PullRequestInfo;

use super::{DispatchError, DispatchOutcome, EventDispatcher, Result};

impl<P: Platform> EventDispatcher<P> {
    pub(super) async fn on_merge(
        &self,
        repo: &RepoId,
        pr: &PullRequestInfo,
    ) -> Result<DispatchOutcome> {
        let inner = &self.inner;

        // Only operate on release branches
        if !pr.destination.starts_with(&inner.release_branch_prefix) {
            debug!(
                repo = %repo,
                destination = %pr.destination,
                prefix = %inner.release_branch_prefix,
                "Merge outside release branches, nothing to cascade"
            );
            return Ok(DispatchOutcome::NotReleaseBranch {
                destination: pr.destination.clone(),
            });
        }

        info!(
            repo = %repo,
            source = %pr.source,
            destination = %pr.destination,
            "Pull request merged"
        );

        let platform = inner.platform.for_repo(repo);
        let filter = sibling_filter(&pr.destination, &inner.release_branch_prefix);
        let siblings = list_branches(&platform, &filter).await?;
        debug!(repo = %repo, targets = ?siblings, "Checking for internal targets");

        let target = inner
            .resolver
            .resolve(&platform, &pr.destination, &siblings)
            .await;
        info!(repo = %repo, next_target = %target.branch(), "Next target");

        let outcome = inner
            .orchestrator
            .ensure_forward_pull_request(
                &platform,
                repo,
                &pr.destination,
                target.branch(),
                &pr.forward_reviewers(),
                pr.merge_commit.as_ref(),
            )
            .await
            .map_err(|e| DispatchError::Orchestrator(Box::new(e)))?;

        Ok(DispatchOutcome::ForwardPullRequest { target, outcome })
    }

    pub(super) async fn try_merge(&self, repo: &RepoId) -> Result<DispatchOutcome> {
        debug!(repo = %repo, "Checking auto-mergeable cascade pull requests");

        let platform = self.inner.platform.for_repo(repo);
        let merged = self
            .inner
            .orchestrator
            .approve_and_merge(&platform, repo)
            .await
            .map_err(|e| DispatchError::Orchestrator(Box::new(e)))?;

        Ok(DispatchOutcome::AutoMerge { merged })
    }
}

async fn list_branches<I: PlatformInterpreter>(
    platform: &I,
    filter: &str,
) -> Result<Vec<BranchName>> {
    let effect = PlatformEffect::ListBranches {
        name_prefix: filter.to_string(),
    };
    match platform.interpret(effect).await {
        Ok(PlatformResponse::Branches(branches)) => Ok(branches),
        Ok(other) => Err(DispatchError::UnexpectedResponse(other)),
        Err(e) => Err(DispatchError::ListBranches {
            filter: filter.to_string(),
            source: Box::new(e),
        }),
    }
}
