//! Platform effect interpreter for Bitbucket Cloud REST 2.0.
//!
//! Key implementation details:
//! - Collection endpoints are paginated; `next` links are followed to the end
//! - Branch and pull request lookups use BBQL (`q=`) filters
//! - `~` is a case-insensitive substring match, so results are re-filtered
//!   client-side
//! - Approvals and merges authenticate as the identity named by the effect

use reqwest::Response;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::effects::{PlatformEffect, PlatformInterpreter, PlatformResponse};
use crate::types::{AccountUuid, BranchName, CommitHash, Identity, PrId, PullRequest};

use super::client::RepoClient;
use super::error::BitbucketApiError;

const PAGE_LEN: &str = "100";

// ─── Wire Types ───────────────────────────────────────────────────────────────

/// One page of a paginated collection.
#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    values: Vec<T>,
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireBranch {
    name: String,
}

#[derive(Debug, Deserialize)]
struct WirePullRequest {
    id: u64,
    #[serde(default)]
    title: String,
    source: WireEndpoint,
    destination: WireEndpoint,
}

#[derive(Debug, Deserialize)]
struct WireEndpoint {
    branch: WireBranchRef,
}

#[derive(Debug, Deserialize)]
struct WireBranchRef {
    name: String,
}

impl From<WirePullRequest> for PullRequest {
    fn from(pr: WirePullRequest) -> Self {
        PullRequest {
            id: PrId(pr.id),
            title: pr.title,
            source: BranchName::new(pr.source.branch.name),
            destination: BranchName::new(pr.destination.branch.name),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireBranchingModel {
    development: Option<WireModelBranch>,
}

#[derive(Debug, Deserialize)]
struct WireModelBranch {
    name: Option<String>,
    branch: Option<WireBranchRef>,
}

#[derive(Debug, Deserialize)]
struct WireMergeResult {
    merge_commit: Option<WireCommit>,
}

#[derive(Debug, Deserialize)]
struct WireCommit {
    hash: String,
}

// ─── Interpreter Implementation ───────────────────────────────────────────────

impl PlatformInterpreter for RepoClient {
    type Error = BitbucketApiError;

    async fn interpret(&self, effect: PlatformEffect) -> Result<PlatformResponse, Self::Error> {
        let name = effect.name();
        debug!(repo = %self.repo(), effect = name, "Calling Bitbucket");

        let result = execute_effect(self, effect).await;
        if let Err(e) = &result {
            warn!(
                repo = %self.repo(),
                effect = name,
                kind = ?e.kind,
                status = ?e.status_code,
                "Bitbucket call failed"
            );
        }
        result
    }
}

async fn execute_effect(
    client: &RepoClient,
    effect: PlatformEffect,
) -> Result<PlatformResponse, BitbucketApiError> {
    match effect {
        PlatformEffect::ListBranches { name_prefix } => list_branches(client, &name_prefix).await,
        PlatformEffect::GetDevelopmentBranch => get_development_branch(client).await,
        PlatformEffect::FindOpenPullRequest {
            source,
            destination,
        } => find_open_pull_request(client, &source, &destination).await,
        PlatformEffect::ListOpenPullRequestsByTitle { marker } => {
            list_open_pull_requests_by_title(client, &marker).await
        }
        PlatformEffect::CreatePullRequest {
            source,
            destination,
            title,
            description,
            reviewers,
        } => create_pull_request(client, source, destination, title, description, reviewers).await,
        PlatformEffect::ApprovePullRequest { pr, identity } => {
            approve_pull_request(client, pr, identity).await
        }
        PlatformEffect::MergePullRequest { pr, identity } => {
            merge_pull_request(client, pr, identity).await
        }
    }
}

// ─── Branch Operations ────────────────────────────────────────────────────────

async fn list_branches(
    client: &RepoClient,
    name_prefix: &str,
) -> Result<PlatformResponse, BitbucketApiError> {
    let query = format!("name ~ {}", bbql_string(name_prefix));
    let branches: Vec<WireBranch> = get_all_pages(
        client,
        &client.repo_url("/refs/branches"),
        &[("q", query.as_str()), ("pagelen", PAGE_LEN)],
        "listing branches",
    )
    .await?;

    Ok(PlatformResponse::Branches(
        branches
            .into_iter()
            .map(|b| BranchName::new(b.name))
            .filter(|b| b.is_direct_child_of(name_prefix))
            .collect(),
    ))
}

async fn get_development_branch(client: &RepoClient) -> Result<PlatformResponse, BitbucketApiError> {
    let request = client.http().get(client.repo_url("/branching-model"));
    let result: Result<WireBranchingModel, _> =
        send_json(client, request, Identity::Primary, "reading branching model").await;

    let model = match result {
        Ok(model) => model,
        Err(e) if e.is_not_found() => return Ok(PlatformResponse::DevelopmentBranch(None)),
        Err(e) => return Err(e),
    };

    let name = model
        .development
        .and_then(|dev| dev.branch.map(|b| b.name).or(dev.name))
        .filter(|name| !name.is_empty())
        .map(BranchName::new);

    Ok(PlatformResponse::DevelopmentBranch(name))
}

// ─── PR Queries ───────────────────────────────────────────────────────────────

async fn find_open_pull_request(
    client: &RepoClient,
    source: &BranchName,
    destination: &BranchName,
) -> Result<PlatformResponse, BitbucketApiError> {
    let query = format!(
        "source.branch.name = {} AND destination.branch.name = {} AND state = \"OPEN\"",
        bbql_string(source.as_str()),
        bbql_string(destination.as_str())
    );
    let prs: Vec<WirePullRequest> = get_all_pages(
        client,
        &client.repo_url("/pullrequests"),
        &[("q", query.as_str()), ("state", "OPEN"), ("pagelen", "50")],
        "searching pull requests",
    )
    .await?;

    Ok(PlatformResponse::PullRequest(
        prs.into_iter()
            .map(PullRequest::from)
            .find(|pr| &pr.source == source && &pr.destination == destination),
    ))
}

async fn list_open_pull_requests_by_title(
    client: &RepoClient,
    marker: &str,
) -> Result<PlatformResponse, BitbucketApiError> {
    let query = format!("title ~ {} AND state = \"OPEN\"", bbql_string(marker));
    let prs: Vec<WirePullRequest> = get_all_pages(
        client,
        &client.repo_url("/pullrequests"),
        &[("q", query.as_str()), ("state", "OPEN"), ("pagelen", "50")],
        "listing cascade pull requests",
    )
    .await?;

    Ok(PlatformResponse::PullRequests(
        prs.into_iter()
            .map(PullRequest::from)
            .filter(|pr| pr.title.contains(marker))
            .collect(),
    ))
}

// ─── PR Mutations ─────────────────────────────────────────────────────────────

async fn create_pull_request(
    client: &RepoClient,
    source: BranchName,
    destination: BranchName,
    title: String,
    description: String,
    reviewers: Vec<AccountUuid>,
) -> Result<PlatformResponse, BitbucketApiError> {
    let body = json!({
        "title": title,
        "description": description,
        "source": { "branch": { "name": source.as_str() } },
        "destination": { "branch": { "name": destination.as_str() } },
        "reviewers": reviewers
            .iter()
            .map(|uuid| json!({ "uuid": uuid.as_str() }))
            .collect::<Vec<_>>(),
        "close_source_branch": false,
    });

    let request = client
        .http()
        .post(client.repo_url("/pullrequests"))
        .json(&body);
    let context = format!("creating pull request {} -> {}", source, destination);
    let pr: WirePullRequest = send_json(client, request, Identity::Primary, &context).await?;

    Ok(PlatformResponse::Created(pr.into()))
}

async fn approve_pull_request(
    client: &RepoClient,
    pr: PrId,
    identity: Identity,
) -> Result<PlatformResponse, BitbucketApiError> {
    let request = client
        .http()
        .post(client.repo_url(&format!("/pullrequests/{}/approve", pr.0)));
    let context = format!("approving {} as {}", pr, identity);
    send(client, request, identity, &context).await?;

    Ok(PlatformResponse::Approved)
}

async fn merge_pull_request(
    client: &RepoClient,
    pr: PrId,
    identity: Identity,
) -> Result<PlatformResponse, BitbucketApiError> {
    let request = client
        .http()
        .post(client.repo_url(&format!("/pullrequests/{}/merge", pr.0)))
        .json(&json!({ "close_source_branch": false }));
    let context = format!("merging {}", pr);
    let merged: WireMergeResult = send_json(client, request, identity, &context).await?;

    Ok(PlatformResponse::Merged {
        merge_commit: merged.merge_commit.map(|c| CommitHash::new(c.hash)),
    })
}

// ─── HTTP Helpers ─────────────────────────────────────────────────────────────

/// Quotes a value for a BBQL filter.
fn bbql_string(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Sends an authenticated request and fails on non-success status.
async fn send(
    client: &RepoClient,
    request: reqwest::RequestBuilder,
    identity: Identity,
    context: &str,
) -> Result<Response, BitbucketApiError> {
    let request = client.credentials(identity)?.apply(request);
    let response = request
        .send()
        .await
        .map_err(|e| BitbucketApiError::from_reqwest(context, e))?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(BitbucketApiError::from_response(context, status.as_u16(), &body))
}

async fn send_json<T: DeserializeOwned>(
    client: &RepoClient,
    request: reqwest::RequestBuilder,
    identity: Identity,
    context: &str,
) -> Result<T, BitbucketApiError> {
    send(client, request, identity, context)
        .await?
        .json()
        .await
        .map_err(|e| BitbucketApiError::from_reqwest(context, e))
}

/// Fetches every page of a collection as the primary identity.
///
/// The query is only sent with the first request; `next` links already carry it.
async fn get_all_pages<T: DeserializeOwned>(
    client: &RepoClient,
    url: &str,
    query: &[(&str, &str)],
    context: &str,
) -> Result<Vec<T>, BitbucketApiError> {
    let mut values = Vec::new();
    let mut request = client.http().get(url).query(query);

    loop {
        let page: Page<T> = send_json(client, request, Identity::Primary, context).await?;
        values.extend(page.values);

        match page.next {
            Some(next) => request = client.http().get(next),
            None => break,
        }
    }

    Ok(values)
}
