//! reqwest-based Bitbucket Cloud client.
//!
//! [`BitbucketClient`] owns the HTTP connection pool and every identity's
//! credentials. It is shared across all webhook tasks and hands out
//! [`RepoClient`]s, which scope operations to one repository (effects don't
//! carry repository info).

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::RequestBuilder;

use crate::effects::Platform;
use crate::types::{Identity, RepoId};

use super::error::BitbucketApiError;

/// Default API base URL.
pub const DEFAULT_API_URL: &str = "https://api.bitbucket.org/2.0";

/// Credentials for one Bitbucket identity.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// OAuth bearer token (access token or repository token).
    Bearer(String),
    /// Username and app password.
    Basic { username: String, password: String },
}

impl Credentials {
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    pub(super) fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        match self {
            Credentials::Bearer(token) => request.bearer_auth(token),
            Credentials::Basic { username, password } => {
                request.basic_auth(username, Some(password))
            }
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Bearer(_) => f.debug_tuple("Bearer").field(&"<redacted>").finish(),
            Credentials::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
        }
    }
}

/// Settings for building a [`BitbucketClient`].
#[derive(Debug, Clone)]
pub struct BitbucketConfig {
    /// API base URL without trailing slash.
    pub api_url: String,

    /// Identity that creates and merges pull requests.
    pub primary: Credentials,

    /// Extra identities whose only job is approving.
    pub approvers: Vec<Credentials>,

    /// Per-request timeout.
    pub timeout: Duration,
}

impl BitbucketConfig {
    pub fn new(primary: Credentials) -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            primary,
            approvers: Vec::new(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// A Bitbucket API client shared by every repository.
///
/// Cloning is cheap: clones share the connection pool.
#[derive(Clone)]
pub struct BitbucketClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: reqwest::Client,
    api_url: String,
    primary: Credentials,
    approvers: Vec<Credentials>,
}

impl BitbucketClient {
    /// Builds the client and its HTTP connection pool.
    pub fn new(config: BitbucketConfig) -> Result<Self, BitbucketApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("cascade-merge/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BitbucketApiError::from_reqwest("building HTTP client", e))?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                api_url: config.api_url.trim_end_matches('/').to_string(),
                primary: config.primary,
                approvers: config.approvers,
            }),
        })
    }

    /// Returns a client scoped to `repo`.
    pub fn repo(&self, repo: RepoId) -> RepoClient {
        RepoClient {
            client: self.clone(),
            repo,
        }
    }
}

impl fmt::Debug for BitbucketClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BitbucketClient")
            .field("api_url", &self.inner.api_url)
            .field("primary", &self.inner.primary)
            .field("approvers", &self.inner.approvers)
            .finish_non_exhaustive()
    }
}

impl Platform for BitbucketClient {
    type Interpreter = RepoClient;

    fn for_repo(&self, repo: &RepoId) -> Self::Interpreter {
        self.repo(repo.clone())
    }
}

/// A Bitbucket API client scoped to a specific repository.
#[derive(Clone)]
pub struct RepoClient {
    client: BitbucketClient,
    repo: RepoId,
}

impl RepoClient {
    /// Returns the repository this client is scoped to.
    pub fn repo(&self) -> &RepoId {
        &self.repo
    }

    pub(super) fn http(&self) -> &reqwest::Client {
        &self.client.inner.http
    }

    /// Builds `{api}/repositories/{owner}/{slug}{path}`.
    pub(super) fn repo_url(&self, path: &str) -> String {
        format!(
            "{}/repositories/{}/{}{}",
            self.client.inner.api_url, self.repo.owner, self.repo.slug, path
        )
    }

    /// Resolves the credentials for `identity`.
    pub(super) fn credentials(&self, identity: Identity) -> Result<&Credentials, BitbucketApiError> {
        match identity {
            Identity::Primary => Ok(&self.client.inner.primary),
            Identity::Approver(i) => self.client.inner.approvers.get(i).ok_or_else(|| {
                BitbucketApiError::permanent(format!(
                    "no credentials configured for {} ({} approvers)",
                    identity,
                    self.client.inner.approvers.len()
                ))
            }),
        }
    }
}

impl fmt::Debug for RepoClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepoClient")
            .field("repo", &self.repo)
            .finish_non_exhaustive()
    }
}
