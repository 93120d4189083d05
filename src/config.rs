//! Configuration from environment variables.
//!
//! An optional `.env` file is loaded first. Empty variables count as unset.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::bitbucket::{BitbucketConfig, Credentials, DEFAULT_API_URL};
use crate::dispatch::DispatcherConfig;
use crate::types::BranchName;

/// Default per-request timeout for Bitbucket calls.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Errors that make startup impossible.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("${0} must be set")]
    Missing(&'static str),

    #[error("$BITBUCKET_TOKEN or $BITBUCKET_USERNAME must be set")]
    MissingCredentials,

    #[error("${name} has invalid value {value:?}: expected {expected}")]
    Invalid {
        name: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("$BITBUCKET_PASSWORD_{0} must be set when $BITBUCKET_USERNAME_{0} is")]
    MissingApproverPassword(usize),
}

/// Bot configuration.
#[derive(Clone)]
pub struct Config {
    /// Listening port.
    pub port: u16,

    /// Identity that creates and merges pull requests.
    pub primary: Credentials,

    /// Approver identities, in `BITBUCKET_USERNAME_<n>` order.
    pub approvers: Vec<Credentials>,

    /// Merges into branches with this prefix start a cascade.
    pub release_branch_prefix: String,

    /// Fallback cascade target.
    pub development_branch: BranchName,

    /// Expected `key` query parameter.
    pub shared_key: String,

    /// Bitbucket API base URL.
    pub api_url: String,

    /// Per-request timeout for Bitbucket calls.
    pub http_timeout: Duration,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("primary", &self.primary)
            .field("approvers", &self.approvers)
            .field("release_branch_prefix", &self.release_branch_prefix)
            .field("development_branch", &self.development_branch)
            .field("shared_key", &"<redacted>")
            .field("api_url", &self.api_url)
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}

impl Config {
    /// Loads configuration from `.env` (if present) and the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.is_empty());
        let required = |name: &'static str| var(name).ok_or(ConfigError::Missing(name));

        let port_raw = required("PORT")?;
        let port = port_raw.parse::<u16>().map_err(|_| ConfigError::Invalid {
            name: "PORT",
            value: port_raw.clone(),
            expected: "a port number",
        })?;

        let primary = match (var("BITBUCKET_TOKEN"), var("BITBUCKET_USERNAME")) {
            (Some(token), _) => Credentials::Bearer(token),
            (None, Some(username)) => {
                Credentials::basic(username, required("BITBUCKET_PASSWORD")?)
            }
            (None, None) => return Err(ConfigError::MissingCredentials),
        };

        let mut approvers = Vec::new();
        while let Some(username) = var(&format!("BITBUCKET_USERNAME_{}", approvers.len())) {
            let index = approvers.len();
            let password = var(&format!("BITBUCKET_PASSWORD_{}", index))
                .ok_or(ConfigError::MissingApproverPassword(index))?;
            approvers.push(Credentials::basic(username, password));
        }

        let http_timeout = match var("BITBUCKET_HTTP_TIMEOUT_SECS") {
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "BITBUCKET_HTTP_TIMEOUT_SECS",
                        value: raw,
                        expected: "a positive number of seconds",
                    });
                }
            },
            None => Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        };

        Ok(Config {
            port,
            primary,
            approvers,
            release_branch_prefix: required("RELEASE_BRANCH_PREFIX")?,
            development_branch: BranchName::new(required("DEVELOPMENT_BRANCH_NAME")?),
            shared_key: required("BITBUCKET_SHARED_KEY")?,
            api_url: var("BITBUCKET_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            http_timeout,
        })
    }

    /// Settings for the Bitbucket client.
    pub fn bitbucket(&self) -> BitbucketConfig {
        BitbucketConfig {
            api_url: self.api_url.clone(),
            primary: self.primary.clone(),
            approvers: self.approvers.clone(),
            timeout: self.http_timeout,
        }
    }

    /// Settings for the event dispatcher.
    pub fn dispatcher(&self) -> DispatcherConfig {
        DispatcherConfig::new(
            self.release_branch_prefix.clone(),
            self.development_branch.clone(),
        )
        .with_approver_count(self.approvers.len())
    }
}
