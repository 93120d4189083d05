//! Bitbucket Cloud API client and effect interpreter.
//!
//! This module executes platform effects against Bitbucket Cloud's REST 2.0
//! API with `reqwest`. It implements the `Platform` and `PlatformInterpreter`
//! traits defined in the effects module.
//!
//! Key features:
//! - One shared connection pool, repo-scoped clients per event
//! - Primary and approver identities with bearer or basic credentials
//! - Pagination followed to the end for every collection query
//! - Errors categorized as not found, transient or permanent

mod client;
mod error;
mod interpreter;

pub use client::{BitbucketClient, BitbucketConfig, Credentials, DEFAULT_API_URL, RepoClient};
pub use error::{BitbucketApiError, BitbucketErrorKind};
