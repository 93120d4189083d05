//! Core domain types for the cascade merge bot.
//!
//! This module contains the identifiers and pull request types shared by the
//! resolver, the orchestrator and the Bitbucket interpreter.

pub mod ids;
pub mod pr;

// Re-export commonly used types at the module level
pub use ids::{AccountUuid, BranchName, CommitHash, Identity, PrId, RepoId};
pub use pr::{CASCADE_MARKER, CascadeTemplate, PullRequest};
