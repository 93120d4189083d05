//! Effect interpreter traits.
//!
//! The trait-based design enables:
//! - Mock interpreters for testing
//! - Swapping the hosting platform without touching cascade logic

use std::future::Future;

use crate::types::RepoId;

use super::platform::{PlatformEffect, PlatformResponse};

/// Interprets platform effects against the hosting platform.
///
/// Implementations are scoped to one repository, so all effects executed
/// through a single interpreter instance target that repository.
///
/// # Example (mock for testing)
///
/// ```ignore
/// struct FixedBranches(Vec<BranchName>);
///
/// impl PlatformInterpreter for FixedBranches {
///     type Error = std::convert::Infallible;
///
///     async fn interpret(&self, effect: PlatformEffect) -> Result<PlatformResponse, Self::Error> {
///         match effect {
///             PlatformEffect::ListBranches { .. } => Ok(PlatformResponse::Branches(self.0.clone())),
///             _ => Ok(PlatformResponse::Approved),
///         }
///     }
/// }
/// ```
pub trait PlatformInterpreter {
    /// The error type returned by this interpreter.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Execute a platform effect and return its response.
    fn interpret(
        &self,
        effect: PlatformEffect,
    ) -> impl Future<Output = Result<PlatformResponse, Self::Error>> + Send;
}

/// Hands out repo-scoped interpreters.
///
/// One connection (HTTP client plus credentials) serves every repository that
/// sends webhooks; each event gets an interpreter scoped to its repository.
pub trait Platform: Clone + Send + Sync + 'static {
    /// The repo-scoped interpreter type.
    type Interpreter: PlatformInterpreter + Send + Sync + 'static;

    /// Returns an interpreter scoped to `repo`.
    fn for_repo(&self, repo: &RepoId) -> Self::Interpreter;
}
