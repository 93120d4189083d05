//! Cascade resolution and pull request orchestration.
//!
//! When a pull request lands on a release branch, its changes must flow
//! forward: to the next release branch in version order and finally into the
//! development branch. This module decides where the next hop goes and drives
//! the forward pull requests through the platform.
//!
//! # Architecture
//!
//! - [`version`] orders release branches by their version suffix
//! - [`resolver`] picks the next target, falling back to the development branch
//! - [`orchestrator`] creates, approves and merges cascade pull requests
//! - [`locks`] serialises pull request creation per (repository, source, destination)
//!
//! All platform access goes through [`crate::effects::PlatformInterpreter`],
//! so every piece here runs unchanged against the in-memory test platform.

pub mod locks;
pub mod orchestrator;
pub mod resolver;
pub mod version;

// Re-export commonly used types
pub use locks::{KeyedGuard, KeyedLocks};
pub use orchestrator::{EnsureOutcome, OrchestratorError, PullRequestOrchestrator};
pub use resolver::{
    CascadeResolver, CascadeTarget, DevelopmentSource, next_release_branch, sibling_filter,
};
pub use version::{compare_branch_versions, compare_versions};
