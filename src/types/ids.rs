//! Newtype wrappers for domain identifiers.
//!
//! These types prevent accidental mixing of different ID types (e.g., passing a
//! reviewer UUID where a branch name is expected) and make signatures self-documenting.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A Bitbucket pull request ID within a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrId(pub u64);

impl fmt::Display for PrId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for PrId {
    fn from(n: u64) -> Self {
        PrId(n)
    }
}

/// A branch name, e.g. `release/2024.03.1`.
///
/// Release branches carry their version in the last path segment; everything
/// before it is the release line's directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BranchName(pub String);

impl BranchName {
    pub fn new(s: impl Into<String>) -> Self {
        BranchName(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the trailing path segment, which holds the version.
    ///
    /// `release/2024.03.1` yields `2024.03.1`; a name without `/` is returned whole.
    pub fn version_suffix(&self) -> &str {
        match self.0.rsplit_once('/') {
            Some((_, suffix)) => suffix,
            None => &self.0,
        }
    }

    /// Returns the directory part including its trailing `/`, if there is one.
    ///
    /// `release/vergleiche/1.0.0` yields `release/vergleiche/`.
    pub fn parent_dir(&self) -> Option<&str> {
        self.0.rfind('/').map(|idx| &self.0[..=idx])
    }

    pub fn starts_with(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }

    /// Returns true if the name is `prefix` followed by a single path segment.
    ///
    /// `release/1.1` is a direct child of `release/`; `release/line/1.0` is not.
    pub fn is_direct_child_of(&self, prefix: &str) -> bool {
        self.0
            .strip_prefix(prefix)
            .is_some_and(|rest| !rest.contains('/'))
    }
}

impl fmt::Display for BranchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for BranchName {
    fn from(s: String) -> Self {
        BranchName(s)
    }
}

impl From<&str> for BranchName {
    fn from(s: &str) -> Self {
        BranchName(s.to_string())
    }
}

/// A git commit hash as reported by Bitbucket.
///
/// Bitbucket webhooks usually send the abbreviated 12-character form, so no
/// length validation is performed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitHash(pub String);

impl CommitHash {
    pub fn new(s: impl Into<String>) -> Self {
        CommitHash(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns a short (12-character) version of the hash for display.
    pub fn short(&self) -> &str {
        self.0.get(..12).unwrap_or(&self.0)
    }
}

impl fmt::Display for CommitHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A Bitbucket account UUID, e.g. `{0b2e...}`. Used to request reviewers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountUuid(pub String);

impl AccountUuid {
    pub fn new(s: impl Into<String>) -> Self {
        AccountUuid(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A repository identifier (workspace/slug format).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoId {
    pub owner: String,
    pub slug: String,
}

impl RepoId {
    pub fn new(owner: impl Into<String>, slug: impl Into<String>) -> Self {
        RepoId {
            owner: owner.into(),
            slug: slug.into(),
        }
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.slug)
    }
}

/// The identity a platform call is performed as.
///
/// The primary identity creates and merges pull requests. Approver identities
/// exist only so that "N distinct approvals" merge checks can be satisfied by
/// automation; they are addressed by their position in the configured list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Identity {
    Primary,
    Approver(usize),
}

impl Identity {
    /// Returns every identity that approves cascade pull requests, primary first.
    pub fn approval_order(approver_count: usize) -> Vec<Identity> {
        std::iter::once(Identity::Primary)
            .chain((0..approver_count).map(Identity::Approver))
            .collect()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::Primary => write!(f, "primary"),
            Identity::Approver(i) => write!(f, "approver_{}", i),
        }
    }
}
