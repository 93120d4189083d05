//! Release branch ordering.
//!
//! Branches are ordered by the dot-separated components of their last path
//! segment. Components are compared as **strings**, not numbers, so `"10"`
//! sorts before `"9"` and `"0-alpha"` before `"0-beta"`. Release lines that
//! want numeric ordering past a single digit must zero-pad their versions
//! (`2024.03.1` rather than `2024.3.1`).
//!
//! A sequence that runs out of components is padded with `"0"`, which makes
//! `release/1.0` and `release/1.0.0` equal.

use std::cmp::Ordering;

use crate::types::BranchName;

/// Component used in place of a missing trailing component.
const IMPLICIT_COMPONENT: &str = "0";

/// Compares two branch names by their version suffix.
///
/// This is a total preorder: distinct names may compare equal (`1.0` vs
/// `1.0.0`), so it is suitable as a sort key but not as an identity check.
///
/// # Examples
///
/// ```
/// use std::cmp::Ordering;
/// use cascade_merge::cascade::compare_branch_versions;
/// use cascade_merge::types::BranchName;
///
/// let a = BranchName::from("release/1.0.0");
/// let b = BranchName::from("release/1.0.1");
/// assert_eq!(compare_branch_versions(&a, &b), Ordering::Less);
///
/// // String ordering, not numeric
/// let nine = BranchName::from("release/9");
/// let ten = BranchName::from("release/10");
/// assert_eq!(compare_branch_versions(&nine, &ten), Ordering::Greater);
/// ```
pub fn compare_branch_versions(a: &BranchName, b: &BranchName) -> Ordering {
    compare_versions(a.version_suffix(), b.version_suffix())
}

/// Compares two version strings component by component.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');

    loop {
        let (l, r) = match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (l, r) => (
                l.unwrap_or(IMPLICIT_COMPONENT),
                r.unwrap_or(IMPLICIT_COMPONENT),
            ),
        };

        match l.cmp(r) {
            Ordering::Equal => continue,
            unequal => return unequal,
        }
    }
}
