//! Shared-key authentication for Bitbucket webhooks.
//!
//! Bitbucket Cloud does not sign webhook payloads for this integration, so the
//! webhook URL carries a shared secret as `?key=<secret>`. Requests whose key
//! doesn't match are rejected before anything else happens.
//!
//! The comparison MACs a fixed message under the expected key and verifies the
//! tag produced under the supplied key. `verify_slice` compares in constant
//! time, so response timing says nothing about how much of a guess was right.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Message authenticated under both keys.
const KEY_CHECK_MESSAGE: &[u8] = b"cascade-merge shared key check";

fn key_tag(key: &[u8]) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(key).ok()?;
    mac.update(KEY_CHECK_MESSAGE);
    Some(mac)
}

/// Verifies a supplied shared key against the configured one.
///
/// Returns `false` for a missing or empty supplied key, and always returns
/// `false` if the configured key is empty.
///
/// # Examples
///
/// ```
/// use cascade_merge::webhooks::verify_shared_key;
///
/// assert!(verify_shared_key(Some("s3cret"), b"s3cret"));
/// assert!(!verify_shared_key(Some("guess"), b"s3cret"));
/// assert!(!verify_shared_key(None, b"s3cret"));
/// ```
pub fn verify_shared_key(supplied: Option<&str>, expected: &[u8]) -> bool {
    let supplied = match supplied {
        Some(s) if !s.is_empty() => s.as_bytes(),
        _ => return false,
    };
    if expected.is_empty() {
        return false;
    }

    let (Some(expected_mac), Some(supplied_mac)) = (key_tag(expected), key_tag(supplied)) else {
        return false;
    };
    let supplied_tag = supplied_mac.finalize().into_bytes();

    expected_mac.verify_slice(&supplied_tag).is_ok()
}
