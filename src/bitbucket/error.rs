//! Bitbucket API error types.
//!
//! Errors are categorized so callers and logs can tell a missing resource from
//! an outage from a rejected request:
//!
//! - **NotFound** (HTTP 404) - the repository, branch or pull request does not exist
//! - **Transient** - 5xx, 429 and transport failures; the same call may succeed later
//! - **Permanent** - every other failure, including undecodable response bodies

use std::fmt;

use serde::Deserialize;
use thiserror::Error;

/// The kind of Bitbucket API error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitbucketErrorKind {
    /// HTTP 404.
    NotFound,

    /// Server errors, rate limiting and network failures.
    Transient,

    /// Requires human intervention: bad credentials, merge checks not met,
    /// conflicts, malformed responses.
    Permanent,
}

impl BitbucketErrorKind {
    /// Categorizes an HTTP status code.
    pub fn from_status(status: u16) -> Self {
        match status {
            404 => BitbucketErrorKind::NotFound,
            429 => BitbucketErrorKind::Transient,
            code if (500..600).contains(&code) => BitbucketErrorKind::Transient,
            _ => BitbucketErrorKind::Permanent,
        }
    }
}

/// A Bitbucket API error.
#[derive(Debug, Error)]
pub struct BitbucketApiError {
    /// How the failure is categorized.
    pub kind: BitbucketErrorKind,

    /// The HTTP status code, if a response was received.
    pub status_code: Option<u16>,

    /// A human-readable description, preferring Bitbucket's own `error.message`.
    pub message: String,

    /// The underlying transport error, if any.
    #[source]
    pub source: Option<reqwest::Error>,
}

impl fmt::Display for BitbucketApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status_code {
            Some(code) => write!(f, "Bitbucket API error (HTTP {}): {}", code, self.message),
            None => write!(f, "Bitbucket API error: {}", self.message),
        }
    }
}

/// Bitbucket's error envelope: `{"type": "error", "error": {"message": ...}}`.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
    #[serde(default)]
    detail: Option<String>,
}

impl BitbucketApiError {
    /// Builds an error from a non-success response's status and body.
    ///
    /// `context` names the operation, e.g. `"merging #12"`.
    pub fn from_response(context: &str, status: u16, body: &str) -> Self {
        let message = match serde_json::from_str::<ErrorEnvelope>(body) {
            Ok(envelope) => match envelope.error.detail {
                Some(detail) if !detail.is_empty() => {
                    format!("{}: {} ({})", context, envelope.error.message, detail)
                }
                _ => format!("{}: {}", context, envelope.error.message),
            },
            Err(_) if body.trim().is_empty() => context.to_string(),
            Err(_) => format!("{}: {}", context, truncate(body, 200)),
        };

        Self {
            kind: BitbucketErrorKind::from_status(status),
            status_code: Some(status),
            message,
            source: None,
        }
    }

    /// Categorizes a reqwest error.
    ///
    /// Timeouts and connection failures are transient; a status carried by the
    /// error decides otherwise; anything else (e.g. decoding) is permanent.
    pub fn from_reqwest(context: &str, err: reqwest::Error) -> Self {
        let status_code = err.status().map(|s| s.as_u16());
        let kind = match status_code {
            Some(code) => BitbucketErrorKind::from_status(code),
            None if err.is_timeout() || err.is_connect() || err.is_request() => {
                BitbucketErrorKind::Transient
            }
            None => BitbucketErrorKind::Permanent,
        };

        Self {
            kind,
            status_code,
            message: format!("{}: {}", context, err),
            source: Some(err),
        }
    }

    /// Creates a permanent error without a transport source.
    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            kind: BitbucketErrorKind::Permanent,
            status_code: None,
            message: message.into(),
            source: None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == BitbucketErrorKind::NotFound
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
