//! Webhook handling for Bitbucket events.
//!
//! This module provides:
//! - Shared-key verification for webhook requests
//! - Typed event parsing and trigger classification

pub mod events;
pub mod parser;
pub mod shared_key;

pub use events::{CascadeEvent, PULL_REQUEST_FULFILLED, PullRequestInfo, TriggerKind};
pub use parser::{ParseError, parse_event};
pub use shared_key::verify_shared_key;
