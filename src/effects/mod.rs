//! Effects-as-data for hosting-platform operations.
//!
//! This module defines effect types that describe operations without executing them.
//! This enables:
//! - Cascade logic that is written once against an abstract platform
//! - Testability via mock interpreters
//! - Logging/tracing of intended operations

pub mod interpreter;
pub mod platform;

pub use interpreter::{Platform, PlatformInterpreter};
pub use platform::{PlatformEffect, PlatformResponse};
