//! Cascade Merge Bot - A Bitbucket bot that carries merges into release branches
//! forward through every newer release branch and finally the development branch.
//!
//! This library provides the domain types, the cascade logic, the Bitbucket
//! client and the HTTP surface of the bot.

pub mod bitbucket;
pub mod cascade;
pub mod config;
pub mod dispatch;
pub mod effects;
pub mod server;
pub mod types;
pub mod webhooks;

#[cfg(test)]
pub(crate) mod test_utils;
