//! Shared domain types for TaskFixer.
//!
//! This crate contains the domain vocabulary used across the relay:
//! usage counters and quota policy, conversation messages, upstream and
//! relay stream events, tool payloads, configuration, and error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod conversation;
pub mod error;
pub mod relay;
pub mod tool;
pub mod upstream;
pub mod usage;
