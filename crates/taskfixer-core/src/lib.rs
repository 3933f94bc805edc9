//! Business logic and port traits for TaskFixer.
//!
//! This crate defines the "ports" (repository and provider traits) that the
//! infrastructure layer implements, plus the stream relay that ties them
//! together. It depends only on `taskfixer-types` -- never on
//! `taskfixer-infra` or any database/IO crate.

pub mod classify;
pub mod conversation;
pub mod relay;
pub mod tool;
pub mod usage;

#[cfg(test)]
pub(crate) mod testing;
