//! OpenAI Assistants (v2) provider implementation.
//!
//! This module provides the [`OpenAiAssistantsProvider`] which implements the
//! [`ConversationProvider`](taskfixer_core::conversation::ConversationProvider)
//! trait for the Assistants threads/runs API, including SSE run streaming.

pub mod client;
pub mod streaming;
pub mod types;

pub use client::OpenAiAssistantsProvider;
