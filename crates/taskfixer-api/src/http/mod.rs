//! HTTP/REST API layer for TaskFixer.
//!
//! Axum-based API at `/api/` with API key authentication and an SSE chat
//! stream.

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod router;
pub mod sse;

#[cfg(test)]
mod test_support;
