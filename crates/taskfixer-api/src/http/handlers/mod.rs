//! HTTP request handlers for the REST API.

pub mod chat;
pub mod export;
pub mod upload;
pub mod usage;
