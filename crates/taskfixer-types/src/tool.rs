//! Tool payloads and errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Name of the only tool the assistant is configured with.
pub const WEB_SEARCH_TOOL: &str = "web_search";

/// A normalized web search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub snippet: String,
    pub url: String,
}

/// Arguments of a `web_search` call.
#[derive(Debug, Clone, Deserialize)]
pub struct WebSearchArgs {
    pub query: String,
    #[serde(default)]
    pub num_results: Option<usize>,
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search request failed: {0}")]
    Request(String),

    #[error("search returned status {0}")]
    Status(u16),

    #[error("invalid search response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid arguments for {tool}: {message}")]
    InvalidArguments { tool: String, message: String },
}
