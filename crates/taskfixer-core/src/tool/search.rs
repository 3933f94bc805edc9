//! SearchProvider trait definition.

use taskfixer_types::tool::{SearchError, SearchResult};

/// Port for web search backends.
///
/// Implementations live in taskfixer-infra (e.g., `DuckDuckGoSearch`).
/// Results must already be normalized to `{title, snippet, url}`.
pub trait SearchProvider: Send + Sync {
    fn search(
        &self,
        query: &str,
        limit: usize,
    ) -> impl std::future::Future<Output = Result<Vec<SearchResult>, SearchError>> + Send;
}
