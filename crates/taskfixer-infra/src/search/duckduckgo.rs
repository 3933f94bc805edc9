//! DuckDuckGo Instant Answer search client.
//!
//! No API key is needed. The instant-answer response is not a ranked result
//! list, so it is normalized: the abstract (if any) comes first, followed by
//! related topics that carry both text and a URL.

use std::time::Duration;

use serde::Deserialize;

use taskfixer_core::tool::SearchProvider;
use taskfixer_types::tool::{SearchError, SearchResult};

/// Subset of the instant-answer response the normalizer reads.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InstantAnswer {
    #[serde(default)]
    pub heading: String,
    #[serde(default, rename = "Abstract")]
    pub abstract_text: String,
    #[serde(default, rename = "AbstractURL")]
    pub abstract_url: String,
    #[serde(default)]
    pub related_topics: Vec<RelatedTopic>,
}

/// A related topic. Grouped topics (with a nested `Topics` list) carry
/// neither `Text` nor `FirstURL` and are skipped.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RelatedTopic {
    #[serde(default, rename = "Text")]
    pub text: Option<String>,
    #[serde(default, rename = "FirstURL")]
    pub first_url: Option<String>,
}

/// Normalize an instant answer into at most `limit` results.
pub fn normalize(answer: InstantAnswer, limit: usize) -> Vec<SearchResult> {
    let mut results = Vec::new();

    if !answer.abstract_text.is_empty() {
        let title = if answer.heading.is_empty() {
            "Overview".to_string()
        } else {
            answer.heading
        };
        results.push(SearchResult {
            title,
            snippet: answer.abstract_text,
            url: answer.abstract_url,
        });
    }

    for topic in answer.related_topics {
        if results.len() >= limit {
            break;
        }
        let (Some(text), Some(url)) = (topic.text, topic.first_url) else {
            continue;
        };
        if text.is_empty() || url.is_empty() {
            continue;
        }
        let title = text.split(" - ").next().unwrap_or(&text).to_string();
        results.push(SearchResult {
            title,
            snippet: text,
            url,
        });
    }

    results.truncate(limit);
    results
}

/// [`SearchProvider`] backed by `api.duckduckgo.com`.
pub struct DuckDuckGoSearch {
    client: reqwest::Client,
    base_url: String,
}

impl DuckDuckGoSearch {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, SearchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SearchError::Request(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

impl SearchProvider for DuckDuckGoSearch {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>, SearchError> {
        let response = self
            .client
            .get(format!("{}/", self.base_url))
            .query(&[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .send()
            .await
            .map_err(|e| SearchError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Status(status.as_u16()));
        }

        // DuckDuckGo answers with `application/x-javascript`, so decode by hand.
        let body = response
            .text()
            .await
            .map_err(|e| SearchError::Request(e.to_string()))?;
        let answer: InstantAnswer = serde_json::from_str(&body)
            .map_err(|e| SearchError::InvalidResponse(e.to_string()))?;

        let results = normalize(answer, limit);
        tracing::debug!(query = %query, count = results.len(), "web search completed");
        Ok(results)
    }
}
