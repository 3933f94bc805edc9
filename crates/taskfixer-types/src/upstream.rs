//! Provider-agnostic vocabulary of an upstream run stream.
//!
//! Adapters in `taskfixer-infra` translate wire events (Assistants SSE)
//! into [`UpstreamEvent`]; the relay never sees provider JSON.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A tool call the provider wants resolved before it can continue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    /// Raw JSON arguments as sent by the provider.
    pub arguments: String,
}

/// Output for one tool call, keyed by the call id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub tool_call_id: String,
    pub output: String,
}

/// One event from an upstream run stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UpstreamEvent {
    RunCreated { run_id: String },
    MessageStarted,
    TextDelta { text: String },
    /// The run is paused until every listed call has an output.
    RequiresAction {
        run_id: String,
        tool_calls: Vec<ToolCallRequest>,
    },
    Completed,
    Failed { message: String },
}

/// Errors from the upstream AI provider.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UpstreamError {
    #[error("authentication failed")]
    Authentication,

    #[error("rate limited")]
    RateLimited,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("upstream status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("run failed: {0}")]
    RunFailed(String),

    #[error("stream error: {0}")]
    Stream(String),

    #[error("deserialization error: {0}")]
    Deserialization(String),

    #[error("transport error: {0}")]
    Transport(String),
}

impl UpstreamError {
    /// Map an HTTP status and body message to the matching variant.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 => UpstreamError::Authentication,
            429 => UpstreamError::RateLimited,
            404 => UpstreamError::NotFound(message),
            _ => UpstreamError::Status { status, message },
        }
    }

    /// HTTP status used when this error surfaces before the first byte.
    pub fn http_status(&self) -> u16 {
        match self {
            UpstreamError::Authentication => 401,
            UpstreamError::RateLimited => 429,
            UpstreamError::NotFound(_) => 404,
            _ => 500,
        }
    }

    /// User-facing message for this error category.
    pub fn client_message(&self) -> String {
        match self {
            UpstreamError::Authentication => "Invalid API key".to_string(),
            UpstreamError::RateLimited => "Rate limit exceeded".to_string(),
            UpstreamError::NotFound(_) => "Assistant or thread not found".to_string(),
            UpstreamError::RunFailed(message) | UpstreamError::Status { message, .. } => {
                message.clone()
            }
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_categories() {
        assert_eq!(UpstreamError::from_status(401, "bad key"), UpstreamError::Authentication);
        assert_eq!(UpstreamError::from_status(429, "slow down"), UpstreamError::RateLimited);
        assert_eq!(
            UpstreamError::from_status(404, "no thread"),
            UpstreamError::NotFound("no thread".to_string())
        );
        assert_eq!(
            UpstreamError::from_status(502, "gateway"),
            UpstreamError::Status {
                status: 502,
                message: "gateway".to_string()
            }
        );
    }

    #[test]
    fn test_client_messages() {
        assert_eq!(UpstreamError::Authentication.client_message(), "Invalid API key");
        assert_eq!(UpstreamError::RateLimited.client_message(), "Rate limit exceeded");
        assert_eq!(
            UpstreamError::NotFound("x".into()).client_message(),
            "Assistant or thread not found"
        );
        assert_eq!(
            UpstreamError::RunFailed("server_error".into()).client_message(),
            "server_error"
        );
        assert_eq!(
            UpstreamError::Status {
                status: 500,
                message: "Assistant not configured.".into()
            }
            .client_message(),
            "Assistant not configured."
        );
    }

    #[test]
    fn test_http_status() {
        assert_eq!(UpstreamError::RateLimited.http_status(), 429);
        assert_eq!(UpstreamError::Stream("eof".into()).http_status(), 500);
    }

    #[test]
    fn test_event_serde_tag() {
        let event = UpstreamEvent::TextDelta {
            text: "Hi".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "text_delta");
        assert_eq!(json["text"], "Hi");
    }
}
