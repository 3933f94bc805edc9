//! Application error type mapping to HTTP status codes.
//!
//! Every error body is `{"error": "<message>"}`. Quota denials add the
//! upgrade shape: `usage`, `limits` and `upgradeRequired: true`.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use taskfixer_core::relay::RelayError;
use taskfixer_types::error::RepositoryError;
use taskfixer_types::upstream::UpstreamError;
use taskfixer_types::usage::QuotaCheck;

/// Message for a request that carries neither text nor files.
pub const EMPTY_TURN_MESSAGE: &str = "Message string or files are required";

/// Message for a relay that hit its deadline before streaming.
pub const PRE_STREAM_TIMEOUT_MESSAGE: &str = "Request timed out before the response started";

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Authentication failure.
    Unauthorized(String),
    /// Validation error.
    Validation(String),
    /// Unknown resource.
    NotFound(String),
    /// A quota check failed; carries usage and limits for the upgrade prompt.
    QuotaDenied(QuotaCheck),
    /// Upstream provider failure before the first streamed byte.
    Upstream(UpstreamError),
    /// Deadline reached before the first streamed byte.
    Timeout,
    /// The relay was cancelled before it started streaming.
    Cancelled,
    /// Generic internal error.
    Internal(String),
}

impl From<RepositoryError> for AppError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound => AppError::NotFound("User not found".to_string()),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<UpstreamError> for AppError {
    fn from(e: UpstreamError) -> Self {
        AppError::Upstream(e)
    }
}

impl From<RelayError> for AppError {
    fn from(e: RelayError) -> Self {
        match e {
            RelayError::EmptyTurn => AppError::Validation(EMPTY_TURN_MESSAGE.to_string()),
            RelayError::QuotaDenied(check) => AppError::QuotaDenied(check),
            RelayError::Ledger(e) => AppError::Internal(e.to_string()),
            RelayError::Upstream(e) => AppError::Upstream(e),
            RelayError::Timeout => AppError::Timeout,
            RelayError::Cancelled => AppError::Cancelled,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::QuotaDenied(check) => (
                StatusCode::FORBIDDEN,
                json!({
                    "error": check.reason.unwrap_or_else(|| "Usage limit reached".to_string()),
                    "usage": check.usage,
                    "limits": check.limits,
                    "upgradeRequired": true,
                }),
            ),
            AppError::Upstream(e) => {
                tracing::warn!(error = %e, "Upstream error before streaming");
                let status = StatusCode::from_u16(e.http_status())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                (status, json!({ "error": e.client_message() }))
            }
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, json!({ "error": msg })),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            AppError::Timeout => (
                StatusCode::GATEWAY_TIMEOUT,
                json!({ "error": PRE_STREAM_TIMEOUT_MESSAGE }),
            ),
            AppError::Cancelled => (
                StatusCode::CONFLICT,
                json!({ "error": taskfixer_core::relay::CANCELLED_MESSAGE }),
            ),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": msg }))
            }
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use taskfixer_types::usage::{QuotaLimits, UsageCounters};

    async fn render(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let body = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_quota_denied_has_upgrade_shape() {
        let check = QuotaCheck::deny(
            "You've used 800 of your 800 free trial words. Upgrade for unlimited access.",
            Some(UsageCounters {
                word_count_used: 800,
                ..Default::default()
            }),
            Some(QuotaLimits {
                max_words: 800,
                max_documents: 1,
                max_files: None,
            }),
        );
        let (status, body) = render(AppError::QuotaDenied(check)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["upgradeRequired"], true);
        assert_eq!(body["usage"]["wordCount"], 800);
        assert_eq!(body["limits"]["maxWords"], 800);
        assert!(body["error"].as_str().unwrap().contains("800"));
    }

    #[tokio::test]
    async fn test_upstream_categories() {
        let (status, body) = render(AppError::Upstream(UpstreamError::Authentication)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid API key");

        let (status, body) = render(AppError::Upstream(UpstreamError::RateLimited)).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["error"], "Rate limit exceeded");

        let (status, body) =
            render(AppError::Upstream(UpstreamError::NotFound("thread".into()))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Assistant or thread not found");

        let (status, _) =
            render(AppError::Upstream(UpstreamError::Transport("reset".into()))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_relay_error_mapping() {
        let (status, body) = render(RelayError::EmptyTurn.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], EMPTY_TURN_MESSAGE);

        let (status, _) = render(RelayError::Timeout.into()).await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);

        let (status, _) = render(RelayError::Ledger(RepositoryError::Connection).into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
