//! Document export metering.
//!
//! POST /api/download-pdf
//!
//! Rendering happens client-side; the server only gates and counts exports.

use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use serde_json::{Value, json};
use uuid::Uuid;

use taskfixer_types::usage::QuotaGate;

use crate::http::error::AppError;
use crate::http::extractors::auth::Authenticated;
use crate::state::AppState;

/// Optional request header that makes a retried export count once.
pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

/// POST /api/download-pdf -- check the export quota and record one document.
pub async fn download_pdf(
    State(state): State<AppState>,
    auth: Authenticated,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    let check = state
        .ledger
        .check_quota(&auth.user_id, QuotaGate::Export)
        .await?;
    if !check.allowed {
        return Err(AppError::QuotaDenied(check));
    }

    let key = match headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
    {
        Some(client_key) => format!("export:{}:{}", auth.user_id, client_key.trim()),
        None => format!("export:{}", Uuid::now_v7()),
    };
    let applied = state
        .ledger
        .increment_document_count(&auth.user_id, &key)
        .await?;
    tracing::info!(user_id = %auth.user_id, applied, "PDF export recorded");

    Ok(Json(json!({
        "success": true,
        "message": "PDF download tracked successfully",
    })))
}
