//! File upload into the provider's file store.
//!
//! POST /api/upload (multipart, one or more `files` / `files[]` parts)
//!
//! Files are uploaded concurrently; the returned ids are passed back as
//! `fileIds` on the next chat turn.

use axum::Json;
use axum::extract::{Multipart, State};
use futures_util::future::try_join_all;
use serde_json::{Value, json};

use taskfixer_core::conversation::ConversationProvider;

use crate::http::error::AppError;
use crate::http::extractors::auth::Authenticated;
use crate::state::AppState;

/// Request body limit for the upload route.
pub const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// POST /api/upload -- forward files to the provider file store.
pub async fn upload_files(
    State(state): State<AppState>,
    auth: Authenticated,
    mut multipart: Multipart,
) -> Result<Json<Value>, AppError> {
    let mut files = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {e}")))?
    {
        if !matches!(field.name(), Some("files" | "files[]")) {
            continue;
        }
        let name = field.file_name().unwrap_or("upload").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Failed to read {name}: {e}")))?;
        files.push((name, bytes.to_vec()));
    }

    if files.is_empty() {
        return Err(AppError::Validation("No files provided".to_string()));
    }

    let uploads = files.into_iter().map(|(name, bytes)| {
        let provider = state.provider.clone();
        async move {
            provider
                .upload_file(&name, bytes)
                .await
                .map_err(|e| AppError::Internal(format!("Failed to upload {name}: {}", e.client_message())))
        }
    });
    let uploaded = try_join_all(uploads).await?;

    tracing::info!(user_id = %auth.user_id, count = uploaded.len(), "Files uploaded");
    Ok(Json(json!({ "files": uploaded })))
}
