//! SSE streaming chat endpoint and inbound cancellation.
//!
//! POST /api/chat
//!
//! Checks the word quota, prepares the upstream thread and streams the
//! assistant's reply as Server-Sent Events (see `http::sse` for the frame
//! encoding). Everything that fails before the first frame is a plain HTTP
//! error; later failures arrive in-band as one `{ "error" }` frame.
//!
//! POST /api/chat/{relay_id}/cancel
//!
//! Cancels a streaming relay owned by the caller.

use std::time::Duration;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::response::sse::{KeepAlive, Sse};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info_span, warn};
use uuid::Uuid;

use taskfixer_infra::openai::client::ASSISTANT_NOT_CONFIGURED;
use taskfixer_observe::genai_attrs::{GEN_AI_CONVERSATION_ID, OP_CHAT};
use taskfixer_types::relay::ChatTurn;

use crate::http::error::{AppError, EMPTY_TURN_MESSAGE};
use crate::http::extractors::auth::Authenticated;
use crate::http::sse::sse_frames;
use crate::state::{ActiveRelay, AppState};

/// Response header carrying the relay id, used by the cancel endpoint.
pub const RELAY_ID_HEADER: &str = "x-relay-id";

/// Request body for the streaming chat endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// The user's message. Optional when files are attached.
    pub message: Option<String>,
    /// Upstream thread to continue; a new one is created when absent.
    pub thread_id: Option<String>,
    /// Provider file ids from a previous upload.
    #[serde(default)]
    pub file_ids: Vec<String>,
}

/// POST /api/chat -- SSE streaming chat.
pub async fn stream_chat(
    State(state): State<AppState>,
    auth: Authenticated,
    Json(body): Json<ChatRequest>,
) -> Result<impl IntoResponse, AppError> {
    let turn = ChatTurn {
        user_id: auth.user_id,
        message: body.message,
        thread_id: body.thread_id,
        file_ids: body.file_ids,
    };
    if !turn.has_content() {
        return Err(AppError::Validation(EMPTY_TURN_MESSAGE.to_string()));
    }
    if state.config.openai.assistant_id.is_none() {
        return Err(AppError::Internal(ASSISTANT_NOT_CONFIGURED.to_string()));
    }

    let span = info_span!(
        "chat_request",
        gen_ai.operation.name = OP_CHAT,
        gen_ai.conversation.id = tracing::field::Empty,
        user_id = %auth.user_id,
    );
    let cancel = CancellationToken::new();
    let relay = state
        .relay
        .open(turn, cancel.clone())
        .instrument(span.clone())
        .await?;
    span.record(GEN_AI_CONVERSATION_ID, relay.thread_id.as_str());

    let relay_id = relay.relay_id;
    state.active_relays.insert(
        relay_id,
        ActiveRelay {
            user_id: auth.user_id,
            cancel,
        },
    );

    // Deregister once the driver has finalized, whatever the outcome.
    let active_relays = state.active_relays.clone();
    let report = relay.report;
    state.tracker.spawn(
        async move {
            match report.await {
                Ok(report) => debug!(
                    relay_id = %report.relay_id,
                    final_state = %report.final_state,
                    tool_rounds = report.tool_rounds,
                    "Relay finished"
                ),
                Err(e) => warn!(relay_id = %relay_id, error = %e, "Relay driver panicked"),
            }
            active_relays.remove(&relay_id);
        }
        .instrument(span),
    );

    let frames = sse_frames(relay.events, state.classifier.clone());
    let sse = Sse::new(frames).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)));

    let relay_header = HeaderValue::try_from(relay_id.to_string())
        .map_err(|e| AppError::Internal(format!("invalid relay id header: {e}")))?;
    Ok((
        [(HeaderName::from_static(RELAY_ID_HEADER), relay_header)],
        sse,
    ))
}

/// POST /api/chat/{relay_id}/cancel -- cancel a streaming relay.
///
/// Only the user who opened the relay may cancel it.
pub async fn cancel_chat(
    State(state): State<AppState>,
    auth: Authenticated,
    Path(relay_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let entry = state
        .active_relays
        .get(&relay_id)
        .filter(|entry| entry.user_id == auth.user_id)
        .map(|entry| entry.cancel.clone());

    match entry {
        Some(cancel) => {
            cancel.cancel();
            debug!(relay_id = %relay_id, "Relay cancel requested");
            Ok(StatusCode::NO_CONTENT)
        }
        None => Err(AppError::NotFound("Relay not found".to_string())),
    }
}
