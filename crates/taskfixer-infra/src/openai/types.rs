//! OpenAI Assistants API types.
//!
//! Wire structures for HTTP communication with the Assistants API. They are
//! NOT the provider-agnostic types from `taskfixer-types::upstream`.

use serde::{Deserialize, Serialize};

use taskfixer_types::upstream::ToolOutput;

/// Request body for `POST /threads/{thread_id}/messages`.
#[derive(Debug, Clone, Serialize)]
pub struct CreateMessageRequest<'a> {
    pub role: &'a str,
    pub content: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<MessageAttachment<'a>>,
}

/// A file attached to a message, with the tools allowed to read it.
#[derive(Debug, Clone, Serialize)]
pub struct MessageAttachment<'a> {
    pub file_id: &'a str,
    pub tools: Vec<AttachmentTool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttachmentTool {
    #[serde(rename = "type")]
    pub kind: &'static str,
}

impl AttachmentTool {
    pub fn file_search() -> Self {
        Self {
            kind: "file_search",
        }
    }
}

/// Request body for `POST /threads/{thread_id}/runs`.
#[derive(Debug, Clone, Serialize)]
pub struct CreateRunRequest<'a> {
    pub assistant_id: &'a str,
    pub stream: bool,
}

/// Request body for `POST /threads/{thread_id}/runs/{run_id}/submit_tool_outputs`.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitToolOutputsRequest<'a> {
    pub tool_outputs: &'a [ToolOutput],
    pub stream: bool,
}

/// Any object response where only the id matters (threads, messages).
#[derive(Debug, Clone, Deserialize)]
pub struct ObjectId {
    pub id: String,
}

/// Response of `POST /files`.
#[derive(Debug, Clone, Deserialize)]
pub struct FileObject {
    pub id: String,
    #[serde(default)]
    pub filename: Option<String>,
}

/// Error envelope returned with non-2xx statuses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorDetail {
    pub message: String,
}

/// Best-effort extraction of the human-readable message from an error body.
pub fn api_error_message(body: &str) -> String {
    serde_json::from_str::<ApiErrorBody>(body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

// ---------------------------------------------------------------------------
// SSE event payload structs
//
// The Assistants stream names the event type in the `event:` field
// (e.g., "thread.run.created", "thread.message.delta") and carries the
// object as JSON in `data:`. Payloads are deserialized per event name.
// ---------------------------------------------------------------------------

/// Payload for every `thread.run.*` event.
#[derive(Debug, Clone, Deserialize)]
pub struct RunObject {
    pub id: String,
    #[serde(default)]
    pub required_action: Option<RequiredAction>,
    #[serde(default)]
    pub last_error: Option<RunLastError>,
    #[serde(default)]
    pub incomplete_details: Option<IncompleteDetails>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RequiredAction {
    pub submit_tool_outputs: SubmitToolOutputsAction,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitToolOutputsAction {
    pub tool_calls: Vec<RunToolCall>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunToolCall {
    pub id: String,
    pub function: RunFunctionCall,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunFunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunLastError {
    #[serde(default)]
    pub code: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IncompleteDetails {
    #[serde(default)]
    pub reason: Option<String>,
}

/// Payload for `thread.message.delta`.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageDeltaObject {
    pub delta: MessageDelta,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageDelta {
    #[serde(default)]
    pub content: Vec<MessageDeltaContent>,
}

/// One content part of a message delta. Non-text parts have no `text`.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageDeltaContent {
    #[serde(default)]
    pub text: Option<TextDeltaValue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextDeltaValue {
    #[serde(default)]
    pub value: Option<String>,
}
