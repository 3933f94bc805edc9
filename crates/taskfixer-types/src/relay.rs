//! Relay events, states, and the per-relay report.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// In-band message sent when a relay hits its deadline.
pub const TIMEOUT_MESSAGE: &str = "Request timed out. This question may be outside my scope. \
Please ask about assignment redesign, teaching strategies, or educational content.";

/// One inbound chat request as seen by the relay.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub user_id: Uuid,
    pub message: Option<String>,
    pub thread_id: Option<String>,
    #[serde(default)]
    pub file_ids: Vec<String>,
}

impl ChatTurn {
    /// A turn needs text or at least one attachment.
    pub fn has_content(&self) -> bool {
        let has_text = self
            .message
            .as_deref()
            .is_some_and(|m| !m.trim().is_empty());
        has_text || !self.file_ids.is_empty()
    }
}

/// Event emitted by a relay toward the client. Closed set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    ThreadAssigned { thread_id: String },
    GenerationStarted,
    /// `content` is the full accumulated text including `delta`.
    TokenDelta { delta: String, content: String },
    ToolInvocationStarted,
    ToolResultSubmitted,
    GenerationComplete { full_text: String },
    Error { message: String },
}

impl StreamEvent {
    /// Terminal events end the client stream.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StreamEvent::GenerationComplete { .. } | StreamEvent::Error { .. }
        )
    }
}

/// Lifecycle state of a single relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayState {
    Idle,
    QuotaChecking,
    ThreadPreparing,
    Generating,
    ToolPending,
    Completing,
    Closed,
    Aborted,
}

impl RelayState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RelayState::Closed | RelayState::Aborted)
    }
}

impl fmt::Display for RelayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RelayState::Idle => "idle",
            RelayState::QuotaChecking => "quota_checking",
            RelayState::ThreadPreparing => "thread_preparing",
            RelayState::Generating => "generating",
            RelayState::ToolPending => "tool_pending",
            RelayState::Completing => "completing",
            RelayState::Closed => "closed",
            RelayState::Aborted => "aborted",
        };
        write!(f, "{s}")
    }
}

/// Why a relay ended in [`RelayState::Aborted`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum AbortReason {
    Timeout,
    Upstream(String),
    ClientDisconnected,
    Cancelled,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::Timeout => write!(f, "timeout"),
            AbortReason::Upstream(message) => write!(f, "upstream: {message}"),
            AbortReason::ClientDisconnected => write!(f, "client disconnected"),
            AbortReason::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Summary of a finished relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayReport {
    pub relay_id: Uuid,
    pub thread_id: String,
    pub final_state: RelayState,
    /// Every state the relay entered, in order.
    pub transitions: Vec<RelayState>,
    pub abort_reason: Option<AbortReason>,
    pub full_text: String,
    pub tool_rounds: u32,
    /// Whether usage accounting was handed to the background tracker.
    pub accounting_scheduled: bool,
}

impl RelayReport {
    pub fn entered(&self, state: RelayState) -> bool {
        self.transitions.contains(&state)
    }
}
