//! Wire encoding of relay events for the chat SSE stream.
//!
//! Each event is one `data: <JSON>` frame:
//! - `{ "threadId": "..." }`
//! - `{ "status": "streaming" }`
//! - `{ "delta": "...", "content": "..." }`
//! - `{ "status": "searching" }`
//! - `{ "status": "resumed" }`
//! - `{ "status": "complete", "content": "...", "redesignComplete": bool }`
//! - `{ "error": "..." }`
//!
//! The stream always ends with `data: [DONE]`.

use std::convert::Infallible;

use axum::response::sse::Event;
use futures_util::{Stream, StreamExt};
use serde_json::{Value, json};

use taskfixer_core::classify::ReplyClassifier;
use taskfixer_types::relay::StreamEvent;

/// Sentinel data of the final frame.
pub const DONE_SENTINEL: &str = "[DONE]";

/// JSON payload of one relay event.
pub fn encode_event(event: &StreamEvent, classifier: &dyn ReplyClassifier) -> Value {
    match event {
        StreamEvent::ThreadAssigned { thread_id } => json!({ "threadId": thread_id }),
        StreamEvent::GenerationStarted => json!({ "status": "streaming" }),
        StreamEvent::TokenDelta { delta, content } => json!({ "delta": delta, "content": content }),
        StreamEvent::ToolInvocationStarted => json!({ "status": "searching" }),
        StreamEvent::ToolResultSubmitted => json!({ "status": "resumed" }),
        StreamEvent::GenerationComplete { full_text } => json!({
            "status": "complete",
            "content": full_text,
            "redesignComplete": classifier.is_redesign_complete(full_text),
        }),
        StreamEvent::Error { message } => json!({ "error": message }),
    }
}

/// Turn relay events into SSE frames, closing with the `[DONE]` sentinel.
pub fn sse_frames<S, C>(
    events: S,
    classifier: C,
) -> impl Stream<Item = Result<Event, Infallible>> + Send + 'static
where
    S: Stream<Item = StreamEvent> + Send + Unpin + 'static,
    C: AsRef<dyn ReplyClassifier> + Send + 'static,
{
    async_stream::stream! {
        let mut events = events;
        while let Some(event) = events.next().await {
            let payload = encode_event(&event, classifier.as_ref());
            yield Ok::<_, Infallible>(Event::default().data(payload.to_string()));
        }
        yield Ok(Event::default().data(DONE_SENTINEL));
    }
}
