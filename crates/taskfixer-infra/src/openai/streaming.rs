//! Assistants SSE stream to [`UpstreamEvent`] adapter.
//!
//! A run stream is a sequence of named server-sent events:
//! 1. `thread.run.created` (then queued / in_progress / step events, ignored)
//! 2. `thread.message.created` -> N x `thread.message.delta` -> `thread.message.completed`
//! 3. `thread.run.requires_action` pauses the run until tool outputs are submitted
//! 4. `thread.run.completed` or `thread.run.{failed,cancelled,expired,incomplete}`
//! 5. `done` with data `[DONE]`
//!
//! `error` events may appear mid-stream.

use futures_util::StreamExt;
use reqwest_eventsource::{Event, EventSource};

use taskfixer_core::conversation::UpstreamStream;
use taskfixer_types::upstream::{ToolCallRequest, UpstreamError, UpstreamEvent};

use super::types::{MessageDeltaObject, RunObject, api_error_message};

/// Translate one named SSE event into an [`UpstreamEvent`].
///
/// Returns `Ok(None)` for events the relay does not care about.
pub fn parse_run_event(event: &str, data: &str) -> Result<Option<UpstreamEvent>, UpstreamError> {
    match event {
        "thread.run.created" => {
            let run = parse_run(data)?;
            Ok(Some(UpstreamEvent::RunCreated { run_id: run.id }))
        }
        "thread.message.created" => Ok(Some(UpstreamEvent::MessageStarted)),
        "thread.message.delta" => {
            let delta: MessageDeltaObject = serde_json::from_str(data)
                .map_err(|e| UpstreamError::Deserialization(format!("message delta: {e}")))?;
            let text: String = delta
                .delta
                .content
                .into_iter()
                .filter_map(|part| part.text.and_then(|t| t.value))
                .collect();
            if text.is_empty() {
                Ok(None)
            } else {
                Ok(Some(UpstreamEvent::TextDelta { text }))
            }
        }
        "thread.run.requires_action" => {
            let run = parse_run(data)?;
            let tool_calls = run
                .required_action
                .map(|action| {
                    action
                        .submit_tool_outputs
                        .tool_calls
                        .into_iter()
                        .map(|call| ToolCallRequest {
                            id: call.id,
                            name: call.function.name,
                            arguments: call.function.arguments,
                        })
                        .collect()
                })
                .unwrap_or_default();
            Ok(Some(UpstreamEvent::RequiresAction {
                run_id: run.id,
                tool_calls,
            }))
        }
        "thread.run.completed" => Ok(Some(UpstreamEvent::Completed)),
        "thread.run.failed" => {
            let run = parse_run(data)?;
            let message = run
                .last_error
                .map(|e| e.message)
                .unwrap_or_else(|| "Run failed".to_string());
            Ok(Some(UpstreamEvent::Failed { message }))
        }
        "thread.run.cancelled" => Ok(Some(UpstreamEvent::Failed {
            message: "Run cancelled".to_string(),
        })),
        "thread.run.expired" => Ok(Some(UpstreamEvent::Failed {
            message: "Run expired".to_string(),
        })),
        "thread.run.incomplete" => {
            let run = parse_run(data)?;
            let message = match run.incomplete_details.and_then(|d| d.reason) {
                Some(reason) => format!("Run incomplete: {reason}"),
                None => "Run incomplete".to_string(),
            };
            Ok(Some(UpstreamEvent::Failed { message }))
        }
        "error" => Err(UpstreamError::Stream(error_event_message(data))),
        other => {
            tracing::trace!(event = %other, "ignoring assistants stream event");
            Ok(None)
        }
    }
}

/// Whether a message marks the end of the run stream.
pub fn is_done(event: &str, data: &str) -> bool {
    event == "done" || data.trim() == "[DONE]"
}

fn parse_run(data: &str) -> Result<RunObject, UpstreamError> {
    serde_json::from_str(data).map_err(|e| UpstreamError::Deserialization(format!("run object: {e}")))
}

fn error_event_message(data: &str) -> String {
    let value: serde_json::Value = match serde_json::from_str(data) {
        Ok(value) => value,
        Err(_) => return api_error_message(data),
    };
    value
        .get("message")
        .or_else(|| value.pointer("/error/message"))
        .and_then(|m| m.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| "Streaming failed".to_string())
}

/// Map a transport-level event source error to an [`UpstreamError`].
///
/// Non-2xx statuses read the error body so 401/429/404 keep their category.
pub async fn map_eventsource_error(err: reqwest_eventsource::Error) -> UpstreamError {
    match err {
        reqwest_eventsource::Error::InvalidStatusCode(status, response) => {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, body = %body, "Assistants stream API error response");
            UpstreamError::from_status(status.as_u16(), api_error_message(&body))
        }
        reqwest_eventsource::Error::Transport(e) => UpstreamError::Transport(e.to_string()),
        other => UpstreamError::Stream(other.to_string()),
    }
}

/// Map an opened [`EventSource`] to an [`UpstreamStream`].
///
/// The event source is closed on `done`, on the first error and on natural
/// end so it never reconnects on its own.
pub fn map_run_stream(event_source: EventSource) -> UpstreamStream {
    Box::pin(async_stream::try_stream! {
        let mut event_source = event_source;

        while let Some(next) = event_source.next().await {
            let message = match next {
                Ok(Event::Open) => continue,
                Ok(Event::Message(message)) => message,
                Err(reqwest_eventsource::Error::StreamEnded) => break,
                Err(e) => {
                    event_source.close();
                    Err::<(), _>(map_eventsource_error(e).await)?;
                    break;
                }
            };

            if is_done(&message.event, &message.data) {
                break;
            }

            let parsed = parse_run_event(&message.event, &message.data);
            if parsed.is_err() {
                event_source.close();
            }
            if let Some(event) = parsed? {
                yield event;
            }
        }

        event_source.close();
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_created() {
        let data = r#"{"id":"run_abc","object":"thread.run","status":"queued","thread_id":"thread_1"}"#;
        let event = parse_run_event("thread.run.created", data).unwrap();
        assert_eq!(
            event,
            Some(UpstreamEvent::RunCreated {
                run_id: "run_abc".into()
            })
        );
    }

    #[test]
    fn test_message_delta_concatenates_text_parts() {
        let data = r#"{
            "id":"msg_1","object":"thread.message.delta",
            "delta":{"content":[
                {"index":0,"type":"text","text":{"value":"Hello","annotations":[]}},
                {"index":1,"type":"text","text":{"value":" world"}}
            ]}
        }"#;
        let event = parse_run_event("thread.message.delta", data).unwrap();
        assert_eq!(
            event,
            Some(UpstreamEvent::TextDelta {
                text: "Hello world".into()
            })
        );
    }

    #[test]
    fn test_message_delta_without_text_is_skipped() {
        let data = r#"{"id":"msg_1","delta":{"content":[{"index":0,"type":"image_file","image_file":{"file_id":"f"}}]}}"#;
        assert_eq!(parse_run_event("thread.message.delta", data).unwrap(), None);
    }

    #[test]
    fn test_requires_action_extracts_tool_calls() {
        let data = r#"{
            "id":"run_abc","status":"requires_action",
            "required_action":{"type":"submit_tool_outputs","submit_tool_outputs":{"tool_calls":[
                {"id":"call_1","type":"function","function":{"name":"web_search","arguments":"{\"query\":\"rubrics\"}"}},
                {"id":"call_2","type":"function","function":{"name":"web_search","arguments":"{\"query\":\"bloom\",\"num_results\":2}"}}
            ]}}
        }"#;
        let event = parse_run_event("thread.run.requires_action", data)
            .unwrap()
            .unwrap();
        match event {
            UpstreamEvent::RequiresAction { run_id, tool_calls } => {
                assert_eq!(run_id, "run_abc");
                assert_eq!(tool_calls.len(), 2);
                assert_eq!(tool_calls[0].id, "call_1");
                assert_eq!(tool_calls[0].name, "web_search");
                assert_eq!(tool_calls[1].arguments, r#"{"query":"bloom","num_results":2}"#);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_requires_action_without_calls_yields_empty_list() {
        let data = r#"{"id":"run_abc","status":"requires_action"}"#;
        let event = parse_run_event("thread.run.requires_action", data).unwrap();
        assert_eq!(
            event,
            Some(UpstreamEvent::RequiresAction {
                run_id: "run_abc".into(),
                tool_calls: vec![]
            })
        );
    }

    #[test]
    fn test_terminal_run_events() {
        let completed = parse_run_event("thread.run.completed", r#"{"id":"run_abc"}"#).unwrap();
        assert_eq!(completed, Some(UpstreamEvent::Completed));

        let failed = parse_run_event(
            "thread.run.failed",
            r#"{"id":"run_abc","last_error":{"code":"server_error","message":"Sorry, something went wrong."}}"#,
        )
        .unwrap();
        assert_eq!(
            failed,
            Some(UpstreamEvent::Failed {
                message: "Sorry, something went wrong.".into()
            })
        );

        let incomplete = parse_run_event(
            "thread.run.incomplete",
            r#"{"id":"run_abc","incomplete_details":{"reason":"max_completion_tokens"}}"#,
        )
        .unwrap();
        assert_eq!(
            incomplete,
            Some(UpstreamEvent::Failed {
                message: "Run incomplete: max_completion_tokens".into()
            })
        );

        let expired = parse_run_event("thread.run.expired", r#"{"id":"run_abc"}"#).unwrap();
        assert!(matches!(expired, Some(UpstreamEvent::Failed { .. })));
    }

    #[test]
    fn test_error_event_is_stream_error() {
        let err = parse_run_event("error", r#"{"message":"Internal error","type":"server_error"}"#)
            .unwrap_err();
        assert_eq!(err, UpstreamError::Stream("Internal error".into()));

        let nested = parse_run_event("error", r#"{"error":{"message":"boom"}}"#).unwrap_err();
        assert_eq!(nested, UpstreamError::Stream("boom".into()));
    }

    #[test]
    fn test_unknown_events_ignored() {
        assert_eq!(
            parse_run_event("thread.run.step.created", r#"{"id":"step_1"}"#).unwrap(),
            None
        );
        assert_eq!(parse_run_event("thread.run.in_progress", "{}").unwrap(), None);
    }

    #[test]
    fn test_malformed_payload_is_deserialization_error() {
        let err = parse_run_event("thread.run.created", "not json").unwrap_err();
        assert!(matches!(err, UpstreamError::Deserialization(_)));
    }

    #[test]
    fn test_done_detection() {
        assert!(is_done("done", "[DONE]"));
        assert!(is_done("message", "[DONE]"));
        assert!(!is_done("thread.run.completed", "{}"));
    }
}
