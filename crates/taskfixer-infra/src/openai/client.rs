//! OpenAiAssistantsProvider -- concrete [`ConversationProvider`] for the
//! OpenAI Assistants v2 API.
//!
//! Threads, messages and runs are plain JSON requests. Runs are opened with
//! `stream: true` through `reqwest-eventsource`; the provider waits for the
//! connection to open so HTTP status errors surface before any event.
//!
//! The API key is wrapped in [`secrecy::SecretString`] and is only exposed
//! when building request headers.

use std::time::Duration;

use futures_util::StreamExt;
use reqwest::RequestBuilder;
use reqwest_eventsource::{Event, EventSource};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;

use taskfixer_core::conversation::{ConversationProvider, UpstreamStream};
use taskfixer_types::conversation::{FileRef, Message};
use taskfixer_types::upstream::{ToolOutput, UpstreamError};

use super::streaming::{map_eventsource_error, map_run_stream};
use super::types::{
    AttachmentTool, CreateMessageRequest, CreateRunRequest, FileObject, MessageAttachment,
    ObjectId, SubmitToolOutputsRequest, api_error_message,
};

/// Message returned when no assistant id is configured.
pub const ASSISTANT_NOT_CONFIGURED: &str =
    "Assistant not configured. Please set OPENAI_ASSISTANT_ID in environment variables.";

/// OpenAI Assistants provider.
///
/// Does NOT derive Debug; the API key must never reach log output.
pub struct OpenAiAssistantsProvider {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    assistant_id: Option<String>,
}

impl OpenAiAssistantsProvider {
    const BETA_HEADER: &'static str = "assistants=v2";

    /// Create a new provider.
    ///
    /// `base_url` is the API root (e.g. `https://api.openai.com/v1`).
    pub fn new(
        api_key: SecretString,
        base_url: impl Into<String>,
        assistant_id: Option<String>,
    ) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| UpstreamError::Transport(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            assistant_id,
        })
    }

    pub fn assistant_id(&self) -> Option<&str> {
        self.assistant_id.as_deref()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.client
            .post(self.url(path))
            .bearer_auth(self.api_key.expose_secret())
            .header("OpenAI-Beta", Self::BETA_HEADER)
    }

    fn require_assistant(&self) -> Result<&str, UpstreamError> {
        self.assistant_id().ok_or_else(|| UpstreamError::Status {
            status: 500,
            message: ASSISTANT_NOT_CONFIGURED.to_string(),
        })
    }

    /// Send a JSON request and decode the response body.
    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, UpstreamError> {
        let response = request
            .send()
            .await
            .map_err(|e| UpstreamError::Transport(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, body = %error_body, "Assistants API error response");
            return Err(UpstreamError::from_status(
                status.as_u16(),
                api_error_message(&error_body),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| UpstreamError::Deserialization(format!("failed to parse response: {e}")))
    }

    /// Open an SSE run stream, resolving once the response headers arrive.
    async fn open_stream(&self, request: RequestBuilder) -> Result<UpstreamStream, UpstreamError> {
        let mut event_source = EventSource::new(request)
            .map_err(|e| UpstreamError::Transport(format!("failed to create event source: {e}")))?;

        match event_source.next().await {
            Some(Ok(Event::Open)) => Ok(map_run_stream(event_source)),
            Some(Ok(Event::Message(message))) => {
                event_source.close();
                Err(UpstreamError::Stream(format!(
                    "unexpected '{}' event before stream open",
                    message.event
                )))
            }
            Some(Err(e)) => {
                event_source.close();
                Err(map_eventsource_error(e).await)
            }
            None => Err(UpstreamError::Stream("stream closed before open".to_string())),
        }
    }
}

impl ConversationProvider for OpenAiAssistantsProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn create_thread(&self) -> Result<String, UpstreamError> {
        let thread: ObjectId = self
            .send_json(self.post("/threads").json(&serde_json::json!({})))
            .await?;
        tracing::debug!(thread_id = %thread.id, "created assistants thread");
        Ok(thread.id)
    }

    async fn append_message(&self, thread_id: &str, message: &Message) -> Result<(), UpstreamError> {
        let body = CreateMessageRequest {
            role: "user",
            content: &message.content,
            attachments: message
                .attachments
                .iter()
                .map(|file| MessageAttachment {
                    file_id: &file.id,
                    tools: vec![AttachmentTool::file_search()],
                })
                .collect(),
        };
        let _: ObjectId = self
            .send_json(self.post(&format!("/threads/{thread_id}/messages")).json(&body))
            .await?;
        Ok(())
    }

    async fn stream_run(&self, thread_id: &str) -> Result<UpstreamStream, UpstreamError> {
        let body = CreateRunRequest {
            assistant_id: self.require_assistant()?,
            stream: true,
        };
        self.open_stream(self.post(&format!("/threads/{thread_id}/runs")).json(&body))
            .await
    }

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: Vec<ToolOutput>,
    ) -> Result<UpstreamStream, UpstreamError> {
        let body = SubmitToolOutputsRequest {
            tool_outputs: &outputs,
            stream: true,
        };
        self.open_stream(
            self.post(&format!(
                "/threads/{thread_id}/runs/{run_id}/submit_tool_outputs"
            ))
            .json(&body),
        )
        .await
    }

    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<(), UpstreamError> {
        let _: ObjectId = self
            .send_json(self.post(&format!("/threads/{thread_id}/runs/{run_id}/cancel")))
            .await?;
        Ok(())
    }

    async fn upload_file(&self, file_name: &str, bytes: Vec<u8>) -> Result<FileRef, UpstreamError> {
        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name.to_string());
        let form = reqwest::multipart::Form::new()
            .text("purpose", "assistants")
            .part("file", part);

        let file: FileObject = self.send_json(self.post("/files").multipart(form)).await?;
        Ok(FileRef {
            id: file.id,
            name: Some(file.filename.unwrap_or_else(|| file_name.to_string())),
        })
    }
}
