//! ConversationProvider trait definition.
//!
//! The abstraction over a thread-based AI assistant backend. Uses RPITIT
//! for request/response calls. Opening a run is async so that HTTP status
//! errors surface before the first byte is relayed; the opened run itself
//! is a boxed stream so the trait stays usable behind
//! `BoxConversationProvider`.

use std::pin::Pin;

use futures_util::Stream;

use taskfixer_types::conversation::{FileRef, Message};
use taskfixer_types::upstream::{ToolOutput, UpstreamError, UpstreamEvent};

/// A live upstream run stream.
pub type UpstreamStream =
    Pin<Box<dyn Stream<Item = Result<UpstreamEvent, UpstreamError>> + Send + 'static>>;

/// Trait for thread-based assistant backends.
///
/// Implementations live in taskfixer-infra (e.g., `OpenAiAssistantsProvider`).
pub trait ConversationProvider: Send + Sync {
    /// Human-readable provider name (e.g., "openai").
    fn name(&self) -> &str;

    /// Create a new upstream thread and return its id.
    fn create_thread(
        &self,
    ) -> impl std::future::Future<Output = Result<String, UpstreamError>> + Send;

    /// Append a message to a thread.
    fn append_message(
        &self,
        thread_id: &str,
        message: &Message,
    ) -> impl std::future::Future<Output = Result<(), UpstreamError>> + Send;

    /// Start a streaming run on a thread.
    ///
    /// Resolves once the upstream has accepted the run. Status errors
    /// (401, 429, 404) are returned here; the relay reports them to the
    /// client as one in-band error after the thread id.
    fn stream_run(
        &self,
        thread_id: &str,
    ) -> impl std::future::Future<Output = Result<UpstreamStream, UpstreamError>> + Send;

    /// Submit every tool output of a paused run in one request and resume it.
    ///
    /// The returned stream replaces the paused one.
    fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: Vec<ToolOutput>,
    ) -> impl std::future::Future<Output = Result<UpstreamStream, UpstreamError>> + Send;

    /// Best-effort cancellation of an in-flight run.
    fn cancel_run(
        &self,
        thread_id: &str,
        run_id: &str,
    ) -> impl std::future::Future<Output = Result<(), UpstreamError>> + Send;

    /// Upload a file into the provider's file store.
    fn upload_file(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> impl std::future::Future<Output = Result<FileRef, UpstreamError>> + Send;
}
