//! BoxConversationProvider -- object-safe dynamic dispatch wrapper.
//!
//! 1. Define an object-safe `ConversationProviderDyn` trait with boxed futures
//! 2. Blanket-impl `ConversationProviderDyn` for all `T: ConversationProvider`
//! 3. `BoxConversationProvider` wraps `Box<dyn ConversationProviderDyn>` and
//!    implements `ConversationProvider` itself, so generic code accepts it

use std::future::Future;
use std::pin::Pin;

use taskfixer_types::conversation::{FileRef, Message};
use taskfixer_types::upstream::{ToolOutput, UpstreamError};

use super::provider::{ConversationProvider, UpstreamStream};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Object-safe version of [`ConversationProvider`] with boxed futures.
pub trait ConversationProviderDyn: Send + Sync {
    fn name(&self) -> &str;

    fn create_thread_boxed(&self) -> BoxFuture<'_, Result<String, UpstreamError>>;

    fn append_message_boxed<'a>(
        &'a self,
        thread_id: &'a str,
        message: &'a Message,
    ) -> BoxFuture<'a, Result<(), UpstreamError>>;

    fn stream_run_boxed<'a>(
        &'a self,
        thread_id: &'a str,
    ) -> BoxFuture<'a, Result<UpstreamStream, UpstreamError>>;

    fn submit_tool_outputs_boxed<'a>(
        &'a self,
        thread_id: &'a str,
        run_id: &'a str,
        outputs: Vec<ToolOutput>,
    ) -> BoxFuture<'a, Result<UpstreamStream, UpstreamError>>;

    fn cancel_run_boxed<'a>(
        &'a self,
        thread_id: &'a str,
        run_id: &'a str,
    ) -> BoxFuture<'a, Result<(), UpstreamError>>;

    fn upload_file_boxed<'a>(
        &'a self,
        file_name: &'a str,
        bytes: Vec<u8>,
    ) -> BoxFuture<'a, Result<FileRef, UpstreamError>>;
}

impl<T: ConversationProvider> ConversationProviderDyn for T {
    fn name(&self) -> &str {
        ConversationProvider::name(self)
    }

    fn create_thread_boxed(&self) -> BoxFuture<'_, Result<String, UpstreamError>> {
        Box::pin(self.create_thread())
    }

    fn append_message_boxed<'a>(
        &'a self,
        thread_id: &'a str,
        message: &'a Message,
    ) -> BoxFuture<'a, Result<(), UpstreamError>> {
        Box::pin(self.append_message(thread_id, message))
    }

    fn stream_run_boxed<'a>(
        &'a self,
        thread_id: &'a str,
    ) -> BoxFuture<'a, Result<UpstreamStream, UpstreamError>> {
        Box::pin(self.stream_run(thread_id))
    }

    fn submit_tool_outputs_boxed<'a>(
        &'a self,
        thread_id: &'a str,
        run_id: &'a str,
        outputs: Vec<ToolOutput>,
    ) -> BoxFuture<'a, Result<UpstreamStream, UpstreamError>> {
        Box::pin(self.submit_tool_outputs(thread_id, run_id, outputs))
    }

    fn cancel_run_boxed<'a>(
        &'a self,
        thread_id: &'a str,
        run_id: &'a str,
    ) -> BoxFuture<'a, Result<(), UpstreamError>> {
        Box::pin(self.cancel_run(thread_id, run_id))
    }

    fn upload_file_boxed<'a>(
        &'a self,
        file_name: &'a str,
        bytes: Vec<u8>,
    ) -> BoxFuture<'a, Result<FileRef, UpstreamError>> {
        Box::pin(self.upload_file(file_name, bytes))
    }
}

/// Type-erased conversation provider.
///
/// Lets the application state hold the real Assistants client while tests
/// swap in a scripted provider without changing the relay's type.
pub struct BoxConversationProvider {
    inner: Box<dyn ConversationProviderDyn + Send + Sync>,
}

impl BoxConversationProvider {
    pub fn new<T: ConversationProvider + 'static>(provider: T) -> Self {
        Self {
            inner: Box::new(provider),
        }
    }
}

impl ConversationProvider for BoxConversationProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn create_thread(&self) -> impl Future<Output = Result<String, UpstreamError>> + Send {
        async move { self.inner.create_thread_boxed().await }
    }

    fn append_message(
        &self,
        thread_id: &str,
        message: &Message,
    ) -> impl Future<Output = Result<(), UpstreamError>> + Send {
        async move { self.inner.append_message_boxed(thread_id, message).await }
    }

    fn stream_run(
        &self,
        thread_id: &str,
    ) -> impl Future<Output = Result<UpstreamStream, UpstreamError>> + Send {
        async move { self.inner.stream_run_boxed(thread_id).await }
    }

    fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: Vec<ToolOutput>,
    ) -> impl Future<Output = Result<UpstreamStream, UpstreamError>> + Send {
        async move { self.inner.submit_tool_outputs_boxed(thread_id, run_id, outputs).await }
    }

    fn cancel_run(
        &self,
        thread_id: &str,
        run_id: &str,
    ) -> impl Future<Output = Result<(), UpstreamError>> + Send {
        async move { self.inner.cancel_run_boxed(thread_id, run_id).await }
    }

    fn upload_file(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> impl Future<Output = Result<FileRef, UpstreamError>> + Send {
        async move { self.inner.upload_file_boxed(file_name, bytes).await }
    }
}
