//! Per-turn conversation helpers: thread reuse and user message submission.

use std::sync::Arc;

use taskfixer_types::conversation::{FileRef, Message};
use taskfixer_types::upstream::UpstreamError;
use tracing::{debug, info};

use super::provider::ConversationProvider;

/// Prepares the upstream thread for one user turn.
pub struct ConversationSession<P: ConversationProvider> {
    provider: Arc<P>,
}

impl<P: ConversationProvider> ConversationSession<P> {
    pub fn new(provider: Arc<P>) -> Self {
        Self { provider }
    }

    /// Return `existing` unchanged when it is non-empty, otherwise create a thread.
    pub async fn ensure_thread(&self, existing: Option<&str>) -> Result<String, UpstreamError> {
        if let Some(thread_id) = existing.filter(|id| !id.trim().is_empty()) {
            debug!(thread_id, "Reusing upstream thread");
            return Ok(thread_id.to_string());
        }

        let thread_id = self.provider.create_thread().await?;
        info!(thread_id = %thread_id, provider = self.provider.name(), "Created upstream thread");
        Ok(thread_id)
    }

    /// Append the user's turn to the thread. Each attachment is made
    /// available to the provider's file search.
    pub async fn submit_user_turn(
        &self,
        thread_id: &str,
        text: Option<&str>,
        file_ids: &[String],
    ) -> Result<Message, UpstreamError> {
        let attachments = file_ids.iter().map(FileRef::new).collect();
        let message = Message::user_turn(text, attachments);
        self.provider.append_message(thread_id, &message).await?;
        debug!(
            thread_id,
            attachments = message.attachments.len(),
            "User turn submitted"
        );
        Ok(message)
    }
}
