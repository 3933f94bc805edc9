//! Router test fixtures: a scripted provider and a temp-dir backed state.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tempfile::TempDir;
use uuid::Uuid;

use taskfixer_core::conversation::{BoxConversationProvider, ConversationProvider, UpstreamStream};
use taskfixer_infra::search::DuckDuckGoSearch;
use taskfixer_infra::sqlite::pool::{DatabasePool, database_url};
use taskfixer_types::config::AppConfig;
use taskfixer_types::conversation::{FileRef, Message};
use taskfixer_types::upstream::{ToolOutput, UpstreamError, UpstreamEvent};
use taskfixer_types::usage::SubscriptionTier;

use crate::state::AppState;

/// A run that streams `text` in word-sized deltas and completes.
pub(crate) fn completed_script(text: &str) -> Vec<UpstreamEvent> {
    let mut events = vec![
        UpstreamEvent::RunCreated {
            run_id: "run_test".into(),
        },
        UpstreamEvent::MessageStarted,
    ];
    events.extend(text.split_inclusive(' ').map(|part| UpstreamEvent::TextDelta {
        text: part.to_string(),
    }));
    events.push(UpstreamEvent::Completed);
    events
}

/// Provider replaying one event script per opened run.
pub(crate) struct ScriptedProvider {
    scripts: Mutex<VecDeque<Vec<UpstreamEvent>>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedProvider {
    fn next_stream(&self) -> UpstreamStream {
        let events = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| vec![UpstreamEvent::Completed]);
        Box::pin(futures_util::stream::iter(events.into_iter().map(Ok)))
    }
}

impl ConversationProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn create_thread(&self) -> Result<String, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok("thread_test".to_string())
    }

    async fn append_message(&self, _thread_id: &str, _message: &Message) -> Result<(), UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn stream_run(&self, _thread_id: &str) -> Result<UpstreamStream, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.next_stream())
    }

    async fn submit_tool_outputs(
        &self,
        _thread_id: &str,
        _run_id: &str,
        _outputs: Vec<ToolOutput>,
    ) -> Result<UpstreamStream, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.next_stream())
    }

    async fn cancel_run(&self, _thread_id: &str, _run_id: &str) -> Result<(), UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn upload_file(&self, file_name: &str, _bytes: Vec<u8>) -> Result<FileRef, UpstreamError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(FileRef {
            id: format!("file_{n}"),
            name: Some(file_name.to_string()),
        })
    }
}

/// An app state over a fresh database with one user and one API key.
pub(crate) struct TestApp {
    pub state: AppState,
    pub user_id: Uuid,
    pub api_key: String,
    calls: Arc<AtomicUsize>,
    _dir: TempDir,
}

impl TestApp {
    pub(crate) async fn new(tier: SubscriptionTier, scripts: Vec<Vec<UpstreamEvent>>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db_pool = DatabasePool::new(&database_url(dir.path())).await.unwrap();

        let mut config = AppConfig::default();
        config.openai.assistant_id = Some("asst_test".to_string());
        config.relay.timeout_secs = 5;

        let calls = Arc::new(AtomicUsize::new(0));
        let provider = ScriptedProvider {
            scripts: Mutex::new(scripts.into()),
            calls: calls.clone(),
        };
        // Nothing listens on the discard port; no test here searches.
        let search = DuckDuckGoSearch::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();

        let state = AppState::from_parts(
            config,
            db_pool,
            BoxConversationProvider::new(provider),
            search,
            dir.path().to_path_buf(),
        );

        let user = state.accounts.create_user("educator@example.com", tier).await.unwrap();
        let api_key = state.accounts.create_api_key(&user.id, "test").await.unwrap();

        Self {
            state,
            user_id: user.id,
            api_key,
            calls,
            _dir: dir,
        }
    }

    /// Upstream calls made so far, uploads included.
    pub(crate) fn provider_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}
