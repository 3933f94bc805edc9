//! Scripted test doubles shared by the core unit tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use taskfixer_types::conversation::{FileRef, Message};
use taskfixer_types::error::RepositoryError;
use taskfixer_types::tool::{SearchError, SearchResult};
use taskfixer_types::upstream::{ToolCallRequest, ToolOutput, UpstreamError, UpstreamEvent};
use taskfixer_types::usage::{
    SubscriptionProfile, SubscriptionStatus, SubscriptionTier, UsageCounters, UsageField,
};
use uuid::Uuid;

use crate::conversation::{ConversationProvider, UpstreamStream};
use crate::tool::SearchProvider;
use crate::usage::UsageRepository;

// --- Conversation provider ---

/// One scripted step of an upstream stream.
pub(crate) enum Step {
    Event(UpstreamEvent),
    Error(UpstreamError),
    Delay(Duration),
    /// Never yields again.
    Pending,
}

impl Step {
    pub(crate) fn run_created(run_id: &str) -> Self {
        Step::Event(UpstreamEvent::RunCreated {
            run_id: run_id.to_string(),
        })
    }

    pub(crate) fn message_started() -> Self {
        Step::Event(UpstreamEvent::MessageStarted)
    }

    pub(crate) fn text(text: &str) -> Self {
        Step::Event(UpstreamEvent::TextDelta {
            text: text.to_string(),
        })
    }

    pub(crate) fn requires_action(run_id: &str, calls: Vec<ToolCallRequest>) -> Self {
        Step::Event(UpstreamEvent::RequiresAction {
            run_id: run_id.to_string(),
            tool_calls: calls,
        })
    }

    pub(crate) fn completed() -> Self {
        Step::Event(UpstreamEvent::Completed)
    }
}

pub(crate) fn search_call(id: &str, query: &str) -> ToolCallRequest {
    ToolCallRequest {
        id: id.to_string(),
        name: "web_search".to_string(),
        arguments: serde_json::json!({ "query": query }).to_string(),
    }
}

#[derive(Default)]
struct CallCounts {
    threads_created: AtomicUsize,
    messages: AtomicUsize,
    stream_runs: AtomicUsize,
    submits: AtomicUsize,
    cancels: AtomicUsize,
    uploads: AtomicUsize,
    streams_dropped: AtomicUsize,
}

/// Shared view of how a [`MockProvider`] was called.
#[derive(Clone, Default)]
pub(crate) struct CallLog {
    inner: Arc<CallCounts>,
}

impl CallLog {
    pub(crate) fn threads_created(&self) -> usize {
        self.inner.threads_created.load(Ordering::SeqCst)
    }

    pub(crate) fn messages(&self) -> usize {
        self.inner.messages.load(Ordering::SeqCst)
    }

    pub(crate) fn stream_runs(&self) -> usize {
        self.inner.stream_runs.load(Ordering::SeqCst)
    }

    pub(crate) fn submits(&self) -> usize {
        self.inner.submits.load(Ordering::SeqCst)
    }

    pub(crate) fn cancels(&self) -> usize {
        self.inner.cancels.load(Ordering::SeqCst)
    }

    pub(crate) fn streams_dropped(&self) -> usize {
        self.inner.streams_dropped.load(Ordering::SeqCst)
    }

    pub(crate) fn total_upstream_calls(&self) -> usize {
        self.threads_created()
            + self.messages()
            + self.stream_runs()
            + self.submits()
            + self.cancels()
            + self.inner.uploads.load(Ordering::SeqCst)
    }
}

struct DropSignal(CallLog);

impl Drop for DropSignal {
    fn drop(&mut self) {
        self.0.inner.streams_dropped.fetch_add(1, Ordering::SeqCst);
    }
}

/// Provider that replays one script per opened stream, in order.
pub(crate) struct MockProvider {
    scripts: Mutex<VecDeque<Vec<Step>>>,
    open_error: Option<UpstreamError>,
    calls: CallLog,
    appended: Arc<Mutex<Vec<(String, Message)>>>,
    submitted: Arc<Mutex<Vec<Vec<ToolOutput>>>>,
}

impl MockProvider {
    pub(crate) fn new(scripts: Vec<Vec<Step>>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            open_error: None,
            calls: CallLog::default(),
            appended: Arc::new(Mutex::new(Vec::new())),
            submitted: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every `stream_run` fails with `error` before streaming.
    pub(crate) fn failing_open(error: UpstreamError) -> Self {
        Self {
            open_error: Some(error),
            ..Self::new(vec![])
        }
    }

    pub(crate) fn calls(&self) -> CallLog {
        self.calls.clone()
    }

    pub(crate) fn appended_messages(&self) -> Vec<(String, Message)> {
        self.appended.lock().unwrap().clone()
    }

    pub(crate) fn submitted_outputs(&self) -> Arc<Mutex<Vec<Vec<ToolOutput>>>> {
        self.submitted.clone()
    }

    fn next_stream(&self) -> UpstreamStream {
        let steps = self.scripts.lock().unwrap().pop_front().unwrap_or_default();
        let signal = DropSignal(self.calls.clone());
        Box::pin(async_stream::stream! {
            let _signal = signal;
            for step in steps {
                match step {
                    Step::Event(event) => yield Ok(event),
                    Step::Error(error) => yield Err(error),
                    Step::Delay(duration) => tokio::time::sleep(duration).await,
                    Step::Pending => std::future::pending::<()>().await,
                }
            }
        })
    }
}

impl ConversationProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn create_thread(&self) -> Result<String, UpstreamError> {
        let n = self.calls.inner.threads_created.fetch_add(1, Ordering::SeqCst);
        Ok(format!("thread_mock_{n}"))
    }

    async fn append_message(&self, thread_id: &str, message: &Message) -> Result<(), UpstreamError> {
        self.calls.inner.messages.fetch_add(1, Ordering::SeqCst);
        self.appended
            .lock()
            .unwrap()
            .push((thread_id.to_string(), message.clone()));
        Ok(())
    }

    async fn stream_run(&self, _thread_id: &str) -> Result<UpstreamStream, UpstreamError> {
        self.calls.inner.stream_runs.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = &self.open_error {
            return Err(error.clone());
        }
        Ok(self.next_stream())
    }

    async fn submit_tool_outputs(
        &self,
        _thread_id: &str,
        _run_id: &str,
        outputs: Vec<ToolOutput>,
    ) -> Result<UpstreamStream, UpstreamError> {
        self.calls.inner.submits.fetch_add(1, Ordering::SeqCst);
        self.submitted.lock().unwrap().push(outputs);
        Ok(self.next_stream())
    }

    async fn cancel_run(&self, _thread_id: &str, _run_id: &str) -> Result<(), UpstreamError> {
        self.calls.inner.cancels.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn upload_file(&self, file_name: &str, _bytes: Vec<u8>) -> Result<FileRef, UpstreamError> {
        let n = self.calls.inner.uploads.fetch_add(1, Ordering::SeqCst);
        Ok(FileRef {
            id: format!("file-{n}"),
            name: Some(file_name.to_string()),
        })
    }
}

// --- Search ---

pub(crate) struct MockSearch {
    available: usize,
    fail: bool,
}

impl MockSearch {
    pub(crate) fn with_results(available: usize) -> Self {
        Self {
            available,
            fail: false,
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            available: 0,
            fail: true,
        }
    }
}

impl SearchProvider for MockSearch {
    async fn search(&self, query: &str, _limit: usize) -> Result<Vec<SearchResult>, SearchError> {
        if self.fail {
            return Err(SearchError::Status(503));
        }
        Ok((0..self.available)
            .map(|i| SearchResult {
                title: format!("Result {i}"),
                snippet: format!("About {query}"),
                url: format!("https://example.com/{i}"),
            })
            .collect())
    }
}

// --- Usage repository ---

#[derive(Default)]
pub(crate) struct MockUsageRepository {
    users: Mutex<HashMap<Uuid, (SubscriptionProfile, UsageCounters)>>,
    applied_keys: Mutex<HashSet<String>>,
    failures_left: AtomicUsize,
    increment_calls: AtomicUsize,
    unavailable: AtomicBool,
}

impl MockUsageRepository {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_user(&self, tier: SubscriptionTier, counters: UsageCounters) -> Uuid {
        let user_id = Uuid::now_v7();
        let profile = SubscriptionProfile {
            user_id,
            tier,
            status: SubscriptionStatus::Active,
            ends_at: None,
        };
        self.users
            .lock()
            .unwrap()
            .insert(user_id, (profile, counters));
        user_id
    }

    pub(crate) fn counters(&self, user_id: &Uuid) -> UsageCounters {
        self.users
            .lock()
            .unwrap()
            .get(user_id)
            .map(|(_, c)| *c)
            .unwrap_or_default()
    }

    /// Fail the next `n` increments with a query error.
    pub(crate) fn fail_next_increments(&self, n: usize) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    /// Fail every increment.
    pub(crate) fn set_unavailable(&self) {
        self.unavailable.store(true, Ordering::SeqCst);
    }

    pub(crate) fn increment_calls(&self) -> usize {
        self.increment_calls.load(Ordering::SeqCst)
    }
}

impl UsageRepository for MockUsageRepository {
    async fn get_profile(&self, user_id: &Uuid) -> Result<Option<SubscriptionProfile>, RepositoryError> {
        Ok(self.users.lock().unwrap().get(user_id).map(|(p, _)| p.clone()))
    }

    async fn get_counters(&self, user_id: &Uuid) -> Result<Option<UsageCounters>, RepositoryError> {
        Ok(self.users.lock().unwrap().get(user_id).map(|(_, c)| *c))
    }

    async fn increment(
        &self,
        user_id: &Uuid,
        field: UsageField,
        delta: u64,
        idempotency_key: &str,
    ) -> Result<bool, RepositoryError> {
        self.increment_calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RepositoryError::Query("database is locked".into()));
        }
        if self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(RepositoryError::Query("database is locked".into()));
        }

        let mut users = self.users.lock().unwrap();
        let (_, counters) = users.get_mut(user_id).ok_or(RepositoryError::NotFound)?;
        if !self
            .applied_keys
            .lock()
            .unwrap()
            .insert(idempotency_key.to_string())
        {
            return Ok(false);
        }
        match field {
            UsageField::GeneratedWords => counters.word_count_used += delta,
            UsageField::ExportedDocuments => counters.pdf_redesigns_count += delta,
            UsageField::UploadedFiles => counters.files_uploaded += delta,
        }
        Ok(true)
    }
}
