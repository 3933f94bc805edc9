//! Chat stream relay: quota gate, thread preparation, and the driver task
//! that streams upstream output to one client.
//!
//! `StreamRelay::open` does everything that can still fail with a plain
//! error (quota, thread, user turn). Once the turn is on the thread, a
//! driver task takes over: it announces the thread id, opens the run, and
//! reports every later failure in-band as a single `StreamEvent::Error`.

pub mod accounting;
mod driver;

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::Stream;
use taskfixer_types::error::RepositoryError;
use taskfixer_types::relay::{ChatTurn, RelayReport, RelayState, StreamEvent};
use taskfixer_types::upstream::UpstreamError;
use taskfixer_types::usage::{QuotaCheck, QuotaGate};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::{CancellationToken, DropGuard};
use tokio_util::task::TaskTracker;
use tracing::{Instrument, info, info_span};
use uuid::Uuid;

use crate::conversation::{ConversationProvider, ConversationSession};
use crate::tool::{SearchProvider, ToolExecutor};
use crate::usage::{UsageLedger, UsageRepository};

pub use driver::CANCELLED_MESSAGE;
use driver::RelayDriver;

/// Errors raised before the first byte reaches the client.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("message string or files are required")]
    EmptyTurn,

    #[error("quota denied")]
    QuotaDenied(QuotaCheck),

    #[error("usage ledger error: {0}")]
    Ledger(#[from] RepositoryError),

    #[error("upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("relay timed out before streaming")]
    Timeout,

    #[error("relay cancelled before streaming")]
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct RelaySettings {
    /// Measured from the start of `open`.
    pub timeout: Duration,
    pub event_buffer: usize,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            event_buffer: 64,
        }
    }
}

/// Client side of an open relay.
///
/// Dropping it cancels the relay; the driver then aborts as a client
/// disconnect.
pub struct RelayEvents {
    rx: mpsc::Receiver<StreamEvent>,
    _cancel_on_drop: DropGuard,
}

impl Stream for RelayEvents {
    type Item = StreamEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// A relay that reached the streaming phase.
pub struct RelayStream {
    pub relay_id: Uuid,
    pub thread_id: String,
    pub events: RelayEvents,
    /// Resolves once the driver has finalized.
    pub report: JoinHandle<RelayReport>,
}

/// Opens relays. Shared by every request; holds no per-relay state.
pub struct StreamRelay<P, S, U>
where
    P: ConversationProvider,
    S: SearchProvider,
    U: UsageRepository,
{
    provider: Arc<P>,
    tools: Arc<ToolExecutor<S>>,
    ledger: Arc<UsageLedger<U>>,
    tracker: TaskTracker,
    settings: RelaySettings,
}

impl<P, S, U> StreamRelay<P, S, U>
where
    P: ConversationProvider + 'static,
    S: SearchProvider + 'static,
    U: UsageRepository + 'static,
{
    pub fn new(
        provider: Arc<P>,
        tools: Arc<ToolExecutor<S>>,
        ledger: Arc<UsageLedger<U>>,
        tracker: TaskTracker,
        settings: RelaySettings,
    ) -> Self {
        Self {
            provider,
            tools,
            ledger,
            tracker,
            settings,
        }
    }

    pub fn provider(&self) -> &Arc<P> {
        &self.provider
    }

    pub fn ledger(&self) -> &Arc<UsageLedger<U>> {
        &self.ledger
    }

    /// Tracker owning driver tasks, accounting jobs and run cancellations.
    pub fn tracker(&self) -> &TaskTracker {
        &self.tracker
    }

    /// Start a relay for one turn.
    ///
    /// The deadline is armed immediately. `cancel` aborts the relay at any
    /// point; it is also cancelled when the returned events are dropped.
    pub async fn open(
        &self,
        turn: ChatTurn,
        cancel: CancellationToken,
    ) -> Result<RelayStream, RelayError> {
        let relay_id = Uuid::now_v7();
        let deadline = Instant::now() + self.settings.timeout;

        if !turn.has_content() {
            return Err(RelayError::EmptyTurn);
        }

        let mut transitions = vec![RelayState::Idle, RelayState::QuotaChecking];
        let check = self
            .ledger
            .check_quota(&turn.user_id, QuotaGate::Generation)
            .await?;
        if !check.allowed {
            info!(relay_id = %relay_id, user_id = %turn.user_id, reason = ?check.reason, "Quota denied");
            return Err(RelayError::QuotaDenied(check));
        }

        transitions.push(RelayState::ThreadPreparing);
        let session = ConversationSession::new(self.provider.clone());
        let prepare = async {
            let thread_id = session.ensure_thread(turn.thread_id.as_deref()).await?;
            session
                .submit_user_turn(&thread_id, turn.message.as_deref(), &turn.file_ids)
                .await?;
            Ok::<_, UpstreamError>(thread_id)
        };

        let thread_id = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RelayError::Cancelled),
            _ = sleep_until(deadline) => return Err(RelayError::Timeout),
            prepared = prepare => prepared?,
        };

        let (tx, rx) = mpsc::channel(self.settings.event_buffer.max(1));
        let span = info_span!(
            "relay",
            gen_ai.operation.name = "chat",
            gen_ai.provider.name = self.provider.name(),
            gen_ai.conversation.id = %thread_id,
            relay_id = %relay_id,
            user_id = %turn.user_id,
        );
        let driver = RelayDriver {
            relay_id,
            user_id: turn.user_id,
            thread_id: thread_id.clone(),
            attachments: turn.file_ids.len(),
            run_id: None,
            buffer: String::new(),
            transitions,
            tool_rounds: 0,
            tx,
            cancel: cancel.clone(),
            deadline,
            provider: self.provider.clone(),
            tools: self.tools.clone(),
            ledger: self.ledger.clone(),
            tracker: self.tracker.clone(),
        };
        let report = self.tracker.spawn(driver.run().instrument(span));

        info!(relay_id = %relay_id, thread_id = %thread_id, "Relay streaming");
        Ok(RelayStream {
            relay_id,
            thread_id,
            events: RelayEvents {
                rx,
                _cancel_on_drop: cancel.drop_guard(),
            },
            report,
        })
    }
}
