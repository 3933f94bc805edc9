//! The per-relay driver task.
//!
//! One driver owns everything a live relay needs: the upstream stream, the
//! text buffer, the event sender and the deadline. Every await is raced
//! against cancellation and the deadline (in that order), and `finish`
//! consumes the driver, so a relay emits at most one terminal event and
//! schedules accounting at most once.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use futures_util::future::join_all;
use taskfixer_types::relay::{AbortReason, RelayReport, RelayState, StreamEvent, TIMEOUT_MESSAGE};
use taskfixer_types::upstream::UpstreamEvent;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::accounting::AccountingJob;
use crate::conversation::ConversationProvider;
use crate::tool::{SearchProvider, ToolExecutor};
use crate::usage::{UsageLedger, UsageRepository, count_words};

pub const CANCELLED_MESSAGE: &str = "Request cancelled";

/// How long an abort waits to hand its error event to a slow client.
const ABORT_SEND_TIMEOUT: Duration = Duration::from_secs(1);

pub(crate) struct RelayDriver<P, S, U>
where
    P: ConversationProvider,
    S: SearchProvider,
    U: UsageRepository,
{
    pub(crate) relay_id: Uuid,
    pub(crate) user_id: Uuid,
    pub(crate) thread_id: String,
    pub(crate) attachments: usize,
    pub(crate) run_id: Option<String>,
    pub(crate) buffer: String,
    pub(crate) transitions: Vec<RelayState>,
    pub(crate) tool_rounds: u32,
    pub(crate) tx: mpsc::Sender<StreamEvent>,
    pub(crate) cancel: CancellationToken,
    pub(crate) deadline: Instant,
    pub(crate) provider: Arc<P>,
    pub(crate) tools: Arc<ToolExecutor<S>>,
    pub(crate) ledger: Arc<UsageLedger<U>>,
    pub(crate) tracker: TaskTracker,
}

impl<P, S, U> RelayDriver<P, S, U>
where
    P: ConversationProvider + 'static,
    S: SearchProvider + 'static,
    U: UsageRepository + 'static,
{
    pub(crate) async fn run(mut self) -> RelayReport {
        let result = self.drive().await;
        self.finish(result).await
    }

    /// Open the run and pump upstream events until completion. `Ok` means
    /// the run completed.
    async fn drive(&mut self) -> Result<(), AbortReason> {
        self.enter(RelayState::Generating);
        self.emit(StreamEvent::ThreadAssigned {
            thread_id: self.thread_id.clone(),
        })
        .await?;

        let mut upstream = self
            .guard(self.provider.stream_run(&self.thread_id))
            .await?
            .map_err(|e| {
                warn!(relay_id = %self.relay_id, error = %e, "Opening upstream run failed");
                AbortReason::Upstream(e.client_message())
            })?;

        loop {
            let event = match self.guard(upstream.next()).await? {
                None => {
                    debug!(relay_id = %self.relay_id, "Upstream ended without a completion event");
                    return Ok(());
                }
                Some(Err(e)) => {
                    warn!(relay_id = %self.relay_id, error = %e, "Upstream stream error");
                    return Err(AbortReason::Upstream(e.client_message()));
                }
                Some(Ok(event)) => event,
            };

            match event {
                UpstreamEvent::RunCreated { run_id } => {
                    debug!(relay_id = %self.relay_id, run_id = %run_id, "Run created");
                    self.run_id = Some(run_id);
                }
                UpstreamEvent::MessageStarted => {
                    self.emit(StreamEvent::GenerationStarted).await?;
                }
                UpstreamEvent::TextDelta { text } => {
                    if text.is_empty() {
                        continue;
                    }
                    self.buffer.push_str(&text);
                    self.emit(StreamEvent::TokenDelta {
                        delta: text,
                        content: self.buffer.clone(),
                    })
                    .await?;
                }
                UpstreamEvent::RequiresAction { run_id, tool_calls } => {
                    if tool_calls.is_empty() {
                        return Err(AbortReason::Upstream(
                            "Run requested action without any tool calls".to_string(),
                        ));
                    }
                    self.run_id = Some(run_id.clone());
                    self.enter(RelayState::ToolPending);
                    self.emit(StreamEvent::ToolInvocationStarted).await?;

                    info!(
                        relay_id = %self.relay_id,
                        calls = tool_calls.len(),
                        "Resolving tool calls"
                    );
                    let outputs = self
                        .guard(join_all(tool_calls.iter().map(|call| self.tools.run_call(call))))
                        .await?;
                    let resumed = self
                        .guard(self.provider.submit_tool_outputs(&self.thread_id, &run_id, outputs))
                        .await?
                        .map_err(|e| {
                            warn!(relay_id = %self.relay_id, error = %e, "Tool output submission failed");
                            AbortReason::Upstream(e.client_message())
                        })?;

                    upstream = resumed;
                    self.tool_rounds += 1;
                    self.enter(RelayState::Generating);
                    self.emit(StreamEvent::ToolResultSubmitted).await?;
                }
                UpstreamEvent::Completed => return Ok(()),
                UpstreamEvent::Failed { message } => {
                    warn!(relay_id = %self.relay_id, message = %message, "Upstream run failed");
                    return Err(AbortReason::Upstream(message));
                }
            }
        }
    }

    /// Single finalization point for the relay.
    async fn finish(mut self, result: Result<(), AbortReason>) -> RelayReport {
        let result = match result {
            Ok(()) => {
                self.enter(RelayState::Completing);
                let full_text = self.buffer.clone();
                self.emit(StreamEvent::GenerationComplete { full_text }).await
            }
            Err(reason) => Err(reason),
        };

        let (abort_reason, accounting_scheduled) = match result {
            Ok(()) => {
                self.schedule_accounting();
                self.enter(RelayState::Closed);
                (None, true)
            }
            Err(reason) => {
                self.abort(&reason).await;
                (Some(reason), false)
            }
        };

        info!(
            relay_id = %self.relay_id,
            thread_id = %self.thread_id,
            transitions = ?self.transitions,
            tool_rounds = self.tool_rounds,
            chars = self.buffer.len(),
            abort_reason = ?abort_reason,
            "Relay finished"
        );

        let final_state = *self.transitions.last().unwrap_or(&RelayState::Aborted);
        RelayReport {
            relay_id: self.relay_id,
            thread_id: self.thread_id,
            final_state,
            transitions: self.transitions,
            abort_reason,
            full_text: self.buffer,
            tool_rounds: self.tool_rounds,
            accounting_scheduled,
        }
    }

    async fn abort(&mut self, reason: &AbortReason) {
        self.enter(RelayState::Aborted);

        let message = match reason {
            AbortReason::Timeout => Some(TIMEOUT_MESSAGE.to_string()),
            AbortReason::Upstream(message) => Some(message.clone()),
            AbortReason::Cancelled => Some(CANCELLED_MESSAGE.to_string()),
            AbortReason::ClientDisconnected => None,
        };
        if let Some(message) = message {
            if self
                .tx
                .send_timeout(StreamEvent::Error { message }, ABORT_SEND_TIMEOUT)
                .await
                .is_err()
            {
                debug!(relay_id = %self.relay_id, "Client gone before the abort event");
            }
        }

        if let Some(run_id) = self.run_id.clone() {
            let provider = self.provider.clone();
            let thread_id = self.thread_id.clone();
            let relay_id = self.relay_id;
            self.tracker.spawn(async move {
                match provider.cancel_run(&thread_id, &run_id).await {
                    Ok(()) => debug!(relay_id = %relay_id, run_id = %run_id, "Upstream run cancelled"),
                    Err(e) => {
                        debug!(relay_id = %relay_id, run_id = %run_id, error = %e, "Upstream run cancel failed")
                    }
                }
            });
        }
    }

    fn schedule_accounting(&self) {
        let job = AccountingJob {
            relay_id: self.relay_id,
            user_id: self.user_id,
            words: count_words(&self.buffer),
            files: self.attachments as u64,
        };
        self.tracker.spawn(job.settle(self.ledger.clone()));
    }

    fn enter(&mut self, state: RelayState) {
        debug!(relay_id = %self.relay_id, state = %state, "Relay state");
        self.transitions.push(state);
    }

    async fn emit(&self, event: StreamEvent) -> Result<(), AbortReason> {
        self.guard(self.tx.send(event))
            .await?
            .map_err(|_| AbortReason::ClientDisconnected)
    }

    /// Race `fut` against cancellation, then the deadline.
    async fn guard<F: Future>(&self, fut: F) -> Result<F::Output, AbortReason> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(self.cancel_reason()),
            _ = sleep_until(self.deadline) => Err(AbortReason::Timeout),
            out = fut => Ok(out),
        }
    }

    /// A cancelled relay whose receiver is gone lost its client.
    fn cancel_reason(&self) -> AbortReason {
        if self.tx.is_closed() {
            AbortReason::ClientDisconnected
        } else {
            AbortReason::Cancelled
        }
    }
}
