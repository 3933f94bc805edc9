//! Post-completion usage accounting.
//!
//! Runs on the relay's `TaskTracker` after the client stream has closed.
//! Each increment carries an idempotency key derived from the relay id, so
//! retries can never double-count. A final failure is logged and dropped.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use taskfixer_types::error::RepositoryError;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::usage::{UsageLedger, UsageRepository};

const MAX_ATTEMPTS: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_millis(250);

/// Usage produced by one completed relay.
#[derive(Debug, Clone)]
pub struct AccountingJob {
    pub relay_id: Uuid,
    pub user_id: Uuid,
    pub words: u64,
    pub files: u64,
}

impl AccountingJob {
    pub fn words_key(&self) -> String {
        format!("{}:words", self.relay_id)
    }

    pub fn files_key(&self) -> String {
        format!("{}:files", self.relay_id)
    }

    /// Apply the job's increments, retrying transient storage errors.
    ///
    /// An empty reply counts nothing, attachments included.
    pub async fn settle<U: UsageRepository>(self, ledger: Arc<UsageLedger<U>>) {
        if self.words == 0 {
            debug!(relay_id = %self.relay_id, "Empty reply, nothing to account");
            return;
        }

        let key = self.words_key();
        with_retries(self.relay_id, "words", || {
            ledger.increment_word_count(&self.user_id, self.words, &key)
        })
        .await;

        if self.files > 0 {
            let key = self.files_key();
            with_retries(self.relay_id, "files", || {
                ledger.increment_file_count(&self.user_id, self.files, &key)
            })
            .await;
        }
    }
}

async fn with_retries<F, Fut>(relay_id: Uuid, counter: &str, mut op: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, RepositoryError>>,
{
    for attempt in 1..=MAX_ATTEMPTS {
        match op().await {
            Ok(applied) => {
                debug!(relay_id = %relay_id, counter, applied, "Usage accounted");
                return;
            }
            Err(RepositoryError::NotFound) => {
                error!(relay_id = %relay_id, counter, "Usage accounting skipped: no counters for user");
                return;
            }
            Err(e) if attempt < MAX_ATTEMPTS => {
                warn!(relay_id = %relay_id, counter, attempt, error = %e, "Usage increment failed, retrying");
                tokio::time::sleep(RETRY_BACKOFF * attempt).await;
            }
            Err(e) => {
                error!(relay_id = %relay_id, counter, attempts = MAX_ATTEMPTS, error = %e, "Usage accounting failed");
            }
        }
    }
}
