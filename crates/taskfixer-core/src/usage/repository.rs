//! UsageRepository trait definition.
//!
//! Same RPITIT pattern as the other ports in this crate.

use taskfixer_types::error::RepositoryError;
use taskfixer_types::usage::{SubscriptionProfile, UsageCounters, UsageField};
use uuid::Uuid;

/// Repository trait for subscription profiles and usage counters.
///
/// Implementations live in taskfixer-infra (e.g., `SqliteUsageRepository`).
pub trait UsageRepository: Send + Sync {
    /// Get the subscription profile of a user.
    fn get_profile(
        &self,
        user_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<SubscriptionProfile>, RepositoryError>> + Send;

    /// Get the current usage counters of a user.
    fn get_counters(
        &self,
        user_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<UsageCounters>, RepositoryError>> + Send;

    /// Atomically add `delta` to one counter.
    ///
    /// The idempotency key is recorded in the same transaction as the add.
    /// Returns `Ok(false)` when the key was already recorded and nothing
    /// changed, and `RepositoryError::NotFound` when the user has no counters.
    fn increment(
        &self,
        user_id: &Uuid,
        field: UsageField,
        delta: u64,
        idempotency_key: &str,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;
}
