//! Usage ledger: quota checks before generation, increments after it.
//!
//! Quota evaluation is a pure function of the profile, the counters, the
//! configured limits and the current time. The ledger only loads the inputs
//! and forwards increments to the repository.

use chrono::{DateTime, Utc};
use taskfixer_types::error::RepositoryError;
use taskfixer_types::usage::{
    FeatureAccess, QuotaCheck, QuotaGate, QuotaLimits, SubscriptionProfile, SubscriptionStatus,
    SubscriptionTier, UsageCounters, UsageField,
};
use tracing::debug;
use uuid::Uuid;

use super::repository::UsageRepository;

pub const REASON_MISSING: &str = "User profile or usage data not found";
pub const REASON_INACTIVE: &str =
    "Your subscription is not active. Please update your payment method.";
pub const REASON_EXPIRED: &str =
    "Your subscription has expired. Please renew to continue using TaskFixerAI.";
pub const REASON_EXPORT_LIMIT: &str =
    "You've downloaded your free trial PDF. Upgrade for unlimited redesigns.";

/// Quota checks and counter increments for one usage store.
pub struct UsageLedger<U: UsageRepository> {
    repo: U,
    free_trial_limits: QuotaLimits,
}

impl<U: UsageRepository> UsageLedger<U> {
    pub fn new(repo: U, free_trial_limits: QuotaLimits) -> Self {
        Self {
            repo,
            free_trial_limits,
        }
    }

    /// Access the underlying repository.
    pub fn repo(&self) -> &U {
        &self.repo
    }

    /// Limits applied to the metered tier.
    pub fn free_trial_limits(&self) -> QuotaLimits {
        self.free_trial_limits
    }

    /// Decide whether `user_id` may pass `gate` right now.
    pub async fn check_quota(
        &self,
        user_id: &Uuid,
        gate: QuotaGate,
    ) -> Result<QuotaCheck, RepositoryError> {
        let profile = self.repo.get_profile(user_id).await?;
        let counters = self.repo.get_counters(user_id).await?;

        let check = evaluate_quota(
            profile.as_ref(),
            counters.as_ref(),
            &self.free_trial_limits,
            gate,
            Utc::now(),
        );
        debug!(user_id = %user_id, ?gate, allowed = check.allowed, "Quota checked");
        Ok(check)
    }

    /// Add generated words. A zero delta is a no-op.
    pub async fn increment_word_count(
        &self,
        user_id: &Uuid,
        delta: u64,
        idempotency_key: &str,
    ) -> Result<bool, RepositoryError> {
        if delta == 0 {
            return Ok(false);
        }
        self.repo
            .increment(user_id, UsageField::GeneratedWords, delta, idempotency_key)
            .await
    }

    /// Add uploaded files. A zero delta is a no-op.
    pub async fn increment_file_count(
        &self,
        user_id: &Uuid,
        delta: u64,
        idempotency_key: &str,
    ) -> Result<bool, RepositoryError> {
        if delta == 0 {
            return Ok(false);
        }
        self.repo
            .increment(user_id, UsageField::UploadedFiles, delta, idempotency_key)
            .await
    }

    /// Record one exported document.
    pub async fn increment_document_count(
        &self,
        user_id: &Uuid,
        idempotency_key: &str,
    ) -> Result<bool, RepositoryError> {
        self.repo
            .increment(user_id, UsageField::ExportedDocuments, 1, idempotency_key)
            .await
    }
}

/// Pure quota evaluation with an injectable clock.
pub fn evaluate_quota(
    profile: Option<&SubscriptionProfile>,
    counters: Option<&UsageCounters>,
    free_trial_limits: &QuotaLimits,
    gate: QuotaGate,
    now: DateTime<Utc>,
) -> QuotaCheck {
    let (Some(profile), Some(counters)) = (profile, counters) else {
        return QuotaCheck::deny(REASON_MISSING, None, None);
    };
    let usage = *counters;

    if profile.tier.is_paid() {
        if profile.status != SubscriptionStatus::Active {
            return QuotaCheck::deny(REASON_INACTIVE, Some(usage), None);
        }
        // The exact expiry instant is still inside the paid period.
        if profile.ends_at.is_some_and(|ends_at| now > ends_at) {
            return QuotaCheck::deny(REASON_EXPIRED, Some(usage), None);
        }
        return QuotaCheck::allow(usage, None);
    }

    let limits = *free_trial_limits;
    match gate {
        QuotaGate::Generation if usage.word_count_used >= limits.max_words => QuotaCheck::deny(
            format!(
                "You've used {} of your {} free trial words. Upgrade for unlimited access.",
                usage.word_count_used, limits.max_words
            ),
            Some(usage),
            Some(limits),
        ),
        QuotaGate::Export if usage.pdf_redesigns_count >= limits.max_documents => {
            QuotaCheck::deny(REASON_EXPORT_LIMIT, Some(usage), Some(limits))
        }
        _ => QuotaCheck::allow(usage, Some(limits)),
    }
}

/// Whitespace-run token count. Empty or blank text counts as zero.
pub fn count_words(text: &str) -> u64 {
    text.split_whitespace().count() as u64
}

pub fn feature_access(tier: SubscriptionTier) -> FeatureAccess {
    FeatureAccess::for_tier(tier)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockUsageRepository;
    use chrono::Duration;

    fn limits() -> QuotaLimits {
        QuotaLimits {
            max_words: 800,
            max_documents: 1,
            max_files: None,
        }
    }

    fn profile(tier: SubscriptionTier, status: SubscriptionStatus) -> SubscriptionProfile {
        SubscriptionProfile {
            user_id: Uuid::now_v7(),
            tier,
            status,
            ends_at: None,
        }
    }

    fn words(n: u64) -> UsageCounters {
        UsageCounters {
            word_count_used: n,
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_data_is_denied() {
        let p = profile(SubscriptionTier::FreeTrial, SubscriptionStatus::Active);
        let check = evaluate_quota(Some(&p), None, &limits(), QuotaGate::Generation, Utc::now());
        assert!(!check.allowed);
        assert_eq!(check.reason.as_deref(), Some(REASON_MISSING));

        let check = evaluate_quota(None, Some(&words(0)), &limits(), QuotaGate::Generation, Utc::now());
        assert!(!check.allowed);
    }

    #[test]
    fn test_word_limit_boundary() {
        let p = profile(SubscriptionTier::FreeTrial, SubscriptionStatus::Active);

        let below = evaluate_quota(Some(&p), Some(&words(799)), &limits(), QuotaGate::Generation, Utc::now());
        assert!(below.allowed);
        assert_eq!(below.limits, Some(limits()));

        let at = evaluate_quota(Some(&p), Some(&words(800)), &limits(), QuotaGate::Generation, Utc::now());
        assert!(!at.allowed);
        let reason = at.reason.unwrap();
        assert!(reason.contains("800"));
        assert_eq!(at.usage, Some(words(800)));
    }

    #[test]
    fn test_overshoot_then_denied() {
        // 799 used, a 5-word reply pushes the counter to 804.
        let p = profile(SubscriptionTier::FreeTrial, SubscriptionStatus::Active);
        let before = evaluate_quota(Some(&p), Some(&words(799)), &limits(), QuotaGate::Generation, Utc::now());
        assert!(before.allowed);

        let after = 799 + count_words("one two three four five");
        assert_eq!(after, 804);
        let denied = evaluate_quota(Some(&p), Some(&words(after)), &limits(), QuotaGate::Generation, Utc::now());
        assert!(!denied.allowed);
        assert!(denied.reason.unwrap().contains("804 of your 800"));
    }

    #[test]
    fn test_export_gate_independent_of_words() {
        let p = profile(SubscriptionTier::FreeTrial, SubscriptionStatus::Active);
        let exhausted_words = words(900);
        let check = evaluate_quota(Some(&p), Some(&exhausted_words), &limits(), QuotaGate::Export, Utc::now());
        assert!(check.allowed);

        let exported = UsageCounters {
            pdf_redesigns_count: 1,
            ..Default::default()
        };
        let check = evaluate_quota(Some(&p), Some(&exported), &limits(), QuotaGate::Export, Utc::now());
        assert!(!check.allowed);
        assert_eq!(check.reason.as_deref(), Some(REASON_EXPORT_LIMIT));

        let check = evaluate_quota(Some(&p), Some(&exported), &limits(), QuotaGate::Generation, Utc::now());
        assert!(check.allowed);
    }

    #[test]
    fn test_paid_tier_status_gate() {
        let p = profile(SubscriptionTier::Educator, SubscriptionStatus::PastDue);
        let check = evaluate_quota(Some(&p), Some(&words(5000)), &limits(), QuotaGate::Generation, Utc::now());
        assert!(!check.allowed);
        assert_eq!(check.reason.as_deref(), Some(REASON_INACTIVE));

        let p = profile(SubscriptionTier::School, SubscriptionStatus::Active);
        let check = evaluate_quota(Some(&p), Some(&words(5000)), &limits(), QuotaGate::Generation, Utc::now());
        assert!(check.allowed);
        assert!(check.limits.is_none());
    }

    #[test]
    fn test_paid_tier_expiry_boundary() {
        let now = Utc::now();
        let mut p = profile(SubscriptionTier::Educator, SubscriptionStatus::Active);
        p.ends_at = Some(now);

        let at_boundary = evaluate_quota(Some(&p), Some(&words(0)), &limits(), QuotaGate::Export, now);
        assert!(at_boundary.allowed);

        let one_tick_later = now + Duration::nanoseconds(1);
        let expired = evaluate_quota(Some(&p), Some(&words(0)), &limits(), QuotaGate::Export, one_tick_later);
        assert!(!expired.allowed);
        assert_eq!(expired.reason.as_deref(), Some(REASON_EXPIRED));
    }

    #[test]
    fn test_count_words() {
        assert_eq!(count_words(""), 0);
        assert_eq!(count_words("   \n\t "), 0);
        assert_eq!(count_words("Hello world"), 2);
        assert_eq!(count_words("  Hello \n\n world\tagain  "), 3);
    }

    #[tokio::test]
    async fn test_check_quota_loads_from_repo() {
        let repo = MockUsageRepository::new();
        let user = repo.add_user(SubscriptionTier::FreeTrial, words(800));
        let ledger = UsageLedger::new(repo, limits());

        let check = ledger.check_quota(&user, QuotaGate::Generation).await.unwrap();
        assert!(!check.allowed);

        let unknown = ledger.check_quota(&Uuid::now_v7(), QuotaGate::Generation).await.unwrap();
        assert_eq!(unknown.reason.as_deref(), Some(REASON_MISSING));
    }

    #[tokio::test]
    async fn test_increments_forward_to_repo() {
        let repo = MockUsageRepository::new();
        let user = repo.add_user(SubscriptionTier::FreeTrial, UsageCounters::default());
        let ledger = UsageLedger::new(repo, limits());

        assert!(ledger.increment_word_count(&user, 12, "r1:words").await.unwrap());
        assert!(!ledger.increment_word_count(&user, 12, "r1:words").await.unwrap());
        assert!(!ledger.increment_word_count(&user, 0, "r2:words").await.unwrap());
        assert!(ledger.increment_file_count(&user, 2, "r1:files").await.unwrap());
        assert!(ledger.increment_document_count(&user, "export-1").await.unwrap());

        let counters = ledger.repo().counters(&user);
        assert_eq!(counters.word_count_used, 12);
        assert_eq!(counters.files_uploaded, 2);
        assert_eq!(counters.pdf_redesigns_count, 1);
    }

    #[test]
    fn test_feature_access_delegates() {
        assert!(feature_access(SubscriptionTier::School).has_priority_support);
    }
}
