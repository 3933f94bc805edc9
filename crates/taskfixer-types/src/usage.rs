//! Usage counters, subscription profile, and quota evaluation results.
//!
//! Counters are mutated only through atomic increments at the storage
//! layer. Quota limits are derived from the subscription tier and are
//! never persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Subscription level of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionTier {
    /// Metered tier with hard word and export limits.
    FreeTrial,
    Educator,
    School,
}

impl SubscriptionTier {
    /// Paid tiers are unlimited but gated by subscription validity.
    pub fn is_paid(&self) -> bool {
        matches!(self, SubscriptionTier::Educator | SubscriptionTier::School)
    }
}

impl fmt::Display for SubscriptionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubscriptionTier::FreeTrial => write!(f, "free_trial"),
            SubscriptionTier::Educator => write!(f, "educator"),
            SubscriptionTier::School => write!(f, "school"),
        }
    }
}

impl FromStr for SubscriptionTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "free_trial" => Ok(SubscriptionTier::FreeTrial),
            "educator" => Ok(SubscriptionTier::Educator),
            "school" => Ok(SubscriptionTier::School),
            other => Err(format!("invalid subscription tier: '{other}'")),
        }
    }
}

/// Billing state of a subscription, as written by the billing collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Canceled,
    PastDue,
    Incomplete,
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubscriptionStatus::Active => write!(f, "active"),
            SubscriptionStatus::Canceled => write!(f, "canceled"),
            SubscriptionStatus::PastDue => write!(f, "past_due"),
            SubscriptionStatus::Incomplete => write!(f, "incomplete"),
        }
    }
}

impl FromStr for SubscriptionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(SubscriptionStatus::Active),
            "canceled" => Ok(SubscriptionStatus::Canceled),
            "past_due" => Ok(SubscriptionStatus::PastDue),
            "incomplete" => Ok(SubscriptionStatus::Incomplete),
            other => Err(format!("invalid subscription status: '{other}'")),
        }
    }
}

/// Subscription facts needed to derive a quota policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionProfile {
    pub user_id: Uuid,
    pub tier: SubscriptionTier,
    pub status: SubscriptionStatus,
    /// Explicit expiration, set when a subscription is canceled at period end.
    pub ends_at: Option<DateTime<Utc>>,
}

/// Per-user usage counters for the current billing cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageCounters {
    #[serde(rename = "wordCount")]
    pub word_count_used: u64,
    #[serde(rename = "pdfCount")]
    pub pdf_redesigns_count: u64,
    #[serde(rename = "filesCount")]
    pub files_uploaded: u64,
}

/// Counter column targeted by an increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageField {
    GeneratedWords,
    ExportedDocuments,
    UploadedFiles,
}

impl fmt::Display for UsageField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UsageField::GeneratedWords => write!(f, "generated_words"),
            UsageField::ExportedDocuments => write!(f, "exported_documents"),
            UsageField::UploadedFiles => write!(f, "uploaded_files"),
        }
    }
}

/// Numeric limits of the metered tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaLimits {
    #[serde(rename = "maxWords")]
    pub max_words: u64,
    #[serde(rename = "maxPdfs")]
    pub max_documents: u64,
    /// Uploads are tracked but never gate access.
    pub max_files: Option<u64>,
}

/// Which metered limit a quota check evaluates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaGate {
    /// Checked before starting a new generation (word limit).
    Generation,
    /// Checked at document export time (document limit).
    Export,
}

/// Result of a quota check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaCheck {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageCounters>,
    /// `None` for unlimited (paid) tiers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limits: Option<QuotaLimits>,
}

impl QuotaCheck {
    pub fn allow(usage: UsageCounters, limits: Option<QuotaLimits>) -> Self {
        Self {
            allowed: true,
            reason: None,
            usage: Some(usage),
            limits,
        }
    }

    pub fn deny(
        reason: impl Into<String>,
        usage: Option<UsageCounters>,
        limits: Option<QuotaLimits>,
    ) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
            usage,
            limits,
        }
    }
}

/// Feature flags unlocked by a subscription tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureAccess {
    pub has_reflection: bool,
    pub has_differentiation: bool,
    pub has_unlimited_redesigns: bool,
    pub has_email_support: bool,
    pub has_priority_support: bool,
}

impl FeatureAccess {
    pub fn for_tier(tier: SubscriptionTier) -> Self {
        Self {
            has_reflection: true,
            has_differentiation: tier.is_paid(),
            has_unlimited_redesigns: tier.is_paid(),
            has_email_support: tier.is_paid(),
            has_priority_support: tier == SubscriptionTier::School,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_roundtrip() {
        for tier in [
            SubscriptionTier::FreeTrial,
            SubscriptionTier::Educator,
            SubscriptionTier::School,
        ] {
            let parsed: SubscriptionTier = tier.to_string().parse().unwrap();
            assert_eq!(tier, parsed);
        }
    }

    #[test]
    fn test_status_roundtrip() {
        for status in [
            SubscriptionStatus::Active,
            SubscriptionStatus::Canceled,
            SubscriptionStatus::PastDue,
            SubscriptionStatus::Incomplete,
        ] {
            let parsed: SubscriptionStatus = status.to_string().parse().unwrap();
            assert_eq!(status, parsed);
        }
    }

    #[test]
    fn test_invalid_tier() {
        assert!("platinum".parse::<SubscriptionTier>().is_err());
    }

    #[test]
    fn test_counters_wire_names() {
        let counters = UsageCounters {
            word_count_used: 12,
            pdf_redesigns_count: 1,
            files_uploaded: 3,
        };
        let json = serde_json::to_value(counters).unwrap();
        assert_eq!(json["wordCount"], 12);
        assert_eq!(json["pdfCount"], 1);
        assert_eq!(json["filesCount"], 3);
    }

    #[test]
    fn test_limits_serialize_unlimited_files_as_null() {
        let limits = QuotaLimits {
            max_words: 800,
            max_documents: 1,
            max_files: None,
        };
        let json = serde_json::to_value(limits).unwrap();
        assert_eq!(json["maxWords"], 800);
        assert_eq!(json["maxPdfs"], 1);
        assert!(json["maxFiles"].is_null());
    }

    #[test]
    fn test_feature_access_by_tier() {
        let free = FeatureAccess::for_tier(SubscriptionTier::FreeTrial);
        assert!(free.has_reflection);
        assert!(!free.has_unlimited_redesigns);

        let educator = FeatureAccess::for_tier(SubscriptionTier::Educator);
        assert!(educator.has_differentiation);
        assert!(!educator.has_priority_support);

        let school = FeatureAccess::for_tier(SubscriptionTier::School);
        assert!(school.has_priority_support);
    }
}
