//! Usage metering: quota checks and atomic counter increments.

pub mod ledger;
pub mod repository;

pub use ledger::{UsageLedger, count_words, evaluate_quota, feature_access};
pub use repository::UsageRepository;
