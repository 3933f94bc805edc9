//! SQLite usage repository.
//!
//! Implements `UsageRepository` from `taskfixer-core`. Every increment is a
//! single `SET col = col + ?` plus an idempotency-key insert, both inside one
//! transaction on the single-connection writer pool.

use chrono::Utc;
use sqlx::Row;
use taskfixer_core::usage::UsageRepository;
use taskfixer_types::error::RepositoryError;
use taskfixer_types::usage::{SubscriptionProfile, UsageCounters, UsageField};
use uuid::Uuid;

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime};

/// SQLite-backed implementation of `UsageRepository`.
pub struct SqliteUsageRepository {
    pool: DatabasePool,
}

impl SqliteUsageRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Private Row types for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct ProfileRow {
    id: String,
    subscription_tier: String,
    subscription_status: String,
    subscription_ends_at: Option<String>,
}

impl ProfileRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            subscription_tier: row.try_get("subscription_tier")?,
            subscription_status: row.try_get("subscription_status")?,
            subscription_ends_at: row.try_get("subscription_ends_at")?,
        })
    }

    fn into_profile(self) -> Result<SubscriptionProfile, RepositoryError> {
        Ok(SubscriptionProfile {
            user_id: Uuid::parse_str(&self.id)
                .map_err(|e| RepositoryError::Query(format!("invalid user id: {e}")))?,
            tier: self.subscription_tier.parse().map_err(RepositoryError::Query)?,
            status: self
                .subscription_status
                .parse()
                .map_err(RepositoryError::Query)?,
            ends_at: self
                .subscription_ends_at
                .as_deref()
                .map(parse_datetime)
                .transpose()?,
        })
    }
}

struct CountersRow {
    word_count_used: i64,
    pdf_redesigns_count: i64,
    files_uploaded: i64,
}

impl CountersRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            word_count_used: row.try_get("word_count_used")?,
            pdf_redesigns_count: row.try_get("pdf_redesigns_count")?,
            files_uploaded: row.try_get("files_uploaded")?,
        })
    }

    fn into_counters(self) -> UsageCounters {
        // CHECK constraints keep the columns non-negative.
        UsageCounters {
            word_count_used: self.word_count_used.max(0) as u64,
            pdf_redesigns_count: self.pdf_redesigns_count.max(0) as u64,
            files_uploaded: self.files_uploaded.max(0) as u64,
        }
    }
}

fn increment_sql(field: UsageField) -> &'static str {
    match field {
        UsageField::GeneratedWords => {
            "UPDATE usage_tracking SET word_count_used = word_count_used + ?, updated_at = ? WHERE user_id = ?"
        }
        UsageField::ExportedDocuments => {
            "UPDATE usage_tracking SET pdf_redesigns_count = pdf_redesigns_count + ?, updated_at = ? WHERE user_id = ?"
        }
        UsageField::UploadedFiles => {
            "UPDATE usage_tracking SET files_uploaded = files_uploaded + ?, updated_at = ? WHERE user_id = ?"
        }
    }
}

// ---------------------------------------------------------------------------
// UsageRepository implementation
// ---------------------------------------------------------------------------

impl UsageRepository for SqliteUsageRepository {
    async fn get_profile(
        &self,
        user_id: &Uuid,
    ) -> Result<Option<SubscriptionProfile>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, subscription_tier, subscription_status, subscription_ends_at FROM users WHERE id = ?",
        )
        .bind(user_id.to_string())
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let profile_row =
                    ProfileRow::from_row(&row).map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(profile_row.into_profile()?))
            }
            None => Ok(None),
        }
    }

    async fn get_counters(&self, user_id: &Uuid) -> Result<Option<UsageCounters>, RepositoryError> {
        let row = sqlx::query(
            "SELECT word_count_used, pdf_redesigns_count, files_uploaded FROM usage_tracking WHERE user_id = ?",
        )
        .bind(user_id.to_string())
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let counters_row =
                    CountersRow::from_row(&row).map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(counters_row.into_counters()))
            }
            None => Ok(None),
        }
    }

    async fn increment(
        &self,
        user_id: &Uuid,
        field: UsageField,
        delta: u64,
        idempotency_key: &str,
    ) -> Result<bool, RepositoryError> {
        let delta = i64::try_from(delta)
            .map_err(|_| RepositoryError::Query(format!("delta out of range: {delta}")))?;
        let now = format_datetime(&Utc::now());

        let mut tx = self
            .pool
            .writer
            .begin()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let updated = sqlx::query(increment_sql(field))
            .bind(delta)
            .bind(&now)
            .bind(user_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?
            .rows_affected();
        if updated == 0 {
            return Err(RepositoryError::NotFound);
        }

        let recorded = sqlx::query(
            r#"INSERT OR IGNORE INTO usage_increments (idempotency_key, user_id, field, delta, created_at)
               VALUES (?, ?, ?, ?, ?)"#,
        )
        .bind(idempotency_key)
        .bind(user_id.to_string())
        .bind(field.to_string())
        .bind(delta)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?
        .rows_affected();

        if recorded == 0 {
            // Key already applied: undo this attempt's add.
            tx.rollback()
                .await
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
            return Ok(false);
        }

        tx.commit()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(true)
    }
}
