//! SQLite account store: users, subscription state, and API keys.
//!
//! Stands in for the external auth and billing collaborators. The admin CLI
//! writes through it, and the HTTP auth extractor resolves keys with it.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use sqlx::Row;
use taskfixer_types::error::RepositoryError;
use taskfixer_types::usage::{SubscriptionStatus, SubscriptionTier};
use tracing::info;
use uuid::Uuid;

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime};

/// Prefix of generated API keys.
pub const API_KEY_PREFIX: &str = "tfx_";

/// Compute SHA-256 hash of an API key (lowercase hex).
pub fn hash_api_key(key: &str) -> String {
    format!("{:x}", Sha256::digest(key.as_bytes()))
}

/// A user row with its subscription columns.
#[derive(Debug, Clone)]
pub struct UserAccount {
    pub id: Uuid,
    pub email: String,
    pub tier: SubscriptionTier,
    pub status: SubscriptionStatus,
    pub ends_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

pub struct SqliteAccountRepository {
    pool: DatabasePool,
}

impl SqliteAccountRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// Create a user with zeroed usage counters.
    pub async fn create_user(
        &self,
        email: &str,
        tier: SubscriptionTier,
    ) -> Result<UserAccount, RepositoryError> {
        let id = Uuid::now_v7();
        let now = Utc::now();
        let now_str = format_datetime(&now);

        let mut tx = self
            .pool
            .writer
            .begin()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        sqlx::query(
            r#"INSERT INTO users (id, email, subscription_tier, subscription_status, created_at, updated_at)
               VALUES (?, ?, ?, 'active', ?, ?)"#,
        )
        .bind(id.to_string())
        .bind(email)
        .bind(tier.to_string())
        .bind(&now_str)
        .bind(&now_str)
        .execute(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.message().contains("UNIQUE") => {
                RepositoryError::Conflict(format!("user '{email}' already exists"))
            }
            _ => RepositoryError::Query(e.to_string()),
        })?;

        sqlx::query(
            "INSERT INTO usage_tracking (user_id, last_reset_at, updated_at) VALUES (?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(&now_str)
        .bind(&now_str)
        .execute(&mut *tx)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        info!(user_id = %id, %tier, "User created");
        Ok(UserAccount {
            id,
            email: email.to_string(),
            tier,
            status: SubscriptionStatus::Active,
            ends_at: None,
            created_at: now,
        })
    }

    pub async fn get_user(&self, user_id: &Uuid) -> Result<Option<UserAccount>, RepositoryError> {
        let row = sqlx::query(
            r#"SELECT id, email, subscription_tier, subscription_status, subscription_ends_at, created_at
               FROM users WHERE id = ?"#,
        )
        .bind(user_id.to_string())
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        row.map(|r| {
            let get = |col: &str| -> Result<String, RepositoryError> {
                r.try_get(col).map_err(|e| RepositoryError::Query(e.to_string()))
            };
            let ends_at: Option<String> = r
                .try_get("subscription_ends_at")
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
            Ok(UserAccount {
                id: Uuid::parse_str(&get("id")?)
                    .map_err(|e| RepositoryError::Query(format!("invalid user id: {e}")))?,
                email: get("email")?,
                tier: get("subscription_tier")?
                    .parse()
                    .map_err(RepositoryError::Query)?,
                status: get("subscription_status")?
                    .parse()
                    .map_err(RepositoryError::Query)?,
                ends_at: ends_at.as_deref().map(parse_datetime).transpose()?,
                created_at: parse_datetime(&get("created_at")?)?,
            })
        })
        .transpose()
    }

    /// Overwrite the subscription columns of a user.
    pub async fn set_subscription(
        &self,
        user_id: &Uuid,
        tier: SubscriptionTier,
        status: SubscriptionStatus,
        ends_at: Option<DateTime<Utc>>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"UPDATE users
               SET subscription_tier = ?, subscription_status = ?, subscription_ends_at = ?, updated_at = ?
               WHERE id = ?"#,
        )
        .bind(tier.to_string())
        .bind(status.to_string())
        .bind(ends_at.as_ref().map(format_datetime))
        .bind(format_datetime(&Utc::now()))
        .bind(user_id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        info!(user_id = %user_id, %tier, %status, "Subscription updated");
        Ok(())
    }

    /// Generate an API key for a user and store its hash.
    ///
    /// Returns the plaintext key; it is not recoverable afterwards.
    pub async fn create_api_key(&self, user_id: &Uuid, name: &str) -> Result<String, RepositoryError> {
        let plaintext = format!("{API_KEY_PREFIX}{}", Uuid::new_v4().simple());

        sqlx::query(
            "INSERT INTO api_keys (id, user_id, key_hash, name, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(Uuid::now_v7().to_string())
        .bind(user_id.to_string())
        .bind(hash_api_key(&plaintext))
        .bind(name)
        .bind(format_datetime(&Utc::now()))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(plaintext)
    }

    /// Look up the user owning `key`, recording the use.
    pub async fn resolve_api_key(&self, key: &str) -> Result<Option<Uuid>, RepositoryError> {
        let key_hash = hash_api_key(key);
        let row = sqlx::query("SELECT id, user_id FROM api_keys WHERE key_hash = ?")
            .bind(&key_hash)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let key_id: String = row
            .try_get("id")
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        let user_id: String = row
            .try_get("user_id")
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        // Best-effort; a failed touch never rejects a valid key.
        let _ = sqlx::query("UPDATE api_keys SET last_used_at = ? WHERE id = ?")
            .bind(format_datetime(&Utc::now()))
            .bind(&key_id)
            .execute(&self.pool.writer)
            .await;

        Uuid::parse_str(&user_id)
            .map(Some)
            .map_err(|e| RepositoryError::Query(format!("invalid user id: {e}")))
    }
}
