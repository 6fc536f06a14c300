// Refresh token persistence
//
// One live record per user. Tokens are stored as SHA-256 digests; lookups by
// token hash the presented value first.

use crate::auth::models::RefreshTokenRecord;
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Hash a token using SHA-256
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    /// Insert a record; `Conflict` if the user already has one
    async fn save(
        &self,
        user_id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Swap the user's token for `new_token`, but only while the stored token
    /// is still `current_token`. `NotFound` when nothing matched.
    async fn rotate(
        &self,
        user_id: i64,
        current_token: &str,
        new_token: &str,
        new_expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Insert or overwrite the user's record unconditionally
    async fn replace(
        &self,
        user_id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// True iff a record holds this token and has not expired
    async fn is_valid(&self, token: &str) -> Result<bool, StoreError>;

    /// Remove the user's record; `NotFound` if there was none
    async fn delete(&self, user_id: i64) -> Result<(), StoreError>;

    /// Purge expired records, returning how many were removed
    async fn delete_expired(&self) -> Result<u64, StoreError>;
}

/// PostgreSQL-backed refresh token store
#[derive(Clone)]
pub struct PgRefreshTokenStore {
    pool: PgPool,
}

impl PgRefreshTokenStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RefreshTokenStore for PgRefreshTokenStore {
    async fn save(
        &self,
        user_id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO refresh_tokens (user_id, token_hash, expires_at) VALUES ($1, $2, $3)",
        )
        .bind(user_id)
        .bind(hash_token(token))
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn rotate(
        &self,
        user_id: i64,
        current_token: &str,
        new_token: &str,
        new_expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET token_hash = $1, expires_at = $2
            WHERE user_id = $3 AND token_hash = $4
            "#,
        )
        .bind(hash_token(new_token))
        .bind(new_expires_at)
        .bind(user_id)
        .bind(hash_token(current_token))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn replace(
        &self,
        user_id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (user_id, token_hash, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id)
            DO UPDATE SET token_hash = EXCLUDED.token_hash,
                          expires_at = EXCLUDED.expires_at,
                          created_at = NOW()
            "#,
        )
        .bind(user_id)
        .bind(hash_token(token))
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn is_valid(&self, token: &str) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM refresh_tokens WHERE token_hash = $1 AND expires_at > NOW())",
        )
        .bind(hash_token(token))
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn delete(&self, user_id: i64) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete_expired(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[derive(Default)]
struct Sessions {
    next_id: i64,
    by_user: HashMap<i64, RefreshTokenRecord>,
}

/// In-process refresh token store, used when no database is configured
#[derive(Default)]
pub struct InMemoryRefreshTokenStore {
    inner: RwLock<Sessions>,
}

impl InMemoryRefreshTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records, live or expired
    pub async fn len(&self) -> usize {
        self.inner.read().await.by_user.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Snapshot of the record held for a user
    pub async fn record_for(&self, user_id: i64) -> Option<RefreshTokenRecord> {
        self.inner.read().await.by_user.get(&user_id).cloned()
    }
}

#[async_trait]
impl RefreshTokenStore for InMemoryRefreshTokenStore {
    async fn save(
        &self,
        user_id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut sessions = self.inner.write().await;
        if sessions.by_user.contains_key(&user_id) {
            return Err(StoreError::Conflict);
        }

        sessions.next_id += 1;
        let record = RefreshTokenRecord {
            id: sessions.next_id,
            user_id,
            token_hash: hash_token(token),
            expires_at,
            created_at: Utc::now(),
        };
        sessions.by_user.insert(user_id, record);
        Ok(())
    }

    async fn rotate(
        &self,
        user_id: i64,
        current_token: &str,
        new_token: &str,
        new_expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let current_hash = hash_token(current_token);
        let mut sessions = self.inner.write().await;

        match sessions.by_user.get_mut(&user_id) {
            Some(record) if record.token_hash == current_hash => {
                record.token_hash = hash_token(new_token);
                record.expires_at = new_expires_at;
                Ok(())
            }
            _ => Err(StoreError::NotFound),
        }
    }

    async fn replace(
        &self,
        user_id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut sessions = self.inner.write().await;
        sessions.next_id += 1;
        let record = RefreshTokenRecord {
            id: sessions.next_id,
            user_id,
            token_hash: hash_token(token),
            expires_at,
            created_at: Utc::now(),
        };
        sessions.by_user.insert(user_id, record);
        Ok(())
    }

    async fn is_valid(&self, token: &str) -> Result<bool, StoreError> {
        let token_hash = hash_token(token);
        let now = Utc::now();

        Ok(self
            .inner
            .read()
            .await
            .by_user
            .values()
            .any(|record| record.token_hash == token_hash && record.expires_at > now))
    }

    async fn delete(&self, user_id: i64) -> Result<(), StoreError> {
        self.inner
            .write()
            .await
            .by_user
            .remove(&user_id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    async fn delete_expired(&self) -> Result<u64, StoreError> {
        let now = Utc::now();
        let mut sessions = self.inner.write().await;
        let before = sessions.by_user.len();
        sessions.by_user.retain(|_, record| record.expires_at > now);
        Ok((before - sessions.by_user.len()) as u64)
    }
}
