/// Refresh Token Revocation
///
/// Refresh tokens are stateless JWTs with a stateful blacklist on top.
/// A revoked token is recorded until its own expiry; after that the
/// signature check alone rejects it and the entry can be reaped.
///
/// Tokens are stored as SHA-256 digests, never in plaintext.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use sqlx::PgPool;

use crate::error::StorageError;

#[async_trait]
pub trait RevocationStore: Send + Sync {
    /// Record `token` as revoked until `expires_at`.
    ///
    /// Idempotent: revoking an already revoked token succeeds.
    async fn blacklist(&self, token: &str, expires_at: DateTime<Utc>) -> Result<(), StorageError>;

    /// Whether `token` has been revoked. Errors are never reported as `false`.
    async fn is_blacklisted(&self, token: &str) -> Result<bool, StorageError>;

    /// Delete entries whose token has expired anyway. Returns the count removed.
    async fn purge_expired(&self) -> Result<u64, StorageError>;
}

/// Hash a token using SHA-256
fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Postgres-backed blacklist (`revoked_tokens` table)
#[derive(Clone)]
pub struct PgRevocationStore {
    pool: PgPool,
}

impl PgRevocationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RevocationStore for PgRevocationStore {
    async fn blacklist(&self, token: &str, expires_at: DateTime<Utc>) -> Result<(), StorageError> {
        // Concurrent logouts of the same token collapse into one row
        sqlx::query(
            r#"
            INSERT INTO revoked_tokens (token_hash, expires_at, revoked_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (token_hash) DO NOTHING
            "#,
        )
        .bind(hash_token(token))
        .bind(expires_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn is_blacklisted(&self, token: &str) -> Result<bool, StorageError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM revoked_tokens WHERE token_hash = $1)",
        )
        .bind(hash_token(token))
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn purge_expired(&self) -> Result<u64, StorageError> {
        let result = sqlx::query("DELETE FROM revoked_tokens WHERE expires_at < $1")
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

/// Process-local blacklist for tests and single-node development
#[derive(Default, Clone)]
pub struct InMemoryRevocationStore {
    entries: Arc<RwLock<HashMap<String, DateTime<Utc>>>>,
}

impl InMemoryRevocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<T>(_: T) -> StorageError {
    StorageError::Backend("revocation store lock poisoned".to_string())
}

#[async_trait]
impl RevocationStore for InMemoryRevocationStore {
    async fn blacklist(&self, token: &str, expires_at: DateTime<Utc>) -> Result<(), StorageError> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        entries.entry(hash_token(token)).or_insert(expires_at);
        Ok(())
    }

    async fn is_blacklisted(&self, token: &str) -> Result<bool, StorageError> {
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries.contains_key(&hash_token(token)))
    }

    async fn purge_expired(&self) -> Result<u64, StorageError> {
        let now = Utc::now();
        let mut entries = self.entries.write().map_err(poisoned)?;
        let before = entries.len();
        entries.retain(|_, expires_at| *expires_at >= now);
        Ok((before - entries.len()) as u64)
    }
}

/// Periodically reap expired blacklist entries.
///
/// Failures are logged and retried on the next tick. Returns `None` when
/// `interval_secs` is 0.
pub fn spawn_revocation_purge(
    store: Arc<dyn RevocationStore>,
    interval_secs: u64,
) -> Option<tokio::task::JoinHandle<()>> {
    if interval_secs == 0 {
        tracing::info!("Revocation purge disabled");
        return None;
    }

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(StdDuration::from_secs(interval_secs));
        loop {
            ticker.tick().await;
            match store.purge_expired().await {
                Ok(0) => tracing::debug!("No expired revocations to purge"),
                Ok(count) => tracing::info!(count = count, "Purged expired revocations"),
                Err(e) => tracing::error!(error = %e, "Failed to purge expired revocations"),
            }
        }
    }))
}
