//! Server-side admin sessions.
//!
//! The cookie carries an opaque random token; stores only ever see its SHA-256.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::distr::{Alphanumeric, SampleString};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;

use super::AuthError;
use crate::db::models::AdminSessionRow;

const TOKEN_LEN: usize = 48;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub username: String,
    pub expires_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Generate a fresh session token for the cookie.
pub fn generate_token() -> String {
    Alphanumeric.sample_string(&mut rand::rng(), TOKEN_LEN)
}

/// Key under which a token's session is stored.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    fn kind(&self) -> &'static str;

    async fn insert(&self, token_hash: &str, record: SessionRecord) -> Result<(), AuthError>;

    async fn get(&self, token_hash: &str) -> Result<Option<SessionRecord>, AuthError>;

    async fn remove(&self, token_hash: &str) -> Result<(), AuthError>;

    /// Remove every session expired at `now`; returns the number removed.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, AuthError>;
}

/// Process-local sessions. Lost on restart.
#[derive(Debug, Default, Clone)]
pub struct MemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, SessionRecord>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    fn kind(&self) -> &'static str {
        "memory"
    }

    async fn insert(&self, token_hash: &str, record: SessionRecord) -> Result<(), AuthError> {
        self.sessions
            .write()
            .await
            .insert(token_hash.to_string(), record);
        Ok(())
    }

    async fn get(&self, token_hash: &str) -> Result<Option<SessionRecord>, AuthError> {
        Ok(self.sessions.read().await.get(token_hash).cloned())
    }

    async fn remove(&self, token_hash: &str) -> Result<(), AuthError> {
        self.sessions.write().await.remove(token_hash);
        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, AuthError> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, record| !record.is_expired(now));
        Ok((before - sessions.len()) as u64)
    }
}

/// Sessions in the `admin_sessions` table. Survive restarts.
#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    fn kind(&self) -> &'static str {
        "postgres"
    }

    async fn insert(&self, token_hash: &str, record: SessionRecord) -> Result<(), AuthError> {
        sqlx::query(
            r#"
            INSERT INTO admin_sessions (token_hash, username, expires_at, created_at)
            VALUES ($1, $2, $3, now())
            "#,
        )
        .bind(token_hash)
        .bind(&record.username)
        .bind(record.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, token_hash: &str) -> Result<Option<SessionRecord>, AuthError> {
        let row = sqlx::query_as::<_, AdminSessionRow>(
            "SELECT username, expires_at FROM admin_sessions WHERE token_hash = $1",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| SessionRecord {
            username: row.username,
            expires_at: row.expires_at,
        }))
    }

    async fn remove(&self, token_hash: &str) -> Result<(), AuthError> {
        sqlx::query("DELETE FROM admin_sessions WHERE token_hash = $1")
            .bind(token_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, AuthError> {
        let result = sqlx::query("DELETE FROM admin_sessions WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
