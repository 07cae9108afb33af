//! Database Models - rows read back through sqlx.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Content section row
#[derive(Debug, Clone, FromRow)]
pub struct ContentSectionRow {
    pub name: String,
    pub payload: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

/// Admin identity row
#[derive(Debug, Clone, FromRow)]
pub struct AdminUserRow {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
}

/// Server-side session row, keyed by the SHA-256 of the cookie token
#[derive(Debug, Clone, FromRow)]
pub struct AdminSessionRow {
    pub username: String,
    pub expires_at: DateTime<Utc>,
}

/// Uploaded asset stored inline as base64
#[derive(Debug, Clone, FromRow)]
pub struct UploadedAssetRow {
    pub id: Uuid,
    pub filename: String,
    pub mime_type: String,
    pub size: i64,
    pub data_base64: String,
}

/// Asset metadata without the blob column
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedAssetMeta {
    pub id: Uuid,
    pub filename: String,
    pub mime_type: String,
    pub size: i64,
    pub created_at: DateTime<Utc>,
}
