//! Uploaded image assets.
//!
//! Which medium holds the bytes (local disk, a database column, or an object
//! storage bucket) is decided once at startup by [`UploadStrategy::select`].
//! Everything above [`AssetBackend`] is medium-agnostic: files are validated,
//! renamed server-side, stored, and answered with an opaque reference.

pub mod database;
pub mod disk;
pub mod object;

use async_trait::async_trait;
use axum::body::Bytes;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use sqlx::PgPool;
use std::{fmt, sync::Arc};
use thiserror::Error;

pub use database::DatabaseAssetBackend;
pub use disk::DiskAssetBackend;
pub use object::ObjectStorageBackend;

use crate::config::UploadConfig;

pub const MAX_FILE_SIZE: usize = 5 * 1024 * 1024; // 5MB
pub const MAX_FILES_PER_BATCH: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum UploadStrategy {
    ObjectStorage,
    Database,
    Disk,
}

impl UploadStrategy {
    /// First match wins: object storage credentials, then an ephemeral
    /// runtime, then local disk.
    pub fn select(config: &UploadConfig) -> Self {
        if config.object_storage.is_some() {
            UploadStrategy::ObjectStorage
        } else if config.serverless {
            UploadStrategy::Database
        } else {
            UploadStrategy::Disk
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UploadStrategy::ObjectStorage => "object-storage",
            UploadStrategy::Database => "database",
            UploadStrategy::Disk => "disk",
        }
    }
}

impl fmt::Display for UploadStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("{0}")]
    InvalidFile(String),

    #[error("invalid asset reference")]
    InvalidReference,

    #[error("asset not found")]
    NotFound,

    #[error("asset backend failure: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for AssetError {
    fn from(err: sqlx::Error) -> Self {
        AssetError::Backend(err.to_string())
    }
}

impl From<std::io::Error> for AssetError {
    fn from(err: std::io::Error) -> Self {
        AssetError::Backend(err.to_string())
    }
}

impl From<reqwest::Error> for AssetError {
    fn from(err: reqwest::Error) -> Self {
        AssetError::Backend(err.to_string())
    }
}

pub type AssetResult<T> = Result<T, AssetError>;

/// A file as received from the client. Nothing here is trusted.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub original_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// A validated file with its server-generated name, ready to persist.
#[derive(Debug, Clone)]
pub struct NewAsset {
    pub filename: String,
    pub mime_type: String,
    pub bytes: Bytes,
}

/// What a retrieval resolves to.
#[derive(Debug)]
pub enum FetchedAsset {
    Inline { mime_type: String, bytes: Vec<u8> },
    Redirect(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct AssetInfo {
    pub name: String,
    pub path: String,
    pub size: u64,
    pub created: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait AssetBackend: Send + Sync {
    fn strategy(&self) -> UploadStrategy;

    /// Persist the asset and return the reference handed back to clients.
    async fn store(&self, asset: &NewAsset) -> AssetResult<String>;

    /// Undo a completed `store`; used to roll back a failed batch.
    async fn discard(&self, asset: &NewAsset) -> AssetResult<()>;

    /// Resolve the last path segment of `/api/uploads/{key}`.
    async fn fetch(&self, key: &str) -> AssetResult<FetchedAsset>;

    async fn list(&self) -> AssetResult<Vec<AssetInfo>>;
}

#[derive(Clone)]
pub struct AssetStore {
    backend: Arc<dyn AssetBackend>,
}

impl AssetStore {
    pub fn new(backend: Arc<dyn AssetBackend>) -> Self {
        Self { backend }
    }

    /// Build the backend for the selected strategy. Misconfiguration is an
    /// error here rather than a fallback to another medium.
    pub async fn connect(config: &UploadConfig, pool: Option<PgPool>) -> AssetResult<Self> {
        let strategy = UploadStrategy::select(config);
        let backend: Arc<dyn AssetBackend> = match strategy {
            UploadStrategy::ObjectStorage => {
                let storage = config.object_storage.as_ref().ok_or_else(|| {
                    AssetError::Backend("object storage selected without credentials".to_string())
                })?;
                Arc::new(ObjectStorageBackend::new(storage)?)
            }
            UploadStrategy::Database => {
                let pool = pool.ok_or_else(|| {
                    AssetError::Backend(
                        "serverless runtime needs DATABASE_URL for upload storage".to_string(),
                    )
                })?;
                Arc::new(DatabaseAssetBackend::new(pool))
            }
            UploadStrategy::Disk => Arc::new(DiskAssetBackend::create(config.dir.clone()).await?),
        };

        tracing::info!(strategy = %strategy, "upload storage ready");
        Ok(Self::new(backend))
    }

    pub fn strategy(&self) -> UploadStrategy {
        self.backend.strategy()
    }

    pub async fn save_file(&self, file: IncomingFile) -> AssetResult<String> {
        let asset = prepare(file)?;
        let reference = self.backend.store(&asset).await?;
        tracing::info!(
            filename = %asset.filename,
            size = asset.bytes.len(),
            strategy = %self.strategy(),
            "image uploaded"
        );
        Ok(reference)
    }

    /// Validate the whole batch before writing any of it. A write failure
    /// part-way discards what this call already stored.
    pub async fn save_files(&self, files: Vec<IncomingFile>) -> AssetResult<Vec<String>> {
        if files.is_empty() {
            return Err(AssetError::InvalidFile("No files uploaded".to_string()));
        }
        if files.len() > MAX_FILES_PER_BATCH {
            return Err(AssetError::InvalidFile(format!(
                "Too many files. Maximum is {} per upload.",
                MAX_FILES_PER_BATCH
            )));
        }

        let assets = files
            .into_iter()
            .map(prepare)
            .collect::<AssetResult<Vec<_>>>()?;

        let mut references = Vec::with_capacity(assets.len());
        for (index, asset) in assets.iter().enumerate() {
            match self.backend.store(asset).await {
                Ok(reference) => references.push(reference),
                Err(e) => {
                    for stored in &assets[..index] {
                        if let Err(cleanup) = self.backend.discard(stored).await {
                            tracing::error!(
                                filename = %stored.filename,
                                error = %cleanup,
                                "failed to roll back batch upload"
                            );
                        }
                    }
                    return Err(e);
                }
            }
        }

        tracing::info!(count = references.len(), strategy = %self.strategy(), "images uploaded");
        Ok(references)
    }

    pub async fn fetch(&self, key: &str) -> AssetResult<FetchedAsset> {
        self.backend.fetch(key).await
    }

    pub async fn list(&self) -> AssetResult<Vec<AssetInfo>> {
        self.backend.list().await
    }
}

/// Check a client file and give it a server-side name.
pub fn prepare(file: IncomingFile) -> AssetResult<NewAsset> {
    let mime_type = validate(&file)?;
    let filename = generate_filename(file.original_name.as_deref(), &mime_type);
    Ok(NewAsset {
        filename,
        mime_type,
        bytes: file.bytes,
    })
}

/// Returns the normalised MIME type of an acceptable image.
pub fn validate(file: &IncomingFile) -> AssetResult<String> {
    let mime_type = file
        .content_type
        .as_deref()
        .map(|m| m.trim().to_ascii_lowercase())
        .unwrap_or_default();

    if !mime_type.starts_with("image/") {
        return Err(AssetError::InvalidFile(
            "Only image files are allowed".to_string(),
        ));
    }
    if file.bytes.is_empty() {
        return Err(AssetError::InvalidFile("Empty file".to_string()));
    }
    if file.bytes.len() > MAX_FILE_SIZE {
        return Err(AssetError::InvalidFile(
            "File too large. Maximum size is 5MB.".to_string(),
        ));
    }
    Ok(mime_type)
}

/// `{unix millis}-{random}{.ext}`. The client's extension survives only when
/// it names the validated MIME type; otherwise the extension comes from the MIME type.
pub fn generate_filename(original_name: Option<&str>, mime_type: &str) -> String {
    let ext = original_name
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .filter(|ext| mime_for_filename(&format!("f.{}", ext)) == mime_type)
        .or_else(|| extension_for_mime(mime_type).map(str::to_string));

    let suffix: u32 = rand::rng().random_range(0..1_000_000_000);
    match ext {
        Some(ext) => format!("{}-{}.{}", Utc::now().timestamp_millis(), suffix, ext),
        None => format!("{}-{}", Utc::now().timestamp_millis(), suffix),
    }
}

fn extension_for_mime(mime: &str) -> Option<&'static str> {
    match mime {
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        "image/svg+xml" => Some("svg"),
        "image/avif" => Some("avif"),
        _ => None,
    }
}

pub(crate) fn mime_for_filename(filename: &str) -> &'static str {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "avif" => "image/avif",
        "bmp" => "image/bmp",
        "ico" => "image/x-icon",
        _ => "application/octet-stream",
    }
}

/// A key must be a single plain path segment.
pub(crate) fn is_safe_key(key: &str) -> bool {
    !key.is_empty()
        && !key.starts_with('.')
        && !key.contains("..")
        && !key.contains('/')
        && !key.contains('\\')
        && !key.contains('\0')
}
