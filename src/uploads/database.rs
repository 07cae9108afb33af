//! Images as base64 text in `uploaded_assets`, for runtimes without a
//! persistent filesystem.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use sqlx::PgPool;
use uuid::Uuid;

use super::{
    AssetBackend, AssetError, AssetInfo, AssetResult, FetchedAsset, NewAsset, UploadStrategy,
};
use crate::db::models::{UploadedAssetMeta, UploadedAssetRow};

pub struct DatabaseAssetBackend {
    pool: PgPool,
}

impl DatabaseAssetBackend {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub(crate) fn reference_for(id: Uuid) -> String {
    format!("/api/uploads/{}", id)
}

#[async_trait]
impl AssetBackend for DatabaseAssetBackend {
    fn strategy(&self) -> UploadStrategy {
        UploadStrategy::Database
    }

    async fn store(&self, asset: &NewAsset) -> AssetResult<String> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO uploaded_assets (id, filename, mime_type, size, data_base64, created_at)
            VALUES ($1, $2, $3, $4, $5, now())
            "#,
        )
        .bind(id)
        .bind(&asset.filename)
        .bind(&asset.mime_type)
        .bind(asset.bytes.len() as i64)
        .bind(STANDARD.encode(&asset.bytes))
        .execute(&self.pool)
        .await?;

        Ok(reference_for(id))
    }

    async fn discard(&self, asset: &NewAsset) -> AssetResult<()> {
        sqlx::query("DELETE FROM uploaded_assets WHERE filename = $1")
            .bind(&asset.filename)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn fetch(&self, key: &str) -> AssetResult<FetchedAsset> {
        let id = Uuid::parse_str(key).map_err(|_| AssetError::InvalidReference)?;

        let row = sqlx::query_as::<_, UploadedAssetRow>(
            "SELECT id, filename, mime_type, size, data_base64 FROM uploaded_assets WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AssetError::NotFound)?;

        let bytes = STANDARD.decode(row.data_base64.as_bytes()).map_err(|e| {
            AssetError::Backend(format!("corrupt asset {}: {}", row.filename, e))
        })?;

        Ok(FetchedAsset::Inline {
            mime_type: row.mime_type,
            bytes,
        })
    }

    async fn list(&self) -> AssetResult<Vec<AssetInfo>> {
        let rows = sqlx::query_as::<_, UploadedAssetMeta>(
            r#"
            SELECT id, filename, mime_type, size, created_at
            FROM uploaded_assets
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| AssetInfo {
                path: reference_for(row.id),
                name: row.filename,
                size: row.size.max(0) as u64,
                created: Some(row.created_at),
            })
            .collect())
    }
}
