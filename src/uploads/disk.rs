use async_trait::async_trait;
use std::{io::ErrorKind, path::PathBuf};

use super::{
    is_safe_key, mime_for_filename, AssetBackend, AssetError, AssetInfo, AssetResult,
    FetchedAsset, NewAsset, UploadStrategy,
};

/// Images under a local directory, served statically at `/uploads`.
pub struct DiskAssetBackend {
    dir: PathBuf,
}

impl DiskAssetBackend {
    pub async fn create(dir: PathBuf) -> AssetResult<Self> {
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    async fn resolve(&self, key: &str) -> AssetResult<PathBuf> {
        if !is_safe_key(key) {
            return Err(AssetError::InvalidReference);
        }

        let root = tokio::fs::canonicalize(&self.dir).await?;
        let path = match tokio::fs::canonicalize(self.dir.join(key)).await {
            Ok(path) => path,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(AssetError::NotFound),
            Err(e) => return Err(e.into()),
        };

        // Symlinks could still point outside the directory.
        if !path.starts_with(&root) {
            return Err(AssetError::InvalidReference);
        }
        Ok(path)
    }
}

#[async_trait]
impl AssetBackend for DiskAssetBackend {
    fn strategy(&self) -> UploadStrategy {
        UploadStrategy::Disk
    }

    async fn store(&self, asset: &NewAsset) -> AssetResult<String> {
        let target = self.dir.join(&asset.filename);
        let partial = self.dir.join(format!(".{}.part", asset.filename));

        if let Err(e) = tokio::fs::write(&partial, &asset.bytes).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e.into());
        }
        if let Err(e) = tokio::fs::rename(&partial, &target).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e.into());
        }

        Ok(format!("/uploads/{}", asset.filename))
    }

    async fn discard(&self, asset: &NewAsset) -> AssetResult<()> {
        match tokio::fs::remove_file(self.dir.join(&asset.filename)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn fetch(&self, key: &str) -> AssetResult<FetchedAsset> {
        let path = self.resolve(key).await?;
        let bytes = tokio::fs::read(&path).await?;
        Ok(FetchedAsset::Inline {
            mime_type: mime_for_filename(key).to_string(),
            bytes,
        })
    }

    async fn list(&self) -> AssetResult<Vec<AssetInfo>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut assets = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = match entry.file_name().to_str() {
                Some(name) if !name.starts_with('.') => name.to_string(),
                _ => continue,
            };
            let metadata = match entry.metadata().await {
                Ok(m) if m.is_file() => m,
                _ => continue,
            };

            let created = metadata
                .created()
                .or_else(|_| metadata.modified())
                .ok()
                .map(chrono::DateTime::<chrono::Utc>::from);

            assets.push(AssetInfo {
                path: format!("/uploads/{}", name),
                name,
                size: metadata.len(),
                created,
            });
        }

        assets.sort_by(|a, b| b.created.cmp(&a.created));
        Ok(assets)
    }
}
