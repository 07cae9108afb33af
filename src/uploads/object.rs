//! Images in a Supabase Storage bucket, addressed over its REST API.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{header, Client, Url};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use super::{
    is_safe_key, AssetBackend, AssetError, AssetInfo, AssetResult, FetchedAsset, NewAsset,
    UploadStrategy,
};
use crate::config::ObjectStorageConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const LIST_LIMIT: u32 = 1000;

pub struct ObjectStorageBackend {
    client: Client,
    base_url: String,
    service_key: String,
    bucket: String,
}

#[derive(Debug, Deserialize)]
struct StorageObject {
    name: String,
    created_at: Option<DateTime<Utc>>,
    metadata: Option<StorageMetadata>,
}

#[derive(Debug, Deserialize)]
struct StorageMetadata {
    size: Option<u64>,
}

impl ObjectStorageBackend {
    pub fn new(config: &ObjectStorageConfig) -> AssetResult<Self> {
        Url::parse(&config.url)
            .map_err(|e| AssetError::Backend(format!("invalid SUPABASE_URL: {}", e)))?;
        if config.bucket.is_empty() || config.bucket.contains('/') {
            return Err(AssetError::Backend(format!(
                "invalid storage bucket name: {:?}",
                config.bucket
            )));
        }

        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            service_key: config.service_key.clone(),
            bucket: config.bucket.clone(),
        })
    }

    fn object_url(&self, name: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", self.base_url, self.bucket, name)
    }

    pub fn public_url(&self, name: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, self.bucket, name
        )
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
    }

    async fn expect_success(response: reqwest::Response, action: &str) -> AssetResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(AssetError::Backend(format!(
            "object storage {} failed with {}: {}",
            action, status, body
        )))
    }
}

#[async_trait]
impl AssetBackend for ObjectStorageBackend {
    fn strategy(&self) -> UploadStrategy {
        UploadStrategy::ObjectStorage
    }

    async fn store(&self, asset: &NewAsset) -> AssetResult<String> {
        let response = self
            .authorized(self.client.post(self.object_url(&asset.filename)))
            .header(header::CONTENT_TYPE, &asset.mime_type)
            .header("x-upsert", "false")
            .body(asset.bytes.clone())
            .send()
            .await?;
        Self::expect_success(response, "upload").await?;

        Ok(self.public_url(&asset.filename))
    }

    async fn discard(&self, asset: &NewAsset) -> AssetResult<()> {
        let response = self
            .authorized(self.client.delete(self.object_url(&asset.filename)))
            .send()
            .await?;
        Self::expect_success(response, "delete").await?;
        Ok(())
    }

    async fn fetch(&self, key: &str) -> AssetResult<FetchedAsset> {
        if !is_safe_key(key) {
            return Err(AssetError::InvalidReference);
        }
        Ok(FetchedAsset::Redirect(self.public_url(key)))
    }

    async fn list(&self) -> AssetResult<Vec<AssetInfo>> {
        let url = format!("{}/storage/v1/object/list/{}", self.base_url, self.bucket);
        let response = self
            .authorized(self.client.post(url))
            .json(&json!({
                "prefix": "",
                "limit": LIST_LIMIT,
                "offset": 0,
                "sortBy": { "column": "created_at", "order": "desc" },
            }))
            .send()
            .await?;
        let objects: Vec<StorageObject> = Self::expect_success(response, "list")
            .await?
            .json()
            .await?;

        Ok(objects
            .into_iter()
            // Folder placeholders come back without metadata.
            .filter(|object| object.metadata.is_some())
            .map(|object| AssetInfo {
                path: self.public_url(&object.name),
                size: object.metadata.and_then(|m| m.size).unwrap_or(0),
                created: object.created_at,
                name: object.name,
            })
            .collect())
    }
}
