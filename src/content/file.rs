//! Flat-file section store: one JSON document mapping section name to payload.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::{fs, sync::Mutex};

use super::{ContentError, ContentResult, SectionBackend, SectionName};

type Document = BTreeMap<String, Map<String, Value>>;

pub struct FileSectionStore {
    path: PathBuf,
    /// Lazily loaded copy of the document; the mutex also serialises writers.
    cache: Mutex<Option<Arc<Document>>>,
}

impl FileSectionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn document(&self) -> ContentResult<Arc<Document>> {
        let mut cache = self.cache.lock().await;
        if let Some(doc) = cache.as_ref() {
            return Ok(doc.clone());
        }
        let doc = Arc::new(self.read_from_disk().await?);
        *cache = Some(doc.clone());
        Ok(doc)
    }

    async fn read_from_disk(&self) -> ContentResult<Document> {
        let raw = match fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "content file not found, starting empty");
                return Ok(Document::new());
            }
            Err(e) => return Err(e.into()),
        };

        serde_json::from_slice(&raw).map_err(|e| {
            ContentError::Backend(format!(
                "content file {} is not a valid section document: {}",
                self.path.display(),
                e
            ))
        })
    }

    /// Write to a sibling temp file and rename it over the target.
    async fn persist(&self, doc: &Document) -> ContentResult<()> {
        if let Some(dir) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(dir).await?;
        }

        let bytes = serde_json::to_vec_pretty(doc)
            .map_err(|e| ContentError::Backend(format!("failed to encode content: {}", e)))?;

        let mut tmp_name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "content.json".into());
        tmp_name.push(".tmp");
        let tmp_path = self.path.with_file_name(tmp_name);

        fs::write(&tmp_path, &bytes).await?;
        if let Err(e) = fs::rename(&tmp_path, &self.path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }
        Ok(())
    }
}

#[async_trait]
impl SectionBackend for FileSectionStore {
    fn kind(&self) -> &'static str {
        "file"
    }

    async fn stored_names(&self) -> ContentResult<Vec<String>> {
        Ok(self.document().await?.keys().cloned().collect())
    }

    async fn load(&self, section: SectionName) -> ContentResult<Option<Map<String, Value>>> {
        Ok(self.document().await?.get(section.as_str()).cloned())
    }

    async fn upsert(&self, section: SectionName, payload: Map<String, Value>) -> ContentResult<()> {
        let mut cache = self.cache.lock().await;
        let mut doc = match cache.as_ref() {
            Some(doc) => Document::clone(doc),
            None => self.read_from_disk().await?,
        };
        doc.insert(section.as_str().to_string(), payload);

        self.persist(&doc).await?;
        *cache = Some(Arc::new(doc));

        tracing::debug!(section = %section, path = %self.path.display(), "content file rewritten");
        Ok(())
    }
}
