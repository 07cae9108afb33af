//! Content sections.
//!
//! A section is a named block of site content (hero, about, ...) stored as an
//! opaque JSON object. The set of names is closed; the storage medium is picked
//! once at startup and hidden behind [`SectionBackend`].

pub mod defaults;
pub mod file;
pub mod postgres;
pub mod seed;

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::{collections::BTreeSet, fmt, str::FromStr, sync::Arc};
use thiserror::Error;

pub use file::FileSectionStore;
pub use postgres::PgSectionStore;
pub use seed::{seed_defaults, SeedReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SectionName {
    Hero,
    About,
    Skills,
    Experience,
    Projects,
    Contact,
    Gallery,
}

impl SectionName {
    pub const ALL: [SectionName; 7] = [
        SectionName::Hero,
        SectionName::About,
        SectionName::Skills,
        SectionName::Projects,
        SectionName::Experience,
        SectionName::Contact,
        SectionName::Gallery,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SectionName::Hero => "hero",
            SectionName::About => "about",
            SectionName::Skills => "skills",
            SectionName::Experience => "experience",
            SectionName::Projects => "projects",
            SectionName::Contact => "contact",
            SectionName::Gallery => "gallery",
        }
    }
}

impl fmt::Display for SectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SectionName {
    type Err = ContentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SectionName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| ContentError::UnknownSection(s.to_string()))
    }
}

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("unknown section '{0}'")]
    UnknownSection(String),

    #[error("no content stored for section '{0}'")]
    NotFound(SectionName),

    #[error("section payload must be a JSON object")]
    InvalidPayload,

    #[error("content backend failure: {0}")]
    Backend(String),
}

impl ContentError {
    pub fn is_backend(&self) -> bool {
        matches!(self, ContentError::Backend(_))
    }
}

impl From<sqlx::Error> for ContentError {
    fn from(err: sqlx::Error) -> Self {
        ContentError::Backend(err.to_string())
    }
}

impl From<std::io::Error> for ContentError {
    fn from(err: std::io::Error) -> Self {
        ContentError::Backend(err.to_string())
    }
}

pub type ContentResult<T> = Result<T, ContentError>;

/// Physical storage for section payloads.
#[async_trait]
pub trait SectionBackend: Send + Sync {
    /// Short label used in logs and health output.
    fn kind(&self) -> &'static str;

    /// Names that currently have a stored payload.
    async fn stored_names(&self) -> ContentResult<Vec<String>>;

    async fn load(&self, section: SectionName) -> ContentResult<Option<Map<String, Value>>>;

    /// Insert or wholesale replace the payload of `section`.
    async fn upsert(&self, section: SectionName, payload: Map<String, Value>) -> ContentResult<()>;

    async fn contains(&self, section: SectionName) -> ContentResult<bool> {
        Ok(self.load(section).await?.is_some())
    }
}

/// Allow-list-enforcing facade over the selected backend.
#[derive(Clone)]
pub struct SectionStore {
    backend: Arc<dyn SectionBackend>,
}

impl SectionStore {
    pub fn new(backend: Arc<dyn SectionBackend>) -> Self {
        Self { backend }
    }

    pub fn backend_kind(&self) -> &'static str {
        self.backend.kind()
    }

    pub(crate) fn backend(&self) -> &dyn SectionBackend {
        self.backend.as_ref()
    }

    /// Allow-list plus whatever the backend holds, allow-list order first.
    pub async fn list_sections(&self) -> ContentResult<Vec<String>> {
        let mut names: Vec<String> = SectionName::ALL
            .iter()
            .map(|name| name.as_str().to_string())
            .collect();
        let known: BTreeSet<String> = names.iter().cloned().collect();

        let mut extra: Vec<String> = self
            .backend
            .stored_names()
            .await?
            .into_iter()
            .filter(|name| !known.contains(name))
            .collect();
        extra.sort();
        extra.dedup();
        names.extend(extra);
        Ok(names)
    }

    pub async fn get_section(&self, name: &str) -> ContentResult<Value> {
        let section: SectionName = name.parse()?;
        match self.backend.load(section).await? {
            Some(payload) => Ok(Value::Object(payload)),
            None => Err(ContentError::NotFound(section)),
        }
    }

    pub async fn put_section(&self, name: &str, payload: Value) -> ContentResult<()> {
        let section: SectionName = name.parse()?;
        let Value::Object(payload) = payload else {
            return Err(ContentError::InvalidPayload);
        };
        self.backend.upsert(section, payload).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::RwLock;
    use std::collections::HashMap;

    /// In-memory backend for exercising the facade and seeding.
    #[derive(Default)]
    pub(crate) struct MemoryBackend {
        pub(crate) entries: RwLock<HashMap<String, Map<String, Value>>>,
        pub(crate) writes: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl SectionBackend for MemoryBackend {
        fn kind(&self) -> &'static str {
            "memory"
        }

        async fn stored_names(&self) -> ContentResult<Vec<String>> {
            Ok(self.entries.read().await.keys().cloned().collect())
        }

        async fn load(&self, section: SectionName) -> ContentResult<Option<Map<String, Value>>> {
            Ok(self.entries.read().await.get(section.as_str()).cloned())
        }

        async fn upsert(
            &self,
            section: SectionName,
            payload: Map<String, Value>,
        ) -> ContentResult<()> {
            self.writes
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            self.entries
                .write()
                .await
                .insert(section.as_str().to_string(), payload);
            Ok(())
        }
    }

    fn store() -> SectionStore {
        SectionStore::new(Arc::new(MemoryBackend::default()))
    }

    #[test]
    fn test_section_names_parse_exactly() {
        for name in SectionName::ALL {
            assert_eq!(name.as_str().parse::<SectionName>().unwrap(), name);
        }
        assert!("Hero".parse::<SectionName>().is_err());
        assert!("blog".parse::<SectionName>().is_err());
        assert!("".parse::<SectionName>().is_err());
    }

    #[tokio::test]
    async fn test_put_then_get_returns_same_payload() {
        let store = store();
        let payload = json!({
            "greeting": "Hi",
            "nested": { "list": [1, 2, { "deep": null }] },
            "flag": true
        });
        for name in SectionName::ALL {
            store.put_section(name.as_str(), payload.clone()).await.unwrap();
            assert_eq!(store.get_section(name.as_str()).await.unwrap(), payload);
        }
    }

    #[tokio::test]
    async fn test_put_replaces_wholesale() {
        let store = store();
        store
            .put_section("hero", json!({ "greeting": "Hi", "name": "A" }))
            .await
            .unwrap();
        store
            .put_section("hero", json!({ "title": "Dev" }))
            .await
            .unwrap();
        assert_eq!(
            store.get_section("hero").await.unwrap(),
            json!({ "title": "Dev" })
        );
    }

    #[tokio::test]
    async fn test_unknown_section_rejected() {
        let store = store();
        assert!(matches!(
            store.get_section("nonexistent").await,
            Err(ContentError::UnknownSection(_))
        ));
        assert!(matches!(
            store.put_section("nonexistent", json!({})).await,
            Err(ContentError::UnknownSection(_))
        ));
        assert!(!store
            .list_sections()
            .await
            .unwrap()
            .contains(&"nonexistent".to_string()));
    }

    #[tokio::test]
    async fn test_non_object_payload_rejected() {
        let store = store();
        for payload in [json!([1, 2]), json!("text"), json!(3), json!(null)] {
            assert!(matches!(
                store.put_section("about", payload).await,
                Err(ContentError::InvalidPayload)
            ));
        }
    }

    #[tokio::test]
    async fn test_never_written_section_is_not_found() {
        let store = store();
        assert!(matches!(
            store.get_section("gallery").await,
            Err(ContentError::NotFound(SectionName::Gallery))
        ));
    }

    #[tokio::test]
    async fn test_list_includes_allow_list_before_any_write() {
        let backend = Arc::new(MemoryBackend::default());
        backend
            .entries
            .write()
            .await
            .insert("legacy".to_string(), Map::new());
        let store = SectionStore::new(backend);

        let names = store.list_sections().await.unwrap();
        assert_eq!(names.len(), SectionName::ALL.len() + 1);
        assert_eq!(names[0], "hero");
        assert_eq!(names.last().unwrap(), "legacy");
    }
}
