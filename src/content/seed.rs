//! Seeding the section store from bundled defaults.

use serde::Serialize;

use super::{defaults::default_payload, ContentResult, SectionName, SectionStore};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub inserted: usize,
    pub updated: usize,
}

/// Insert the default payload for every section that has none.
///
/// With `force`, existing sections are overwritten as well and counted as
/// updated. Running twice without `force` writes nothing the second time.
pub async fn seed_defaults(store: &SectionStore, force: bool) -> ContentResult<SeedReport> {
    let backend = store.backend();
    let mut report = SeedReport::default();

    for section in SectionName::ALL {
        let Some(payload) = default_payload(section) else {
            continue;
        };

        let exists = backend.contains(section).await?;
        if exists && !force {
            continue;
        }

        backend.upsert(section, payload).await?;
        if exists {
            report.updated += 1;
        } else {
            report.inserted += 1;
        }
    }

    if report.inserted > 0 || report.updated > 0 {
        tracing::info!(
            inserted = report.inserted,
            updated = report.updated,
            backend = backend.kind(),
            "content seeded"
        );
    } else {
        tracing::info!(backend = backend.kind(), "content already up to date");
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::tests::MemoryBackend;
    use serde_json::{json, Value};
    use std::sync::{atomic::Ordering, Arc};

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let backend = Arc::new(MemoryBackend::default());
        let store = SectionStore::new(backend.clone());

        let first = seed_defaults(&store, false).await.unwrap();
        assert_eq!(first.inserted, SectionName::ALL.len());
        assert_eq!(first.updated, 0);
        let writes_after_first = backend.writes.load(Ordering::SeqCst);

        let second = seed_defaults(&store, false).await.unwrap();
        assert_eq!(second, SeedReport::default());
        assert_eq!(backend.writes.load(Ordering::SeqCst), writes_after_first);
    }

    #[tokio::test]
    async fn test_force_overwrites_each_section_once() {
        let backend = Arc::new(MemoryBackend::default());
        let store = SectionStore::new(backend.clone());
        seed_defaults(&store, false).await.unwrap();
        store
            .put_section("hero", json!({ "greeting": "edited" }))
            .await
            .unwrap();
        let before = backend.writes.load(Ordering::SeqCst);

        let report = seed_defaults(&store, true).await.unwrap();
        assert_eq!(report.inserted, 0);
        assert_eq!(report.updated, SectionName::ALL.len());
        assert_eq!(
            backend.writes.load(Ordering::SeqCst) - before,
            SectionName::ALL.len()
        );
        assert_eq!(
            store.get_section("hero").await.unwrap(),
            Value::Object(default_payload(SectionName::Hero).unwrap())
        );
    }

    #[tokio::test]
    async fn test_seed_keeps_existing_edits() {
        let store = SectionStore::new(Arc::new(MemoryBackend::default()));
        store
            .put_section("about", json!({ "bio": "mine" }))
            .await
            .unwrap();

        let report = seed_defaults(&store, false).await.unwrap();
        assert_eq!(report.inserted, SectionName::ALL.len() - 1);
        assert_eq!(
            store.get_section("about").await.unwrap(),
            json!({ "bio": "mine" })
        );
    }

    #[tokio::test]
    async fn test_seeded_projects_match_bundle() {
        let store = SectionStore::new(Arc::new(MemoryBackend::default()));
        seed_defaults(&store, false).await.unwrap();
        assert_eq!(
            store.get_section("projects").await.unwrap(),
            Value::Object(default_payload(SectionName::Projects).unwrap())
        );
    }
}
