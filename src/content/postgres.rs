//! Relational section store: one `content_sections` row per section.

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::PgPool;

use super::{ContentError, ContentResult, SectionBackend, SectionName};
use crate::db::models::ContentSectionRow;

#[derive(Clone)]
pub struct PgSectionStore {
    pool: PgPool,
}

impl PgSectionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SectionBackend for PgSectionStore {
    fn kind(&self) -> &'static str {
        "postgres"
    }

    async fn stored_names(&self) -> ContentResult<Vec<String>> {
        let names: Vec<(String,)> = sqlx::query_as("SELECT name FROM content_sections")
            .fetch_all(&self.pool)
            .await?;
        Ok(names.into_iter().map(|(name,)| name).collect())
    }

    async fn load(&self, section: SectionName) -> ContentResult<Option<Map<String, Value>>> {
        let row = sqlx::query_as::<_, ContentSectionRow>(
            "SELECT name, payload, updated_at FROM content_sections WHERE name = $1",
        )
        .bind(section.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ContentSectionRow {
                payload: Value::Object(map),
                ..
            }) => Ok(Some(map)),
            Some(row) => Err(ContentError::Backend(format!(
                "stored payload for '{}' is not an object",
                row.name
            ))),
            None => Ok(None),
        }
    }

    async fn upsert(&self, section: SectionName, payload: Map<String, Value>) -> ContentResult<()> {
        sqlx::query(
            r#"
            INSERT INTO content_sections (name, payload, updated_at)
            VALUES ($1, $2, now())
            ON CONFLICT (name) DO UPDATE SET
                payload = EXCLUDED.payload,
                updated_at = now()
            "#,
        )
        .bind(section.as_str())
        .bind(Value::Object(payload))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn contains(&self, section: SectionName) -> ContentResult<bool> {
        let exists: (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM content_sections WHERE name = $1)")
                .bind(section.as_str())
                .fetch_one(&self.pool)
                .await?;
        Ok(exists.0)
    }
}
