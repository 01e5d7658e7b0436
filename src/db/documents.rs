use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::types::Json;
use uuid::Uuid;

use super::{
    categories::{category_condition, load_links, replace_links},
    search_pattern, PgStore,
};
use crate::{
    models::document::{Document, DocumentChanges, DocumentKind, NewDocument},
    store::{CategoryLinks, DocumentStore, ListFilter},
};

/// Column list for `Document`. Courses have no duration column of their own.
fn columns(kind: DocumentKind) -> &'static str {
    match kind {
        DocumentKind::Lesson => {
            "id, name, cover_url, content, duration, tenant_id, author_id, created_at, updated_at"
        }
        DocumentKind::Course => {
            "id, name, cover_url, content, NULL::INT AS duration, tenant_id, author_id, created_at, updated_at"
        }
    }
}

#[async_trait]
impl DocumentStore for PgStore {
    /// Matches against Postgres' text rendering of the JSONB column. Ids
    /// are hyphenated lowercase UUIDs, which never need escaping, so they
    /// appear verbatim there even inside string-encoded sub-trees.
    async fn find_ids_where_content_contains(
        &self,
        kind: DocumentKind,
        needle: &str,
        tenant_id: Uuid,
    ) -> anyhow::Result<Vec<Uuid>> {
        let table = kind.table();
        let ids = sqlx::query_scalar::<_, Uuid>(&format!(
            "SELECT id FROM {table}
             WHERE tenant_id = $1 AND strpos(content::text, $2) > 0"
        ))
        .bind(tenant_id)
        .bind(needle)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn get_by_ids(&self, kind: DocumentKind, ids: &[Uuid]) -> anyhow::Result<Vec<Document>> {
        let (table, cols) = (kind.table(), columns(kind));
        let docs = sqlx::query_as::<_, Document>(&format!(
            "SELECT {cols} FROM {table} WHERE id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(docs)
    }

    async fn replace_content(
        &self,
        kind: DocumentKind,
        id: Uuid,
        content: &Value,
    ) -> anyhow::Result<()> {
        let table = kind.table();
        sqlx::query(&format!(
            "UPDATE {table} SET content = $1, updated_at = NOW() WHERE id = $2"
        ))
        .bind(Json(content))
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, kind: DocumentKind, id: Uuid) -> anyhow::Result<Option<Document>> {
        let (table, cols) = (kind.table(), columns(kind));
        let doc = sqlx::query_as::<_, Document>(&format!(
            "SELECT {cols} FROM {table} WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(doc)
    }

    async fn list(
        &self,
        kind: DocumentKind,
        tenant_id: Uuid,
        filter: &ListFilter,
    ) -> anyhow::Result<(Vec<Document>, i64)> {
        let (table, cols) = (kind.table(), columns(kind));
        let pattern = search_pattern(filter.search.as_deref());
        let in_categories = category_condition(kind.category_owner(), "d", 3);

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM {table} d
             WHERE d.tenant_id = $1 AND ($2::TEXT IS NULL OR d.name ILIKE $2)
               AND {in_categories}"
        ))
        .bind(tenant_id)
        .bind(&pattern)
        .bind(&filter.category_ids)
        .fetch_one(&self.pool)
        .await?;

        let docs = sqlx::query_as::<_, Document>(&format!(
            "SELECT {cols} FROM {table} d
             WHERE d.tenant_id = $1 AND ($2::TEXT IS NULL OR d.name ILIKE $2)
               AND {in_categories}
             ORDER BY d.created_at DESC
             LIMIT $4 OFFSET $5"
        ))
        .bind(tenant_id)
        .bind(&pattern)
        .bind(&filter.category_ids)
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all(&self.pool)
        .await?;

        Ok((docs, total))
    }

    async fn create(&self, kind: DocumentKind, doc: NewDocument) -> anyhow::Result<Document> {
        let cols = columns(kind);
        let query = match kind {
            DocumentKind::Lesson => format!(
                "INSERT INTO lessons (name, cover_url, content, tenant_id, author_id, duration)
                 VALUES ($1, $2, $3, $4, $5, $6)
                 RETURNING {cols}"
            ),
            DocumentKind::Course => format!(
                "INSERT INTO courses (name, cover_url, content, tenant_id, author_id)
                 VALUES ($1, $2, $3, $4, $5)
                 RETURNING {cols}"
            ),
        };
        let mut q = sqlx::query_as::<_, Document>(&query)
            .bind(&doc.name)
            .bind(&doc.cover_url)
            .bind(Json(&doc.content))
            .bind(doc.tenant_id)
            .bind(doc.author_id);
        if kind == DocumentKind::Lesson {
            q = q.bind(doc.duration.unwrap_or(0));
        }
        Ok(q.fetch_one(&self.pool).await?)
    }

    async fn update(
        &self,
        kind: DocumentKind,
        id: Uuid,
        changes: DocumentChanges,
    ) -> anyhow::Result<Document> {
        let cols = columns(kind);
        let query = match kind {
            DocumentKind::Lesson => format!(
                "UPDATE lessons
                 SET name = COALESCE($2, name),
                     cover_url = COALESCE($3, cover_url),
                     content = COALESCE($4, content),
                     duration = COALESCE($5, duration),
                     updated_at = NOW()
                 WHERE id = $1
                 RETURNING {cols}"
            ),
            DocumentKind::Course => format!(
                "UPDATE courses
                 SET name = COALESCE($2, name),
                     cover_url = COALESCE($3, cover_url),
                     content = COALESCE($4, content),
                     updated_at = NOW()
                 WHERE id = $1
                 RETURNING {cols}"
            ),
        };
        let mut q = sqlx::query_as::<_, Document>(&query)
            .bind(id)
            .bind(&changes.name)
            .bind(&changes.cover_url)
            .bind(changes.content.as_ref().map(Json));
        if kind == DocumentKind::Lesson {
            q = q.bind(changes.duration);
        }
        Ok(q.fetch_one(&self.pool).await?)
    }

    async fn delete(&self, kind: DocumentKind, id: Uuid) -> anyhow::Result<()> {
        let table = kind.table();
        sqlx::query(&format!("DELETE FROM {table} WHERE id = $1"))
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_many(&self, kind: DocumentKind, ids: &[Uuid]) -> anyhow::Result<u64> {
        let table = kind.table();
        let result = sqlx::query(&format!("DELETE FROM {table} WHERE id = ANY($1)"))
            .bind(ids)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn lesson_durations(
        &self,
        tenant_id: Uuid,
        ids: &[Uuid],
    ) -> anyhow::Result<HashMap<Uuid, i32>> {
        let rows: Vec<(Uuid, i32)> = sqlx::query_as(
            "SELECT id, duration FROM lessons WHERE id = ANY($1) AND tenant_id = $2",
        )
        .bind(ids)
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().collect())
    }

    async fn set_categories(
        &self,
        kind: DocumentKind,
        id: Uuid,
        category_ids: &[Uuid],
    ) -> anyhow::Result<()> {
        replace_links(&self.pool, kind.category_owner(), id, category_ids).await
    }

    async fn category_links(
        &self,
        kind: DocumentKind,
        ids: &[Uuid],
    ) -> anyhow::Result<CategoryLinks> {
        load_links(&self.pool, kind.category_owner(), ids).await
    }
}
