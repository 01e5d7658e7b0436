use async_trait::async_trait;
use uuid::Uuid;

use super::{
    categories::{category_condition, load_links, replace_links},
    search_pattern, PgStore,
};
use crate::{
    models::{
        category::CategoryOwner,
        media::{MediaAsset, MediaChanges, MediaKind, NewMediaAsset},
    },
    store::{AssetStore, CategoryLinks, ListFilter},
};

#[async_trait]
impl AssetStore for PgStore {
    async fn get(&self, kind: MediaKind, id: Uuid) -> anyhow::Result<Option<MediaAsset>> {
        let asset = sqlx::query_as::<_, MediaAsset>(
            "SELECT * FROM media_assets WHERE id = $1 AND kind = $2",
        )
        .bind(id)
        .bind(kind)
        .fetch_optional(&self.pool)
        .await?;
        Ok(asset)
    }

    async fn find_many(
        &self,
        kind: MediaKind,
        ids: &[Uuid],
        tenant_id: Uuid,
    ) -> anyhow::Result<Vec<MediaAsset>> {
        let assets = sqlx::query_as::<_, MediaAsset>(
            "SELECT * FROM media_assets
             WHERE id = ANY($1) AND kind = $2 AND tenant_id = $3",
        )
        .bind(ids)
        .bind(kind)
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(assets)
    }

    async fn list(
        &self,
        kind: MediaKind,
        tenant_id: Uuid,
        filter: &ListFilter,
    ) -> anyhow::Result<(Vec<MediaAsset>, i64)> {
        let pattern = search_pattern(filter.search.as_deref());
        let in_categories = category_condition(CategoryOwner::Media, "m", 4);

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM media_assets m
             WHERE m.kind = $1 AND m.tenant_id = $2
               AND ($3::TEXT IS NULL OR m.name ILIKE $3)
               AND {in_categories}"
        ))
        .bind(kind)
        .bind(tenant_id)
        .bind(&pattern)
        .bind(&filter.category_ids)
        .fetch_one(&self.pool)
        .await?;

        let assets = sqlx::query_as::<_, MediaAsset>(&format!(
            "SELECT m.* FROM media_assets m
             WHERE m.kind = $1 AND m.tenant_id = $2
               AND ($3::TEXT IS NULL OR m.name ILIKE $3)
               AND {in_categories}
             ORDER BY m.created_at DESC
             LIMIT $5 OFFSET $6"
        ))
        .bind(kind)
        .bind(tenant_id)
        .bind(&pattern)
        .bind(&filter.category_ids)
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all(&self.pool)
        .await?;

        Ok((assets, total))
    }

    async fn create(&self, asset: NewMediaAsset) -> anyhow::Result<MediaAsset> {
        let asset = sqlx::query_as::<_, MediaAsset>(
            "INSERT INTO media_assets (kind, name, file_url, file_key, is_link, tenant_id)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING *",
        )
        .bind(asset.kind)
        .bind(&asset.name)
        .bind(&asset.file_url)
        .bind(&asset.file_key)
        .bind(asset.is_link)
        .bind(asset.tenant_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(asset)
    }

    async fn update(
        &self,
        kind: MediaKind,
        id: Uuid,
        changes: MediaChanges,
    ) -> anyhow::Result<MediaAsset> {
        // $4 distinguishes "leave file_key alone" from "set it to $5 (maybe NULL)".
        let (set_key, key) = match changes.file_key {
            Some(key) => (true, key),
            None => (false, None),
        };
        let asset = sqlx::query_as::<_, MediaAsset>(
            "UPDATE media_assets
             SET name = COALESCE($2, name),
                 file_url = COALESCE($3, file_url),
                 file_key = CASE WHEN $4 THEN $5 ELSE file_key END,
                 is_link = COALESCE($6, is_link),
                 updated_at = NOW()
             WHERE id = $1 AND kind = $7
             RETURNING *",
        )
        .bind(id)
        .bind(&changes.name)
        .bind(&changes.file_url)
        .bind(set_key)
        .bind(&key)
        .bind(changes.is_link)
        .bind(kind)
        .fetch_one(&self.pool)
        .await?;
        Ok(asset)
    }

    async fn delete(&self, kind: MediaKind, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM media_assets WHERE id = $1 AND kind = $2")
            .bind(id)
            .bind(kind)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_many(&self, kind: MediaKind, ids: &[Uuid]) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM media_assets WHERE id = ANY($1) AND kind = $2")
            .bind(ids)
            .bind(kind)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn set_categories(&self, id: Uuid, category_ids: &[Uuid]) -> anyhow::Result<()> {
        replace_links(&self.pool, CategoryOwner::Media, id, category_ids).await
    }

    async fn category_links(&self, ids: &[Uuid]) -> anyhow::Result<CategoryLinks> {
        load_links(&self.pool, CategoryOwner::Media, ids).await
    }
}
