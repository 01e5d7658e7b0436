use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{search_pattern, PgStore};
use crate::{
    models::category::{Category, CategoryOwner, NewCategory, UpdateCategoryRequest},
    store::{CategoryLinks, CategoryStore, ListFilter},
};

fn link_table(owner: CategoryOwner) -> &'static str {
    match owner {
        CategoryOwner::Media => "media_asset_categories",
        CategoryOwner::Lesson => "lesson_categories",
        CategoryOwner::Course => "course_categories",
    }
}

/// `WHERE` fragment keeping rows of `alias` filed under any of the
/// categories bound at `$param`. An empty array keeps every row.
pub(super) fn category_condition(owner: CategoryOwner, alias: &str, param: usize) -> String {
    let table = link_table(owner);
    format!(
        "(cardinality(${param}::UUID[]) = 0 OR EXISTS (
            SELECT 1 FROM {table} l
            WHERE l.owner_id = {alias}.id AND l.category_id = ANY(${param})))"
    )
}

pub(super) async fn replace_links(
    pool: &PgPool,
    owner: CategoryOwner,
    owner_id: Uuid,
    category_ids: &[Uuid],
) -> anyhow::Result<()> {
    let table = link_table(owner);
    let mut tx = pool.begin().await?;
    sqlx::query(&format!("DELETE FROM {table} WHERE owner_id = $1"))
        .bind(owner_id)
        .execute(&mut *tx)
        .await?;
    if !category_ids.is_empty() {
        sqlx::query(&format!(
            "INSERT INTO {table} (owner_id, category_id, position)
             SELECT $1, c.id, c.ord::INT
             FROM unnest($2::UUID[]) WITH ORDINALITY AS c(id, ord)
             ON CONFLICT DO NOTHING"
        ))
        .bind(owner_id)
        .bind(category_ids)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    tracing::debug!(owner = %owner, owner_id = %owner_id, count = category_ids.len(), "category links replaced");
    Ok(())
}

pub(super) async fn load_links(
    pool: &PgPool,
    owner: CategoryOwner,
    owner_ids: &[Uuid],
) -> anyhow::Result<CategoryLinks> {
    let table = link_table(owner);
    let rows: Vec<(Uuid, Uuid)> = sqlx::query_as(&format!(
        "SELECT owner_id, category_id FROM {table}
         WHERE owner_id = ANY($1)
         ORDER BY owner_id, position"
    ))
    .bind(owner_ids)
    .fetch_all(pool)
    .await?;

    let mut links = CategoryLinks::new();
    for (owner_id, category_id) in rows {
        links.entry(owner_id).or_default().push(category_id);
    }
    Ok(links)
}

#[async_trait]
impl CategoryStore for PgStore {
    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Category>> {
        let category = sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(category)
    }

    async fn find_many(&self, ids: &[Uuid], tenant_id: Uuid) -> anyhow::Result<Vec<Category>> {
        let categories = sqlx::query_as::<_, Category>(
            "SELECT * FROM categories WHERE id = ANY($1) AND tenant_id = $2",
        )
        .bind(ids)
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(categories)
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        filter: &ListFilter,
    ) -> anyhow::Result<(Vec<Category>, i64)> {
        let pattern = search_pattern(filter.search.as_deref());

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM categories
             WHERE tenant_id = $1 AND ($2::TEXT IS NULL OR name ILIKE $2)",
        )
        .bind(tenant_id)
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await?;

        let categories = sqlx::query_as::<_, Category>(
            "SELECT * FROM categories
             WHERE tenant_id = $1 AND ($2::TEXT IS NULL OR name ILIKE $2)
             ORDER BY name ASC
             LIMIT $3 OFFSET $4",
        )
        .bind(tenant_id)
        .bind(&pattern)
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all(&self.pool)
        .await?;

        Ok((categories, total))
    }

    async fn create_many(&self, categories: Vec<NewCategory>) -> anyhow::Result<Vec<Category>> {
        let mut tx = self.pool.begin().await?;
        let mut created = Vec::with_capacity(categories.len());
        for category in categories {
            let row = sqlx::query_as::<_, Category>(
                "INSERT INTO categories (name, color, tenant_id)
                 VALUES ($1, $2, $3)
                 RETURNING *",
            )
            .bind(&category.name)
            .bind(&category.color)
            .bind(category.tenant_id)
            .fetch_one(&mut *tx)
            .await?;
            created.push(row);
        }
        tx.commit().await?;
        Ok(created)
    }

    async fn update(&self, id: Uuid, changes: UpdateCategoryRequest) -> anyhow::Result<Category> {
        let category = sqlx::query_as::<_, Category>(
            "UPDATE categories
             SET name = COALESCE($2, name),
                 color = COALESCE($3, color),
                 updated_at = NOW()
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .bind(&changes.name)
        .bind(&changes.color)
        .fetch_one(&self.pool)
        .await?;
        Ok(category)
    }

    async fn delete_many(&self, ids: &[Uuid]) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM categories WHERE id = ANY($1)")
            .bind(ids)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
