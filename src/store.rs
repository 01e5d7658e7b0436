//! Persistence seams used by the services.
//!
//! Every tenant-scoped lookup takes the tenant id explicitly; nothing here
//! resolves tenancy on its own.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::models::{
    category::{Category, NewCategory, UpdateCategoryRequest},
    document::{Document, DocumentChanges, DocumentKind, NewDocument},
    identity::Identity,
    media::{MediaAsset, MediaChanges, MediaKind, NewMediaAsset},
};

/// Filters shared by the paginated listings.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub search: Option<String>,
    /// When non-empty, only items filed under at least one of these.
    pub category_ids: Vec<Uuid>,
    pub limit: i64,
    pub offset: i64,
}

/// Category ids attached to each owner, in the order they were assigned.
pub type CategoryLinks = HashMap<Uuid, Vec<Uuid>>;

#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Identity>>;
}

#[async_trait]
pub trait AssetStore: Send + Sync {
    async fn get(&self, kind: MediaKind, id: Uuid) -> anyhow::Result<Option<MediaAsset>>;

    /// Assets of `kind` whose id is in `ids` and that belong to `tenant_id`.
    async fn find_many(
        &self,
        kind: MediaKind,
        ids: &[Uuid],
        tenant_id: Uuid,
    ) -> anyhow::Result<Vec<MediaAsset>>;

    /// Newest first, plus the total count matching the filter.
    async fn list(
        &self,
        kind: MediaKind,
        tenant_id: Uuid,
        filter: &ListFilter,
    ) -> anyhow::Result<(Vec<MediaAsset>, i64)>;

    async fn create(&self, asset: NewMediaAsset) -> anyhow::Result<MediaAsset>;

    async fn update(
        &self,
        kind: MediaKind,
        id: Uuid,
        changes: MediaChanges,
    ) -> anyhow::Result<MediaAsset>;

    async fn delete(&self, kind: MediaKind, id: Uuid) -> anyhow::Result<()>;

    async fn delete_many(&self, kind: MediaKind, ids: &[Uuid]) -> anyhow::Result<u64>;

    /// Replaces the categories an asset is filed under.
    async fn set_categories(&self, id: Uuid, category_ids: &[Uuid]) -> anyhow::Result<()>;

    async fn category_links(&self, ids: &[Uuid]) -> anyhow::Result<CategoryLinks>;
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Ids of the tenant's documents whose serialized content contains
    /// `needle` as a raw substring. Coarse: may return false positives.
    async fn find_ids_where_content_contains(
        &self,
        kind: DocumentKind,
        needle: &str,
        tenant_id: Uuid,
    ) -> anyhow::Result<Vec<Uuid>>;

    async fn get_by_ids(&self, kind: DocumentKind, ids: &[Uuid]) -> anyhow::Result<Vec<Document>>;

    async fn replace_content(
        &self,
        kind: DocumentKind,
        id: Uuid,
        content: &Value,
    ) -> anyhow::Result<()>;

    async fn get(&self, kind: DocumentKind, id: Uuid) -> anyhow::Result<Option<Document>>;

    async fn list(
        &self,
        kind: DocumentKind,
        tenant_id: Uuid,
        filter: &ListFilter,
    ) -> anyhow::Result<(Vec<Document>, i64)>;

    async fn create(&self, kind: DocumentKind, doc: NewDocument) -> anyhow::Result<Document>;

    async fn update(
        &self,
        kind: DocumentKind,
        id: Uuid,
        changes: DocumentChanges,
    ) -> anyhow::Result<Document>;

    async fn delete(&self, kind: DocumentKind, id: Uuid) -> anyhow::Result<()>;

    async fn delete_many(&self, kind: DocumentKind, ids: &[Uuid]) -> anyhow::Result<u64>;

    /// Durations in minutes for the tenant's lessons among `ids`; absent
    /// or foreign ids are simply missing from the map.
    async fn lesson_durations(
        &self,
        tenant_id: Uuid,
        ids: &[Uuid],
    ) -> anyhow::Result<HashMap<Uuid, i32>>;

    async fn set_categories(
        &self,
        kind: DocumentKind,
        id: Uuid,
        category_ids: &[Uuid],
    ) -> anyhow::Result<()>;

    async fn category_links(
        &self,
        kind: DocumentKind,
        ids: &[Uuid],
    ) -> anyhow::Result<CategoryLinks>;
}

#[async_trait]
pub trait CategoryStore: Send + Sync {
    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Category>>;

    /// The tenant's categories whose id is in `ids`.
    async fn find_many(&self, ids: &[Uuid], tenant_id: Uuid) -> anyhow::Result<Vec<Category>>;

    /// Alphabetical, plus the total count matching the filter.
    async fn list(
        &self,
        tenant_id: Uuid,
        filter: &ListFilter,
    ) -> anyhow::Result<(Vec<Category>, i64)>;

    async fn create_many(&self, categories: Vec<NewCategory>) -> anyhow::Result<Vec<Category>>;

    async fn update(&self, id: Uuid, changes: UpdateCategoryRequest) -> anyhow::Result<Category>;

    /// Also detaches the categories from everything filed under them.
    async fn delete_many(&self, ids: &[Uuid]) -> anyhow::Result<u64>;
}
