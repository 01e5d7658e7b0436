//! In-memory stores and builders for service tests.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex,
    },
};

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{Duration, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    models::{
        category::{Category, NewCategory, UpdateCategoryRequest},
        document::{Document, DocumentChanges, DocumentKind, NewDocument},
        identity::{Identity, Role},
        media::{MediaAsset, MediaChanges, MediaKind, NewMediaAsset, UploadedFile},
    },
    object_store::{ObjectStore, ObjectStoreError},
    store::{AssetStore, CategoryLinks, CategoryStore, DocumentStore, IdentityStore, ListFilter},
};

pub fn identity(name: &str, role: Role, tenant_id: Option<Uuid>) -> Identity {
    let now = Utc::now();
    Identity {
        id: Uuid::new_v4(),
        name: name.to_string(),
        email: format!("{}@example.com", Uuid::new_v4().simple()),
        role,
        tenant_id,
        supervisor_id: None,
        created_at: now,
        updated_at: now,
    }
}

/// A stored (non-link) asset with a key under `{tenant}/materials/{kind}`.
pub fn asset(kind: MediaKind, tenant_id: Uuid) -> MediaAsset {
    let now = Utc::now();
    let id = Uuid::new_v4();
    let key = format!("{tenant_id}/materials/{kind}/{id}.bin");
    MediaAsset {
        id,
        kind,
        name: format!("{kind} {id}"),
        file_url: key.clone(),
        file_key: Some(key),
        is_link: false,
        tenant_id,
        created_at: now,
        updated_at: now,
    }
}

pub fn document(tenant_id: Uuid, content: Value) -> Document {
    let now = Utc::now();
    Document {
        id: Uuid::new_v4(),
        name: "Untitled".into(),
        cover_url: None,
        content,
        duration: None,
        tenant_id,
        author_id: tenant_id,
        created_at: now,
        updated_at: now,
    }
}

pub fn category(name: &str, tenant_id: Uuid) -> Category {
    let now = Utc::now();
    Category {
        id: Uuid::new_v4(),
        name: name.to_string(),
        color: None,
        tenant_id,
        created_at: now,
        updated_at: now,
    }
}

pub fn upload(name: &str) -> UploadedFile {
    UploadedFile {
        original_name: name.to_string(),
        content_type: "application/octet-stream".into(),
        bytes: Bytes::from_static(b"data"),
    }
}

fn matches_search(name: &str, search: Option<&str>) -> bool {
    match search.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => name.to_lowercase().contains(&s.to_lowercase()),
        None => true,
    }
}

fn in_categories(links: &CategoryLinks, id: Uuid, wanted: &[Uuid]) -> bool {
    wanted.is_empty()
        || links
            .get(&id)
            .is_some_and(|ids| ids.iter().any(|c| wanted.contains(c)))
}

fn links_for(links: &CategoryLinks, ids: &[Uuid]) -> CategoryLinks {
    ids.iter()
        .filter_map(|id| links.get(id).map(|c| (*id, c.clone())))
        .collect()
}

fn page<T>(mut rows: Vec<T>, filter: &ListFilter) -> (Vec<T>, i64) {
    let total = rows.len() as i64;
    let start = (filter.offset.max(0) as usize).min(rows.len());
    let end = (start + filter.limit.max(0) as usize).min(rows.len());
    (rows.drain(start..end).collect(), total)
}

#[derive(Default)]
pub struct MemoryIdentities {
    rows: Mutex<HashMap<Uuid, Identity>>,
}

impl MemoryIdentities {
    pub fn insert(&self, identity: Identity) -> Identity {
        self.rows
            .lock()
            .unwrap()
            .insert(identity.id, identity.clone());
        identity
    }

    pub fn rename(&self, id: Uuid, name: &str) {
        if let Some(row) = self.rows.lock().unwrap().get_mut(&id) {
            row.name = name.to_string();
        }
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentities {
    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Identity>> {
        Ok(self.rows.lock().unwrap().get(&id).cloned())
    }
}

#[derive(Default)]
pub struct MemoryAssets {
    rows: Mutex<Vec<MediaAsset>>,
    links: Mutex<CategoryLinks>,
    fail_deletes: AtomicBool,
}

impl MemoryAssets {
    pub fn insert(&self, asset: MediaAsset) -> MediaAsset {
        self.rows.lock().unwrap().push(asset.clone());
        asset
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.rows.lock().unwrap().iter().any(|a| a.id == id)
    }

    pub fn find(&self, id: Uuid) -> Option<MediaAsset> {
        self.rows.lock().unwrap().iter().find(|a| a.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn fail_row_deletes(&self) {
        self.fail_deletes.store(true, Ordering::SeqCst);
    }

    pub fn categories_of(&self, id: Uuid) -> Vec<Uuid> {
        self.links.lock().unwrap().get(&id).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl AssetStore for MemoryAssets {
    async fn get(&self, kind: MediaKind, id: Uuid) -> anyhow::Result<Option<MediaAsset>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.kind == kind && a.id == id)
            .cloned())
    }

    async fn find_many(
        &self,
        kind: MediaKind,
        ids: &[Uuid],
        tenant_id: Uuid,
    ) -> anyhow::Result<Vec<MediaAsset>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.kind == kind && a.tenant_id == tenant_id && ids.contains(&a.id))
            .cloned()
            .collect())
    }

    async fn list(
        &self,
        kind: MediaKind,
        tenant_id: Uuid,
        filter: &ListFilter,
    ) -> anyhow::Result<(Vec<MediaAsset>, i64)> {
        let mut rows: Vec<MediaAsset> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.kind == kind && a.tenant_id == tenant_id)
            .filter(|a| matches_search(&a.name, filter.search.as_deref()))
            .filter(|a| in_categories(&self.links.lock().unwrap(), a.id, &filter.category_ids))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(page(rows, filter))
    }

    async fn create(&self, new: NewMediaAsset) -> anyhow::Result<MediaAsset> {
        let mut rows = self.rows.lock().unwrap();
        // Strictly increasing timestamps keep newest-first ordering stable.
        let created_at = Utc::now() + Duration::milliseconds(rows.len() as i64);
        let asset = MediaAsset {
            id: Uuid::new_v4(),
            kind: new.kind,
            name: new.name,
            file_url: new.file_url,
            file_key: new.file_key,
            is_link: new.is_link,
            tenant_id: new.tenant_id,
            created_at,
            updated_at: created_at,
        };
        rows.push(asset.clone());
        Ok(asset)
    }

    async fn update(
        &self,
        kind: MediaKind,
        id: Uuid,
        changes: MediaChanges,
    ) -> anyhow::Result<MediaAsset> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|a| a.kind == kind && a.id == id)
            .ok_or_else(|| anyhow!("asset {id} vanished"))?;
        if let Some(name) = changes.name {
            row.name = name;
        }
        if let Some(url) = changes.file_url {
            row.file_url = url;
        }
        if let Some(key) = changes.file_key {
            row.file_key = key;
        }
        if let Some(is_link) = changes.is_link {
            row.is_link = is_link;
        }
        row.updated_at = Utc::now();
        Ok(row.clone())
    }

    async fn delete(&self, kind: MediaKind, id: Uuid) -> anyhow::Result<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            bail!("connection reset");
        }
        self.rows
            .lock()
            .unwrap()
            .retain(|a| !(a.kind == kind && a.id == id));
        Ok(())
    }

    async fn delete_many(&self, kind: MediaKind, ids: &[Uuid]) -> anyhow::Result<u64> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            bail!("connection reset");
        }
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|a| !(a.kind == kind && ids.contains(&a.id)));
        Ok((before - rows.len()) as u64)
    }

    async fn set_categories(&self, id: Uuid, category_ids: &[Uuid]) -> anyhow::Result<()> {
        self.links.lock().unwrap().insert(id, category_ids.to_vec());
        Ok(())
    }

    async fn category_links(&self, ids: &[Uuid]) -> anyhow::Result<CategoryLinks> {
        Ok(links_for(&self.links.lock().unwrap(), ids))
    }
}

#[derive(Default)]
pub struct MemoryDocuments {
    rows: Mutex<HashMap<(DocumentKind, Uuid), Document>>,
    links: Mutex<HashMap<DocumentKind, CategoryLinks>>,
    writes: AtomicUsize,
    failing_writes: Mutex<HashSet<Uuid>>,
    fail_scans: AtomicBool,
}

impl MemoryDocuments {
    pub fn insert(&self, kind: DocumentKind, doc: Document) -> Document {
        self.rows
            .lock()
            .unwrap()
            .insert((kind, doc.id), doc.clone());
        doc
    }

    pub fn find(&self, kind: DocumentKind, id: Uuid) -> Option<Document> {
        self.rows.lock().unwrap().get(&(kind, id)).cloned()
    }

    pub fn content_of(&self, kind: DocumentKind, id: Uuid) -> Value {
        self.find(kind, id)
            .map(|d| d.content)
            .unwrap_or(Value::Null)
    }

    /// Number of successful `replace_content` calls.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn fail_writes_for(&self, id: Uuid) {
        self.failing_writes.lock().unwrap().insert(id);
    }

    pub fn fail_scans(&self) {
        self.fail_scans.store(true, Ordering::SeqCst);
    }

    pub fn categories_of(&self, kind: DocumentKind, id: Uuid) -> Vec<Uuid> {
        self.links
            .lock()
            .unwrap()
            .get(&kind)
            .and_then(|links| links.get(&id).cloned())
            .unwrap_or_default()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocuments {
    async fn find_ids_where_content_contains(
        &self,
        kind: DocumentKind,
        needle: &str,
        tenant_id: Uuid,
    ) -> anyhow::Result<Vec<Uuid>> {
        if self.fail_scans.load(Ordering::SeqCst) {
            bail!("statement timeout");
        }
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .filter(|((k, _), d)| *k == kind && d.tenant_id == tenant_id)
            .filter(|(_, d)| d.content.to_string().contains(needle))
            .map(|((_, id), _)| *id)
            .collect())
    }

    async fn get_by_ids(&self, kind: DocumentKind, ids: &[Uuid]) -> anyhow::Result<Vec<Document>> {
        let rows = self.rows.lock().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| rows.get(&(kind, *id)).cloned())
            .collect())
    }

    async fn replace_content(
        &self,
        kind: DocumentKind,
        id: Uuid,
        content: &Value,
    ) -> anyhow::Result<()> {
        if self.failing_writes.lock().unwrap().contains(&id) {
            bail!("write rejected for {id}");
        }
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .get_mut(&(kind, id))
            .ok_or_else(|| anyhow!("{kind} {id} vanished"))?;
        row.content = content.clone();
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get(&self, kind: DocumentKind, id: Uuid) -> anyhow::Result<Option<Document>> {
        Ok(self.find(kind, id))
    }

    async fn list(
        &self,
        kind: DocumentKind,
        tenant_id: Uuid,
        filter: &ListFilter,
    ) -> anyhow::Result<(Vec<Document>, i64)> {
        let mut rows: Vec<Document> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|((k, _), d)| *k == kind && d.tenant_id == tenant_id)
            .filter(|(_, d)| matches_search(&d.name, filter.search.as_deref()))
            .filter(|(_, d)| {
                let links = self.links.lock().unwrap();
                let empty = CategoryLinks::new();
                in_categories(links.get(&kind).unwrap_or(&empty), d.id, &filter.category_ids)
            })
            .map(|(_, d)| d.clone())
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(page(rows, filter))
    }

    async fn create(&self, kind: DocumentKind, new: NewDocument) -> anyhow::Result<Document> {
        let mut rows = self.rows.lock().unwrap();
        let created_at = Utc::now() + Duration::milliseconds(rows.len() as i64);
        let doc = Document {
            id: Uuid::new_v4(),
            name: new.name,
            cover_url: new.cover_url,
            content: new.content,
            duration: new.duration,
            tenant_id: new.tenant_id,
            author_id: new.author_id,
            created_at,
            updated_at: created_at,
        };
        rows.insert((kind, doc.id), doc.clone());
        Ok(doc)
    }

    async fn update(
        &self,
        kind: DocumentKind,
        id: Uuid,
        changes: DocumentChanges,
    ) -> anyhow::Result<Document> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .get_mut(&(kind, id))
            .ok_or_else(|| anyhow!("{kind} {id} vanished"))?;
        if let Some(name) = changes.name {
            row.name = name;
        }
        if let Some(cover_url) = changes.cover_url {
            row.cover_url = Some(cover_url);
        }
        if let Some(content) = changes.content {
            row.content = content;
        }
        if let Some(duration) = changes.duration {
            row.duration = Some(duration);
        }
        row.updated_at = Utc::now();
        Ok(row.clone())
    }

    async fn delete(&self, kind: DocumentKind, id: Uuid) -> anyhow::Result<()> {
        self.rows.lock().unwrap().remove(&(kind, id));
        Ok(())
    }

    async fn delete_many(&self, kind: DocumentKind, ids: &[Uuid]) -> anyhow::Result<u64> {
        let mut rows = self.rows.lock().unwrap();
        Ok(ids
            .iter()
            .filter(|id| rows.remove(&(kind, **id)).is_some())
            .count() as u64)
    }

    async fn lesson_durations(
        &self,
        tenant_id: Uuid,
        ids: &[Uuid],
    ) -> anyhow::Result<HashMap<Uuid, i32>> {
        let rows = self.rows.lock().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| {
                rows.get(&(DocumentKind::Lesson, *id))
                    .filter(|d| d.tenant_id == tenant_id)
                    .map(|d| (*id, d.duration.unwrap_or(0)))
            })
            .collect())
    }

    async fn set_categories(
        &self,
        kind: DocumentKind,
        id: Uuid,
        category_ids: &[Uuid],
    ) -> anyhow::Result<()> {
        self.links
            .lock()
            .unwrap()
            .entry(kind)
            .or_default()
            .insert(id, category_ids.to_vec());
        Ok(())
    }

    async fn category_links(
        &self,
        kind: DocumentKind,
        ids: &[Uuid],
    ) -> anyhow::Result<CategoryLinks> {
        let links = self.links.lock().unwrap();
        Ok(links
            .get(&kind)
            .map(|l| links_for(l, ids))
            .unwrap_or_default())
    }
}

#[derive(Default)]
pub struct MemoryCategories {
    rows: Mutex<Vec<Category>>,
}

impl MemoryCategories {
    pub fn insert(&self, category: Category) -> Category {
        self.rows.lock().unwrap().push(category.clone());
        category
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.rows.lock().unwrap().iter().any(|c| c.id == id)
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }
}

#[async_trait]
impl CategoryStore for MemoryCategories {
    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Category>> {
        Ok(self.rows.lock().unwrap().iter().find(|c| c.id == id).cloned())
    }

    async fn find_many(&self, ids: &[Uuid], tenant_id: Uuid) -> anyhow::Result<Vec<Category>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.tenant_id == tenant_id && ids.contains(&c.id))
            .cloned()
            .collect())
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        filter: &ListFilter,
    ) -> anyhow::Result<(Vec<Category>, i64)> {
        let mut rows: Vec<Category> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.tenant_id == tenant_id)
            .filter(|c| matches_search(&c.name, filter.search.as_deref()))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(page(rows, filter))
    }

    async fn create_many(&self, new: Vec<NewCategory>) -> anyhow::Result<Vec<Category>> {
        let now = Utc::now();
        let created: Vec<Category> = new
            .into_iter()
            .map(|c| Category {
                id: Uuid::new_v4(),
                name: c.name,
                color: c.color,
                tenant_id: c.tenant_id,
                created_at: now,
                updated_at: now,
            })
            .collect();
        self.rows.lock().unwrap().extend(created.iter().cloned());
        Ok(created)
    }

    async fn update(&self, id: Uuid, changes: UpdateCategoryRequest) -> anyhow::Result<Category> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| anyhow!("category {id} vanished"))?;
        if let Some(name) = changes.name {
            row.name = name;
        }
        if let Some(color) = changes.color {
            row.color = Some(color);
        }
        row.updated_at = Utc::now();
        Ok(row.clone())
    }

    async fn delete_many(&self, ids: &[Uuid]) -> anyhow::Result<u64> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|c| !ids.contains(&c.id));
        Ok((before - rows.len()) as u64)
    }
}

#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<String, Bytes>>,
    deleted: Mutex<Vec<String>>,
    fail_deletes: AtomicBool,
}

impl MemoryObjectStore {
    pub fn seed(&self, key: &str) {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), Bytes::from_static(b"seed"));
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    /// Keys whose deletion succeeded, in call order.
    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn fail_deletes(&self) {
        self.fail_deletes.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, key: &str, bytes: Bytes, _content_type: &str) -> Result<(), ObjectStoreError> {
        self.objects.lock().unwrap().insert(key.to_string(), bytes);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(std::io::Error::other("bucket unavailable").into());
        }
        self.objects.lock().unwrap().remove(key);
        self.deleted.lock().unwrap().push(key.to_string());
        Ok(())
    }
}
