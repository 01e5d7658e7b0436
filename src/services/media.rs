use std::{collections::HashSet, fmt, sync::Arc};

use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        category::{parse_category_ids, Categorized},
        media::{
            MediaAsset, MediaChanges, MediaKind, MediaPatch, MediaQuery, MediaUpload,
            NewMediaAsset,
        },
        paging, Page, PageMeta,
    },
    services::{
        categories::CategoryService,
        cleanup::{CleanupReport, ContentCleanup},
        dedup,
        storage::StorageService,
        tenancy::{ensure_same_tenant, TenancyResolver},
    },
    store::{AssetStore, ListFilter},
};

/// The steps of a deletion, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionStep {
    LoadAsset,
    AuthorizeTenant,
    DeleteObject,
    PurgeReferences,
    DeleteRow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Abort the deletion and surface the error.
    Fatal,
    /// Log, record in the report, and go on with the next step.
    LogAndContinue,
}

impl DeletionStep {
    pub const SEQUENCE: [DeletionStep; 5] = [
        DeletionStep::LoadAsset,
        DeletionStep::AuthorizeTenant,
        DeletionStep::DeleteObject,
        DeletionStep::PurgeReferences,
        DeletionStep::DeleteRow,
    ];

    /// An orphaned object or a stale reference can be repaired by a later
    /// cleanup run; a row that was not deleted cannot be papered over.
    pub fn policy(self) -> FailurePolicy {
        match self {
            DeletionStep::DeleteObject | DeletionStep::PurgeReferences => {
                FailurePolicy::LogAndContinue
            }
            _ => FailurePolicy::Fatal,
        }
    }
}

impl fmt::Display for DeletionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeletionStep::LoadAsset => "load_asset",
            DeletionStep::AuthorizeTenant => "authorize_tenant",
            DeletionStep::DeleteObject => "delete_object",
            DeletionStep::PurgeReferences => "purge_references",
            DeletionStep::DeleteRow => "delete_row",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone)]
pub struct StorageFailure {
    pub asset_id: Uuid,
    pub key: String,
}

/// What a successful deletion left behind.
#[derive(Debug, Default)]
pub struct DeletionReport {
    pub deleted: Vec<Uuid>,
    pub storage_failures: Vec<StorageFailure>,
    pub cleanup: CleanupReport,
}

impl DeletionReport {
    pub fn is_clean(&self) -> bool {
        self.storage_failures.is_empty() && self.cleanup.is_clean()
    }
}

/// Logs a failure of a fatal step and hands the error back for `?`.
fn abort(step: DeletionStep, kind: MediaKind, error: AppError) -> AppError {
    debug_assert_eq!(step.policy(), FailurePolicy::Fatal);
    match &error {
        AppError::Internal(e) => {
            tracing::error!(step = %step, kind = %kind, error = %e, "media deletion aborted")
        }
        other => tracing::debug!(step = %step, kind = %kind, error = %other, "media deletion rejected"),
    }
    error
}

fn non_blank(s: &str) -> Option<&str> {
    let s = s.trim();
    (!s.is_empty()).then_some(s)
}

/// Creates, updates and deletes media assets for a tenant.
///
/// Deletion runs as the fixed sequence in [`DeletionStep::SEQUENCE`]; every
/// step's failure is handled according to [`DeletionStep::policy`].
#[derive(Clone)]
pub struct MediaLifecycle {
    assets: Arc<dyn AssetStore>,
    storage: Arc<StorageService>,
    tenancy: TenancyResolver,
    cleanup: ContentCleanup,
    categories: CategoryService,
}

impl MediaLifecycle {
    pub fn new(
        assets: Arc<dyn AssetStore>,
        storage: Arc<StorageService>,
        tenancy: TenancyResolver,
        cleanup: ContentCleanup,
        categories: CategoryService,
    ) -> Self {
        Self {
            assets,
            storage,
            tenancy,
            cleanup,
            categories,
        }
    }

    /// Newest first, each asset with its categories. `category_ids`
    /// narrows the listing to assets filed under any of them.
    pub async fn list(
        &self,
        requester: Uuid,
        kind: MediaKind,
        query: &MediaQuery,
    ) -> AppResult<Page<Categorized<MediaAsset>>> {
        let tenant_id = self.tenancy.resolve_tenant(requester).await?;
        let (page, limit, offset) = paging(query.page, query.limit)?;
        let filter = ListFilter {
            search: query.search.clone(),
            category_ids: parse_category_ids(query.category_ids.as_deref())?,
            limit,
            offset,
        };
        let (assets, total) = self.assets.list(kind, tenant_id, &filter).await?;

        let ids: Vec<Uuid> = assets.iter().map(|a| a.id).collect();
        let links = self.assets.category_links(&ids).await?;
        let data = self
            .categories
            .attach(tenant_id, assets, &links, |a| a.id)
            .await?;
        Ok(Page {
            data,
            meta: PageMeta::new(page, limit, total),
        })
    }

    /// Creates one asset per name.
    ///
    /// Photos, audio and files need exactly one file per name. Videos take
    /// a link when the name's url is set, otherwise the next unused file;
    /// a video name with neither is skipped.
    pub async fn create_bulk(
        &self,
        requester: Uuid,
        kind: MediaKind,
        upload: MediaUpload,
    ) -> AppResult<Vec<MediaAsset>> {
        let tenant_id = self.tenancy.resolve_tenant(requester).await?;
        let has_links = upload.urls.iter().any(|u| non_blank(u).is_some());

        if !kind.supports_links() {
            if has_links {
                return Err(AppError::validation("Links are only supported for videos"));
            }
            if upload.names.is_empty() {
                return Err(AppError::validation("At least one name is required"));
            }
            if upload.names.len() != upload.files.len() {
                return Err(AppError::validation(format!(
                    "Expected {} files, got {}",
                    upload.names.len(),
                    upload.files.len()
                )));
            }
        }

        let category_ids = self
            .categories
            .resolve_ids(tenant_id, upload.category_ids.as_deref().unwrap_or_default())
            .await?;
        let folder = self.tenancy.media_folder(requester, kind).await?;
        let mut files = upload.files.into_iter();
        let mut created = Vec::with_capacity(upload.names.len());

        for (i, name) in upload.names.into_iter().enumerate() {
            let link = upload.urls.get(i).and_then(|u| non_blank(u));
            let new = match link {
                Some(url) if kind.supports_links() => NewMediaAsset {
                    kind,
                    name,
                    file_url: url.to_string(),
                    file_key: None,
                    is_link: true,
                    tenant_id,
                },
                _ => {
                    let Some(file) = files.next() else {
                        tracing::debug!(kind = %kind, name = %name, "no url or file for entry, skipping");
                        continue;
                    };
                    let file_url = self.storage.upload(&file, &folder).await?;
                    NewMediaAsset {
                        kind,
                        name,
                        file_key: Some(self.storage.key_for(&file_url)),
                        file_url,
                        is_link: false,
                        tenant_id,
                    }
                }
            };
            let asset = self.insert(new).await?;
            if !category_ids.is_empty() {
                self.assets.set_categories(asset.id, &category_ids).await?;
            }
            created.push(asset);
        }

        tracing::info!(tenant_id = %tenant_id, kind = %kind, count = created.len(), "media created");
        Ok(created)
    }

    /// Renames an asset and optionally swaps what it points at. The old
    /// stored object is deleted before a replacement is uploaded.
    pub async fn update(
        &self,
        requester: Uuid,
        kind: MediaKind,
        id: Uuid,
        patch: MediaPatch,
    ) -> AppResult<MediaAsset> {
        let asset = self.load(kind, id).await?;
        let tenant_id = self.tenancy.resolve_tenant(requester).await?;
        ensure_same_tenant(asset.tenant_id, tenant_id)?;
        self.apply_patch(requester, asset, patch).await
    }

    /// Updates several assets of one tenant in order. Files go, in order,
    /// to the ids that were not given a url.
    pub async fn update_bulk(
        &self,
        requester: Uuid,
        kind: MediaKind,
        upload: MediaUpload,
    ) -> AppResult<Vec<MediaAsset>> {
        let tenant_id = self.tenancy.resolve_tenant(requester).await?;
        let ids = dedup(&upload.ids);
        if ids.is_empty() {
            return Err(AppError::validation("At least one id is required"));
        }
        if !kind.supports_links() && upload.urls.iter().any(|u| non_blank(u).is_some()) {
            return Err(AppError::validation("Links are only supported for videos"));
        }

        let found = self.assets.find_many(kind, &ids, tenant_id).await?;
        if found.len() < ids.len() {
            return Err(AppError::validation(format!(
                "{} of {} requested items were not found",
                ids.len() - found.len(),
                ids.len()
            )));
        }

        let mut files = upload.files.into_iter();
        let mut updated = Vec::with_capacity(ids.len());
        let mut seen = HashSet::new();
        for (i, id) in upload.ids.iter().enumerate() {
            if !seen.insert(*id) {
                continue;
            }
            let Some(asset) = found.iter().find(|a| a.id == *id).cloned() else {
                continue;
            };
            let url = upload.urls.get(i).and_then(|u| non_blank(u)).map(String::from);
            let file = if url.is_none() { files.next() } else { None };
            let patch = MediaPatch {
                name: upload.names.get(i).cloned(),
                url,
                file,
                category_ids: upload.category_ids.clone(),
            };
            updated.push(self.apply_patch(requester, asset, patch).await?);
        }
        Ok(updated)
    }

    pub async fn delete(
        &self,
        requester: Uuid,
        kind: MediaKind,
        id: Uuid,
    ) -> AppResult<DeletionReport> {
        let asset = self
            .load(kind, id)
            .await
            .map_err(|e| abort(DeletionStep::LoadAsset, kind, e))?;

        let tenant_id = self
            .tenancy
            .resolve_tenant(requester)
            .await
            .and_then(|tenant_id| ensure_same_tenant(asset.tenant_id, tenant_id).map(|_| tenant_id))
            .map_err(|e| abort(DeletionStep::AuthorizeTenant, kind, e))?;

        let mut report = DeletionReport::default();
        self.delete_object(&asset, &mut report).await;
        report.cleanup = self.cleanup.purge_references(&[id], tenant_id).await;

        self.assets
            .delete(kind, id)
            .await
            .map_err(|e| abort(DeletionStep::DeleteRow, kind, e.into()))?;

        report.deleted.push(id);
        tracing::info!(asset_id = %id, kind = %kind, tenant_id = %tenant_id, clean = report.is_clean(), "media deleted");
        Ok(report)
    }

    /// Deletes a batch of the requester's assets. If any id is missing or
    /// belongs to another tenant nothing is deleted.
    pub async fn delete_bulk(
        &self,
        requester: Uuid,
        kind: MediaKind,
        ids: &[Uuid],
    ) -> AppResult<DeletionReport> {
        let ids = dedup(ids);
        if ids.is_empty() {
            return Err(AppError::validation("At least one id is required"));
        }
        let tenant_id = self
            .tenancy
            .resolve_tenant(requester)
            .await
            .map_err(|e| abort(DeletionStep::AuthorizeTenant, kind, e))?;

        let found = self
            .assets
            .find_many(kind, &ids, tenant_id)
            .await
            .map_err(|e| abort(DeletionStep::LoadAsset, kind, e.into()))?;
        if found.len() < ids.len() {
            return Err(abort(
                DeletionStep::AuthorizeTenant,
                kind,
                AppError::validation(format!(
                    "{} of {} requested items were not found",
                    ids.len() - found.len(),
                    ids.len()
                )),
            ));
        }

        let mut report = DeletionReport::default();
        for asset in &found {
            self.delete_object(asset, &mut report).await;
        }
        report.cleanup = self.cleanup.purge_references(&ids, tenant_id).await;

        let removed = self
            .assets
            .delete_many(kind, &ids)
            .await
            .map_err(|e| abort(DeletionStep::DeleteRow, kind, e.into()))?;

        report.deleted = ids;
        tracing::info!(kind = %kind, tenant_id = %tenant_id, removed, clean = report.is_clean(), "media bulk deleted");
        Ok(report)
    }

    async fn load(&self, kind: MediaKind, id: Uuid) -> AppResult<MediaAsset> {
        self.assets
            .get(kind, id)
            .await?
            .ok_or_else(|| AppError::not_found(kind.label()))
    }

    async fn insert(&self, new: NewMediaAsset) -> AppResult<MediaAsset> {
        let stored = new.file_key.clone();
        match self.assets.create(new).await {
            Ok(asset) => Ok(asset),
            Err(e) => {
                if let Some(key) = stored {
                    self.storage.delete_file(&key).await;
                }
                Err(e.into())
            }
        }
    }

    async fn apply_patch(
        &self,
        requester: Uuid,
        asset: MediaAsset,
        patch: MediaPatch,
    ) -> AppResult<MediaAsset> {
        let kind = asset.kind;
        let category_ids = match patch.category_ids {
            Some(ids) => Some(self.categories.resolve_ids(asset.tenant_id, &ids).await?),
            None => None,
        };
        let mut changes = MediaChanges {
            name: patch.name.filter(|n| non_blank(n).is_some()),
            ..Default::default()
        };

        match (patch.url.as_deref().and_then(non_blank), patch.file) {
            (Some(_), _) if !kind.supports_links() => {
                return Err(AppError::validation("Links are only supported for videos"));
            }
            (Some(url), _) => {
                self.drop_previous_object(&asset).await;
                changes.file_url = Some(url.to_string());
                changes.file_key = Some(None);
                changes.is_link = Some(true);
            }
            (None, Some(file)) => {
                let folder = self.tenancy.media_folder(requester, kind).await?;
                self.drop_previous_object(&asset).await;
                let file_url = self.storage.upload(&file, &folder).await?;
                changes.file_key = Some(Some(self.storage.key_for(&file_url)));
                changes.file_url = Some(file_url);
                changes.is_link = Some(false);
            }
            (None, None) => {}
        }

        let updated = self.assets.update(kind, asset.id, changes).await?;
        if let Some(ids) = category_ids {
            self.assets.set_categories(asset.id, &ids).await?;
        }
        Ok(updated)
    }

    /// Deletes the object an asset currently points at, if any. A failure
    /// only leaves an orphan behind.
    async fn drop_previous_object(&self, asset: &MediaAsset) {
        if let Some(key) = asset.stored_object() {
            if !self.storage.delete_file(key).await {
                tracing::warn!(asset_id = %asset.id, key = %key, "previous object left behind");
            }
        }
    }

    async fn delete_object(&self, asset: &MediaAsset, report: &mut DeletionReport) {
        let Some(key) = asset.stored_object() else {
            return;
        };
        if !self.storage.delete_file(key).await {
            tracing::warn!(step = %DeletionStep::DeleteObject, asset_id = %asset.id, key = %key, "continuing without deleting stored object");
            report.storage_failures.push(StorageFailure {
                asset_id: asset.id,
                key: key.to_string(),
            });
        }
    }
}
