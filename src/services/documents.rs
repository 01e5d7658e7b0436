use std::sync::Arc;

use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        category::{parse_category_ids, Categorized},
        document::{
            CourseView, CreateDocumentRequest, Document, DocumentChanges, DocumentKind,
            DocumentQuery, NewDocument, UpdateDocumentRequest,
        },
        paging, Page, PageMeta,
    },
    services::{
        categories::CategoryService,
        courses::DurationAggregator,
        tenancy::{ensure_same_tenant, TenancyResolver},
    },
    store::{DocumentStore, ListFilter},
};

/// Accepts content sent either as JSON or as a JSON-encoded string.
pub fn normalize_content(content: Value) -> AppResult<Value> {
    match content {
        Value::String(text) => serde_json::from_str(&text)
            .map_err(|_| AppError::validation("malformed content")),
        other => Ok(other),
    }
}

/// Content of a course as a list of items, or `None` if it is not one.
fn course_items(content: &Value) -> Option<Vec<Value>> {
    match content {
        Value::Array(items) => Some(items.clone()),
        Value::String(text) => match serde_json::from_str(text) {
            Ok(Value::Array(items)) => Some(items),
            _ => None,
        },
        _ => None,
    }
}

fn has_lesson(items: &[Value], lesson_id: &str) -> bool {
    items.iter().any(|item| {
        item.get("type").and_then(Value::as_str) == Some("lesson")
            && item.get("lesson_id").and_then(Value::as_str) == Some(lesson_id)
    })
}

/// Lessons and courses of a tenant.
#[derive(Clone)]
pub struct DocumentService {
    documents: Arc<dyn DocumentStore>,
    tenancy: TenancyResolver,
    durations: DurationAggregator,
    categories: CategoryService,
}

impl DocumentService {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        tenancy: TenancyResolver,
        categories: CategoryService,
    ) -> Self {
        Self {
            durations: DurationAggregator::new(documents.clone()),
            documents,
            tenancy,
            categories,
        }
    }

    pub async fn create(
        &self,
        requester: Uuid,
        kind: DocumentKind,
        req: CreateDocumentRequest,
    ) -> AppResult<Document> {
        let tenant_id = self.tenancy.resolve_tenant(requester).await?;
        let category_ids = self
            .categories
            .resolve_ids(tenant_id, &req.categories())
            .await?;
        let content = normalize_content(req.content)?;
        let duration = match kind {
            DocumentKind::Lesson => req.duration,
            DocumentKind::Course => None,
        };

        let doc = self
            .documents
            .create(
                kind,
                NewDocument {
                    name: req.name,
                    cover_url: req.cover_url,
                    content,
                    duration,
                    tenant_id,
                    author_id: requester,
                },
            )
            .await?;
        tracing::info!(kind = %kind, document_id = %doc.id, tenant_id = %tenant_id, "document created");

        if !category_ids.is_empty() {
            self.documents
                .set_categories(kind, doc.id, &category_ids)
                .await?;
        }

        if kind == DocumentKind::Lesson && !req.course_ids.is_empty() {
            self.add_lesson_to_courses(doc.id, &req.course_ids, tenant_id)
                .await?;
        }
        Ok(doc)
    }

    pub async fn get(
        &self,
        requester: Uuid,
        kind: DocumentKind,
        id: Uuid,
    ) -> AppResult<Categorized<Document>> {
        let tenant_id = self.tenancy.resolve_tenant(requester).await?;
        let doc = self.load_owned(kind, id, tenant_id).await?;
        let mut out = self.with_categories(kind, tenant_id, vec![doc], |d| d.id).await?;
        out.pop().ok_or_else(|| AppError::not_found(kind.label()))
    }

    pub async fn list(
        &self,
        requester: Uuid,
        kind: DocumentKind,
        query: &DocumentQuery,
    ) -> AppResult<Page<Categorized<Document>>> {
        let (tenant_id, page) = self.list_rows(requester, kind, query).await?;
        Ok(Page {
            data: self
                .with_categories(kind, tenant_id, page.data, |d| d.id)
                .await?,
            meta: page.meta,
        })
    }

    pub async fn get_course(&self, requester: Uuid, id: Uuid) -> AppResult<Categorized<CourseView>> {
        let kind = DocumentKind::Course;
        let tenant_id = self.tenancy.resolve_tenant(requester).await?;
        let course = self.load_owned(kind, id, tenant_id).await?;
        let views = self.durations.compute_durations(vec![course]).await?;
        let mut out = self
            .with_categories(kind, tenant_id, views, |v| v.course.id)
            .await?;
        out.pop().ok_or_else(|| AppError::not_found(kind.label()))
    }

    /// Courses with the summed duration of their lessons.
    pub async fn list_courses(
        &self,
        requester: Uuid,
        query: &DocumentQuery,
    ) -> AppResult<Page<Categorized<CourseView>>> {
        let kind = DocumentKind::Course;
        let (tenant_id, page) = self.list_rows(requester, kind, query).await?;
        let views = self.durations.compute_durations(page.data).await?;
        Ok(Page {
            data: self
                .with_categories(kind, tenant_id, views, |v| v.course.id)
                .await?,
            meta: page.meta,
        })
    }

    pub async fn update(
        &self,
        requester: Uuid,
        kind: DocumentKind,
        id: Uuid,
        req: UpdateDocumentRequest,
    ) -> AppResult<Document> {
        let tenant_id = self.tenancy.resolve_tenant(requester).await?;
        self.load_owned(kind, id, tenant_id).await?;
        let category_ids = match req.categories() {
            Some(ids) => Some(self.categories.resolve_ids(tenant_id, &ids).await?),
            None => None,
        };

        let changes = DocumentChanges {
            name: req.name,
            cover_url: req.cover_url,
            content: req.content.map(normalize_content).transpose()?,
            duration: match kind {
                DocumentKind::Lesson => req.duration,
                DocumentKind::Course => None,
            },
        };
        let doc = self.documents.update(kind, id, changes).await?;
        if let Some(ids) = category_ids {
            self.documents.set_categories(kind, id, &ids).await?;
        }

        if kind == DocumentKind::Lesson && !req.course_ids.is_empty() {
            self.add_lesson_to_courses(id, &req.course_ids, tenant_id)
                .await?;
        }
        Ok(doc)
    }

    pub async fn delete(&self, requester: Uuid, kind: DocumentKind, id: Uuid) -> AppResult<()> {
        let tenant_id = self.tenancy.resolve_tenant(requester).await?;
        self.load_owned(kind, id, tenant_id).await?;
        self.documents.delete(kind, id).await?;
        tracing::info!(kind = %kind, document_id = %id, "document deleted");
        Ok(())
    }

    /// Deletes every listed document or none of them.
    pub async fn delete_bulk(
        &self,
        requester: Uuid,
        kind: DocumentKind,
        ids: &[Uuid],
    ) -> AppResult<u64> {
        if ids.is_empty() {
            return Err(AppError::validation("At least one id is required"));
        }
        let tenant_id = self.tenancy.resolve_tenant(requester).await?;

        let mut unique = ids.to_vec();
        unique.sort();
        unique.dedup();
        let owned = self
            .documents
            .get_by_ids(kind, &unique)
            .await?
            .into_iter()
            .filter(|d| d.tenant_id == tenant_id)
            .count();
        if owned < unique.len() {
            return Err(AppError::validation(format!(
                "{} of {} requested items were not found",
                unique.len() - owned,
                unique.len()
            )));
        }

        let removed = self.documents.delete_many(kind, &unique).await?;
        tracing::info!(kind = %kind, tenant_id = %tenant_id, removed, "documents bulk deleted");
        Ok(removed)
    }

    async fn list_rows(
        &self,
        requester: Uuid,
        kind: DocumentKind,
        query: &DocumentQuery,
    ) -> AppResult<(Uuid, Page<Document>)> {
        let tenant_id = self.tenancy.resolve_tenant(requester).await?;
        let (page, limit, offset) = paging(query.page, query.limit)?;
        let filter = ListFilter {
            search: query.search.clone(),
            category_ids: parse_category_ids(query.category_ids.as_deref())?,
            limit,
            offset,
        };
        let (data, total) = self.documents.list(kind, tenant_id, &filter).await?;
        Ok((
            tenant_id,
            Page {
                data,
                meta: PageMeta::new(page, limit, total),
            },
        ))
    }

    async fn with_categories<T>(
        &self,
        kind: DocumentKind,
        tenant_id: Uuid,
        items: Vec<T>,
        id_of: impl Fn(&T) -> Uuid,
    ) -> AppResult<Vec<Categorized<T>>> {
        let ids: Vec<Uuid> = items.iter().map(&id_of).collect();
        let links = self.documents.category_links(kind, &ids).await?;
        self.categories.attach(tenant_id, items, &links, id_of).await
    }

    async fn load_owned(&self, kind: DocumentKind, id: Uuid, tenant_id: Uuid) -> AppResult<Document> {
        let doc = self
            .documents
            .get(kind, id)
            .await?
            .ok_or_else(|| AppError::not_found(kind.label()))?;
        ensure_same_tenant(doc.tenant_id, tenant_id)?;
        Ok(doc)
    }

    /// Appends a lesson block to each of the tenant's listed courses that
    /// does not already have one for this lesson. Unknown or foreign
    /// courses are skipped.
    async fn add_lesson_to_courses(
        &self,
        lesson_id: Uuid,
        course_ids: &[Uuid],
        tenant_id: Uuid,
    ) -> AppResult<()> {
        let lesson_ref = lesson_id.to_string();
        for &course_id in course_ids {
            let course = match self.documents.get(DocumentKind::Course, course_id).await? {
                Some(course) if course.tenant_id == tenant_id => course,
                _ => {
                    tracing::debug!(course_id = %course_id, "course not found, skipping");
                    continue;
                }
            };
            let Some(mut items) = course_items(&course.content) else {
                tracing::warn!(course_id = %course_id, "course content is not a list, lesson not appended");
                continue;
            };
            if has_lesson(&items, &lesson_ref) {
                continue;
            }
            items.push(json!({
                "type": "lesson",
                "id": Uuid::new_v4().to_string(),
                "lesson_id": lesson_ref,
            }));
            self.documents
                .replace_content(DocumentKind::Course, course_id, &Value::Array(items))
                .await?;
            tracing::info!(course_id = %course_id, lesson_id = %lesson_id, "lesson appended to course");
        }
        Ok(())
    }
}
