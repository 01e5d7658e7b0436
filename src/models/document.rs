use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use super::category::CategoryOwner;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Lesson,
    Course,
}

impl DocumentKind {
    pub fn category_owner(self) -> CategoryOwner {
        match self {
            DocumentKind::Lesson => CategoryOwner::Lesson,
            DocumentKind::Course => CategoryOwner::Course,
        }
    }

    pub const ALL: [DocumentKind; 2] = [DocumentKind::Lesson, DocumentKind::Course];

    pub fn table(self) -> &'static str {
        match self {
            DocumentKind::Lesson => "lessons",
            DocumentKind::Course => "courses",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DocumentKind::Lesson => "Lesson",
            DocumentKind::Course => "Course",
        }
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DocumentKind::Lesson => "lesson",
            DocumentKind::Course => "course",
        };
        write!(f, "{s}")
    }
}

/// A lesson or course row. `content` is the raw editor tree.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Document {
    pub id: Uuid,
    pub name: String,
    pub cover_url: Option<String>,
    pub content: Value,
    /// Minutes. Lessons only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<i32>,
    pub tenant_id: Uuid,
    pub author_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDocument {
    pub name: String,
    pub cover_url: Option<String>,
    pub content: Value,
    pub duration: Option<i32>,
    pub tenant_id: Uuid,
    pub author_id: Uuid,
}

#[derive(Debug, Clone, Default)]
pub struct DocumentChanges {
    pub name: Option<String>,
    pub cover_url: Option<String>,
    pub content: Option<Value>,
    pub duration: Option<i32>,
}

/// `content` may be sent as JSON or as a JSON-encoded string.
#[derive(Debug, Deserialize)]
pub struct CreateDocumentRequest {
    pub name: String,
    pub cover_url: Option<String>,
    pub content: Value,
    pub duration: Option<i32>,
    /// Lessons only: courses the new lesson is appended to.
    #[serde(default)]
    pub course_ids: Vec<Uuid>,
    #[serde(default)]
    pub category_ids: Vec<Uuid>,
    /// Single-category form, used when `category_ids` is empty.
    pub category_id: Option<Uuid>,
}

impl CreateDocumentRequest {
    pub fn categories(&self) -> Vec<Uuid> {
        match (self.category_ids.is_empty(), self.category_id) {
            (true, Some(id)) => vec![id],
            _ => self.category_ids.clone(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateDocumentRequest {
    pub name: Option<String>,
    pub cover_url: Option<String>,
    pub content: Option<Value>,
    pub duration: Option<i32>,
    #[serde(default)]
    pub course_ids: Vec<Uuid>,
    /// Replaces the document's categories when set.
    pub category_ids: Option<Vec<Uuid>>,
    pub category_id: Option<Uuid>,
}

impl UpdateDocumentRequest {
    pub fn categories(&self) -> Option<Vec<Uuid>> {
        self.category_ids
            .clone()
            .or_else(|| self.category_id.map(|id| vec![id]))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    /// Comma-separated; matches documents filed under any of them.
    pub category_ids: Option<String>,
}

/// A course together with the summed duration of the lessons it references.
#[derive(Debug, Clone, Serialize)]
pub struct CourseView {
    #[serde(flatten)]
    pub course: Document,
    pub duration: i64,
}
