use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// A tenant-owned label that materials, lessons and courses are filed under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub color: Option<String>,
    pub tenant_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCategory {
    pub name: String,
    pub color: Option<String>,
    pub tenant_id: Uuid,
}

/// What a category can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CategoryOwner {
    Media,
    Lesson,
    Course,
}

impl std::fmt::Display for CategoryOwner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CategoryOwner::Media => "media",
            CategoryOwner::Lesson => "lesson",
            CategoryOwner::Course => "course",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryInput {
    pub name: String,
    pub color: Option<String>,
}

/// Accepts a list, `{ "categories": [...] }`, or a single `{ name, color }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CreateCategoryRequest {
    Many(Vec<CategoryInput>),
    Wrapped { categories: Vec<CategoryInput> },
    One(CategoryInput),
}

impl CreateCategoryRequest {
    pub fn is_single(&self) -> bool {
        matches!(self, CreateCategoryRequest::One(_))
    }

    pub fn into_inputs(self) -> Vec<CategoryInput> {
        match self {
            CreateCategoryRequest::Many(items) => items,
            CreateCategoryRequest::Wrapped { categories } => categories,
            CreateCategoryRequest::One(item) => vec![item],
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCategoryRequest {
    pub name: Option<String>,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
}

/// An item together with the categories it is filed under. `category`
/// repeats the first of them for clients that only know a single one.
#[derive(Debug, Clone, Serialize)]
pub struct Categorized<T> {
    #[serde(flatten)]
    pub item: T,
    pub categories: Vec<Category>,
    pub category: Option<Category>,
}

impl<T> Categorized<T> {
    pub fn new(item: T, categories: Vec<Category>) -> Self {
        Self {
            item,
            category: categories.first().cloned(),
            categories,
        }
    }
}

/// Parses a comma-separated `category_ids` query value. Blank entries are
/// ignored.
pub fn parse_category_ids(raw: Option<&str>) -> AppResult<Vec<Uuid>> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<Uuid>()
                .map_err(|_| AppError::validation(format!("Invalid category id: {s}")))
        })
        .collect()
}
