use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        auth::AuthenticatedUser,
        category::{Category, CategoryQuery, CreateCategoryRequest, UpdateCategoryRequest},
        media::BulkDeleteRequest,
        Page,
    },
    routes::require_manager,
    AppState,
};

pub async fn list_categories(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<CategoryQuery>,
) -> AppResult<Json<Page<Category>>> {
    let page = state.categories.list(user.user_id, &query).await?;
    Ok(Json(page))
}

/// Accepts one category, an array, or `{ "categories": [...] }`, and
/// answers in the same shape.
pub async fn create_categories(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(req): Json<CreateCategoryRequest>,
) -> AppResult<(StatusCode, Json<Value>)> {
    require_manager(&state, &user).await?;
    let single = req.is_single();
    let mut created = state
        .categories
        .create(user.user_id, req.into_inputs())
        .await?;

    let body = if single {
        let category = created
            .pop()
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("category insert returned no row")))?;
        serde_json::to_value(category)
    } else {
        serde_json::to_value(created)
    }
    .map_err(|e| AppError::Internal(e.into()))?;
    Ok((StatusCode::CREATED, Json(body)))
}

pub async fn update_category(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateCategoryRequest>,
) -> AppResult<Json<Category>> {
    require_manager(&state, &user).await?;
    let category = state.categories.update(user.user_id, id, req).await?;
    Ok(Json(category))
}

pub async fn delete_category(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    require_manager(&state, &user).await?;
    state.categories.delete(user.user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_categories(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(req): Json<BulkDeleteRequest>,
) -> AppResult<Json<Value>> {
    require_manager(&state, &user).await?;
    let removed = state.categories.delete_bulk(user.user_id, &req.ids).await?;
    Ok(Json(json!({ "deleted": removed })))
}
