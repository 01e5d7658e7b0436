use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        auth::AuthenticatedUser,
        category::Categorized,
        document::{
            CreateDocumentRequest, Document, DocumentKind, DocumentQuery, UpdateDocumentRequest,
        },
        media::BulkDeleteRequest,
        Page,
    },
    routes::require_manager,
    AppState,
};

pub async fn list_lessons(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<DocumentQuery>,
) -> AppResult<Json<Page<Categorized<Document>>>> {
    let page = state
        .documents
        .list(user.user_id, DocumentKind::Lesson, &query)
        .await?;
    Ok(Json(page))
}

pub async fn get_lesson(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Categorized<Document>>> {
    let lesson = state
        .documents
        .get(user.user_id, DocumentKind::Lesson, id)
        .await?;
    Ok(Json(lesson))
}

pub async fn create_lesson(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(req): Json<CreateDocumentRequest>,
) -> AppResult<(StatusCode, Json<Document>)> {
    require_manager(&state, &user).await?;
    let lesson = state
        .documents
        .create(user.user_id, DocumentKind::Lesson, req)
        .await?;
    Ok((StatusCode::CREATED, Json(lesson)))
}

pub async fn update_lesson(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateDocumentRequest>,
) -> AppResult<Json<Document>> {
    require_manager(&state, &user).await?;
    let lesson = state
        .documents
        .update(user.user_id, DocumentKind::Lesson, id, req)
        .await?;
    Ok(Json(lesson))
}

pub async fn delete_lesson(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    require_manager(&state, &user).await?;
    state
        .documents
        .delete(user.user_id, DocumentKind::Lesson, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_lessons(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(req): Json<BulkDeleteRequest>,
) -> AppResult<Json<Value>> {
    require_manager(&state, &user).await?;
    let removed = state
        .documents
        .delete_bulk(user.user_id, DocumentKind::Lesson, &req.ids)
        .await?;
    Ok(Json(json!({ "deleted": removed })))
}
