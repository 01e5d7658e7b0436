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
            CourseView, CreateDocumentRequest, Document, DocumentKind, DocumentQuery,
            UpdateDocumentRequest,
        },
        media::BulkDeleteRequest,
        Page,
    },
    routes::require_manager,
    AppState,
};

/// Courses come back with the summed duration of their lessons.
pub async fn list_courses(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<DocumentQuery>,
) -> AppResult<Json<Page<Categorized<CourseView>>>> {
    let page = state.documents.list_courses(user.user_id, &query).await?;
    Ok(Json(page))
}

pub async fn get_course(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Categorized<CourseView>>> {
    let course = state.documents.get_course(user.user_id, id).await?;
    Ok(Json(course))
}

pub async fn create_course(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(req): Json<CreateDocumentRequest>,
) -> AppResult<(StatusCode, Json<Document>)> {
    require_manager(&state, &user).await?;
    let course = state
        .documents
        .create(user.user_id, DocumentKind::Course, req)
        .await?;
    Ok((StatusCode::CREATED, Json(course)))
}

pub async fn update_course(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateDocumentRequest>,
) -> AppResult<Json<Document>> {
    require_manager(&state, &user).await?;
    let course = state
        .documents
        .update(user.user_id, DocumentKind::Course, id, req)
        .await?;
    Ok(Json(course))
}

pub async fn delete_course(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    require_manager(&state, &user).await?;
    state
        .documents
        .delete(user.user_id, DocumentKind::Course, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_courses(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(req): Json<BulkDeleteRequest>,
) -> AppResult<Json<Value>> {
    require_manager(&state, &user).await?;
    let removed = state
        .documents
        .delete_bulk(user.user_id, DocumentKind::Course, &req.ids)
        .await?;
    Ok(Json(json!({ "deleted": removed })))
}
