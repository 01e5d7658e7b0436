use axum::{
    extract::{multipart::Field, Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        auth::AuthenticatedUser,
        category::{parse_category_ids, Categorized},
        media::{
            BulkDeleteRequest, MediaAsset, MediaKind, MediaPatch, MediaQuery, MediaUpload,
            UploadedFile,
        },
        Page,
    },
    routes::require_manager,
    services::media::DeletionReport,
    AppState,
};

fn bad_multipart(e: impl std::fmt::Display) -> AppError {
    AppError::validation(format!("Invalid multipart body: {e}"))
}

async fn read_file(field: Field<'_>) -> AppResult<UploadedFile> {
    let original_name = field.file_name().unwrap_or("upload").to_string();
    let content_type = field
        .content_type()
        .map(str::to_string)
        .unwrap_or_else(|| {
            mime_guess::from_path(&original_name)
                .first_or_octet_stream()
                .to_string()
        });
    let bytes = field.bytes().await.map_err(bad_multipart)?;
    Ok(UploadedFile {
        original_name,
        content_type,
        bytes,
    })
}

/// Collects repeated `names`, `urls`, `ids` and `files` fields (with or
/// without a `[]` suffix, singular names accepted) in the order sent.
/// Category ids may be repeated or comma-separated; an empty value clears.
async fn read_upload(mut multipart: Multipart) -> AppResult<MediaUpload> {
    let mut upload = MediaUpload::default();
    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let name = field.name().unwrap_or("").trim_end_matches("[]").to_string();
        match name.as_str() {
            "file" | "files" => upload.files.push(read_file(field).await?),
            "name" | "names" => upload.names.push(field.text().await.map_err(bad_multipart)?),
            "url" | "urls" => upload.urls.push(field.text().await.map_err(bad_multipart)?),
            "id" | "ids" => {
                let text = field.text().await.map_err(bad_multipart)?;
                let id = text
                    .trim()
                    .parse::<Uuid>()
                    .map_err(|_| AppError::validation(format!("Invalid id: {text}")))?;
                upload.ids.push(id);
            }
            "category_id" | "category_ids" | "categories" => {
                let text = field.text().await.map_err(bad_multipart)?;
                upload
                    .category_ids
                    .get_or_insert_with(Vec::new)
                    .extend(parse_category_ids(Some(&text))?);
            }
            _ => {}
        }
    }
    Ok(upload)
}

fn deletion_body(report: &DeletionReport) -> Json<Value> {
    Json(json!({
        "deleted": report.deleted,
        "storage_failures": report.storage_failures.len(),
        "cleanup_failures": report.cleanup.failures.len(),
    }))
}

pub async fn list_media(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(kind): Path<MediaKind>,
    Query(query): Query<MediaQuery>,
) -> AppResult<Json<Page<Categorized<MediaAsset>>>> {
    let page = state.media.list(user.user_id, kind, &query).await?;
    Ok(Json(page))
}

pub async fn create_media(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(kind): Path<MediaKind>,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<Vec<MediaAsset>>)> {
    require_manager(&state, &user).await?;
    let upload = read_upload(multipart).await?;
    let created = state.media.create_bulk(user.user_id, kind, upload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_media(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((kind, id)): Path<(MediaKind, Uuid)>,
    multipart: Multipart,
) -> AppResult<Json<MediaAsset>> {
    require_manager(&state, &user).await?;
    let upload = read_upload(multipart).await?;
    let patch = MediaPatch {
        name: upload.names.into_iter().next(),
        url: upload.urls.into_iter().next(),
        file: upload.files.into_iter().next(),
        category_ids: upload.category_ids,
    };
    let asset = state.media.update(user.user_id, kind, id, patch).await?;
    Ok(Json(asset))
}

pub async fn update_media_bulk(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(kind): Path<MediaKind>,
    multipart: Multipart,
) -> AppResult<Json<Vec<MediaAsset>>> {
    require_manager(&state, &user).await?;
    let upload = read_upload(multipart).await?;
    let updated = state.media.update_bulk(user.user_id, kind, upload).await?;
    Ok(Json(updated))
}

pub async fn delete_media(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((kind, id)): Path<(MediaKind, Uuid)>,
) -> AppResult<Json<Value>> {
    require_manager(&state, &user).await?;
    let report = state.media.delete(user.user_id, kind, id).await?;
    Ok(deletion_body(&report))
}

pub async fn delete_media_bulk(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(kind): Path<MediaKind>,
    Json(req): Json<BulkDeleteRequest>,
) -> AppResult<Json<Value>> {
    require_manager(&state, &user).await?;
    let report = state.media.delete_bulk(user.user_id, kind, &req.ids).await?;
    Ok(deletion_body(&report))
}
