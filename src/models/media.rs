use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "media_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
    Photo,
    File,
}

impl MediaKind {
    pub const ALL: [MediaKind; 4] = [
        MediaKind::Audio,
        MediaKind::Video,
        MediaKind::Photo,
        MediaKind::File,
    ];

    /// Only videos may point at an external URL instead of an uploaded object.
    pub fn supports_links(self) -> bool {
        matches!(self, MediaKind::Video)
    }

    /// Human label used in error messages ("Photo not found").
    pub fn label(self) -> &'static str {
        match self {
            MediaKind::Audio => "Audio",
            MediaKind::Video => "Video",
            MediaKind::Photo => "Photo",
            MediaKind::File => "File",
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
            MediaKind::Photo => "photo",
            MediaKind::File => "file",
        };
        write!(f, "{s}")
    }
}

/// An uploaded or linked media resource owned by a tenant.
///
/// `file_key` is `None` whenever `is_link` is set: there is no stored
/// object behind an external link.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MediaAsset {
    pub id: Uuid,
    pub kind: MediaKind,
    pub name: String,
    pub file_url: String,
    pub file_key: Option<String>,
    pub is_link: bool,
    pub tenant_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MediaAsset {
    /// Key of the stored object backing this asset, if there is one.
    pub fn stored_object(&self) -> Option<&str> {
        if self.is_link {
            return None;
        }
        self.file_key.as_deref().filter(|k| !k.is_empty())
    }
}

/// Insert payload for a new asset row.
#[derive(Debug, Clone)]
pub struct NewMediaAsset {
    pub kind: MediaKind,
    pub name: String,
    pub file_url: String,
    pub file_key: Option<String>,
    pub is_link: bool,
    pub tenant_id: Uuid,
}

/// Column changes applied by an update. `None` leaves a column untouched.
#[derive(Debug, Clone, Default)]
pub struct MediaChanges {
    pub name: Option<String>,
    pub file_url: Option<String>,
    /// `Some(None)` clears the key (switch to a link).
    pub file_key: Option<Option<String>>,
    pub is_link: Option<bool>,
}

/// A file received from a client, ready to be stored.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub original_name: String,
    pub content_type: String,
    pub bytes: bytes::Bytes,
}

/// Parsed body of a create or bulk-update request.
///
/// `names`, `urls` and `ids` are positional: entry `i` of each describes
/// the same item. Files are consumed in order by the items that need one.
#[derive(Debug, Clone, Default)]
pub struct MediaUpload {
    pub ids: Vec<Uuid>,
    pub names: Vec<String>,
    pub urls: Vec<String>,
    pub files: Vec<UploadedFile>,
    /// Applied to every created or updated item. `None` leaves categories
    /// untouched on update.
    pub category_ids: Option<Vec<Uuid>>,
}

/// Parsed body of a single-asset update.
#[derive(Debug, Clone, Default)]
pub struct MediaPatch {
    pub name: Option<String>,
    pub url: Option<String>,
    pub file: Option<UploadedFile>,
    /// Replaces the asset's categories when set.
    pub category_ids: Option<Vec<Uuid>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    /// Comma-separated; matches items filed under any of them.
    pub category_ids: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BulkDeleteRequest {
    pub ids: Vec<Uuid>,
}
