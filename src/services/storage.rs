use std::sync::Arc;

use chrono::Utc;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::{models::media::UploadedFile, object_store::ObjectStore};

/// Characters left alone by `encodeURIComponent`-style encoding.
const KEY_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Collapses every whitespace run into a single `_` and trims the ends.
pub fn underscore_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join("_")
}

/// Uploads and deletes objects on behalf of the media services.
///
/// Stored locators are either a bare key or, when a public base URL is
/// configured, the full public URL of that key.
pub struct StorageService {
    backend: Arc<dyn ObjectStore>,
    public_url: Option<String>,
}

impl StorageService {
    pub fn new(backend: Arc<dyn ObjectStore>, public_url: Option<String>) -> Self {
        let public_url = public_url
            .map(|u| u.trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty());
        Self {
            backend,
            public_url,
        }
    }

    /// Stores `file` under `path_prefix` and returns its locator.
    pub async fn upload(&self, file: &UploadedFile, path_prefix: &str) -> anyhow::Result<String> {
        let key = object_key(path_prefix, &file.original_name, Utc::now().timestamp_millis());
        self.backend
            .put(&key, file.bytes.clone(), &file.content_type)
            .await?;
        tracing::debug!(key = %key, bytes = file.bytes.len(), "object stored");
        Ok(self.locator_for(&key))
    }

    /// Deletes the object behind a key or public URL. Never fails: errors
    /// are logged and reported as `false`.
    pub async fn delete_file(&self, key_or_url: &str) -> bool {
        let key = self.key_for(key_or_url);
        match self.backend.delete(&key).await {
            Ok(()) => {
                tracing::debug!(key = %key, "object deleted");
                true
            }
            Err(e) => {
                tracing::error!(key = %key, error = %e, "failed to delete stored object");
                false
            }
        }
    }

    /// Backend key for a stored locator.
    pub fn key_for(&self, key_or_url: &str) -> String {
        match &self.public_url {
            Some(base) => match key_or_url.strip_prefix(base.as_str()) {
                Some(rest) => {
                    let rest = rest.trim_start_matches('/');
                    percent_decode_str(rest).decode_utf8_lossy().into_owned()
                }
                None => key_or_url.to_string(),
            },
            None => key_or_url.to_string(),
        }
    }

    fn locator_for(&self, key: &str) -> String {
        match &self.public_url {
            Some(base) => {
                let encoded = key
                    .split('/')
                    .map(|part| utf8_percent_encode(part, KEY_SEGMENT).to_string())
                    .collect::<Vec<_>>()
                    .join("/");
                format!("{base}/{encoded}")
            }
            None => key.to_string(),
        }
    }
}

fn object_key(path_prefix: &str, original_name: &str, millis: i64) -> String {
    let name = underscore_whitespace(original_name).replace(['/', '\\'], "_");
    let name = if name.is_empty() { "upload".to_string() } else { name };
    format!("{}/{millis}-{name}", path_prefix.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::MemoryObjectStore;

    #[test]
    fn test_underscore_whitespace() {
        assert_eq!(underscore_whitespace("Jane  Doe\tAcademy"), "Jane_Doe_Academy");
        assert_eq!(underscore_whitespace("  padded "), "padded");
        assert_eq!(underscore_whitespace(""), "");
    }

    #[test]
    fn test_object_key() {
        assert_eq!(
            object_key("Acme1/materials/photo/", "my photo.png", 1700),
            "Acme1/materials/photo/1700-my_photo.png"
        );
        assert_eq!(object_key("p", "../etc", 1), "p/1-.._etc");
        assert_eq!(object_key("p", "   ", 1), "p/1-upload");
    }

    #[test]
    fn test_public_url_round_trip() {
        let storage = StorageService::new(
            Arc::new(MemoryObjectStore::default()),
            Some("https://cdn.example.com/".into()),
        );
        let url = storage.locator_for("Acme1/materials/photo/1-été (1).png");
        assert_eq!(
            url,
            "https://cdn.example.com/Acme1/materials/photo/1-%C3%A9t%C3%A9%20(1).png"
        );
        assert_eq!(storage.key_for(&url), "Acme1/materials/photo/1-été (1).png");
        assert_eq!(storage.key_for("plain/key.png"), "plain/key.png");
    }

    #[tokio::test]
    async fn test_upload_then_delete() {
        let backend = Arc::new(MemoryObjectStore::default());
        let storage = StorageService::new(backend.clone(), None);
        let file = UploadedFile {
            original_name: "a b.mp3".into(),
            content_type: "audio/mpeg".into(),
            bytes: bytes::Bytes::from_static(b"ID3"),
        };

        let key = storage.upload(&file, "Acme1/materials/audio").await.unwrap();
        assert!(key.starts_with("Acme1/materials/audio/"));
        assert!(key.ends_with("-a_b.mp3"));
        assert!(backend.contains(&key));

        assert!(storage.delete_file(&key).await);
        assert!(!backend.contains(&key));
    }

    #[tokio::test]
    async fn test_delete_failure_is_swallowed() {
        let backend = Arc::new(MemoryObjectStore::default());
        backend.fail_deletes();
        let storage = StorageService::new(backend, None);
        assert!(!storage.delete_file("missing/key").await);
    }
}
