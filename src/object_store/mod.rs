mod local;

pub use local::LocalStore;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid object key: {0}")]
    InvalidKey(String),
}

/// Raw object storage backend. Keys are `/`-separated paths under the
/// tenant's storage namespace.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<(), ObjectStoreError>;
    /// Deleting a key that does not exist is not an error.
    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError>;
}
