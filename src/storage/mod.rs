pub mod local;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use local::LocalStorage;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid file key: {0}")]
    InvalidKey(String),

    #[error("could not {action}: {source}")]
    Io {
        action: &'static str,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredFile {
    pub key: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DestroyedFile {
    pub key: String,
    pub deleted_at: String,
}

/// Where uploaded file bytes end up.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    async fn upload(&self, name: &str, bytes: &[u8]) -> Result<StoredFile, StorageError>;

    async fn destroy(&self, key: &str) -> Result<DestroyedFile, StorageError>;
}
