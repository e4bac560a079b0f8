use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use url::Url;

use super::{DestroyedFile, StorageBackend, StorageError, StoredFile};

/// Files on the local disk under `root`, written with `tokio::fs`.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
    base_url: Option<Url>,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            base_url: None,
        }
    }

    /// Public prefix prepended to keys; a trailing `/` is added if missing.
    pub fn with_base_url(mut self, base_url: &str) -> Result<Self, url::ParseError> {
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        self.base_url = Some(Url::parse(&normalized)?);
        Ok(self)
    }

    /// `<dirname>/<YYYYMMDDHHMMSS>-<random>-<basename>`
    fn key_for(name: &str) -> Result<String, StorageError> {
        let path = checked_relative(name)?;
        let basename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| StorageError::InvalidKey(name.to_string()))?;
        let stamped = format!(
            "{}-{}-{}",
            Utc::now().format("%Y%m%d%H%M%S"),
            uuid::Uuid::new_v4().simple(),
            basename
        );
        let key = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.join(stamped),
            _ => PathBuf::from(stamped),
        };
        Ok(key.to_string_lossy().replace('\\', "/"))
    }

    fn url_for(&self, key: &str) -> String {
        match &self.base_url {
            Some(base) => base
                .join(key)
                .map(String::from)
                .unwrap_or_else(|_| key.to_string()),
            None => key.to_string(),
        }
    }
}

fn checked_relative(key: &str) -> Result<&Path, StorageError> {
    let path = Path::new(key);
    let safe = !key.is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if safe {
        Ok(path)
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}

#[async_trait]
impl StorageBackend for LocalStorage {
    async fn upload(&self, name: &str, bytes: &[u8]) -> Result<StoredFile, StorageError> {
        let key = Self::key_for(name)?;
        let target = self.root.join(&key);
        if let Some(dir) = target.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|source| StorageError::Io {
                    action: "save file to path",
                    source,
                })?;
        }
        tokio::fs::write(&target, bytes)
            .await
            .map_err(|source| StorageError::Io {
                action: "save file to path",
                source,
            })?;
        tracing::debug!("Stored {} ({} bytes)", key, bytes.len());
        let url = self.url_for(&key);
        Ok(StoredFile { key, url })
    }

    async fn destroy(&self, key: &str) -> Result<DestroyedFile, StorageError> {
        let path = checked_relative(key)?;
        tokio::fs::remove_file(self.root.join(path))
            .await
            .map_err(|source| StorageError::Io {
                action: "destroy file",
                source,
            })?;
        Ok(DestroyedFile {
            key: key.to_string(),
            deleted_at: Utc::now().to_rfc3339(),
        })
    }
}
