//! File-backed desired-state store.
//!
//! One JSON manifest per resource in a flat directory. The file stem is the
//! resource key. Writes go to a hidden temp file first and are renamed into
//! place, so readers never observe a partial manifest.

use std::path::{Path, PathBuf};

use converge_engine::resource::Resource;
use thiserror::Error;
use tokio::fs;
use tracing::debug;

const EXTENSION: &str = "json";

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Manifest is not a valid resource.
    #[error("failed to decode {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to encode manifest: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the manifest directory if it does not exist yet.
    pub async fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", key, EXTENSION))
    }

    /// Keys of all manifests, sorted.
    pub async fn keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if stem.starts_with('.') {
                continue;
            }
            keys.push(stem.to_string());
        }

        keys.sort();
        Ok(keys)
    }

    pub async fn get(&self, key: &str) -> Result<Resource> {
        let path = self.path(key);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(key.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        serde_json::from_slice(&bytes).map_err(|source| StoreError::Decode { path, source })
    }

    /// Write a manifest atomically.
    pub async fn put(&self, key: &str, resource: &Resource) -> Result<()> {
        let path = self.path(key);
        let tmp = self.dir.join(format!(".{}.{}.tmp", key, EXTENSION));
        let bytes = serde_json::to_vec_pretty(resource)?;

        fs::write(&tmp, &bytes).await?;
        fs::rename(&tmp, &path).await?;
        debug!(key, path = %path.display(), "Persisted manifest");
        Ok(())
    }
}
