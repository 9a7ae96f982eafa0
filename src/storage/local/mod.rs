
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::{BackendKind, StorageBackend};
use crate::{RagError, Result};

/// Stores every key as a file under a root directory
#[derive(Debug, Clone)]
pub struct LocalFilesystemBackend {
    root: PathBuf,
}

impl LocalFilesystemBackend {
    #[inline]
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a `/`-separated key below the root
    #[inline]
    pub fn path_for(&self, key: &str) -> PathBuf {
        key.split('/')
            .filter(|segment| !segment.is_empty())
            .fold(self.root.clone(), |path, segment| path.join(segment))
    }

    async fn ensure_parent(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                RagError::Storage(format!(
                    "Failed to create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for LocalFilesystemBackend {
    #[inline]
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    #[inline]
    async fn read(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.path_for(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                debug!("Read {} bytes from {}", bytes.len(), path.display());
                Ok(bytes)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(RagError::NotFound {
                key: key.to_string(),
            }),
            Err(e) => Err(RagError::Storage(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    #[inline]
    async fn write(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path_for(key);
        Self::ensure_parent(&path).await?;

        tokio::fs::write(&path, bytes).await.map_err(|e| {
            RagError::Storage(format!("Failed to write {}: {}", path.display(), e))
        })?;

        debug!("Wrote {} bytes to {}", bytes.len(), path.display());
        Ok(())
    }

    #[inline]
    async fn append(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path_for(key);
        Self::ensure_parent(&path).await?;

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| RagError::Storage(format!("Failed to open {}: {}", path.display(), e)))?;

        file.write_all(bytes).await.map_err(|e| {
            RagError::Storage(format!("Failed to append to {}: {}", path.display(), e))
        })?;
        file.flush().await.map_err(|e| {
            RagError::Storage(format!("Failed to flush {}: {}", path.display(), e))
        })?;

        debug!("Appended {} bytes to {}", bytes.len(), path.display());
        Ok(())
    }

    #[inline]
    async fn exists(&self, key: &str) -> Result<bool> {
        let path = self.path_for(key);
        tokio::fs::try_exists(&path)
            .await
            .map_err(|e| RagError::Storage(format!("Failed to stat {}: {}", path.display(), e)))
    }
}
