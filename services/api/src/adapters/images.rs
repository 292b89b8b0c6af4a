//! services/api/src/adapters/images.rs
//!
//! Stores uploaded product images on the local filesystem. Files are served
//! back under `/storage`, so the returned paths are relative to the storage root.

use async_trait::async_trait;
use shop_core::ports::{ImageStorage, PortError, PortResult};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct LocalImageStorage {
    root: PathBuf,
}

impl LocalImageStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolves a stored path, refusing anything that would escape the root.
    fn resolve(&self, relative: &str) -> PortResult<PathBuf> {
        let relative = Path::new(relative);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if escapes {
            return Err(PortError::Unexpected(format!(
                "refusing storage path {}",
                relative.display()
            )));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ImageStorage for LocalImageStorage {
    async fn store_image(&self, directory: &str, extension: &str, bytes: &[u8]) -> PortResult<String> {
        let relative = format!("{}/{}.{}", directory, Uuid::new_v4().simple(), extension);
        let target = self.resolve(&relative)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| PortError::Unexpected(format!("create {}: {}", parent.display(), e)))?;
        }
        tokio::fs::write(&target, bytes)
            .await
            .map_err(|e| PortError::Unexpected(format!("write {}: {}", target.display(), e)))?;
        debug!(path = %relative, size = bytes.len(), "Stored image");
        Ok(relative)
    }

    async fn delete_image(&self, path: &str) -> PortResult<()> {
        let target = self.resolve(path)?;
        match tokio::fs::remove_file(&target).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(path, "Image already missing from storage");
                Ok(())
            }
            Err(e) => Err(PortError::Unexpected(format!("remove {}: {}", target.display(), e))),
        }
    }
}
