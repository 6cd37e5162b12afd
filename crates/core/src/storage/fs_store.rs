//! Filesystem-backed artifact store.

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::error::StorageError;
use super::traits::ArtifactStore;

/// Artifact store rooted at a local directory.
///
/// All writes land in a `.tmp` staging directory under the root first and
/// are renamed into place, so an overwrite is atomic on the same
/// filesystem.
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    /// Creates a store rooted at `root`, creating the directory if needed.
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(root.join(".tmp")).await?;
        Ok(Self { root })
    }

    /// The root directory of this store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let safe = relative.components().all(|c| matches!(c, Component::Normal(_)));
        if key.is_empty() || !safe {
            return Err(StorageError::InvalidKey {
                key: key.to_string(),
            });
        }
        Ok(self.root.join(relative))
    }

    fn staging_path(&self) -> PathBuf {
        self.root
            .join(".tmp")
            .join(uuid::Uuid::new_v4().to_string())
    }

    /// Attempts an atomic rename; reports `false` on a cross-device link so
    /// the caller can fall back to copying.
    async fn try_atomic_move(source: &Path, destination: &Path) -> Result<bool, std::io::Error> {
        match fs::rename(source, destination).await {
            Ok(()) => Ok(true),
            Err(e) => {
                if e.kind() == std::io::ErrorKind::CrossesDevices || e.raw_os_error() == Some(18) {
                    Ok(false)
                } else {
                    Err(e)
                }
            }
        }
    }

    async fn commit(&self, staged: &Path, key: &str) -> Result<(), StorageError> {
        let destination = self.resolve(key)?;
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::put_failed(key, e))?;
        }
        fs::rename(staged, &destination)
            .await
            .map_err(|e| StorageError::put_failed(key, e))?;
        Ok(())
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn put_bytes(&self, key: &str, bytes: &[u8]) -> Result<u64, StorageError> {
        let staged = self.staging_path();

        let mut file = fs::File::create(&staged)
            .await
            .map_err(|e| StorageError::put_failed(key, e))?;
        file.write_all(bytes)
            .await
            .map_err(|e| StorageError::put_failed(key, e))?;
        file.flush()
            .await
            .map_err(|e| StorageError::put_failed(key, e))?;
        drop(file);

        self.commit(&staged, key).await?;
        Ok(bytes.len() as u64)
    }

    async fn put_file(&self, key: &str, source: &Path) -> Result<u64, StorageError> {
        let size = fs::metadata(source)
            .await
            .map_err(|e| StorageError::put_failed(key, e))?
            .len();

        let staged = self.staging_path();

        // Rename when the source is on the same filesystem, copy otherwise.
        let moved = Self::try_atomic_move(source, &staged)
            .await
            .map_err(|e| StorageError::put_failed(key, e))?;
        if !moved {
            fs::copy(source, &staged)
                .await
                .map_err(|e| StorageError::put_failed(key, e))?;
            let _ = fs::remove_file(source).await;
        }

        self.commit(&staged, key).await?;
        Ok(size)
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound {
                key: key.to_string(),
            }),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.resolve(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    async fn exists(&self, key: &str) -> bool {
        match self.resolve(key) {
            Ok(path) => fs::try_exists(&path).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    async fn size(&self, key: &str) -> Result<u64, StorageError> {
        let path = self.resolve(key)?;
        match fs::metadata(&path).await {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound {
                key: key.to_string(),
            }),
            Err(e) => Err(StorageError::Io(e)),
        }
    }
}
