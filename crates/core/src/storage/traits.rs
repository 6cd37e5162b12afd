//! Trait definition for artifact storage backends.

use async_trait::async_trait;
use std::path::Path;

use super::error::StorageError;

/// Storage backend for source and converted artifacts.
///
/// Keys are relative, slash-separated paths chosen by the caller, e.g.
/// `uploads/<job-id>/photo.jpg`. Writes must be atomic: a reader never
/// observes a partially written artifact under a key, and overwriting an
/// existing key replaces it in one step.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Stores the given bytes under the key. Returns the stored size.
    async fn put_bytes(&self, key: &str, bytes: &[u8]) -> Result<u64, StorageError>;

    /// Moves an existing file into the store under the key. Returns the
    /// stored size. The source file is consumed on success.
    async fn put_file(&self, key: &str, source: &Path) -> Result<u64, StorageError>;

    /// Reads the full artifact contents.
    async fn read(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Deletes the artifact. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Whether an artifact exists under the key.
    async fn exists(&self, key: &str) -> bool;

    /// Size in bytes of the stored artifact.
    async fn size(&self, key: &str) -> Result<u64, StorageError>;
}
