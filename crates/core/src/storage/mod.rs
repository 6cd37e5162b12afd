//! Artifact storage boundary.
//!
//! Uploaded sources and converted outputs are stored as opaque artifacts
//! addressed by string keys. The filesystem implementation is the only one
//! shipped; the trait is the seam where an object-storage backend would
//! plug in.

mod error;
mod fs_store;
mod traits;

pub use error::StorageError;
pub use fs_store::FsArtifactStore;
pub use traits::ArtifactStore;
