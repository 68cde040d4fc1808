//! Storage service trait definition

use crate::*;
use async_trait::async_trait;
use docgate_core::Result;
use std::path::PathBuf;

/// The Storage Manager trait.
///
/// Files are identified by an [`Area`] and a plain file name. All operations
/// act on durable storage directly; implementations keep no cache, so the
/// backing listing is always authoritative.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Store an uploaded source file.
    ///
    /// Fails with `NameConflict` when the name exists and `overwrite` is not
    /// set, and with `InvalidName` for empty or path-escaping names.
    async fn store(&self, req: StoreRequest) -> Result<StoredRef>;

    /// Store a converted artifact together with its back-reference to the source.
    async fn store_artifact(&self, req: ArtifactRequest) -> Result<StoredRef>;

    /// List all entries of an area, ordered by name.
    async fn list(&self, area: Area) -> Result<Vec<StoredRef>>;

    /// Read the full contents of an entry.
    async fn read(&self, area: Area, name: &str) -> Result<Vec<u8>>;

    /// Delete an entry. Deleting a missing entry is a `NotFound` error, so a
    /// repeated delete of the same name fails.
    async fn delete(&self, area: Area, name: &str) -> Result<()>;

    /// Metadata of a single entry.
    async fn stat(&self, area: Area, name: &str) -> Result<StoredRef>;

    /// On-disk location of an entry. The entry is not required to exist.
    fn path(&self, area: Area, name: &str) -> Result<PathBuf>;

    /// Existence and writability of the backing directories.
    async fn health(&self) -> StorageHealth;
}
