//! Driven (output) ports - implemented by infrastructure.

use std::path::Path;

use crate::domain::{PackDescriptor, PackId, PackLookup, VersionsCatalog};
use crate::error::{WeaveError, WeaveResult};

/// Port for pack storage and retrieval.
///
/// Implemented by:
/// - `packweave_adapters::repository::InMemoryRepository`
/// - `packweave_adapters::repository::DirectoryRepository`
/// - `packweave_adapters::repository::ArchiveRepository`
/// - `packweave_adapters::repository::CachedRepository` (wraps any of the above)
///
/// Repositories are read-only from the engine's point of view.
#[cfg_attr(test, mockall::automock)]
pub trait PackRepository: Send + Sync {
    /// Every pack id the repository can serve, sorted.
    fn ids(&self) -> WeaveResult<Vec<PackId>>;

    /// A pack by id. `Ok(None)` means the repository does not have it.
    fn get(&self, id: &PackId) -> WeaveResult<Option<PackDescriptor>>;

    /// The versions catalog. An unreadable catalog is an error, never an
    /// empty catalog.
    fn versions(&self) -> WeaveResult<VersionsCatalog>;
}

impl<R: PackRepository + ?Sized> PackLookup for R {
    type Error = WeaveError;

    fn get(&self, id: &PackId) -> Result<Option<PackDescriptor>, WeaveError> {
        PackRepository::get(self, id)
    }

    fn versions(&self) -> Result<VersionsCatalog, WeaveError> {
        PackRepository::versions(self)
    }
}

/// Port for filesystem operations.
///
/// Implemented by:
/// - `packweave_adapters::filesystem::LocalFilesystem` (production)
/// - `packweave_adapters::filesystem::MemoryFilesystem` (testing)
#[cfg_attr(test, mockall::automock)]
pub trait Filesystem: Send + Sync {
    /// Create a directory and all parent directories.
    fn create_dir_all(&self, path: &Path) -> WeaveResult<()>;

    /// Write bytes to a file, replacing it if present.
    fn write_file(&self, path: &Path, content: &[u8]) -> WeaveResult<()>;

    /// Mark a file executable (no-op where unsupported).
    fn set_permissions(&self, path: &Path, executable: bool) -> WeaveResult<()>;

    /// Check if path exists.
    fn exists(&self, path: &Path) -> bool;

    /// Remove a directory and all contents.
    fn remove_dir_all(&self, path: &Path) -> WeaveResult<()>;
}
