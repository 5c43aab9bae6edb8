//! Infrastructure adapters for packweave.
//!
//! This crate implements the ports defined in `packweave-core::application::ports`.
//! It contains all external dependencies and I/O operations.

pub mod discovery;
pub mod filesystem;
pub mod repository;

// Re-export commonly used adapters
pub use discovery::{PACKS_DIR_ENV, discover_repository};
pub use filesystem::{LocalFilesystem, MemoryFilesystem};
pub use repository::{
    ArchiveFormat, ArchiveRepository, CachedRepository, DirectoryRepository, InMemoryRepository,
};
