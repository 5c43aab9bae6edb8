//! Pack repository adapters.

pub mod archive;
mod cached;
pub mod directory;
mod memory;

pub use archive::{ArchiveFormat, ArchiveRepository, write_archive};
pub use cached::CachedRepository;
pub use directory::DirectoryRepository;
pub use memory::InMemoryRepository;
