//! Command handlers, one module per subcommand.

use std::sync::Arc;

use tracing::debug;

use packweave_adapters::{
    ArchiveRepository, CachedRepository, DirectoryRepository, discover_repository,
};
use packweave_core::application::PackRepository;

use crate::{cli::GlobalArgs, config::AppConfig, error::CliResult};

pub mod archive;
pub mod completions;
pub mod config;
pub mod init;
pub mod list;
pub mod new;

/// Open the pack repository the user asked for.
///
/// Priority: `--archive`, `--packs-dir`, `repository.archive`,
/// `repository.packs_dir`, then discovery. The result is wrapped in a
/// [`CachedRepository`] so one command never reads a pack twice.
pub fn open_repository(global: &GlobalArgs, config: &AppConfig) -> CliResult<Arc<dyn PackRepository>> {
    if let Some(path) = &global.archive {
        debug!(path = %path.display(), "using archive from --archive");
        return Ok(cached(ArchiveRepository::open(path)?));
    }
    if let Some(dir) = &global.packs_dir {
        debug!(dir = %dir.display(), "using packs directory from --packs-dir");
        return Ok(cached(DirectoryRepository::open(dir)?));
    }
    if let Some(path) = &config.repository.archive {
        debug!(path = %path.display(), "using archive from config");
        return Ok(cached(ArchiveRepository::open(path)?));
    }
    if let Some(dir) = &config.repository.packs_dir {
        debug!(dir = %dir.display(), "using packs directory from config");
        return Ok(cached(DirectoryRepository::open(dir)?));
    }
    Ok(cached(discover_repository()?))
}

fn cached<R: PackRepository + 'static>(repository: R) -> Arc<dyn PackRepository> {
    Arc::new(CachedRepository::new(repository))
}
