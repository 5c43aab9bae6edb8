//! Locating the packs directory at runtime.
//!
//! # Resolution order
//!
//! 1. `$PACKWEAVE_PACKS_DIR` environment variable (explicit override).
//! 2. `./packs` relative to the current working directory.
//! 3. `<directory of the current executable>/packs` (installed binaries).
//! 4. `../packs` relative to the current working directory (development
//!    fallback when running from a workspace sub-crate).
//!
//! The first candidate that is an existing directory wins.

use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use packweave_core::{application::ApplicationError, error::WeaveResult};

use crate::repository::DirectoryRepository;

/// Environment variable naming the packs directory.
pub const PACKS_DIR_ENV: &str = "PACKWEAVE_PACKS_DIR";

/// Name of the packs directory looked for next to the cwd and the executable.
pub const PACKS_DIR_NAME: &str = "packs";

/// Ordered candidate directories.
///
/// Takes its inputs explicitly so the order can be tested without touching
/// the process environment.
pub fn candidates(env: Option<&str>, cwd: &Path, exe: Option<&Path>) -> Vec<PathBuf> {
    let mut paths = Vec::with_capacity(4);
    if let Some(dir) = env.filter(|d| !d.trim().is_empty()) {
        paths.push(PathBuf::from(dir));
    }
    paths.push(cwd.join(PACKS_DIR_NAME));
    if let Some(exe_dir) = exe.and_then(Path::parent) {
        paths.push(exe_dir.join(PACKS_DIR_NAME));
    }
    if let Some(parent) = cwd.parent() {
        paths.push(parent.join(PACKS_DIR_NAME));
    }
    paths
}

/// First existing candidate for the current process.
pub fn find_packs_dir() -> Option<PathBuf> {
    let env = std::env::var(PACKS_DIR_ENV).ok();
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let exe = std::env::current_exe().ok();

    candidates(env.as_deref(), &cwd, exe.as_deref())
        .into_iter()
        .find(|candidate| {
            let found = candidate.is_dir();
            debug!(path = %candidate.display(), found, "probing packs directory");
            found
        })
}

/// Open the first packs directory found.
///
/// # Errors
///
/// [`ApplicationError::RepositoryUnavailable`] when no candidate exists.
#[instrument]
pub fn discover_repository() -> WeaveResult<DirectoryRepository> {
    let dir = find_packs_dir().ok_or_else(|| ApplicationError::RepositoryUnavailable {
        reason: format!(
            "no packs directory found; checked ${PACKS_DIR_ENV}, ./{PACKS_DIR_NAME}, \
             <exe>/{PACKS_DIR_NAME} and ../{PACKS_DIR_NAME}"
        ),
    })?;
    let repo = DirectoryRepository::open(&dir)?;
    info!(path = %dir.display(), packs = repo.len(), "packs directory discovered");
    Ok(repo)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_comes_first_and_parent_last() {
        let paths = candidates(
            Some("/opt/packs"),
            Path::new("/work/app"),
            Some(Path::new("/usr/local/bin/packweave")),
        );
        assert_eq!(
            paths,
            [
                PathBuf::from("/opt/packs"),
                PathBuf::from("/work/app/packs"),
                PathBuf::from("/usr/local/bin/packs"),
                PathBuf::from("/work/packs"),
            ]
        );
    }

    #[test]
    fn blank_env_and_missing_exe_are_skipped() {
        let paths = candidates(Some("  "), Path::new("/work/app"), None);
        assert_eq!(
            paths,
            [PathBuf::from("/work/app/packs"), PathBuf::from("/work/packs")]
        );
    }
}
