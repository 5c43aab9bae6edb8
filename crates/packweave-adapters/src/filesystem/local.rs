//! Local filesystem adapter using std::fs.

use std::io;
use std::path::Path;

use packweave_core::{
    application::{ApplicationError, ports::Filesystem},
    error::{WeaveError, WeaveResult},
};

/// Production filesystem implementation using `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFilesystem;

impl LocalFilesystem {
    pub fn new() -> Self {
        Self
    }
}

impl Filesystem for LocalFilesystem {
    fn create_dir_all(&self, path: &Path) -> WeaveResult<()> {
        std::fs::create_dir_all(path).map_err(|e| map_io_error(path, e, "create directory"))
    }

    fn write_file(&self, path: &Path, content: &[u8]) -> WeaveResult<()> {
        std::fs::write(path, content).map_err(|e| map_io_error(path, e, "write file"))
    }

    fn set_permissions(&self, path: &Path, executable: bool) -> WeaveResult<()> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let metadata =
                std::fs::metadata(path).map_err(|e| map_io_error(path, e, "get metadata"))?;
            let mut perms = metadata.permissions();
            let mode = if executable {
                perms.mode() | 0o111
            } else {
                perms.mode() & !0o111
            };
            perms.set_mode(mode);
            std::fs::set_permissions(path, perms)
                .map_err(|e| map_io_error(path, e, "set permissions"))?;
        }
        #[cfg(not(unix))]
        {
            // No executable bit outside unix.
            let _ = (path, executable);
        }
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn remove_dir_all(&self, path: &Path) -> WeaveResult<()> {
        std::fs::remove_dir_all(path).map_err(|e| map_io_error(path, e, "remove directory"))
    }
}

pub(crate) fn map_io_error(path: &Path, e: io::Error, operation: &str) -> WeaveError {
    ApplicationError::FilesystemError {
        path: path.to_path_buf(),
        reason: format!("Failed to {}: {}", operation, e),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_bytes_and_removes_tree() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path().join("project");
        let fs = LocalFilesystem::new();

        fs.create_dir_all(&root.join("src")).unwrap();
        fs.write_file(&root.join("src/bin.dat"), &[0, 159, 146, 150]).unwrap();
        assert_eq!(std::fs::read(root.join("src/bin.dat")).unwrap(), [0, 159, 146, 150]);

        fs.remove_dir_all(&root).unwrap();
        assert!(!fs.exists(&root));
    }

    #[cfg(unix)]
    #[test]
    fn marks_files_executable() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir().unwrap();
        let script = temp.path().join("gradlew");
        let fs = LocalFilesystem::new();
        fs.write_file(&script, b"#!/bin/sh\n").unwrap();
        fs.set_permissions(&script, true).unwrap();

        let mode = std::fs::metadata(&script).unwrap().permissions().mode();
        assert_eq!(mode & 0o111, 0o111);
    }

    #[test]
    fn io_errors_carry_the_path() {
        let temp = tempfile::tempdir().unwrap();
        let missing = temp.path().join("nope/file.txt");

        let err = LocalFilesystem::new().write_file(&missing, b"x").unwrap_err();
        assert!(err.to_string().contains("nope"));
    }
}
