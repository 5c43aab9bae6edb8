use super::DomainError;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::domain::entities::source::validate_relative;

/// An output path guaranteed to stay inside the project root.
///
/// Invariant: never absolute, never contains `..`. Enforced at construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelativePath(PathBuf);

impl RelativePath {
    /// Fallible constructor. Backslashes are treated as separators and
    /// empty segments are dropped.
    pub fn try_new(path: impl AsRef<str>) -> Result<Self, DomainError> {
        let normalized = path.as_ref().replace('\\', "/");
        validate_relative(&normalized)?;
        let joined: PathBuf = normalized
            .split('/')
            .filter(|s| !s.is_empty() && *s != ".")
            .collect();
        if joined.as_os_str().is_empty() {
            return Err(DomainError::InvalidPack(format!(
                "empty output path '{}'",
                path.as_ref()
            )));
        }
        Ok(Self(joined))
    }

    /// Join a segment, maintaining the relative invariant.
    pub fn join(&self, segment: impl AsRef<str>) -> Result<Self, DomainError> {
        let tail = Self::try_new(segment)?;
        Ok(Self(self.0.join(tail.0)))
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }
}

impl AsRef<Path> for RelativePath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for RelativePath {
    /// Always uses `/`, whatever the host separator.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<_> = self.0.iter().map(|p| p.to_string_lossy()).collect();
        write!(f, "{}", parts.join("/"))
    }
}
