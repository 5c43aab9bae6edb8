//! Application layer errors.
//!
//! These errors represent failures in orchestration, not business logic.
//! Business logic errors are `DomainError` from `crate::domain`.

use std::path::PathBuf;
use thiserror::Error;

use crate::error::ErrorCategory;

/// Errors that occur during application orchestration.
#[derive(Debug, Error, Clone)]
pub enum ApplicationError {
    /// A pack repository could not be read.
    #[error("Pack repository unavailable: {reason}")]
    RepositoryUnavailable { reason: String },

    /// A pack archive could not be decoded or encoded.
    #[error("Invalid pack archive: {reason}")]
    ArchiveFormat { reason: String },

    /// Filesystem operation failed.
    #[error("Filesystem error at {path}: {reason}")]
    FilesystemError { path: PathBuf, reason: String },

    /// Shared repository state was poisoned.
    #[error("Pack repository lock poisoned")]
    StoreLockError,

    /// Validation failed (application-level, not domain).
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// Project already exists at target location.
    #[error("Project already exists at {path}")]
    ProjectExists { path: PathBuf },

    /// Rollback failed (best-effort cleanup failed).
    #[error("Rollback failed for {path}: {reason}")]
    RollbackFailed { path: PathBuf, reason: String },
}

impl ApplicationError {
    /// Get user-actionable suggestions.
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            Self::RepositoryUnavailable { reason } => vec![
                format!("Could not read packs: {}", reason),
                "Check --packs-dir or PACKWEAVE_PACKS_DIR".into(),
            ],
            Self::ArchiveFormat { .. } => vec![
                "The archive may be truncated or written by another tool".into(),
                "Rebuild it with: packweave archive <packs-dir> <output>".into(),
            ],
            Self::FilesystemError { path, .. } => vec![
                format!("Failed to access: {}", path.display()),
                "Check that you have write permissions".into(),
            ],
            Self::StoreLockError => vec!["Try again in a moment".into()],
            Self::ProjectExists { path } => vec![
                format!("Directory already exists: {}", path.display()),
                "Use --force to overwrite (destructive)".into(),
                "Choose a different output directory".into(),
            ],
            _ => vec!["Check the error details above".into()],
        }
    }

    /// Get error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::RepositoryUnavailable { .. } | Self::StoreLockError => ErrorCategory::Internal,
            Self::FilesystemError { .. } | Self::RollbackFailed { .. } => ErrorCategory::Internal,
            Self::ArchiveFormat { .. } => ErrorCategory::Configuration,
            Self::ValidationFailed(_) | Self::ProjectExists { .. } => ErrorCategory::Validation,
        }
    }
}
