//! Unified error handling for packweave-core.
//!
//! Wraps domain and application errors behind one type that carries a
//! display category and user-actionable suggestions.

use thiserror::Error;

use crate::application::ApplicationError;
use crate::domain::DomainError;

/// Root error type for packweave-core operations.
#[derive(Debug, Error, Clone)]
pub enum WeaveError {
    /// Resolution or rendering rule violations.
    #[error("{0}")]
    Domain(#[from] DomainError),

    /// Repository, filesystem or export failures.
    #[error("{0}")]
    Application(#[from] ApplicationError),

    /// Configuration or setup errors.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Unexpected internal errors (bugs).
    #[error("Internal error: {message}. This is a bug, please report it.")]
    Internal { message: String },
}

impl WeaveError {
    /// Get user-actionable suggestions for fixing this error.
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Domain(e) => e.suggestions(),
            Self::Application(e) => e.suggestions(),
            Self::Configuration { message } => vec![
                format!("Configuration issue: {}", message),
                "Run: packweave config to inspect the effective settings".into(),
            ],
            Self::Internal { .. } => vec!["This appears to be a bug in packweave".into()],
        }
    }

    /// Get error category for display/styling purposes.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Domain(e) => match e.category() {
                crate::domain::ErrorCategory::Validation => ErrorCategory::Validation,
                crate::domain::ErrorCategory::Compatibility => ErrorCategory::Compatibility,
                crate::domain::ErrorCategory::NotFound => ErrorCategory::NotFound,
                crate::domain::ErrorCategory::Internal => ErrorCategory::Internal,
            },
            Self::Application(e) => e.category(),
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }

    /// The domain error underneath, if any, with location wrappers removed.
    pub fn domain(&self) -> Option<&DomainError> {
        match self {
            Self::Domain(e) => Some(e.root()),
            _ => None,
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Application(
                ApplicationError::StoreLockError | ApplicationError::RepositoryUnavailable { .. }
            )
        )
    }
}

/// Error categories for UI display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Compatibility,
    NotFound,
    Configuration,
    Internal,
}

/// Convenient result type alias.
pub type WeaveResult<T> = Result<T, WeaveError>;

/// Extension trait for adding context to errors.
pub trait Context<T> {
    /// Add context to an error.
    fn context(self, msg: impl Into<String>) -> WeaveResult<T>;
}

impl<T, E> Context<T> for Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, msg: impl Into<String>) -> WeaveResult<T> {
        self.map_err(|e| WeaveError::Internal {
            message: format!("{}: {}", msg.into(), e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_categories_carry_over() {
        let err = WeaveError::from(DomainError::PackNotFound { id: "a:b".into() });
        assert_eq!(err.category(), ErrorCategory::NotFound);
        assert!(!err.suggestions().is_empty());
        assert!(!err.is_retryable());
    }

    #[test]
    fn located_errors_expose_their_root() {
        let err = WeaveError::from(
            DomainError::MissingProperty { name: "port".into() }.located("a:b", "x.txt"),
        );
        assert!(matches!(err.domain(), Some(DomainError::MissingProperty { .. })));
        assert!(err.to_string().contains("x.txt"));
    }

    #[test]
    fn unavailable_repository_is_retryable() {
        let err = WeaveError::from(ApplicationError::RepositoryUnavailable {
            reason: "timeout".into(),
        });
        assert!(err.is_retryable());
        assert_eq!(err.category(), ErrorCategory::Internal);
    }

    #[test]
    fn context_wraps_foreign_errors() {
        let result: Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::Other, "boom"));
        let err = result.context("reading pack").unwrap_err();
        assert!(matches!(err, WeaveError::Internal { ref message } if message.contains("reading pack: boom")));
    }
}
