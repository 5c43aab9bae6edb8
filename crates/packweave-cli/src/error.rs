//! Error handling for the packweave CLI.
//!
//! Provides structured errors with:
//! - User-friendly messages
//! - Actionable suggestions
//! - Exit code mapping

use std::error::Error;
use std::path::PathBuf;

use owo_colors::OwoColorize;
use thiserror::Error;

use packweave_core::error::WeaveError;

// Re-export so callers only need `use crate::error::*`.
pub use packweave_core::error::ErrorCategory as CoreCategory;

/// Result type alias for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

/// CLI error types.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input.
    #[error("Invalid input: {message}")]
    InvalidInput {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Project name validation failed.
    #[error("Invalid project name '{name}': {reason}")]
    InvalidProjectName { name: String, reason: String },

    /// `new` was given no packs and the config names none either.
    #[error("No packs selected")]
    NoPacksSelected,

    /// The output file of `archive` exists.
    #[error("File already exists: {path}")]
    FileExists { path: PathBuf },

    // ── Config errors ──────────────────────────────────────────────────────
    /// A configuration file could not be read, parsed, or written.
    #[error("Configuration error: {message}")]
    ConfigError {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // ── Core errors ────────────────────────────────────────────────────────
    /// An error propagated from `packweave-core` or an adapter.
    #[error("{0}")]
    Core(#[from] WeaveError),

    // ── System errors ──────────────────────────────────────────────────────
    /// An I/O operation failed.
    #[error("I/O error: {message}")]
    IoError {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Operation cancelled by user.
    #[error("Operation cancelled")]
    Cancelled,
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::IoError {
            message: err.to_string(),
            source: err,
        }
    }
}

impl CliError {
    /// Get user-actionable suggestions for fixing this error.
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            Self::InvalidInput { message, .. } => vec![
                format!("Check your input: {}", message),
                "Use --help for usage information".into(),
            ],

            Self::InvalidProjectName { name, reason } => vec![
                format!("Project name '{}' is invalid: {}", name, reason),
                "Use letters, digits, hyphens and underscores".into(),
                "Examples: my-project, my_app, project123".into(),
            ],

            Self::NoPacksSelected => vec![
                "Pass one or more packs: --pack group:name".into(),
                "Or set defaults.packs in your config file".into(),
                "See what is available: packweave list".into(),
            ],

            Self::FileExists { path } => vec![
                format!("'{}' would be overwritten", path.display()),
                "Use --force to overwrite it".into(),
            ],

            Self::ConfigError { message, .. } => vec![
                format!("Configuration issue: {}", message),
                "Inspect the active settings: packweave config list".into(),
                "Create a default config: packweave init".into(),
            ],

            Self::Core(core_err) => core_err.suggestions(),

            Self::IoError { message, .. } => vec![
                format!("I/O operation failed: {}", message),
                "Check file permissions".into(),
                "Ensure the parent directory exists".into(),
            ],

            Self::Cancelled => vec![
                "Operation was cancelled".into(),
                "No changes were made".into(),
            ],
        }
    }

    /// Get the error category for styling and exit codes.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidInput { .. }
            | Self::InvalidProjectName { .. }
            | Self::NoPacksSelected
            | Self::FileExists { .. }
            | Self::Cancelled => ErrorCategory::UserError,
            Self::ConfigError { .. } => ErrorCategory::Configuration,
            Self::Core(core) => match core.category() {
                CoreCategory::Validation | CoreCategory::Compatibility => ErrorCategory::UserError,
                CoreCategory::NotFound => ErrorCategory::NotFound,
                CoreCategory::Configuration => ErrorCategory::Configuration,
                CoreCategory::Internal => ErrorCategory::Internal,
            },
            Self::IoError { .. } => ErrorCategory::Internal,
        }
    }

    /// Exit code to pass to the OS.
    ///
    /// | Category      | Code |
    /// |---------------|------|
    /// | User error    |  2   |
    /// | Not found     |  3   |
    /// | Configuration |  4   |
    /// | Internal      |  1   |
    pub fn exit_code(&self) -> u8 {
        match self.category() {
            ErrorCategory::UserError => 2,
            ErrorCategory::NotFound => 3,
            ErrorCategory::Configuration => 4,
            ErrorCategory::Internal => 1,
        }
    }

    /// Format the error for a terminal: colors, cause chain when
    /// `verbose`, suggestions.
    pub fn format_colored(&self, verbose: bool) -> String {
        self.render(verbose, |part, text| match part {
            Part::Heading => format!("{} {}", "\u{2717}".red().bold(), text.red().bold()),
            Part::Message => text.red().to_string(),
            Part::Cause => format!("{} {}", "\u{2192}".dimmed(), text.dimmed()),
            Part::Section => text.yellow().bold().to_string(),
            Part::Hint => format!("{} {}", "\u{2139}".blue(), text.dimmed()),
        })
    }

    /// Plain-text version of [`Self::format_colored`], without ANSI codes.
    pub fn format_plain(&self, verbose: bool) -> String {
        self.render(verbose, |part, text| match part {
            Part::Cause => format!("Caused by: {text}"),
            _ => text.to_string(),
        })
    }

    fn render(&self, verbose: bool, paint: impl Fn(Part, &str) -> String) -> String {
        let mut lines = vec![
            String::new(),
            paint(Part::Heading, "Error:"),
            format!("  {}", paint(Part::Message, &self.to_string())),
        ];

        if verbose {
            let mut source = self.source();
            while let Some(err) = source {
                lines.push(format!("  {}", paint(Part::Cause, &err.to_string())));
                source = err.source();
            }
        }

        let suggestions = self.suggestions();
        if !suggestions.is_empty() {
            lines.push(String::new());
            lines.push(paint(Part::Section, "Suggestions:"));
            lines.extend(suggestions.iter().map(|s| format!("  {s}")));
        }

        if !verbose {
            lines.push(String::new());
            lines.push(paint(Part::Hint, "Use -v / --verbose for more details."));
        }

        lines.push(String::new());
        lines.join("\n")
    }

    /// Log the error using tracing.
    pub fn log(&self) {
        match self.category() {
            ErrorCategory::UserError => tracing::warn!("User error: {}", self),
            ErrorCategory::NotFound => tracing::warn!("Not found: {}", self),
            ErrorCategory::Configuration => tracing::error!("Configuration error: {}", self),
            ErrorCategory::Internal => tracing::error!("Internal error: {}", self),
        }

        if let Some(source) = self.source() {
            tracing::debug!("Caused by: {}", source);
        }
    }
}

/// Pieces of a rendered error message.
#[derive(Clone, Copy)]
enum Part {
    Heading,
    Message,
    Cause,
    Section,
    Hint,
}

/// Error categories for classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// User input error (validation, invalid arguments).
    UserError,
    /// Resource not found.
    NotFound,
    /// Configuration error.
    Configuration,
    /// Internal/system error.
    Internal,
}

// ── IntoCli trait ─────────────────────────────────────────────────────────────

/// Extension trait to convert foreign error types into [`CliError`] at
/// call-sites with a descriptive context message.
pub trait IntoCli<T> {
    /// Convert to `CliResult` attaching a human-readable context message.
    fn with_cli_context<F, S>(self, f: F) -> CliResult<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T> IntoCli<T> for Result<T, std::io::Error> {
    fn with_cli_context<F, S>(self, f: F) -> CliResult<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| CliError::IoError {
            message: f().into(),
            source: e,
        })
    }
}

impl<T> IntoCli<T> for Result<T, anyhow::Error> {
    fn with_cli_context<F, S>(self, f: F) -> CliResult<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| CliError::ConfigError {
            message: format!("{}: {e:#}", f().into()),
            source: Some(e.into()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use packweave_core::{application::ApplicationError, domain::DomainError};
    use std::io;

    // ── suggestions ───────────────────────────────────────────────────────

    #[test]
    fn no_packs_suggests_list() {
        let err = CliError::NoPacksSelected;
        assert!(err.suggestions().iter().any(|s| s.contains("packweave list")));
    }

    #[test]
    fn project_exists_suggests_force() {
        let err = CliError::Core(
            ApplicationError::ProjectExists {
                path: PathBuf::from("/tmp/test"),
            }
            .into(),
        );
        assert!(err.suggestions().iter().any(|s| s.contains("--force")));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn invalid_name_suggestions_non_empty() {
        let err = CliError::InvalidProjectName {
            name: ".hidden".into(),
            reason: "starts with '.'".into(),
        };
        assert!(!err.suggestions().is_empty());
    }

    // ── exit codes ────────────────────────────────────────────────────────

    #[test]
    fn exit_code_user_error() {
        assert_eq!(
            CliError::InvalidInput {
                message: "x".into(),
                source: None
            }
            .exit_code(),
            2
        );
    }

    #[test]
    fn exit_code_not_found() {
        let err = CliError::Core(DomainError::PackNotFound { id: "a:b".into() }.into());
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn exit_code_configuration() {
        assert_eq!(
            CliError::ConfigError {
                message: "x".into(),
                source: None
            }
            .exit_code(),
            4
        );
        let archive = CliError::Core(ApplicationError::ArchiveFormat { reason: "x".into() }.into());
        assert_eq!(archive.exit_code(), 4);
    }

    #[test]
    fn exit_code_internal() {
        assert_eq!(
            CliError::IoError {
                message: "x".into(),
                source: io::Error::new(io::ErrorKind::Other, "e"),
            }
            .exit_code(),
            1
        );
    }

    // ── format ────────────────────────────────────────────────────────────

    #[test]
    fn format_plain_contains_error_header() {
        let err = CliError::FileExists {
            path: PathBuf::from("/tmp/x"),
        };
        let s = err.format_plain(false);
        assert!(s.contains("Error:"));
        assert!(s.contains("Suggestions:"));
    }

    #[test]
    fn format_plain_verbose_omits_hint_and_shows_cause() {
        let err = CliError::IoError {
            message: "writing".into(),
            source: io::Error::new(io::ErrorKind::Other, "disk full"),
        };
        let s = err.format_plain(true);
        assert!(!s.contains("--verbose"));
        assert!(s.contains("Caused by: disk full"));
    }

    // ── IntoCli ───────────────────────────────────────────────────────────

    #[test]
    fn into_cli_io_error() {
        let result: Result<(), io::Error> = Err(io::Error::new(io::ErrorKind::NotFound, "missing"));
        let cli: CliResult<()> = result.with_cli_context(|| "reading config");
        assert!(matches!(cli, Err(CliError::IoError { .. })));
    }

    #[test]
    fn into_cli_anyhow_error_is_config() {
        let result: Result<(), anyhow::Error> = Err(anyhow::anyhow!("bad toml"));
        let cli = result.with_cli_context(|| "loading config").unwrap_err();
        assert_eq!(cli.exit_code(), 4);
        assert!(cli.to_string().contains("bad toml"));
    }
}
