// ============================================================================
// domain/error.rs - RESOLUTION AND RENDERING ERRORS
// ============================================================================

use thiserror::Error;

/// Root domain error type.
///
/// All errors are:
/// - Cloneable (so a cached failure can be reported twice)
/// - Categorizable (for CLI display)
/// - Actionable (provides suggestions)
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    // ========================================================================
    // Graph resolution
    // ========================================================================
    #[error("pack '{id}' not found in repository")]
    PackNotFound { id: String },

    #[error("cyclic pack dependency: {}", path.join(" -> "))]
    CyclicDependency { path: Vec<String> },

    #[error("module '{path}' declared as both {first} and {second}")]
    ModuleKindConflict {
        path: String,
        first: String,
        second: String,
    },

    #[error("catalog alias '{alias}' is not defined")]
    UnresolvedCatalogAlias { alias: String },

    #[error("catalog library '{alias}' refers to unknown version '{version}'")]
    UnresolvedCatalogVersion { alias: String, version: String },

    // ========================================================================
    // Rendering
    // ========================================================================
    #[error("template syntax error at offset {position}: {reason}")]
    TemplateSyntaxError { position: usize, reason: String },

    #[error("property '{name}' is required but has no value")]
    MissingProperty { name: String },

    #[error("slot cycle detected: {}", chain.join(" -> "))]
    SlotCycleDetected { chain: Vec<String> },

    #[error("output path '{path}' is produced by both '{first}' and '{second}'")]
    TargetPathConflict {
        path: String,
        first: String,
        second: String,
    },

    // ========================================================================
    // Values and identifiers
    // ========================================================================
    #[error("invalid value '{value}' for property '{name}': expected {expected}")]
    InvalidPropertyValue {
        name: String,
        value: String,
        expected: String,
    },

    #[error("property '{name}' is a {found}, expected {expected}")]
    TypeMismatch {
        name: String,
        expected: String,
        found: String,
    },

    #[error("invalid pack id '{0}': expected 'group:name'")]
    InvalidPackId(String),

    #[error("invalid slot address '{0}': expected 'slot://group:name/slot'")]
    InvalidSlotAddress(String),

    #[error("invalid pack: {0}")]
    InvalidPack(String),

    #[error("Absolute paths not allowed: {path}")]
    AbsolutePathNotAllowed { path: String },

    /// Wraps a rendering failure with the pack and file it came from.
    #[error("{error} (pack '{pack}', file '{path}')")]
    Located {
        pack: String,
        path: String,
        error: Box<DomainError>,
    },
}

impl DomainError {
    /// Attach the offending pack and path to an error.
    pub fn located(self, pack: impl Into<String>, path: impl Into<String>) -> Self {
        match self {
            // Keep the innermost location; it is the most precise one.
            located @ Self::Located { .. } => located,
            other => Self::Located {
                pack: pack.into(),
                path: path.into(),
                error: Box::new(other),
            },
        }
    }

    /// The error without any location wrapper.
    pub fn root(&self) -> &DomainError {
        match self {
            Self::Located { error, .. } => error.root(),
            other => other,
        }
    }

    /// Get user-actionable suggestions for fixing this error.
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            Self::PackNotFound { id } => vec![
                format!("No pack with id '{}' is available", id),
                "Try: packweave list to see available packs".into(),
                "Check --packs-dir or PACKWEAVE_PACKS_DIR".into(),
            ],
            Self::CyclicDependency { path } => vec![
                "Packs must not require each other in a loop".into(),
                format!("Break the cycle: {}", path.join(" -> ")),
            ],
            Self::ModuleKindConflict { path, .. } => vec![
                format!(
                    "Two packs disagree about the kind of module '{}'",
                    if path.is_empty() { "<root>" } else { path }
                ),
                "Drop the kind from one of the packs or select compatible packs".into(),
            ],
            Self::UnresolvedCatalogAlias { alias } => vec![
                format!("Add '{}' to the [libraries] table of versions.toml", alias),
            ],
            Self::UnresolvedCatalogVersion { version, .. } => vec![
                format!("Add '{}' to the [versions] table of versions.toml", version),
            ],
            Self::MissingProperty { name } => vec![
                format!("Pass a value with -D {}=<value>", name),
                format!("Or declare a default for '{}' in the pack", name),
            ],
            Self::TargetPathConflict { first, second, .. } => vec![
                format!("Packs '{}' and '{}' both write the same file", first, second),
                "Turn one of them into a slot contribution".into(),
            ],
            Self::InvalidPropertyValue { name, expected, .. } => {
                vec![format!("Property '{}' takes a {}", name, expected)]
            }
            Self::InvalidPackId(_) => vec!["Pack ids look like 'org.example:kotlin-jvm'".into()],
            Self::Located { error, .. } => error.suggestions(),
            _ => vec!["See documentation for more details".into()],
        }
    }

    /// Error category for CLI display styling.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::PackNotFound { .. } | Self::UnresolvedCatalogAlias { .. } => {
                ErrorCategory::NotFound
            }
            Self::UnresolvedCatalogVersion { .. } => ErrorCategory::NotFound,
            Self::CyclicDependency { .. }
            | Self::ModuleKindConflict { .. }
            | Self::TargetPathConflict { .. }
            | Self::SlotCycleDetected { .. } => ErrorCategory::Compatibility,
            Self::Located { error, .. } => error.category(),
            _ => ErrorCategory::Validation,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Compatibility,
    NotFound,
    Internal,
}
