//! Versions catalog: alias → artifact coordinate.
//!
//! The shape follows the Gradle version-catalog TOML layout, so an existing
//! `libs.versions.toml` deserializes without translation:
//!
//! ```toml
//! [versions]
//! ktor = "2.3.12"
//!
//! [libraries]
//! foo = "org.lib:foo:1.2.3"
//! ktor-core = { module = "io.ktor:ktor-server-core", version.ref = "ktor" }
//!
//! [bundles]
//! ktor = ["ktor-core"]
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{entities::dependency::Coordinate, error::DomainError};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VersionsCatalog {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub versions: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub libraries: BTreeMap<String, LibrarySpec>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub bundles: BTreeMap<String, Vec<String>>,
}

/// One `[libraries]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LibrarySpec {
    /// `"group:artifact:version"`
    Notation(String),
    /// `{ module = "group:artifact", version = ... }`
    Module { module: String, version: VersionSpec },
    /// `{ group = "...", name = "...", version = ... }`
    Coordinates {
        group: String,
        name: String,
        version: VersionSpec,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VersionSpec {
    Literal(String),
    Ref {
        #[serde(rename = "ref")]
        reference: String,
    },
}

impl VersionsCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a library from its `group:artifact:version` notation.
    pub fn with_library(mut self, alias: impl Into<String>, notation: impl Into<String>) -> Self {
        self.libraries
            .insert(alias.into(), LibrarySpec::Notation(notation.into()));
        self
    }

    pub fn with_version(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.versions.insert(name.into(), version.into());
        self
    }

    pub fn with_bundle(mut self, name: impl Into<String>, aliases: Vec<String>) -> Self {
        self.bundles.insert(name.into(), aliases);
        self
    }

    /// Exact-match alias lookup.
    ///
    /// # Errors
    ///
    /// - `UnresolvedCatalogAlias` if the alias is not declared or its
    ///   notation is malformed
    /// - `UnresolvedCatalogVersion` if a `version.ref` names no version
    pub fn library(&self, alias: &str) -> Result<Coordinate, DomainError> {
        let missing = || DomainError::UnresolvedCatalogAlias {
            alias: alias.to_string(),
        };
        let spec = self.libraries.get(alias).ok_or_else(missing)?;

        match spec {
            LibrarySpec::Notation(notation) => Coordinate::parse_notation(notation).ok_or_else(missing),
            LibrarySpec::Module { module, version } => {
                let (group, artifact) = module.split_once(':').ok_or_else(missing)?;
                Ok(Coordinate {
                    group: group.to_string(),
                    artifact: artifact.to_string(),
                    version: self.version(alias, version)?,
                })
            }
            LibrarySpec::Coordinates {
                group,
                name,
                version,
            } => Ok(Coordinate {
                group: group.clone(),
                artifact: name.clone(),
                version: self.version(alias, version)?,
            }),
        }
    }

    /// Aliases of a bundle, in declared order.
    pub fn bundle(&self, name: &str) -> Result<&[String], DomainError> {
        self.bundles
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| DomainError::UnresolvedCatalogAlias {
                alias: format!("bundles.{name}"),
            })
    }

    fn version(&self, alias: &str, spec: &VersionSpec) -> Result<String, DomainError> {
        match spec {
            VersionSpec::Literal(v) => Ok(v.clone()),
            VersionSpec::Ref { reference } => self.versions.get(reference).cloned().ok_or_else(|| {
                DomainError::UnresolvedCatalogVersion {
                    alias: alias.to_string(),
                    version: reference.clone(),
                }
            }),
        }
    }
}
