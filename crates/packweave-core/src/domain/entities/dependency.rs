//! Build dependencies declared by modules.
//!
//! Packs may name dependencies three ways: a concrete artifact, another
//! module of the generated project, or an alias into the versions catalog.
//! Catalog aliases only exist before resolution; [`ResolvedDependency`] has
//! no such variant, so a resolved project cannot carry one.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::{entities::catalog::VersionsCatalog, error::DomainError};

/// How a dependency is exposed to the module's consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyScope {
    #[default]
    Implementation,
    Api,
    CompileOnly,
    RuntimeOnly,
}

impl DependencyScope {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Implementation => "implementation",
            Self::Api => "api",
            Self::CompileOnly => "compileOnly",
            Self::RuntimeOnly => "runtimeOnly",
        }
    }
}

impl fmt::Display for DependencyScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `group:artifact:version`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Coordinate {
    pub group: String,
    pub artifact: String,
    pub version: String,
}

impl Coordinate {
    /// Parse `group:artifact:version`. All three parts are required.
    pub fn parse_notation(notation: &str) -> Option<Self> {
        let mut parts = notation.split(':');
        let (group, artifact, version) = (parts.next()?, parts.next()?, parts.next()?);
        if parts.next().is_some() || [group, artifact, version].iter().any(|p| p.is_empty()) {
            return None;
        }
        Some(Self {
            group: group.into(),
            artifact: artifact.into(),
            version: version.into(),
        })
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group, self.artifact, self.version)
    }
}

/// A dependency as declared by a pack.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Dependency {
    Artifact {
        group: String,
        artifact: String,
        version: String,
        #[serde(default)]
        scope: DependencyScope,
    },
    Module {
        path: String,
        #[serde(default)]
        scope: DependencyScope,
    },
    /// Library alias resolved against the versions catalog.
    Catalog {
        alias: String,
        #[serde(default)]
        scope: DependencyScope,
    },
    /// Every library of a catalog bundle.
    Bundle {
        bundle: String,
        #[serde(default)]
        scope: DependencyScope,
    },
}

impl Dependency {
    pub fn catalog(alias: impl Into<String>) -> Self {
        Self::Catalog {
            alias: alias.into(),
            scope: DependencyScope::default(),
        }
    }

    pub fn module(path: impl Into<String>) -> Self {
        Self::Module {
            path: path.into(),
            scope: DependencyScope::default(),
        }
    }

    pub fn artifact(coordinate: Coordinate, scope: DependencyScope) -> Self {
        Self::Artifact {
            group: coordinate.group,
            artifact: coordinate.artifact,
            version: coordinate.version,
            scope,
        }
    }

    /// Replace catalog references with concrete artifacts.
    ///
    /// Bundles expand in their declared order.
    pub fn resolve(&self, catalog: &VersionsCatalog) -> Result<Vec<ResolvedDependency>, DomainError> {
        match self {
            Self::Artifact {
                group,
                artifact,
                version,
                scope,
            } => Ok(vec![ResolvedDependency::Artifact {
                coordinate: Coordinate {
                    group: group.clone(),
                    artifact: artifact.clone(),
                    version: version.clone(),
                },
                scope: *scope,
            }]),
            Self::Module { path, scope } => Ok(vec![ResolvedDependency::Module {
                path: path.clone(),
                scope: *scope,
            }]),
            Self::Catalog { alias, scope } => Ok(vec![ResolvedDependency::Artifact {
                coordinate: catalog.library(alias)?,
                scope: *scope,
            }]),
            Self::Bundle { bundle, scope } => catalog
                .bundle(bundle)?
                .iter()
                .map(|alias| {
                    Ok(ResolvedDependency::Artifact {
                        coordinate: catalog.library(alias)?,
                        scope: *scope,
                    })
                })
                .collect(),
        }
    }
}

/// A dependency after catalog resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResolvedDependency {
    Artifact {
        coordinate: Coordinate,
        scope: DependencyScope,
    },
    Module {
        path: String,
        scope: DependencyScope,
    },
}

impl ResolvedDependency {
    pub fn scope(&self) -> DependencyScope {
        match self {
            Self::Artifact { scope, .. } | Self::Module { scope, .. } => *scope,
        }
    }

    /// Notation as it appears in a build script: `g:a:v` or `:path`.
    pub fn notation(&self) -> String {
        match self {
            Self::Artifact { coordinate, .. } => coordinate.to_string(),
            Self::Module { path, .. } => format!(":{}", path.replace('/', ":")),
        }
    }
}

/// Main and test dependency lists of one source set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencySet<D> {
    #[serde(default = "Vec::new", skip_serializing_if = "Vec::is_empty")]
    pub main: Vec<D>,
    #[serde(default = "Vec::new", skip_serializing_if = "Vec::is_empty")]
    pub test: Vec<D>,
}

impl<D> Default for DependencySet<D> {
    fn default() -> Self {
        Self {
            main: Vec::new(),
            test: Vec::new(),
        }
    }
}

impl<D> DependencySet<D> {
    pub fn is_empty(&self) -> bool {
        self.main.is_empty() && self.test.is_empty()
    }

    /// Append another set, keeping first occurrences.
    pub fn extend(&mut self, other: DependencySet<D>)
    where
        D: PartialEq,
    {
        for dep in other.main {
            if !self.main.contains(&dep) {
                self.main.push(dep);
            }
        }
        for dep in other.test {
            if !self.test.contains(&dep) {
                self.test.push(dep);
            }
        }
    }
}
