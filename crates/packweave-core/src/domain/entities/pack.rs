//! Pack identity and descriptors.
//!
//! A [`PackDescriptor`] is the unit of composition: a versioned bundle of
//! modules, sources and slot contributions that other packs may require.
//! Descriptors are loaded once per request and never mutated afterwards.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::{
    entities::{module::SourceModule, source::Source},
    error::DomainError,
    value_objects::{PropertyType, Value},
};

// ============================================================================
// PackId
// ============================================================================

/// Unique key of a pack within one repository.
///
/// Text form is `group:name` (e.g. `org.packweave:kotlin-jvm`). Ordering is
/// structural: group first, then name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PackId {
    group: String,
    name: String,
}

impl PackId {
    pub fn new(group: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
        }
    }

    /// Parse from `group:name`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPackId` when either half is missing or the name
    /// contains another `:`.
    pub fn parse(s: &str) -> Result<Self, DomainError> {
        let (group, name) = s
            .split_once(':')
            .ok_or_else(|| DomainError::InvalidPackId(s.to_string()))?;
        let (group, name) = (group.trim(), name.trim());
        if group.is_empty() || name.is_empty() || name.contains(':') {
            return Err(DomainError::InvalidPackId(s.to_string()));
        }
        Ok(Self::new(group, name))
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for PackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group, self.name)
    }
}

impl FromStr for PackId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PackId {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<PackId> for String {
    fn from(id: PackId) -> Self {
        id.to_string()
    }
}

// ============================================================================
// Property schema
// ============================================================================

/// One entry of a pack's property schema.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PropertyDecl {
    #[serde(rename = "type", default)]
    pub kind: PropertyType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl PropertyDecl {
    pub fn new(kind: PropertyType) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Human-facing metadata about a pack.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PackMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

// ============================================================================
// PackDescriptor
// ============================================================================

/// An immutable, versioned pack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackDescriptor {
    pub id: PackId,
    /// Display name shown in `packweave list`.
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Pack-level requirements in declaration order, without duplicates.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<PackId>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, PropertyDecl>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modules: Vec<SourceModule>,
    /// Pack-level sources: root-module files and slot contributions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<Source>,
    #[serde(default)]
    pub metadata: PackMetadata,
}

impl PackDescriptor {
    pub fn builder(id: PackId) -> PackBuilder {
        PackBuilder::new(id)
    }

    /// Every source of the pack: pack-level first, then module sources in
    /// declaration order.
    pub fn all_sources(&self) -> impl Iterator<Item = &Source> {
        self.sources
            .iter()
            .chain(self.modules.iter().flat_map(|m| m.sources.iter()))
    }

    /// Check structural rules that serde cannot express.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.version.trim().is_empty() {
            return Err(DomainError::InvalidPack(format!(
                "pack '{}' has no version",
                self.id
            )));
        }
        if self.requires.contains(&self.id) {
            return Err(DomainError::CyclicDependency {
                path: vec![self.id.to_string(), self.id.to_string()],
            });
        }
        for (name, decl) in &self.properties {
            let Some(default) = &decl.default else {
                continue;
            };
            if !default.conforms_to(decl.kind) {
                return Err(DomainError::TypeMismatch {
                    name: name.clone(),
                    expected: decl.kind.to_string(),
                    found: default.type_name().to_string(),
                });
            }
        }
        for source in self.all_sources() {
            source.validate()?;
        }
        Ok(())
    }
}

/// Builder for [`PackDescriptor`].
///
/// `name` defaults to the pack id's name and `version` to `0.0.0`.
#[derive(Debug, Clone)]
pub struct PackBuilder {
    id: PackId,
    name: Option<String>,
    version: String,
    description: String,
    requires: Vec<PackId>,
    properties: BTreeMap<String, PropertyDecl>,
    modules: Vec<SourceModule>,
    sources: Vec<Source>,
    metadata: PackMetadata,
}

impl PackBuilder {
    fn new(id: PackId) -> Self {
        Self {
            id,
            name: None,
            version: "0.0.0".into(),
            description: String::new(),
            requires: Vec::new(),
            properties: BTreeMap::new(),
            modules: Vec::new(),
            sources: Vec::new(),
            metadata: PackMetadata::default(),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Add a requirement. Repeats are ignored.
    pub fn requires(mut self, id: PackId) -> Self {
        if !self.requires.contains(&id) {
            self.requires.push(id);
        }
        self
    }

    pub fn property(mut self, name: impl Into<String>, decl: PropertyDecl) -> Self {
        self.properties.insert(name.into(), decl);
        self
    }

    pub fn module(mut self, module: SourceModule) -> Self {
        self.modules.push(module);
        self
    }

    pub fn source(mut self, source: Source) -> Self {
        self.sources.push(source);
        self
    }

    pub fn metadata(mut self, metadata: PackMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Consume the builder.
    ///
    /// # Errors
    ///
    /// Anything [`PackDescriptor::validate`] rejects.
    pub fn build(self) -> Result<PackDescriptor, DomainError> {
        let pack = PackDescriptor {
            name: self.name.unwrap_or_else(|| self.id.name().to_string()),
            id: self.id,
            version: self.version,
            description: self.description,
            requires: self.requires,
            properties: self.properties,
            modules: self.modules,
            sources: self.sources,
            metadata: self.metadata,
        };
        pack.validate()?;
        Ok(pack)
    }
}
