//! Modules: logical compilation units of the generated project.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::{
    entities::{dependency::{Dependency, DependencySet}, source::Source},
    error::DomainError,
};

// ── ModuleKind ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleKind {
    Application,
    Library,
}

impl ModuleKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Application => "application",
            Self::Library => "library",
        }
    }
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModuleKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "application" | "app" => Ok(Self::Application),
            "library" | "lib" => Ok(Self::Library),
            other => Err(DomainError::InvalidPack(format!(
                "unknown module kind '{other}'; expected application or library"
            ))),
        }
    }
}

// ── Platform ─────────────────────────────────────────────────────────────────

/// A compilation target of a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Jvm,
    Android,
    Ios,
    Js,
    Wasm,
    Linux,
    Macos,
    Windows,
}

impl Platform {
    pub const ALL: [Platform; 8] = [
        Self::Jvm,
        Self::Android,
        Self::Ios,
        Self::Js,
        Self::Wasm,
        Self::Linux,
        Self::Macos,
        Self::Windows,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Jvm => "jvm",
            Self::Android => "android",
            Self::Ios => "ios",
            Self::Js => "js",
            Self::Wasm => "wasm",
            Self::Linux => "linux",
            Self::Macos => "macos",
            Self::Windows => "windows",
        }
    }

    /// Prefix of the platform's Kotlin source sets (`jvmMain`, `wasmJsTest`).
    pub const fn source_set(&self) -> &'static str {
        match self {
            Self::Jvm => "jvm",
            Self::Android => "android",
            Self::Ios => "ios",
            Self::Js => "js",
            Self::Wasm => "wasmJs",
            Self::Linux => "linuxX64",
            Self::Macos => "macosArm64",
            Self::Windows => "mingwX64",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == lower)
            .ok_or_else(|| DomainError::InvalidPack(format!("unknown platform '{s}'")))
    }
}

// ── SourceSetKey ─────────────────────────────────────────────────────────────

/// Key of a per-platform dependency list: `common` or a platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SourceSetKey {
    Common,
    Platform(Platform),
}

impl SourceSetKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Common => "common",
            Self::Platform(p) => p.as_str(),
        }
    }
}

impl fmt::Display for SourceSetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for SourceSetKey {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        if s.eq_ignore_ascii_case("common") {
            Ok(Self::Common)
        } else {
            s.parse().map(Self::Platform)
        }
    }
}

impl From<SourceSetKey> for String {
    fn from(key: SourceSetKey) -> Self {
        key.as_str().to_string()
    }
}

// ── SourceModule ─────────────────────────────────────────────────────────────

/// A module as contributed by one pack.
///
/// `kind` is optional: a pack that only adds files to a module need not
/// restate whether it is an application or a library.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SourceModule {
    /// `""` is the root module.
    #[serde(default)]
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ModuleKind>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub platforms: BTreeSet<Platform>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dependencies: BTreeMap<SourceSetKey, DependencySet<Dependency>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<Source>,
}

impl SourceModule {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn root() -> Self {
        Self::default()
    }

    pub fn kind(mut self, kind: ModuleKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn platform(mut self, platform: Platform) -> Self {
        self.platforms.insert(platform);
        self
    }

    pub fn dependency(mut self, key: SourceSetKey, dependency: Dependency) -> Self {
        self.dependencies.entry(key).or_default().main.push(dependency);
        self
    }

    pub fn test_dependency(mut self, key: SourceSetKey, dependency: Dependency) -> Self {
        self.dependencies.entry(key).or_default().test.push(dependency);
        self
    }

    pub fn source(mut self, source: Source) -> Self {
        self.sources.push(source);
        self
    }

    pub fn is_root(&self) -> bool {
        self.path.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_set_keys_serialize_as_map_keys() {
        let module = SourceModule::new("shared")
            .platform(Platform::Jvm)
            .dependency(SourceSetKey::Common, Dependency::catalog("foo"))
            .test_dependency(SourceSetKey::Platform(Platform::Jvm), Dependency::catalog("junit"));
        let json = serde_json::to_value(&module).unwrap();
        assert!(json["dependencies"]["common"]["main"].is_array());
        assert!(json["dependencies"]["jvm"]["test"].is_array());

        let back: SourceModule = serde_json::from_value(json).unwrap();
        assert_eq!(back, module);
    }

    #[test]
    fn platform_parsing_is_case_insensitive() {
        assert_eq!("JVM".parse::<Platform>().unwrap(), Platform::Jvm);
        assert!("symbian".parse::<Platform>().is_err());
        assert_eq!(Platform::Wasm.source_set(), "wasmJs");
    }
}
