//! Sources, their targets, and slot addresses.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::{entities::pack::PackId, error::DomainError};

const SLOT_SCHEME: &str = "slot://";

// ============================================================================
// SlotAddress
// ============================================================================

/// Logical coordinate of a slot: `slot://<group>:<name>/<slot>`.
///
/// Slot names are scoped to the pack whose template declares them, so two
/// packs may both declare a `dependencies` slot without colliding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotAddress {
    pack: PackId,
    slot: String,
}

impl SlotAddress {
    pub fn new(pack: PackId, slot: impl Into<String>) -> Self {
        Self {
            pack,
            slot: slot.into(),
        }
    }

    pub fn parse(s: &str) -> Result<Self, DomainError> {
        let invalid = || DomainError::InvalidSlotAddress(s.to_string());
        let rest = s.strip_prefix(SLOT_SCHEME).ok_or_else(invalid)?;
        let (pack, slot) = rest.rsplit_once('/').ok_or_else(invalid)?;
        if slot.is_empty() {
            return Err(invalid());
        }
        let pack = PackId::parse(pack).map_err(|_| invalid())?;
        Ok(Self::new(pack, slot))
    }

    pub fn pack(&self) -> &PackId {
        &self.pack
    }

    pub fn slot(&self) -> &str {
        &self.slot
    }
}

impl fmt::Display for SlotAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SLOT_SCHEME}{}/{}", self.pack, self.slot)
    }
}

impl FromStr for SlotAddress {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// ============================================================================
// SourceTarget
// ============================================================================

/// Where a source's content goes.
///
/// Serialized as a single string: slot addresses keep their `slot://`
/// scheme, anything else is a file path relative to the owning module.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SourceTarget {
    /// Relative file path. May contain `{{ }}` segments.
    File(String),
    Slot(SlotAddress),
}

impl SourceTarget {
    pub fn file(path: impl Into<String>) -> Self {
        Self::File(path.into())
    }

    pub fn slot(pack: PackId, slot: impl Into<String>) -> Self {
        Self::Slot(SlotAddress::new(pack, slot))
    }

    pub fn parse(s: &str) -> Result<Self, DomainError> {
        if s.starts_with(SLOT_SCHEME) {
            return SlotAddress::parse(s).map(Self::Slot);
        }
        let path = s.replace('\\', "/");
        validate_relative(&path)?;
        Ok(Self::File(path))
    }

    pub fn as_file(&self) -> Option<&str> {
        match self {
            Self::File(path) => Some(path),
            Self::Slot(_) => None,
        }
    }

    pub fn as_slot(&self) -> Option<&SlotAddress> {
        match self {
            Self::File(_) => None,
            Self::Slot(address) => Some(address),
        }
    }
}

impl fmt::Display for SourceTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => f.write_str(path),
            Self::Slot(address) => address.fmt(f),
        }
    }
}

impl TryFrom<String> for SourceTarget {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<SourceTarget> for String {
    fn from(target: SourceTarget) -> Self {
        target.to_string()
    }
}

/// Reject absolute paths and `..` segments.
pub fn validate_relative(path: &str) -> Result<(), DomainError> {
    let has_drive = path.len() >= 2 && path.as_bytes()[1] == b':';
    if path.starts_with('/') || has_drive {
        return Err(DomainError::AbsolutePathNotAllowed {
            path: path.to_string(),
        });
    }
    if path.split('/').any(|segment| segment == "..") {
        return Err(DomainError::InvalidPack(format!(
            "path '{path}' escapes the project root"
        )));
    }
    Ok(())
}

// ============================================================================
// Source
// ============================================================================

/// Template dialect of a source body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// `{{ }}` delimiters.
    #[default]
    Marker,
    /// Declarative `Pack.*` calls embedded in host-language source.
    Host,
}

impl EngineKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Marker => "marker",
            Self::Host => "host",
        }
    }
}

impl FromStr for EngineKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "marker" => Ok(Self::Marker),
            "host" | "kotlin" => Ok(Self::Host),
            other => Err(DomainError::InvalidPack(format!(
                "unknown template engine '{other}'; expected marker or host"
            ))),
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One piece of content contributed by a pack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Source {
    /// Copied verbatim.
    Static {
        target: SourceTarget,
        #[serde(with = "bytes_base64")]
        bytes: Vec<u8>,
        #[serde(default, skip_serializing_if = "is_false")]
        executable: bool,
    },
    /// Rendered before export.
    Template {
        target: SourceTarget,
        body: String,
        #[serde(default)]
        engine: EngineKind,
        #[serde(default, skip_serializing_if = "is_false")]
        executable: bool,
    },
}

impl Source {
    pub fn static_file(path: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self::Static {
            target: SourceTarget::file(path),
            bytes: bytes.into(),
            executable: false,
        }
    }

    pub fn template(target: SourceTarget, body: impl Into<String>, engine: EngineKind) -> Self {
        Self::Template {
            target,
            body: body.into(),
            engine,
            executable: false,
        }
    }

    /// Shorthand for a marker-engine file template.
    pub fn marker_file(path: impl Into<String>, body: impl Into<String>) -> Self {
        Self::template(SourceTarget::file(path), body, EngineKind::Marker)
    }

    pub fn executable(mut self) -> Self {
        match &mut self {
            Self::Static { executable, .. } | Self::Template { executable, .. } => {
                *executable = true
            }
        }
        self
    }

    pub fn target(&self) -> &SourceTarget {
        match self {
            Self::Static { target, .. } | Self::Template { target, .. } => target,
        }
    }

    pub fn target_mut(&mut self) -> &mut SourceTarget {
        match self {
            Self::Static { target, .. } | Self::Template { target, .. } => target,
        }
    }

    pub fn is_executable(&self) -> bool {
        match self {
            Self::Static { executable, .. } | Self::Template { executable, .. } => *executable,
        }
    }

    pub fn is_slot_contribution(&self) -> bool {
        matches!(self.target(), SourceTarget::Slot(_))
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        match self.target() {
            SourceTarget::File(path) => validate_relative(path),
            SourceTarget::Slot(_) => Ok(()),
        }
    }
}

fn is_false(b: &bool) -> bool {
    !*b
}

mod bytes_base64 {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded.as_bytes()).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_address_parses_and_displays() {
        let address = SlotAddress::parse("slot://org.packweave:kotlin-jvm/dependencies").unwrap();
        assert_eq!(address.pack(), &PackId::new("org.packweave", "kotlin-jvm"));
        assert_eq!(address.slot(), "dependencies");
        assert_eq!(
            address.to_string(),
            "slot://org.packweave:kotlin-jvm/dependencies"
        );
    }

    #[test]
    fn slot_address_rejects_missing_parts() {
        for bad in ["slot://a:b", "slot://a:b/", "slot://nocolon/x", "file://a:b/x"] {
            assert!(
                matches!(SlotAddress::parse(bad), Err(DomainError::InvalidSlotAddress(_))),
                "accepted {bad}"
            );
        }
    }

    #[test]
    fn target_distinguishes_slots_from_files() {
        assert!(matches!(
            SourceTarget::parse("slot://a:b/plugins").unwrap(),
            SourceTarget::Slot(_)
        ));
        assert_eq!(
            SourceTarget::parse("src\\Main.kt").unwrap(),
            SourceTarget::file("src/Main.kt")
        );
    }

    #[test]
    fn target_rejects_escaping_paths() {
        assert!(matches!(
            SourceTarget::parse("/etc/passwd"),
            Err(DomainError::AbsolutePathNotAllowed { .. })
        ));
        assert!(SourceTarget::parse("src/../../x").is_err());
    }

    #[test]
    fn static_source_serializes_bytes_as_base64() {
        let source = Source::static_file("gradlew", vec![0u8, 159, 146, 150]).executable();
        let json = serde_json::to_string(&source).unwrap();
        assert!(json.contains("\"kind\":\"static\""));
        assert!(json.contains("AJ+Slg=="));
        let back: Source = serde_json::from_str(&json).unwrap();
        assert_eq!(back, source);
    }
}
