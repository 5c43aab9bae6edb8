//! Property values, their declared types, and the environments that hold them.
//!
//! # Design
//!
//! Values are plain data: equality is structural and there is no identity.
//! Raw strings from the command line are coerced against the declared
//! [`PropertyType`] before they ever reach a template, so the renderer only
//! sees typed [`Value`]s.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::error::DomainError;

// ── Value ────────────────────────────────────────────────────────────────────

/// A property value as seen by templates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn str(s: impl Into<String>) -> Self {
        Self::Str(s.into())
    }

    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "boolean",
            Self::Int(_) => "integer",
            Self::Str(_) => "string",
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }

    /// Text form used for substitution. Lists are joined with `", "`.
    ///
    /// Maps have no text form; the caller gets `None` and reports a type
    /// mismatch against the property it was looking up.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Self::Bool(b) => Some(b.to_string()),
            Self::Int(i) => Some(i.to_string()),
            Self::Str(s) => Some(s.clone()),
            Self::List(items) => {
                let parts: Option<Vec<String>> = items.iter().map(Value::to_text).collect();
                parts.map(|p| p.join(", "))
            }
            Self::Map(_) => None,
        }
    }

    /// Structural equality with string coercion.
    ///
    /// A literal `"true"` matches `Bool(true)` and `"42"` matches `Int(42)`,
    /// so branch literals written as strings still select typed properties.
    pub fn matches(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Str(s), Self::Bool(b)) | (Self::Bool(b), Self::Str(s)) => {
                parse_bool(s) == Some(*b)
            }
            (Self::Str(s), Self::Int(i)) | (Self::Int(i), Self::Str(s)) => {
                s.parse::<i64>().ok() == Some(*i)
            }
            _ => self == other,
        }
    }

    /// Coerce a raw override string into a value of the declared type.
    pub fn coerce(name: &str, raw: &str, kind: PropertyType) -> Result<Self, DomainError> {
        let invalid = || DomainError::InvalidPropertyValue {
            name: name.to_string(),
            value: raw.to_string(),
            expected: kind.to_string(),
        };

        match kind {
            PropertyType::String => Ok(Self::Str(raw.to_string())),
            PropertyType::Boolean => parse_bool(raw).map(Self::Bool).ok_or_else(invalid),
            // `str::parse` would also take a leading `+`.
            PropertyType::Integer if raw.starts_with('+') || raw.trim() != raw => Err(invalid()),
            PropertyType::Integer => raw.parse::<i64>().map(Self::Int).map_err(|_| invalid()),
            PropertyType::List => Ok(Self::List(
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(Self::str)
                    .collect(),
            )),
        }
    }

    /// Whether the value already conforms to `kind`.
    pub fn conforms_to(&self, kind: PropertyType) -> bool {
        matches!(
            (self, kind),
            (Self::Str(_), PropertyType::String)
                | (Self::Bool(_), PropertyType::Boolean)
                | (Self::Int(_), PropertyType::Integer)
                | (Self::List(_), PropertyType::List)
        )
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

// ── PropertyType ─────────────────────────────────────────────────────────────

/// Declared type of a pack property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    #[default]
    String,
    Boolean,
    Integer,
    List,
}

impl PropertyType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::List => "list",
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PropertyType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "string" | "str" => Ok(Self::String),
            "boolean" | "bool" => Ok(Self::Boolean),
            "integer" | "int" => Ok(Self::Integer),
            "list" => Ok(Self::List),
            other => Err(DomainError::InvalidPack(format!(
                "unknown property type '{other}'; expected string, boolean, integer or list"
            ))),
        }
    }
}

// ── PropertyEnv ──────────────────────────────────────────────────────────────

/// Outcome of looking a name up in one scope.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Lookup<'a> {
    Found(&'a Value),
    /// Declared, but nothing supplied a value.
    Absent,
    /// Never declared in this scope.
    Unknown,
}

/// A flat property environment.
///
/// Keys may contain dots (`kotlin.version`). Lookups of a dotted path try the
/// exact key first and then descend into [`Value::Map`] entries, so both
/// `project.name` stored flat and `project` stored as a map resolve.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyEnv {
    entries: BTreeMap<String, Option<Value>>,
}

impl PropertyEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.entries.insert(name.into(), Some(value));
    }

    /// Declare a name without a value. An existing value is kept.
    pub fn declare(&mut self, name: impl Into<String>) {
        self.entries.entry(name.into()).or_insert(None);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&Value>)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_ref()))
    }

    pub fn lookup(&self, path: &str) -> Lookup<'_> {
        match self.entries.get(path) {
            Some(Some(value)) => return Lookup::Found(value),
            Some(None) => return Lookup::Absent,
            None => {}
        }

        // Longest declared prefix wins, then walk the remaining segments.
        let mut split = path.len();
        while let Some(dot) = path[..split].rfind('.') {
            let (head, rest) = (&path[..dot], &path[dot + 1..]);
            match self.entries.get(head) {
                Some(Some(value)) => return descend(value, rest),
                Some(None) => return Lookup::Absent,
                None => split = dot,
            }
        }
        Lookup::Unknown
    }
}

/// Walk a dotted path into nested maps.
pub fn descend<'a>(mut value: &'a Value, path: &str) -> Lookup<'a> {
    for segment in path.split('.') {
        match value {
            Value::Map(map) => match map.get(segment) {
                Some(next) => value = next,
                None => return Lookup::Unknown,
            },
            _ => return Lookup::Unknown,
        }
    }
    Lookup::Found(value)
}

// ============================================================================
// String Case Conversion Helpers
// ============================================================================

/// `"My Awesome App"` → `"my_awesome_app"`.
pub fn snake_case(s: &str) -> String {
    split_words(s).join("_")
}

/// `"My Awesome App"` → `"my-awesome-app"`.
pub fn kebab_case(s: &str) -> String {
    split_words(s).join("-")
}

/// `"my-app"` → `"MyApp"`, `"HTTPRequest"` → `"HttpRequest"`.
pub fn pascal_case(s: &str) -> String {
    split_words(s).iter().map(|w| capitalize(w)).collect()
}

/// `"my-app"` → `"myApp"`.
pub fn camel_case(s: &str) -> String {
    let words = split_words(s);
    let mut out = String::new();
    for (i, word) in words.iter().enumerate() {
        if i == 0 {
            out.push_str(word);
        } else {
            out.push_str(&capitalize(word));
        }
    }
    out
}

/// A JVM-style package name: `("org.example", "My App")` → `"org.example.myapp"`.
pub fn package_name(group: &str, name: &str) -> String {
    let leaf: String = split_words(name).concat();
    let leaf: String = leaf.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
    match (group.is_empty(), leaf.is_empty()) {
        (true, _) => leaf,
        (false, true) => group.to_string(),
        (false, false) => format!("{group}.{leaf}"),
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => {
            let mut out = String::new();
            out.extend(first.to_uppercase());
            out.push_str(chars.as_str());
            out
        }
        None => String::new(),
    }
}

/// Split a string into lowercase words.
///
/// Boundaries are separators (`_`, `-`, `.`, whitespace), a lower-to-upper
/// transition (`myApp`) and the end of an acronym (`HTTPServer`).
fn split_words(input: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '_' || c == '-' || c == '.' || c.is_whitespace() {
            if !current.is_empty() {
                words.push(current.to_lowercase());
                current.clear();
            }
            continue;
        }

        if let Some(&next) = chars.peek() {
            if c.is_lowercase() && next.is_uppercase() {
                current.push(c);
                words.push(current.to_lowercase());
                current.clear();
                continue;
            }

            if c.is_uppercase()
                && next.is_uppercase()
                && chars.clone().nth(1).is_some_and(|n| n.is_lowercase())
            {
                current.push(c);
                words.push(current.to_lowercase());
                current.clear();
                continue;
            }
        }

        current.push(c);
    }

    if !current.is_empty() {
        words.push(current.to_lowercase());
    }

    words
}
