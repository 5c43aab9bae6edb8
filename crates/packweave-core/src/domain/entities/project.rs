//! Generation requests and their resolved form.

use std::collections::{BTreeMap, BTreeSet};

use crate::domain::{
    entities::{
        dependency::{DependencySet, ResolvedDependency},
        module::{ModuleKind, Platform, SourceSetKey},
        pack::{PackDescriptor, PackId},
        source::Source,
    },
    value_objects::{PropertyEnv, Value},
};

/// What the caller asks for.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProjectDescriptor {
    pub name: String,
    pub group: String,
    /// Raw override strings, coerced against each property's declared type.
    pub properties: BTreeMap<String, String>,
    /// Selected packs in selection order.
    pub packs: Vec<PackId>,
}

impl ProjectDescriptor {
    pub fn new(name: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            group: group.into(),
            ..Self::default()
        }
    }

    pub fn with_pack(mut self, id: PackId) -> Self {
        self.packs.push(id);
        self
    }

    pub fn with_packs(mut self, ids: impl IntoIterator<Item = PackId>) -> Self {
        self.packs.extend(ids);
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }
}

/// A source together with the pack that contributed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectSource {
    pub owner: PackId,
    pub source: Source,
}

/// A module after merging every pack's contribution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedModule {
    pub path: String,
    pub kind: ModuleKind,
    pub platforms: BTreeSet<Platform>,
    pub dependencies: BTreeMap<SourceSetKey, DependencySet<ResolvedDependency>>,
    /// File sources only; slot contributions live in the slot bindings.
    pub sources: Vec<ProjectSource>,
}

impl ResolvedModule {
    /// Last path segment, or `None` for the root module.
    pub fn name(&self) -> Option<&str> {
        if self.path.is_empty() {
            None
        } else {
            self.path.rsplit('/').next()
        }
    }

    /// The module as a template value, bound as `module` while its files
    /// render.
    pub fn to_value(&self) -> Value {
        let mut deps = Vec::new();
        for (key, set) in &self.dependencies {
            for (test, list) in [(false, &set.main), (true, &set.test)] {
                for dep in list {
                    deps.push(dependency_value(*key, test, dep));
                }
            }
        }

        let mut map = BTreeMap::new();
        map.insert("path".into(), Value::str(&self.path));
        map.insert("name".into(), Value::str(self.name().unwrap_or_default()));
        map.insert("kind".into(), Value::str(self.kind.as_str()));
        map.insert(
            "platforms".into(),
            Value::List(self.platforms.iter().map(|p| Value::str(p.as_str())).collect()),
        );
        map.insert("dependencies".into(), Value::List(deps));
        Value::Map(map)
    }
}

fn dependency_value(key: SourceSetKey, test: bool, dep: &ResolvedDependency) -> Value {
    let scope = dep.scope().as_str();
    let configuration = if test {
        let mut chars = scope.chars();
        let first = chars.next().map(|c| c.to_ascii_uppercase()).unwrap_or_default();
        format!("test{first}{}", chars.as_str())
    } else {
        scope.to_string()
    };

    let mut map = BTreeMap::new();
    map.insert("notation".into(), Value::str(dep.notation()));
    map.insert("scope".into(), Value::str(scope));
    map.insert("configuration".into(), Value::str(configuration));
    map.insert("source_set".into(), Value::str(key.as_str()));
    map.insert("test".into(), Value::Bool(test));
    map.insert(
        "module".into(),
        Value::Bool(matches!(dep, ResolvedDependency::Module { .. })),
    );
    Value::Map(map)
}

/// The fully merged result of resolving a [`ProjectDescriptor`].
#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    pub name: String,
    pub group: String,
    /// Pack closure in visit order.
    pub packs: Vec<PackDescriptor>,
    /// Modules in first-appearance order.
    pub modules: Vec<ResolvedModule>,
    /// Global property environment.
    pub properties: PropertyEnv,
    /// Per-pack environments used to render that pack's own content.
    pub pack_scopes: BTreeMap<PackId, PropertyEnv>,
}

impl Project {
    pub fn pack_ids(&self) -> impl Iterator<Item = &PackId> {
        self.packs.iter().map(|p| &p.id)
    }

    pub fn pack_set(&self) -> BTreeSet<PackId> {
        self.pack_ids().cloned().collect()
    }

    pub fn includes(&self, id: &PackId) -> bool {
        self.packs.iter().any(|p| &p.id == id)
    }

    pub fn module(&self, path: &str) -> Option<&ResolvedModule> {
        self.modules.iter().find(|m| m.path == path)
    }

    pub fn scope(&self, id: &PackId) -> Option<&PropertyEnv> {
        self.pack_scopes.get(id)
    }

    pub fn file_count(&self) -> usize {
        self.modules.iter().map(|m| m.sources.len()).sum()
    }
}
