//! Pack graph resolution.
//!
//! Turns a [`ProjectDescriptor`] into a [`Project`]:
//!
//! 1. breadth-first closure over `requires`, seeded by the selection;
//! 2. cycle check over the loaded subgraph;
//! 3. module merge, with catalog references replaced by artifacts;
//! 4. property layering: built-ins, pack defaults, overrides.
//!
//! The resolver only reads from a [`PackLookup`]; it never writes.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use tracing::{debug, info, instrument};

use crate::domain::{
    entities::{
        catalog::VersionsCatalog,
        dependency::{Dependency, DependencySet, ResolvedDependency},
        module::{ModuleKind, Platform, SourceSetKey},
        pack::{PackDescriptor, PackId},
        project::{Project, ProjectDescriptor, ProjectSource, ResolvedModule},
        source::{Source, SourceTarget},
    },
    error::DomainError,
    value_objects::{
        PropertyEnv, Value, camel_case, kebab_case, package_name, pascal_case, snake_case,
    },
};

/// Read access to packs and the versions catalog.
///
/// The error type lets a repository report its own failures (I/O, decoding)
/// while resolution failures still convert into it.
pub trait PackLookup {
    type Error: From<DomainError>;

    /// `Ok(None)` when the pack does not exist.
    fn get(&self, id: &PackId) -> Result<Option<PackDescriptor>, Self::Error>;

    fn versions(&self) -> Result<VersionsCatalog, Self::Error>;
}

/// Resolve the descriptor's pack graph into a project.
///
/// # Errors
///
/// - [`DomainError::PackNotFound`] for an id the lookup does not have
/// - [`DomainError::CyclicDependency`] with the full chain
/// - [`DomainError::ModuleKindConflict`] when packs disagree on a module
/// - catalog errors for unknown aliases or version references
/// - [`DomainError::InvalidPropertyValue`] for an override that does not
///   coerce to its declared type
#[instrument(skip_all, fields(project = %descriptor.name, selected = descriptor.packs.len()))]
pub fn resolve<L>(descriptor: &ProjectDescriptor, lookup: &L) -> Result<Project, L::Error>
where
    L: PackLookup + ?Sized,
{
    let packs = closure(&descriptor.packs, lookup)?;
    check_cycles(&packs)?;

    let mut catalog = LazyCatalog {
        lookup,
        loaded: None,
    };
    let modules = merge_modules(&packs, &mut catalog)?;
    let (properties, pack_scopes) = layer_properties(descriptor, &packs, &modules)?;

    info!(
        packs = packs.len(),
        modules = modules.len(),
        "resolved pack graph"
    );

    Ok(Project {
        name: descriptor.name.clone(),
        group: descriptor.group.clone(),
        packs,
        modules,
        properties,
        pack_scopes,
    })
}

// ── Closure ──────────────────────────────────────────────────────────────────

fn closure<L>(selected: &[PackId], lookup: &L) -> Result<Vec<PackDescriptor>, L::Error>
where
    L: PackLookup + ?Sized,
{
    let mut seen: HashSet<PackId> = HashSet::new();
    let mut queue: VecDeque<PackId> = VecDeque::new();
    for id in selected {
        if seen.insert(id.clone()) {
            queue.push_back(id.clone());
        }
    }

    let mut packs = Vec::new();
    while let Some(id) = queue.pop_front() {
        let pack = lookup.get(&id)?.ok_or_else(|| DomainError::PackNotFound {
            id: id.to_string(),
        })?;
        debug!(pack = %id, version = %pack.version, "visiting pack");

        for required in &pack.requires {
            if seen.insert(required.clone()) {
                queue.push_back(required.clone());
            }
        }
        packs.push(pack);
    }
    Ok(packs)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

fn check_cycles(packs: &[PackDescriptor]) -> Result<(), DomainError> {
    let index: HashMap<&PackId, &PackDescriptor> = packs.iter().map(|p| (&p.id, p)).collect();
    let mut marks: HashMap<&PackId, Mark> = HashMap::new();
    let mut stack: Vec<&PackId> = Vec::new();

    for pack in packs {
        visit(&pack.id, &index, &mut marks, &mut stack)?;
    }
    Ok(())
}

fn visit<'a>(
    id: &'a PackId,
    index: &HashMap<&'a PackId, &'a PackDescriptor>,
    marks: &mut HashMap<&'a PackId, Mark>,
    stack: &mut Vec<&'a PackId>,
) -> Result<(), DomainError> {
    match marks.get(id) {
        Some(Mark::Done) => return Ok(()),
        Some(Mark::Visiting) => {
            let start = stack.iter().position(|s| *s == id).unwrap_or(0);
            let mut path: Vec<String> = stack[start..].iter().map(ToString::to_string).collect();
            path.push(id.to_string());
            return Err(DomainError::CyclicDependency { path });
        }
        None => {}
    }

    marks.insert(id, Mark::Visiting);
    stack.push(id);
    if let Some(pack) = index.get(id) {
        for required in &pack.requires {
            visit(required, index, marks, stack)?;
        }
    }
    stack.pop();
    marks.insert(id, Mark::Done);
    Ok(())
}

// ── Modules ──────────────────────────────────────────────────────────────────

/// Fetches the catalog on first use only, so repositories without one work
/// as long as no pack references it.
struct LazyCatalog<'l, L: ?Sized> {
    lookup: &'l L,
    loaded: Option<VersionsCatalog>,
}

impl<L: PackLookup + ?Sized> LazyCatalog<'_, L> {
    fn resolve(&mut self, dependency: &Dependency) -> Result<Vec<ResolvedDependency>, L::Error> {
        let needs_catalog = matches!(
            dependency,
            Dependency::Catalog { .. } | Dependency::Bundle { .. }
        );
        if needs_catalog && self.loaded.is_none() {
            self.loaded = Some(self.lookup.versions()?);
        }
        let resolved = match &self.loaded {
            Some(catalog) => dependency.resolve(catalog)?,
            None => dependency.resolve(&VersionsCatalog::new())?,
        };
        Ok(resolved)
    }

    fn resolve_set(
        &mut self,
        set: &DependencySet<Dependency>,
    ) -> Result<DependencySet<ResolvedDependency>, L::Error> {
        let mut resolved = DependencySet::default();
        for dependency in &set.main {
            resolved.main.extend(self.resolve(dependency)?);
        }
        for dependency in &set.test {
            resolved.test.extend(self.resolve(dependency)?);
        }
        Ok(resolved)
    }
}

struct ModuleDraft {
    path: String,
    kind: Option<(ModuleKind, PackId)>,
    platforms: BTreeSet<Platform>,
    dependencies: BTreeMap<SourceSetKey, DependencySet<ResolvedDependency>>,
    sources: Vec<ProjectSource>,
}

impl ModuleDraft {
    fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            kind: None,
            platforms: BTreeSet::new(),
            dependencies: BTreeMap::new(),
            sources: Vec::new(),
        }
    }

    fn set_kind(&mut self, kind: ModuleKind, owner: &PackId) -> Result<(), DomainError> {
        if let Some((existing, first)) = &self.kind {
            if *existing != kind {
                return Err(DomainError::ModuleKindConflict {
                    path: self.path.clone(),
                    first: format!("{existing} (by {first})"),
                    second: format!("{kind} (by {owner})"),
                });
            }
            return Ok(());
        }
        self.kind = Some((kind, owner.clone()));
        Ok(())
    }

    fn add_files<'s>(&mut self, owner: &PackId, sources: impl IntoIterator<Item = &'s Source>) {
        for source in sources {
            if let SourceTarget::File(_) = source.target() {
                self.sources.push(ProjectSource {
                    owner: owner.clone(),
                    source: source.clone(),
                });
            }
        }
    }

    fn finish(self) -> ResolvedModule {
        ResolvedModule {
            path: self.path,
            kind: self.kind.map_or(ModuleKind::Library, |(kind, _)| kind),
            platforms: self.platforms,
            dependencies: self.dependencies,
            sources: self.sources,
        }
    }
}

fn draft<'d>(drafts: &'d mut Vec<ModuleDraft>, path: &str) -> &'d mut ModuleDraft {
    let position = match drafts.iter().position(|d| d.path == path) {
        Some(position) => position,
        None => {
            drafts.push(ModuleDraft::new(path));
            drafts.len() - 1
        }
    };
    &mut drafts[position]
}

fn merge_modules<L>(
    packs: &[PackDescriptor],
    catalog: &mut LazyCatalog<'_, L>,
) -> Result<Vec<ResolvedModule>, L::Error>
where
    L: PackLookup + ?Sized,
{
    let mut drafts: Vec<ModuleDraft> = Vec::new();

    for pack in packs {
        if pack.sources.iter().any(|s| !s.is_slot_contribution()) {
            draft(&mut drafts, "").add_files(&pack.id, &pack.sources);
        }

        for module in &pack.modules {
            let target = draft(&mut drafts, &module.path);
            if let Some(kind) = module.kind {
                target.set_kind(kind, &pack.id)?;
            }
            target.platforms.extend(module.platforms.iter().copied());
            for (key, set) in &module.dependencies {
                let resolved = catalog.resolve_set(set)?;
                target.dependencies.entry(*key).or_default().extend(resolved);
            }
            target.add_files(&pack.id, &module.sources);
        }
    }

    Ok(drafts.into_iter().map(ModuleDraft::finish).collect())
}

// ── Properties ───────────────────────────────────────────────────────────────

fn layer_properties(
    descriptor: &ProjectDescriptor,
    packs: &[PackDescriptor],
    modules: &[ResolvedModule],
) -> Result<(PropertyEnv, BTreeMap<PackId, PropertyEnv>), DomainError> {
    let mut global = PropertyEnv::new();
    global.set("project", builtins(descriptor, packs, modules));

    for pack in packs {
        for (name, decl) in &pack.properties {
            match &decl.default {
                Some(value) => global.set(name.as_str(), value.clone()),
                None => global.declare(name.as_str()),
            }
        }
    }

    for (name, raw) in &descriptor.properties {
        // The declaration whose default won decides the type.
        let kind = packs
            .iter()
            .rev()
            .find_map(|p| p.properties.get(name))
            .map(|decl| decl.kind);
        let value = match kind {
            Some(kind) => Value::coerce(name, raw, kind)?,
            None => {
                debug!(property = %name, "override for a property no pack declares");
                Value::str(raw.as_str())
            }
        };
        global.set(name.as_str(), value);
    }

    let mut scopes = BTreeMap::new();
    for pack in packs {
        let mut scope = PropertyEnv::new();
        for (name, decl) in &pack.properties {
            match (descriptor.properties.get(name), &decl.default) {
                (Some(raw), _) => scope.set(name.as_str(), Value::coerce(name, raw, decl.kind)?),
                (None, Some(value)) => scope.set(name.as_str(), value.clone()),
                (None, None) => scope.declare(name.as_str()),
            }
        }
        scopes.insert(pack.id.clone(), scope);
    }

    Ok((global, scopes))
}

/// The `project` map every template can read.
fn builtins(descriptor: &ProjectDescriptor, packs: &[PackDescriptor], modules: &[ResolvedModule]) -> Value {
    let name = descriptor.name.as_str();
    let mut project = BTreeMap::new();
    project.insert("name".to_string(), Value::str(name));
    project.insert("group".to_string(), Value::str(descriptor.group.as_str()));
    project.insert("snake".to_string(), Value::str(snake_case(name)));
    project.insert("kebab".to_string(), Value::str(kebab_case(name)));
    project.insert("pascal".to_string(), Value::str(pascal_case(name)));
    project.insert("camel".to_string(), Value::str(camel_case(name)));
    project.insert(
        "package".to_string(),
        Value::str(package_name(&descriptor.group, name)),
    );
    project.insert(
        "packs".to_string(),
        Value::List(packs.iter().map(|p| Value::str(p.id.to_string())).collect()),
    );
    project.insert(
        "modules".to_string(),
        Value::List(modules.iter().map(|m| Value::str(m.path.as_str())).collect()),
    );
    Value::Map(project)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        entities::{
            module::SourceModule,
            pack::PropertyDecl,
        },
        value_objects::{Lookup, PropertyType},
    };

    #[derive(Default)]
    struct Packs {
        packs: BTreeMap<PackId, PackDescriptor>,
        catalog: Option<VersionsCatalog>,
    }

    impl Packs {
        fn with(mut self, pack: PackDescriptor) -> Self {
            self.packs.insert(pack.id.clone(), pack);
            self
        }

        fn with_catalog(mut self, catalog: VersionsCatalog) -> Self {
            self.catalog = Some(catalog);
            self
        }
    }

    impl PackLookup for Packs {
        type Error = DomainError;

        fn get(&self, id: &PackId) -> Result<Option<PackDescriptor>, DomainError> {
            Ok(self.packs.get(id).cloned())
        }

        fn versions(&self) -> Result<VersionsCatalog, DomainError> {
            self.catalog
                .clone()
                .ok_or_else(|| DomainError::InvalidPack("no catalog in this repository".into()))
        }
    }

    fn id(name: &str) -> PackId {
        PackId::new("test", name)
    }

    fn pack(name: &str, requires: &[&str]) -> PackDescriptor {
        requires
            .iter()
            .fold(PackDescriptor::builder(id(name)), |b, r| b.requires(id(r)))
            .build()
            .unwrap()
    }

    fn select(names: &[&str]) -> ProjectDescriptor {
        ProjectDescriptor::new("Demo App", "org.example").with_packs(names.iter().map(|n| id(n)))
    }

    fn order(project: &Project) -> Vec<&str> {
        project.packs.iter().map(|p| p.id.name()).collect()
    }

    #[test]
    fn closure_is_breadth_first_and_deduplicated() {
        // a -> {b, c}, b -> d, c -> d
        let repo = Packs::default()
            .with(pack("a", &["b", "c"]))
            .with(pack("b", &["d"]))
            .with(pack("c", &["d"]))
            .with(pack("d", &[]));

        let project = resolve(&select(&["a"]), &repo).unwrap();
        assert_eq!(order(&project), ["a", "b", "c", "d"]);

        let project = resolve(&select(&["c", "a", "c"]), &repo).unwrap();
        assert_eq!(order(&project), ["c", "a", "d", "b"]);
    }

    #[test]
    fn missing_pack_is_reported() {
        let repo = Packs::default().with(pack("a", &["ghost"]));
        assert_eq!(
            resolve(&select(&["a"]), &repo).unwrap_err(),
            DomainError::PackNotFound {
                id: "test:ghost".into()
            }
        );
    }

    #[test]
    fn cycles_report_the_full_chain() {
        let repo = Packs::default()
            .with(pack("a", &["b"]))
            .with(pack("b", &["c"]))
            .with(pack("c", &["a"]));

        match resolve(&select(&["a"]), &repo) {
            Err(DomainError::CyclicDependency { path }) => {
                assert_eq!(path, ["test:a", "test:b", "test:c", "test:a"]);
            }
            other => panic!("expected a cycle, got {other:?}"),
        }
    }

    #[test]
    fn modules_merge_by_path() {
        let a = PackDescriptor::builder(id("a"))
            .source(Source::marker_file("README.md", "# {{project.name}}"))
            .module(
                SourceModule::new("app")
                    .kind(ModuleKind::Application)
                    .platform(Platform::Jvm)
                    .source(Source::static_file("a.txt", "a")),
            )
            .build()
            .unwrap();
        let b = PackDescriptor::builder(id("b"))
            .module(
                SourceModule::new("app")
                    .platform(Platform::Js)
                    .source(Source::static_file("b.txt", "b")),
            )
            .module(SourceModule::new("lib"))
            .build()
            .unwrap();
        let repo = Packs::default().with(a).with(b);

        let project = resolve(&select(&["a", "b"]), &repo).unwrap();
        let paths: Vec<_> = project.modules.iter().map(|m| m.path.as_str()).collect();
        assert_eq!(paths, ["", "app", "lib"]);

        let app = project.module("app").unwrap();
        assert_eq!(app.kind, ModuleKind::Application);
        assert_eq!(app.platforms, BTreeSet::from([Platform::Jvm, Platform::Js]));
        let owners: Vec<_> = app.sources.iter().map(|s| s.owner.name()).collect();
        assert_eq!(owners, ["a", "b"]);
        assert_eq!(project.module("lib").unwrap().kind, ModuleKind::Library);
    }

    #[test]
    fn conflicting_module_kinds_fail() {
        let a = PackDescriptor::builder(id("a"))
            .module(SourceModule::new("app").kind(ModuleKind::Application))
            .build()
            .unwrap();
        let b = PackDescriptor::builder(id("b"))
            .module(SourceModule::new("app").kind(ModuleKind::Library))
            .build()
            .unwrap();
        let repo = Packs::default().with(a).with(b);

        assert!(matches!(
            resolve(&select(&["a", "b"]), &repo),
            Err(DomainError::ModuleKindConflict { path, .. }) if path == "app"
        ));
    }

    #[test]
    fn catalog_references_are_resolved() {
        let a = PackDescriptor::builder(id("a"))
            .module(
                SourceModule::new("app")
                    .dependency(SourceSetKey::Common, Dependency::catalog("ktor-core"))
                    .test_dependency(SourceSetKey::Common, Dependency::catalog("ktor-core")),
            )
            .build()
            .unwrap();
        let catalog = VersionsCatalog::new()
            .with_version("ktor", "3.0.0")
            .with_library("ktor-core", "io.ktor:ktor-server-core:3.0.0");
        let repo = Packs::default().with(a).with_catalog(catalog);

        let project = resolve(&select(&["a"]), &repo).unwrap();
        let deps = &project.module("app").unwrap().dependencies[&SourceSetKey::Common];
        assert_eq!(deps.main[0].notation(), "io.ktor:ktor-server-core:3.0.0");
        assert_eq!(deps.test.len(), 1);
    }

    #[test]
    fn unknown_catalog_alias_fails() {
        let a = PackDescriptor::builder(id("a"))
            .module(SourceModule::new("app").dependency(SourceSetKey::Common, Dependency::catalog("nope")))
            .build()
            .unwrap();
        let repo = Packs::default().with(a).with_catalog(VersionsCatalog::new());

        assert_eq!(
            resolve(&select(&["a"]), &repo).unwrap_err(),
            DomainError::UnresolvedCatalogAlias {
                alias: "nope".into()
            }
        );
    }

    #[test]
    fn catalog_is_not_fetched_when_unused() {
        let repo = Packs::default().with(pack("a", &[]));
        assert!(resolve(&select(&["a"]), &repo).is_ok());
    }

    #[test]
    fn properties_layer_builtins_defaults_and_overrides() {
        let a = PackDescriptor::builder(id("a"))
            .property("port", PropertyDecl::new(PropertyType::Integer).with_default(8080_i64))
            .property("db", PropertyDecl::new(PropertyType::String))
            .build()
            .unwrap();
        let b = PackDescriptor::builder(id("b"))
            .property("port", PropertyDecl::new(PropertyType::Integer).with_default(9090_i64))
            .build()
            .unwrap();
        let repo = Packs::default().with(a).with(b);

        let project = resolve(&select(&["a", "b"]), &repo).unwrap();
        let global = &project.properties;
        assert_eq!(global.lookup("port"), Lookup::Found(&Value::Int(9090)));
        assert_eq!(global.lookup("db"), Lookup::Absent);
        assert_eq!(
            global.lookup("project.package"),
            Lookup::Found(&Value::str("org.example.demoapp"))
        );
        assert_eq!(
            global.lookup("project.kebab"),
            Lookup::Found(&Value::str("demo-app"))
        );
        // Each pack keeps its own default in its scope.
        assert_eq!(
            project.scope(&id("a")).unwrap().lookup("port"),
            Lookup::Found(&Value::Int(8080))
        );

        let overridden = resolve(&select(&["a", "b"]).with_property("port", "7000"), &repo).unwrap();
        assert_eq!(overridden.properties.lookup("port"), Lookup::Found(&Value::Int(7000)));
        assert_eq!(
            overridden.scope(&id("a")).unwrap().lookup("port"),
            Lookup::Found(&Value::Int(7000))
        );
    }

    #[test]
    fn bad_override_is_rejected() {
        let a = PackDescriptor::builder(id("a"))
            .property("ktor", PropertyDecl::new(PropertyType::Boolean).with_default(false))
            .build()
            .unwrap();
        let repo = Packs::default().with(a);

        assert!(matches!(
            resolve(&select(&["a"]).with_property("ktor", "yes"), &repo),
            Err(DomainError::InvalidPropertyValue { name, .. }) if name == "ktor"
        ));
    }
}
