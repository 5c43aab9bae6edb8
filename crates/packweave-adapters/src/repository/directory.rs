//! Directory-per-pack repository.
//!
//! Discovers `pack.toml` manifests under a root directory and turns each
//! into a [`PackDescriptor`].
//!
//! # Directory layout expected
//!
//! ```text
//! packs/
//! ├── versions.toml            ← optional Gradle-style versions catalog
//! ├── kotlin-jvm/
//! │   ├── pack.toml            ← manifest (required)
//! │   ├── files/               ← root-module files
//! │   │   ├── build.gradle.kts
//! │   │   └── src/Main.kt
//! │   └── slots/
//! │       └── imports.kt       ← slot contribution
//! └── ktor/
//!     └── pack.toml
//! ```
//!
//! # `pack.toml` format
//!
//! ```toml
//! [pack]
//! group        = "org.packweave"
//! name         = "kotlin-jvm"
//! version      = "1.0.0"
//! display_name = "Kotlin/JVM"             # optional, defaults to name
//! description  = "Kotlin on the JVM"      # optional
//! requires     = ["org.packweave:gradle"] # optional
//! tags         = ["kotlin"]               # optional
//!
//! [properties."kotlin.version"]
//! type    = "string"                      # string | boolean | integer | list
//! default = "2.0.0"
//!
//! # Files under files/ belong to the root module. Files containing {{ are
//! # marker templates, everything else is static unless overridden here.
//! [[files]]
//! path   = "build.gradle.kts"
//! engine = "host"                         # marker | host | static
//!
//! [[modules]]
//! path      = "server"
//! kind      = "application"
//! platforms = ["jvm"]
//! dir       = "server"                    # files of this module
//! dependencies.common.main = ["kotlin-stdlib", { bundle = "ktor" }]
//! dependencies.common.test = [{ catalog = "kotlin-test", scope = "runtime_only" }]
//!
//! [[modules.files]]
//! path       = "gradlew"
//! executable = true
//!
//! [[contributions]]
//! file   = "slots/imports.kt"
//! slot   = "org.packweave:kotlin-jvm/imports"
//! engine = "marker"
//! ```
//!
//! A dependency string is a module reference when it starts with `:`, an
//! artifact when it has the form `group:artifact:version`, and a catalog
//! alias otherwise.

use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use tracing::{debug, instrument, warn};
use walkdir::WalkDir;

use packweave_core::{
    application::{ApplicationError, ports::PackRepository},
    domain::{
        Coordinate, Dependency, DependencyScope, DomainError, EngineKind, ModuleKind,
        PackDescriptor, PackId, PackMetadata, Platform, PropertyDecl, SlotAddress, Source,
        SourceModule, SourceSetKey, SourceTarget, VersionsCatalog,
    },
    error::{WeaveError, WeaveResult},
};

use crate::filesystem::map_io_error;

pub const MANIFEST_FILE: &str = "pack.toml";
pub const CATALOG_FILE: &str = "versions.toml";
/// Root-module files of a pack live here.
pub const FILES_DIR: &str = "files";

// ── Manifest types ────────────────────────────────────────────────────────────

/// Deserialised representation of a `pack.toml` file.
#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct PackManifest {
    pub pack: PackSection,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyDecl>,
    /// Overrides for files under `files/`.
    #[serde(default)]
    pub files: Vec<FileEntry>,
    #[serde(default)]
    pub modules: Vec<ModuleEntry>,
    #[serde(default)]
    pub contributions: Vec<ContributionEntry>,
}

/// `[pack]` section.
#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct PackSection {
    pub group: String,
    pub name: String,
    pub version: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub requires: Vec<String>,
    pub organization: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// One `[[modules]]` entry.
#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ModuleEntry {
    #[serde(default)]
    pub path: String,
    pub kind: Option<String>,
    #[serde(default)]
    pub platforms: Vec<String>,
    /// Directory, relative to the pack, holding this module's files.
    pub dir: Option<String>,
    /// Source-set key (`common` or a platform) to dependency lists.
    #[serde(default)]
    pub dependencies: BTreeMap<String, DependencyLists>,
    #[serde(default)]
    pub files: Vec<FileEntry>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct DependencyLists {
    #[serde(default)]
    pub main: Vec<DependencyEntry>,
    #[serde(default)]
    pub test: Vec<DependencyEntry>,
}

/// A dependency, as a shorthand string or a table.
#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
pub enum DependencyEntry {
    Notation(String),
    Table(DependencyTable),
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct DependencyTable {
    pub catalog: Option<String>,
    pub bundle: Option<String>,
    pub module: Option<String>,
    pub artifact: Option<String>,
    #[serde(default)]
    pub scope: DependencyScope,
}

/// Per-file override.
#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct FileEntry {
    /// Path relative to the module directory.
    pub path: String,
    pub engine: Option<FileEngine>,
    #[serde(default)]
    pub executable: bool,
    /// Output path, if different from `path`. May contain `{{ }}`.
    pub target: Option<String>,
}

/// One `[[contributions]]` entry: a file injected into another pack's slot.
#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ContributionEntry {
    /// Path relative to the pack directory.
    pub file: String,
    /// `slot://group:name/slot`; the `slot://` prefix may be omitted.
    pub slot: String,
    pub engine: Option<FileEngine>,
}

/// How a file's content is treated.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileEngine {
    Marker,
    Host,
    Static,
}

// ── Repository ────────────────────────────────────────────────────────────────

/// Packs loaded from a directory tree.
///
/// Packs are read once by [`DirectoryRepository::open`]. The catalog is read
/// on each [`PackRepository::versions`] call, so a broken `versions.toml`
/// only fails requests that need it.
#[derive(Debug, Clone)]
pub struct DirectoryRepository {
    root: PathBuf,
    packs: BTreeMap<PackId, PackDescriptor>,
}

impl DirectoryRepository {
    /// Load every valid pack under `root`.
    ///
    /// # Errors
    ///
    /// Returns [`ApplicationError::RepositoryUnavailable`] if `root` does not
    /// exist or cannot be read. Individual pack directories whose manifest is
    /// invalid are **skipped with a `WARN` log**.
    #[instrument(skip_all, fields(root = %root.as_ref().display()))]
    pub fn open(root: impl AsRef<Path>) -> WeaveResult<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(unavailable(format!(
                "packs directory not found: {}",
                root.display()
            )));
        }

        let mut dirs = Vec::new();
        for entry in fs::read_dir(&root).map_err(|e| map_io_error(&root, e, "read directory"))? {
            let path = entry.map_err(|e| map_io_error(&root, e, "read directory entry"))?.path();
            if path.is_dir() {
                dirs.push(path);
            }
        }
        dirs.sort();

        let mut packs: BTreeMap<PackId, PackDescriptor> = BTreeMap::new();
        for dir in dirs {
            if !dir.join(MANIFEST_FILE).is_file() {
                debug!(dir = %dir.display(), "no {MANIFEST_FILE}; not a pack");
                continue;
            }
            match load_pack(&dir) {
                Ok(pack) => {
                    if let Some(existing) = packs.get(&pack.id) {
                        warn!(
                            id = %pack.id,
                            kept = %existing.version,
                            dir = %dir.display(),
                            "duplicate pack id; keeping the first"
                        );
                        continue;
                    }
                    debug!(id = %pack.id, version = %pack.version, "loaded pack");
                    packs.insert(pack.id.clone(), pack);
                }
                Err(e) => {
                    // One bad pack must not block all others.
                    warn!(dir = %dir.display(), error = %e, "skipping pack directory due to load error");
                }
            }
        }

        debug!(count = packs.len(), "finished loading packs");
        Ok(Self { root, packs })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.packs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packs.is_empty()
    }
}

impl PackRepository for DirectoryRepository {
    fn ids(&self) -> WeaveResult<Vec<PackId>> {
        Ok(self.packs.keys().cloned().collect())
    }

    fn get(&self, id: &PackId) -> WeaveResult<Option<PackDescriptor>> {
        Ok(self.packs.get(id).cloned())
    }

    fn versions(&self) -> WeaveResult<VersionsCatalog> {
        load_catalog(&self.root.join(CATALOG_FILE))
    }
}

/// Read a Gradle-style catalog. A missing file is an empty catalog; an
/// unreadable or malformed one is an error.
pub fn load_catalog(path: &Path) -> WeaveResult<VersionsCatalog> {
    if !path.exists() {
        return Ok(VersionsCatalog::new());
    }
    let raw = fs::read_to_string(path).map_err(|e| map_io_error(path, e, "read catalog"))?;
    toml::from_str(&raw)
        .map_err(|e| unavailable(format!("failed to parse '{}': {e}", path.display())))
}

fn unavailable(reason: String) -> WeaveError {
    ApplicationError::RepositoryUnavailable { reason }.into()
}

// ── Loading one pack ──────────────────────────────────────────────────────────

/// Load a single pack from its directory.
#[instrument(fields(dir = %dir.display()))]
pub fn load_pack(dir: &Path) -> WeaveResult<PackDescriptor> {
    let manifest_path = dir.join(MANIFEST_FILE);
    let raw = fs::read_to_string(&manifest_path)
        .map_err(|e| map_io_error(&manifest_path, e, "read manifest"))?;
    let manifest: PackManifest = toml::from_str(&raw).map_err(|e| {
        DomainError::InvalidPack(format!("failed to parse '{}': {e}", manifest_path.display()))
    })?;
    Ok(build_pack(dir, manifest)?)
}

fn build_pack(dir: &Path, manifest: PackManifest) -> Result<PackDescriptor, DomainError> {
    let section = &manifest.pack;
    let id = PackId::parse(&format!("{}:{}", section.group, section.name))?;
    let mut builder = PackDescriptor::builder(id)
        .version(&section.version)
        .description(section.description.clone().unwrap_or_default())
        .metadata(PackMetadata {
            organization: section.organization.clone(),
            tags: section.tags.clone(),
        });
    if let Some(display) = &section.display_name {
        builder = builder.name(display);
    }
    for required in &section.requires {
        builder = builder.requires(PackId::parse(required)?);
    }
    for (name, decl) in &manifest.properties {
        builder = builder.property(name, decl.clone());
    }

    let excluded: BTreeSet<PathBuf> = manifest
        .contributions
        .iter()
        .map(|c| dir.join(normalize_path(&c.file)))
        .collect();

    let files_dir = dir.join(FILES_DIR);
    if files_dir.is_dir() {
        for source in load_files(&files_dir, &manifest.files, &excluded)? {
            builder = builder.source(source);
        }
    } else if !manifest.files.is_empty() {
        return Err(DomainError::InvalidPack(format!(
            "[[files]] overrides given but '{}' has no {FILES_DIR}/ directory",
            dir.display()
        )));
    }

    for entry in &manifest.modules {
        builder = builder.module(build_module(dir, entry, &excluded)?);
    }

    for contribution in &manifest.contributions {
        builder = builder.source(load_contribution(dir, contribution)?);
    }

    builder.build()
}

fn build_module(
    pack_dir: &Path,
    entry: &ModuleEntry,
    excluded: &BTreeSet<PathBuf>,
) -> Result<SourceModule, DomainError> {
    let mut module = SourceModule::new(normalize_path(&entry.path).trim_matches('/'));
    if let Some(kind) = &entry.kind {
        module = module.kind(kind.parse::<ModuleKind>()?);
    }
    for platform in &entry.platforms {
        module = module.platform(platform.parse::<Platform>()?);
    }
    for (key, lists) in &entry.dependencies {
        let key = SourceSetKey::try_from(key.clone())?;
        for dep in &lists.main {
            module = module.dependency(key, dep.to_dependency()?);
        }
        for dep in &lists.test {
            module = module.test_dependency(key, dep.to_dependency()?);
        }
    }

    match &entry.dir {
        Some(dir) => {
            let module_dir = pack_dir.join(normalize_path(dir));
            if !module_dir.is_dir() {
                return Err(DomainError::InvalidPack(format!(
                    "module directory '{}' does not exist",
                    module_dir.display()
                )));
            }
            for source in load_files(&module_dir, &entry.files, excluded)? {
                module = module.source(source);
            }
        }
        None if !entry.files.is_empty() => {
            return Err(DomainError::InvalidPack(format!(
                "module '{}' has [[modules.files]] but no dir",
                entry.path
            )));
        }
        None => {}
    }
    Ok(module)
}

/// Walk `dir` and turn every regular file into a source.
///
/// Files are visited in name order so the resulting source order is stable.
fn load_files(
    dir: &Path,
    overrides: &[FileEntry],
    excluded: &BTreeSet<PathBuf>,
) -> Result<Vec<Source>, DomainError> {
    let overrides: BTreeMap<String, &FileEntry> = overrides
        .iter()
        .map(|f| (normalize_path(&f.path), f))
        .collect();
    let mut matched = BTreeSet::new();
    let mut sources = Vec::new();

    for walk_entry in WalkDir::new(dir).min_depth(1).sort_by_file_name() {
        let walk_entry =
            walk_entry.map_err(|e| DomainError::InvalidPack(format!("directory walk error: {e}")))?;
        if !walk_entry.file_type().is_file() || excluded.contains(walk_entry.path()) {
            continue;
        }
        let rel = walk_entry.path().strip_prefix(dir).map_err(|_| {
            DomainError::InvalidPack(format!(
                "failed to relativise '{}' against '{}'",
                walk_entry.path().display(),
                dir.display()
            ))
        })?;
        let rel = normalize_path(&rel.to_string_lossy());
        let bytes = fs::read(walk_entry.path())
            .map_err(|e| DomainError::InvalidPack(format!("failed to read file '{rel}': {e}")))?;

        let entry = overrides.get(&rel).copied();
        if entry.is_some() {
            matched.insert(rel.clone());
        }
        sources.push(file_source(&rel, bytes, entry)?);
    }

    if let Some(missing) = overrides.keys().find(|p| !matched.contains(*p)) {
        return Err(DomainError::InvalidPack(format!(
            "file override '{missing}' matches no file in '{}'",
            dir.display()
        )));
    }
    Ok(sources)
}

fn file_source(rel: &str, bytes: Vec<u8>, entry: Option<&FileEntry>) -> Result<Source, DomainError> {
    let target = entry
        .and_then(|e| e.target.as_deref())
        .map_or_else(|| rel.to_string(), normalize_path);
    let engine = entry
        .and_then(|e| e.engine)
        .unwrap_or_else(|| detect_engine(&bytes));

    let source = match engine {
        FileEngine::Static => Source::Static {
            target: SourceTarget::file(target),
            bytes,
            executable: false,
        },
        FileEngine::Marker | FileEngine::Host => {
            Source::template(SourceTarget::file(target), utf8(rel, bytes)?, engine_kind(engine))
        }
    };
    Ok(if entry.is_some_and(|e| e.executable) {
        source.executable()
    } else {
        source
    })
}

fn load_contribution(pack_dir: &Path, entry: &ContributionEntry) -> Result<Source, DomainError> {
    let rel = normalize_path(&entry.file);
    let bytes = fs::read(pack_dir.join(&rel))
        .map_err(|e| DomainError::InvalidPack(format!("failed to read contribution '{rel}': {e}")))?;
    let address = if entry.slot.starts_with("slot://") {
        SlotAddress::parse(&entry.slot)?
    } else {
        SlotAddress::parse(&format!("slot://{}", entry.slot))?
    };
    let target = SourceTarget::Slot(address);

    let engine = entry.engine.unwrap_or_else(|| detect_engine(&bytes));
    Ok(match engine {
        FileEngine::Static => Source::Static {
            target,
            bytes,
            executable: false,
        },
        FileEngine::Marker | FileEngine::Host => {
            Source::template(target, utf8(&rel, bytes)?, engine_kind(engine))
        }
    })
}

/// `{{` anywhere marks a marker template; anything else is copied verbatim.
fn detect_engine(bytes: &[u8]) -> FileEngine {
    if bytes.windows(2).any(|w| w == b"{{") {
        FileEngine::Marker
    } else {
        FileEngine::Static
    }
}

fn engine_kind(engine: FileEngine) -> EngineKind {
    match engine {
        FileEngine::Host => EngineKind::Host,
        FileEngine::Marker | FileEngine::Static => EngineKind::Marker,
    }
}

fn utf8(rel: &str, bytes: Vec<u8>) -> Result<String, DomainError> {
    String::from_utf8(bytes)
        .map_err(|_| DomainError::InvalidPack(format!("template '{rel}' is not valid UTF-8")))
}

impl DependencyEntry {
    fn to_dependency(&self) -> Result<Dependency, DomainError> {
        match self {
            Self::Notation(text) => Ok(parse_notation(text, DependencyScope::default())),
            Self::Table(table) => table.to_dependency(),
        }
    }
}

impl DependencyTable {
    fn to_dependency(&self) -> Result<Dependency, DomainError> {
        let scope = self.scope;
        match (&self.catalog, &self.bundle, &self.module, &self.artifact) {
            (Some(alias), None, None, None) => Ok(Dependency::Catalog {
                alias: alias.clone(),
                scope,
            }),
            (None, Some(bundle), None, None) => Ok(Dependency::Bundle {
                bundle: bundle.clone(),
                scope,
            }),
            (None, None, Some(path), None) => Ok(Dependency::Module {
                path: path.trim_start_matches(':').replace(':', "/"),
                scope,
            }),
            (None, None, None, Some(notation)) => Coordinate::parse_notation(notation)
                .map(|c| Dependency::artifact(c, scope))
                .ok_or_else(|| {
                    DomainError::InvalidPack(format!(
                        "artifact '{notation}' is not 'group:artifact:version'"
                    ))
                }),
            _ => Err(DomainError::InvalidPack(
                "a dependency table needs exactly one of catalog, bundle, module or artifact".into(),
            )),
        }
    }
}

/// `:a:b` is module `a/b`, `g:a:v` an artifact, anything else a catalog alias.
fn parse_notation(text: &str, scope: DependencyScope) -> Dependency {
    if let Some(path) = text.strip_prefix(':') {
        return Dependency::Module {
            path: path.replace(':', "/"),
            scope,
        };
    }
    match Coordinate::parse_notation(text) {
        Some(coordinate) => Dependency::artifact(coordinate, scope),
        None => Dependency::Catalog {
            alias: text.to_string(),
            scope,
        },
    }
}

/// Normalise a path to forward slashes so Windows and Unix paths compare
/// identically.
fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const MINIMAL_MANIFEST: &str = r#"
[pack]
group   = "test"
name    = "base"
version = "1.0.0"
"#;

    /// Write a pack directory under `root`.
    fn write_pack(root: &Path, dir: &str, manifest: &str, files: &[(&str, &[u8])]) {
        let pack_dir = root.join(dir);
        fs::create_dir_all(&pack_dir).unwrap();
        fs::write(pack_dir.join(MANIFEST_FILE), manifest).unwrap();
        for (rel, content) in files {
            let full = pack_dir.join(rel);
            if let Some(parent) = full.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(full, content).unwrap();
        }
    }

    fn only_pack(root: &Path) -> PackDescriptor {
        let repo = DirectoryRepository::open(root).unwrap();
        assert_eq!(repo.len(), 1);
        let id = repo.ids().unwrap().remove(0);
        repo.get(&id).unwrap().unwrap()
    }

    #[test]
    fn open_fails_for_missing_dir() {
        let err = DirectoryRepository::open("/absolutely/does/not/exist").unwrap_err();
        assert!(matches!(
            err,
            WeaveError::Application(ApplicationError::RepositoryUnavailable { .. })
        ));
    }

    #[test]
    fn loads_identity_and_metadata() {
        let temp = TempDir::new().unwrap();
        write_pack(
            temp.path(),
            "ktor",
            r#"
[pack]
group        = "org.packweave"
name         = "ktor"
version      = "2.1.0"
display_name = "Ktor server"
description  = "HTTP server"
requires     = ["org.packweave:kotlin-jvm"]
tags         = ["http", "server"]

[properties.port]
type    = "integer"
default = 8080
"#,
            &[],
        );

        let pack = only_pack(temp.path());
        assert_eq!(pack.id, PackId::new("org.packweave", "ktor"));
        assert_eq!(pack.name, "Ktor server");
        assert_eq!(pack.version, "2.1.0");
        assert_eq!(pack.requires, [PackId::new("org.packweave", "kotlin-jvm")]);
        assert_eq!(pack.metadata.tags, ["http", "server"]);
        assert_eq!(
            pack.properties["port"].default,
            Some(packweave_core::domain::Value::Int(8080))
        );
    }

    #[test]
    fn auto_detects_engines_and_applies_overrides() {
        let temp = TempDir::new().unwrap();
        let manifest = format!(
            "{MINIMAL_MANIFEST}
[[files]]
path   = \"build.gradle.kts\"
engine = \"host\"

[[files]]
path       = \"gradlew\"
executable = true

[[files]]
path   = \"raw.txt\"
engine = \"static\"
"
        );
        write_pack(
            temp.path(),
            "base",
            &manifest,
            &[
                ("files/README.md", b"# {{project.name}}"),
                ("files/LICENSE", b"MIT"),
                ("files/build.gradle.kts", b"group = \"${Pack.value(\"project.group\")}\""),
                ("files/gradlew", b"#!/bin/sh"),
                ("files/raw.txt", b"{{kept}}"),
            ],
        );

        let pack = only_pack(temp.path());
        let by_path: BTreeMap<&str, &Source> = pack
            .sources
            .iter()
            .map(|s| (s.target().as_file().unwrap(), s))
            .collect();

        assert!(matches!(
            by_path["README.md"],
            Source::Template { engine: EngineKind::Marker, .. }
        ));
        assert!(matches!(by_path["LICENSE"], Source::Static { .. }));
        assert!(matches!(
            by_path["build.gradle.kts"],
            Source::Template { engine: EngineKind::Host, .. }
        ));
        assert!(by_path["gradlew"].is_executable());
        assert!(matches!(by_path["raw.txt"], Source::Static { .. }));
    }

    #[test]
    fn modules_dependencies_and_contributions() {
        let temp = TempDir::new().unwrap();
        let manifest = format!(
            r#"{MINIMAL_MANIFEST}
[[modules]]
path      = "server"
kind      = "application"
platforms = ["jvm"]
dir       = "server"
dependencies.common.main = ["kotlin-stdlib", ":shared", "io.ktor:ktor-core:3.0.0", {{ bundle = "ktor", scope = "api" }}]
dependencies.jvm.test = [{{ catalog = "junit" }}]

[[contributions]]
file = "slots/imports.kt"
slot = "test:base/imports"
"#
        );
        write_pack(
            temp.path(),
            "base",
            &manifest,
            &[
                ("server/src/App.kt", b"fun main() {}"),
                ("slots/imports.kt", b"import {{project.package}}.*"),
            ],
        );

        let pack = only_pack(temp.path());
        let module = &pack.modules[0];
        assert_eq!(module.path, "server");
        assert_eq!(module.kind, Some(ModuleKind::Application));
        assert!(module.platforms.contains(&Platform::Jvm));
        assert_eq!(module.sources[0].target().as_file(), Some("src/App.kt"));

        let common = &module.dependencies[&SourceSetKey::Common].main;
        assert_eq!(common[0], Dependency::catalog("kotlin-stdlib"));
        assert_eq!(common[1], Dependency::module("shared"));
        assert!(matches!(&common[2], Dependency::Artifact { artifact, .. } if artifact == "ktor-core"));
        assert!(matches!(
            &common[3],
            Dependency::Bundle { bundle, scope: DependencyScope::Api } if bundle == "ktor"
        ));
        assert_eq!(
            module.dependencies[&SourceSetKey::Platform(Platform::Jvm)].test,
            [Dependency::catalog("junit")]
        );

        let contribution = &pack.sources[0];
        assert_eq!(
            contribution.target().as_slot().map(ToString::to_string).as_deref(),
            Some("slot://test:base/imports")
        );
    }

    #[test]
    fn invalid_packs_are_skipped() {
        let temp = TempDir::new().unwrap();
        write_pack(temp.path(), "good", MINIMAL_MANIFEST, &[]);
        write_pack(temp.path(), "broken", "[pack]\nname = 3", &[]);
        write_pack(
            temp.path(),
            "dangling",
            &MINIMAL_MANIFEST.replace("base", "dangling").replace(
                "1.0.0\"",
                "1.0.0\"\n[[files]]\npath = \"missing.txt\"",
            ),
            &[("files/present.txt", b"x")],
        );
        fs::create_dir_all(temp.path().join("not-a-pack")).unwrap();

        let repo = DirectoryRepository::open(temp.path()).unwrap();
        assert_eq!(repo.ids().unwrap(), [PackId::new("test", "base")]);
    }

    #[test]
    fn catalog_is_read_lazily_and_failures_are_loud() {
        let temp = TempDir::new().unwrap();
        write_pack(temp.path(), "base", MINIMAL_MANIFEST, &[]);
        let repo = DirectoryRepository::open(temp.path()).unwrap();
        assert_eq!(repo.versions().unwrap(), VersionsCatalog::new());

        fs::write(
            temp.path().join(CATALOG_FILE),
            r#"
[versions]
ktor = "3.0.0"

[libraries]
ktor-core = { module = "io.ktor:ktor-server-core", version.ref = "ktor" }
"#,
        )
        .unwrap();
        let catalog = repo.versions().unwrap();
        assert_eq!(catalog.library("ktor-core").unwrap().version, "3.0.0");

        fs::write(temp.path().join(CATALOG_FILE), "[libraries\n").unwrap();
        assert!(repo.versions().is_err());
    }
}
