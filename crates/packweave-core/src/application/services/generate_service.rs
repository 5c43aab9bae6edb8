//! Generate Service - main application orchestrator.
//!
//! This service coordinates the whole generation workflow:
//! 1. Resolve the pack graph into a project
//! 2. Bind slot contributions
//! 3. Rewrite source paths into the target layout
//! 4. Render every file
//! 5. Write the result through the filesystem port

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, instrument, trace, warn};

use crate::{
    application::{
        ApplicationError,
        ports::{Filesystem, PackRepository},
    },
    domain::{
        DomainError, DomainValidator as validator, EngineKind, GeneratedFile, GeneratedProject,
        PackDescriptor, PackId, ProjectDescriptor, ProjectSource, PropertyEnv, RelativePath,
        Renderer, ResolvedModule, SlotAddress, Source, SourcePathTransform, bind_slots,
        resolution::FragmentContent,
        resolve,
        template::{self, render::DEFAULT_MAX_SLOT_DEPTH},
    },
    error::{WeaveError, WeaveResult},
};

/// Information about a pack for display purposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackInfo {
    pub id: String,
    pub name: String,
    pub version: String,
    pub description: String,
    pub requires: Vec<String>,
    pub tags: Vec<String>,
}

impl From<&PackDescriptor> for PackInfo {
    fn from(pack: &PackDescriptor) -> Self {
        Self {
            id: pack.id.to_string(),
            name: pack.name.clone(),
            version: pack.version.clone(),
            description: pack.description.clone(),
            requires: pack.requires.iter().map(ToString::to_string).collect(),
            tags: pack.metadata.tags.clone(),
        }
    }
}

/// Main generation service.
pub struct GenerateService {
    repository: Arc<dyn PackRepository>,
    filesystem: Box<dyn Filesystem>,
    transform: SourcePathTransform,
    max_slot_depth: usize,
}

impl GenerateService {
    /// Create a service with the standard path layouts.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// use std::sync::Arc;
    /// use packweave_core::application::GenerateService;
    ///
    /// let service = GenerateService::new(
    ///     Arc::new(repository), // impl PackRepository
    ///     Box::new(filesystem), // impl Filesystem
    /// );
    /// ```
    pub fn new(repository: Arc<dyn PackRepository>, filesystem: Box<dyn Filesystem>) -> Self {
        Self {
            repository,
            filesystem,
            transform: SourcePathTransform::standard(),
            max_slot_depth: DEFAULT_MAX_SLOT_DEPTH,
        }
    }

    /// Replace the path transform pipeline.
    pub fn with_transform(mut self, transform: SourcePathTransform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_max_slot_depth(mut self, depth: usize) -> Self {
        self.max_slot_depth = depth;
        self
    }

    /// Resolve and render a project without touching the filesystem.
    ///
    /// The result is complete or an error: no partially rendered project is
    /// ever returned.
    #[instrument(skip_all, fields(project = %descriptor.name, packs = descriptor.packs.len()))]
    pub fn generate(&self, descriptor: &ProjectDescriptor) -> WeaveResult<GeneratedProject> {
        validator::validate_descriptor(descriptor)?;

        let project = resolve(descriptor, &*self.repository)?;
        let bindings = bind_slots(&project.packs);
        let project = self.transform.apply(project);
        let renderer = Renderer::for_project(&project, &bindings).with_max_depth(self.max_slot_depth);

        let mut declared = BTreeSet::new();
        let mut generated = GeneratedProject::new(&project.name);
        for module in &project.modules {
            let mut locals = PropertyEnv::new();
            locals.set("module", module.to_value());
            for entry in &module.sources {
                let file = render_file(&renderer, module, entry, &locals, &mut declared)?;
                trace!(path = %file.path, owner = %file.owner, bytes = file.size(), "rendered file");
                generated.add_file(file);
            }
        }

        // Fragments may declare slots of their own. A fragment that does not
        // parse fails here even when no template renders it.
        for (address, fragment) in bindings.fragments() {
            if let FragmentContent::Template { body, engine } = &fragment.content {
                let blocks = template::parse(body, *engine).map_err(|e| {
                    debug!(
                        slot = %address,
                        contributor = %fragment.contributor,
                        error = %e,
                        "fragment does not parse"
                    );
                    e.located(fragment.contributor.to_string(), address.to_string())
                })?;
                declare_slots(&blocks, &fragment.contributor, &mut declared);
            }
        }
        for address in bindings.unbound(&declared) {
            debug!(slot = %address, "slot has contributions but no template declares it");
        }

        validator::validate_generated(&generated)?;
        info!(
            files = generated.file_count(),
            bytes = generated.total_bytes(),
            "Project generated"
        );
        Ok(generated)
    }

    /// Write a generated project under `root`.
    ///
    /// An existing `root` is refused unless `force` is set. When this call
    /// created `root` and a write fails, the directory is removed again.
    #[instrument(skip_all, fields(root = %root.display(), files = generated.file_count(), force = force))]
    pub fn export(&self, generated: &GeneratedProject, root: &Path, force: bool) -> WeaveResult<()> {
        let existed = self.filesystem.exists(root);
        if existed && !force {
            return Err(ApplicationError::ProjectExists {
                path: root.to_path_buf(),
            }
            .into());
        }

        match self.write_all(generated, root) {
            Ok(()) => {
                info!("Successfully wrote all files");
                Ok(())
            }
            Err(e) if existed => {
                warn!(error = %e, "Write failed; leaving pre-existing directory in place");
                Err(e)
            }
            Err(e) => {
                warn!(error = %e, "Write failed, attempting rollback");
                self.rollback(root, &e)?;
                Err(e)
            }
        }
    }

    /// Every pack in the repository, sorted by id.
    pub fn list_packs(&self) -> WeaveResult<Vec<PackInfo>> {
        let mut infos = Vec::new();
        for id in self.repository.ids()? {
            match self.repository.get(&id)? {
                Some(pack) => infos.push(PackInfo::from(&pack)),
                None => warn!(pack = %id, "listed pack vanished from repository"),
            }
        }
        infos.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(infos)
    }

    // -------------------------------------------------------------------------
    // Internal Helpers
    // -------------------------------------------------------------------------

    fn write_all(&self, generated: &GeneratedProject, root: &Path) -> WeaveResult<()> {
        self.filesystem.create_dir_all(root)?;

        for file in &generated.files {
            let path = root.join(file.path.as_path());
            if let Some(parent) = path.parent() {
                self.filesystem.create_dir_all(parent)?;
            }
            self.filesystem.write_file(&path, &file.bytes)?;
            if file.executable {
                self.filesystem.set_permissions(&path, true)?;
            }
        }
        Ok(())
    }

    fn rollback(&self, root: &Path, cause: &WeaveError) -> WeaveResult<()> {
        match self.filesystem.remove_dir_all(root) {
            Ok(()) => {
                info!("Rollback successful");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, path = %root.display(), "Rollback failed");
                Err(ApplicationError::RollbackFailed {
                    path: root.to_path_buf(),
                    reason: format!("{e} (after: {cause})"),
                }
                .into())
            }
        }
    }
}

/// Render one file source of `module`.
fn render_file(
    renderer: &Renderer<'_>,
    module: &ResolvedModule,
    entry: &ProjectSource,
    locals: &PropertyEnv,
    declared: &mut BTreeSet<SlotAddress>,
) -> Result<GeneratedFile, DomainError> {
    let owner = &entry.owner;
    let Some(target) = entry.source.target().as_file() else {
        return Err(DomainError::InvalidPack(format!(
            "slot contribution from '{owner}' ended up among module files"
        )));
    };
    let locate = |e: DomainError| e.located(owner.to_string(), target);

    let relative = if target.contains("{{") {
        renderer
            .render_str(target, EngineKind::Marker, owner, locals.clone())
            .map_err(locate)?
    } else {
        target.to_string()
    };
    let full = if module.path.is_empty() {
        relative
    } else {
        format!("{}/{}", module.path, relative)
    };
    let path = RelativePath::try_new(&full).map_err(locate)?;

    let bytes = match &entry.source {
        Source::Static { bytes, .. } => bytes.clone(),
        Source::Template { body, engine, .. } => {
            let blocks = template::parse(body, *engine).map_err(locate)?;
            declare_slots(&blocks, owner, declared);
            renderer
                .render(&blocks, owner, locals.clone())
                .map_err(locate)?
                .into_bytes()
        }
    };

    let mut file = GeneratedFile::new(path, bytes, owner.clone());
    file.executable = entry.source.is_executable();
    Ok(file)
}

fn declare_slots(
    blocks: &[template::Block],
    owner: &PackId,
    declared: &mut BTreeSet<SlotAddress>,
) {
    for name in template::slot_names(blocks) {
        declared.insert(SlotAddress::new(owner.clone(), name));
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::application::ports::{MockFilesystem, MockPackRepository};
    use crate::domain::{SourceModule, SourceTarget, VersionsCatalog};

    fn id(name: &str) -> PackId {
        PackId::new("test", name)
    }

    fn repository(packs: Vec<PackDescriptor>) -> MockPackRepository {
        let packs: BTreeMap<PackId, PackDescriptor> =
            packs.into_iter().map(|p| (p.id.clone(), p)).collect();
        let ids: Vec<PackId> = packs.keys().cloned().collect();

        let mut repo = MockPackRepository::new();
        repo.expect_ids().returning(move || Ok(ids.clone()));
        repo.expect_get()
            .returning(move |id| Ok(packs.get(id).cloned()));
        repo.expect_versions()
            .returning(|| Ok(VersionsCatalog::new()));
        repo
    }

    fn service(packs: Vec<PackDescriptor>, fs: MockFilesystem) -> GenerateService {
        GenerateService::new(Arc::new(repository(packs)), Box::new(fs))
    }

    fn generate(packs: Vec<PackDescriptor>, descriptor: &ProjectDescriptor) -> WeaveResult<GeneratedProject> {
        service(packs, MockFilesystem::new()).generate(descriptor)
    }

    fn demo(packs: &[&str]) -> ProjectDescriptor {
        ProjectDescriptor::new("demo", "org.example").with_packs(packs.iter().map(|p| id(p)))
    }

    #[test]
    fn renders_module_files_under_module_path() {
        let pack = PackDescriptor::builder(id("app"))
            .source(Source::marker_file("README.md", "# {{project.name}}"))
            .module(SourceModule::new("app").source(Source::marker_file(
                "{{module.name}}.txt",
                "module {{module.path}}",
            )))
            .build()
            .unwrap();

        let generated = generate(vec![pack], &demo(&["app"])).unwrap();
        assert_eq!(generated.file("README.md").unwrap().text(), Some("# demo"));
        assert_eq!(generated.file("app/app.txt").unwrap().text(), Some("module app"));
    }

    #[test]
    fn static_sources_keep_bytes_and_executable_bit() {
        let pack = PackDescriptor::builder(id("tools"))
            .source(Source::static_file("gradlew", b"#!/bin/sh\n{{not rendered}}".to_vec()).executable())
            .build()
            .unwrap();

        let generated = generate(vec![pack], &demo(&["tools"])).unwrap();
        let file = generated.file("gradlew").unwrap();
        assert!(file.executable);
        assert_eq!(file.text(), Some("#!/bin/sh\n{{not rendered}}"));
    }

    #[test]
    fn jvm_marker_rewrites_source_roots() {
        let marker = PackDescriptor::builder(PackId::new("org.packweave", "kotlin-jvm"))
            .source(Source::marker_file("src/Main.kt", "fun main() {}"))
            .build()
            .unwrap();
        let descriptor = ProjectDescriptor::new("demo", "g")
            .with_pack(PackId::new("org.packweave", "kotlin-jvm"));

        let generated = generate(vec![marker], &descriptor).unwrap();
        assert!(generated.file("src/main/kotlin/Main.kt").is_some());
    }

    #[test]
    fn missing_pack_is_reported() {
        let err = generate(vec![], &demo(&["ghost"])).unwrap_err();
        assert!(matches!(err.domain(), Some(DomainError::PackNotFound { .. })));
    }

    #[test]
    fn render_errors_name_pack_and_file() {
        let pack = PackDescriptor::builder(id("app"))
            .source(Source::marker_file("a.txt", "{{undeclared}}"))
            .build()
            .unwrap();

        let err = generate(vec![pack], &demo(&["app"])).unwrap_err();
        match err {
            WeaveError::Domain(DomainError::Located { pack, path, error }) => {
                assert_eq!(pack, "test:app");
                assert_eq!(path, "a.txt");
                assert!(matches!(*error, DomainError::MissingProperty { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn two_packs_writing_one_path_conflict() {
        let a = PackDescriptor::builder(id("a"))
            .source(Source::marker_file("same.txt", "a"))
            .build()
            .unwrap();
        let b = PackDescriptor::builder(id("b"))
            .source(Source::marker_file("same.txt", "b"))
            .build()
            .unwrap();

        let err = generate(vec![a, b], &demo(&["a", "b"])).unwrap_err();
        assert!(matches!(err.domain(), Some(DomainError::TargetPathConflict { .. })));
    }

    #[test]
    fn unused_contributions_are_not_errors() {
        let base = PackDescriptor::builder(id("base"))
            .source(Source::marker_file("out.txt", "plain"))
            .build()
            .unwrap();
        let extra = PackDescriptor::builder(id("extra"))
            .requires(id("base"))
            .source(Source::template(
                SourceTarget::slot(id("base"), "nowhere"),
                "ignored",
                EngineKind::Marker,
            ))
            .build()
            .unwrap();

        let generated = generate(vec![base, extra], &demo(&["extra"])).unwrap();
        assert_eq!(generated.file_count(), 1);
    }

    #[test]
    fn malformed_unused_contribution_is_reported() {
        let base = PackDescriptor::builder(id("base"))
            .source(Source::marker_file("out.txt", "plain"))
            .build()
            .unwrap();
        let extra = PackDescriptor::builder(id("extra"))
            .requires(id("base"))
            .source(Source::template(
                SourceTarget::slot(id("base"), "nowhere"),
                "{{#if open}}never closed",
                EngineKind::Marker,
            ))
            .build()
            .unwrap();

        let err = generate(vec![base, extra], &demo(&["extra"])).unwrap_err();
        match err {
            WeaveError::Domain(DomainError::Located { pack, path, error }) => {
                assert_eq!(pack, "test:extra");
                assert_eq!(path, "slot://test:base/nowhere");
                assert!(matches!(*error, DomainError::TemplateSyntaxError { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_invalid_requests_before_touching_the_repository() {
        let mut repo = MockPackRepository::new();
        repo.expect_get().never();
        let service = GenerateService::new(Arc::new(repo), Box::new(MockFilesystem::new()));

        let err = service.generate(&ProjectDescriptor::new("demo", "g")).unwrap_err();
        assert_eq!(err.category(), crate::error::ErrorCategory::Validation);
    }

    #[test]
    fn list_packs_is_sorted() {
        let packs = ["zeta", "alpha", "mid"]
            .iter()
            .map(|n| {
                PackDescriptor::builder(id(n))
                    .description(format!("the {n} pack"))
                    .build()
                    .unwrap()
            })
            .collect();

        let infos = service(packs, MockFilesystem::new()).list_packs().unwrap();
        let ids: Vec<_> = infos.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["test:alpha", "test:mid", "test:zeta"]);
        assert_eq!(infos[0].description, "the alpha pack");
    }

    // -------------------------------------------------------------------------
    // Export
    // -------------------------------------------------------------------------

    fn one_file() -> GeneratedProject {
        let mut file = GeneratedFile::new(
            RelativePath::try_new("bin/run").unwrap(),
            b"echo hi".to_vec(),
            id("app"),
        );
        file.executable = true;
        GeneratedProject::new("demo").with_file(file)
    }

    #[test]
    fn export_refuses_existing_root() {
        let mut fs = MockFilesystem::new();
        fs.expect_exists().return_const(true);
        fs.expect_write_file().never();

        let err = service(vec![], fs)
            .export(&one_file(), Path::new("/out"), false)
            .unwrap_err();
        assert!(matches!(
            err,
            WeaveError::Application(ApplicationError::ProjectExists { .. })
        ));
    }

    #[test]
    fn export_writes_and_marks_executables() {
        let mut fs = MockFilesystem::new();
        fs.expect_exists().return_const(false);
        fs.expect_create_dir_all().returning(|_| Ok(()));
        fs.expect_write_file()
            .withf(|path, bytes| path == Path::new("/out/bin/run") && bytes == b"echo hi")
            .times(1)
            .returning(|_, _| Ok(()));
        fs.expect_set_permissions()
            .withf(|path, executable| path == Path::new("/out/bin/run") && *executable)
            .times(1)
            .returning(|_, _| Ok(()));

        service(vec![], fs)
            .export(&one_file(), Path::new("/out"), false)
            .unwrap();
    }

    #[test]
    fn export_rolls_back_a_root_it_created() {
        let mut fs = MockFilesystem::new();
        fs.expect_exists().return_const(false);
        fs.expect_create_dir_all().returning(|_| Ok(()));
        fs.expect_write_file().returning(|path, _| {
            Err(ApplicationError::FilesystemError {
                path: path.to_path_buf(),
                reason: "disk full".into(),
            }
            .into())
        });
        fs.expect_remove_dir_all()
            .withf(|path| path == Path::new("/out"))
            .times(1)
            .returning(|_| Ok(()));

        let err = service(vec![], fs)
            .export(&one_file(), Path::new("/out"), false)
            .unwrap_err();
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn forced_export_never_removes_existing_root() {
        let mut fs = MockFilesystem::new();
        fs.expect_exists().return_const(true);
        fs.expect_create_dir_all().returning(|_| Ok(()));
        fs.expect_write_file().returning(|path, _| {
            Err(ApplicationError::FilesystemError {
                path: path.to_path_buf(),
                reason: "read-only".into(),
            }
            .into())
        });
        fs.expect_remove_dir_all().never();

        assert!(
            service(vec![], fs)
                .export(&one_file(), Path::new("/out"), true)
                .is_err()
        );
    }
}
