// ============================================================================
//  CLEAN MODULE BOUNDARIES
// ============================================================================

//! Core domain layer for packweave.
//!
//! Pure logic: pack graph resolution, slot binding, template parsing and
//! rendering, path rewriting. Repositories and the filesystem are reached
//! through ports defined in the application layer.
//!
//! ## Hexagonal Architecture Compliance
//!
//! - **No async**: Domain logic is synchronous
//! - **No I/O**: Packs arrive through [`resolution::PackLookup`]
//! - **Immutable inputs**: Pack descriptors are never modified after loading
//! - **Rich domain model**: Behavior lives in entities, not services

pub mod entities;
pub mod error;
pub mod resolution;
pub mod template;
pub mod transform;
pub mod value_objects;

mod validation;

pub use entities::{
    catalog::VersionsCatalog,
    common::RelativePath,
    dependency::{Coordinate, Dependency, DependencyScope, DependencySet, ResolvedDependency},
    module::{ModuleKind, Platform, SourceModule, SourceSetKey},
    pack::{PackBuilder, PackDescriptor, PackId, PackMetadata, PropertyDecl},
    project::{Project, ProjectDescriptor, ProjectSource, ResolvedModule},
    project_structure::{GeneratedFile, GeneratedProject},
    source::{EngineKind, SlotAddress, Source, SourceTarget},
};

pub use error::{DomainError, ErrorCategory};

pub use resolution::{PackLookup, SlotBindings, bind_slots, resolve};
pub use template::{Block, BlockKind, render::Renderer};
pub use transform::{JvmLayout, ModuleLayout, MultiplatformLayout, PathRule, SourcePathTransform};
pub use value_objects::{PropertyEnv, PropertyType, Value};

pub use validation::DomainValidator;

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    /// In-memory lookup for end-to-end domain tests.
    #[derive(Default)]
    struct Packs(BTreeMap<PackId, PackDescriptor>);

    impl Packs {
        fn with(mut self, pack: PackDescriptor) -> Self {
            self.0.insert(pack.id.clone(), pack);
            self
        }
    }

    impl PackLookup for Packs {
        type Error = DomainError;

        fn get(&self, id: &PackId) -> Result<Option<PackDescriptor>, DomainError> {
            Ok(self.0.get(id).cloned())
        }

        fn versions(&self) -> Result<VersionsCatalog, DomainError> {
            Ok(VersionsCatalog::new())
        }
    }

    fn id(name: &str) -> PackId {
        PackId::new("test", name)
    }

    /// Resolve, bind and render the root module's `out.txt`.
    fn render_out(repo: &Packs, descriptor: &ProjectDescriptor) -> Result<String, DomainError> {
        let project = resolve(descriptor, repo)?;
        let bindings = bind_slots(&project.packs);
        let renderer = Renderer::for_project(&project, &bindings);

        let root = project.module("").expect("root module");
        let entry = root
            .sources
            .iter()
            .find(|s| s.source.target().as_file() == Some("out.txt"))
            .expect("out.txt");
        let Source::Template { body, engine, .. } = &entry.source else {
            panic!("out.txt should be a template");
        };
        renderer.render_str(body, *engine, &entry.owner, PropertyEnv::new())
    }

    fn base(body: &str) -> PackDescriptor {
        PackDescriptor::builder(id("base"))
            .source(Source::marker_file("out.txt", body))
            .build()
            .unwrap()
    }

    fn contributor(name: &str, slot: &str, body: &str) -> PackDescriptor {
        PackDescriptor::builder(id(name))
            .requires(id("base"))
            .source(Source::template(
                SourceTarget::slot(id("base"), slot),
                body,
                EngineKind::Marker,
            ))
            .build()
            .unwrap()
    }

    #[test]
    fn hello_world() {
        let repo = Packs::default().with(base("Hello, {{name}}!"));
        let descriptor = ProjectDescriptor::new("demo", "org.example")
            .with_pack(id("base"))
            .with_property("name", "World");
        assert_eq!(render_out(&repo, &descriptor).unwrap(), "Hello, World!");
    }

    #[test]
    fn escaped_marker_next_to_a_live_one() {
        let repo = Packs::default().with(base(r"\{{name}} is {{name}}"));
        let descriptor = ProjectDescriptor::new("demo", "g")
            .with_pack(id("base"))
            .with_property("name", "x");
        assert_eq!(render_out(&repo, &descriptor).unwrap(), "{{name}} is x");
    }

    #[test]
    fn repeating_slot_follows_selection_order() {
        let repo = Packs::default()
            .with(base("{{@slots deps}}"))
            .with(contributor("a", "deps", "A"))
            .with(contributor("b", "deps", "B"));

        let forward = ProjectDescriptor::new("demo", "g").with_packs([id("base"), id("a"), id("b")]);
        let reverse = ProjectDescriptor::new("demo", "g").with_packs([id("base"), id("b"), id("a")]);
        assert_eq!(render_out(&repo, &forward).unwrap(), "AB");
        assert_eq!(render_out(&repo, &reverse).unwrap(), "BA");
    }

    #[test]
    fn singular_slot_is_last_writer_wins() {
        let repo = Packs::default()
            .with(base("[{{@slot main}}]"))
            .with(contributor("a", "main", "A"))
            .with(contributor("b", "main", "B"));

        let descriptor = ProjectDescriptor::new("demo", "g").with_packs([id("a"), id("b")]);
        assert_eq!(render_out(&repo, &descriptor).unwrap(), "[B]");
    }

    #[test]
    fn rendering_is_deterministic() {
        let repo = Packs::default()
            .with(base("{{project.pascal}}:{{@slots deps}}"))
            .with(contributor("a", "deps", "{{project.snake}};"))
            .with(contributor("b", "deps", "{{project.kebab}};"));
        let descriptor = ProjectDescriptor::new("My App", "g").with_packs([id("a"), id("b")]);

        let first = render_out(&repo, &descriptor).unwrap();
        for _ in 0..5 {
            assert_eq!(render_out(&repo, &descriptor).unwrap(), first);
        }
        assert_eq!(first, "MyApp:my_app;my-app;");
    }
}
