//! Source path rewriting.
//!
//! Packs write their files against a short layout (`src/App.kt`,
//! `test@jvm/AppTest.kt`, `resources/app.conf`). Rules installed on a
//! [`SourcePathTransform`] expand those into the canonical directory layout
//! of the build the project uses. Each rule is active only when its marker
//! pack is part of the project.
//!
//! Rewriting is idempotent: canonical paths are never touched, so applying
//! the transform twice gives the same result as applying it once.

use std::collections::BTreeSet;
use std::fmt;

use tracing::{debug, trace};

use crate::domain::entities::{
    module::{ModuleKind, Platform},
    pack::PackId,
    project::Project,
    source::SourceTarget,
};

/// Default marker of [`MultiplatformLayout`].
pub const MULTIPLATFORM_MARKER: (&str, &str) = ("org.packweave", "kotlin-multiplatform");
/// Default marker of [`JvmLayout`].
pub const JVM_MARKER: (&str, &str) = ("org.packweave", "kotlin-jvm");

/// What a rule may know about the module owning a path.
#[derive(Debug, Clone, Copy)]
pub struct ModuleLayout<'a> {
    pub path: &'a str,
    pub kind: ModuleKind,
    pub platforms: &'a BTreeSet<Platform>,
}

pub trait PathRule: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    /// Whether the rule is active for a project with these packs.
    fn applies_to(&self, packs: &BTreeSet<PackId>) -> bool;

    /// New path, or `None` to leave the path as it is.
    fn rewrite(&self, path: &str, module: &ModuleLayout<'_>) -> Option<String>;
}

/// Ordered list of path rules.
#[derive(Debug, Default)]
pub struct SourcePathTransform {
    rules: Vec<Box<dyn PathRule>>,
}

impl SourcePathTransform {
    /// No rules: every path passes through.
    pub fn new() -> Self {
        Self::default()
    }

    /// Multiplatform and JVM layouts keyed on their default markers.
    pub fn standard() -> Self {
        Self::with_markers(
            PackId::new(MULTIPLATFORM_MARKER.0, MULTIPLATFORM_MARKER.1),
            PackId::new(JVM_MARKER.0, JVM_MARKER.1),
        )
    }

    pub fn with_markers(multiplatform: PackId, jvm: PackId) -> Self {
        Self::new()
            .with_rule(MultiplatformLayout::new(multiplatform))
            .with_rule(JvmLayout::new(jvm))
    }

    pub fn with_rule(mut self, rule: impl PathRule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    pub fn rules(&self) -> impl Iterator<Item = &dyn PathRule> {
        self.rules.iter().map(AsRef::as_ref)
    }

    /// Rewrite every file target of the project.
    pub fn apply(&self, mut project: Project) -> Project {
        let packs = project.pack_set();
        let active: Vec<&dyn PathRule> = self.rules().filter(|r| r.applies_to(&packs)).collect();
        if active.is_empty() {
            return project;
        }
        debug!(
            rules = ?active.iter().map(|r| r.name()).collect::<Vec<_>>(),
            "rewriting source paths"
        );

        for module in &mut project.modules {
            let layout = ModuleLayout {
                path: &module.path,
                kind: module.kind,
                platforms: &module.platforms,
            };
            for entry in &mut module.sources {
                if let SourceTarget::File(path) = entry.source.target_mut() {
                    let rewritten = rewrite_with(&active, path, &layout);
                    if rewritten != *path {
                        trace!(from = %path, to = %rewritten, "rewrote path");
                        *path = rewritten;
                    }
                }
            }
        }
        project
    }
}

fn rewrite_with(rules: &[&dyn PathRule], path: &str, layout: &ModuleLayout<'_>) -> String {
    let mut current = path.to_string();
    for rule in rules {
        if let Some(next) = rule.rewrite(&current, layout) {
            current = next;
        }
    }
    current
}

// ── Shared path analysis ─────────────────────────────────────────────────────

/// Which conventional root a short path starts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Root {
    Sources,
    Tests,
    Resources,
    TestResources,
}

impl Root {
    fn is_test(self) -> bool {
        matches!(self, Self::Tests | Self::TestResources)
    }

    fn language_dir(self) -> &'static str {
        match self {
            Self::Sources | Self::Tests => "kotlin",
            Self::Resources | Self::TestResources => "resources",
        }
    }
}

/// `<root>[@platform]/<rest>` split into its parts.
struct ShortPath<'p> {
    root: Root,
    platform: Option<&'p str>,
    rest: &'p str,
}

fn short_path(path: &str) -> Option<ShortPath<'_>> {
    let (head, rest) = path.split_once('/')?;
    if head == "src" && is_canonical(rest) {
        return None;
    }
    let (root, platform) = match head.split_once('@') {
        Some((root, platform)) => (root, Some(platform)),
        None => (head, None),
    };
    let root = match root {
        "src" => Root::Sources,
        "test" => Root::Tests,
        "resources" => Root::Resources,
        "testResources" => Root::TestResources,
        _ => return None,
    };
    Some(ShortPath {
        root,
        platform,
        rest,
    })
}

/// `main/…`, `test/…`, `<x>Main/…` or `<x>Test/…` under `src/`.
fn is_canonical(under_src: &str) -> bool {
    let Some((dir, _)) = under_src.split_once('/') else {
        return false;
    };
    matches!(dir, "main" | "test")
        || ["Main", "Test"]
            .iter()
            .any(|suffix| dir.len() > suffix.len() && dir.ends_with(suffix))
}

// ── Rules ────────────────────────────────────────────────────────────────────

/// Kotlin Multiplatform source sets: `src/<set>Main/kotlin/…`.
#[derive(Debug, Clone)]
pub struct MultiplatformLayout {
    marker: PackId,
}

impl MultiplatformLayout {
    pub fn new(marker: PackId) -> Self {
        Self { marker }
    }
}

impl PathRule for MultiplatformLayout {
    fn name(&self) -> &str {
        "multiplatform-layout"
    }

    fn applies_to(&self, packs: &BTreeSet<PackId>) -> bool {
        packs.contains(&self.marker)
    }

    fn rewrite(&self, path: &str, module: &ModuleLayout<'_>) -> Option<String> {
        let short = short_path(path)?;
        let source_set = match short.platform {
            Some(name) => name.parse::<Platform>().ok()?.source_set(),
            None => match single(module.platforms) {
                Some(platform) => platform.source_set(),
                None => "common",
            },
        };
        let flavor = if short.root.is_test() { "Test" } else { "Main" };
        Some(format!(
            "src/{source_set}{flavor}/{}/{}",
            short.root.language_dir(),
            short.rest
        ))
    }
}

fn single(platforms: &BTreeSet<Platform>) -> Option<Platform> {
    let mut iter = platforms.iter();
    match (iter.next(), iter.next()) {
        (Some(only), None) => Some(*only),
        _ => None,
    }
}

/// Single-target JVM layout: `src/main/kotlin/…`.
#[derive(Debug, Clone)]
pub struct JvmLayout {
    marker: PackId,
}

impl JvmLayout {
    pub fn new(marker: PackId) -> Self {
        Self { marker }
    }
}

impl PathRule for JvmLayout {
    fn name(&self) -> &str {
        "jvm-layout"
    }

    fn applies_to(&self, packs: &BTreeSet<PackId>) -> bool {
        packs.contains(&self.marker)
    }

    fn rewrite(&self, path: &str, _module: &ModuleLayout<'_>) -> Option<String> {
        let short = short_path(path)?;
        if short.platform.is_some_and(|p| p != "jvm") {
            return None;
        }
        let flavor = if short.root.is_test() { "test" } else { "main" };
        Some(format!(
            "src/{flavor}/{}/{}",
            short.root.language_dir(),
            short.rest
        ))
    }
}
