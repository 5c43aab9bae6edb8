//! Block evaluation.
//!
//! # Scopes
//!
//! A name is looked up, innermost first, in:
//!
//! 1. local frames pushed by `each` and by the caller (e.g. `module`),
//! 2. the scope of the pack whose content is rendering,
//! 3. the global project scope.
//!
//! The first scope holding a value wins. A name that some scope declares
//! without a value is *absent*; one that no scope declares is *unknown*.
//!
//! # Slots
//!
//! Fragments render in their contributor's scope, not the declaring
//! template's. The chain of slots being expanded is tracked so that a
//! fragment reaching a slot already on the chain fails instead of recursing
//! forever.

use std::collections::BTreeMap;

use tracing::trace;

use super::{Block, BlockKind, SlotRef, ValueExpr, parse};
use crate::domain::{
    entities::{
        pack::PackId,
        project::Project,
        source::{EngineKind, SlotAddress},
    },
    error::DomainError,
    resolution::slots::{FragmentContent, SlotBindings, SlotFragment},
    value_objects::{Lookup, PropertyEnv, Value},
};

/// Maximum slot nesting before expansion is treated as a cycle.
pub const DEFAULT_MAX_SLOT_DEPTH: usize = 16;

#[derive(Debug, Clone, PartialEq)]
enum Resolution {
    Found(Value),
    Absent,
    Unknown,
}

/// Renders parsed templates against a resolved project.
#[derive(Debug, Clone, Copy)]
pub struct Renderer<'a> {
    global: &'a PropertyEnv,
    pack_scopes: &'a BTreeMap<PackId, PropertyEnv>,
    bindings: &'a SlotBindings,
    max_depth: usize,
}

/// Per-call rendering state.
struct Frame<'s> {
    pack: &'s PackId,
    locals: Vec<PropertyEnv>,
    chain: &'s [SlotAddress],
}

impl<'a> Renderer<'a> {
    pub fn new(
        global: &'a PropertyEnv,
        pack_scopes: &'a BTreeMap<PackId, PropertyEnv>,
        bindings: &'a SlotBindings,
    ) -> Self {
        Self {
            global,
            pack_scopes,
            bindings,
            max_depth: DEFAULT_MAX_SLOT_DEPTH,
        }
    }

    pub fn for_project(project: &'a Project, bindings: &'a SlotBindings) -> Self {
        Self::new(&project.properties, &project.pack_scopes, bindings)
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Render blocks owned by `pack`, with `locals` as the outermost local
    /// frame.
    pub fn render(
        &self,
        blocks: &[Block],
        pack: &PackId,
        locals: PropertyEnv,
    ) -> Result<String, DomainError> {
        let mut frame = Frame {
            pack,
            locals: vec![locals],
            chain: &[],
        };
        let mut out = String::new();
        self.blocks(blocks, &mut frame, &mut out)?;
        Ok(out)
    }

    /// Parse and render in one step.
    pub fn render_str(
        &self,
        body: &str,
        engine: EngineKind,
        pack: &PackId,
        locals: PropertyEnv,
    ) -> Result<String, DomainError> {
        let blocks = parse(body, engine)?;
        self.render(&blocks, pack, locals)
    }

    fn blocks(&self, blocks: &[Block], frame: &mut Frame<'_>, out: &mut String) -> Result<(), DomainError> {
        for block in blocks {
            self.block(block, frame, out)?;
        }
        Ok(())
    }

    fn block(&self, block: &Block, frame: &mut Frame<'_>, out: &mut String) -> Result<(), DomainError> {
        match &block.kind {
            BlockKind::Literal(text) => out.push_str(text),
            BlockKind::Value(expr) => out.push_str(&self.value(expr, frame)?),
            BlockKind::NamedSlot(slot) => {
                let address = SlotAddress::new(frame.pack.clone(), slot.name.as_str());
                let chain = self.enter(frame, &address)?;
                if let Some(fragment) = self.bindings.singular(&address) {
                    self.place(slot, fragment, &chain, out)?;
                }
            }
            BlockKind::RepeatingSlot(slot) => {
                let address = SlotAddress::new(frame.pack.clone(), slot.name.as_str());
                let chain = self.enter(frame, &address)?;
                for fragment in self.bindings.repeating(&address) {
                    self.place(slot, fragment, &chain, out)?;
                }
            }
            BlockKind::Conditional {
                property,
                branches,
                otherwise,
            } => {
                let chosen = match self.resolve(property, frame) {
                    Resolution::Found(value) => branches
                        .iter()
                        .find(|branch| branch.value.matches(&value))
                        .map(|branch| branch.body.as_slice())
                        .or(otherwise.as_deref()),
                    Resolution::Absent | Resolution::Unknown => otherwise.as_deref(),
                };
                if let Some(body) = chosen {
                    self.blocks(body, frame, out)?;
                }
            }
            BlockKind::Each {
                property,
                binding,
                body,
            } => {
                let items = match self.resolve(property, frame) {
                    Resolution::Found(Value::List(items)) => items,
                    Resolution::Found(other) => {
                        return Err(DomainError::TypeMismatch {
                            name: property.clone(),
                            expected: "list".into(),
                            found: other.type_name().into(),
                        });
                    }
                    Resolution::Absent | Resolution::Unknown => Vec::new(),
                };
                for (index, item) in items.into_iter().enumerate() {
                    let mut local = PropertyEnv::new();
                    if let Value::Map(fields) = &item {
                        for (key, value) in fields {
                            local.set(key.as_str(), value.clone());
                        }
                    }
                    local.set(format!("{binding}_index"), Value::Int(index as i64));
                    local.set(binding.as_str(), item);

                    frame.locals.push(local);
                    let result = self.blocks(body, frame, out);
                    frame.locals.pop();
                    result?;
                }
            }
        }
        Ok(())
    }

    fn value(&self, expr: &ValueExpr, frame: &Frame<'_>) -> Result<String, DomainError> {
        match self.resolve(&expr.path, frame) {
            Resolution::Found(value) => value.to_text().ok_or_else(|| DomainError::TypeMismatch {
                name: expr.path.clone(),
                expected: "text".into(),
                found: value.type_name().into(),
            }),
            Resolution::Absent => Ok(expr.fallback.clone().unwrap_or_default()),
            Resolution::Unknown => match &expr.fallback {
                Some(fallback) => Ok(fallback.clone()),
                None if expr.optional => Ok(String::new()),
                None => Err(DomainError::MissingProperty {
                    name: expr.path.clone(),
                }),
            },
        }
    }

    fn resolve(&self, path: &str, frame: &Frame<'_>) -> Resolution {
        let pack_scope = self.pack_scopes.get(frame.pack);
        let scopes = frame
            .locals
            .iter()
            .rev()
            .chain(pack_scope)
            .chain(std::iter::once(self.global));

        let mut absent = false;
        for scope in scopes {
            match scope.lookup(path) {
                Lookup::Found(value) => return Resolution::Found(value.clone()),
                Lookup::Absent => absent = true,
                Lookup::Unknown => {}
            }
        }
        if absent {
            Resolution::Absent
        } else {
            Resolution::Unknown
        }
    }

    /// Push `address` onto the expansion chain, failing on a revisit or when
    /// the chain is too deep.
    fn enter(&self, frame: &Frame<'_>, address: &SlotAddress) -> Result<Vec<SlotAddress>, DomainError> {
        let mut chain = frame.chain.to_vec();
        let revisit = chain.contains(address);
        chain.push(address.clone());
        if revisit || chain.len() > self.max_depth {
            return Err(DomainError::SlotCycleDetected {
                chain: chain.iter().map(ToString::to_string).collect(),
            });
        }
        Ok(chain)
    }

    /// Expand one fragment where the directive stood. A directive that had
    /// its own line indents every fragment line and ends it with a break.
    fn place(
        &self,
        slot: &SlotRef,
        fragment: &SlotFragment,
        chain: &[SlotAddress],
        out: &mut String,
    ) -> Result<(), DomainError> {
        let Some(indent) = &slot.indent else {
            return self.fragment(fragment, chain, out);
        };
        let mut text = String::new();
        self.fragment(fragment, chain, &mut text)?;
        for line in text.split_inclusive('\n') {
            if !line.trim().is_empty() {
                out.push_str(indent);
            }
            out.push_str(line);
        }
        if !text.is_empty() && !text.ends_with('\n') {
            out.push('\n');
        }
        Ok(())
    }

    fn fragment(&self, fragment: &SlotFragment, chain: &[SlotAddress], out: &mut String) -> Result<(), DomainError> {
        let address = chain.last().map(ToString::to_string).unwrap_or_default();
        trace!(slot = %address, contributor = %fragment.contributor, "expanding fragment");

        match &fragment.content {
            FragmentContent::Literal(text) => out.push_str(text),
            FragmentContent::Template { body, engine } => {
                let blocks = parse(body, *engine)
                    .map_err(|e| e.located(fragment.contributor.to_string(), address.as_str()))?;
                let mut frame = Frame {
                    pack: &fragment.contributor,
                    locals: Vec::new(),
                    chain,
                };
                self.blocks(&blocks, &mut frame, out).map_err(|e| match e {
                    // Cycles report the whole chain, not a location.
                    e @ DomainError::SlotCycleDetected { .. } => e,
                    e => e.located(fragment.contributor.to_string(), address.as_str()),
                })?;
            }
        }
        Ok(())
    }
}
