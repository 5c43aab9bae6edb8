//! Template block model shared by both dialects.
//!
//! ```text
//!   marker body ──► marker::parse ─┐
//!                                  ├──► Vec<Block> ──► render::Renderer ──► String
//!   host body   ──► host::parse ───┘
//! ```
//!
//! The renderer never knows which dialect produced a block sequence. Blocks
//! are read-only once parsed, so one sequence can be rendered any number of
//! times with different scopes.

pub mod host;
pub mod marker;
pub mod render;

use std::ops::Range;

use crate::domain::{entities::source::EngineKind, error::DomainError, value_objects::Value};

/// Byte range into the template body.
pub type Span = Range<usize>;

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub kind: BlockKind,
    pub span: Span,
}

impl Block {
    pub fn new(kind: BlockKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn literal(text: impl Into<String>, span: Span) -> Self {
        Self::new(BlockKind::Literal(text.into()), span)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BlockKind {
    Literal(String),
    Value(ValueExpr),
    /// At most one fragment: the last contribution.
    NamedSlot(SlotRef),
    /// Every contribution, concatenated in pack order.
    RepeatingSlot(SlotRef),
    Conditional {
        property: String,
        branches: Vec<Branch>,
        otherwise: Option<Vec<Block>>,
    },
    Each {
        property: String,
        binding: String,
        body: Vec<Block>,
    },
}

/// Property substitution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueExpr {
    /// Dotted path, e.g. `project.name`.
    pub path: String,
    pub fallback: Option<String>,
    /// Unknown properties render empty instead of failing.
    pub optional: bool,
}

impl ValueExpr {
    pub fn required(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            fallback: None,
            optional: false,
        }
    }
}

/// Slot directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotRef {
    pub name: String,
    /// Indentation of the directive's line, set when the directive stands
    /// alone on a line that ends in a break. The line itself is dropped:
    /// every fragment line is prefixed with this indentation and each
    /// fragment is terminated with a line break.
    pub indent: Option<String>,
}

impl SlotRef {
    pub fn inline(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            indent: None,
        }
    }

    pub fn standalone(name: impl Into<String>, indent: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            indent: Some(indent.into()),
        }
    }
}

/// One arm of a conditional: taken when the property equals `value`.
#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    pub value: Value,
    pub body: Vec<Block>,
}

/// Parse a body with the given dialect.
pub fn parse(body: &str, engine: EngineKind) -> Result<Vec<Block>, DomainError> {
    match engine {
        EngineKind::Marker => marker::parse(body),
        EngineKind::Host => host::parse(body),
    }
}

/// Names of every slot a block sequence declares, nested bodies included.
pub fn slot_names(blocks: &[Block]) -> Vec<&str> {
    let mut names = Vec::new();
    collect_slot_names(blocks, &mut names);
    names
}

fn collect_slot_names<'a>(blocks: &'a [Block], out: &mut Vec<&'a str>) {
    for block in blocks {
        match &block.kind {
            BlockKind::NamedSlot(slot) | BlockKind::RepeatingSlot(slot) => out.push(&slot.name),
            BlockKind::Conditional {
                branches,
                otherwise,
                ..
            } => {
                for branch in branches {
                    collect_slot_names(&branch.body, out);
                }
                if let Some(body) = otherwise {
                    collect_slot_names(body, out);
                }
            }
            BlockKind::Each { body, .. } => collect_slot_names(body, out),
            BlockKind::Literal(_) | BlockKind::Value(_) => {}
        }
    }
}

/// Whether a property path is well formed: dotted identifiers.
pub(crate) fn is_property_path(path: &str) -> bool {
    !path.is_empty()
        && path.split('.').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
        })
}

pub(crate) fn syntax_error(position: usize, reason: impl Into<String>) -> DomainError {
    DomainError::TemplateSyntaxError {
        position,
        reason: reason.into(),
    }
}
