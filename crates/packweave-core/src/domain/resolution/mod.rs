//! Resolution: from a selection of packs to a merged project and its slot
//! bindings.

pub mod graph;
pub mod slots;

pub use graph::{PackLookup, resolve};
pub use slots::{FragmentContent, SlotBindings, SlotFragment, bind_slots};
