//! Slot binding: which fragments fill which slot.
//!
//! Every source whose target is a `slot://` address becomes a fragment
//! filed under that address. Fragments keep pack closure order, so a
//! repeating slot renders contributions in that order and a named slot
//! takes the last one.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, trace};

use crate::domain::entities::{
    pack::{PackDescriptor, PackId},
    source::{EngineKind, SlotAddress, Source, SourceTarget},
};

/// Content of one slot contribution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FragmentContent {
    /// Parsed and rendered in the contributor's scope.
    Template { body: String, engine: EngineKind },
    /// Static contribution, inserted as-is.
    Literal(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotFragment {
    pub contributor: PackId,
    pub content: FragmentContent,
}

impl SlotFragment {
    fn from_source(contributor: &PackId, source: &Source) -> Self {
        let content = match source {
            Source::Template { body, engine, .. } => FragmentContent::Template {
                body: body.clone(),
                engine: *engine,
            },
            Source::Static { bytes, .. } => {
                FragmentContent::Literal(String::from_utf8_lossy(bytes).into_owned())
            }
        };
        Self {
            contributor: contributor.clone(),
            content,
        }
    }
}

/// Read-only map from slot address to its fragments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotBindings {
    slots: BTreeMap<SlotAddress, Vec<SlotFragment>>,
}

impl SlotBindings {
    /// Last contribution, used by a named slot.
    pub fn singular(&self, address: &SlotAddress) -> Option<&SlotFragment> {
        self.slots.get(address).and_then(|fragments| fragments.last())
    }

    /// All contributions in pack order, used by a repeating slot.
    pub fn repeating(&self, address: &SlotAddress) -> &[SlotFragment] {
        self.slots.get(address).map_or(&[], Vec::as_slice)
    }

    pub fn addresses(&self) -> impl Iterator<Item = &SlotAddress> {
        self.slots.keys()
    }

    pub fn fragments(&self) -> impl Iterator<Item = (&SlotAddress, &SlotFragment)> {
        self.slots
            .iter()
            .flat_map(|(address, fragments)| fragments.iter().map(move |f| (address, f)))
    }

    /// Number of distinct addresses.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Addresses with contributions that no template declares. Such
    /// contributions are kept but never rendered.
    pub fn unbound<'a>(&'a self, declared: &BTreeSet<SlotAddress>) -> Vec<&'a SlotAddress> {
        self.slots
            .keys()
            .filter(|address| !declared.contains(*address))
            .collect()
    }
}

/// Collect slot contributions from packs in closure order.
pub fn bind_slots<'a>(packs: impl IntoIterator<Item = &'a PackDescriptor>) -> SlotBindings {
    let mut slots: BTreeMap<SlotAddress, Vec<SlotFragment>> = BTreeMap::new();

    for pack in packs {
        for source in pack.all_sources() {
            if let SourceTarget::Slot(address) = source.target() {
                trace!(pack = %pack.id, slot = %address, "binding slot fragment");
                slots
                    .entry(address.clone())
                    .or_default()
                    .push(SlotFragment::from_source(&pack.id, source));
            }
        }
    }

    debug!(slots = slots.len(), "slot bindings ready");
    SlotBindings { slots }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::module::SourceModule;

    fn id(name: &str) -> PackId {
        PackId::new("test", name)
    }

    fn contribution(owner: &str, body: &str) -> Source {
        Source::template(SourceTarget::slot(id(owner), "deps"), body, EngineKind::Marker)
    }

    #[test]
    fn repeating_keeps_pack_order_and_singular_takes_last() {
        let base = PackDescriptor::builder(id("base"))
            .source(Source::marker_file("build.gradle.kts", "{{@slots deps}}"))
            .build()
            .unwrap();
        let a = PackDescriptor::builder(id("a"))
            .source(contribution("base", "a\n"))
            .build()
            .unwrap();
        let b = PackDescriptor::builder(id("b"))
            .module(SourceModule::new("app").source(contribution("base", "b\n")))
            .build()
            .unwrap();

        let bindings = bind_slots([&base, &a, &b]);
        let address = SlotAddress::new(id("base"), "deps");

        let contributors: Vec<_> = bindings
            .repeating(&address)
            .iter()
            .map(|f| f.contributor.name().to_string())
            .collect();
        assert_eq!(contributors, ["a", "b"]);
        assert_eq!(bindings.singular(&address).unwrap().contributor, id("b"));
    }

    #[test]
    fn static_fragments_become_literals() {
        let pack = PackDescriptor::builder(id("a"))
            .source(Source::Static {
                target: SourceTarget::slot(id("base"), "deps"),
                bytes: b"{{not a tag}}".to_vec(),
                executable: false,
            })
            .build()
            .unwrap();
        let bindings = bind_slots([&pack]);
        let fragment = bindings
            .singular(&SlotAddress::new(id("base"), "deps"))
            .unwrap();
        assert_eq!(
            fragment.content,
            FragmentContent::Literal("{{not a tag}}".into())
        );
    }

    #[test]
    fn unbound_addresses_are_reported() {
        let pack = PackDescriptor::builder(id("a"))
            .source(contribution("base", "x"))
            .source(Source::template(
                SourceTarget::slot(id("base"), "plugins"),
                "p",
                EngineKind::Marker,
            ))
            .build()
            .unwrap();
        let bindings = bind_slots([&pack]);
        let declared = BTreeSet::from([SlotAddress::new(id("base"), "deps")]);

        let unbound = bindings.unbound(&declared);
        assert_eq!(unbound.len(), 1);
        assert_eq!(unbound[0].slot(), "plugins");
        assert!(bindings.repeating(&SlotAddress::new(id("c"), "none")).is_empty());
    }
}
