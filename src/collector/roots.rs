//! The root-enumerator registry: the mutator's way of handing the
//! collector pointer slots beyond the ones passed directly to
//! [`crate::collector::Collector::collect`].
//!
//! Grounded on `original_source/include/runtime/collect.h`'s
//! `registerGCRootsEnumerator`.

use crate::addr::Address;
use crate::layout::Category;

/// A callback the mutator registers once (typically at startup) that,
/// when called, returns every pointer slot it currently wants treated as
/// a GC root, paired with that slot's value kind. Each [`Address`] must
/// itself be the address *of a slot* (a location migration can
/// read-then-rewrite), not the pointer value stored there — the same
/// contract as the root vector passed directly to `collect`. The paired
/// [`Category`] is what lets the collector dispatch the slot through the
/// same category table `evacuate_children` uses, rather than assuming
/// every root is a plain block.
pub type RootEnumerator = Box<dyn FnMut() -> Vec<(Address, Category)>>;

/// Holds every enumerator registered so far, in registration order.
#[derive(Default)]
pub struct RootRegistry {
    enumerators: Vec<RootEnumerator>,
}

impl RootRegistry {
    pub fn new() -> Self {
        Self { enumerators: Vec::new() }
    }

    /// Registers an additional source of roots, per `§6`'s
    /// `register_gc_roots_enumerator`.
    pub fn register(&mut self, f: RootEnumerator) {
        self.enumerators.push(f);
    }

    /// Calls every registered enumerator in registration order, yielding
    /// each one's slots in the order it returned them (§5's ordering
    /// guarantee).
    pub fn enumerate(&mut self) -> Vec<(Address, Category)> {
        self.enumerators.iter_mut().flat_map(|f| f()).collect()
    }

    pub fn len(&self) -> usize {
        self.enumerators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.enumerators.is_empty()
    }

    /// Drops every registered enumerator, per the resource-teardown order
    /// in §5 (`free_all_memory` releases the arenas, then the registry).
    pub fn clear(&mut self) {
        self.enumerators.clear();
    }
}
