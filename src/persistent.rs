//! A toy persistent map/set/list engine, standing in for the external
//! collection engines the spec keeps out of scope (§1: "opaque to the
//! collector; they expose only a 'walk all contained block pointers'
//! callback"). This module plays that role well enough to exercise
//! structural sharing (§8's S5) and the `migrate_once` guard it exists for
//! — it is not a real persistent data structure implementation (no
//! structural-sharing insert/remove, no hashing), just the shape the
//! collector needs to drive against.
//!
//! Node layout: `{ header, nchildren: usize, children: [Address; nchildren] }`.
//! A child may itself be another interior node or an ordinary block
//! pointer; the walker cannot and need not tell the two apart, since
//! `migrate_once` is safe to call on either.

use crate::addr::Address;
use crate::header::Header;
use crate::migrate::Migrator;
use crate::value::{self, HEADER_SIZE};

const NCHILDREN_OFFSET: usize = HEADER_SIZE;
const CHILDREN_OFFSET: usize = HEADER_SIZE + 8;

pub fn node_size(nchildren: usize) -> usize {
    CHILDREN_OFFSET + nchildren * 8
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Node(pub Address);

impl Node {
    pub fn header(self) -> Header {
        unsafe { *self.0.to_ptr::<Header>() }
    }

    pub fn set_header(self, hdr: Header) {
        unsafe { *self.0.to_mut_ptr::<Header>() = hdr };
    }

    pub fn address(self) -> Address {
        self.0
    }

    pub fn nchildren(self) -> usize {
        unsafe { self.0.offset(NCHILDREN_OFFSET).read_word() }
    }

    pub fn set_nchildren(self, n: usize) {
        unsafe { self.0.offset(NCHILDREN_OFFSET).write_word(n) }
    }

    pub fn child_slot(self, i: usize) -> Address {
        self.0.offset(CHILDREN_OFFSET + i * 8)
    }

    pub fn set_child(self, i: usize, addr: Address) {
        unsafe { self.child_slot(i).write_word(addr.as_usize()) }
    }
}

/// Walks the persistent structure whose root pointer lives at `slot`:
/// migrates the root node itself through `migrate_once` (so a node shared
/// by two root-reachable terms is copied exactly once, per §8's S5), then
/// recurses into each of the (now-migrated) node's children. Matches
/// §4.4's MAP/SET/LIST dispatch: "hand to persistent-map walker, which
/// calls `migrate_once` on each contained block pointer."
pub fn walk_node(slot: Address, migrator: &mut Migrator) {
    migrator.migrate_once(slot);

    let ptr = unsafe { Address::from_usize(slot.read_word()) };
    if !value::is_heap_pointer(ptr) {
        return;
    }

    let node = Node(ptr);
    for i in 0..node.nchildren() {
        walk_node(node.child_slot(i), migrator);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;
    use crate::config::Config;
    use crate::header;

    fn new_pair() -> (Arena, Arena) {
        let cfg = Config::default();
        (Arena::new(0, cfg.block_size), Arena::new(1, cfg.block_size))
    }

    fn alloc_leaf(arena: &mut Arena) -> Address {
        let size = 16;
        let addr = arena.alloc(size).unwrap();
        unsafe { *addr.to_mut_ptr::<Header>() = header::with_layout(header::with_size_class(0, size), 1) };
        addr
    }

    fn alloc_node(arena: &mut Arena, children: &[Address]) -> Address {
        let size = node_size(children.len());
        let addr = arena.alloc(size).unwrap();
        let node = Node(addr);
        node.set_header(header::with_size_class(0, size));
        node.set_nchildren(children.len());
        for (i, child) in children.iter().enumerate() {
            node.set_child(i, *child);
        }
        addr
    }

    #[test]
    fn zero_element_collection_relocates_without_child_walks() {
        let (mut young, mut old) = new_pair();
        let n = alloc_node(&mut young, &[]);

        let mut slot_cell = n.as_usize();
        let slot = Address::from_ptr(&mut slot_cell as *mut usize);
        let mut migrator = Migrator::new(&mut young, &mut old, false);
        walk_node(slot, &mut migrator);

        let new_node = Node(Address::from_usize(slot_cell));
        assert_eq!(new_node.nchildren(), 0);
        assert_ne!(new_node.address(), n);
    }

    #[test]
    fn shared_interior_node_is_migrated_exactly_once() {
        let (mut young, mut old) = new_pair();
        let shared = alloc_node(&mut young, &[]);
        let t1 = alloc_node(&mut young, &[shared]);
        let t2 = alloc_node(&mut young, &[shared]);
        young.swap_and_reset();

        let mut t1_cell = t1.as_usize();
        let t1_slot = Address::from_ptr(&mut t1_cell as *mut usize);
        let mut t2_cell = t2.as_usize();
        let t2_slot = Address::from_ptr(&mut t2_cell as *mut usize);

        let mut migrator = Migrator::new(&mut young, &mut old, false);
        walk_node(t1_slot, &mut migrator);
        walk_node(t2_slot, &mut migrator);

        let new_t1 = Node(Address::from_usize(t1_cell));
        let new_t2 = Node(Address::from_usize(t2_cell));
        let shared_via_t1 = unsafe { Address::from_usize(new_t1.child_slot(0).read_word()) };
        let shared_via_t2 = unsafe { Address::from_usize(new_t2.child_slot(0).read_word()) };
        assert_eq!(shared_via_t1, shared_via_t2, "both terms must alias the same copy of the shared node");
        assert_ne!(shared_via_t1, shared, "the shared node must actually have moved");
    }

    #[test]
    fn leaf_children_are_migrated_through_the_walk() {
        let (mut young, mut old) = new_pair();
        let leaf = alloc_leaf(&mut young);
        let root = alloc_node(&mut young, &[leaf]);
        young.swap_and_reset();

        let mut slot_cell = root.as_usize();
        let slot = Address::from_ptr(&mut slot_cell as *mut usize);
        let mut migrator = Migrator::new(&mut young, &mut old, false);
        walk_node(slot, &mut migrator);

        let new_root = Node(Address::from_usize(slot_cell));
        let new_leaf = unsafe { Address::from_usize(new_root.child_slot(0).read_word()) };
        assert_ne!(new_leaf, leaf);
    }
}
