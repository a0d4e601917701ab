//! The migration kernel: the common copy-or-forward decision (§4.4) and
//! the layout-driven child walk that dispatches to the kind-specific
//! routines in [`crate::numeric`], [`crate::strbuf`] and
//! [`crate::persistent`].
//!
//! Grounded on `original_source/runtime/alloc/collect.c`'s `migrate`,
//! `migrate_once` and `evacuate`, and on `vm/src/heap/copy.rs`'s
//! `GCValue::relocate` for the Rust shape of "rewrite the slot in place."

use crate::addr::Address;
use crate::arena::Arena;
use crate::header::{self, Header};
use crate::layout::{Category, LayoutOracle};
use crate::value::{self, BlockRef, HEADER_SIZE};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Target {
    Young,
    Old,
}

#[derive(Copy, Clone, Debug)]
pub(crate) struct Decision {
    pub target: Target,
    /// The header to install on the copy: source header with the
    /// promote/age/forwarding bits already adjusted, per §4.4 steps 4–6.
    pub new_header: Header,
}

/// Carries the two managed arenas and the current cycle's cadence
/// decision through a migration pass. Built fresh by the collector driver
/// for each `collect()` call.
pub struct Migrator<'a> {
    pub young: &'a mut Arena,
    pub old: &'a mut Arena,
    pub collect_old: bool,
}

impl<'a> Migrator<'a> {
    pub fn new(young: &'a mut Arena, old: &'a mut Arena, collect_old: bool) -> Self {
        Migrator { young, old, collect_old }
    }

    /// §4.4 steps 2–6: read the header, decide whether this cycle should
    /// touch the object at all, and if so which generation the copy
    /// belongs in and what its new header should read. `None` means
    /// "leave untouched" (old-gen object on a minor cycle, or permanent).
    pub(crate) fn decide(&self, hdr: Header) -> Option<Decision> {
        if header::is_permanent(hdr) {
            return None;
        }
        if header::is_old(hdr) {
            if !self.collect_old {
                return None;
            }
            // Major cycle: copy within the old generation, preserving
            // generation and age bits, clearing any stale forwarding bit.
            return Some(Decision {
                target: Target::Old,
                new_header: hdr & !header::FWD_PTR_BIT,
            });
        }
        if header::has_aged(hdr) {
            // Promote: set NOT_YOUNG_OBJECT_BIT and keep YOUNG_AGE_BIT set,
            // so the result reads as old (`is_old` needs both bits), not
            // permanent (which needs the age bit clear).
            let promoted = (hdr | header::NOT_YOUNG_OBJECT_BIT) & !header::FWD_PTR_BIT;
            Some(Decision {
                target: Target::Old,
                new_header: promoted,
            })
        } else {
            let aged = (hdr | header::YOUNG_AGE_BIT) & !header::FWD_PTR_BIT;
            Some(Decision {
                target: Target::Young,
                new_header: aged,
            })
        }
    }

    pub(crate) fn arena_for(&mut self, target: Target) -> &mut Arena {
        match target {
            Target::Young => self.young,
            Target::Old => self.old,
        }
    }

    /// Allocates `size` bytes in the target arena and copies `size` bytes
    /// from `src` into it verbatim (child pointers included, unfixed —
    /// the Cheney scan fixes them up once `src`'s copy is itself visited).
    pub(crate) fn copy_raw(&mut self, src: Address, size: usize, target: Target) -> Address {
        let dst = self
            .arena_for(target)
            .alloc(size)
            .expect("migration target arena exhausted mid-cycle");
        unsafe {
            std::ptr::copy_nonoverlapping(src.to_ptr::<u8>(), dst.to_mut_ptr::<u8>(), size);
        }
        dst
    }

    /// The generic migration entry point (§4.4 steps 1–8), applied
    /// directly to a pointer slot. Used for generic blocks (symbols and
    /// variables) and, as a building block, by the kind-specific routines
    /// for the sub-objects they embed (a string buffer's contents string,
    /// a big number's limb buffer).
    pub fn migrate(&mut self, slot: Address) {
        let ptr = unsafe { Address::from_usize(slot.read_word()) };
        if !value::is_heap_pointer(ptr) {
            return;
        }

        let hdr = unsafe { *ptr.to_ptr::<Header>() };

        if header::has_forwarding(hdr) {
            let fwd = unsafe { ptr.offset(HEADER_SIZE).read_word() };
            unsafe { slot.write_word(fwd) };
            return;
        }

        let decision = match self.decide(hdr) {
            Some(d) => d,
            None => return,
        };

        let size = header::get_size(hdr);
        let dst = self.copy_raw(ptr, size, decision.target);
        unsafe {
            *dst.to_mut_ptr::<Header>() = decision.new_header;
            ptr.offset(HEADER_SIZE).write_word(dst.as_usize());
            *ptr.to_mut_ptr::<Header>() = header::set_forwarded(hdr);
        }
        unsafe { slot.write_word(dst.as_usize()) };
    }

    /// `migrate_once`: guards against re-migrating a persistent-collection
    /// interior node reached along more than one path this cycle. Only
    /// touches `slot` if its referent still lives in a *collection*
    /// (from-) semispace of one of the two managed arenas; otherwise it
    /// has already been copied this cycle (or was never managed at all),
    /// and is left as-is.
    pub fn migrate_once(&mut self, slot: Address) {
        let ptr = unsafe { Address::from_usize(slot.read_word()) };
        if !value::is_heap_pointer(ptr) {
            return;
        }

        let in_young_from_space = self.young.semispace_of(ptr) == Some(self.young.collection_semispace_id());
        let in_old_from_space = self.old.semispace_of(ptr) == Some(self.old.collection_semispace_id());
        if !in_young_from_space && !in_old_from_space {
            return;
        }

        self.migrate(slot);
    }

    /// The layout-driven child walk (§4.4's category table), applied to
    /// one object that the Cheney scan is currently visiting. `block` must
    /// already be a live to-space copy.
    pub fn evacuate_children(&mut self, block: BlockRef, oracle: &LayoutOracle) {
        let layout_id = header::layout(block.header());
        let data = match oracle.get(layout_id) {
            Some(d) => d,
            None => return,
        };

        for item in &data.args {
            let slot = block.slot(item.offset);
            migrate_by_category(slot, item.category, self);
        }
    }
}

/// Dispatches a single pointer slot to the migration routine its value
/// kind requires, per §4.4's category table. Shared by `evacuate_children`
/// (one entry per layout item) and the collector driver's root migration
/// (one entry per root, using the category the caller's `typeinfo` names
/// for it) — both need the same "don't just generically `migrate` a root
/// that's actually a string buffer or a big number" dispatch.
pub fn migrate_by_category(slot: Address, category: Category, migrator: &mut Migrator) {
    match category {
        Category::Map | Category::Set | Category::List => {
            crate::persistent::walk_node(slot, migrator);
        }
        Category::StringBuffer => crate::strbuf::migrate_string_buffer(slot, migrator),
        Category::Symbol | Category::Variable => migrator.migrate(slot),
        Category::Int => crate::numeric::migrate_mpz(slot, migrator),
        Category::Float => crate::numeric::migrate_floating(slot, migrator),
        Category::Bool | Category::MInt => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn new_pair() -> (Arena, Arena) {
        let cfg = Config::default();
        (Arena::new(0, cfg.block_size), Arena::new(1, cfg.block_size))
    }

    /// Lays out a generic block with `nchildren` nullary-constructor
    /// children (so the test stays self-contained: no heap pointers to
    /// chase) and returns its address plus total size.
    fn alloc_block(arena: &mut Arena, nchildren: usize) -> (Address, usize) {
        let size = (HEADER_SIZE + nchildren * 8 + 7) & !7;
        let addr = arena.alloc(size).unwrap();
        let hdr = header::with_layout(header::with_size_class(0, size), 1);
        unsafe { *addr.to_mut_ptr::<Header>() = hdr };
        for i in 0..nchildren {
            unsafe { addr.offset(HEADER_SIZE + i * 8).write_word(0b01) }; // nullary ctor, tag 0
        }
        (addr, size)
    }

    #[test]
    fn migrate_skips_tagged_constants() {
        let (mut young, mut old) = new_pair();
        let mut migrator = Migrator::new(&mut young, &mut old, false);
        let slot_storage = Address::from_usize(0b01);
        let mut cell = slot_storage.as_usize();
        let slot = Address::from_ptr(&mut cell as *mut usize);
        migrator.migrate(slot);
        assert_eq!(cell, slot_storage.as_usize(), "tagged constant must be left untouched");
    }

    #[test]
    fn migrate_copies_a_young_block_and_sets_age_bit() {
        let (mut young, mut old) = new_pair();
        let (addr, _size) = alloc_block(&mut young, 1);
        let mut slot_cell = addr.as_usize();
        let slot = Address::from_ptr(&mut slot_cell as *mut usize);

        let mut migrator = Migrator::new(&mut young, &mut old, false);
        migrator.migrate(slot);

        let new_addr = Address::from_usize(slot_cell);
        assert_ne!(new_addr, addr);
        let new_hdr = unsafe { *new_addr.to_ptr::<Header>() };
        assert!(header::has_aged(new_hdr));
        assert!(header::is_young(new_hdr));

        let old_hdr = unsafe { *addr.to_ptr::<Header>() };
        assert!(header::has_forwarding(old_hdr));
    }

    #[test]
    fn migrate_promotes_an_aged_young_block() {
        let (mut young, mut old) = new_pair();
        let (addr, _size) = alloc_block(&mut young, 0);
        unsafe {
            let hdr = *addr.to_ptr::<Header>();
            *addr.to_mut_ptr::<Header>() = hdr | header::YOUNG_AGE_BIT;
        }
        let mut slot_cell = addr.as_usize();
        let slot = Address::from_ptr(&mut slot_cell as *mut usize);

        let mut migrator = Migrator::new(&mut young, &mut old, false);
        migrator.migrate(slot);

        let new_addr = Address::from_usize(slot_cell);
        let new_hdr = unsafe { *new_addr.to_ptr::<Header>() };
        assert!(header::is_old(new_hdr));
    }

    #[test]
    fn migrate_follows_an_existing_forwarding_pointer() {
        let (mut young, mut old) = new_pair();
        let (addr, _size) = alloc_block(&mut young, 1);
        let forward_target = Address::from_usize(0xdead_0000);
        unsafe {
            let hdr = *addr.to_ptr::<Header>();
            *addr.to_mut_ptr::<Header>() = header::set_forwarded(hdr);
            addr.offset(HEADER_SIZE).write_word(forward_target.as_usize());
        }
        let mut slot_cell = addr.as_usize();
        let slot = Address::from_ptr(&mut slot_cell as *mut usize);

        let mut migrator = Migrator::new(&mut young, &mut old, false);
        migrator.migrate(slot);

        assert_eq!(slot_cell, forward_target.as_usize());
    }

    #[test]
    fn migrate_leaves_old_gen_objects_alone_on_a_minor_cycle() {
        let (mut young, mut old) = new_pair();
        let (addr, _size) = alloc_block(&mut old, 0);
        unsafe {
            let hdr = *addr.to_ptr::<Header>();
            *addr.to_mut_ptr::<Header>() = hdr | header::NOT_YOUNG_OBJECT_BIT | header::YOUNG_AGE_BIT;
        }
        let mut slot_cell = addr.as_usize();
        let slot = Address::from_ptr(&mut slot_cell as *mut usize);

        let mut migrator = Migrator::new(&mut young, &mut old, false);
        migrator.migrate(slot);

        assert_eq!(slot_cell, addr.as_usize(), "old-gen object must be untouched on a minor cycle");
    }

    #[test]
    fn migrate_once_ignores_addresses_already_in_an_allocation_space() {
        let (mut young, mut old) = new_pair();
        let (addr, _size) = alloc_block(&mut young, 0);
        let mut slot_cell = addr.as_usize();
        let slot = Address::from_ptr(&mut slot_cell as *mut usize);

        let mut migrator = Migrator::new(&mut young, &mut old, false);
        // `addr` lives in young's current allocation semispace (no swap
        // happened), so migrate_once must leave it alone.
        migrator.migrate_once(slot);
        assert_eq!(slot_cell, addr.as_usize());
    }

    #[test]
    fn migrate_once_migrates_an_address_in_a_collection_space() {
        let (mut young, mut old) = new_pair();
        let (addr, _size) = alloc_block(&mut young, 0);
        young.swap_and_reset(); // addr is now in young's collection (from-) space

        let mut slot_cell = addr.as_usize();
        let slot = Address::from_ptr(&mut slot_cell as *mut usize);
        let mut migrator = Migrator::new(&mut young, &mut old, false);
        migrator.migrate_once(slot);

        assert_ne!(slot_cell, addr.as_usize());
    }
}
