//! The collector driver: a single stop-the-world cycle over the young
//! generation, with a cadence policy deciding when to also sweep the old
//! generation.
//!
//! Grounded on `original_source/runtime/alloc/collect.c`'s `koreCollect`
//! and `shouldCollectOldGen`, and on `vm/src/heap/gc.rs`'s
//! `GC::collect_garbage` for the Rust shape: one struct owning every
//! piece of state the original kept as process statics (`is_gc`,
//! `collect_old`, the minor-cycle counter), per the Open Question
//! resolution recorded in SPEC_FULL.md §1.

pub mod roots;

use crate::addr::Address;
use crate::arena::Arena;
use crate::config::Config;
use crate::header;
use crate::layout::{Category, LayoutOracle};
use crate::migrate::{migrate_by_category, Migrator};
use crate::value::BlockRef;
use roots::RootRegistry;

/// Owns the three arenas, the layout oracle, the root registry and the
/// cadence counter. A host process constructs exactly one `Collector` and
/// routes every allocation and every collection through it.
pub struct Collector {
    pub(crate) young: Arena,
    pub(crate) old: Arena,
    pub(crate) perm: Arena,
    pub(crate) config: Config,
    layouts: LayoutOracle,
    roots: RootRegistry,
    is_gc: bool,
    minor_count: u8,
}

impl Collector {
    /// Builds the three arenas and installs the permanent empty-string
    /// token, per §4.5's initialization step.
    pub fn new(config: Config) -> Self {
        let mut young = Arena::new(0, config.block_size);
        young.reserve(config.young_blocks);
        let mut old = Arena::new(1, config.block_size);
        old.reserve(config.old_blocks);
        let mut perm = Arena::new(2, config.block_size);
        perm.reserve(config.perm_blocks.max(1));

        let empty = perm
            .alloc(8)
            .expect("the permanent arena must be able to hold the empty string token");
        unsafe { *empty.to_mut_ptr::<header::Header>() = header::EMPTY_STRING_HEADER };

        Collector {
            young,
            old,
            perm,
            config,
            layouts: LayoutOracle::new(),
            roots: RootRegistry::new(),
            is_gc: false,
            minor_count: 0,
        }
    }

    /// The mutable handle a host process uses to register the layouts
    /// its code generator produced, before the first collection.
    pub fn layouts_mut(&mut self) -> &mut LayoutOracle {
        &mut self.layouts
    }

    /// The mutable handle a host process uses to register additional
    /// root enumerators, per §6's external interface.
    pub fn roots_mut(&mut self) -> &mut RootRegistry {
        &mut self.roots
    }

    /// `true` while a `collect()` call is on the stack. A collector is
    /// never reentered — there is no mechanism in this crate for a root
    /// enumerator callback to trigger a nested collection, and doing so
    /// would corrupt the in-progress Cheney scan.
    pub fn during_gc(&self) -> bool {
        self.is_gc
    }

    /// §4.5's cadence decision: minor cycles accumulate until
    /// `Config::effective_major_every` is reached, at which point this
    /// cycle also collects the old generation and the counter resets.
    /// Debug builds collect the old generation on every cycle, via
    /// `effective_major_every` always returning 1 there.
    fn should_collect_old(&mut self) -> bool {
        self.minor_count += 1;
        if self.minor_count >= self.config.effective_major_every() {
            self.minor_count = 0;
            true
        } else {
            false
        }
    }

    /// Runs one full collection cycle (§4.5): swap the young generation
    /// (and the old generation, on a major cycle), migrate every root —
    /// both the slots in `roots` and everything the registered
    /// enumerators yield — then Cheney-scan whatever just got copied.
    ///
    /// `roots` is the mutator's own root vector: each element is rewritten
    /// in place to point at the object's new location, the same contract
    /// `migrate` applies to every slot it's handed. `root_kinds` names each
    /// root's value kind (§6's `typeinfo`), one entry per `roots` slot, so
    /// a root that is itself a big integer, big float, string buffer or
    /// persistent-collection node is migrated through the same category
    /// table `evacuate_children` uses for child slots, instead of being
    /// blindly treated as a plain block.
    pub fn collect(&mut self, roots: &mut [Address], root_kinds: &[Category]) {
        debug_assert!(!self.is_gc, "collect() must not be reentered");
        debug_assert_eq!(
            roots.len(),
            root_kinds.len(),
            "every root slot needs a matching typeinfo entry"
        );
        log::trace!("collect: beginning cycle");
        self.is_gc = true;

        let collect_old = self.should_collect_old();
        log::debug!("collect: collect_old = {collect_old}");

        self.young.swap_and_reset();
        if collect_old {
            self.old.swap_and_reset();
        }

        let enumerated_slots = self.roots.enumerate();

        {
            let mut migrator = Migrator::new(&mut self.young, &mut self.old, collect_old);

            for (slot, category) in roots.iter_mut().zip(root_kinds) {
                let addr = Address::from_ptr(slot as *mut Address);
                migrate_by_category(addr, *category, &mut migrator);
            }
            for (slot, category) in &enumerated_slots {
                migrate_by_category(*slot, *category, &mut migrator);
            }

            scan_space(&mut migrator, &self.layouts, Space::Young);
            if collect_old {
                scan_space(&mut migrator, &self.layouts, Space::Old);
            }
        }

        self.is_gc = false;
        log::trace!("collect: cycle complete");
    }

    /// Releases every block of every arena and drops the root registry,
    /// in that order (§5's resource-teardown policy: young, then old,
    /// then the permanent arena, then the registered enumerators).
    pub fn free_all_memory(&mut self) {
        self.young.free_all();
        self.old.free_all();
        self.perm.free_all();
        self.roots.clear();
    }
}

#[derive(Copy, Clone)]
enum Space {
    Young,
    Old,
}

/// The Cheney scan (§4.5 steps 4-5): walk forward from the space's start
/// pointer, evacuating each visited object's children, advancing by that
/// object's size, until the scan pointer catches up with the (still
/// possibly moving) allocation frontier.
fn scan_space(migrator: &mut Migrator, layouts: &LayoutOracle, space: Space) {
    let arena = match space {
        Space::Young => &migrator.young,
        Space::Old => &migrator.old,
    };
    let mut scan_ptr = arena.start_ptr();
    if scan_ptr.is_null() || scan_ptr.as_usize() >= arena.end_ptr().as_usize() {
        // Nothing was migrated into this space this cycle: its blocks may
        // still hold bytes retained from two cycles ago, and those are not
        // real objects to walk.
        return;
    }

    loop {
        let block = BlockRef(scan_ptr);
        let size = header::get_size(block.header());
        migrator.evacuate_children(block, layouts);

        let arena = match space {
            Space::Young => &migrator.young,
            Space::Old => &migrator.old,
        };
        let frontier = arena.end_ptr();
        match arena.move_ptr(scan_ptr, size, frontier) {
            Some(next) => scan_ptr = next,
            None => break,
        }
    }
}
