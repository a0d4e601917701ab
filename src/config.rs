//! Runtime-wide tuning knobs.
//!
//! There is no file or environment parsing here: per the external
//! interfaces this subsystem exposes, there is no CLI and no persistent
//! state across process invocations. A host process builds a `Config` in
//! code, the same way `vm/src/runtime/config.rs` builds its `Config`.

/// Size of one block within an arena, in bytes. A single allocation request
/// larger than `block_size - mem::size_of::<usize>()` (the space taken by
/// the intrusive block link) cannot be satisfied and is reported as
/// [`crate::error::AllocError::RequestTooLarge`].
pub const DEFAULT_BLOCK_SIZE: usize = 4096;

/// Number of purely-young collections between major (old-generation)
/// collections, absent a debug build (which always collects the old
/// generation, see [`Config::major_every`]).
pub const DEFAULT_MAJOR_EVERY: u8 = 50;

#[derive(Clone, Debug)]
pub struct Config {
    /// Initial number of blocks reserved for the young-generation arena.
    pub young_blocks: usize,

    /// Initial number of blocks reserved for the old-generation arena.
    pub old_blocks: usize,

    /// Initial number of blocks reserved for the permanent (no-gc) arena.
    pub perm_blocks: usize,

    /// Size of one block, shared by every arena.
    pub block_size: usize,

    /// How many consecutive minor-only collections happen before a major
    /// collection is forced. Ignored (treated as 1) in debug builds, per
    /// the cadence policy in the design notes.
    pub major_every: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            young_blocks: 8,
            old_blocks: 4,
            perm_blocks: 2,
            block_size: DEFAULT_BLOCK_SIZE,
            major_every: DEFAULT_MAJOR_EVERY,
        }
    }
}

impl Config {
    /// The cadence the collector actually uses: always 1 (collect the old
    /// generation on every cycle) in debug builds, `self.major_every`
    /// otherwise.
    pub fn effective_major_every(&self) -> u8 {
        cfg_if::cfg_if! {
            if #[cfg(debug_assertions)] {
                let _ = self.major_every;
                1
            } else {
                self.major_every.max(1)
            }
        }
    }
}
