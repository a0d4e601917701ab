//! Errors the allocation surface can report.
//!
//! Per the error-handling design, the collector is infallible from the
//! mutator's standpoint under well-formed inputs; these variants cover the
//! two conditions the spec calls out as caller-visible failures. Invariant
//! violations that indicate a bug in this crate (a numeric-library limb
//! count mismatch, a resize target that wasn't the last allocation) are
//! `debug_assert!`s instead, matching "assertion failures ... must fail
//! loudly in debug builds" rather than values this enum carries.

use std::fmt;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AllocError {
    /// The request does not fit in a single block of the arena
    /// (`n >= BLOCK_SIZE - sizeof(link)`). The caller must split the
    /// request or route it through the no-gc arena.
    RequestTooLarge { requested: usize, block_size: usize },

    /// The request is a token (string-shaped payload) whose length cannot
    /// be represented in the header's length field. The header's length
    /// field is 8 bits wide (see `header::LEN_BITS`), so token payloads
    /// longer than `u8::MAX` bytes are rejected here rather than silently
    /// truncated.
    TokenTooLong { requested: usize, max: usize },
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocError::RequestTooLarge {
                requested,
                block_size,
            } => write!(
                f,
                "requested allocation of {} bytes does not fit in a block of {} bytes",
                requested, block_size
            ),
            AllocError::TokenTooLong { requested, max } => write!(
                f,
                "token of {} bytes exceeds the {}-byte length field",
                requested, max
            ),
        }
    }
}

impl std::error::Error for AllocError {}
