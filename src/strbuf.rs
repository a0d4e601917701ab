//! String buffer migration (§4.4's "kind-specific post-copy fixups ·
//! string buffer"): the buffer record is copied like any other fixed-size
//! block, but its forwarding pointer and its reference to the contents
//! string each deviate from the generic convention, so this is not just a
//! call into [`crate::migrate::Migrator::migrate`].
//!
//! Grounded on `original_source/runtime/alloc/collect.c`'s
//! `migrate_string_buffer`.

use crate::addr::Address;
use crate::header::{self, Header};
use crate::migrate::Migrator;
use crate::value::{self, StringBufferRef, STRINGBUFFER_CONTENTS_OFFSET, STRINGBUFFER_SIZE};

/// Migrates the string buffer whose address is stored at `slot`, and
/// retargets the copy's `contents` field at the freshly-migrated contents
/// string.
///
/// Unlike the generic kind, a string buffer's in-band forwarding pointer
/// lives in its `contents` slot rather than the first payload word: the
/// spec is explicit that "the old buffer's `contents` slot is reused to
/// hold the forwarding pointer to the new buffer," which only makes sense
/// if `contents` (a full pointer-sized field) is the word reused, not
/// `capacity` (a plain integer).
pub fn migrate_string_buffer(slot: Address, migrator: &mut Migrator) {
    let ptr = unsafe { Address::from_usize(slot.read_word()) };
    if !value::is_heap_pointer(ptr) {
        return;
    }

    let old = StringBufferRef(ptr);
    let hdr = old.header();

    if header::has_forwarding(hdr) {
        let fwd = unsafe { ptr.offset(STRINGBUFFER_CONTENTS_OFFSET).read_word() };
        unsafe { slot.write_word(fwd) };
        return;
    }

    let decision = match migrator.decide(hdr) {
        Some(d) => d,
        None => return,
    };

    let new_addr = migrator.copy_raw(ptr, STRINGBUFFER_SIZE, decision.target);
    let new_buf = StringBufferRef(new_addr);
    new_buf.set_header(decision.new_header);

    // The copy's `contents` slot currently holds the raw bytes copied from
    // the old buffer: the old contents string's address. Migrating that
    // slot in place retargets it at the fresh string, satisfying "the new
    // buffer's contents field is retargeted to the fresh string" even when
    // `strlen == 0` (an empty buffer's contents string is still relocated,
    // per §8's boundary behaviors).
    migrator.migrate(new_addr.offset(STRINGBUFFER_CONTENTS_OFFSET));

    unsafe {
        ptr.offset(STRINGBUFFER_CONTENTS_OFFSET).write_word(new_addr.as_usize());
        *ptr.to_mut_ptr::<Header>() = header::set_forwarded(hdr);
    }
    unsafe { slot.write_word(new_addr.as_usize()) };
}
