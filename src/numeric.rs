//! Big-integer and big-float record shapes.
//!
//! The spec explicitly keeps the primitive numeric library out of scope
//! (§1: "provides big-integer and big-float value structures with an
//! accessible limb pointer") but requires the collector to relocate their
//! limb buffers, which means this crate must still know their record
//! layout. No external bignum crate is used here: whatever library backs
//! the limb arithmetic, its limb buffer must live in an arena-resident
//! string token so the collector can move it, which rules out a crate that
//! owns its own heap allocation (`num-bigint`, `rug`/GMP). These structs
//! mirror `original_source/include/runtime/header.h`'s `mpz_hdr`/
//! `floating_hdr` (itself modeled on GMP's `mpz_t`/`mpfr_t`) closely enough
//! that a real numeric library's memory hooks could be rewired to them, per
//! §4.3's "numeric library is rewired to allocate ... through these entry
//! points."

use crate::addr::Address;
use crate::header::{self, Header};
use crate::migrate::Migrator;
use crate::value::{self, HEADER_SIZE};

/// Bytes per limb (`mp_limb_t` is a machine word on every platform GMP
/// supports).
pub const LIMB_SIZE: usize = std::mem::size_of::<usize>();
const BITS_PER_LIMB: usize = LIMB_SIZE * 8;

const ALLOC_OFFSET: usize = HEADER_SIZE;
const SIZE_OFFSET: usize = HEADER_SIZE + 8;
const LIMB_PTR_OFFSET: usize = HEADER_SIZE + 16;

/// Fixed size of a big-integer record: `{ header, alloc, size, limb_ptr }`.
pub const MPINT_SIZE: usize = HEADER_SIZE + 24;

/// `{ header, body }`, `body` being `{ alloc, size, limb_ptr }`: the
/// limb count allocated, the signed count in use, and a pointer to the
/// limb buffer (a string token), or a null address when `alloc == 0`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MpIntRef(pub Address);

impl MpIntRef {
    pub fn header(self) -> Header {
        unsafe { *self.0.to_ptr::<Header>() }
    }

    pub fn set_header(self, hdr: Header) {
        unsafe { *self.0.to_mut_ptr::<Header>() = hdr };
    }

    pub fn address(self) -> Address {
        self.0
    }

    pub fn alloc(self) -> usize {
        unsafe { self.0.offset(ALLOC_OFFSET).read_word() }
    }

    pub fn set_alloc(self, n: usize) {
        unsafe { self.0.offset(ALLOC_OFFSET).write_word(n) }
    }

    pub fn size(self) -> isize {
        unsafe { self.0.offset(SIZE_OFFSET).read_word() as isize }
    }

    pub fn set_size(self, n: isize) {
        unsafe { self.0.offset(SIZE_OFFSET).write_word(n as usize) }
    }

    /// `None` when `alloc == 0` — "integers with `alloc == 0` carry no
    /// limb buffer" (§4.4).
    pub fn limb_buffer(self) -> Option<Address> {
        if self.alloc() == 0 {
            return None;
        }
        let raw = unsafe { self.0.offset(LIMB_PTR_OFFSET).read_word() };
        if raw == 0 {
            None
        } else {
            Some(Address::from_usize(raw))
        }
    }

    pub fn set_limb_buffer(self, addr: Option<Address>) {
        let raw = addr.map_or(0, |a| a.as_usize());
        unsafe { self.0.offset(LIMB_PTR_OFFSET).write_word(raw) }
    }

    /// `alloc * sizeof(limb) == len(limb-string)` (§3).
    pub fn check_invariant(self, limb_string_len: usize) {
        if self.alloc() > 0 {
            debug_assert_eq!(
                self.alloc() * LIMB_SIZE,
                limb_string_len,
                "big integer invariant violated: alloc * limb size != limb string length"
            );
        }
    }
}

const FLOAT_EXP_OFFSET: usize = HEADER_SIZE;
const FLOAT_PREC_OFFSET: usize = HEADER_SIZE + 8;
const FLOAT_LIMB_PTR_OFFSET: usize = HEADER_SIZE + 16;

/// Fixed size of a big-float record: `{ header, exp, prec, limb_ptr }`.
pub const MPFLOAT_SIZE: usize = HEADER_SIZE + 24;

/// `{ header, exp-info, body }`. Like [`MpIntRef`], but the stored limb
/// pointer is biased by one limb (`LIMB_SIZE` bytes) to match the numeric
/// library's own `mpfr_t` convention of reserving limb zero; callers see
/// the unbiased token address through [`MpFloatRef::limb_buffer`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MpFloatRef(pub Address);

impl MpFloatRef {
    pub fn header(self) -> Header {
        unsafe { *self.0.to_ptr::<Header>() }
    }

    pub fn set_header(self, hdr: Header) {
        unsafe { *self.0.to_mut_ptr::<Header>() = hdr };
    }

    pub fn address(self) -> Address {
        self.0
    }

    pub fn exp(self) -> i64 {
        unsafe { self.0.offset(FLOAT_EXP_OFFSET).read_word() as i64 }
    }

    pub fn set_exp(self, exp: i64) {
        unsafe { self.0.offset(FLOAT_EXP_OFFSET).write_word(exp as usize) }
    }

    /// Precision, in bits.
    pub fn prec(self) -> u64 {
        unsafe { self.0.offset(FLOAT_PREC_OFFSET).read_word() as u64 }
    }

    pub fn set_prec(self, prec: u64) {
        unsafe { self.0.offset(FLOAT_PREC_OFFSET).write_word(prec as usize) }
    }

    pub fn limb_buffer(self) -> Option<Address> {
        let raw = unsafe { self.0.offset(FLOAT_LIMB_PTR_OFFSET).read_word() };
        if raw == 0 {
            None
        } else {
            Some(Address::from_usize(raw - LIMB_SIZE))
        }
    }

    pub fn set_limb_buffer(self, addr: Option<Address>) {
        let raw = addr.map_or(0, |a| a.as_usize() + LIMB_SIZE);
        unsafe { self.0.offset(FLOAT_LIMB_PTR_OFFSET).write_word(raw) }
    }

    /// `⌈prec / bits_per_limb⌉ * limb_size ≤ limb_string_length` (§4.4).
    pub fn check_invariant(self, limb_string_len: usize) {
        let needed_limbs = (self.prec() as usize + BITS_PER_LIMB - 1) / BITS_PER_LIMB;
        debug_assert!(
            needed_limbs * LIMB_SIZE <= limb_string_len,
            "big float invariant violated: precision exceeds limb string capacity"
        );
    }
}

/// Migrates the big integer whose address is stored at `slot` (§4.4 "big
/// integer"). Like a string buffer, this kind stores its own forwarding
/// pointer in a dedicated slot — the limb pointer — rather than the
/// generic first payload word, since that word is where the limb pointer
/// itself already lives and the spec is explicit that "the old integer's
/// limb pointer slot is reused to store the forwarding pointer."
pub fn migrate_mpz(slot: Address, migrator: &mut Migrator) {
    let ptr = unsafe { Address::from_usize(slot.read_word()) };
    if !value::is_heap_pointer(ptr) {
        return;
    }

    let old = MpIntRef(ptr);
    let hdr = old.header();

    if header::has_forwarding(hdr) {
        let fwd = unsafe { ptr.offset(LIMB_PTR_OFFSET).read_word() };
        unsafe { slot.write_word(fwd) };
        return;
    }

    let decision = match migrator.decide(hdr) {
        Some(d) => d,
        None => return,
    };

    // Read the limb string's length before touching anything, so the
    // invariant check sees the pre-migration state.
    let limb_len = old
        .limb_buffer()
        .map(|limb_addr| header::len(unsafe { *limb_addr.to_ptr::<Header>() }));

    let new_addr = migrator.copy_raw(ptr, MPINT_SIZE, decision.target);
    let new_int = MpIntRef(new_addr);
    new_int.set_header(decision.new_header);

    if let Some(limb_len) = limb_len {
        old.check_invariant(limb_len);
        // The copy's limb-pointer slot currently holds the raw bytes
        // copied from the old record: the old limb string's address.
        // Migrating it in place relocates the limb buffer and retargets
        // the new record at the fresh copy.
        migrator.migrate(new_addr.offset(LIMB_PTR_OFFSET));
    }

    unsafe {
        ptr.offset(LIMB_PTR_OFFSET).write_word(new_addr.as_usize());
        *ptr.to_mut_ptr::<Header>() = header::set_forwarded(hdr);
    }
    unsafe { slot.write_word(new_addr.as_usize()) };
}

/// Migrates the big float whose address is stored at `slot` (§4.4 "big
/// float"): as [`migrate_mpz`], with the limb pointer bias handled by
/// [`MpFloatRef`] and the precision invariant checked instead of `alloc`.
pub fn migrate_floating(slot: Address, migrator: &mut Migrator) {
    let ptr = unsafe { Address::from_usize(slot.read_word()) };
    if !value::is_heap_pointer(ptr) {
        return;
    }

    let old = MpFloatRef(ptr);
    let hdr = old.header();

    if header::has_forwarding(hdr) {
        let fwd = unsafe { ptr.offset(FLOAT_LIMB_PTR_OFFSET).read_word() };
        unsafe { slot.write_word(fwd) };
        return;
    }

    let decision = match migrator.decide(hdr) {
        Some(d) => d,
        None => return,
    };

    let limb_addr_old = old.limb_buffer();
    if let Some(limb_addr) = limb_addr_old {
        old.check_invariant(header::len(unsafe { *limb_addr.to_ptr::<Header>() }));
    }

    let new_addr = migrator.copy_raw(ptr, MPFLOAT_SIZE, decision.target);
    let new_float = MpFloatRef(new_addr);
    new_float.set_header(decision.new_header);

    if let Some(limb_addr) = limb_addr_old {
        // The bias the numeric library's convention adds means the raw
        // bytes just copied into `new_addr`'s limb slot are not a valid
        // migration target on their own (they point one limb past the
        // token's header); migrate the unbiased address through a scratch
        // slot instead, then re-bias on the way back in.
        let mut scratch = limb_addr.as_usize();
        let scratch_slot = Address::from_ptr(&mut scratch as *mut usize);
        migrator.migrate(scratch_slot);
        new_float.set_limb_buffer(Some(Address::from_usize(scratch)));
    }

    unsafe {
        ptr.offset(FLOAT_LIMB_PTR_OFFSET).write_word(new_addr.as_usize());
        *ptr.to_mut_ptr::<Header>() = header::set_forwarded(hdr);
    }
    unsafe { slot.write_word(new_addr.as_usize()) };
}
