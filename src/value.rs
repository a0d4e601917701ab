//! Tagged-pointer discrimination and raw views over the fixed-shape value
//! kinds a block's payload can hold.
//!
//! Grounded on `original_source/include/runtime/header.h`'s `block`/
//! `string`/`stringbuffer` C structs for the raw layouts, and on
//! `vm/src/runtime/value.rs`'s tagged-value style for the low-bit
//! discrimination (NaN-boxing there, pointer-alignment tagging here).
//!
//! None of these types own the memory they point at — every `Ref` here is
//! a thin, `Copy` view over an [`Address`] already known to hold the shape
//! it names. Constructing one from the wrong address is the caller's bug,
//! same as dereferencing a raw pointer of the wrong type.

use crate::addr::Address;
use crate::header::{self, Header};

const TAG_MASK: usize = 0b11;
const NULLARY_TAG: usize = 0b01;

/// Bytes occupied by a [`Header`] at the front of every heap object.
pub const HEADER_SIZE: usize = std::mem::size_of::<Header>();

/// What a pointer-shaped word actually denotes, per §3's tagging rule:
/// only an even low bit makes it a real heap address.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Tagged {
    Pointer(Address),
    /// Top 32 bits hold the constructor's tag.
    NullaryConstructor(u32),
    /// Top 32 bits hold the de-Bruijn index.
    BoundVariable(u32),
}

#[inline]
pub fn classify(addr: Address) -> Tagged {
    let bits = addr.as_usize();
    if bits & 1 == 0 {
        return Tagged::Pointer(addr);
    }
    let top = (bits >> 32) as u32;
    if bits & TAG_MASK == NULLARY_TAG {
        Tagged::NullaryConstructor(top)
    } else {
        Tagged::BoundVariable(top)
    }
}

/// `true` for anything migration must leave untouched.
#[inline]
pub fn is_heap_pointer(addr: Address) -> bool {
    matches!(classify(addr), Tagged::Pointer(_))
}

#[inline]
unsafe fn read_header(addr: Address) -> Header {
    *addr.to_ptr::<Header>()
}

#[inline]
unsafe fn write_header(addr: Address, hdr: Header) {
    *addr.to_mut_ptr::<Header>() = hdr;
}

/// A generic block: a symbol/variable application with a header followed
/// by `nargs` child slots, each walked through the layout oracle. No fixed
/// Rust struct describes the payload — its shape is entirely owned by the
/// layout the header's `layout(hdr)` id names.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BlockRef(pub Address);

impl BlockRef {
    pub fn header(self) -> Header {
        unsafe { read_header(self.0) }
    }

    pub fn set_header(self, hdr: Header) {
        unsafe { write_header(self.0, hdr) }
    }

    pub fn address(self) -> Address {
        self.0
    }

    /// Address of the pointer-sized slot at `offset` bytes from the start
    /// of the object (header included) — what the layout oracle's
    /// `(offset, category)` pairs index into directly, matching
    /// `original_source`'s `layoutitem.offset`, which is relative to the
    /// struct base rather than the payload.
    pub fn slot(self, offset: usize) -> Address {
        self.0.offset(offset)
    }

    pub unsafe fn read_slot(self, offset: usize) -> Address {
        Address::from_usize(self.slot(offset).read_word())
    }

    pub unsafe fn write_slot(self, offset: usize, value: Address) {
        self.slot(offset).write_word(value.as_usize())
    }
}

/// A token: `{ header, byte[] }`, used for strings and for limb buffers.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StringRef(pub Address);

impl StringRef {
    pub fn header(self) -> Header {
        unsafe { read_header(self.0) }
    }

    pub fn set_header(self, hdr: Header) {
        unsafe { write_header(self.0, hdr) }
    }

    pub fn address(self) -> Address {
        self.0
    }

    pub fn payload_ptr(self) -> Address {
        self.0.offset(HEADER_SIZE)
    }

    pub fn len(self) -> usize {
        header::len(self.header())
    }

    pub fn is_empty(self) -> bool {
        self.len() == 0
    }

    /// Borrows the payload bytes. Safe as long as `self` really names a
    /// live token and nothing else holds a conflicting mutable borrow —
    /// the same contract as dereferencing the underlying raw pointer.
    pub unsafe fn as_bytes(self) -> &'static [u8] {
        std::slice::from_raw_parts(self.payload_ptr().to_ptr::<u8>(), self.len())
    }

    pub unsafe fn as_bytes_mut(self) -> &'static mut [u8] {
        std::slice::from_raw_parts_mut(self.payload_ptr().to_mut_ptr::<u8>(), self.len())
    }
}

/// Offset, from the start of the record, of the `capacity` field.
pub const STRINGBUFFER_CAPACITY_OFFSET: usize = HEADER_SIZE;
/// Offset, from the start of the record, of the `contents` pointer slot.
pub const STRINGBUFFER_CONTENTS_OFFSET: usize = HEADER_SIZE + 8;
/// Total fixed size of a string buffer record: `{ header, capacity, contents* }`.
pub const STRINGBUFFER_SIZE: usize = HEADER_SIZE + 16;

/// `{ header, capacity, contents: string* }`. `contents` is a separately
/// allocated, over-provisioned string token; `strlen ≤ len(contents)` is
/// the buffer's own invariant, tracked by `capacity` here (the spec names
/// it `capacity`; `strlen` lives wherever the mutator keeps its own
/// length, outside this crate's concern).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StringBufferRef(pub Address);

impl StringBufferRef {
    pub fn header(self) -> Header {
        unsafe { read_header(self.0) }
    }

    pub fn set_header(self, hdr: Header) {
        unsafe { write_header(self.0, hdr) }
    }

    pub fn address(self) -> Address {
        self.0
    }

    fn capacity_addr(self) -> Address {
        self.0.offset(STRINGBUFFER_CAPACITY_OFFSET)
    }

    fn contents_addr(self) -> Address {
        self.0.offset(STRINGBUFFER_CONTENTS_OFFSET)
    }

    pub fn capacity(self) -> usize {
        unsafe { self.capacity_addr().read_word() }
    }

    pub fn set_capacity(self, n: usize) {
        unsafe { self.capacity_addr().write_word(n) }
    }

    pub fn contents(self) -> Address {
        unsafe { Address::from_usize(self.contents_addr().read_word()) }
    }

    pub fn set_contents(self, addr: Address) {
        unsafe { self.contents_addr().write_word(addr.as_usize()) }
    }
}
