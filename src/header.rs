//! The 64-bit block header: one word, present at the start of every
//! heap-allocated value, encoding length, layout id, generation/age and the
//! forwarding-pointer flag.
//!
//! Bit layout, LSB to MSB, grounded on `original_source/include/runtime/
//! header.h` and `runtime/alloc/collect.c`'s `get_size`:
//!
//! ```text
//! bits  0..32  tag             symbol id, meaningful when layout() == 0 is false
//! bits 32..40  size class      byte size = value << 3, meaningful when layout() != 0
//! bits 40..48  length          payload length in bytes, meaningful when layout() == 0
//! bit      48  FWD_PTR_BIT
//! bit      49  NOT_YOUNG_OBJECT_BIT
//! bit      50  YOUNG_AGE_BIT
//! bits 51..64  layout id       index into the layout oracle
//! ```
//!
//! `tag` and `length` are never both meaningful on the same object: a
//! layout id of zero denotes a token (string-shaped payload, using the
//! length field), a non-zero layout id denotes a symbol/variable block
//! (using the tag and size-class fields instead).

pub type Header = u64;

const TAG_BITS: u32 = 32;
const TAG_MASK: u64 = (1u64 << TAG_BITS) - 1;

const SIZE_CLASS_SHIFT: u32 = 32;
const SIZE_CLASS_BITS: u32 = 8;
const SIZE_CLASS_MASK: u64 = (1u64 << SIZE_CLASS_BITS) - 1;

const LEN_SHIFT: u32 = 40;
const LEN_BITS: u32 = 8;
const LEN_MASK: u64 = (1u64 << LEN_BITS) - 1;

/// Largest payload length representable in the header's length field.
pub const MAX_TOKEN_LEN: usize = LEN_MASK as usize;

pub const FWD_PTR_BIT: u64 = 1 << 48;
pub const NOT_YOUNG_OBJECT_BIT: u64 = 1 << 49;
pub const YOUNG_AGE_BIT: u64 = 1 << 50;

pub const LAYOUT_OFFSET: u32 = 51;

/// The permanent empty-string token's header carries no other bits.
pub const EMPTY_STRING_HEADER: Header = NOT_YOUNG_OBJECT_BIT;

#[inline(always)]
pub fn tag(hdr: Header) -> u32 {
    (hdr & TAG_MASK) as u32
}

#[inline(always)]
pub fn with_tag(hdr: Header, tag: u32) -> Header {
    (hdr & !TAG_MASK) | (tag as u64 & TAG_MASK)
}

#[inline(always)]
pub fn size_class(hdr: Header) -> usize {
    (((hdr >> SIZE_CLASS_SHIFT) & SIZE_CLASS_MASK) << 3) as usize
}

#[inline(always)]
pub fn with_size_class(hdr: Header, size: usize) -> Header {
    debug_assert_eq!(size & 0x7, 0, "size class must be 8-byte aligned");
    let class = (size >> 3) as u64 & SIZE_CLASS_MASK;
    (hdr & !(SIZE_CLASS_MASK << SIZE_CLASS_SHIFT)) | (class << SIZE_CLASS_SHIFT)
}

#[inline(always)]
pub fn len(hdr: Header) -> usize {
    ((hdr >> LEN_SHIFT) & LEN_MASK) as usize
}

/// Writes the payload length and, per the spec, forces the object into the
/// old generation when the length alone would already overflow one block.
pub fn set_len(hdr: Header, n: usize, block_size: usize, link_size: usize) -> Header {
    debug_assert!(n <= MAX_TOKEN_LEN, "token length {} exceeds header field capacity", n);
    let mut out = (hdr & !(LEN_MASK << LEN_SHIFT)) | ((n as u64 & LEN_MASK) << LEN_SHIFT);
    if n > block_size.saturating_sub(link_size) {
        out |= NOT_YOUNG_OBJECT_BIT;
    }
    out
}

#[inline(always)]
pub fn layout(hdr: Header) -> u16 {
    (hdr >> LAYOUT_OFFSET) as u16
}

const LAYOUT_MASK: u64 = (1u64 << (64 - LAYOUT_OFFSET)) - 1;

#[inline(always)]
pub fn with_layout(hdr: Header, layout_id: u16) -> Header {
    (hdr & ((1 << LAYOUT_OFFSET) - 1)) | ((layout_id as u64 & LAYOUT_MASK) << LAYOUT_OFFSET)
}

#[inline(always)]
pub fn is_young(hdr: Header) -> bool {
    hdr & NOT_YOUNG_OBJECT_BIT == 0
}

#[inline(always)]
pub fn is_old(hdr: Header) -> bool {
    hdr & NOT_YOUNG_OBJECT_BIT != 0 && hdr & YOUNG_AGE_BIT != 0
}

#[inline(always)]
pub fn is_permanent(hdr: Header) -> bool {
    hdr & NOT_YOUNG_OBJECT_BIT != 0 && hdr & YOUNG_AGE_BIT == 0
}

#[inline(always)]
pub fn has_aged(hdr: Header) -> bool {
    hdr & YOUNG_AGE_BIT != 0
}

#[inline(always)]
pub fn has_forwarding(hdr: Header) -> bool {
    hdr & FWD_PTR_BIT != 0
}

#[inline(always)]
pub fn set_forwarded(hdr: Header) -> Header {
    hdr | FWD_PTR_BIT
}

/// Clears the forwarding, generation and age bits, returning an object to
/// the state a fresh young-generation allocation would have.
#[inline(always)]
pub fn reset_gc(hdr: Header) -> Header {
    hdr & !(NOT_YOUNG_OBJECT_BIT | YOUNG_AGE_BIT | FWD_PTR_BIT)
}

/// Total byte size occupied by the object this header describes, header
/// included. For tokens (`layout(hdr) == 0`) this is derived from the
/// length field, rounded up to 8 bytes and floored at 16 (the minimum
/// string/stringbuffer footprint); the lone exception is the permanent
/// empty-string placeholder, which occupies exactly 8 bytes. For anything
/// else it is the pre-computed size class.
pub fn get_size(hdr: Header) -> usize {
    if layout(hdr) == 0 {
        if hdr == EMPTY_STRING_HEADER {
            return 8;
        }
        let size = (len(hdr) + 8 + 7) & !7;
        if size < 16 {
            16
        } else {
            size
        }
    } else {
        size_class(hdr)
    }
}


#[cfg(test)]
mod quickcheck_tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    #[quickcheck]
    fn tag_field_round_trips(t: u32) -> bool {
        tag(with_tag(0, t)) == t
    }

    #[quickcheck]
    fn len_field_round_trips(n: u8) -> bool {
        let hdr = set_len(0, n as usize, usize::MAX, 0);
        len(hdr) == n as usize
    }

    #[quickcheck]
    fn layout_field_round_trips(l: u16) -> bool {
        // only the low 13 bits survive; mask the input the same way.
        let l = l & 0x1fff;
        layout(with_layout(0, l)) == l
    }
}
