//! Byte layout of a block and of its head projection.

use std::marker::PhantomData;

use crate::record::Record;

/// Width of a stored offset
pub(crate) const OFFSET_LEN: usize = 8;

/// Width of the stored entry count
pub(crate) const SIZE_LEN: usize = 4;

/// Field offsets for a block of `C` entries of type `E`
pub struct Layout<E, const C: usize>(PhantomData<fn() -> E>);

impl<E: Record, const C: usize> Layout<E, C> {
    pub const NEXT: usize = 0;
    pub const ENTRIES: usize = Self::NEXT + OFFSET_LEN;
    pub const PREV: usize = Self::ENTRIES + C * E::ENCODED_LEN;
    pub const SIZE: usize = Self::PREV + OFFSET_LEN;
    pub const BLOCK_LEN: usize = Self::SIZE + SIZE_LEN;

    pub const HEAD_NEXT: usize = 0;
    pub const HEAD_FIRST: usize = Self::HEAD_NEXT + OFFSET_LEN;
    pub const HEAD_LEN: usize = Self::HEAD_FIRST + E::ENCODED_LEN;

    /// Entries left in the original block when a full block splits
    pub const REMAINING: usize = C * 2 / 3;

    /// Evaluated at compile time for every instantiation that touches it.
    ///
    /// A head-only read must agree with a full read on `next` and on the
    /// first entry, and a split must leave both halves non-empty.
    pub const CHECK: () = {
        assert!(C >= 2, "block capacity must be at least 2");
        assert!(C <= u32::MAX as usize, "block capacity must fit the size field");
        assert!(Self::HEAD_NEXT == Self::NEXT, "head projection disagrees on `next`");
        assert!(Self::HEAD_FIRST == Self::ENTRIES, "head projection disagrees on first entry");
        assert!(Self::HEAD_LEN <= Self::BLOCK_LEN, "head projection longer than a block");
        assert!(Self::REMAINING >= 1 && Self::REMAINING < C, "split must leave both halves non-empty");
    };
}
