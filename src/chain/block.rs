//! In-memory image of one block, plus the head projection used for walks.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{IndexError, Result};
use crate::record::Record;
use crate::storage::{Offset, Storage, NULL_OFFSET};

use super::layout::Layout;

/// A decoded block: links plus up to `C` sorted entries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block<E, const C: usize> {
    pub(super) next: Offset,
    pub(super) prev: Offset,
    pub(super) entries: Vec<E>,
}

impl<E: Record, const C: usize> Block<E, C> {
    pub(crate) fn new(prev: Offset, next: Offset, entries: Vec<E>) -> Self {
        Self { next, prev, entries }
    }

    /// Offset of the following block (0 = last block)
    pub fn next(&self) -> Offset {
        self.next
    }

    /// Offset of the previous block, or of the root cell for a first block
    pub fn prev(&self) -> Offset {
        self.prev
    }

    pub fn entries(&self) -> &[E] {
        &self.entries
    }

    pub fn first(&self) -> Option<&E> {
        self.entries.first()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= C
    }

    /// Insert into the sorted run without splitting
    ///
    /// Returns `Ok(None)` if an equal entry is already present, otherwise
    /// the position the entry landed at.
    pub(crate) fn insert_sorted(&mut self, entry: E) -> Result<Option<usize>> {
        let pos = match self.entries.binary_search(&entry) {
            Ok(_) => return Ok(None),
            Err(pos) => pos,
        };
        if self.is_full() {
            return Err(IndexError::CapacityExceeded { capacity: C });
        }
        self.entries.insert(pos, entry);
        Ok(Some(pos))
    }

    /// Remove an equal entry, returning the position it was at
    pub(crate) fn erase_sorted(&mut self, entry: &E) -> Option<usize> {
        let pos = self.entries.binary_search(entry).ok()?;
        self.entries.remove(pos);
        Some(pos)
    }

    // =========================================================================
    // Encoding
    // =========================================================================

    pub(crate) fn encode(&self) -> BytesMut {
        let entry_len = E::ENCODED_LEN;
        let mut buf = BytesMut::with_capacity(Layout::<E, C>::BLOCK_LEN);

        buf.put_u64_le(self.next);
        for entry in &self.entries {
            entry.encode(&mut buf);
        }
        buf.put_bytes(0, (C - self.entries.len()) * entry_len);
        buf.put_u64_le(self.prev);
        buf.put_u32_le(self.entries.len() as u32);

        debug_assert_eq!(buf.len(), Layout::<E, C>::BLOCK_LEN);
        buf
    }

    pub(crate) fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != Layout::<E, C>::BLOCK_LEN {
            return Err(IndexError::StructuralInconsistency(format!(
                "block image is {} bytes, expected {}",
                bytes.len(),
                Layout::<E, C>::BLOCK_LEN
            )));
        }

        let size = (&bytes[Layout::<E, C>::SIZE..]).get_u32_le() as usize;
        if size > C {
            return Err(IndexError::StructuralInconsistency(format!(
                "block claims {} entries, capacity is {}",
                size, C
            )));
        }

        let mut cursor = &bytes[Layout::<E, C>::NEXT..];
        let next = cursor.get_u64_le();
        let entries = (0..size).map(|_| E::decode(&mut cursor)).collect();
        let prev = (&bytes[Layout::<E, C>::PREV..]).get_u64_le();

        Ok(Self { next, prev, entries })
    }

    // =========================================================================
    // Storage I/O
    // =========================================================================

    /// Load the block at `offset`
    pub(crate) fn read<S: Storage>(storage: &mut S, offset: Offset) -> Result<Self> {
        check_block_offset(&*storage, offset, Layout::<E, C>::BLOCK_LEN)?;
        let bytes = storage.read(offset, Layout::<E, C>::BLOCK_LEN)?;
        Self::decode(&bytes)
    }

    /// Write the block back to `offset`
    pub(crate) fn write<S: Storage>(&self, storage: &mut S, offset: Offset) -> Result<()> {
        storage.write_at(offset, &self.encode())
    }

    /// Write the block at the end of storage and return its new offset
    pub(crate) fn append<S: Storage>(&self, storage: &mut S) -> Result<Offset> {
        let offset = storage.size();
        if offset == NULL_OFFSET {
            return Err(IndexError::InvalidOffset {
                offset,
                size: offset,
            });
        }
        self.write(storage, offset)?;
        tracing::debug!(offset, entries = self.entries.len(), "allocated block");
        Ok(offset)
    }
}

/// The prefix of a block needed to decide whether to walk past it
#[derive(Debug, Clone)]
pub(crate) struct BlockHead<E> {
    pub(crate) next: Offset,
    pub(crate) first: E,
}

impl<E: Record> BlockHead<E> {
    /// Read only `next` and the first entry of the block at `offset`
    pub(crate) fn read<S: Storage, const C: usize>(storage: &mut S, offset: Offset) -> Result<Self> {
        let len = Layout::<E, C>::HEAD_LEN;
        check_block_offset(&*storage, offset, len)?;
        let bytes = storage.read(offset, len)?;

        let mut cursor = &bytes[Layout::<E, C>::HEAD_NEXT..];
        let next = cursor.get_u64_le();
        let mut cursor = &bytes[Layout::<E, C>::HEAD_FIRST..];
        let first = E::decode(&mut cursor);

        Ok(Self { next, first })
    }
}

fn check_block_offset<S: Storage>(storage: &S, offset: Offset, len: usize) -> Result<()> {
    let size = storage.size();
    if offset == NULL_OFFSET || offset.saturating_add(len as u64) > size {
        return Err(IndexError::InvalidOffset { offset, size });
    }
    Ok(())
}
