//! Scoped Block Handle
//!
//! The only way blocks get mutated. A handle owns the in-memory copy of
//! exactly one block and a mutable borrow of the storage it came from, so
//! while it lives nothing else can read or write that storage.
//! Dirty contents are written back on `release()`, or from `Drop` on any
//! other exit path (including `?` returns in the middle of a mutation).

use crate::error::{IndexError, Result};
use crate::record::Record;
use crate::storage::{Offset, Storage, NULL_OFFSET};

use super::block::Block;
use super::layout::Layout;
use super::{Mutation, Propagation};

/// Exclusive, write-back view of the block at one offset
pub struct BlockHandle<'s, S: Storage, E: Record, const C: usize> {
    storage: &'s mut S,
    offset: Offset,
    block: Block<E, C>,
    dirty: bool,
}

impl<'s, S: Storage, E: Record, const C: usize> BlockHandle<'s, S, E, C> {
    /// Load the block at `offset`
    ///
    /// Fails with `InvalidOffset` for offset 0 or an offset past the end.
    pub fn acquire(storage: &'s mut S, offset: Offset) -> Result<Self> {
        let () = Layout::<E, C>::CHECK;
        let block = Block::read(storage, offset)?;
        Ok(Self {
            storage,
            offset,
            block,
            dirty: false,
        })
    }

    pub fn offset(&self) -> Offset {
        self.offset
    }

    pub fn block(&self) -> &Block<E, C> {
        &self.block
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Write back (if dirty) and give up the block
    pub fn release(mut self) -> Result<()> {
        self.flush()
    }

    fn flush(&mut self) -> Result<()> {
        if self.dirty {
            self.block.write(self.storage, self.offset)?;
            self.dirty = false;
        }
        Ok(())
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Insert `entry` in order, splitting the block if it is full
    ///
    /// Upward obligations, in order: `Replace` if the first entry changed,
    /// then `InsertAt` for the new sibling if a split happened.
    pub fn insert_sorted(&mut self, entry: E) -> Result<Mutation<E>> {
        let pos = match self.block.entries.binary_search(&entry) {
            Ok(_) => {
                tracing::trace!(offset = self.offset, ?entry, "entry already present");
                return Ok(Mutation::unchanged());
            }
            Err(pos) => pos,
        };

        let old_first = self.block.first().cloned();
        let mut upward = Vec::new();

        if self.block.is_full() {
            let sibling = self.split_insert(pos, entry)?;
            upward.push(sibling);
        } else {
            self.block.insert_sorted(entry)?;
            self.dirty = true;
        }

        if let Some(replace) = self.first_changed(old_first) {
            upward.insert(0, replace);
        }
        Ok(Mutation::applied(upward))
    }

    /// Remove the entry equal to `entry`, if present
    ///
    /// An emptied block is unlinked and reported with `RemoveAt`. Otherwise
    /// the successor is absorbed when both fit in one block with room to
    /// spare; the absorbed block is reported with `RemoveAt` after any
    /// `Replace` for this block.
    pub fn erase_sorted(&mut self, entry: &E) -> Result<Mutation<E>> {
        let old_first = match self.block.first() {
            Some(first) => first.clone(),
            None => return Ok(Mutation::unchanged()),
        };
        if self.block.erase_sorted(entry).is_none() {
            return Ok(Mutation::unchanged());
        }
        self.dirty = true;

        if self.block.is_empty() {
            self.unlink()?;
            return Ok(Mutation::applied(vec![Propagation::RemoveAt {
                key: old_first,
                offset: self.offset,
            }]));
        }

        let mut upward = Vec::new();
        if let Some(replace) = self.first_changed(Some(old_first)) {
            upward.push(replace);
        }
        if let Some(absorbed) = self.merge_successor()? {
            upward.push(absorbed);
        }
        Ok(Mutation::applied(upward))
    }

    /// Overwrite `old` with `new` in place
    ///
    /// Used by index levels to track a changed first key below them. `new`
    /// must sort into the same position `old` held.
    pub fn replace_in_place(&mut self, old: &E, new: E) -> Result<Mutation<E>> {
        let pos = self.block.entries.binary_search(old).map_err(|_| {
            IndexError::StructuralInconsistency(format!(
                "entry {:?} not found in block {}",
                old, self.offset
            ))
        })?;

        let entries = &self.block.entries;
        let fits_before = pos == 0 || entries[pos - 1] < new;
        let fits_after = pos + 1 == entries.len() || new < entries[pos + 1];
        if !fits_before || !fits_after {
            return Err(IndexError::StructuralInconsistency(format!(
                "replacing {:?} with {:?} would break order in block {}",
                old, new, self.offset
            )));
        }

        self.block.entries[pos] = new.clone();
        self.dirty = true;

        if pos == 0 {
            return Ok(Mutation::applied(vec![Propagation::Replace {
                offset: self.offset,
                old: old.clone(),
                new,
            }]));
        }
        Ok(Mutation::applied(Vec::new()))
    }

    // =========================================================================
    // Structural Helpers
    // =========================================================================

    fn first_changed(&self, old_first: Option<E>) -> Option<Propagation<E>> {
        let old = old_first?;
        let new = self.block.first()?;
        (*new != old).then(|| Propagation::Replace {
            offset: self.offset,
            old,
            new: new.clone(),
        })
    }

    /// Move the top third of a full block into a new successor
    ///
    /// `C * 2 / 3` entries stay, the rest move; `entry` then goes to
    /// whichever half its key belongs to.
    fn split_insert(&mut self, pos: usize, entry: E) -> Result<Propagation<E>> {
        let remaining = Layout::<E, C>::REMAINING;
        let mut tail = self.block.entries.split_off(remaining);
        if pos <= remaining {
            self.block.entries.insert(pos, entry);
        } else {
            tail.insert(pos - remaining, entry);
        }

        let key = tail.first().cloned().ok_or_else(|| {
            IndexError::StructuralInconsistency(format!("empty split tail in block {}", self.offset))
        })?;

        let old_next = self.block.next;
        let sibling = Block::<E, C>::new(self.offset, old_next, tail);
        let sibling_offset = sibling.append(self.storage)?;

        if old_next != NULL_OFFSET {
            Self::relink_prev(self.storage, old_next, self.offset, sibling_offset)?;
        }
        self.block.next = sibling_offset;
        self.dirty = true;

        tracing::debug!(
            offset = self.offset,
            sibling = sibling_offset,
            left = self.block.len(),
            right = sibling.len(),
            "split block"
        );

        Ok(Propagation::InsertAt {
            key,
            offset: sibling_offset,
        })
    }

    /// Patch both neighbours around this (now empty) block
    fn unlink(&mut self) -> Result<()> {
        let prev = self.block.prev;
        let next = self.block.next;

        Self::relink_next(self.storage, prev, self.offset, next)?;
        if next != NULL_OFFSET {
            Self::relink_prev(self.storage, next, self.offset, prev)?;
        }

        self.block.prev = NULL_OFFSET;
        self.block.next = NULL_OFFSET;
        self.dirty = true;

        tracing::debug!(offset = self.offset, prev, next, "unlinked empty block");
        Ok(())
    }

    /// Absorb the successor when the combined run stays below capacity
    fn merge_successor(&mut self) -> Result<Option<Propagation<E>>> {
        let next = self.block.next;
        if next == NULL_OFFSET {
            return Ok(None);
        }

        let next_len = self.storage.read_u32(next + Layout::<E, C>::SIZE as u64)? as usize;
        if self.block.len() + next_len >= C {
            return Ok(None);
        }

        let successor = Block::<E, C>::read(self.storage, next)?;
        if successor.prev != self.offset {
            return Err(IndexError::StructuralInconsistency(format!(
                "block {} links back to {}, expected {}",
                next, successor.prev, self.offset
            )));
        }
        let key = successor.first().cloned().ok_or_else(|| {
            IndexError::StructuralInconsistency(format!("linked block {} is empty", next))
        })?;

        if successor.next != NULL_OFFSET {
            Self::relink_prev(self.storage, successor.next, next, self.offset)?;
        }
        self.block.next = successor.next;
        self.block.entries.extend(successor.entries);
        self.dirty = true;

        tracing::debug!(offset = self.offset, absorbed = next, len = self.block.len(), "merged successor");
        Ok(Some(Propagation::RemoveAt { key, offset: next }))
    }

    /// Repoint the `next` field at `at` (a block or a root cell)
    fn relink_next(storage: &mut S, at: Offset, expected: Offset, target: Offset) -> Result<()> {
        if at == NULL_OFFSET {
            return Err(IndexError::StructuralInconsistency(format!(
                "block {} has no predecessor or root cell",
                expected
            )));
        }
        let field = at + Layout::<E, C>::NEXT as u64;
        let current = storage.read_u64(field)?;
        if current != expected {
            return Err(IndexError::StructuralInconsistency(format!(
                "{} links forward to {}, expected {}",
                at, current, expected
            )));
        }
        storage.write_u64(field, target)
    }

    /// Repoint the `prev` field of the block at `at`
    fn relink_prev(storage: &mut S, at: Offset, expected: Offset, target: Offset) -> Result<()> {
        let field = at + Layout::<E, C>::PREV as u64;
        let current = storage.read_u64(field)?;
        if current != expected {
            return Err(IndexError::StructuralInconsistency(format!(
                "block {} links back to {}, expected {}",
                at, current, expected
            )));
        }
        storage.write_u64(field, target)
    }
}

impl<'s, S: Storage, E: Record, const C: usize> Drop for BlockHandle<'s, S, E, C> {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            tracing::error!(offset = self.offset, error = %e, "failed to write back block");
        }
    }
}
