//! Single-level block chain
//!
//! A `Chain` is nothing but the offset of its root cell; all state lives
//! in storage. Reads walk the chain through cheap head projections, writes
//! go through a [`BlockHandle`].

use std::fmt;
use std::marker::PhantomData;

use crate::error::{IndexError, Result};
use crate::record::Record;
use crate::storage::{Offset, Storage, NULL_OFFSET};

use super::block::{Block, BlockHead};
use super::handle::BlockHandle;
use super::layout::Layout;
use super::{Mutation, Propagation};

/// One level of sorted blocks, anchored at a root cell
pub struct Chain<E, const C: usize> {
    root: Offset,
    _marker: PhantomData<fn() -> E>,
}

/// Counts gathered by [`Chain::verify`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChainStats {
    pub blocks: usize,
    pub entries: usize,
}

impl<E, const C: usize> Clone for Chain<E, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E, const C: usize> Copy for Chain<E, C> {}

impl<E, const C: usize> fmt::Debug for Chain<E, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("root", &self.root)
            .field("capacity", &C)
            .finish()
    }
}

impl<E: Record, const C: usize> Chain<E, C> {
    /// Allocate a new, empty root cell at the end of storage
    ///
    /// On a blank storage the first 8 bytes are reserved first, so neither
    /// the root cell nor any block can ever sit at the null offset.
    pub fn create<S: Storage>(storage: &mut S) -> Result<Self> {
        if storage.size() == NULL_OFFSET {
            storage.write_u64(NULL_OFFSET, 0)?;
        }
        let root = storage.size();
        storage.write_u64(root, NULL_OFFSET)?;
        tracing::debug!(root, capacity = C, "created chain");
        Ok(Self::attach(root))
    }

    /// Use an existing root cell
    pub fn attach(root: Offset) -> Self {
        let () = Layout::<E, C>::CHECK;
        Self {
            root,
            _marker: PhantomData,
        }
    }

    /// Offset of the root cell
    pub fn root_cell(&self) -> Offset {
        self.root
    }

    /// Offset of the first block (0 = empty chain)
    pub fn first_block<S: Storage>(&self, storage: &mut S) -> Result<Offset> {
        storage.read_u64(self.root)
    }

    pub fn is_empty<S: Storage>(&self, storage: &mut S) -> Result<bool> {
        Ok(self.first_block(storage)? == NULL_OFFSET)
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// The last block whose first entry is `<= key`
    ///
    /// Returns 0 if the chain is empty or `key` sorts before every block.
    pub fn find_block<S: Storage>(&self, storage: &mut S, key: &E) -> Result<Offset> {
        let first = self.first_block(storage)?;
        self.find_block_from(storage, first, key)
    }

    /// Like [`find_block`](Self::find_block), starting the walk at `start`
    pub fn find_block_from<S: Storage>(&self, storage: &mut S, start: Offset, key: &E) -> Result<Offset> {
        let mut current = NULL_OFFSET;
        let mut next = start;
        while next != NULL_OFFSET {
            let head = BlockHead::<E>::read::<S, C>(storage, next)?;
            if *key < head.first {
                break;
            }
            current = next;
            next = head.next;
        }
        Ok(current)
    }

    /// The greatest entry `<= probe`, if any
    pub fn floor<S: Storage>(&self, storage: &mut S, probe: &E) -> Result<Option<E>> {
        let first = self.first_block(storage)?;
        self.floor_from(storage, first, probe)
    }

    /// Like [`floor`](Self::floor), walking from block `start`
    pub fn floor_from<S: Storage>(&self, storage: &mut S, start: Offset, probe: &E) -> Result<Option<E>> {
        let offset = self.find_block_from(storage, start, probe)?;
        if offset == NULL_OFFSET {
            return Ok(None);
        }
        let block = Block::<E, C>::read(storage, offset)?;
        let below = block.entries.partition_point(|entry| entry <= probe);
        Ok(below.checked_sub(1).map(|i| block.entries[i].clone()))
    }

    /// All entries in `[begin, end]`, in order
    pub fn range<S: Storage>(&self, storage: &mut S, begin: &E, end: &E) -> Result<Vec<E>> {
        let start = match self.find_block(storage, begin)? {
            NULL_OFFSET => self.first_block(storage)?,
            offset => offset,
        };
        self.range_from(storage, start, begin, end)
    }

    /// All entries in `[begin, end]`, scanning forward from block `start`
    ///
    /// Stops at the first entry past `end`; everything after it is larger.
    pub fn range_from<S: Storage>(&self, storage: &mut S, start: Offset, begin: &E, end: &E) -> Result<Vec<E>> {
        let mut found = Vec::new();
        if end < begin {
            return Ok(found);
        }

        let mut current = start;
        while current != NULL_OFFSET {
            let block = Block::<E, C>::read(storage, current)?;
            current = block.next;
            for entry in block.entries {
                if entry < *begin {
                    continue;
                }
                if *end < entry {
                    return Ok(found);
                }
                found.push(entry);
            }
        }
        Ok(found)
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Insert `entry`, creating the first block if the chain is empty
    pub fn insert<S: Storage>(&self, storage: &mut S, entry: E) -> Result<Mutation<E>> {
        let first = self.first_block(storage)?;
        if first == NULL_OFFSET {
            let block = Block::<E, C>::new(self.root, NULL_OFFSET, vec![entry.clone()]);
            let offset = block.append(storage)?;
            storage.write_u64(self.root, offset)?;
            tracing::trace!(root = self.root, offset, "started chain");
            return Ok(Mutation::applied(vec![Propagation::InsertAt { key: entry, offset }]));
        }

        let target = match self.find_block_from(storage, first, &entry)? {
            NULL_OFFSET => first,
            offset => offset,
        };
        self.insert_at(storage, target, entry)
    }

    /// Insert `entry` into the block at `offset`
    ///
    /// The caller guarantees `offset` is the block that owns the entry's key.
    pub fn insert_at<S: Storage>(&self, storage: &mut S, offset: Offset, entry: E) -> Result<Mutation<E>> {
        let mut handle = BlockHandle::<S, E, C>::acquire(storage, offset)?;
        let mutation = handle.insert_sorted(entry)?;
        handle.release()?;
        Ok(mutation)
    }

    /// Remove the entry equal to `entry`, if present
    pub fn erase<S: Storage>(&self, storage: &mut S, entry: &E) -> Result<Mutation<E>> {
        let first = self.first_block(storage)?;
        if first == NULL_OFFSET {
            return Ok(Mutation::unchanged());
        }
        match self.find_block_from(storage, first, entry)? {
            NULL_OFFSET => Ok(Mutation::unchanged()),
            offset => self.erase_at(storage, offset, entry),
        }
    }

    /// Remove `entry` from the block at `offset`
    pub fn erase_at<S: Storage>(&self, storage: &mut S, offset: Offset, entry: &E) -> Result<Mutation<E>> {
        let mut handle = BlockHandle::<S, E, C>::acquire(storage, offset)?;
        let mutation = handle.erase_sorted(entry)?;
        handle.release()?;
        Ok(mutation)
    }

    /// Overwrite the entry equal to `old` with `new` without moving it
    pub fn replace<S: Storage>(&self, storage: &mut S, old: &E, new: E) -> Result<Mutation<E>> {
        let offset = self.find_block(storage, old)?;
        if offset == NULL_OFFSET {
            return Err(IndexError::StructuralInconsistency(format!(
                "no block holds {:?} in chain at {}",
                old, self.root
            )));
        }
        let mut handle = BlockHandle::<S, E, C>::acquire(storage, offset)?;
        let mutation = handle.replace_in_place(old, new)?;
        handle.release()?;
        Ok(mutation)
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Every linked block with its offset, in chain order
    pub fn blocks<S: Storage>(&self, storage: &mut S) -> Result<Vec<(Offset, Block<E, C>)>> {
        let limit = self.block_limit(&*storage);
        let mut blocks = Vec::new();
        let mut current = self.first_block(storage)?;
        while current != NULL_OFFSET {
            if blocks.len() >= limit {
                return Err(IndexError::StructuralInconsistency(format!(
                    "chain at {} does not terminate",
                    self.root
                )));
            }
            let block = Block::<E, C>::read(storage, current)?;
            let next = block.next;
            blocks.push((current, block));
            current = next;
        }
        Ok(blocks)
    }

    /// Number of entries in the chain (full walk)
    pub fn len<S: Storage>(&self, storage: &mut S) -> Result<usize> {
        Ok(self.blocks(storage)?.iter().map(|(_, block)| block.len()).sum())
    }

    /// Check links, occupancy and global order of the whole chain
    pub fn verify<S: Storage>(&self, storage: &mut S) -> Result<ChainStats> {
        let mut stats = ChainStats::default();
        let mut expected_prev = self.root;
        let mut last: Option<E> = None;

        for (offset, block) in self.blocks(storage)? {
            if block.prev != expected_prev {
                return Err(IndexError::StructuralInconsistency(format!(
                    "block {} links back to {}, expected {}",
                    offset, block.prev, expected_prev
                )));
            }
            if block.is_empty() {
                return Err(IndexError::StructuralInconsistency(format!(
                    "linked block {} is empty",
                    offset
                )));
            }
            for entry in &block.entries {
                if let Some(previous) = &last {
                    if entry <= previous {
                        return Err(IndexError::StructuralInconsistency(format!(
                            "entry {:?} in block {} does not sort after {:?}",
                            entry, offset, previous
                        )));
                    }
                }
                last = Some(entry.clone());
            }

            stats.blocks += 1;
            stats.entries += block.len();
            expected_prev = offset;
        }
        Ok(stats)
    }

    /// Upper bound on the number of blocks storage can hold (cycle guard)
    fn block_limit<S: Storage>(&self, storage: &S) -> usize {
        (storage.size() / Layout::<E, C>::BLOCK_LEN as u64) as usize + 1
    }
}
