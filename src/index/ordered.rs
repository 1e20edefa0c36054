//! Composite Ordered Index
//!
//! Couples a leaf chain with one head chain on the same storage.

use crate::chain::{Block, Chain, HeadEntry, Layout, Propagation};
use crate::error::{IndexError, Result};
use crate::record::Record;
use crate::storage::{Offset, Storage, NULL_OFFSET};

use super::header::{IndexHeader, HEAD_ROOT, LEAF_ROOT};

/// Counts gathered by [`OrderedIndex::verify`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexStats {
    /// Entries in the leaf chain
    pub entries: usize,
    /// Linked leaf blocks
    pub leaf_blocks: usize,
    /// Linked head blocks
    pub head_blocks: usize,
}

/// Disk-resident ordered set of `E`, in blocks of `C` entries
///
/// ## Head coverage
/// Every leaf block, including the first one, has exactly one head entry
/// `(first entry, offset)`. Lookups still fall back to the first leaf
/// block when the head chain has no entry at or below the key.
///
/// ## Access
/// Single-threaded. Every method, reads included, takes `&mut self`
/// because reading positions the underlying storage.
pub struct OrderedIndex<E: Record, S: Storage, const C: usize> {
    storage: S,
    leaves: Chain<E, C>,
    heads: Chain<HeadEntry<E>, C>,
}

impl<E: Record, S: Storage, const C: usize> OrderedIndex<E, S, C> {
    /// Open an index on `storage`, initializing it if the storage is blank
    ///
    /// A non-blank storage must carry a header written with the same block
    /// capacity and entry width.
    pub fn open(mut storage: S) -> Result<Self> {
        let () = Layout::<E, C>::CHECK;
        let () = Layout::<HeadEntry<E>, C>::CHECK;

        let header = IndexHeader {
            capacity: C as u32,
            entry_len: E::ENCODED_LEN as u32,
        };

        if storage.size() == 0 {
            header.initialize(&mut storage)?;
            tracing::debug!(capacity = C, entry_len = E::ENCODED_LEN, "initialized index");
        } else {
            header.validate(&mut storage)?;
            tracing::debug!(size = storage.size(), "opened existing index");
        }

        Ok(Self {
            storage,
            leaves: Chain::attach(LEAF_ROOT),
            heads: Chain::attach(HEAD_ROOT),
        })
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// All entries in `[begin, end]`, ascending
    ///
    /// Empty when `end < begin` or nothing matches.
    pub fn find(&mut self, begin: &E, end: &E) -> Result<Vec<E>> {
        if end < begin {
            return Ok(Vec::new());
        }

        let start = self.leaf_block_for(begin)?;
        if start == NULL_OFFSET {
            return Ok(Vec::new());
        }

        let found = self.leaves.range_from(&mut self.storage, start, begin, end)?;
        tracing::trace!(?begin, ?end, start, count = found.len(), "find");
        Ok(found)
    }

    /// Insert `entry`. Returns false if an equal entry was already present.
    pub fn insert(&mut self, entry: E) -> Result<bool> {
        tracing::trace!(?entry, "insert");

        let mutation = match self.heads.child_for(&mut self.storage, &entry)? {
            Some(block) => self.leaves.insert_at(&mut self.storage, block, entry)?,
            None => self.leaves.insert(&mut self.storage, entry)?,
        };

        self.propagate(mutation.upward)?;
        Ok(mutation.applied)
    }

    /// Remove the entry equal to `entry`. Returns false if it wasn't there.
    pub fn erase(&mut self, entry: &E) -> Result<bool> {
        tracing::trace!(?entry, "erase");

        // Nothing at or below the key means it sorts before every entry.
        let Some(block) = self.heads.child_for(&mut self.storage, entry)? else {
            return Ok(false);
        };

        let mutation = self.leaves.erase_at(&mut self.storage, block, entry)?;
        self.propagate(mutation.upward)?;
        Ok(mutation.applied)
    }

    pub fn contains(&mut self, entry: &E) -> Result<bool> {
        Ok(!self.find(entry, entry)?.is_empty())
    }

    /// Number of entries (walks every leaf block)
    pub fn len(&mut self) -> Result<usize> {
        self.leaves.len(&mut self.storage)
    }

    pub fn is_empty(&mut self) -> Result<bool> {
        self.leaves.is_empty(&mut self.storage)
    }

    /// Full integrity check of both levels
    ///
    /// Checks each chain on its own (links, occupancy, order) and then that
    /// the head entries are exactly `(first entry, offset)` of every leaf
    /// block, in chain order.
    pub fn verify(&mut self) -> Result<IndexStats> {
        let leaf_stats = self.leaves.verify(&mut self.storage)?;
        let head_stats = self.heads.verify(&mut self.storage)?;

        let expected: Vec<HeadEntry<E>> = self
            .leaves
            .blocks(&mut self.storage)?
            .into_iter()
            .filter_map(|(offset, block)| block.first().cloned().map(|key| HeadEntry::new(key, offset)))
            .collect();
        let actual = self.head_entries()?;

        if expected != actual {
            return Err(IndexError::StructuralInconsistency(format!(
                "head chain covers {} blocks, leaf chain has {}",
                actual.len(),
                expected.len()
            )));
        }

        Ok(IndexStats {
            entries: leaf_stats.entries,
            leaf_blocks: leaf_stats.blocks,
            head_blocks: head_stats.blocks,
        })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn into_storage(self) -> S {
        self.storage
    }

    pub fn sync(&mut self) -> Result<()> {
        self.storage.sync()
    }

    /// The leaf level (for inspection)
    pub fn leaf_chain(&self) -> Chain<E, C> {
        self.leaves
    }

    /// The head level (for inspection)
    pub fn head_chain(&self) -> Chain<HeadEntry<E>, C> {
        self.heads
    }

    /// Leaf blocks in chain order (for inspection)
    pub fn leaf_blocks(&mut self) -> Result<Vec<(Offset, Block<E, C>)>> {
        self.leaves.blocks(&mut self.storage)
    }

    /// Head entries in chain order (for inspection)
    pub fn head_entries(&mut self) -> Result<Vec<HeadEntry<E>>> {
        Ok(self
            .heads
            .blocks(&mut self.storage)?
            .into_iter()
            .flat_map(|(_, block)| block.entries().to_vec())
            .collect())
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Leaf block to start at for `key`: from the head chain, else the first
    fn leaf_block_for(&mut self, key: &E) -> Result<Offset> {
        match self.heads.child_for(&mut self.storage, key)? {
            Some(block) => Ok(block),
            None => self.leaves.first_block(&mut self.storage),
        }
    }

    /// Apply the leaf level's obligations to the head chain
    fn propagate(&mut self, upward: Vec<Propagation<E>>) -> Result<()> {
        if upward.is_empty() {
            return Ok(());
        }
        let above = self.heads.apply_all(&mut self.storage, upward)?;
        if !above.is_empty() {
            // Two levels only: the head chain's own first key and block
            // changes have no parent to go to.
            tracing::trace!(count = above.len(), "top level obligations dropped");
        }
        Ok(())
    }
}
