//! Block Chain Module
//!
//! One level of the ordered index: a doubly-linked chain of fixed-capacity
//! blocks, each holding a sorted run of entries.
//!
//! ## Responsibilities
//! - Locate the block that owns a key by walking block heads
//! - Scan entries in order across blocks (range queries)
//! - Insert with split, erase with unlink / forward merge
//! - Report structural changes upward as [`Propagation`] values
//!
//! ## Block Format
//! ```text
//! ┌──────────┬──────────────────────────────┬──────────┬──────────┐
//! │ Next (8) │ Entries (C × ENCODED_LEN)    │ Prev (8) │ Size (4) │
//! └──────────┴──────────────────────────────┴──────────┴──────────┘
//! ┌──────────┬───────────────┐
//! │ Next (8) │ First entry   │   head projection (prefix of a block)
//! └──────────┴───────────────┘
//! ```
//!
//! A root cell is a single `u64` naming the first block (0 = empty chain).
//! It is shaped like a block's `Next` field, so the first block simply
//! back-links to its root cell.
//!
//! ## Levels
//! A head chain is a `Chain<HeadEntry<E>, C>` with one entry per block of
//! the level below. Each level only reads the level beneath it and hands
//! its structural changes back as data; the caller applies them to the
//! level above with [`Chain::apply_all`].

mod block;
mod handle;
mod head;
mod layout;
mod level;

pub use block::Block;
pub use handle::BlockHandle;
pub use head::HeadEntry;
pub use layout::Layout;
pub use level::{Chain, ChainStats};

use crate::storage::Offset;

// =============================================================================
// Upward Protocol
// =============================================================================

/// A structural change the level above has to mirror
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Propagation<E> {
    /// The first entry of block `offset` changed from `old` to `new`
    Replace { offset: Offset, old: E, new: E },

    /// A new block starting with `key` was linked in at `offset`
    InsertAt { key: E, offset: Offset },

    /// The block at `offset`, which started with `key`, left the chain
    RemoveAt { key: E, offset: Offset },
}

/// Outcome of a block or chain mutation
///
/// An empty `upward` list is the no-op instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutation<E> {
    /// Whether the entry was actually inserted / removed
    pub applied: bool,

    /// Obligations for the level above, in the order they must be applied
    pub upward: Vec<Propagation<E>>,
}

impl<E> Mutation<E> {
    /// Nothing happened (duplicate insert, erase of a missing entry)
    pub fn unchanged() -> Self {
        Self {
            applied: false,
            upward: Vec::new(),
        }
    }

    /// The entry was applied, with these obligations for the level above
    pub fn applied(upward: Vec<Propagation<E>>) -> Self {
        Self {
            applied: true,
            upward,
        }
    }

    /// True if the level above has nothing to do
    pub fn is_noop(&self) -> bool {
        self.upward.is_empty()
    }
}
