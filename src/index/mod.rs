//! Ordered Index Module
//!
//! Two-level composite: a leaf chain holding the entries and a head chain
//! holding one `(first entry, block offset)` pair per leaf block.
//!
//! ## Responsibilities
//! - Jump close to a key through the head chain instead of walking leaves
//! - Point insert / erase with upward propagation into the head chain
//! - Inclusive range lookup
//! - Whole-structure integrity check
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │ Header (32 bytes)                                           │
//! │   Magic "BKIX" (4) | Version u32 (4)                        │
//! │   Leaf root cell u64 (8) | Head root cell u64 (8)           │
//! │   Capacity u32 (4) | Entry length u32 (4)                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │ Leaf and head blocks, interleaved in allocation order       │
//! │   (never reclaimed; emptied blocks are only unlinked)       │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod header;
mod ordered;

pub use ordered::{IndexStats, OrderedIndex};
