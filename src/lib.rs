//! # blockindex
//!
//! A disk-resident ordered index with:
//! - Fixed-capacity sorted blocks linked into chains
//! - A head chain indexing the first entry of every leaf block
//! - Split on overflow, unlink on empty, forward merge on underflow
//! - Structural changes passed upward as plain values, one level at a time
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │              UniqueMap (key → value, optional)               │
//! └──────────────┬──────────────────────────────┬───────────────┘
//!                │                              │
//! ┌──────────────▼──────────────┐        ┌──────▼──────┐
//! │        OrderedIndex          │        │  ValueLog   │
//! │  find / insert / erase       │        │  (append)   │
//! └──────────────┬──────────────┘        └──────┬──────┘
//!                │                              │
//!      ┌─────────┴─────────┐                    │
//!      ▼                   ▲ Propagation        │
//! ┌─────────────┐   ┌──────┴──────┐             │
//! │ Head Chain  │──▶│ Leaf Chain  │             │
//! │ (key, off)  │   │  (entries)  │             │
//! └──────┬──────┘   └──────┬──────┘             │
//!        └────────┬────────┘                    │
//!                 ▼                             ▼
//!          ┌─────────────┐               ┌─────────────┐
//!          │   Storage   │               │   Storage   │
//!          └─────────────┘               └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod storage;
pub mod record;
pub mod chain;
pub mod index;
pub mod map;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{IndexError, Result};
pub use config::Config;
pub use index::OrderedIndex;
pub use map::UniqueMap;
pub use record::{FixedBytes, Record};
pub use storage::{FileStorage, MemoryStorage, Offset, Storage};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of blockindex
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
