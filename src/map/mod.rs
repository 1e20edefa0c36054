//! Unique Map Module
//!
//! A `key → value` map layered on an [`OrderedIndex`](crate::OrderedIndex)
//! of `(key, value offset)` pairs plus a separate append-only value log.
//!
//! ## Responsibilities
//! - At most one index entry per key
//! - Values of any serde type, stored out of line
//! - Overwrites append a new value and re-point the index entry
//!
//! ## Value Log Format
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ Header: Magic "BKVL" (4) | Version (4)  │
//! ├─────────────────────────────────────────┤
//! │ Record 1                                │
//! │ ┌─────────┬─────────┬─────────────────┐ │
//! │ │ Len (4) │ CRC (4) │ bincode payload │ │
//! │ └─────────┴─────────┴─────────────────┘ │
//! ├─────────────────────────────────────────┤
//! │ Record 2 ...                            │
//! └─────────────────────────────────────────┘
//! ```
//! A value's offset is the offset of its record; superseded and removed
//! values stay in the log.

mod unique;
mod value_log;

pub use unique::{UniqueMap, MAP_BLOCK_CAPACITY};
pub use value_log::ValueLog;
