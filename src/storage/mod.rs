//! Storage Module
//!
//! Byte-addressable storage that the block chains are laid out on.
//!
//! ## Responsibilities
//! - Read and write bytes at absolute offsets
//! - Report the current end of the address space
//! - Grow on writes past the end; never shrink
//!
//! ## Address Space
//! ```text
//! 0                                                         size()
//! ├──────────────┬──────────┬──────────┬──────────┬─── ... ──┤
//! │ header/cells │ block A  │ block B  │ block A' │          │
//! └──────────────┴──────────┴──────────┴──────────┴─── ... ──┘
//!   offset 0 is never a block: it is the null offset
//!   new blocks are always appended at size()
//! ```

mod file;
mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

use crate::error::Result;

/// Absolute byte position inside a storage
pub type Offset = u64;

/// The null offset. Never a valid block or root cell address.
pub const NULL_OFFSET: Offset = 0;

/// Byte-addressable storage backend
///
/// Implementations are used from a single thread. Every call completes
/// before the next one starts; there is no atomicity across calls.
pub trait Storage {
    /// Fill `buf` with the bytes starting at `offset`
    ///
    /// Fails with `InvalidOffset` if the range ends past `size()`.
    fn read_at(&mut self, offset: Offset, buf: &mut [u8]) -> Result<()>;

    /// Write `bytes` at `offset`, growing the storage if needed
    fn write_at(&mut self, offset: Offset, bytes: &[u8]) -> Result<()>;

    /// Current end of the address space
    fn size(&self) -> Offset;

    /// Flush buffered writes to stable storage
    fn sync(&mut self) -> Result<()> {
        Ok(())
    }

    /// Read `len` bytes at `offset` into a fresh buffer
    fn read(&mut self, offset: Offset, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_at(offset, &mut buf)?;
        Ok(buf)
    }

    /// Read a little-endian u64 (root cells, link fields)
    fn read_u64(&mut self, offset: Offset) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.read_at(offset, &mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    /// Write a little-endian u64 (root cells, link fields)
    fn write_u64(&mut self, offset: Offset, value: u64) -> Result<()> {
        self.write_at(offset, &value.to_le_bytes())
    }

    /// Read a little-endian u32 (block size fields)
    fn read_u32(&mut self, offset: Offset) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read_at(offset, &mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }
}

impl<S: Storage + ?Sized> Storage for Box<S> {
    fn read_at(&mut self, offset: Offset, buf: &mut [u8]) -> Result<()> {
        (**self).read_at(offset, buf)
    }

    fn write_at(&mut self, offset: Offset, bytes: &[u8]) -> Result<()> {
        (**self).write_at(offset, bytes)
    }

    fn size(&self) -> Offset {
        (**self).size()
    }

    fn sync(&mut self) -> Result<()> {
        (**self).sync()
    }
}

/// Bounds check shared by the backends
pub(crate) fn check_range(offset: Offset, len: usize, size: Offset) -> Result<()> {
    match offset.checked_add(len as u64) {
        Some(end) if end <= size => Ok(()),
        _ => Err(crate::IndexError::InvalidOffset { offset, size }),
    }
}
