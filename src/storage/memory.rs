//! In-memory storage
//!
//! A growable byte vector. Used by tests, benchmarks and `--in-memory` runs.

use crate::error::Result;

use super::{check_range, Offset, Storage};

/// Storage backed by a `Vec<u8>`
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    data: Vec<u8>,
}

impl MemoryStorage {
    /// Create an empty storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw contents (for tests and debugging)
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

impl Storage for MemoryStorage {
    fn read_at(&mut self, offset: Offset, buf: &mut [u8]) -> Result<()> {
        check_range(offset, buf.len(), self.size())?;
        let start = offset as usize;
        buf.copy_from_slice(&self.data[start..start + buf.len()]);
        Ok(())
    }

    fn write_at(&mut self, offset: Offset, bytes: &[u8]) -> Result<()> {
        let start = offset as usize;
        let end = start + bytes.len();
        if self.data.len() < end {
            self.data.resize(end, 0);
        }
        self.data[start..end].copy_from_slice(bytes);
        Ok(())
    }

    fn size(&self) -> Offset {
        self.data.len() as Offset
    }
}
