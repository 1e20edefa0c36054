//! Index file header: format identification and the two root cells.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{IndexError, Result};
use crate::storage::{Offset, Storage, NULL_OFFSET};

/// Magic bytes identifying a blockindex file
const MAGIC: &[u8; 4] = b"BKIX";

/// Current index format version
const VERSION: u32 = 1;

/// Root cell of the leaf chain
pub(crate) const LEAF_ROOT: Offset = 8;

/// Root cell of the head chain
pub(crate) const HEAD_ROOT: Offset = 16;

/// Header size: Magic (4) + Version (4) + 2 root cells (16) + Capacity (4) + EntryLen (4)
pub(crate) const HEADER_SIZE: usize = 32;

/// Shape of the blocks an index file was created with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct IndexHeader {
    pub(crate) capacity: u32,
    pub(crate) entry_len: u32,
}

impl IndexHeader {
    /// Write a fresh header with both chains empty
    pub(crate) fn initialize<S: Storage>(&self, storage: &mut S) -> Result<()> {
        let mut buf = BytesMut::with_capacity(HEADER_SIZE);
        buf.put_slice(MAGIC);
        buf.put_u32_le(VERSION);
        buf.put_u64_le(NULL_OFFSET);
        buf.put_u64_le(NULL_OFFSET);
        buf.put_u32_le(self.capacity);
        buf.put_u32_le(self.entry_len);
        storage.write_at(0, &buf)
    }

    /// Check an existing header against the expected block shape
    pub(crate) fn validate<S: Storage>(&self, storage: &mut S) -> Result<()> {
        if storage.size() < HEADER_SIZE as u64 {
            return Err(IndexError::Format(format!(
                "file is {} bytes, shorter than the {} byte header",
                storage.size(),
                HEADER_SIZE
            )));
        }

        let bytes = storage.read(0, HEADER_SIZE)?;
        if &bytes[0..4] != MAGIC {
            return Err(IndexError::Format(format!(
                "invalid index magic: expected BKIX, got {:?}",
                &bytes[0..4]
            )));
        }

        let mut cursor = &bytes[4..];
        let version = cursor.get_u32_le();
        if version != VERSION {
            return Err(IndexError::Format(format!("unsupported index version: {}", version)));
        }

        let mut cursor = &bytes[24..];
        let found = IndexHeader {
            capacity: cursor.get_u32_le(),
            entry_len: cursor.get_u32_le(),
        };
        if found != *self {
            return Err(IndexError::Format(format!(
                "index was created with capacity {} / entry length {}, opened with {} / {}",
                found.capacity, found.entry_len, self.capacity, self.entry_len
            )));
        }
        Ok(())
    }
}
