//! Append-only value log
//!
//! Values are bincode-encoded and checksummed; records are never
//! rewritten, so an offset stays valid for the life of the log.

use std::marker::PhantomData;

use bytes::{Buf, BufMut, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{IndexError, Result};
use crate::storage::{Offset, Storage};

/// Magic bytes identifying a value log
const MAGIC: &[u8; 4] = b"BKVL";

/// Current value log format version
const VERSION: u32 = 1;

/// Header size: Magic (4) + Version (4)
const HEADER_SIZE: u64 = 8;

/// Record header size: Len (4) + CRC (4)
const RECORD_HEADER_SIZE: usize = 8;

/// Append-only log of `V` values over a [`Storage`]
pub struct ValueLog<V, S: Storage> {
    storage: S,
    /// Number of records in the log
    records: u64,
    _marker: PhantomData<fn() -> V>,
}

impl<V: Serialize + DeserializeOwned, S: Storage> ValueLog<V, S> {
    /// Open a value log, writing the header on a blank storage
    ///
    /// An existing log is scanned once to count its records; a record that
    /// runs past the end of storage is reported as corruption.
    pub fn open(mut storage: S) -> Result<Self> {
        if storage.size() == 0 {
            let mut header = BytesMut::with_capacity(HEADER_SIZE as usize);
            header.put_slice(MAGIC);
            header.put_u32_le(VERSION);
            storage.write_at(0, &header)?;
            return Ok(Self {
                storage,
                records: 0,
                _marker: PhantomData,
            });
        }

        let header = storage.read(0, HEADER_SIZE as usize).map_err(|_| {
            IndexError::ValueLogCorruption("value log shorter than its header".to_string())
        })?;
        if &header[0..4] != MAGIC {
            return Err(IndexError::Format(format!(
                "invalid value log magic: expected BKVL, got {:?}",
                &header[0..4]
            )));
        }
        let version = (&header[4..]).get_u32_le();
        if version != VERSION {
            return Err(IndexError::Format(format!("unsupported value log version: {}", version)));
        }

        let records = Self::count_records(&mut storage)?;
        tracing::debug!(records, size = storage.size(), "opened value log");

        Ok(Self {
            storage,
            records,
            _marker: PhantomData,
        })
    }

    /// Append `value` and return the offset of its record
    pub fn append(&mut self, value: &V) -> Result<Offset> {
        let payload = bincode::serialize(value)?;
        let crc = crc32fast::hash(&payload);

        let mut record = BytesMut::with_capacity(RECORD_HEADER_SIZE + payload.len());
        record.put_u32_le(payload.len() as u32);
        record.put_u32_le(crc);
        record.put_slice(&payload);

        let offset = self.storage.size();
        self.storage.write_at(offset, &record)?;
        self.records += 1;

        tracing::trace!(offset, len = payload.len(), "appended value");
        Ok(offset)
    }

    /// Read back the value whose record starts at `offset`
    pub fn read(&mut self, offset: Offset) -> Result<V> {
        if offset < HEADER_SIZE {
            return Err(IndexError::InvalidOffset {
                offset,
                size: self.storage.size(),
            });
        }

        let mut header = [0u8; RECORD_HEADER_SIZE];
        self.storage.read_at(offset, &mut header)?;
        let mut cursor = &header[..];
        let len = cursor.get_u32_le() as usize;
        let expected_crc = cursor.get_u32_le();

        let payload = self
            .storage
            .read(offset + RECORD_HEADER_SIZE as u64, len)
            .map_err(|_| IndexError::ValueLogCorruption(format!("record at {} is truncated", offset)))?;

        let actual_crc = crc32fast::hash(&payload);
        if actual_crc != expected_crc {
            return Err(IndexError::ValueLogCorruption(format!(
                "CRC mismatch at {}: expected {:08x}, got {:08x}",
                offset, expected_crc, actual_crc
            )));
        }

        Ok(bincode::deserialize(&payload)?)
    }

    /// Number of records ever appended
    pub fn len(&self) -> u64 {
        self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records == 0
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn sync(&mut self) -> Result<()> {
        self.storage.sync()
    }

    fn count_records(storage: &mut S) -> Result<u64> {
        let size = storage.size();
        let mut pos = HEADER_SIZE;
        let mut records = 0;

        while pos < size {
            if pos + RECORD_HEADER_SIZE as u64 > size {
                return Err(IndexError::ValueLogCorruption(format!(
                    "partial record header at {}",
                    pos
                )));
            }
            let len = storage.read_u32(pos)? as u64;
            let end = pos + RECORD_HEADER_SIZE as u64 + len;
            if end > size {
                return Err(IndexError::ValueLogCorruption(format!(
                    "record at {} runs past end of log ({} > {})",
                    pos, end, size
                )));
            }
            pos = end;
            records += 1;
        }
        Ok(records)
    }
}
