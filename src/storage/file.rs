//! File-backed storage
//!
//! One regular file, addressed with positioned reads and writes.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::config::SyncStrategy;
use crate::error::Result;

use super::{check_range, Offset, Storage};

/// Storage backed by a single file
///
/// The file only ever grows. Its length is cached so `size()` does not
/// need a metadata call.
pub struct FileStorage {
    /// Path of the backing file
    path: PathBuf,
    /// Open handle (read + write)
    file: File,
    /// Cached file length
    len: u64,
    /// When to fsync
    sync_strategy: SyncStrategy,
}

impl FileStorage {
    /// Open or create the file at `path`
    pub fn open(path: &Path, sync_strategy: SyncStrategy) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)?;

        let len = file.metadata()?.len();
        tracing::debug!(path = %path.display(), len, "opened file storage");

        Ok(Self {
            path: path.to_path_buf(),
            file,
            len,
            sync_strategy,
        })
    }

    /// Get the backing file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Storage for FileStorage {
    fn read_at(&mut self, offset: Offset, buf: &mut [u8]) -> Result<()> {
        check_range(offset, buf.len(), self.len)?;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(buf)?;
        Ok(())
    }

    fn write_at(&mut self, offset: Offset, bytes: &[u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(bytes)?;
        self.len = self.len.max(offset + bytes.len() as u64);

        if self.sync_strategy == SyncStrategy::EveryWrite {
            self.file.sync_data()?;
        }
        Ok(())
    }

    fn size(&self) -> Offset {
        self.len
    }

    fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }
}

impl Drop for FileStorage {
    fn drop(&mut self) {
        if self.sync_strategy == SyncStrategy::OnClose {
            if let Err(e) = self.file.sync_all() {
                tracing::warn!(path = %self.path.display(), error = %e, "sync on close failed");
            }
        }
    }
}
