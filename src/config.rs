//! Configuration for blockindex
//!
//! Centralized configuration with sensible defaults.
//!
//! The block capacity is not part of the runtime configuration: it is a
//! const generic on [`OrderedIndex`](crate::OrderedIndex) and is checked
//! against the on-disk header when an index is reopened.

use std::fs;
use std::path::PathBuf;

use crate::error::{IndexError, Result};
use crate::storage::{FileStorage, MemoryStorage, Storage};

/// Main configuration for a blockindex instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all data files
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── {name}.idx       (ordered index: header + block chains)
    ///     └── {name}.val       (append-only value log, maps only)
    pub data_dir: PathBuf,

    /// Which storage backend `open_storage` hands out
    pub backend: StorageBackend,

    /// Sync strategy: how often file-backed storage is fsynced
    pub sync_strategy: SyncStrategy,
}

/// Storage backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// One file per storage under `data_dir`
    File,

    /// Process-local byte vector, discarded on drop
    Memory,
}

/// Sync strategy for file-backed storage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// fsync after every write (safest, slowest)
    EveryWrite,

    /// fsync only on explicit `sync()` and when the storage is dropped
    OnClose,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./blockindex_data"),
            backend: StorageBackend::File,
            sync_strategy: SyncStrategy::OnClose,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Path of the file backing storage `name`
    pub fn storage_path(&self, name: &str) -> PathBuf {
        self.data_dir.join(name)
    }

    /// Open (or create) the storage called `name` on the configured backend
    pub fn open_storage(&self, name: &str) -> Result<Box<dyn Storage>> {
        if name.is_empty() {
            return Err(IndexError::Config("storage name must not be empty".to_string()));
        }

        match self.backend {
            StorageBackend::Memory => Ok(Box::new(MemoryStorage::new())),
            StorageBackend::File => {
                fs::create_dir_all(&self.data_dir)?;
                let storage = FileStorage::open(&self.storage_path(name), self.sync_strategy)?;
                Ok(Box::new(storage))
            }
        }
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all storage files)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the storage backend
    pub fn backend(mut self, backend: StorageBackend) -> Self {
        self.config.backend = backend;
        self
    }

    /// Shorthand for the in-memory backend
    pub fn in_memory(self) -> Self {
        self.backend(StorageBackend::Memory)
    }

    /// Set the sync strategy for file-backed storage
    pub fn sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.config.sync_strategy = strategy;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
