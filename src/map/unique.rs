//! Unique Map
//!
//! `key → value` on top of an ordered index of `(key, value offset)`.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::Config;
use crate::error::{IndexError, Result};
use crate::index::{IndexStats, OrderedIndex};
use crate::record::Record;
use crate::storage::{Offset, Storage};

use super::ValueLog;

/// Block capacity of the map's index
pub const MAP_BLOCK_CAPACITY: usize = 128;

/// Map with at most one value per key
///
/// The index and the value log live on two separate storages.
pub struct UniqueMap<K: Record, V, S: Storage> {
    index: OrderedIndex<(K, Offset), S, MAP_BLOCK_CAPACITY>,
    values: ValueLog<V, S>,
}

impl<K, V> UniqueMap<K, V, Box<dyn Storage>>
where
    K: Record,
    V: Serialize + DeserializeOwned,
{
    /// Open `{name}.idx` and `{name}.val` on the configured backend
    pub fn open(config: &Config, name: &str) -> Result<Self> {
        let index = config.open_storage(&format!("{}.idx", name))?;
        let values = config.open_storage(&format!("{}.val", name))?;
        Self::with_storage(index, values)
    }
}

impl<K, V, S> UniqueMap<K, V, S>
where
    K: Record,
    V: Serialize + DeserializeOwned,
    S: Storage,
{
    /// Build a map from an index storage and a value storage
    pub fn with_storage(index_storage: S, value_storage: S) -> Result<Self> {
        Ok(Self {
            index: OrderedIndex::open(index_storage)?,
            values: ValueLog::open(value_storage)?,
        })
    }

    /// Insert `key → value` unless the key is already present
    ///
    /// Returns false (and writes nothing) for an existing key.
    pub fn insert(&mut self, key: &K, value: &V) -> Result<bool> {
        if self.slot(key)?.is_some() {
            return Ok(false);
        }
        let offset = self.values.append(value)?;
        self.index.insert((key.clone(), offset))?;
        Ok(true)
    }

    /// Insert or overwrite. Returns true if an older value was replaced.
    pub fn put(&mut self, key: &K, value: &V) -> Result<bool> {
        let previous = self.slot(key)?;
        let offset = self.values.append(value)?;
        if let Some(old) = previous {
            self.index.erase(&(key.clone(), old))?;
        }
        self.index.insert((key.clone(), offset))?;
        Ok(previous.is_some())
    }

    pub fn get(&mut self, key: &K) -> Result<Option<V>> {
        match self.slot(key)? {
            Some(offset) => Ok(Some(self.values.read(offset)?)),
            None => Ok(None),
        }
    }

    pub fn contains_key(&mut self, key: &K) -> Result<bool> {
        Ok(self.slot(key)?.is_some())
    }

    /// Remove `key`. Its value stays in the log.
    pub fn remove(&mut self, key: &K) -> Result<bool> {
        match self.slot(key)? {
            Some(offset) => self.index.erase(&(key.clone(), offset)),
            None => Ok(false),
        }
    }

    /// All `(key, value)` pairs with `begin <= key <= end`, ascending
    pub fn range(&mut self, begin: &K, end: &K) -> Result<Vec<(K, V)>> {
        let slots = self
            .index
            .find(&(begin.clone(), Offset::MIN), &(end.clone(), Offset::MAX))?;

        let mut pairs = Vec::with_capacity(slots.len());
        for (key, offset) in slots {
            let value = self.values.read(offset)?;
            pairs.push((key, value));
        }
        Ok(pairs)
    }

    /// Number of values ever written (including superseded ones)
    pub fn value_count(&self) -> u64 {
        self.values.len()
    }

    /// Integrity check of the underlying index
    pub fn verify(&mut self) -> Result<IndexStats> {
        self.index.verify()
    }

    pub fn sync(&mut self) -> Result<()> {
        self.index.sync()?;
        self.values.sync()
    }

    /// The value offset stored for `key`, if any
    fn slot(&mut self, key: &K) -> Result<Option<Offset>> {
        let hits = self
            .index
            .find(&(key.clone(), Offset::MIN), &(key.clone(), Offset::MAX))?;

        match hits.as_slice() {
            [] => Ok(None),
            [(_, offset)] => Ok(Some(*offset)),
            _ => Err(IndexError::StructuralInconsistency(format!(
                "{} index entries for key {:?}",
                hits.len(),
                key
            ))),
        }
    }
}
