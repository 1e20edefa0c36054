//! Index levels
//!
//! A head chain stores one `(first key, block offset)` entry per block of
//! the level below and keeps itself in step by applying the
//! [`Propagation`]s that level hands up. Since a head chain is itself a
//! `Chain`, it hands up its own obligations in turn; stacking another
//! `Chain<HeadEntry<HeadEntry<E>>, C>` on top gives a third level.

use bytes::{Buf, BufMut};

use crate::error::{IndexError, Result};
use crate::record::Record;
use crate::storage::{Offset, Storage};

use super::level::Chain;
use super::Propagation;

/// Representative key of a child block plus the child's offset
///
/// Ordered by key, then by offset, so that children sharing a first key
/// still have distinct entries.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HeadEntry<E> {
    pub key: E,
    pub child: Offset,
}

impl<E> HeadEntry<E> {
    pub fn new(key: E, child: Offset) -> Self {
        Self { key, child }
    }

    /// Sorts after every real entry with the same key
    pub fn probe(key: E) -> Self {
        Self {
            key,
            child: Offset::MAX,
        }
    }
}

impl<E: Record> Record for HeadEntry<E> {
    const ENCODED_LEN: usize = E::ENCODED_LEN + 8;

    fn encode<B: BufMut>(&self, buf: &mut B) {
        self.key.encode(buf);
        buf.put_u64_le(self.child);
    }

    fn decode<B: Buf>(buf: &mut B) -> Self {
        let key = E::decode(buf);
        let child = buf.get_u64_le();
        Self { key, child }
    }
}

impl<E: Record, const C: usize> Chain<HeadEntry<E>, C> {
    /// The child block that owns `key`, if any block starts at or before it
    pub fn child_for<S: Storage>(&self, storage: &mut S, key: &E) -> Result<Option<Offset>> {
        let probe = HeadEntry::probe(key.clone());
        Ok(self.floor(storage, &probe)?.map(|head| head.child))
    }

    /// Mirror one change of the level below
    ///
    /// Returns this level's own obligations for the level above it.
    pub fn apply<S: Storage>(
        &self,
        storage: &mut S,
        instruction: Propagation<E>,
    ) -> Result<Vec<Propagation<HeadEntry<E>>>> {
        tracing::trace!(root = self.root_cell(), ?instruction, "applying propagation");

        match instruction {
            Propagation::Replace { offset, old, new } => {
                let mutation = self.replace(
                    storage,
                    &HeadEntry::new(old, offset),
                    HeadEntry::new(new, offset),
                )?;
                Ok(mutation.upward)
            }
            Propagation::InsertAt { key, offset } => {
                let entry = HeadEntry::new(key, offset);
                let mutation = self.insert(storage, entry.clone())?;
                if !mutation.applied {
                    return Err(IndexError::StructuralInconsistency(format!(
                        "head entry {:?} already registered",
                        entry
                    )));
                }
                Ok(mutation.upward)
            }
            Propagation::RemoveAt { key, offset } => {
                let entry = HeadEntry::new(key, offset);
                let mutation = self.erase(storage, &entry)?;
                if !mutation.applied {
                    return Err(IndexError::StructuralInconsistency(format!(
                        "no head entry {:?} to remove",
                        entry
                    )));
                }
                Ok(mutation.upward)
            }
        }
    }

    /// Apply a whole batch in order, collecting what goes further up
    pub fn apply_all<S: Storage>(
        &self,
        storage: &mut S,
        upward: Vec<Propagation<E>>,
    ) -> Result<Vec<Propagation<HeadEntry<E>>>> {
        let mut above = Vec::new();
        for instruction in upward {
            above.extend(self.apply(storage, instruction)?);
        }
        Ok(above)
    }
}
