//! The object store interface.
//!
//! Importers never write records one at a time. They accumulate puts in a
//! [`WriteBatch`] and commit once, so a crashed import leaves either all of
//! a directory's records or none of them. Records are keyed by
//! [`ObjectId`] within a [`Family`]; re-putting an existing key is always
//! legal and must leave the stored bytes unchanged in meaning, since keys
//! are content-derived.

use bytes::Bytes;
use porter_core::ObjectId;

/// Record families within the store.
///
/// Tree records and the proxy records that locate them share the same ID by
/// construction, so they live in separate key families rather than separate
/// key ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    /// Serialized directory trees.
    Tree,
    /// Proxy records mapping a local ID back to (repository path, node).
    Proxy,
}

impl Family {
    /// Stable storage tag. Never renumber.
    pub(crate) fn code(self) -> u8 {
        match self {
            Family::Tree => 0,
            Family::Proxy => 1,
        }
    }

    pub(crate) fn index(self) -> usize {
        self.code() as usize
    }
}

/// One pending write.
#[derive(Debug, Clone)]
pub struct Put {
    pub family: Family,
    pub id: ObjectId,
    pub data: Bytes,
}

/// Errors from store backends.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store lock poisoned")]
    Poisoned,

    #[error("corrupt record {id}: {detail}")]
    Corrupt { id: ObjectId, detail: String },
}

/// A local object store.
///
/// Implementations are shared across importer instances running on separate
/// threads, so every method takes `&self` and must be internally
/// synchronized. `write_many` is atomic: concurrent readers see either none
/// or all of the puts.
pub trait Store: Send + Sync {
    fn get(&self, family: Family, id: &ObjectId) -> Result<Option<Bytes>, StoreError>;

    fn contains(&self, family: Family, id: &ObjectId) -> Result<bool, StoreError> {
        Ok(self.get(family, id)?.is_some())
    }

    fn write_many(&self, puts: Vec<Put>) -> Result<(), StoreError>;
}

/// Accumulates puts and applies them in one atomic write.
///
/// Nothing reaches the store until [`commit`](WriteBatch::commit); dropping
/// an uncommitted batch discards it.
pub struct WriteBatch<'a> {
    store: &'a dyn Store,
    pending: Vec<Put>,
}

impl<'a> WriteBatch<'a> {
    pub fn new(store: &'a dyn Store) -> Self {
        Self { store, pending: Vec::new() }
    }

    pub fn put(&mut self, family: Family, id: ObjectId, data: Bytes) {
        self.pending.push(Put { family, id, data });
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn commit(self) -> Result<(), StoreError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        self.store.write_many(self.pending)
    }
}
