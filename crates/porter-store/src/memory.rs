//! In-memory store, for tests and one-shot imports.

use bytes::Bytes;
use dashmap::DashMap;
use porter_core::ObjectId;
use std::sync::Arc;

use crate::store::{Family, Put, Store, StoreError};

/// Concurrent in-memory object store. Cloning shares the underlying maps.
#[derive(Clone, Default)]
pub struct MemoryStore {
    families: Arc<[DashMap<ObjectId, Bytes>; 2]>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records in one family.
    pub fn count(&self, family: Family) -> usize {
        self.families[family.index()].len()
    }
}

impl Store for MemoryStore {
    fn get(&self, family: Family, id: &ObjectId) -> Result<Option<Bytes>, StoreError> {
        Ok(self.families[family.index()].get(id).map(|v| v.clone()))
    }

    fn write_many(&self, puts: Vec<Put>) -> Result<(), StoreError> {
        for put in puts {
            self.families[put.family.index()].insert(put.id, put.data);
        }
        Ok(())
    }
}
