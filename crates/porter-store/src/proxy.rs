//! Proxy records.
//!
//! A local [`ObjectId`] is our hash, not the repository's. When an importer
//! later needs to go back to the helper for an object it has only a local ID
//! for, it must recover the repository-native coordinates: the 20-byte node
//! and the repository path. A proxy record stores exactly that pair, keyed
//! by `BLAKE3(node bytes ++ path bytes)`, which also serves as the local ID
//! handed out for not-yet-imported children.
//!
//! The record encoding is byte-identical to the request payload that
//! addresses the same object on the wire, so a loaded record can be sent
//! as-is.

use bytes::Bytes;
use porter_core::hash::NODE_LEN;
use porter_core::path::PathError;
use porter_core::{NodeId, ObjectId, RepoPathBuf};

use crate::store::{Family, Store, StoreError, WriteBatch};

/// Errors from decoding proxy records.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("proxy record too short: {0} bytes")]
    TooShort(usize),

    #[error(transparent)]
    Path(#[from] PathError),
}

/// Derive the local ID for a (path, node) pair.
pub fn proxy_object_id(path: &RepoPathBuf, node: NodeId) -> ObjectId {
    let mut buf = Vec::with_capacity(NODE_LEN + path.as_bytes().len());
    buf.extend_from_slice(node.as_bytes());
    buf.extend_from_slice(path.as_bytes());
    ObjectId::hash_of(&buf)
}

/// Repository-native coordinates for one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyRecord {
    pub path: RepoPathBuf,
    pub node: NodeId,
}

impl ProxyRecord {
    pub fn new(path: RepoPathBuf, node: NodeId) -> Self {
        Self { path, node }
    }

    /// The local ID this record is stored under.
    pub fn object_id(&self) -> ObjectId {
        proxy_object_id(&self.path, self.node)
    }

    /// Node bytes followed by path bytes. Doubles as the wire request
    /// payload for this object.
    pub fn encode(&self) -> Bytes {
        let mut buf = Vec::with_capacity(NODE_LEN + self.path.as_bytes().len());
        buf.extend_from_slice(self.node.as_bytes());
        buf.extend_from_slice(self.path.as_bytes());
        Bytes::from(buf)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProxyError> {
        if bytes.len() < NODE_LEN {
            return Err(ProxyError::TooShort(bytes.len()));
        }
        let node = NodeId::from_slice(&bytes[..NODE_LEN])
            .map_err(|_| ProxyError::TooShort(bytes.len()))?;
        let path = RepoPathBuf::from_wire_bytes(&bytes[NODE_LEN..])?;
        Ok(Self { path, node })
    }

    /// Queue this record into `batch`, returning its ID.
    pub fn store(&self, batch: &mut WriteBatch<'_>) -> ObjectId {
        let id = self.object_id();
        batch.put(Family::Proxy, id, self.encode());
        id
    }

    /// Fetch and decode a proxy record.
    pub fn load(store: &dyn Store, id: &ObjectId) -> Result<Option<ProxyRecord>, StoreError> {
        match store.get(Family::Proxy, id)? {
            None => Ok(None),
            Some(bytes) => ProxyRecord::decode(&bytes)
                .map(Some)
                .map_err(|e| StoreError::Corrupt { id: *id, detail: e.to_string() }),
        }
    }
}
