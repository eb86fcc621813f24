//! Hash identifier types.
//!
//! Two widths, two worlds. [`NodeId`] is the 20-byte hash native to the
//! legacy repository; it is what travels in request and response payloads.
//! [`ObjectId`] is the 32-byte BLAKE3 hash that keys the local object store.
//! Keeping them as distinct types means a store key can never be sent where
//! the helper expects a repository node, or vice versa.

use std::fmt;

/// Byte length of a repository node hash.
pub const NODE_LEN: usize = 20;

/// Byte length of a local object ID.
pub const OBJECT_ID_LEN: usize = 32;

/// Errors from parsing hash identifiers.
#[derive(Debug, thiserror::Error)]
pub enum HashError {
    #[error("expected {expected} bytes, got {got}")]
    WrongLength { expected: usize, got: usize },

    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
}

// ── NodeId ───────────────────────────────────────────────────────────────────

/// A 20-byte node hash as the legacy repository computes it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId([u8; NODE_LEN]);

impl NodeId {
    pub fn from_bytes(bytes: [u8; NODE_LEN]) -> Self {
        Self(bytes)
    }

    /// Parse from a raw byte slice, as found in wire payloads.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, HashError> {
        let arr: [u8; NODE_LEN] = bytes.try_into().map_err(|_| HashError::WrongLength {
            expected: NODE_LEN,
            got: bytes.len(),
        })?;
        Ok(Self(arr))
    }

    /// Parse from a 40-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, HashError> {
        let mut bytes = [0u8; NODE_LEN];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Self(bytes))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; NODE_LEN] {
        &self.0
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

// ── ObjectId ─────────────────────────────────────────────────────────────────

/// A 32-byte BLAKE3 hash keying the local object store.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; OBJECT_ID_LEN]);

impl ObjectId {
    pub fn from_bytes(bytes: [u8; OBJECT_ID_LEN]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, HashError> {
        let arr: [u8; OBJECT_ID_LEN] = bytes.try_into().map_err(|_| HashError::WrongLength {
            expected: OBJECT_ID_LEN,
            got: bytes.len(),
        })?;
        Ok(Self(arr))
    }

    /// Hash arbitrary bytes into an object ID.
    pub fn hash_of(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Parse from a 64-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, HashError> {
        let mut bytes = [0u8; OBJECT_ID_LEN];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Self(bytes))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; OBJECT_ID_LEN] {
        &self.0
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}
