//! Directory tree records.
//!
//! A tree is the stored form of one imported directory. Its record is a line
//! per entry:
//!
//! ```text
//! <entry name> NUL <64 hex object id chars> [flag] LF
//! ```
//!
//! with the same flag letters as manifest lines and no flag for regular
//! files. Entries are kept in ascending raw-byte order of their names; the
//! tree's identity is the BLAKE3 hash of exactly these record bytes, so two
//! directories with equal entries always serialize and hash identically, no
//! matter what order the entries arrived in.

use bytes::Bytes;
use porter_core::{FileKind, ObjectId};

use crate::store::{Family, Store, StoreError};

/// Errors from building or parsing tree records.
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    #[error("invalid entry name {0:?}")]
    BadName(String),

    #[error("duplicate entry name {0:?}")]
    DuplicateName(String),

    #[error("tree record line missing NUL separator")]
    MissingSeparator,

    #[error("bad object id in tree record for {name:?}")]
    BadId { name: String },

    #[error("malformed tree record line for {name:?}")]
    BadLine { name: String },

    #[error("unknown tree record flag 0x{flag:02x} for {name:?}")]
    BadFlag { flag: u8, name: String },

    #[error("tree record entry name is not valid UTF-8")]
    NotUtf8,
}

/// One directory entry. `id` keys the child's record (a tree for
/// subdirectories, a proxy record for files).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub name: String,
    pub id: ObjectId,
    pub kind: FileKind,
}

/// An imported directory with entries in canonical order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tree {
    entries: Vec<TreeEntry>,
}

fn valid_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains('/') && !name.contains('\0')
}

impl Tree {
    /// Build a tree from entries in any order. Sorts into canonical order
    /// and rejects invalid or duplicate names.
    pub fn from_entries(mut entries: Vec<TreeEntry>) -> Result<Self, TreeError> {
        for entry in &entries {
            if !valid_name(&entry.name) {
                return Err(TreeError::BadName(entry.name.clone()));
            }
        }
        entries.sort_by(|a, b| a.name.as_bytes().cmp(b.name.as_bytes()));
        for pair in entries.windows(2) {
            if pair[0].name == pair[1].name {
                return Err(TreeError::DuplicateName(pair[0].name.clone()));
            }
        }
        Ok(Self { entries })
    }

    pub fn empty() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn entries(&self) -> &[TreeEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up one entry by name.
    pub fn find(&self, name: &str) -> Option<&TreeEntry> {
        self.entries
            .binary_search_by(|e| e.name.as_bytes().cmp(name.as_bytes()))
            .ok()
            .map(|idx| &self.entries[idx])
    }

    /// The canonical record bytes.
    pub fn serialize(&self) -> Bytes {
        let mut out = Vec::new();
        for entry in &self.entries {
            out.extend_from_slice(entry.name.as_bytes());
            out.push(0);
            out.extend_from_slice(entry.id.to_hex().as_bytes());
            if let Some(flag) = entry.kind.flag_byte() {
                out.push(flag);
            }
            out.push(b'\n');
        }
        Bytes::from(out)
    }

    /// The tree's identity: BLAKE3 of its record bytes.
    pub fn compute_id(&self) -> ObjectId {
        ObjectId::hash_of(&self.serialize())
    }

    /// Parse a stored record. Order and name rules are re-checked, so a
    /// tampered record cannot smuggle in what `from_entries` rejects.
    pub fn parse(bytes: &[u8]) -> Result<Self, TreeError> {
        let mut entries = Vec::new();
        let mut rest = bytes;
        while !rest.is_empty() {
            let line = match rest.iter().position(|&b| b == b'\n') {
                Some(idx) => {
                    let line = &rest[..idx];
                    rest = &rest[idx + 1..];
                    line
                }
                None => {
                    let line = rest;
                    rest = &[];
                    line
                }
            };
            entries.push(parse_line(line)?);
        }
        Self::from_entries(entries)
    }

    /// Fetch and parse a tree record from the store.
    pub fn load(store: &dyn Store, id: &ObjectId) -> Result<Option<Tree>, StoreError> {
        match store.get(Family::Tree, id)? {
            None => Ok(None),
            Some(bytes) => Tree::parse(&bytes)
                .map(Some)
                .map_err(|e| StoreError::Corrupt { id: *id, detail: e.to_string() }),
        }
    }
}

fn parse_line(line: &[u8]) -> Result<TreeEntry, TreeError> {
    let nul = line
        .iter()
        .position(|&b| b == 0)
        .ok_or(TreeError::MissingSeparator)?;
    let name = std::str::from_utf8(&line[..nul])
        .map_err(|_| TreeError::NotUtf8)?
        .to_string();
    let rest = &line[nul + 1..];

    let flag = match rest.len() {
        64 => None,
        65 => Some(rest[64]),
        _ => return Err(TreeError::BadLine { name }),
    };

    let id = std::str::from_utf8(&rest[..64])
        .ok()
        .and_then(|hex| ObjectId::from_hex(hex).ok())
        .ok_or_else(|| TreeError::BadId { name: name.clone() })?;

    let kind = match flag {
        None => FileKind::Regular,
        Some(b'x') => FileKind::Executable,
        Some(b'l') => FileKind::Symlink,
        Some(b't') => FileKind::Tree,
        Some(flag) => return Err(TreeError::BadFlag { flag, name }),
    };

    Ok(TreeEntry { name, id, kind })
}
