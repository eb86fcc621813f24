//! Local pack files.
//!
//! Helpers that support tree-granular import announce directories of pack
//! files at startup. A pack is an append-only bundle of tree payloads keyed
//! by (node, path); the importer memory-maps each file once, builds an
//! in-memory index, and serves lookups from the union of all open packs.
//! Packs are read-only here: the importer consumes them, it never writes
//! them during an import.
//!
//! File layout:
//!
//! ```text
//! magic  b"PORTERPK"
//! version u8 (currently 1)
//! record* :=
//!     node      [u8; 20]
//!     path_len  u16 big-endian
//!     path      [u8; path_len]
//!     data_len  u32 big-endian
//!     data      [u8; data_len]
//! ```

use bytes::Bytes;
use memmap2::Mmap;
use porter_core::hash::NODE_LEN;
use porter_core::{NodeId, RepoPathBuf};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const PACK_MAGIC: [u8; 8] = *b"PORTERPK";
pub const PACK_VERSION: u8 = 1;
pub const PACK_EXTENSION: &str = "pack";

const PACK_HEADER_LEN: usize = PACK_MAGIC.len() + 1;

/// Errors from opening a single pack file.
#[derive(Debug, thiserror::Error)]
pub enum PackError {
    #[error("pack io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("bad pack magic")]
    BadMagic,

    #[error("unsupported pack version {0}")]
    BadVersion(u8),

    #[error("truncated pack record at offset {0}")]
    Truncated(usize),
}

fn lookup_key(node: &NodeId, path: &RepoPathBuf) -> Vec<u8> {
    let mut key = Vec::with_capacity(NODE_LEN + path.as_bytes().len());
    key.extend_from_slice(node.as_bytes());
    key.extend_from_slice(path.as_bytes());
    key
}

// ── Single pack ──────────────────────────────────────────────────────────────

/// One memory-mapped pack file with its record index.
pub struct PackFile {
    path: PathBuf,
    map: Mmap,
    /// node bytes ++ path bytes → (offset, length) of the record data.
    index: HashMap<Vec<u8>, (usize, usize)>,
}

impl PackFile {
    /// Open and index a pack file. Any structural problem rejects the whole
    /// file; a pack is either fully usable or not used at all.
    pub fn open(path: &Path) -> Result<Self, PackError> {
        let file = fs::File::open(path)?;
        // Safety: the file is opened read-only and the map is never mutated.
        let map = unsafe { Mmap::map(&file)? };

        if map.len() < PACK_HEADER_LEN || map[..PACK_MAGIC.len()] != PACK_MAGIC {
            return Err(PackError::BadMagic);
        }
        let version = map[PACK_MAGIC.len()];
        if version != PACK_VERSION {
            return Err(PackError::BadVersion(version));
        }

        let mut index = HashMap::new();
        let mut offset = PACK_HEADER_LEN;
        while offset < map.len() {
            let record_start = offset;
            if map.len() - offset < NODE_LEN + 2 {
                return Err(PackError::Truncated(record_start));
            }
            let path_len =
                u16::from_be_bytes([map[offset + NODE_LEN], map[offset + NODE_LEN + 1]]) as usize;
            let key_end = offset + NODE_LEN + 2 + path_len;
            if map.len() < key_end + 4 {
                return Err(PackError::Truncated(record_start));
            }
            let mut key = Vec::with_capacity(NODE_LEN + path_len);
            key.extend_from_slice(&map[offset..offset + NODE_LEN]);
            key.extend_from_slice(&map[offset + NODE_LEN + 2..key_end]);

            let data_len = u32::from_be_bytes([
                map[key_end],
                map[key_end + 1],
                map[key_end + 2],
                map[key_end + 3],
            ]) as usize;
            let data_start = key_end + 4;
            if map.len() < data_start + data_len {
                return Err(PackError::Truncated(record_start));
            }
            index.insert(key, (data_start, data_len));
            offset = data_start + data_len;
        }

        Ok(Self { path: path.to_path_buf(), map, index })
    }

    pub fn file_path(&self) -> &Path {
        &self.path
    }

    pub fn record_count(&self) -> usize {
        self.index.len()
    }

    pub fn get(&self, node: &NodeId, path: &RepoPathBuf) -> Option<Bytes> {
        let (start, len) = *self.index.get(&lookup_key(node, path))?;
        Some(Bytes::copy_from_slice(&self.map[start..start + len]))
    }
}

// ── Pack set ─────────────────────────────────────────────────────────────────

/// The union of every pack file found under the announced directories.
///
/// Lookups try packs in enrollment order and return the first hit. Opening
/// is fail-soft: a missing directory or an unreadable file is logged and
/// skipped, never fatal, because packs are an optimization the fetch-tree
/// fallback can always cover for.
pub struct PackSet {
    packs: Vec<PackFile>,
}

impl PackSet {
    pub fn open(dirs: &[PathBuf]) -> PackSet {
        let mut packs = Vec::new();
        for dir in dirs {
            let entries = match fs::read_dir(dir) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!(dir = %dir.display(), error = %e, "skipping pack directory");
                    continue;
                }
            };
            let mut files: Vec<PathBuf> = entries
                .flatten()
                .map(|entry| entry.path())
                .filter(|p| p.extension().and_then(|e| e.to_str()) == Some(PACK_EXTENSION))
                .collect();
            // Deterministic enrollment order regardless of readdir order.
            files.sort();

            for file in files {
                match PackFile::open(&file) {
                    Ok(pack) => {
                        tracing::debug!(
                            pack = %file.display(),
                            records = pack.record_count(),
                            "pack enrolled"
                        );
                        packs.push(pack);
                    }
                    Err(e) => {
                        tracing::warn!(pack = %file.display(), error = %e, "skipping pack file");
                    }
                }
            }
        }
        PackSet { packs }
    }

    pub fn empty() -> PackSet {
        PackSet { packs: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.packs.is_empty()
    }

    pub fn file_count(&self) -> usize {
        self.packs.len()
    }

    /// First hit across all packs, or None.
    pub fn try_get(&self, node: &NodeId, path: &RepoPathBuf) -> Option<Bytes> {
        self.packs.iter().find_map(|pack| pack.get(node, path))
    }
}

// ── Fixture writer ───────────────────────────────────────────────────────────

/// Write a pack file. The importer never calls this; it exists for fixtures
/// and for tooling that prepares pack directories.
pub fn write_pack_file(
    path: &Path,
    entries: &[(RepoPathBuf, NodeId, Vec<u8>)],
) -> std::io::Result<()> {
    let mut out = Vec::new();
    out.extend_from_slice(&PACK_MAGIC);
    out.push(PACK_VERSION);
    for (entry_path, node, data) in entries {
        let path_bytes = entry_path.as_bytes();
        let path_len = u16::try_from(path_bytes.len()).map_err(|_| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "pack path too long")
        })?;
        let data_len = u32::try_from(data.len()).map_err(|_| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "pack record too large")
        })?;
        out.extend_from_slice(node.as_bytes());
        out.extend_from_slice(&path_len.to_be_bytes());
        out.extend_from_slice(path_bytes);
        out.extend_from_slice(&data_len.to_be_bytes());
        out.extend_from_slice(data);
    }

    let mut file = fs::File::create(path)?;
    file.write_all(&out)?;
    file.sync_all()
}
