//! Manifest entry lines.
//!
//! Flat manifest payloads and fetch-tree responses share one line format:
//!
//! ```text
//! <path bytes> NUL <40 hex node chars> [flag] LF
//! ```
//!
//! The flag byte is absent for regular files, `x` for executables, `l` for
//! symlinks, and `t` for tree entries (fetch-tree responses only). Flat
//! manifests list full repository paths; fetch-tree responses list bare
//! entry names. The parser does not distinguish the two, callers do.

use crate::hash::NodeId;
use crate::path::{PathError, RepoPathBuf};

/// Errors from parsing manifest lines.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("manifest line missing NUL separator")]
    MissingSeparator,

    #[error("manifest line has an empty path")]
    EmptyPath,

    #[error("malformed manifest line for {path:?}")]
    BadLine { path: String },

    #[error("bad node hex in manifest line for {path:?}")]
    BadNode { path: String },

    #[error("unknown manifest flag 0x{flag:02x} for {path:?}")]
    BadFlag { flag: u8, path: String },

    #[error(transparent)]
    Path(#[from] PathError),
}

// ── Entry kinds ──────────────────────────────────────────────────────────────

/// What a manifest entry points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    Regular,
    Executable,
    Symlink,
    /// A subdirectory. Only valid in fetch-tree responses and tree records.
    Tree,
}

impl FileKind {
    pub fn from_flag(flag: Option<u8>) -> Result<Self, ManifestError> {
        match flag {
            None => Ok(FileKind::Regular),
            Some(b'x') => Ok(FileKind::Executable),
            Some(b'l') => Ok(FileKind::Symlink),
            Some(b't') => Ok(FileKind::Tree),
            Some(flag) => Err(ManifestError::BadFlag { flag, path: String::new() }),
        }
    }

    pub fn flag_byte(&self) -> Option<u8> {
        match self {
            FileKind::Regular => None,
            FileKind::Executable => Some(b'x'),
            FileKind::Symlink => Some(b'l'),
            FileKind::Tree => Some(b't'),
        }
    }

    pub fn is_tree(&self) -> bool {
        matches!(self, FileKind::Tree)
    }
}

// ── Entries ──────────────────────────────────────────────────────────────────

/// One parsed manifest line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Full repository path in flat manifests, bare entry name in
    /// fetch-tree responses.
    pub path: RepoPathBuf,
    pub node: NodeId,
    pub kind: FileKind,
}

impl ManifestEntry {
    /// Serialize this entry in line format, with trailing newline.
    pub fn write_line(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.path.as_bytes());
        out.push(0);
        out.extend_from_slice(self.node.to_hex().as_bytes());
        if let Some(flag) = self.kind.flag_byte() {
            out.push(flag);
        }
        out.push(b'\n');
    }
}

/// Iterate the entries of a manifest payload.
///
/// The final line may omit its newline; everything else about the format is
/// strict and surfaces as a [`ManifestError`].
pub fn parse_manifest(payload: &[u8]) -> ManifestParser<'_> {
    ManifestParser { rest: payload }
}

pub struct ManifestParser<'a> {
    rest: &'a [u8],
}

impl<'a> Iterator for ManifestParser<'a> {
    type Item = Result<ManifestEntry, ManifestError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.is_empty() {
            return None;
        }
        let line = match self.rest.iter().position(|&b| b == b'\n') {
            Some(idx) => {
                let line = &self.rest[..idx];
                self.rest = &self.rest[idx + 1..];
                line
            }
            None => {
                let line = self.rest;
                self.rest = &[];
                line
            }
        };
        Some(parse_line(line))
    }
}

fn parse_line(line: &[u8]) -> Result<ManifestEntry, ManifestError> {
    let nul = line
        .iter()
        .position(|&b| b == 0)
        .ok_or(ManifestError::MissingSeparator)?;
    let path_bytes = &line[..nul];
    let rest = &line[nul + 1..];

    let path = RepoPathBuf::from_wire_bytes(path_bytes)?;
    if path.is_root() {
        return Err(ManifestError::EmptyPath);
    }

    let flag = match rest.len() {
        40 => None,
        41 => Some(rest[40]),
        _ => {
            return Err(ManifestError::BadLine { path: path.as_str().to_string() });
        }
    };

    let node = std::str::from_utf8(&rest[..40])
        .ok()
        .and_then(|hex| NodeId::from_hex(hex).ok())
        .ok_or_else(|| ManifestError::BadNode { path: path.as_str().to_string() })?;

    let kind = FileKind::from_flag(flag).map_err(|err| match err {
        ManifestError::BadFlag { flag, .. } => ManifestError::BadFlag {
            flag,
            path: path.as_str().to_string(),
        },
        other => other,
    })?;

    Ok(ManifestEntry { path, node, kind })
}
