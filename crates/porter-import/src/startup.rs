//! Startup negotiation.
//!
//! Before anything else, the helper sends one unsolicited STARTED chunk:
//!
//! ```text
//! version    u32 big-endian       must equal PROTOCOL_VERSION exactly
//! flags      u32 big-endian       capability bits
//! if flags & START_FLAG_TREE_PACKS:
//!     count  u32 big-endian
//!     count * (len u32 big-endian, path bytes)    pack directories
//! ```
//!
//! No request may be sent until this chunk has been read and accepted.
//! Trailing bytes after the parsed payload are corruption, not forward
//! compatibility; the exact version gate already rules out honest skew.

use std::path::PathBuf;

use porter_core::wire::{PROTOCOL_VERSION, START_FLAG_TREE_PACKS};

use crate::channel::HelperChannel;
use crate::error::ImportError;

/// What the helper declared at startup.
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Directories holding local pack files. Empty when the helper did not
    /// announce tree support.
    pub pack_dirs: Vec<PathBuf>,
}

impl Options {
    /// Tree-granular import requires announced pack directories; with none,
    /// only flat manifest import is available.
    pub fn tree_import_supported(&self) -> bool {
        !self.pack_dirs.is_empty()
    }
}

/// Read and validate the STARTED chunk.
pub fn negotiate(channel: &mut HelperChannel) -> Result<Options, ImportError> {
    let payload = channel.read_startup_chunk()?;
    match parse_started(&payload) {
        Ok(options) => {
            tracing::info!(
                pack_dirs = options.pack_dirs.len(),
                tree_import = options.tree_import_supported(),
                "helper ready"
            );
            Ok(options)
        }
        Err(e) => {
            channel.poison();
            Err(e)
        }
    }
}

fn parse_started(payload: &[u8]) -> Result<Options, ImportError> {
    let mut cur = payload;

    let version = read_u32(&mut cur)?;
    if version != PROTOCOL_VERSION {
        return Err(ImportError::VersionMismatch { ours: PROTOCOL_VERSION, theirs: version });
    }

    let flags = read_u32(&mut cur)?;
    let mut pack_dirs = Vec::new();
    if flags & START_FLAG_TREE_PACKS != 0 {
        let count = read_u32(&mut cur)?;
        for _ in 0..count {
            let len = read_u32(&mut cur)? as usize;
            if cur.len() < len {
                return Err(ImportError::framing("truncated pack directory list"));
            }
            let (head, tail) = cur.split_at(len);
            let dir = std::str::from_utf8(head)
                .map_err(|_| ImportError::framing("pack directory path is not valid UTF-8"))?;
            pack_dirs.push(PathBuf::from(dir));
            cur = tail;
        }
    }

    if !cur.is_empty() {
        return Err(ImportError::framing(format!(
            "{} trailing bytes after startup payload",
            cur.len()
        )));
    }

    Ok(Options { pack_dirs })
}

fn read_u32(cur: &mut &[u8]) -> Result<u32, ImportError> {
    if cur.len() < 4 {
        return Err(ImportError::framing("truncated startup payload"));
    }
    let (head, tail) = cur.split_at(4);
    *cur = tail;
    Ok(u32::from_be_bytes([head[0], head[1], head[2], head[3]]))
}

/// Encode a STARTED payload. This is the helper's side of the exchange; it
/// exists for fixtures and fake helpers in tests.
pub fn encode_started(version: u32, pack_dirs: &[&str]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&version.to_be_bytes());
    if pack_dirs.is_empty() {
        out.extend_from_slice(&0u32.to_be_bytes());
    } else {
        out.extend_from_slice(&START_FLAG_TREE_PACKS.to_be_bytes());
        out.extend_from_slice(&(pack_dirs.len() as u32).to_be_bytes());
        for dir in pack_dirs {
            out.extend_from_slice(&(dir.len() as u32).to_be_bytes());
            out.extend_from_slice(dir.as_bytes());
        }
    }
    out
}
