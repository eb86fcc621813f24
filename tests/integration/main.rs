//! Porter integration test harness.
//!
//! Most tests drive a [`RepoImporter`] against a scripted helper: the
//! helper's output stream is a pre-baked byte script and everything the
//! importer writes is captured for inspection, so tests can assert both on
//! the imported store contents and on the exact requests that went over the
//! wire. `spawn.rs` additionally exercises real subprocess helpers built
//! from /bin/sh, skipping when the environment lacks them.

use std::io::{Cursor, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use porter_core::manifest::ManifestEntry;
use porter_import::startup::encode_started;

pub use porter_core::wire::{ChunkHeader, HelperCommand, HEADER_LEN, PROTOCOL_VERSION};
pub use porter_core::{FileKind, NodeId, RepoPathBuf};
pub use porter_import::{HelperChannel, ImportError, RepoImporter};
pub use porter_store::MemoryStore;

mod flat;
#[cfg(unix)]
mod spawn;
mod tree;

// ── Wire builders ─────────────────────────────────────────────────────────────

/// One header+payload chunk, as the helper would emit it.
pub fn chunk(request_id: u32, command: HelperCommand, flags: u32, data: &[u8]) -> Vec<u8> {
    let mut out = ChunkHeader::new(request_id, command, flags, data.len() as u32).encode().to_vec();
    out.extend_from_slice(data);
    out
}

/// The STARTED chunk for the current protocol version.
pub fn started(pack_dirs: &[&str]) -> Vec<u8> {
    chunk(0, HelperCommand::Started, 0, &encode_started(PROTOCOL_VERSION, pack_dirs))
}

pub fn node(byte: u8) -> NodeId {
    NodeId::from_bytes([byte; 20])
}

pub fn repo_path(s: &str) -> RepoPathBuf {
    RepoPathBuf::new(s).unwrap()
}

/// Serialize manifest lines, usable both for flat manifest payloads (full
/// paths) and fetch-tree responses (bare entry names).
pub fn manifest_lines(entries: &[(&str, u8, FileKind)]) -> Vec<u8> {
    let mut out = Vec::new();
    for (path, byte, kind) in entries {
        ManifestEntry { path: repo_path(path), node: node(*byte), kind: *kind }
            .write_line(&mut out);
    }
    out
}

// ── Captured request stream ───────────────────────────────────────────────────

/// Write half handed to the channel; records every byte the importer sends.
#[derive(Clone, Default)]
pub struct CapturedWrites(Arc<Mutex<Vec<u8>>>);

impl Write for CapturedWrites {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[derive(Debug)]
pub struct SentRequest {
    pub id: u32,
    pub command: HelperCommand,
    pub payload: Vec<u8>,
}

impl CapturedWrites {
    /// Parse everything written so far back into requests.
    pub fn requests(&self) -> Vec<SentRequest> {
        let bytes = self.0.lock().unwrap().clone();
        let mut out = Vec::new();
        let mut rest = &bytes[..];
        while !rest.is_empty() {
            let header = ChunkHeader::decode(rest).expect("well-formed request header");
            let end = HEADER_LEN + header.data_length() as usize;
            out.push(SentRequest {
                id: header.request_id(),
                command: header.command().expect("known request command"),
                payload: rest[HEADER_LEN..end].to_vec(),
            });
            rest = &rest[end..];
        }
        out
    }
}

// ── Importer construction ─────────────────────────────────────────────────────

/// An importer over a scripted helper, its captured request stream, and the
/// store it writes into.
pub fn scripted_importer(
    script: Vec<u8>,
) -> (RepoImporter<MemoryStore>, CapturedWrites, MemoryStore) {
    let store = MemoryStore::new();
    let writes = CapturedWrites::default();
    let channel = HelperChannel::from_parts(Cursor::new(script), writes.clone());
    let importer =
        RepoImporter::attach(channel, Arc::new(store.clone())).expect("startup negotiation");
    (importer, writes, store)
}

// ── Temp directories ──────────────────────────────────────────────────────────

/// A unique temp directory, removed on drop.
pub struct TestDir(pub PathBuf);

impl TestDir {
    pub fn new(name: &str) -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let dir = std::env::temp_dir().join(format!(
            "porter-it-{}-{}-{}",
            name,
            std::process::id(),
            COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        TestDir(dir)
    }

    pub fn path(&self) -> &std::path::Path {
        &self.0
    }
}

impl Drop for TestDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}
