//! Helper pipe protocol: on-wire types for talking to the repository helper.
//!
//! These types ARE the protocol. Every chunk the helper sends or receives
//! starts with a [`ChunkHeader`]; every field is big-endian and every size is
//! fixed. The header layout and the command codes are shared with the helper
//! implementation and must not change independently of it.
//!
//! All wire structs use zerocopy derives for allocation-free encode/decode.
//! There is no unsafe code in this module.

use static_assertions::assert_eq_size;
use zerocopy::byteorder::{BigEndian, U32};
use zerocopy::{AsBytes, FromBytes, FromZeroes, Unaligned};

type BeU32 = U32<BigEndian>;

// ── Protocol constants ───────────────────────────────────────────────────────

/// Protocol version carried in the STARTED payload.
///
/// The version gate is an exact match. Nothing else in the stream can be
/// trusted across a version skew, so there is no negotiation, no ranges, no
/// downgrade path. Any other value aborts startup.
pub const PROTOCOL_VERSION: u32 = 1;

/// Size of [`ChunkHeader`] on the wire.
pub const HEADER_LEN: usize = 16;

/// Largest `data_length` a single chunk may carry.
///
/// Helpers split larger payloads across chunks with [`FLAG_MORE_CHUNKS`].
/// A header claiming more than this is treated as stream corruption rather
/// than an allocation request.
pub const MAX_CHUNK_DATA: u32 = 64 * 1024 * 1024;

/// Chunk flag: the payload is an error message, not response data.
///
/// An error chunk terminates its response regardless of any previously
/// received fragments.
pub const FLAG_ERROR: u32 = 0x01;

/// Chunk flag: at least one more chunk for the same response follows.
pub const FLAG_MORE_CHUNKS: u32 = 0x02;

/// STARTED capability bit: the helper supports tree-granular import and the
/// payload carries a list of local pack directories.
pub const START_FLAG_TREE_PACKS: u32 = 0x01;

// ── Chunk header ─────────────────────────────────────────────────────────────

/// Fixed preamble of every chunk in both directions.
///
/// The receiver can route and validate a chunk before reading a byte of
/// payload: which request it answers, what kind of chunk it is, whether more
/// chunks follow, and exactly how many payload bytes to read next.
///
/// Wire size: 16 bytes, all fields big-endian.
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes, Unaligned)]
#[repr(C)]
pub struct ChunkHeader {
    /// Echo of the request this chunk belongs to. Requests carry the ID the
    /// importer assigned; every response chunk must echo it back unchanged.
    request_id: BeU32,

    /// Command code. [`HelperCommand`] on requests; on responses the helper
    /// sends [`HelperCommand::Response`] (or [`HelperCommand::Started`] for
    /// the unsolicited startup chunk).
    command: BeU32,

    /// Flag bits. See [`FLAG_ERROR`] and [`FLAG_MORE_CHUNKS`]; all other
    /// bits are reserved and ignored on receive.
    flags: BeU32,

    /// Length in bytes of the payload that immediately follows this header.
    data_length: BeU32,
}

// Compile-time size guard. If this fails, the wire format has silently changed.
assert_eq_size!(ChunkHeader, [u8; HEADER_LEN]);

impl ChunkHeader {
    pub fn new(request_id: u32, command: HelperCommand, flags: u32, data_length: u32) -> Self {
        ChunkHeader {
            request_id: BeU32::new(request_id),
            command: BeU32::new(u32::from(command)),
            flags: BeU32::new(flags),
            data_length: BeU32::new(data_length),
        }
    }

    /// Parse a header from the first [`HEADER_LEN`] bytes of `buf`.
    pub fn decode(buf: &[u8]) -> Result<Self, WireError> {
        ChunkHeader::read_from_prefix(buf).ok_or(WireError::ShortHeader { got: buf.len() })
    }

    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out.copy_from_slice(self.as_bytes());
        out
    }

    pub fn request_id(&self) -> u32 {
        self.request_id.get()
    }

    /// Raw command code, for diagnostics on malformed streams.
    pub fn command_code(&self) -> u32 {
        self.command.get()
    }

    pub fn command(&self) -> Result<HelperCommand, WireError> {
        HelperCommand::try_from(self.command.get())
    }

    pub fn flags(&self) -> u32 {
        self.flags.get()
    }

    pub fn data_length(&self) -> u32 {
        self.data_length.get()
    }

    pub fn is_error(&self) -> bool {
        self.flags.get() & FLAG_ERROR != 0
    }

    pub fn has_more_chunks(&self) -> bool {
        self.flags.get() & FLAG_MORE_CHUNKS != 0
    }
}

// ── Commands ─────────────────────────────────────────────────────────────────

/// Command codes understood by the helper.
///
/// The numeric values are wire constants shared with the helper and are
/// append-only: codes are never renumbered or reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum HelperCommand {
    /// Unsolicited startup chunk from the helper: protocol version plus
    /// capability flags. Never sent by the importer.
    Started = 0,

    /// Marks a chunk as part of a response to an earlier request.
    Response = 1,

    /// Request the full flat manifest for a revision.
    Manifest = 2,

    /// Request the raw contents of one file revision.
    CatFile = 3,

    /// Resolve a revision identifier to its manifest node hash.
    ManifestNodeForCommit = 4,

    /// Request the immediate entries of one directory under a manifest node.
    FetchTree = 5,
}

impl TryFrom<u32> for HelperCommand {
    type Error = WireError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(HelperCommand::Started),
            1 => Ok(HelperCommand::Response),
            2 => Ok(HelperCommand::Manifest),
            3 => Ok(HelperCommand::CatFile),
            4 => Ok(HelperCommand::ManifestNodeForCommit),
            5 => Ok(HelperCommand::FetchTree),
            other => Err(WireError::UnknownCommand(other)),
        }
    }
}

impl From<HelperCommand> for u32 {
    fn from(c: HelperCommand) -> u32 {
        c as u32
    }
}

// ── Errors ───────────────────────────────────────────────────────────────────

/// Errors that can arise when interpreting wire-format data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("unknown command code: {0}")]
    UnknownCommand(u32),

    #[error("chunk header needs {HEADER_LEN} bytes, got {got}")]
    ShortHeader { got: usize },
}

// ── Tests ────────────────────────────────────────────────────────────────────
