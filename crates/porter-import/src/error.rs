//! Import error taxonomy.
//!
//! The variants split along one line that matters to callers: whether the
//! channel to the helper is still trustworthy afterwards. [`Remote`],
//! [`TreeUnsupported`], [`MissingProxy`], and [`Store`] describe a failed
//! operation on a healthy channel; the caller may keep issuing requests.
//! Everything stream-shaped ([`Framing`], [`Desync`], [`VersionMismatch`],
//! [`HelperDied`]) poisons the channel, after which every further request
//! fails fast with [`Poisoned`].
//!
//! [`Remote`]: ImportError::Remote
//! [`TreeUnsupported`]: ImportError::TreeUnsupported
//! [`MissingProxy`]: ImportError::MissingProxy
//! [`Store`]: ImportError::Store
//! [`Framing`]: ImportError::Framing
//! [`Desync`]: ImportError::Desync
//! [`VersionMismatch`]: ImportError::VersionMismatch
//! [`HelperDied`]: ImportError::HelperDied
//! [`Poisoned`]: ImportError::Poisoned

use porter_core::ObjectId;
use porter_store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    /// The byte stream violated the chunk format: unparseable header,
    /// oversized chunk, or a malformed payload.
    #[error("protocol framing error: {detail}")]
    Framing { detail: String },

    /// A response chunk arrived that cannot belong to the outstanding
    /// request. Request/response pairing is lost.
    #[error("protocol desync: {detail}")]
    Desync { detail: String },

    #[error("helper speaks protocol version {theirs}, this importer requires {ours}")]
    VersionMismatch { ours: u32, theirs: u32 },

    /// The helper reported a request-scoped failure. The channel stays
    /// usable.
    #[error("helper error: {message}")]
    Remote { message: String },

    /// The pipe to the helper broke or hit EOF.
    #[error("helper process died: {0}")]
    HelperDied(#[source] std::io::Error),

    #[error("failed to spawn helper: {0}")]
    Spawn(#[source] std::io::Error),

    /// An earlier fatal error poisoned the channel.
    #[error("helper channel poisoned by an earlier protocol error")]
    Poisoned,

    /// Tree-granular import was requested but not negotiated at startup.
    #[error("helper does not support tree-granular import")]
    TreeUnsupported,

    #[error(transparent)]
    Store(#[from] StoreError),

    /// A local ID has no proxy record, so the repository-native coordinates
    /// behind it cannot be recovered.
    #[error("no proxy record for {0}")]
    MissingProxy(ObjectId),
}

impl ImportError {
    pub(crate) fn framing(detail: impl Into<String>) -> Self {
        ImportError::Framing { detail: detail.into() }
    }

    pub(crate) fn desync(detail: impl Into<String>) -> Self {
        ImportError::Desync { detail: detail.into() }
    }

    /// Build a [`Remote`](ImportError::Remote) error from an error chunk's
    /// payload. The message is decoded lossily and control characters are
    /// scrubbed, since the bytes come from an untrusted process and end up
    /// in logs and terminals.
    pub(crate) fn remote_from_payload(payload: &[u8]) -> Self {
        let message: String = String::from_utf8_lossy(payload)
            .chars()
            .map(|c| {
                if c.is_control() && c != '\n' && c != '\t' {
                    '\u{fffd}'
                } else {
                    c
                }
            })
            .collect();
        ImportError::Remote { message }
    }
}
