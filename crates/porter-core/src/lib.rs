//! porter-core — wire format, identifiers, and configuration shared by all
//! porter crates.

pub mod config;
pub mod hash;
pub mod manifest;
pub mod path;
pub mod wire;

pub use hash::{NodeId, ObjectId};
pub use manifest::{FileKind, ManifestEntry};
pub use path::RepoPathBuf;
