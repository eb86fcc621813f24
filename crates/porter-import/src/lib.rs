//! porter-import — drives a repository helper subprocess over stdin/stdout
//! pipes and lands manifests, trees, and file contents in the local object
//! store.
//!
//! Everything here is deliberately blocking. The helper protocol allows one
//! outstanding request per channel, so there is nothing to schedule; a call
//! returns when its response has been fully reassembled. Run several
//! [`RepoImporter`]s on separate threads over one shared store when imports
//! need to overlap.

pub mod channel;
pub mod error;
mod flat;
pub mod helper;
pub mod importer;
pub mod startup;

pub use channel::{HelperChannel, PendingResponse};
pub use error::ImportError;
pub use importer::{import_flat_payload, RepoImporter};
pub use startup::Options;
