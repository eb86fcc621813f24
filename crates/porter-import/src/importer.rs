//! The repository importer.
//!
//! A [`RepoImporter`] owns one helper process (via its channel), the
//! negotiated startup options, and any local pack files the helper
//! announced. It is not thread safe and never needs to be: every call
//! blocks on the synchronous helper protocol. To import in parallel, run
//! several importers on separate threads against the same [`Store`]; store
//! records are content-addressed, so overlapping writes are idempotent and
//! need no coordination.

use bytes::Bytes;
use std::path::Path;
use std::sync::Arc;

use porter_core::config::HelperConfig;
use porter_core::manifest::parse_manifest;
use porter_core::wire::HelperCommand;
use porter_core::{NodeId, ObjectId, RepoPathBuf};
use porter_store::pack::PackSet;
use porter_store::proxy::ProxyRecord;
use porter_store::tree::{Tree, TreeEntry};
use porter_store::{Family, Store, WriteBatch};

use crate::channel::HelperChannel;
use crate::error::ImportError;
use crate::helper;
use crate::startup::{self, Options};

pub struct RepoImporter<S: Store> {
    channel: HelperChannel,
    store: Arc<S>,
    options: Options,
    packs: PackSet,
}

impl<S: Store> std::fmt::Debug for RepoImporter<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepoImporter")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<S: Store> RepoImporter<S> {
    /// Spawn a helper for `repo` and negotiate startup.
    pub fn spawn(repo: &Path, store: Arc<S>, config: &HelperConfig) -> Result<Self, ImportError> {
        let channel = helper::spawn_helper(config, repo)?;
        Self::attach(channel, store)
    }

    /// Negotiate startup on an existing channel. No request goes out until
    /// the helper's STARTED chunk has been read and accepted.
    pub fn attach(mut channel: HelperChannel, store: Arc<S>) -> Result<Self, ImportError> {
        let options = startup::negotiate(&mut channel)?;
        let packs = if options.pack_dirs.is_empty() {
            PackSet::empty()
        } else {
            PackSet::open(&options.pack_dirs)
        };
        Ok(Self { channel, store, options, packs })
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Import the manifest of `rev`, choosing tree-granular import when the
    /// helper negotiated it and falling back to a flat import otherwise.
    pub fn import_manifest(&mut self, rev: &str) -> Result<ObjectId, ImportError> {
        if self.options.tree_import_supported() {
            self.import_tree_manifest(rev)
        } else {
            self.import_flat_manifest(rev)
        }
    }

    /// Import the complete flat manifest of `rev`: every directory becomes
    /// a tree record, every file a proxy record, in one committed batch.
    pub fn import_flat_manifest(&mut self, rev: &str) -> Result<ObjectId, ImportError> {
        tracing::debug!(rev, "requesting flat manifest");
        let payload = self.channel.request(HelperCommand::Manifest, rev.as_bytes())?;
        let root = import_flat_payload(&*self.store, &payload)?;
        tracing::info!(rev, root = %root, payload_len = payload.len(), "flat manifest imported");
        Ok(root)
    }

    /// Tree-granular import of `rev`: resolves the manifest node, then
    /// imports only the root directory. Children materialize lazily through
    /// [`import_tree`](Self::import_tree).
    pub fn import_tree_manifest(&mut self, rev: &str) -> Result<ObjectId, ImportError> {
        if !self.options.tree_import_supported() {
            return Err(ImportError::TreeUnsupported);
        }
        let node = self.resolve_manifest_node(rev)?;
        let root = ProxyRecord::new(RepoPathBuf::root(), node);
        let root_id = root.object_id();
        tracing::debug!(rev, node = %node, root = %root_id, "importing manifest root tree");
        self.import_tree_record(&root)?;
        tracing::info!(rev, root = %root_id, "tree manifest imported");
        Ok(root_id)
    }

    /// Import the single directory behind a local ID. The ID must have a
    /// proxy record, either written by an earlier import or derived for the
    /// manifest root.
    pub fn import_tree(&mut self, id: &ObjectId) -> Result<Tree, ImportError> {
        let record =
            ProxyRecord::load(&*self.store, id)?.ok_or(ImportError::MissingProxy(*id))?;
        self.import_tree_record(&record)
    }

    /// Fetch one directory's entries, preferring local packs, and store the
    /// resulting tree plus a proxy record per child. No recursion: children
    /// are recorded, not fetched.
    fn import_tree_record(&mut self, record: &ProxyRecord) -> Result<Tree, ImportError> {
        let id = record.object_id();
        let payload = match self.packs.try_get(&record.node, &record.path) {
            Some(bytes) => {
                tracing::trace!(node = %record.node, path = %record.path, "tree found in local packs");
                bytes
            }
            None => {
                tracing::trace!(node = %record.node, path = %record.path, "tree fetched from helper");
                self.channel.request(HelperCommand::FetchTree, &record.encode())?
            }
        };

        let mut batch = WriteBatch::new(&*self.store);
        record.store(&mut batch);

        let mut entries = Vec::new();
        for parsed in parse_manifest(&payload) {
            let entry =
                parsed.map_err(|e| ImportError::framing(format!("bad tree entry: {e}")))?;
            // Entry paths in a tree payload are bare names; join rejects
            // anything with a separator in it.
            let child_path = record
                .path
                .join(entry.path.as_str())
                .map_err(|e| ImportError::framing(format!("bad tree entry name: {e}")))?;
            let child_id = ProxyRecord::new(child_path, entry.node).store(&mut batch);
            entries.push(TreeEntry {
                name: entry.path.as_str().to_string(),
                id: child_id,
                kind: entry.kind,
            });
        }

        let tree = Tree::from_entries(entries)
            .map_err(|e| ImportError::framing(format!("invalid tree payload: {e}")))?;
        batch.put(Family::Tree, id, tree.serialize());
        batch.commit()?;

        tracing::debug!(id = %id, entries = tree.len(), "tree imported");
        Ok(tree)
    }

    /// Fetch the raw contents of the file revision behind a local ID. The
    /// bytes are returned verbatim and not stored.
    pub fn import_file_contents(&mut self, id: &ObjectId) -> Result<Bytes, ImportError> {
        let record =
            ProxyRecord::load(&*self.store, id)?.ok_or(ImportError::MissingProxy(*id))?;
        tracing::trace!(node = %record.node, path = %record.path, "fetching file contents");
        self.channel.request(HelperCommand::CatFile, &record.encode())
    }

    /// Resolve a revision identifier to its 20-byte manifest node.
    pub fn resolve_manifest_node(&mut self, rev: &str) -> Result<NodeId, ImportError> {
        let payload = self.channel.request(HelperCommand::ManifestNodeForCommit, rev.as_bytes())?;
        NodeId::from_slice(&payload).map_err(|_| {
            ImportError::framing(format!(
                "manifest node response has {} bytes, expected 20",
                payload.len()
            ))
        })
    }
}

/// Build tree and proxy records from an already-fetched flat manifest
/// payload. This is the same import [`import_flat_manifest`] performs,
/// usable without a helper when the payload came from elsewhere.
///
/// [`import_flat_manifest`]: RepoImporter::import_flat_manifest
pub fn import_flat_payload(store: &dyn Store, payload: &[u8]) -> Result<ObjectId, ImportError> {
    let mut batch = WriteBatch::new(store);
    let mut assembler = crate::flat::ManifestAssembler::new();
    for parsed in parse_manifest(payload) {
        let entry = parsed.map_err(|e| ImportError::framing(format!("bad manifest entry: {e}")))?;
        assembler.add_file(&entry, &mut batch)?;
    }
    let root = assembler.finish(&mut batch)?;
    let records = batch.len();
    batch.commit()?;
    tracing::debug!(root = %root, records, "flat manifest payload imported");
    Ok(root)
}
