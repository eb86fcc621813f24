//! Streaming assembly of a flat manifest into per-directory tree records.
//!
//! Flat manifests arrive sorted by path, so all files of a directory are
//! adjacent and a directory is complete the moment an entry outside its
//! prefix shows up. The assembler keeps one [`PartialDir`] per open level.
//! Closing a directory serializes its tree, queues the record, and bubbles
//! the resulting entry into the parent; nothing is ever revisited, which
//! keeps memory at one open directory chain regardless of manifest size.

use porter_core::manifest::ManifestEntry;
use porter_core::{FileKind, ObjectId};
use porter_store::proxy::ProxyRecord;
use porter_store::tree::{Tree, TreeEntry};
use porter_store::{Family, WriteBatch};

use crate::error::ImportError;

struct PartialDir {
    name: String,
    entries: Vec<TreeEntry>,
}

pub(crate) struct ManifestAssembler {
    root: PartialDir,
    /// Open subdirectories, outermost first.
    stack: Vec<PartialDir>,
}

impl ManifestAssembler {
    pub(crate) fn new() -> Self {
        Self {
            root: PartialDir { name: String::new(), entries: Vec::new() },
            stack: Vec::new(),
        }
    }

    fn current(&mut self) -> &mut PartialDir {
        self.stack.last_mut().unwrap_or(&mut self.root)
    }

    /// Feed the next manifest entry. Writes the file's proxy record and any
    /// directory records completed by the directory change into `batch`.
    pub(crate) fn add_file(
        &mut self,
        entry: &ManifestEntry,
        batch: &mut WriteBatch<'_>,
    ) -> Result<(), ImportError> {
        if entry.kind.is_tree() {
            return Err(ImportError::framing(format!(
                "flat manifest carries a tree entry for {:?}",
                entry.path.as_str()
            )));
        }
        let Some((dir, name)) = entry.path.split_last() else {
            return Err(ImportError::framing("manifest entry with empty path"));
        };
        let dirs: Vec<&str> = if dir.is_empty() { Vec::new() } else { dir.split('/').collect() };
        self.align(&dirs, batch)?;

        let proxy = ProxyRecord::new(entry.path.clone(), entry.node);
        let id = proxy.store(batch);
        self.current().entries.push(TreeEntry {
            name: name.to_string(),
            id,
            kind: entry.kind,
        });
        Ok(())
    }

    /// Close directories the new entry has left and open the ones it
    /// introduces, so the open chain matches `dirs` exactly.
    fn align(&mut self, dirs: &[&str], batch: &mut WriteBatch<'_>) -> Result<(), ImportError> {
        let mut keep = 0;
        while keep < self.stack.len() && keep < dirs.len() && self.stack[keep].name == dirs[keep] {
            keep += 1;
        }
        while self.stack.len() > keep {
            self.close_top(batch)?;
        }
        for name in &dirs[keep..] {
            self.stack.push(PartialDir { name: name.to_string(), entries: Vec::new() });
        }
        Ok(())
    }

    fn close_top(&mut self, batch: &mut WriteBatch<'_>) -> Result<(), ImportError> {
        let Some(dir) = self.stack.pop() else {
            return Ok(());
        };
        let (id, entry_name) = (Self::write_tree(dir.entries, batch)?, dir.name);
        self.current().entries.push(TreeEntry { name: entry_name, id, kind: FileKind::Tree });
        Ok(())
    }

    fn write_tree(entries: Vec<TreeEntry>, batch: &mut WriteBatch<'_>) -> Result<ObjectId, ImportError> {
        let tree = Tree::from_entries(entries)
            .map_err(|e| ImportError::framing(format!("invalid manifest structure: {e}")))?;
        let id = tree.compute_id();
        batch.put(Family::Tree, id, tree.serialize());
        Ok(id)
    }

    /// Close everything down to the root and return the root tree's ID.
    pub(crate) fn finish(mut self, batch: &mut WriteBatch<'_>) -> Result<ObjectId, ImportError> {
        while !self.stack.is_empty() {
            self.close_top(batch)?;
        }
        Self::write_tree(self.root.entries, batch)
    }
}
