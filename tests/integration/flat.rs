use crate::*;

use porter_core::wire::FLAG_MORE_CHUNKS;
use porter_import::import_flat_payload;
use porter_store::proxy::ProxyRecord;
use porter_store::{Family, Tree};

/// Scenario: a manifest with a top-level file and one file in a
/// subdirectory. Two proxy records, two tree records (root and dir), and a
/// deterministic root hash.
#[test]
fn test_flat_import_end_to_end() {
    let payload = manifest_lines(&[
        ("a.txt", 0xaa, FileKind::Regular),
        ("dir/b.txt", 0xbb, FileKind::Executable),
    ]);

    let mut script = started(&[]);
    script.extend(chunk(0, HelperCommand::Response, 0, &payload));
    let (mut importer, writes, store) = scripted_importer(script);

    let root = importer.import_flat_manifest("rev-1").unwrap();

    // Exactly one MANIFEST request carrying the revision name.
    let requests = writes.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].command, HelperCommand::Manifest);
    assert_eq!(requests[0].payload, b"rev-1");

    assert_eq!(store.count(Family::Proxy), 2);
    assert_eq!(store.count(Family::Tree), 2);

    let root_tree = Tree::load(&store, &root).unwrap().unwrap();
    let names: Vec<_> = root_tree.entries().iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["a.txt", "dir"]);
    assert_eq!(root_tree.find("a.txt").unwrap().kind, FileKind::Regular);
    assert_eq!(root_tree.find("dir").unwrap().kind, FileKind::Tree);

    let dir = Tree::load(&store, &root_tree.find("dir").unwrap().id).unwrap().unwrap();
    assert_eq!(dir.find("b.txt").unwrap().kind, FileKind::Executable);

    // The file's proxy record carries its repository coordinates.
    let proxy = ProxyRecord::load(&store, &dir.find("b.txt").unwrap().id).unwrap().unwrap();
    assert_eq!(proxy.path, repo_path("dir/b.txt"));
    assert_eq!(proxy.node, node(0xbb));

    // The same entry set imported into a fresh store yields the same root.
    let other = MemoryStore::new();
    assert_eq!(import_flat_payload(&other, &payload).unwrap(), root);
}

/// A manifest split across several chunks must import identically to the
/// same manifest in one chunk, even when boundaries fall mid-line.
#[test]
fn test_flat_import_reassembles_multi_chunk_manifest() {
    let payload = manifest_lines(&[
        ("one.txt", 1, FileKind::Regular),
        ("sub/three.txt", 3, FileKind::Symlink),
        ("sub/two.txt", 2, FileKind::Regular),
    ]);
    let cut_a = 10;
    let cut_b = payload.len() - 7;

    let mut script = started(&[]);
    script.extend(chunk(0, HelperCommand::Response, FLAG_MORE_CHUNKS, &payload[..cut_a]));
    script.extend(chunk(0, HelperCommand::Response, FLAG_MORE_CHUNKS, &payload[cut_a..cut_b]));
    script.extend(chunk(0, HelperCommand::Response, 0, &payload[cut_b..]));
    let (mut importer, _writes, _store) = scripted_importer(script);

    let root = importer.import_flat_manifest("tip").unwrap();

    let reference = MemoryStore::new();
    assert_eq!(import_flat_payload(&reference, &payload).unwrap(), root);
}

/// Importing the same revision twice into the same store returns the same
/// root and fails nowhere: content-addressed records tolerate re-puts.
#[test]
fn test_flat_import_is_idempotent() {
    let payload = manifest_lines(&[
        ("x.txt", 4, FileKind::Regular),
        ("y/z.txt", 5, FileKind::Regular),
    ]);

    let mut script = started(&[]);
    script.extend(chunk(0, HelperCommand::Response, 0, &payload));
    script.extend(chunk(1, HelperCommand::Response, 0, &payload));
    let (mut importer, _writes, store) = scripted_importer(script);

    let first = importer.import_flat_manifest("tip").unwrap();
    let trees = store.count(Family::Tree);
    let proxies = store.count(Family::Proxy);

    let second = importer.import_flat_manifest("tip").unwrap();
    assert_eq!(first, second);
    assert_eq!(store.count(Family::Tree), trees);
    assert_eq!(store.count(Family::Proxy), proxies);
}

/// A helper-reported error fails the one operation and leaves the importer
/// usable for the next one.
#[test]
fn test_flat_import_remote_error_keeps_importer_usable() {
    let payload = manifest_lines(&[("ok.txt", 6, FileKind::Regular)]);

    let mut script = started(&[]);
    script.extend(chunk(0, HelperCommand::Response, porter_core::wire::FLAG_ERROR, b"unknown revision: bogus"));
    script.extend(chunk(1, HelperCommand::Response, 0, &payload));
    let (mut importer, _writes, store) = scripted_importer(script);

    let err = importer.import_flat_manifest("bogus").unwrap_err();
    assert!(matches!(
        err,
        porter_import::ImportError::Remote { ref message } if message == "unknown revision: bogus"
    ));
    // Nothing from the failed import reached the store.
    assert_eq!(store.count(Family::Tree), 0);

    importer.import_flat_manifest("tip").unwrap();
    assert!(store.count(Family::Tree) > 0);
}

/// Without negotiated pack directories, `import_manifest` takes the flat
/// path.
#[test]
fn test_import_manifest_selects_flat_without_tree_support() {
    let payload = manifest_lines(&[("f", 7, FileKind::Regular)]);
    let mut script = started(&[]);
    script.extend(chunk(0, HelperCommand::Response, 0, &payload));
    let (mut importer, writes, _store) = scripted_importer(script);

    importer.import_manifest("tip").unwrap();
    let requests = writes.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].command, HelperCommand::Manifest);
}
