use crate::*;

use porter_store::pack::write_pack_file;
use porter_store::proxy::ProxyRecord;
use porter_store::{Family, Tree};

fn tree_payload_root() -> Vec<u8> {
    manifest_lines(&[("file.txt", 3, FileKind::Regular), ("sub", 2, FileKind::Tree)])
}

/// With the root's data present in a local pack, importing the manifest
/// root must resolve the node over the wire and nothing else: no FETCH_TREE
/// request may be issued.
#[test]
fn test_pack_fast_path_skips_fetch_tree() {
    let dir = TestDir::new("fastpath");
    write_pack_file(
        &dir.path().join("trees.pack"),
        &[(RepoPathBuf::root(), node(1), tree_payload_root())],
    )
    .unwrap();
    let dir_str = dir.path().to_str().unwrap();

    let mut script = started(&[dir_str]);
    script.extend(chunk(0, HelperCommand::Response, 0, node(1).as_bytes()));
    let (mut importer, writes, store) = scripted_importer(script);

    let root = importer.import_tree_manifest("tip").unwrap();

    let requests = writes.requests();
    assert_eq!(requests.len(), 1, "only the node resolution may hit the helper");
    assert_eq!(requests[0].command, HelperCommand::ManifestNodeForCommit);
    assert_eq!(requests[0].payload, b"tip");

    let tree = Tree::load(&store, &root).unwrap().unwrap();
    assert_eq!(tree.len(), 2);
    assert_eq!(tree.find("sub").unwrap().kind, FileKind::Tree);

    // The unexpanded subdirectory exists only as a proxy record.
    let sub_id = tree.find("sub").unwrap().id;
    let proxy = ProxyRecord::load(&store, &sub_id).unwrap().unwrap();
    assert_eq!(proxy.path, repo_path("sub"));
    assert_eq!(proxy.node, node(2));
    assert!(Tree::load(&store, &sub_id).unwrap().is_none());
}

/// With tree support negotiated but no pack files on disk, the same import
/// issues exactly one FETCH_TREE for the root and none for its
/// subdirectories.
#[test]
fn test_fetch_tree_fallback_is_one_directory_deep() {
    let dir = TestDir::new("fallback");
    let dir_str = dir.path().to_str().unwrap();

    let mut script = started(&[dir_str]);
    script.extend(chunk(0, HelperCommand::Response, 0, node(1).as_bytes()));
    script.extend(chunk(1, HelperCommand::Response, 0, &tree_payload_root()));
    let (mut importer, writes, store) = scripted_importer(script);

    let root = importer.import_tree_manifest("tip").unwrap();

    let requests = writes.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].command, HelperCommand::ManifestNodeForCommit);
    assert_eq!(requests[1].command, HelperCommand::FetchTree);
    // Root request payload: 20 node bytes, empty path.
    assert_eq!(requests[1].payload, node(1).as_bytes());

    let tree = Tree::load(&store, &root).unwrap().unwrap();
    assert_eq!(tree.len(), 2);
    assert!(Tree::load(&store, &tree.find("sub").unwrap().id).unwrap().is_none());
}

/// A child directory materializes only when its ID is explicitly imported,
/// with a FETCH_TREE addressed by the child's path and node.
#[test]
fn test_child_directory_imports_lazily() {
    let dir = TestDir::new("lazy");
    let dir_str = dir.path().to_str().unwrap();
    let child_payload = manifest_lines(&[("inner.txt", 4, FileKind::Regular)]);

    let mut script = started(&[dir_str]);
    script.extend(chunk(0, HelperCommand::Response, 0, node(1).as_bytes()));
    script.extend(chunk(1, HelperCommand::Response, 0, &tree_payload_root()));
    script.extend(chunk(2, HelperCommand::Response, 0, &child_payload));
    let (mut importer, writes, store) = scripted_importer(script);

    let root = importer.import_tree_manifest("tip").unwrap();
    let root_tree = Tree::load(&store, &root).unwrap().unwrap();
    let sub_id = root_tree.find("sub").unwrap().id;
    assert_eq!(writes.requests().len(), 2);

    let sub_tree = importer.import_tree(&sub_id).unwrap();
    assert_eq!(sub_tree.len(), 1);
    assert_eq!(sub_tree.find("inner.txt").unwrap().kind, FileKind::Regular);

    let requests = writes.requests();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[2].command, HelperCommand::FetchTree);
    let mut expected = node(2).as_bytes().to_vec();
    expected.extend_from_slice(b"sub");
    assert_eq!(requests[2].payload, expected);

    // The child's tree record is now persisted under its proxy ID.
    assert!(Tree::load(&store, &sub_id).unwrap().is_some());
    // Its grandchildren are proxies, not trees.
    let inner_id = sub_tree.find("inner.txt").unwrap().id;
    assert!(ProxyRecord::load(&store, &inner_id).unwrap().is_some());
}

/// CAT_FILE returns the payload verbatim, addressed by the proxy record
/// behind the local ID.
#[test]
fn test_file_contents_round_trip() {
    let dir = TestDir::new("cat");
    let dir_str = dir.path().to_str().unwrap();
    let contents = b"#!/bin/sh\necho imported\n";

    let mut script = started(&[dir_str]);
    script.extend(chunk(0, HelperCommand::Response, 0, node(1).as_bytes()));
    script.extend(chunk(1, HelperCommand::Response, 0, &tree_payload_root()));
    script.extend(chunk(2, HelperCommand::Response, 0, contents));
    let (mut importer, writes, store) = scripted_importer(script);

    let root = importer.import_tree_manifest("tip").unwrap();
    let root_tree = Tree::load(&store, &root).unwrap().unwrap();
    let file_id = root_tree.find("file.txt").unwrap().id;

    let fetched = importer.import_file_contents(&file_id).unwrap();
    assert_eq!(fetched, &contents[..]);

    let requests = writes.requests();
    assert_eq!(requests[2].command, HelperCommand::CatFile);
    let mut expected = node(3).as_bytes().to_vec();
    expected.extend_from_slice(b"file.txt");
    assert_eq!(requests[2].payload, expected);

    // File contents are returned, not cached in the store.
    assert_eq!(store.count(Family::Tree), 1);
}

/// `import_manifest` prefers the tree path whenever the helper negotiated
/// it.
#[test]
fn test_import_manifest_selects_tree_path_with_packs() {
    let dir = TestDir::new("select");
    write_pack_file(
        &dir.path().join("trees.pack"),
        &[(RepoPathBuf::root(), node(1), tree_payload_root())],
    )
    .unwrap();
    let dir_str = dir.path().to_str().unwrap();

    let mut script = started(&[dir_str]);
    script.extend(chunk(0, HelperCommand::Response, 0, node(1).as_bytes()));
    let (mut importer, writes, _store) = scripted_importer(script);

    importer.import_manifest("tip").unwrap();
    let requests = writes.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].command, HelperCommand::ManifestNodeForCommit);
}
