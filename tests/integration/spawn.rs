//! Tests that spawn real helper subprocesses. The "helpers" are /bin/sh
//! scripts that replay pre-baked response bytes, which is enough to exercise
//! process spawning, pipe wiring, negotiation, and teardown.

use crate::*;

use porter_core::config::HelperConfig;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::sync::Arc;

fn sh_available() -> bool {
    std::path::Path::new("/bin/sh").exists()
}

/// Write an executable helper script into `dir`.
fn write_helper_script(dir: &TestDir, name: &str, body: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

/// A helper that replays `response` on stdout, then keeps draining stdin so
/// request writes never hit a closed pipe.
fn replay_helper(dir: &TestDir, response: &[u8]) -> HelperConfig {
    let response_file = dir.path().join("response.bin");
    std::fs::write(&response_file, response).unwrap();
    let script = write_helper_script(
        dir,
        "helper.sh",
        &format!("cat '{}'\nexec cat >/dev/null", response_file.display()),
    );
    HelperConfig { command: script, args: Vec::new() }
}

#[test]
fn test_spawned_helper_negotiates_and_resolves() {
    if !sh_available() {
        eprintln!("SKIP: /bin/sh not available");
        return;
    }
    let dir = TestDir::new("spawn-ok");

    let mut response = started(&[]);
    response.extend(chunk(0, HelperCommand::Response, 0, node(0x42).as_bytes()));
    let config = replay_helper(&dir, &response);

    let mut importer =
        RepoImporter::spawn(dir.path(), Arc::new(MemoryStore::new()), &config).unwrap();
    assert!(!importer.options().tree_import_supported());
    assert_eq!(importer.resolve_manifest_node("tip").unwrap(), node(0x42));
    // Dropping the importer kills and reaps the helper; nothing to assert,
    // but it must not hang.
    drop(importer);
}

#[test]
fn test_spawned_helper_version_skew_fails_construction() {
    if !sh_available() {
        eprintln!("SKIP: /bin/sh not available");
        return;
    }
    let dir = TestDir::new("spawn-skew");

    let response = chunk(
        0,
        HelperCommand::Started,
        0,
        &porter_import::startup::encode_started(PROTOCOL_VERSION + 1, &[]),
    );
    let config = replay_helper(&dir, &response);

    let result = RepoImporter::spawn(dir.path(), Arc::new(MemoryStore::new()), &config);
    assert!(matches!(result, Err(ImportError::VersionMismatch { .. })));
}

#[test]
fn test_helper_exiting_at_startup_reads_as_death() {
    if !sh_available() {
        eprintln!("SKIP: /bin/sh not available");
        return;
    }
    let dir = TestDir::new("spawn-exit");
    let script = write_helper_script(&dir, "helper.sh", "exec true");
    let config = HelperConfig { command: script, args: Vec::new() };

    let result = RepoImporter::spawn(dir.path(), Arc::new(MemoryStore::new()), &config);
    assert!(matches!(result, Err(ImportError::HelperDied(_))));
}

#[test]
fn test_missing_helper_command_is_a_spawn_error() {
    let dir = TestDir::new("spawn-missing");
    let config = HelperConfig {
        command: dir.path().join("no-such-helper"),
        args: Vec::new(),
    };

    let result = RepoImporter::spawn(dir.path(), Arc::new(MemoryStore::new()), &config);
    assert!(matches!(result, Err(ImportError::Spawn(_))));
}

#[test]
fn test_spawned_helper_serves_a_flat_import() {
    if !sh_available() {
        eprintln!("SKIP: /bin/sh not available");
        return;
    }
    let dir = TestDir::new("spawn-flat");

    let payload = manifest_lines(&[
        ("README", 1, FileKind::Regular),
        ("src/main.rs", 2, FileKind::Regular),
    ]);
    let mut response = started(&[]);
    response.extend(chunk(0, HelperCommand::Response, 0, &payload));
    let config = replay_helper(&dir, &response);

    let store = Arc::new(MemoryStore::new());
    let mut importer = RepoImporter::spawn(dir.path(), Arc::clone(&store), &config).unwrap();
    let root = importer.import_manifest("tip").unwrap();

    let tree = porter_store::Tree::load(store.as_ref(), &root).unwrap().unwrap();
    let names: Vec<_> = tree.entries().iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["README", "src"]);
}
