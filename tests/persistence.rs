/*!
 * Integration tests for saving and loading namespace state on disk
 */

use std::fs;

use serde_json::Value;
use tempfile::tempdir;

use simos::namespace::NodeType;
use simos::{Namespace, NamespaceError, Workload};

fn sample_tree() -> Namespace {
    let mut fs = Namespace::new();
    fs.make_directory("/home").unwrap();
    fs.make_directory("/home/user").unwrap();
    fs.write_file("/home/user/notes.txt", "remember the milk")
        .unwrap();
    fs.create_or_touch_file("/home/empty").unwrap();
    fs.change_directory("/home/user").unwrap();
    fs
}

#[test]
fn test_save_and_load_round_trip() {
    let temp_dir = tempdir().unwrap();
    let state = temp_dir.path().join("state.json");

    let original = sample_tree();
    original.save(&state).unwrap();

    let mut loaded = Namespace::new();
    loaded.load(&state).unwrap();

    assert_eq!(loaded.to_persisted(), original.to_persisted());
    assert_eq!(
        loaded.read_file("/home/user/notes.txt").unwrap(),
        "remember the milk"
    );
    assert_eq!(
        loaded.stat("/home/empty").unwrap().node_type(),
        NodeType::File
    );
    // Loading always starts from the root
    assert_eq!(loaded.current_directory_path(), "/");
}

#[test]
fn test_saved_file_layout() {
    let temp_dir = tempdir().unwrap();
    let state = temp_dir.path().join("state.json");
    sample_tree().save(&state).unwrap();

    let json: Value = serde_json::from_str(&fs::read_to_string(&state).unwrap()).unwrap();
    assert_eq!(json["type"], "dir");
    assert_eq!(json["name"], "/");
    assert_eq!(json["owner"], "root");
    assert_eq!(json["permissions"], 0o755);

    let notes = &json["children"]["home"]["children"]["user"]["children"]["notes.txt"];
    assert_eq!(notes["type"], "file");
    assert_eq!(notes["content"], "remember the milk");
    assert_eq!(notes["permissions"], 0o644);
    assert!(notes["mtime"].as_u64().unwrap() >= notes["ctime"].as_u64().unwrap());
}

#[test]
fn test_clock_moves_past_loaded_timestamps() {
    let temp_dir = tempdir().unwrap();
    let state = temp_dir.path().join("state.json");
    let original = sample_tree();
    original.save(&state).unwrap();

    let mut loaded = Namespace::new();
    loaded.load(&state).unwrap();
    assert!(loaded.now() >= original.now());

    loaded.create_or_touch_file("/fresh").unwrap();
    let fresh = loaded.stat("/fresh").unwrap().metadata.ctime;
    let notes = loaded.stat("/home/user/notes.txt").unwrap().metadata.mtime;
    assert!(fresh > notes);
}

#[test]
fn test_failed_load_leaves_store_unchanged() {
    let temp_dir = tempdir().unwrap();
    let mut fs = sample_tree();
    let before = fs.to_persisted();

    let missing = temp_dir.path().join("missing.json");
    assert!(matches!(fs.load(&missing), Err(NamespaceError::Io(_))));

    let garbage = temp_dir.path().join("garbage.json");
    fs::write(&garbage, "{ not json").unwrap();
    assert!(matches!(fs.load(&garbage), Err(NamespaceError::Json(_))));

    let file_root = temp_dir.path().join("file_root.json");
    fs::write(&file_root, r#"{"type": "file", "name": "x", "content": ""}"#).unwrap();
    assert!(matches!(
        fs.load(&file_root),
        Err(NamespaceError::Malformed(_))
    ));

    assert_eq!(fs.to_persisted(), before);
    assert_eq!(fs.current_directory_path(), "/home/user");
}

#[test]
fn test_workload_run_then_save() {
    let temp_dir = tempdir().unwrap();
    let state = temp_dir.path().join("fs_state_after.json");

    let mut fs = Namespace::new();
    let summary = Workload::demo().run(&mut fs).unwrap();
    assert_eq!(summary.stats.faults, 0);
    fs.save(&state).unwrap();

    let mut reloaded = Namespace::new();
    reloaded.load(&state).unwrap();
    assert_eq!(reloaded.read_file("/tmp/a.txt").unwrap(), "hello-from-p1");
}

#[test]
fn test_workload_file_against_saved_state() {
    let temp_dir = tempdir().unwrap();
    let state = temp_dir.path().join("state.json");
    let workload_path = temp_dir.path().join("workload.json");

    sample_tree().save(&state).unwrap();
    fs::write(
        &workload_path,
        r#"{
            "processes": [
                {"pid": 1, "name": "reader", "program": [
                    {"syscall": {"name": "read", "args": ["/home/user/notes.txt"], "io_latency": 1}},
                    {"syscall": {"name": "delete", "args": ["/home/empty"]}}
                ]}
            ]
        }"#,
    )
    .unwrap();

    let mut fs = Namespace::new();
    fs.load(&state).unwrap();
    let workload = Workload::from_file(&workload_path).unwrap();
    let summary = workload.run(&mut fs).unwrap();

    assert_eq!(summary.stats.syscalls, 2);
    assert_eq!(summary.stats.faults, 0);
    assert!(!fs.exists("/home/empty"));
}

#[test]
fn test_save_replaces_existing_state_whole() {
    let temp_dir = tempdir().unwrap();
    let state = temp_dir.path().join("state.json");
    fs::write(&state, "previous contents").unwrap();

    let tree = sample_tree();
    tree.save(&state).unwrap();

    let mut loaded = Namespace::new();
    loaded.load(&state).unwrap();
    assert_eq!(loaded.to_persisted(), tree.to_persisted());

    // No temporary files are left beside the destination
    let entries: Vec<_> = fs::read_dir(temp_dir.path()).unwrap().collect();
    assert_eq!(entries.len(), 1);
}

#[test]
fn test_failed_save_keeps_previous_state() {
    let temp_dir = tempdir().unwrap();
    let state = temp_dir.path().join("state.json");
    sample_tree().save(&state).unwrap();
    let saved = fs::read_to_string(&state).unwrap();

    // The destination is a non-empty directory, so the final rename fails
    let blocked = temp_dir.path().join("blocked");
    fs::create_dir(&blocked).unwrap();
    fs::write(blocked.join("keep"), "k").unwrap();
    assert!(matches!(
        Namespace::new().save(&blocked),
        Err(NamespaceError::Io(_))
    ));
    assert_eq!(fs::read_to_string(blocked.join("keep")).unwrap(), "k");

    let missing = temp_dir.path().join("no/such/dir/state.json");
    assert!(Namespace::new().save(&missing).is_err());

    assert_eq!(fs::read_to_string(&state).unwrap(), saved);
    let names: Vec<_> = fs::read_dir(temp_dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name())
        .collect();
    assert_eq!(names.len(), 2);
}
