//! Coverage for the relay discovery file lifecycle.

use clay_relay::discovery::{RelayInfo, RelayInfoFile};

#[test]
fn info_carries_current_process_id_and_fresh_token() {
    let info = RelayInfo::for_current_process(3003, vec!["dev".to_owned()]);
    assert_eq!(info.port, 3003);
    assert_eq!(info.process_id, std::process::id());
    assert_eq!(info.tags, vec!["dev"]);
    assert!(!info.token.is_empty());

    let other = RelayInfo::for_current_process(3003, Vec::new());
    assert_ne!(info.token, other.token);
}

#[test]
fn write_creates_file_named_after_port() {
    let dir = tempfile::tempdir().expect("tempdir");
    let info = RelayInfo::for_current_process(4055, Vec::new());

    let file = RelayInfoFile::write(dir.path(), &info).expect("write should succeed");
    assert_eq!(
        file.path(),
        dir.path().join("relayinfo-4055.json").as_path()
    );

    let contents = std::fs::read_to_string(file.path()).expect("read back");
    let parsed: RelayInfo = serde_json::from_str(&contents).expect("valid JSON");
    assert_eq!(parsed.port, 4055);
    assert_eq!(parsed.token, info.token);
}

#[test]
fn write_creates_missing_directory() {
    let dir = tempfile::tempdir().expect("tempdir");
    let nested = dir.path().join("clay-viewer");
    let info = RelayInfo::for_current_process(3003, Vec::new());

    let file = RelayInfoFile::write(&nested, &info).expect("write should succeed");
    assert!(file.path().exists());
}

#[test]
fn remove_deletes_the_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let info = RelayInfo::for_current_process(3003, Vec::new());

    let file = RelayInfoFile::write(dir.path(), &info).expect("write should succeed");
    let path = file.path().to_path_buf();
    assert!(path.exists());

    file.remove().expect("remove should succeed");
    assert!(!path.exists());
}

#[test]
fn remove_tolerates_already_deleted_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let info = RelayInfo::for_current_process(3003, Vec::new());

    let file = RelayInfoFile::write(dir.path(), &info).expect("write should succeed");
    std::fs::remove_file(file.path()).expect("external delete");
    assert!(file.remove().is_ok());
}

#[test]
fn info_serializes_with_viewer_field_names() {
    let info = RelayInfo {
        port: 3003,
        process_id: 4242,
        tags: vec!["a".to_owned()],
        token: "t".to_owned(),
    };
    let json = serde_json::to_string(&info).expect("serialize");
    assert!(json.contains("\"port\":3003"));
    assert!(json.contains("\"process_id\":4242"));
    assert!(json.contains("\"tags\":[\"a\"]"));
    assert!(json.contains("\"token\":\"t\""));
}
