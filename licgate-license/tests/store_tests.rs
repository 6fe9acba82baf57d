mod common;

use chrono::Utc;
use licgate_license::{
    ActivationRequest, DeviceFingerprint, DeviceInfo, LicenseError, LicenseStore, PENDING_FILE,
    TOKEN_FILE, with_deadline,
};
use std::time::Duration;
use tempfile::TempDir;

fn request(email: &str) -> ActivationRequest {
    ActivationRequest {
        request_id: uuid::Uuid::now_v7(),
        email: email.to_string(),
        fingerprint: DeviceFingerprint::from_id(common::MACHINE_A),
        requested_at: Utc::now(),
        device: DeviceInfo::collect(),
    }
}

#[test]
fn load_absent_is_none() {
    let dir = TempDir::new().unwrap();
    let store = LicenseStore::at(dir.path());
    assert!(store.load().unwrap().is_none());
}

#[test]
fn load_absent_directory_is_none() {
    let dir = TempDir::new().unwrap();
    let store = LicenseStore::at(dir.path().join("not-created-yet"));
    assert!(store.load().unwrap().is_none());
    assert!(store.load_pending().unwrap().is_none());
}

#[test]
fn save_then_load() {
    let dir = TempDir::new().unwrap();
    let store = LicenseStore::at(dir.path().join("nested"));
    store.save(b"lg1.payload.sig").unwrap();
    assert_eq!(store.load().unwrap().unwrap(), b"lg1.payload.sig");
    assert_eq!(store.token_path(), dir.path().join("nested").join(TOKEN_FILE));
}

#[test]
fn save_overwrites_previous_token() {
    let dir = TempDir::new().unwrap();
    let store = LicenseStore::at(dir.path());
    store.save(b"first-token-bytes-longer").unwrap();
    store.save(b"second").unwrap();
    assert_eq!(store.load().unwrap().unwrap(), b"second");
}

#[test]
fn save_leaves_no_temporary_files() {
    let dir = TempDir::new().unwrap();
    let store = LicenseStore::at(dir.path());
    store.save(b"token").unwrap();
    store.save(b"token-2").unwrap();

    let names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec![TOKEN_FILE.to_string()]);
}

#[test]
fn remove_token() {
    let dir = TempDir::new().unwrap();
    let store = LicenseStore::at(dir.path());
    store.save(b"token").unwrap();
    store.remove().unwrap();
    assert!(store.load().unwrap().is_none());
    // Removing again is fine.
    store.remove().unwrap();
}

#[test]
fn unreadable_token_is_io_error() {
    let dir = TempDir::new().unwrap();
    let store = LicenseStore::at(dir.path());
    // A directory where the token file should be cannot be read as a file.
    std::fs::create_dir_all(store.token_path()).unwrap();
    assert!(matches!(store.load(), Err(LicenseError::Io(_))));
}

#[test]
fn pending_request_roundtrip() {
    let dir = TempDir::new().unwrap();
    let store = LicenseStore::at(dir.path());
    let req = request("user@shopee.com");
    store.save_pending(&req).unwrap();

    assert_eq!(store.load_pending().unwrap().unwrap(), req);
    assert_eq!(store.pending_path(), dir.path().join(PENDING_FILE));

    store.clear_pending().unwrap();
    assert!(store.load_pending().unwrap().is_none());
}

#[test]
fn newer_pending_request_replaces_older() {
    let dir = TempDir::new().unwrap();
    let store = LicenseStore::at(dir.path());
    store.save_pending(&request("old@shopee.com")).unwrap();
    store.save_pending(&request("new@shopee.com")).unwrap();
    assert_eq!(store.load_pending().unwrap().unwrap().email, "new@shopee.com");
}

#[test]
fn corrupt_pending_request_is_serialization_error() {
    let dir = TempDir::new().unwrap();
    let store = LicenseStore::at(dir.path());
    std::fs::write(store.pending_path(), b"{not json").unwrap();
    assert!(matches!(store.load_pending(), Err(LicenseError::Serialization(_))));
}

#[test]
fn pending_and_token_are_independent() {
    let dir = TempDir::new().unwrap();
    let store = LicenseStore::at(dir.path());
    store.save(b"token").unwrap();
    store.save_pending(&request("user@shopee.com")).unwrap();
    store.clear_pending().unwrap();
    assert_eq!(store.load().unwrap().unwrap(), b"token");
}

#[tokio::test]
async fn with_deadline_runs_blocking_io() {
    let dir = TempDir::new().unwrap();
    let store = LicenseStore::at(dir.path());
    store.save(b"token").unwrap();

    let loaded = with_deadline(Duration::from_secs(5), move || store.load())
        .await
        .unwrap();
    assert_eq!(loaded.unwrap(), b"token");
}

#[tokio::test]
async fn with_deadline_times_out() {
    let result: Result<(), _> = with_deadline(Duration::from_millis(20), || {
        std::thread::sleep(Duration::from_millis(500));
        Ok(())
    })
    .await;
    assert!(matches!(result, Err(LicenseError::Storage(_))));
}
