use jotdb_core::{Driver, DriverOptions, StoreError};
use std::fs;

#[test]
fn open_creates_missing_root_with_ancestors() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("deep").join("school");
    assert!(!root.exists());

    let driver = Driver::open_default(&root).unwrap();
    assert!(root.is_dir());
    assert_eq!(driver.root(), root.as_path());
}

#[test]
fn open_reuses_existing_store_without_touching_records() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("db");

    let first = Driver::open_default(&root).unwrap();
    first.write("fish", "redfish", &"red").unwrap();
    drop(first);

    let second = Driver::open_default(&root).unwrap();
    let color: String = second.read("fish", "redfish").unwrap();
    assert_eq!(color, "red");
}

#[test]
fn open_cleans_redundant_segments() {
    let dir = tempfile::tempdir().unwrap();
    let messy = dir.path().join("deep/./school//../school");

    let driver = Driver::open_default(&messy).unwrap();
    assert_eq!(driver.root(), dir.path().join("deep").join("school").as_path());
}

#[test]
fn open_rejects_regular_file_as_root() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("not-a-dir");
    fs::write(&file, b"plain file").unwrap();

    let err = Driver::open_default(&file).unwrap_err();
    assert!(matches!(err, StoreError::InvalidStoreLocation { path } if path == file));
}

#[test]
fn open_rejects_empty_root() {
    let err = Driver::open("", DriverOptions::default()).unwrap_err();
    assert!(matches!(err, StoreError::InvalidStoreLocation { .. }));
}

#[cfg(unix)]
#[test]
fn open_applies_configured_dir_mode() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("private");
    let driver = Driver::open(&root, DriverOptions::new().with_dir_mode(0o700)).unwrap();
    driver.write("fish", "onefish", &1).unwrap();

    let mode = fs::metadata(root.join("fish")).unwrap().permissions().mode();
    assert_eq!(mode & 0o077, 0);
}
