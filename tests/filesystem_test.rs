//! Tests for the FileSystem trait's real implementation

use std::fs;

use tempfile::TempDir;

use response_combiner::infrastructure::traits::{FileSystem, RealFileSystem};

#[test]
fn given_missing_file_when_append_then_creates_it() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("report.csv");

    RealFileSystem.append(&path, "first\n").unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), "first\n");
}

#[test]
fn given_existing_file_when_append_then_keeps_previous_content() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("report.csv");
    let fs_impl = RealFileSystem;

    fs_impl.write(&path, "header\n").unwrap();
    fs_impl.append(&path, "row 1\n").unwrap();
    fs_impl.append(&path, "row 2\n").unwrap();

    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        "header\nrow 1\nrow 2\n"
    );
}

#[test]
fn given_nested_path_when_ensure_parent_then_directories_created() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("a").join("b").join("report.csv");

    RealFileSystem.ensure_parent(&path).unwrap();

    assert!(temp.path().join("a").join("b").is_dir());
    assert!(!path.exists());
}

#[test]
fn given_bare_filename_when_ensure_parent_then_noop() {
    RealFileSystem
        .ensure_parent(std::path::Path::new("report.csv"))
        .unwrap();
}

#[test]
fn given_file_when_remove_then_gone() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("stale.csv");
    fs::write(&path, "x").unwrap();

    assert!(RealFileSystem.exists(&path));
    RealFileSystem.remove_file(&path).unwrap();

    assert!(!RealFileSystem.exists(&path));
}
