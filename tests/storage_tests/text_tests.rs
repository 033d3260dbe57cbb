//! Tests for TextExecutor
//!
//! These tests verify:
//! - Output file naming and lazy creation
//! - Adopting the newest earlier file
//! - Clean slate removal of earlier files only
//! - Skipping unreadable lines on read

use std::fs;
use std::path::PathBuf;

use postvault::storage::{StorageExecutor, TextExecutor};
use regex::Regex;
use tempfile::TempDir;

const ID: &str = "0f8fad5bd9cb469fa16570867728950e";
const OTHER_ID: &str = "7c9e6679742540de944be07fc1f90ae7";

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_storage() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().to_path_buf();
    (temp_dir, path)
}

fn line(id: &str, user: &str) -> String {
    format!(
        "{};https://www.reddit.com/r/aww/comments/{}/;{};5;6;11;2020-12-24;2024-03-03;1;2;aww",
        id, id, user
    )
}

// =============================================================================
// File Tests
// =============================================================================

#[test]
fn test_file_created_on_first_insert() {
    let (_temp, path) = setup_temp_storage();
    let mut executor = TextExecutor::open(&path, true).unwrap();
    assert!(executor.path().is_none());

    executor.insert(&[line(ID, "alice")]).unwrap();

    let file = executor.path().unwrap().to_path_buf();
    let name = file.file_name().unwrap().to_str().unwrap();
    assert!(Regex::new(r"^reddit-[0-9]{12}\.txt$").unwrap().is_match(name));
    assert_eq!(fs::read_to_string(&file).unwrap(), format!("{}\n", line(ID, "alice")));
}

#[test]
fn test_open_creates_directory() {
    let (_temp, path) = setup_temp_storage();
    let nested = path.join("output");

    TextExecutor::open(&nested, false).unwrap();
    assert!(nested.is_dir());
}

#[test]
fn test_adopts_newest_file() {
    let (_temp, path) = setup_temp_storage();
    fs::write(path.join("reddit-202001010000.txt"), format!("{}\n", line(ID, "old"))).unwrap();
    fs::write(path.join("reddit-202101010000.txt"), format!("{}\n", line(OTHER_ID, "new"))).unwrap();

    let mut executor = TextExecutor::open(&path, false).unwrap();

    assert_eq!(executor.path().unwrap(), path.join("reddit-202101010000.txt"));
    assert!(executor.find(ID).unwrap().is_none());
    assert_eq!(executor.find(OTHER_ID).unwrap().unwrap().user_name, "new");

    executor.insert(&[line(ID, "appended")]).unwrap();
    assert_eq!(executor.find_all().unwrap().len(), 2);
}

#[test]
fn test_clean_slate_removes_only_output_files() {
    let (_temp, path) = setup_temp_storage();
    fs::write(path.join("reddit-202001010000.txt"), line(ID, "old")).unwrap();
    fs::write(path.join("notes.txt"), "keep me").unwrap();
    fs::write(path.join("reddit-latest.txt"), "keep me too").unwrap();

    let mut executor = TextExecutor::open(&path, true).unwrap();

    assert!(!path.join("reddit-202001010000.txt").exists());
    assert!(path.join("notes.txt").exists());
    assert!(path.join("reddit-latest.txt").exists());
    assert!(executor.find_all().unwrap().is_empty());
}

// =============================================================================
// Record Tests
// =============================================================================

#[test]
fn test_unreadable_lines_are_skipped() {
    let (_temp, path) = setup_temp_storage();
    let contents = format!("{}\nhalf;a;line\n{}\n", line(ID, "a"), line(OTHER_ID, "b"));
    fs::write(path.join("reddit-202201010000.txt"), contents).unwrap();

    let mut executor = TextExecutor::open(&path, false).unwrap();
    let records = executor.find_all().unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].unique_id, ID);
    assert_eq!(records[1].unique_id, OTHER_ID);
}

#[test]
fn test_insert_canonicalizes_ids() {
    let (_temp, path) = setup_temp_storage();
    let mut executor = TextExecutor::open(&path, true).unwrap();

    let ids = executor
        .insert(&[line("0F8FAD5B-D9CB-469F-A165-70867728950E", "alice")])
        .unwrap();

    assert_eq!(ids, vec![ID]);
    assert_eq!(executor.find(ID).unwrap().unwrap().user_name, "alice");
}

#[test]
fn test_update_and_delete_leave_no_temp_file() {
    let (_temp, path) = setup_temp_storage();
    let mut executor = TextExecutor::open(&path, true).unwrap();
    executor.insert(&[line(ID, "alice"), line(OTHER_ID, "bob")]).unwrap();

    let mut record = executor.find(ID).unwrap().unwrap();
    record.votes_number = "77".to_string();
    assert!(executor.update(&record, ID).unwrap());
    assert!(executor.delete(OTHER_ID).unwrap());

    let names: Vec<String> = fs::read_dir(&path)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names.len(), 1);
    assert!(!names[0].ends_with(".tmp"));

    let contents = fs::read_to_string(executor.path().unwrap()).unwrap();
    assert_eq!(contents, format!("{}\n", record.to_line()));
}

#[test]
fn test_delete_matches_whole_id() {
    let (_temp, path) = setup_temp_storage();
    let mut executor = TextExecutor::open(&path, true).unwrap();
    executor.insert(&[line(ID, "alice")]).unwrap();

    assert!(!executor.delete(&ID[..8]).unwrap());
    assert_eq!(executor.find_all().unwrap().len(), 1);
}
