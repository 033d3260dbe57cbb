//! Tests for the document backend
//!
//! These tests verify:
//! - Posts reference a shared user document
//! - The retrieval pipeline joins users back onto posts
//! - A user goes away with its last post
//! - Journals survive a torn tail

use std::fs::OpenOptions;
use std::io::Write;

use postvault::storage::document::{Pipeline, FRAME_HEADER_SIZE};
use postvault::storage::{DocumentExecutor, StorageExecutor};
use tempfile::TempDir;

const ALICE_1: &str = "0f8fad5bd9cb469fa16570867728950e";
const ALICE_2: &str = "7c9e6679742540de944be07fc1f90ae7";
const BOB_1: &str = "16fd27068baf433b82eb8c7fada847da";

// =============================================================================
// Helper Functions
// =============================================================================

fn line(id: &str, user: &str) -> String {
    format!(
        "{};https://www.reddit.com/r/gaming/comments/{}/;{};3;4;7;2016-10-10;2024-07-07;8;9;gaming",
        id, id, user
    )
}

fn seeded(temp: &TempDir) -> DocumentExecutor {
    let mut executor = DocumentExecutor::open(temp.path(), true).unwrap();
    executor
        .insert(&[line(ALICE_1, "alice"), line(ALICE_2, "alice"), line(BOB_1, "bob")])
        .unwrap();
    executor
}

fn user_names(executor: &DocumentExecutor) -> Vec<String> {
    executor
        .list_users()
        .into_iter()
        .map(|user| user.user_name)
        .collect()
}

// =============================================================================
// Layout Tests
// =============================================================================

#[test]
fn test_posts_share_user_document() {
    let temp = TempDir::new().unwrap();
    let executor = seeded(&temp);

    assert_eq!(executor.posts().len(), 3);
    assert_eq!(executor.users().len(), 2);

    let first = executor.posts().get(ALICE_1).unwrap();
    let second = executor.posts().get(ALICE_2).unwrap();
    assert_eq!(first.user, second.user);
    assert_eq!(executor.users().get(&first.user).unwrap().user_name, "alice");
}

#[test]
fn test_journal_files() {
    let temp = TempDir::new().unwrap();
    let executor = seeded(&temp);

    assert_eq!(executor.posts().path(), temp.path().join("posts.journal"));
    assert_eq!(executor.users().path(), temp.path().join("users.journal"));
    assert_eq!(executor.posts().name(), "posts");
}

#[test]
fn test_user_removed_with_last_post() {
    let temp = TempDir::new().unwrap();
    let mut executor = seeded(&temp);

    assert!(executor.delete(ALICE_1).unwrap());
    assert_eq!(user_names(&executor), vec!["alice", "bob"]);

    assert!(executor.delete(ALICE_2).unwrap());
    assert_eq!(user_names(&executor), vec!["bob"]);
}

#[test]
fn test_rename_applies_to_all_posts() {
    let temp = TempDir::new().unwrap();
    let mut executor = seeded(&temp);

    let mut record = executor.find(ALICE_2).unwrap().unwrap();
    record.user_name = "alicia".to_string();
    assert!(executor.update(&record, ALICE_2).unwrap());

    assert_eq!(executor.find(ALICE_1).unwrap().unwrap().user_name, "alicia");
    assert_eq!(user_names(&executor), vec!["alicia", "bob"]);

    // The new name is reused by later inserts
    executor
        .insert(&[line("a3bb189e8bf938889912ace4e6543002", "alicia")])
        .unwrap();
    assert_eq!(executor.users().len(), 2);
}

#[test]
fn test_rename_onto_existing_user_fails() {
    let temp = TempDir::new().unwrap();
    let mut executor = seeded(&temp);

    let mut record = executor.find(ALICE_1).unwrap().unwrap();
    record.user_name = "bob".to_string();

    assert!(!executor.update(&record, ALICE_1).unwrap());
    assert_eq!(executor.find(ALICE_1).unwrap().unwrap().user_name, "alice");
}

// =============================================================================
// Pipeline Tests
// =============================================================================

#[test]
fn test_pipeline_projects_full_records() {
    let temp = TempDir::new().unwrap();
    let executor = seeded(&temp);

    let records = Pipeline::retrieve(None).run(executor.posts(), executor.users());
    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|record| record.total_karma == "7"));

    let one = Pipeline::retrieve(Some(BOB_1)).run(executor.posts(), executor.users());
    assert_eq!(one.len(), 1);
    assert_eq!(one[0].user_name, "bob");
}

// =============================================================================
// Recovery Tests
// =============================================================================

#[test]
fn test_reopen_replays_journals() {
    let temp = TempDir::new().unwrap();
    {
        let mut executor = seeded(&temp);
        executor.delete(BOB_1).unwrap();
    }

    let mut executor = DocumentExecutor::open(temp.path(), false).unwrap();
    assert_eq!(executor.find_all().unwrap().len(), 2);
    assert_eq!(user_names(&executor), vec!["alice"]);
    assert_eq!(executor.posts().replay_report().entries, 4);
    assert_eq!(executor.posts().replay_report().discarded_bytes, 0);
}

#[test]
fn test_torn_journal_tail_is_discarded() {
    let temp = TempDir::new().unwrap();
    drop(seeded(&temp));

    // Simulate a crash halfway through writing a frame header
    let journal = temp.path().join("posts.journal");
    let mut file = OpenOptions::new().append(true).open(&journal).unwrap();
    file.write_all(&[0x40, 0x00, 0x00]).unwrap();
    drop(file);
    let torn_len = std::fs::metadata(&journal).unwrap().len();

    let mut executor = DocumentExecutor::open(temp.path(), false).unwrap();
    let report = executor.posts().replay_report();
    assert_eq!(report.entries, 3);
    assert_eq!(report.discarded_bytes, 3);
    assert_eq!(std::fs::metadata(&journal).unwrap().len(), torn_len - 3);
    assert_eq!(executor.find_all().unwrap().len(), 3);

    // Appends continue after the last good frame
    executor
        .insert(&[line("a3bb189e8bf938889912ace4e6543002", "carol")])
        .unwrap();
    drop(executor);

    let mut reopened = DocumentExecutor::open(temp.path(), false).unwrap();
    assert_eq!(reopened.posts().replay_report().discarded_bytes, 0);
    assert_eq!(reopened.find_all().unwrap().len(), 4);
}

#[test]
fn test_corrupt_payload_is_discarded() {
    let temp = TempDir::new().unwrap();
    drop(seeded(&temp));

    // A full-length frame whose checksum does not match
    let journal = temp.path().join("posts.journal");
    let mut frame = vec![0u8; FRAME_HEADER_SIZE + 4];
    frame[0] = 4;
    frame[4] = 0xde;
    frame[FRAME_HEADER_SIZE..].copy_from_slice(b"junk");
    let mut file = OpenOptions::new().append(true).open(&journal).unwrap();
    file.write_all(&frame).unwrap();
    drop(file);

    let executor = DocumentExecutor::open(temp.path(), false).unwrap();
    assert_eq!(
        executor.posts().replay_report().discarded_bytes,
        frame.len() as u64
    );
    assert_eq!(executor.posts().len(), 3);
}
