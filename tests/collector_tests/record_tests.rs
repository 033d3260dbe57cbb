//! Record Tests
//!
//! Tests for the delimited line format, id canonicalization and
//! validation of update bodies.

use postvault::record::{canonical_id, RecordPatch, ABSENT_FIELD, FIELD_NAMES};
use postvault::{Record, VaultError};

const ID: &str = "0f8fad5bd9cb469fa16570867728950e";
const HYPHENATED: &str = "0F8FAD5B-D9CB-469F-A165-70867728950E";

fn sample_line() -> String {
    format!(
        "{};https://www.reddit.com/r/funny/comments/x/;alice;1200;340;1540;2019-03-01;2024-05-02;17;250;funny",
        ID
    )
}

// =============================================================================
// Line Format Tests
// =============================================================================

#[test]
fn test_from_line_fills_every_field() {
    let record = Record::from_line(&sample_line()).unwrap();

    assert_eq!(record.unique_id, ID);
    assert_eq!(record.user_name, "alice");
    assert_eq!(record.comment_karma, "1200");
    assert_eq!(record.post_karma, "340");
    assert_eq!(record.total_karma, "1540");
    assert_eq!(record.user_cakeday, "2019-03-01");
    assert_eq!(record.post_date, "2024-05-02");
    assert_eq!(record.comments_number, "17");
    assert_eq!(record.votes_number, "250");
    assert_eq!(record.post_category, "funny");
}

#[test]
fn test_to_line_reproduces_input() {
    let line = sample_line();
    let record = Record::from_line(&format!("{}\r\n", line)).unwrap();
    assert_eq!(record.to_line(), line);
}

#[test]
fn test_wrong_field_count_is_rejected() {
    let result = Record::from_line("a;b;c");
    assert!(matches!(result, Err(VaultError::InvalidRecord(_))));

    let result = Record::from_line(&format!("{};extra", sample_line()));
    assert!(matches!(result, Err(VaultError::InvalidRecord(_))));
}

#[test]
fn test_values_follow_field_names() {
    let record = Record::from_line(&sample_line()).unwrap();
    let json = serde_json::to_value(&record).unwrap();

    for (name, value) in FIELD_NAMES.iter().zip(record.values()) {
        assert_eq!(json[*name], value);
    }
}

#[test]
fn test_json_keeps_field_order() {
    let record = Record::from_line(&sample_line()).unwrap();
    let json = serde_json::to_string(&record).unwrap();

    let positions: Vec<usize> = FIELD_NAMES
        .iter()
        .map(|name| json.find(&format!("\"{}\"", name)).unwrap())
        .collect();
    assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
}

// =============================================================================
// Id Tests
// =============================================================================

#[test]
fn test_canonical_id_accepts_both_spellings() {
    assert_eq!(canonical_id(ID).as_deref(), Some(ID));
    assert_eq!(canonical_id(HYPHENATED).as_deref(), Some(ID));
}

#[test]
fn test_canonical_id_rejects_garbage() {
    assert_eq!(canonical_id("abc123"), None);
    assert_eq!(canonical_id(""), None);
    assert_eq!(canonical_id("0f8fad5bd9cb469fa16570867728950"), None);
}

// =============================================================================
// Update Body Tests
// =============================================================================

#[test]
fn test_patch_with_matching_id() {
    let body = format!(r#"{{"unique_id": "{}", "post_category": "news"}}"#, HYPHENATED);
    let patch = RecordPatch::from_json(body.as_bytes(), ID).unwrap();

    assert_eq!(patch.len(), 2);
    assert_eq!(patch.get("post_category"), Some("news"));

    let record = patch.into_record(ID);
    assert_eq!(record.unique_id, ID);
    assert_eq!(record.post_category, "news");
    assert_eq!(record.user_name, ABSENT_FIELD);
}

#[test]
fn test_patch_rejects_mismatched_id() {
    let body = r#"{"unique_id": "7c9e6679742540de944be07fc1f90ae7"}"#;
    let result = RecordPatch::from_json(body.as_bytes(), ID);
    assert!(matches!(result, Err(VaultError::InvalidRecord(_))));
}

#[test]
fn test_patch_rejects_missing_id() {
    let result = RecordPatch::from_json(br#"{"post_category": "news"}"#, ID);
    assert!(matches!(result, Err(VaultError::InvalidRecord(_))));
}

#[test]
fn test_patch_rejects_unknown_field() {
    let body = format!(r#"{{"unique_id": "{}", "flair": "x"}}"#, ID);
    let result = RecordPatch::from_json(body.as_bytes(), ID);
    assert!(matches!(result, Err(VaultError::InvalidRecord(_))));
}

#[test]
fn test_patch_rejects_non_string_value() {
    let body = format!(r#"{{"unique_id": "{}", "votes_number": 12}}"#, ID);
    let result = RecordPatch::from_json(body.as_bytes(), ID);
    assert!(matches!(result, Err(VaultError::InvalidRecord(_))));
}

#[test]
fn test_patch_rejects_delimiter_in_value() {
    let body = format!(r#"{{"unique_id": "{}", "post_url": "a;b"}}"#, ID);
    let result = RecordPatch::from_json(body.as_bytes(), ID);
    assert!(matches!(result, Err(VaultError::InvalidRecord(_))));
}

#[test]
fn test_patch_rejects_non_object() {
    assert!(RecordPatch::from_json(b"[1, 2]", ID).is_err());
    assert!(matches!(
        RecordPatch::from_json(b"{not json", ID),
        Err(VaultError::Json(_))
    ));
}
