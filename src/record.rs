//! Record Model
//!
//! A record is one fully-populated scraped post: eleven canonical fields
//! in a fixed order. On the wire it is a JSON object; in the text backend
//! and in the collector it is a single delimited line.
//!
//! ## Line Format
//! ```text
//! unique_id;post_url;user_name;comment_karma;post_karma;total_karma;user_cakeday;post_date;comments_number;votes_number;post_category
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, VaultError};

/// Field separator used in the line format
pub const DELIMITER: char = ';';

/// Stored in place of fields a PUT body leaves out
pub const ABSENT_FIELD: &str = "[DELETED]";

/// Canonical field names, in storage order
pub const FIELD_NAMES: [&str; 11] = [
    "unique_id",
    "post_url",
    "user_name",
    "comment_karma",
    "post_karma",
    "total_karma",
    "user_cakeday",
    "post_date",
    "comments_number",
    "votes_number",
    "post_category",
];

/// One scraped post with its author's profile fields
///
/// Field order matches [`FIELD_NAMES`]; JSON output preserves it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Record {
    pub unique_id: String,
    pub post_url: String,
    pub user_name: String,
    pub comment_karma: String,
    pub post_karma: String,
    pub total_karma: String,
    pub user_cakeday: String,
    pub post_date: String,
    pub comments_number: String,
    pub votes_number: String,
    pub post_category: String,
}

impl Record {
    /// Parse a delimited line (a trailing line terminator is ignored)
    pub fn from_line(line: &str) -> Result<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        let values: Vec<&str> = line.split(DELIMITER).collect();

        if values.len() != FIELD_NAMES.len() {
            return Err(VaultError::InvalidRecord(format!(
                "expected {} fields, got {}",
                FIELD_NAMES.len(),
                values.len()
            )));
        }

        Ok(Self::from_values(values.iter().map(|v| v.to_string())))
    }

    /// Render as a delimited line, without terminator
    pub fn to_line(&self) -> String {
        self.values().join(DELIMITER.to_string().as_str())
    }

    /// Field values in canonical order
    pub fn values(&self) -> [&str; 11] {
        [
            &self.unique_id,
            &self.post_url,
            &self.user_name,
            &self.comment_karma,
            &self.post_karma,
            &self.total_karma,
            &self.user_cakeday,
            &self.post_date,
            &self.comments_number,
            &self.votes_number,
            &self.post_category,
        ]
    }

    /// Build from values in canonical order; missing trailing values are empty
    fn from_values(values: impl IntoIterator<Item = String>) -> Self {
        let mut it = values.into_iter();
        let mut next = || it.next().unwrap_or_default();
        Self {
            unique_id: next(),
            post_url: next(),
            user_name: next(),
            comment_karma: next(),
            post_karma: next(),
            total_karma: next(),
            user_cakeday: next(),
            post_date: next(),
            comments_number: next(),
            votes_number: next(),
            post_category: next(),
        }
    }
}

/// Parse a simple or hyphenated 128-bit id and return its canonical
/// simple form (32 lowercase hex digits).
pub fn canonical_id(raw: &str) -> Option<String> {
    Uuid::parse_str(raw).ok().map(|id| id.simple().to_string())
}

// =============================================================================
// Update Bodies
// =============================================================================

/// A validated PUT body: a subset of the canonical fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordPatch {
    fields: HashMap<&'static str, String>,
}

impl RecordPatch {
    /// Validate a JSON body against the id taken from the request path
    ///
    /// Rejects anything that is not an object of string values keyed by
    /// canonical field names, whose `unique_id` does not denote the same
    /// 128-bit id as `path_id`, or whose values would break the line format.
    pub fn from_json(body: &[u8], path_id: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_slice(body)?;
        let object = value
            .as_object()
            .ok_or_else(|| VaultError::InvalidRecord("body is not a JSON object".to_string()))?;

        if object.len() > FIELD_NAMES.len() {
            return Err(VaultError::InvalidRecord(format!(
                "{} keys given, at most {} allowed",
                object.len(),
                FIELD_NAMES.len()
            )));
        }

        let mut fields = HashMap::with_capacity(object.len());
        for (key, value) in object {
            let name = FIELD_NAMES
                .iter()
                .find(|name| **name == key.as_str())
                .ok_or_else(|| VaultError::InvalidRecord(format!("unknown field {key:?}")))?;
            let text = value
                .as_str()
                .ok_or_else(|| VaultError::InvalidRecord(format!("field {key:?} is not a string")))?;
            if text.contains([DELIMITER, '\n', '\r']) {
                return Err(VaultError::InvalidRecord(format!(
                    "field {key:?} contains a reserved character"
                )));
            }
            fields.insert(*name, text.to_string());
        }

        let body_id = fields
            .get("unique_id")
            .and_then(|id| canonical_id(id))
            .ok_or_else(|| VaultError::InvalidRecord("missing or malformed unique_id".to_string()))?;
        if Some(body_id) != canonical_id(path_id) {
            return Err(VaultError::InvalidRecord(
                "unique_id does not match the request path".to_string(),
            ));
        }

        Ok(Self { fields })
    }

    /// Get a field value if present in the body
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Number of fields given
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Build the full replacement record stored under `id`
    ///
    /// Absent fields become [`ABSENT_FIELD`]; `unique_id` is always `id`.
    pub fn into_record(mut self, id: &str) -> Record {
        let mut record = Record::from_values(FIELD_NAMES.iter().map(|name| {
            self.fields
                .remove(*name)
                .unwrap_or_else(|| ABSENT_FIELD.to_string())
        }));
        record.unique_id = id.to_string();
        record
    }
}
