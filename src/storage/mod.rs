//! Storage Module
//!
//! One contract, three interchangeable backends.
//!
//! ## Contract
//! - `insert(lines)`: N valid records in, N distinct ids out; a record that
//!   fails to store is logged and skipped, the rest still go in
//! - `find(id)` / `find_all()`: one record, or every stored record in
//!   backend-native order
//! - `update(record, id)`: full replace of the addressed record
//! - `delete(id)`: removes exactly one post; its user goes too when that
//!   was the user's last post
//!
//! ## Layout per Backend
//! ```text
//! text       {target_dir}/reddit-YYYYMMDDHHMM.txt   one line per record
//!
//! sql        users(user_name PK, karma.., cakeday)
//!              ▲
//!              └── posts(unique_id PK, url, date, category, .., user_name FK)
//!
//! document   {target_dir}/documents/users.journal   {_id, user_name, ..}
//!              ▲
//!              └── documents/posts.journal          {_id, .., user: users._id}
//! ```
//!
//! Ids are stored in canonical simple form (32 lowercase hex digits), so a
//! lookup by the canonical form of any accepted spelling finds the record.

pub mod document;
mod sql;
mod text;

pub use document::DocumentExecutor;
pub use sql::SqlExecutor;
pub use text::TextExecutor;

use serde::{Deserialize, Serialize};

use crate::config::{Backend, Config};
use crate::error::{Result, VaultError};
use crate::record::{canonical_id, Record};

/// Author profile shared by every post of one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub user_name: String,
    pub comment_karma: String,
    pub post_karma: String,
    pub total_karma: String,
    pub user_cakeday: String,
}

impl User {
    /// Profile fields of a record
    pub fn from_record(record: &Record) -> Self {
        Self {
            user_name: record.user_name.clone(),
            comment_karma: record.comment_karma.clone(),
            post_karma: record.post_karma.clone(),
            total_karma: record.total_karma.clone(),
            user_cakeday: record.user_cakeday.clone(),
        }
    }
}

/// CRUD over stored records
///
/// Every backend owns its connection or file handles for its whole
/// lifetime; the server holds exactly one executor.
pub trait StorageExecutor {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Store every valid line and return the ids actually stored, in order
    fn insert(&mut self, lines: &[String]) -> Result<Vec<String>>;

    /// Store a single line
    fn insert_one(&mut self, line: &str) -> Result<Option<String>> {
        Ok(self.insert(&[line.to_string()])?.into_iter().next())
    }

    /// Record stored under `id`
    fn find(&mut self, id: &str) -> Result<Option<Record>>;

    /// Every stored record
    fn find_all(&mut self) -> Result<Vec<Record>>;

    /// Replace the record stored under `id`; `false` if there is none
    fn update(&mut self, record: &Record, id: &str) -> Result<bool>;

    /// Remove the record stored under `id`; `false` if there is none
    fn delete(&mut self, id: &str) -> Result<bool>;
}

/// Open the backend selected by `config`
pub fn open_executor(config: &Config) -> Result<Box<dyn StorageExecutor>> {
    let executor: Box<dyn StorageExecutor> = match config.backend {
        Backend::Text => Box::new(TextExecutor::open(&config.target_dir, config.clean_slate)?),
        Backend::Sql => {
            std::fs::create_dir_all(&config.target_dir)?;
            Box::new(SqlExecutor::open(&config.sqlite_url(), config.clean_slate)?)
        }
        Backend::Document => Box::new(DocumentExecutor::open(
            &config.document_dir(),
            config.clean_slate,
        )?),
    };

    tracing::info!(
        "Storage backend '{}' ready (clean slate: {})",
        executor.name(),
        config.clean_slate
    );
    Ok(executor)
}

/// Parse a collector line into a record
///
/// Ids that parse as 128-bit ids are stored in canonical form; any other
/// non-empty id is stored as given.
pub(crate) fn parse_line(line: &str) -> Result<Record> {
    let mut record = Record::from_line(line)?;
    if record.unique_id.is_empty() {
        return Err(VaultError::InvalidRecord("empty unique_id".to_string()));
    }
    if let Some(id) = canonical_id(&record.unique_id) {
        record.unique_id = id;
    }
    Ok(record)
}
