//! Document backend
//!
//! An embedded document store with two collections:
//! - `users`: one document per distinct `user_name`, keyed by a generated id
//! - `posts`: one document per record, keyed by the record id, with `user`
//!   holding the `_id` of its user document
//!
//! Reads go through the [`Pipeline`] that joins the user back onto the post.

mod collection;
mod pipeline;

pub use collection::{Collection, Document, ReplayReport, FRAME_HEADER_SIZE};
pub use pipeline::{Pipeline, Stage};

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, VaultError};
use crate::record::Record;

use super::{parse_line, StorageExecutor, User};

const POSTS: &str = "posts";
const USERS: &str = "users";

/// Stored form of a post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub post_url: String,
    pub post_date: String,
    pub post_category: String,
    pub comments_number: String,
    pub votes_number: String,

    /// `_id` of the author's user document
    pub user: String,
}

impl PostDocument {
    fn from_record(record: &Record, user: &str) -> Self {
        Self {
            id: record.unique_id.clone(),
            post_url: record.post_url.clone(),
            post_date: record.post_date.clone(),
            post_category: record.post_category.clone(),
            comments_number: record.comments_number.clone(),
            votes_number: record.votes_number.clone(),
            user: user.to_string(),
        }
    }
}

impl Document for PostDocument {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Stored form of a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_name: String,
    pub comment_karma: String,
    pub post_karma: String,
    pub total_karma: String,
    pub user_cakeday: String,
}

impl UserDocument {
    fn from_record(record: &Record, id: &str) -> Self {
        Self {
            id: id.to_string(),
            user_name: record.user_name.clone(),
            comment_karma: record.comment_karma.clone(),
            post_karma: record.post_karma.clone(),
            total_karma: record.total_karma.clone(),
            user_cakeday: record.user_cakeday.clone(),
        }
    }
}

impl Document for UserDocument {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Document-store storage executor
pub struct DocumentExecutor {
    posts: Collection<PostDocument>,
    users: Collection<UserDocument>,

    /// `user_name` → user `_id`, rebuilt on open
    user_ids: HashMap<String, String>,
}

impl DocumentExecutor {
    /// Open both collections under `dir`
    ///
    /// With `clean_slate`, both collections are dropped first.
    pub fn open(dir: &Path, clean_slate: bool) -> Result<Self> {
        let posts = Collection::open(dir, POSTS, clean_slate)?;
        let users = Collection::<UserDocument>::open(dir, USERS, clean_slate)?;

        let user_ids = users
            .iter()
            .map(|user| (user.user_name.clone(), user.id.clone()))
            .collect();

        Ok(Self {
            posts,
            users,
            user_ids,
        })
    }

    /// Every user document, ordered by name
    pub fn list_users(&self) -> Vec<User> {
        let mut users: Vec<User> = self
            .users
            .iter()
            .map(|doc| User {
                user_name: doc.user_name.clone(),
                comment_karma: doc.comment_karma.clone(),
                post_karma: doc.post_karma.clone(),
                total_karma: doc.total_karma.clone(),
                user_cakeday: doc.user_cakeday.clone(),
            })
            .collect();
        users.sort_by(|a, b| a.user_name.cmp(&b.user_name));
        users
    }

    pub fn posts(&self) -> &Collection<PostDocument> {
        &self.posts
    }

    pub fn users(&self) -> &Collection<UserDocument> {
        &self.users
    }

    fn insert_record(&mut self, record: &Record) -> Result<String> {
        if self.posts.get(&record.unique_id).is_some() {
            return Err(VaultError::DuplicateKey {
                collection: POSTS.to_string(),
                key: record.unique_id.clone(),
            });
        }

        // An existing user is reused as is, like an insert that ignores conflicts
        let user_id = match self.user_ids.get(&record.user_name) {
            Some(id) => id.clone(),
            None => {
                let id = Uuid::new_v4().simple().to_string();
                self.users.insert(UserDocument::from_record(record, &id))?;
                self.user_ids.insert(record.user_name.clone(), id.clone());
                id
            }
        };

        self.posts
            .insert(PostDocument::from_record(record, &user_id))?;
        Ok(record.unique_id.clone())
    }

    fn posts_of(&self, user_id: &str) -> usize {
        self.posts.iter().filter(|post| post.user == user_id).count()
    }
}

impl StorageExecutor for DocumentExecutor {
    fn name(&self) -> &'static str {
        "document"
    }

    fn insert(&mut self, lines: &[String]) -> Result<Vec<String>> {
        let mut ids = Vec::with_capacity(lines.len());
        for line in lines {
            match parse_line(line).and_then(|record| self.insert_record(&record)) {
                Ok(id) => ids.push(id),
                Err(VaultError::Io(e)) => return Err(VaultError::Io(e)),
                Err(e) => tracing::warn!("Skipping record: {}", e),
            }
        }
        Ok(ids)
    }

    fn find(&mut self, id: &str) -> Result<Option<Record>> {
        Ok(Pipeline::retrieve(Some(id))
            .run(&self.posts, &self.users)
            .into_iter()
            .next())
    }

    fn find_all(&mut self) -> Result<Vec<Record>> {
        Ok(Pipeline::retrieve(None).run(&self.posts, &self.users))
    }

    fn update(&mut self, record: &Record, id: &str) -> Result<bool> {
        let Some(post) = self.posts.get(id) else {
            return Ok(false);
        };
        let user_id = post.user.clone();

        let Some(old_user) = self.users.get(&user_id) else {
            return Ok(false);
        };
        let old_name = old_user.user_name.clone();

        if record.user_name != old_name && self.user_ids.contains_key(&record.user_name) {
            tracing::warn!(
                "Update of {} rejected: user {} already exists",
                id,
                record.user_name
            );
            return Ok(false);
        }

        // The user document is shared, so a rename applies to all its posts
        self.users
            .replace(UserDocument::from_record(record, &user_id))?;
        if record.user_name != old_name {
            self.user_ids.remove(&old_name);
            self.user_ids.insert(record.user_name.clone(), user_id.clone());
        }

        let mut post = PostDocument::from_record(record, &user_id);
        post.id = id.to_string();
        self.posts.replace(post)
    }

    fn delete(&mut self, id: &str) -> Result<bool> {
        let Some(post) = self.posts.remove(id)? else {
            return Ok(false);
        };

        if self.posts_of(&post.user) == 0 {
            if let Some(user) = self.users.remove(&post.user)? {
                self.user_ids.remove(&user.user_name);
                tracing::debug!("Removed user {} with its last post", user.user_name);
            }
        }
        Ok(true)
    }
}
