//! Retrieval pipeline
//!
//! Posts only hold a reference to their user. Reading them back for the API
//! runs a fixed aggregation that joins the user in and flattens it onto the
//! post:
//!
//! ```text
//! posts ─► [match _id] ─► lookup users by `user` ─► unwind ─► project ─► Record
//! ```
//!
//! A post whose user cannot be found is dropped by the unwind stage.

use crate::record::Record;

use super::collection::Collection;
use super::{PostDocument, UserDocument};

/// One aggregation stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    /// Keep the post with this `_id`
    Match(String),

    /// Attach every user whose `_id` equals the post's `user`
    LookupUser,

    /// One row per attached user; rows without one are dropped
    Unwind,
}

/// Intermediate row flowing between stages
#[derive(Debug, Clone)]
struct Row<'a> {
    post: &'a PostDocument,
    users: Vec<&'a UserDocument>,
}

/// Ordered list of stages, always ending in the record projection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    /// Pipeline for one post (`Some(id)`) or every post
    pub fn retrieve(id: Option<&str>) -> Self {
        let mut stages = Vec::with_capacity(3);
        if let Some(id) = id {
            stages.push(Stage::Match(id.to_string()));
        }
        stages.push(Stage::LookupUser);
        stages.push(Stage::Unwind);
        Self { stages }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Run against the two collections
    pub fn run(
        &self,
        posts: &Collection<PostDocument>,
        users: &Collection<UserDocument>,
    ) -> Vec<Record> {
        let mut rows: Vec<Row<'_>> = posts
            .iter()
            .map(|post| Row {
                post,
                users: Vec::new(),
            })
            .collect();

        for stage in &self.stages {
            rows = match stage {
                Stage::Match(id) => rows.into_iter().filter(|row| &row.post.id == id).collect(),
                Stage::LookupUser => rows
                    .into_iter()
                    .map(|mut row| {
                        row.users.extend(users.get(&row.post.user));
                        row
                    })
                    .collect(),
                Stage::Unwind => rows
                    .into_iter()
                    .flat_map(|row| {
                        let post = row.post;
                        row.users.into_iter().map(move |user| Row {
                            post,
                            users: vec![user],
                        })
                    })
                    .collect(),
            };
        }

        rows.into_iter()
            .filter_map(|row| row.users.first().map(|user| project(row.post, user)))
            .collect()
    }
}

/// Flatten a post and its user into the API shape
fn project(post: &PostDocument, user: &UserDocument) -> Record {
    Record {
        unique_id: post.id.clone(),
        post_url: post.post_url.clone(),
        user_name: user.user_name.clone(),
        comment_karma: user.comment_karma.clone(),
        post_karma: user.post_karma.clone(),
        total_karma: user.total_karma.clone(),
        user_cakeday: user.user_cakeday.clone(),
        post_date: post.post_date.clone(),
        comments_number: post.comments_number.clone(),
        votes_number: post.votes_number.clone(),
        post_category: post.post_category.clone(),
    }
}
