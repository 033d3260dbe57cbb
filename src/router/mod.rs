//! Router Module
//!
//! Maps a method and path to one CRUD operation. First match wins:
//!
//! | Method | Path | Route |
//! |---|---|---|
//! | POST | `/posts/` | ingest one pending record |
//! | POST | `/posts/remaining/` | ingest every pending record |
//! | GET | `/posts/` | list stored records |
//! | GET, PUT, DELETE | `/posts/{id}/` | read, replace or delete one record |
//!
//! Anything else, including an `{id}` that is not a 128-bit identifier,
//! resolves to a 404.

mod handler;

pub use handler::RequestHandler;

use crate::http::Method;
use crate::record::canonical_id;

/// Resolved request target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    IngestOne,
    IngestRemaining,
    ListPosts,

    /// Carries the canonical id
    GetPost(String),
    UpdatePost(String),
    DeletePost(String),

    /// `/posts/{id}/` with an id that does not parse
    InvalidId,

    NotFound,
}

impl Route {
    pub fn resolve(method: &Method, path: &str) -> Self {
        match (method, path) {
            (Method::Post, "/posts/") => return Route::IngestOne,
            (Method::Post, "/posts/remaining/") => return Route::IngestRemaining,
            (Method::Get, "/posts/") => return Route::ListPosts,
            _ => {}
        }

        let Some(raw_id) = single_post_id(path) else {
            return Route::NotFound;
        };
        if !matches!(method, Method::Get | Method::Put | Method::Delete) {
            return Route::NotFound;
        }
        let Some(id) = canonical_id(raw_id) else {
            return Route::InvalidId;
        };

        match method {
            Method::Get => Route::GetPost(id),
            Method::Put => Route::UpdatePost(id),
            _ => Route::DeletePost(id),
        }
    }

    /// Whether the handler reads a request body for this route
    pub fn needs_body(&self) -> bool {
        matches!(self, Route::UpdatePost(_))
    }
}

/// The `{id}` segment of `/posts/{id}/`
fn single_post_id(path: &str) -> Option<&str> {
    let id = path.strip_prefix("/posts/")?.strip_suffix('/')?;
    if id.is_empty() || id.contains('/') {
        None
    } else {
        Some(id)
    }
}
