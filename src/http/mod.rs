//! HTTP Module
//!
//! Minimal HTTP/1.1 framing: one request per connection, no keep-alive,
//! no chunked encoding. Owns no business logic.
//!
//! ## Request Flow
//! ```text
//! bytes ──► read_request_head ──► RequestHead ──► (router) ──► read_body?
//!                                                                 │
//! bytes ◄── Response::to_bytes ◄── Response ◄─────────────────────┘
//! ```

mod codec;
mod headers;
mod request;
mod response;
mod status;

pub use codec::{read_body, read_request_head, BufferedReader, ByteSource, Limits};
pub use headers::Headers;
pub use request::{Method, RequestHead};
pub use response::{Response, JSON_CONTENT_TYPE};
pub use status::StatusCode;
