//! Response definitions
//!
//! ## Wire Format
//! ```text
//! HTTP/1.1 <code> <reason>\r\n
//! <Name>: <Value>\r\n          (zero or more, in insertion order)
//! \r\n
//! <body bytes>
//! ```
//! No chunked transfer encoding; a body is always sent whole.

use serde::Serialize;

use crate::error::Result;

use super::headers::Headers;
use super::status::StatusCode;

/// Content type of every JSON body
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// A response to send to the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: StatusCode,

    /// Overrides the standard reason phrase when set
    pub reason: Option<String>,

    pub headers: Headers,

    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            reason: None,
            headers: Headers::new(),
            body: Vec::new(),
        }
    }

    /// Response with a custom reason phrase and no body
    pub fn with_reason(status: StatusCode, reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
            ..Self::new(status)
        }
    }

    /// Set a JSON body with matching `Content-Type` and `Content-Length`
    pub fn json<T: Serialize + ?Sized>(self, value: &T) -> Result<Self> {
        let body = serde_json::to_vec(value)?;
        Ok(self.body(JSON_CONTENT_TYPE, body))
    }

    /// Set a raw body with matching `Content-Type` and `Content-Length`
    pub fn body(mut self, content_type: &str, body: Vec<u8>) -> Self {
        self.headers.set("Content-Type", content_type);
        self.headers.set("Content-Length", body.len().to_string());
        self.body = body;
        self
    }

    /// Reason phrase sent on the status line
    pub fn reason(&self) -> &str {
        self.reason
            .as_deref()
            .unwrap_or_else(|| self.status.reason_phrase())
    }

    /// Serialize to wire bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(64 + self.body.len());
        out.extend_from_slice(
            format!("HTTP/1.1 {} {}\r\n", self.status.as_u16(), self.reason()).as_bytes(),
        );
        for (name, value) in self.headers.iter() {
            out.extend_from_slice(format!("{}: {}\r\n", name, value).as_bytes());
        }
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&self.body);
        out
    }
}
