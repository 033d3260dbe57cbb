//! Request head
//!
//! Everything up to the blank line that ends the header block. The body
//! is not part of the head; it is read separately, and only for routes
//! that need it.
//!
//! ## Format
//! ```text
//! PUT /posts/6f1c...e2/ HTTP/1.1\r\n
//! Host: reddit-scraper:8087\r\n
//! Content-Length: 312\r\n
//! \r\n
//! ```

use std::fmt;

use crate::error::{Result, VaultError};

use super::headers::Headers;

/// Request method
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,

    /// Any other token; never routed
    Other(String),
}

impl Method {
    /// Parse a method token (case-sensitive, as on the wire)
    pub fn parse(token: &str) -> Self {
        match token {
            "GET" => Method::Get,
            "POST" => Method::Post,
            "PUT" => Method::Put,
            "DELETE" => Method::Delete,
            other => Method::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Other(token) => token,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsed request line and headers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    pub method: Method,

    /// Request target exactly as sent
    pub target: String,

    pub version: String,

    pub headers: Headers,
}

impl RequestHead {
    /// Parse a request line already stripped of its terminator
    ///
    /// The line must split into exactly three whitespace-separated tokens.
    pub fn from_request_line(line: &str) -> Result<Self> {
        let mut tokens = line.split_whitespace();
        match (tokens.next(), tokens.next(), tokens.next(), tokens.next()) {
            (Some(method), Some(target), Some(version), None) => Ok(Self {
                method: Method::parse(method),
                target: target.to_string(),
                version: version.to_string(),
                headers: Headers::new(),
            }),
            _ => Err(VaultError::MalformedRequestLine(line.to_string())),
        }
    }

    /// Path component of the target
    ///
    /// Drops the query and fragment, and the scheme and authority of an
    /// absolute-form target.
    pub fn path(&self) -> &str {
        let mut target = self.target.as_str();

        if let Some(scheme_end) = target.find("://") {
            let authority_and_path = &target[scheme_end + 3..];
            target = match authority_and_path.find('/') {
                Some(slash) => &authority_and_path[slash..],
                None => "/",
            };
        }

        let end = target.find(['?', '#']).unwrap_or(target.len());
        &target[..end]
    }

    /// Declared body length, if any
    pub fn content_length(&self) -> Result<Option<usize>> {
        match self.headers.get("Content-Length") {
            None => Ok(None),
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .map(Some)
                .map_err(|_| VaultError::InvalidContentLength(raw.to_string())),
        }
    }

    /// Require `Host` to name this server, optionally with its port
    pub fn validate_host(&self, server_name: &str, port: u16) -> Result<()> {
        let host = self.headers.get("Host").map(str::trim);
        let accepted = match host {
            Some(host) => {
                host == server_name
                    || host
                        .strip_prefix(server_name)
                        .and_then(|rest| rest.strip_prefix(':'))
                        .is_some_and(|rest| rest == port.to_string())
            }
            None => false,
        };

        if accepted {
            Ok(())
        } else {
            Err(VaultError::HostMismatch(host.map(str::to_string)))
        }
    }
}
