//! Protocol primitives
//!
//! Methods, protocol versions and status codes shared by the request view
//! and the response builder.

use super::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Request method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
    Connect,
    Trace,
}

const METHOD_TOKENS: [(Method, &str); 9] = [
    (Method::Get, "GET"),
    (Method::Head, "HEAD"),
    (Method::Post, "POST"),
    (Method::Put, "PUT"),
    (Method::Patch, "PATCH"),
    (Method::Delete, "DELETE"),
    (Method::Options, "OPTIONS"),
    (Method::Connect, "CONNECT"),
    (Method::Trace, "TRACE"),
];

impl Method {
    /// The wire token, always upper case
    pub fn as_str(&self) -> &'static str {
        METHOD_TOKENS
            .iter()
            .find(|(method, _)| method == self)
            .map_or("", |(_, token)| *token)
    }

    /// GET and HEAD
    pub fn is_retrieval(&self) -> bool {
        matches!(self, Method::Get | Method::Head)
    }
}

/// Method tokens are case-sensitive on the wire, so `get` is rejected.
impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        METHOD_TOKENS
            .iter()
            .find(|(_, token)| *token == s)
            .map(|(method, _)| *method)
            .ok_or_else(|| Error::InvalidMethod(s.to_string()))
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Protocol version written in the status line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Version {
    Http10,
    #[default]
    Http11,
}

impl Version {
    pub fn as_str(&self) -> &'static str {
        match self {
            Version::Http10 => "HTTP/1.0",
            Version::Http11 => "HTTP/1.1",
        }
    }

    /// Whether `Transfer-Encoding: chunked` is available
    pub fn supports_chunked(&self) -> bool {
        *self == Version::Http11
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        [Version::Http10, Version::Http11]
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| Error::InvalidVersion(s.to_string()))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registered reason phrases, sorted by code
const REASON_PHRASES: &[(u16, &str)] = &[
    (100, "Continue"),
    (101, "Switching Protocols"),
    (103, "Early Hints"),
    (200, "OK"),
    (201, "Created"),
    (202, "Accepted"),
    (203, "Non-Authoritative Information"),
    (204, "No Content"),
    (205, "Reset Content"),
    (206, "Partial Content"),
    (300, "Multiple Choices"),
    (301, "Moved Permanently"),
    (302, "Found"),
    (303, "See Other"),
    (304, "Not Modified"),
    (307, "Temporary Redirect"),
    (308, "Permanent Redirect"),
    (400, "Bad Request"),
    (401, "Unauthorized"),
    (402, "Payment Required"),
    (403, "Forbidden"),
    (404, "Not Found"),
    (405, "Method Not Allowed"),
    (406, "Not Acceptable"),
    (407, "Proxy Authentication Required"),
    (408, "Request Timeout"),
    (409, "Conflict"),
    (410, "Gone"),
    (411, "Length Required"),
    (412, "Precondition Failed"),
    (413, "Content Too Large"),
    (414, "URI Too Long"),
    (415, "Unsupported Media Type"),
    (416, "Range Not Satisfiable"),
    (417, "Expectation Failed"),
    (422, "Unprocessable Content"),
    (426, "Upgrade Required"),
    (428, "Precondition Required"),
    (429, "Too Many Requests"),
    (431, "Request Header Fields Too Large"),
    (500, "Internal Server Error"),
    (501, "Not Implemented"),
    (502, "Bad Gateway"),
    (503, "Service Unavailable"),
    (504, "Gateway Timeout"),
    (505, "HTTP Version Not Supported"),
];

/// Response status code in 100..=599
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Status(u16);

impl Status {
    pub const OK: Status = Status(200);
    pub const NO_CONTENT: Status = Status(204);
    pub const PARTIAL_CONTENT: Status = Status(206);
    pub const FOUND: Status = Status(302);
    pub const SEE_OTHER: Status = Status(303);
    pub const NOT_MODIFIED: Status = Status(304);
    pub const UNAUTHORIZED: Status = Status(401);
    pub const NOT_FOUND: Status = Status(404);
    pub const METHOD_NOT_ALLOWED: Status = Status(405);
    pub const INTERNAL_SERVER_ERROR: Status = Status(500);

    /// Validate a numeric code
    pub fn new(code: u16) -> Result<Self> {
        if (100..=599).contains(&code) {
            Ok(Status(code))
        } else {
            Err(Error::InvalidStatus(format!(
                "{} is outside 100..=599",
                code
            )))
        }
    }

    pub fn code(&self) -> u16 {
        self.0
    }

    /// Canonical reason phrase, or "Unknown" for unregistered codes
    pub fn reason_phrase(&self) -> &'static str {
        REASON_PHRASES
            .binary_search_by_key(&self.0, |(code, _)| *code)
            .map_or("Unknown", |i| REASON_PHRASES[i].1)
    }

    fn class(&self) -> u16 {
        self.0 / 100
    }

    pub fn is_informational(&self) -> bool {
        self.class() == 1
    }

    pub fn is_success(&self) -> bool {
        self.class() == 2
    }

    pub fn is_redirection(&self) -> bool {
        self.class() == 3
    }

    pub fn is_client_error(&self) -> bool {
        self.class() == 4
    }

    pub fn is_server_error(&self) -> bool {
        self.class() == 5
    }

    /// Redirects that carry a `Location` target
    pub fn requires_location(&self) -> bool {
        matches!(self.0, 301 | 302 | 303 | 307 | 308)
    }

    /// 1xx, 204 and 304 never carry a body
    pub fn forbids_body(&self) -> bool {
        self.is_informational() || matches!(self.0, 204 | 304)
    }
}

impl Default for Status {
    fn default() -> Self {
        Status::OK
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.0, self.reason_phrase())
    }
}
