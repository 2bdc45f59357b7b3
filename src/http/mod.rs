//! HTTP request/response abstraction
//!
//! This module provides the two halves of a single HTTP exchange:
//!
//! - [`RequestView`] is the read-only surface over an inbound message
//!   (headers, items, cookies, files, body, client address, negotiation).
//! - [`ResponseBuilder`] is the fluent surface over the outbound message
//!   (status, headers, content, streams, downloads, validation, send).
//!
//! Responses are written through the same session operations abstraction
//! used for plain TCP or any other `io::Write`, or intercepted entirely with
//! [`ResponseBuilder::send_with`].
//!
//! # Examples
//!
//! ```no_run
//! use http_facade::http::{HttpRequest, Method, RequestView, ResponseBuilder};
//! use http_facade::http::session::from_tcp_stream;
//! use std::net::TcpStream;
//!
//! let request = HttpRequest::builder()
//!     .method(Method::Get)
//!     .uri("/report?format=csv")
//!     .header("Accept", "text/csv, */*;q=0.1")
//!     .build();
//!
//! let response = request
//!     .abort(Some("report generation failed"))
//!     .with_header("Retry-After", &["120"]);
//!
//! let stream = TcpStream::connect("127.0.0.1:8080").unwrap();
//! let mut session = from_tcp_stream(stream);
//! response.send(&mut session).unwrap();
//! ```

pub mod body;
pub mod chunked;
pub mod config;
pub mod cookies;
pub mod headers;
pub mod items;
pub mod message;
pub mod negotiate;
pub mod proxy;
pub mod request;
pub mod response;
pub mod session;
pub mod upload;
pub mod validity;

pub use body::{BodyStream, RateLimit, Throttle};
pub use config::{ProxyConfig, TransferConfig};
pub use headers::Headers;
pub use items::{Item, Items};
pub use message::{Method, Status, Version};
pub use request::{HttpRequest, HttpRequestBuilder, RequestView};
pub use response::{Content, HttpResponse, ResponseBuilder, Snapshot};
pub use session::{HttpSession, SessionOps};
pub use upload::UploadedFile;
pub use url::Url;
pub use validity::Violation;

/// Result type for HTTP operations
pub type Result<T> = std::result::Result<T, Error>;

/// HTTP operation errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid HTTP version: {0}")]
    InvalidVersion(String),

    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(String),

    #[error("Invalid HTTP status: {0}")]
    InvalidStatus(String),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Malformed multipart body: {0}")]
    Multipart(String),

    #[error("Timeout")]
    Timeout,

    #[error("Connection closed")]
    ConnectionClosed,
}

/// Maximum number of headers per message
pub const MAX_HEADERS: usize = 100;

/// CRLF line ending
pub const CRLF: &str = "\r\n";
