//! Outbound response builder
//!
//! [`ResponseBuilder`] is the fluent contract over one outbound HTTP message
//! and [`HttpResponse`] its implementation. Every mutator consumes the
//! response and returns it, so calls chain:
//!
//! ```
//! use http_facade::http::{HttpResponse, ResponseBuilder, Status};
//!
//! let response = HttpResponse::new(Status::OK)
//!     .with_header("Cache-Control", &["no-store"])
//!     .with_content_mime_type("application/json")
//!     .with_content("{\"ok\":true}");
//!
//! let status = response.send_with(|snapshot| snapshot.status);
//! assert_eq!(status, Status::OK);
//! ```
//!
//! Sending consumes the response, so a response can be sent at most once.

use super::body::{BodyStream, Throttle};
use super::chunked::ChunkedEncoder;
use super::config::TransferConfig;
use super::headers::{header_param, media_type};
use super::request::{HttpRequest, RequestView};
use super::session::{from_writer, HttpSession, SessionOps};
use super::validity::{self, ResponseFacts, Violation};
use super::{Error, Headers, Method, Result, Status, Version, CRLF};
use std::fmt;
use std::io::{self, Read};
use std::sync::{Arc, Weak};

/// Fluent build and send contract over an outbound HTTP message
pub trait ResponseBuilder: Sized {
    type Request;

    /// Remember `request` for validation, without owning it
    fn follows(self, request: &Arc<Self::Request>) -> Self;

    /// Set the status code, rejecting codes outside 100..=599
    fn with_status_code(self, code: u16) -> Result<Self>;

    /// Override the reason phrase
    fn with_message(self, message: impl Into<String>) -> Self;

    /// Append each value to `field`; repeated calls accumulate
    fn with_header(self, field: &str, values: &[&str]) -> Self;

    /// Like [`with_header`](Self::with_header), unless `field` already has a value
    fn with_header_if(self, field: &str, values: &[&str]) -> Self;

    fn with_content_mime_type(self, mime_type: &str) -> Self;

    /// Set the MIME type unless one is already set
    fn with_content_mime_type_if(self, mime_type: &str) -> Self;

    fn with_content_charset(self, charset: &str) -> Self;

    /// Set the charset unless one is already set
    fn with_content_charset_if(self, charset: &str) -> Self;

    /// Use `text` as the body, dropping any stream
    fn with_content(self, text: impl Into<String>) -> Self;

    /// Use `stream` as the body, dropping any text
    ///
    /// A forced MIME type replaces the current one unconditionally.
    fn with_body(self, stream: BodyStream, forced_mime_type: Option<&str>) -> Self;

    /// Send `stream` as a file download named `filename`
    ///
    /// `throttle` is called while the body is transferred, never before.
    fn force_download_of(
        self,
        stream: BodyStream,
        filename: &str,
        throttle: Option<Box<dyn Throttle>>,
    ) -> Self;

    /// True if no request is attached, else true iff no rule is violated
    fn is_valid(&self) -> bool;

    /// Write status line, headers and body to the session
    fn send<S: SessionOps>(self, session: &mut HttpSession<S>) -> Result<()>;

    /// Hand the response to `sender` instead of a transport
    ///
    /// `sender` runs exactly once and no transport I/O happens.
    fn send_with<F, R>(self, sender: F) -> R
    where
        F: FnOnce(Snapshot) -> R;
}

/// Response body
#[derive(Debug, Default)]
pub enum Content {
    #[default]
    Empty,
    Text(String),
    Stream(BodyStream),
}

impl Content {
    fn is_present(&self) -> bool {
        match self {
            Content::Empty => false,
            Content::Text(text) => !text.is_empty(),
            Content::Stream(_) => true,
        }
    }
}

/// What a `send_with` callback receives
#[derive(Debug)]
pub struct Snapshot {
    pub status: Status,
    pub message: String,
    pub headers: Headers,
    pub body: Option<BodyStream>,
}

/// An outbound HTTP response under construction
pub struct HttpResponse {
    status: Status,
    message: Option<String>,
    headers: Headers,
    content: Content,
    mime_type: Option<String>,
    charset: Option<String>,
    throttle: Option<Box<dyn Throttle>>,
    request: Option<Weak<HttpRequest>>,
    transfer: TransferConfig,
}

impl HttpResponse {
    /// Create a new HTTP response
    pub fn new(status: Status) -> Self {
        HttpResponse {
            status,
            message: None,
            headers: Headers::new(),
            content: Content::Empty,
            mime_type: None,
            charset: None,
            throttle: None,
            request: None,
            transfer: TransferConfig::default(),
        }
    }

    /// Set the status from an already validated value
    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    /// Remove every value of `field`
    pub fn without_header(mut self, field: &str) -> Self {
        self.headers.remove(field);
        self
    }

    pub fn with_transfer_config(mut self, config: TransferConfig) -> Self {
        self.transfer = config;
        self
    }

    /// Get the status code
    pub fn status(&self) -> Status {
        self.status
    }

    /// The reason phrase, defaulting to the canonical one for the status
    pub fn message(&self) -> &str {
        self.message
            .as_deref()
            .unwrap_or_else(|| self.status.reason_phrase())
    }

    /// Headers as set so far, without the derived content headers
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Text body, if the body is text
    pub fn content(&self) -> Option<&str> {
        match &self.content {
            Content::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Stream body, if the body is a stream
    pub fn stream(&self) -> Option<&BodyStream> {
        match &self.content {
            Content::Stream(stream) => Some(stream),
            _ => None,
        }
    }

    pub fn payload(&self) -> &Content {
        &self.content
    }

    pub fn content_mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    pub fn content_charset(&self) -> Option<&str> {
        self.charset.as_deref()
    }

    /// The followed request, if it is still alive
    pub fn request(&self) -> Option<Arc<HttpRequest>> {
        self.request.as_ref().and_then(Weak::upgrade)
    }

    /// Every rule the response breaks against its request
    pub fn violations(&self) -> Vec<Violation> {
        let Some(request) = self.request() else {
            return Vec::new();
        };

        let content_type = ContentType::resolve(
            self.mime_type.as_deref(),
            self.charset.as_deref(),
            &self.headers,
            &self.content,
            self.transfer.default_charset(),
        );
        let facts = ResponseFacts {
            status: self.status,
            headers: &self.headers,
            has_body: self.content.is_present(),
            mime_type: content_type.as_ref().map(|ct| ct.mime_type),
            charset: content_type.as_ref().and_then(|ct| ct.charset),
        };

        let violations = validity::check(&facts, &request);
        for violation in &violations {
            tracing::trace!(status = self.status.code(), %violation, "response violates request");
        }
        violations
    }

    /// Serialize the response into memory
    pub fn to_wire(self) -> Result<Vec<u8>> {
        let mut session = from_writer(Vec::new());
        self.send(&mut session)?;
        Ok(session.into_inner().into_inner())
    }

    /// Resolve the derived headers and the body that would be written
    fn prepare(self) -> Prepared {
        let HttpResponse {
            status,
            message,
            mut headers,
            content,
            mime_type,
            charset,
            throttle,
            request,
            transfer,
        } = self;

        let message = message.unwrap_or_else(|| status.reason_phrase().to_string());
        let head_only = request
            .as_ref()
            .and_then(Weak::upgrade)
            .is_some_and(|r| r.method() == Method::Head);

        let content_type = ContentType::resolve(
            mime_type.as_deref(),
            charset.as_deref(),
            &headers,
            &content,
            transfer.default_charset(),
        )
        .map(|ct| ct.header_value());
        if let Some(content_type) = content_type {
            headers.replace("Content-Type", content_type);
        }

        let mut framing = Framing::Length;
        let body = if status.forbids_body() {
            None
        } else {
            match content {
                Content::Empty => {
                    headers.replace("Content-Length", "0");
                    None
                }
                Content::Text(text) => {
                    headers.replace("Content-Length", text.len().to_string());
                    Some(BodyStream::from_bytes(text))
                }
                Content::Stream(stream) => {
                    match stream.len() {
                        Some(len) => headers.replace("Content-Length", len.to_string()),
                        None if transfer.version().supports_chunked() => {
                            headers.remove("Content-Length");
                            headers.replace("Transfer-Encoding", "chunked");
                            framing = Framing::Chunked;
                        }
                        None => {
                            headers.remove("Content-Length");
                            headers.replace("Connection", "close");
                            framing = Framing::Close;
                        }
                    }
                    Some(stream)
                }
            }
        };

        Prepared {
            version: transfer.version(),
            chunk_size: transfer.chunk_size(),
            status,
            message,
            headers,
            body: if head_only { None } else { body },
            throttle,
            framing,
        }
    }
}

impl ResponseBuilder for HttpResponse {
    type Request = HttpRequest;

    fn follows(mut self, request: &Arc<HttpRequest>) -> Self {
        self.request = Some(Arc::downgrade(request));
        self
    }

    fn with_status_code(mut self, code: u16) -> Result<Self> {
        self.status = Status::new(code)?;
        Ok(self)
    }

    fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    fn with_header(mut self, field: &str, values: &[&str]) -> Self {
        for value in values {
            self.headers.insert(field, *value);
        }
        self
    }

    fn with_header_if(self, field: &str, values: &[&str]) -> Self {
        if self.headers.contains(field) {
            self
        } else {
            self.with_header(field, values)
        }
    }

    fn with_content_mime_type(mut self, mime_type: &str) -> Self {
        self.mime_type = Some(mime_type.to_string());
        self
    }

    fn with_content_mime_type_if(self, mime_type: &str) -> Self {
        if self.mime_type.is_some() || self.headers.contains("Content-Type") {
            self
        } else {
            self.with_content_mime_type(mime_type)
        }
    }

    fn with_content_charset(mut self, charset: &str) -> Self {
        self.charset = Some(charset.to_string());
        self
    }

    fn with_content_charset_if(self, charset: &str) -> Self {
        let explicit = self
            .headers
            .get("Content-Type")
            .and_then(|ct| header_param(ct, "charset"))
            .is_some();
        if self.charset.is_some() || explicit {
            self
        } else {
            self.with_content_charset(charset)
        }
    }

    fn with_content(mut self, text: impl Into<String>) -> Self {
        self.content = Content::Text(text.into());
        self
    }

    fn with_body(mut self, stream: BodyStream, forced_mime_type: Option<&str>) -> Self {
        self.content = Content::Stream(stream);
        if let Some(mime_type) = forced_mime_type {
            self.mime_type = Some(mime_type.to_string());
        }
        self
    }

    fn force_download_of(
        mut self,
        stream: BodyStream,
        filename: &str,
        throttle: Option<Box<dyn Throttle>>,
    ) -> Self {
        self.charset = None;
        self.throttle = throttle;
        self.headers
            .replace("Content-Disposition", content_disposition(filename));
        self.headers.replace("Content-Description", "File Transfer");
        self.headers.replace("Content-Transfer-Encoding", "binary");
        self.headers.replace("Cache-Control", "must-revalidate");
        self.headers.replace("Pragma", "public");
        self.headers.replace("Expires", "0");
        self.with_body(stream, Some("application/octet-stream"))
    }

    fn is_valid(&self) -> bool {
        self.violations().is_empty()
    }

    fn send<S: SessionOps>(self, session: &mut HttpSession<S>) -> Result<()> {
        let prepared = self.prepare();
        prepared.headers.validate()?;
        if prepared.message.contains(['\r', '\n']) {
            return Err(Error::InvalidStatus(format!(
                "Reason phrase contains a line break: {:?}",
                prepared.message
            )));
        }

        let head = head_to_wire(
            prepared.version,
            prepared.status,
            &prepared.message,
            &prepared.headers,
        );
        session.write_all(&head)?;

        let Prepared {
            status,
            body,
            mut throttle,
            framing,
            chunk_size,
            ..
        } = prepared;

        let mut total = 0u64;
        if let Some(mut body) = body {
            let declared = body.len();
            let mut reader: Box<dyn Read + '_> = match declared {
                Some(len) => Box::new((&mut body).take(len)),
                None => Box::new(&mut body),
            };
            let mut buf = vec![0u8; chunk_size];
            let mut out = BodyWriter::new(session, framing);

            loop {
                let n = match reader.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => n,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e.into()),
                };

                out.write(&buf[..n])?;
                total += n as u64;
                tracing::trace!(chunk = n, total, "wrote body chunk");

                if let Some(throttle) = throttle.as_mut() {
                    throttle.on_transfer(n, total);
                }
            }

            out.finish()?;
            if let Some(len) = declared {
                if total != len {
                    return Err(Error::Io(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("body ended after {} of {} declared bytes", total, len),
                    )));
                }
            }
        }

        session.flush()?;
        tracing::debug!(
            status = status.code(),
            body_bytes = total,
            chunked = framing == Framing::Chunked,
            "response sent"
        );
        Ok(())
    }

    fn send_with<F, R>(self, sender: F) -> R
    where
        F: FnOnce(Snapshot) -> R,
    {
        let prepared = self.prepare();
        let body = match (prepared.body, prepared.throttle) {
            (Some(body), Some(throttle)) => Some(body.throttled(throttle)),
            (body, _) => body,
        };

        tracing::debug!(status = prepared.status.code(), "response intercepted");
        sender(Snapshot {
            status: prepared.status,
            message: prepared.message,
            headers: prepared.headers,
            body,
        })
    }
}

impl fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("message", &self.message())
            .field("headers", &self.headers)
            .field("content", &self.content)
            .field("mime_type", &self.mime_type)
            .field("charset", &self.charset)
            .field("throttled", &self.throttle.is_some())
            .field("follows", &self.request.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Framing {
    Length,
    Chunked,
    Close,
}

/// Body sink honoring the chosen framing
enum BodyWriter<'s, S: SessionOps> {
    Raw(&'s mut HttpSession<S>),
    Chunked(ChunkedEncoder<'s, S>),
}

impl<'s, S: SessionOps> BodyWriter<'s, S> {
    fn new(session: &'s mut HttpSession<S>, framing: Framing) -> Self {
        match framing {
            Framing::Chunked => BodyWriter::Chunked(ChunkedEncoder::new(session)),
            Framing::Length | Framing::Close => BodyWriter::Raw(session),
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        match self {
            BodyWriter::Raw(session) => session.write_all(data),
            BodyWriter::Chunked(encoder) => encoder.write_chunk(data),
        }
    }

    fn finish(self) -> Result<()> {
        if let BodyWriter::Chunked(encoder) = self {
            encoder.finish()?;
        }
        Ok(())
    }
}

struct Prepared {
    version: Version,
    chunk_size: usize,
    status: Status,
    message: String,
    headers: Headers,
    body: Option<BodyStream>,
    throttle: Option<Box<dyn Throttle>>,
    framing: Framing,
}

/// Media type and charset a response goes out with
struct ContentType<'a> {
    mime_type: &'a str,
    charset: Option<&'a str>,
    /// `Content-Type` header set by the caller
    explicit: Option<&'a str>,
}

impl<'a> ContentType<'a> {
    /// Pick the content type from the builder settings, then an explicit
    /// header, then the kind of content
    ///
    /// Untyped text is `text/plain` in the default charset and untyped
    /// streams are `application/octet-stream`. An empty body has none.
    fn resolve(
        mime_type: Option<&'a str>,
        charset: Option<&'a str>,
        headers: &'a Headers,
        content: &Content,
        default_charset: &'a str,
    ) -> Option<Self> {
        if let Some(mime_type) = mime_type {
            return Some(ContentType { mime_type, charset, explicit: None });
        }

        if let Some(explicit) = headers.get("Content-Type") {
            return Some(ContentType {
                mime_type: media_type(explicit),
                charset: header_param(explicit, "charset").or(charset),
                explicit: Some(explicit),
            });
        }

        match content {
            Content::Text(_) => Some(ContentType {
                mime_type: "text/plain",
                charset: Some(charset.unwrap_or(default_charset)),
                explicit: None,
            }),
            Content::Stream(_) => Some(ContentType {
                mime_type: "application/octet-stream",
                charset: None,
                explicit: None,
            }),
            Content::Empty => None,
        }
    }

    fn header_value(&self) -> String {
        match self.explicit {
            Some(explicit) if header_param(explicit, "charset").is_some() => explicit.to_string(),
            Some(explicit) => with_charset(explicit, self.charset),
            None => with_charset(self.mime_type, self.charset),
        }
    }
}

fn with_charset(content_type: &str, charset: Option<&str>) -> String {
    match charset {
        Some(charset) => format!("{}; charset={}", content_type, charset),
        None => content_type.to_string(),
    }
}

/// Status line, header block and the blank line ending it
fn head_to_wire(version: Version, status: Status, message: &str, headers: &Headers) -> Vec<u8> {
    let mut buf = Vec::new();

    buf.extend_from_slice(version.as_str().as_bytes());
    buf.push(b' ');
    buf.extend_from_slice(status.code().to_string().as_bytes());
    buf.push(b' ');
    buf.extend_from_slice(message.as_bytes());
    buf.extend_from_slice(CRLF.as_bytes());

    for (name, value) in headers.iter() {
        buf.extend_from_slice(name.as_bytes());
        buf.extend_from_slice(b": ");
        buf.extend_from_slice(value.as_bytes());
        buf.extend_from_slice(CRLF.as_bytes());
    }

    buf.extend_from_slice(CRLF.as_bytes());
    buf
}

/// `attachment` disposition with an ASCII fallback name and, for non-ASCII
/// names, an RFC 5987 `filename*`
fn content_disposition(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| if c.is_ascii() && !c.is_ascii_control() { c } else { '_' })
        .collect();
    let escaped = fallback.replace('\\', "\\\\").replace('"', "\\\"");
    let mut value = format!("attachment; filename=\"{}\"", escaped);

    if !filename.is_ascii() {
        value.push_str("; filename*=UTF-8''");
        for byte in filename.bytes() {
            if byte.is_ascii_alphanumeric() || b"!#$&+-.^_`|~".contains(&byte) {
                value.push(char::from(byte));
            } else {
                value.push_str(&format!("%{:02X}", byte));
            }
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{RequestView, MAX_HEADERS};
    use std::sync::Mutex;
    use tracing_test::traced_test;

    fn drain(body: Option<BodyStream>) -> Vec<u8> {
        body.map(|b| b.read_to_bytes().unwrap().to_vec())
            .unwrap_or_default()
    }

    #[test]
    fn test_defaults() {
        let response = HttpResponse::new(Status::OK);
        assert_eq!(response.status().code(), 200);
        assert_eq!(response.message(), "OK");
        assert!(response.headers().is_empty());
        assert!(response.content().is_none());
        assert!(response.stream().is_none());
        assert!(response.request().is_none());
    }

    #[test]
    fn test_status_and_message() {
        let response = HttpResponse::new(Status::OK).with_status_code(404).unwrap();
        assert_eq!(response.message(), "Not Found");

        let response = response.with_message("Gone Fishing");
        assert_eq!(response.status(), Status::NOT_FOUND);
        assert_eq!(response.message(), "Gone Fishing");

        assert!(matches!(
            HttpResponse::new(Status::OK).with_status_code(700),
            Err(Error::InvalidStatus(_))
        ));
    }

    #[test]
    fn test_headers_accumulate() {
        let response = HttpResponse::new(Status::OK)
            .with_header("Vary", &["Accept"])
            .with_header("vary", &["Accept-Language", "Cookie"]);
        assert_eq!(
            response.headers().get_combined("Vary").as_deref(),
            Some("Accept, Accept-Language, Cookie")
        );

        let response = response.without_header("Vary").with_header("Vary", &["Origin"]);
        assert_eq!(response.headers().get_all("Vary"), vec!["Origin"]);
    }

    #[test]
    fn test_header_if_is_noop_when_present() {
        let response = HttpResponse::new(Status::OK)
            .with_header("X-Frame-Options", &["DENY"])
            .with_header_if("X-Frame-Options", &["SAMEORIGIN"])
            .with_header_if("X-Content-Type-Options", &["nosniff"]);
        assert_eq!(response.headers().get_all("X-Frame-Options"), vec!["DENY"]);
        assert_eq!(response.headers().get("X-Content-Type-Options"), Some("nosniff"));
    }

    #[test]
    fn test_mime_and_charset_if() {
        let response = HttpResponse::new(Status::OK)
            .with_content_mime_type("text/html")
            .with_content_mime_type_if("text/plain")
            .with_content_charset_if("UTF-8")
            .with_content_charset_if("ISO-8859-1");
        assert_eq!(response.content_mime_type(), Some("text/html"));
        assert_eq!(response.content_charset(), Some("UTF-8"));

        let response = response.with_content_mime_type("application/xml").with_content_charset("ASCII");
        assert_eq!(response.content_mime_type(), Some("application/xml"));
        assert_eq!(response.content_charset(), Some("ASCII"));

        let explicit = HttpResponse::new(Status::OK)
            .with_header("Content-Type", &["text/csv; charset=utf-16"])
            .with_content_mime_type_if("text/plain")
            .with_content_charset_if("UTF-8");
        assert_eq!(explicit.content_mime_type(), None);
        assert_eq!(explicit.content_charset(), None);
    }

    #[test]
    fn test_content_and_stream_are_exclusive() {
        let response = HttpResponse::new(Status::OK)
            .with_content("x")
            .with_body(BodyStream::from_bytes(&b"stream"[..]), None);
        assert!(response.content().is_none());
        assert_eq!(response.stream().and_then(BodyStream::len), Some(6));

        let response = response.with_content("text again");
        assert!(response.stream().is_none());
        assert_eq!(response.content(), Some("text again"));
    }

    #[test]
    fn test_forced_mime_type() {
        let response = HttpResponse::new(Status::OK)
            .with_content_mime_type("text/plain")
            .with_body(BodyStream::from_bytes(&b"{}"[..]), Some("application/json"));
        assert_eq!(response.content_mime_type(), Some("application/json"));

        let kept = HttpResponse::new(Status::OK)
            .with_content_mime_type("text/plain")
            .with_body(BodyStream::from_bytes(&b"{}"[..]), None);
        assert_eq!(kept.content_mime_type(), Some("text/plain"));
    }

    #[test]
    fn test_force_download_headers() {
        let response = HttpResponse::new(Status::OK)
            .with_content_charset("UTF-8")
            .force_download_of(BodyStream::from_bytes(&b"a,b"[..]), "report.csv", None);

        assert_eq!(
            response.headers().get("Content-Disposition"),
            Some("attachment; filename=\"report.csv\"")
        );
        assert_eq!(response.content_mime_type(), Some("application/octet-stream"));
        assert_eq!(response.content_charset(), None);

        let snapshot = response.send_with(|s| s);
        assert_eq!(snapshot.headers.get("Content-Type"), Some("application/octet-stream"));
        assert_eq!(snapshot.headers.get("Content-Length"), Some("3"));
        assert_eq!(snapshot.headers.get("Cache-Control"), Some("must-revalidate"));
    }

    #[test]
    fn test_content_disposition_escaping() {
        assert_eq!(
            content_disposition("say \"hi\".txt"),
            "attachment; filename=\"say \\\"hi\\\".txt\""
        );
        assert_eq!(
            content_disposition("résumé.pdf"),
            "attachment; filename=\"r_sum_.pdf\"; filename*=UTF-8''r%C3%A9sum%C3%A9.pdf"
        );
    }

    #[test]
    fn test_unattached_is_always_valid() {
        let response = HttpResponse::new(Status::new(101).unwrap()).with_content("odd");
        assert!(response.is_valid());
        assert!(response.violations().is_empty());
    }

    #[test]
    fn test_validity_against_request() {
        let request = Arc::new(
            HttpRequest::builder()
                .header("Accept", "application/json")
                .build(),
        );

        let ok = HttpResponse::new(Status::OK)
            .follows(&request)
            .with_content_mime_type("application/json");
        assert!(ok.is_valid());

        let html = HttpResponse::new(Status::OK)
            .follows(&request)
            .with_header("Content-Type", &["text/html"]);
        assert_eq!(html.violations(), vec![Violation::UnacceptableType]);

        let redirect = HttpResponse::new(Status::FOUND).follows(&request);
        assert!(!redirect.is_valid());
    }

    #[test]
    fn test_untyped_content_is_negotiated_as_sent() {
        let json_only = Arc::new(
            HttpRequest::builder()
                .header("Accept", "application/json")
                .build(),
        );
        let text = HttpResponse::new(Status::OK)
            .follows(&json_only)
            .with_content("hello");
        assert_eq!(text.violations(), vec![Violation::UnacceptableType]);

        let download = HttpResponse::new(Status::OK)
            .follows(&json_only)
            .with_body(BodyStream::from_bytes(&b"\x00\x01"[..]), None);
        assert_eq!(download.violations(), vec![Violation::UnacceptableType]);

        let latin1 = Arc::new(
            HttpRequest::builder()
                .header("Accept-Charset", "iso-8859-1")
                .build(),
        );
        let text = HttpResponse::new(Status::OK)
            .follows(&latin1)
            .with_content("hello");
        assert_eq!(text.violations(), vec![Violation::UnacceptableCharset]);

        let config = TransferConfig::builder().default_charset("ISO-8859-1").build();
        let text = HttpResponse::new(Status::OK)
            .with_transfer_config(config)
            .follows(&latin1)
            .with_content("hello");
        assert!(text.is_valid());
        let snapshot = text.send_with(|s| s);
        assert_eq!(
            snapshot.headers.get("Content-Type"),
            Some("text/plain; charset=ISO-8859-1")
        );
    }

    #[test]
    fn test_dropped_request_counts_as_unattached() {
        let request = Arc::new(HttpRequest::new(Method::Post, "/"));
        let response = HttpResponse::new(Status::NOT_MODIFIED).follows(&request);
        assert!(!response.is_valid());

        drop(request);
        assert!(response.request().is_none());
        assert!(response.is_valid());
    }

    #[test]
    fn test_follows_replaces_request() {
        let first = Arc::new(HttpRequest::new(Method::Post, "/a"));
        let second = Arc::new(HttpRequest::new(Method::Get, "/b"));
        let response = HttpResponse::new(Status::NOT_MODIFIED)
            .follows(&first)
            .follows(&second);
        assert_eq!(response.request().map(|r| r.uri().to_string()).as_deref(), Some("/b"));
        assert!(response.is_valid());
    }

    #[test]
    fn test_send_with_snapshot() {
        let calls = Mutex::new(0);
        let response = HttpResponse::new(Status::OK)
            .with_message("Fine")
            .with_header("X-Trace", &["abc"])
            .with_content("hello");

        let body = response.send_with(|snapshot| {
            *calls.lock().unwrap() += 1;
            assert_eq!(snapshot.status, Status::OK);
            assert_eq!(snapshot.message, "Fine");
            assert_eq!(snapshot.headers.get("X-Trace"), Some("abc"));
            assert_eq!(snapshot.headers.get("Content-Type"), Some("text/plain; charset=UTF-8"));
            assert_eq!(snapshot.headers.get("Content-Length"), Some("5"));
            drain(snapshot.body)
        });

        assert_eq!(*calls.lock().unwrap(), 1);
        assert_eq!(body, b"hello");
    }

    #[test]
    fn test_snapshot_for_bodyless_status() {
        let snapshot = HttpResponse::new(Status::NO_CONTENT)
            .with_content("ignored")
            .send_with(|s| s);
        assert!(snapshot.body.is_none());
        assert!(!snapshot.headers.contains("Content-Length"));
    }

    #[test]
    fn test_snapshot_throttle_runs_while_reading() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let response = HttpResponse::new(Status::OK).force_download_of(
            BodyStream::from_bytes(vec![1u8; 10]),
            "blob.bin",
            Some(Box::new(move |_: usize, total: u64| sink.lock().unwrap().push(total))),
        );

        let body = response.send_with(|snapshot| {
            assert!(seen.lock().unwrap().is_empty());
            snapshot.body
        });
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(drain(body).len(), 10);
        assert_eq!(seen.lock().unwrap().last(), Some(&10));
    }

    #[test]
    #[traced_test]
    fn test_send_paths_are_logged() {
        HttpResponse::new(Status::OK).send_with(|_| ());
        assert!(logs_contain("response intercepted"));

        HttpResponse::new(Status::OK).with_content("x").to_wire().unwrap();
        assert!(logs_contain("response sent"));
    }

    #[test]
    fn test_to_wire_text() {
        let wire = HttpResponse::new(Status::OK)
            .with_header("Server", &["facade"])
            .with_content("Hello")
            .to_wire()
            .unwrap();
        let text = String::from_utf8(wire).unwrap();

        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Server: facade\r\n"));
        assert!(text.contains("Content-Length: 5\r\n"));
        assert!(text.ends_with("\r\n\r\nHello"));
    }

    #[test]
    fn test_to_wire_chunked_stream() {
        let config = TransferConfig::builder().chunk_size(4).build();
        let wire = HttpResponse::new(Status::OK)
            .with_transfer_config(config)
            .with_body(BodyStream::from_reader(io::Cursor::new(b"abcdefghij".to_vec())), Some("text/plain"))
            .to_wire()
            .unwrap();
        let text = String::from_utf8(wire).unwrap();

        assert!(text.contains("Transfer-Encoding: chunked\r\n"));
        assert!(!text.contains("Content-Length"));
        assert!(text.ends_with("\r\n\r\n4\r\nabcd\r\n4\r\nefgh\r\n2\r\nij\r\n0\r\n\r\n"));
    }

    #[test]
    fn test_framing_headers_survive_header_limit() {
        let mut response = HttpResponse::new(Status::OK);
        for i in 0..MAX_HEADERS {
            response = response.with_header(&format!("X-Custom-{}", i), &["value"]);
        }
        assert_eq!(response.headers().len(), MAX_HEADERS);

        let wire = response
            .with_body(BodyStream::from_reader(io::Cursor::new(b"abc".to_vec())), None)
            .to_wire()
            .unwrap();
        let text = String::from_utf8(wire).unwrap();

        assert!(text.contains("X-Custom-99: value\r\n"));
        assert!(text.contains("Content-Type: application/octet-stream\r\n"));
        assert!(text.contains("Transfer-Encoding: chunked\r\n"));
        assert!(text.ends_with("\r\n\r\n3\r\nabc\r\n0\r\n\r\n"));
    }

    #[test]
    fn test_download_headers_survive_header_limit() {
        let mut response = HttpResponse::new(Status::OK);
        for i in 0..MAX_HEADERS {
            response = response.with_header(&format!("X-Custom-{}", i), &["value"]);
        }

        let snapshot = response
            .force_download_of(BodyStream::from_bytes(&b"a,b"[..]), "report.csv", None)
            .send_with(|s| s);

        assert_eq!(
            snapshot.headers.get("Content-Disposition"),
            Some("attachment; filename=\"report.csv\"")
        );
        assert_eq!(snapshot.headers.get("Expires"), Some("0"));
        assert_eq!(snapshot.headers.get("Content-Length"), Some("3"));
    }

    #[test]
    fn test_to_wire_http10_stream_closes() {
        let config = TransferConfig::builder().version(Version::Http10).build();
        let wire = HttpResponse::new(Status::OK)
            .with_transfer_config(config)
            .with_body(BodyStream::from_reader(io::Cursor::new(b"raw".to_vec())), None)
            .to_wire()
            .unwrap();
        let text = String::from_utf8(wire).unwrap();

        assert!(text.starts_with("HTTP/1.0 200 OK\r\n"));
        assert!(text.contains("Connection: close\r\n"));
        assert!(text.ends_with("\r\n\r\nraw"));
    }

    #[test]
    fn test_send_throttle_totals() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let config = TransferConfig::builder().chunk_size(4).build();

        let wire = HttpResponse::new(Status::OK)
            .with_transfer_config(config)
            .force_download_of(
                BodyStream::from_bytes(vec![b'z'; 10]),
                "z.bin",
                Some(Box::new(move |chunk: usize, total: u64| {
                    sink.lock().unwrap().push((chunk, total))
                })),
            )
            .to_wire()
            .unwrap();

        assert!(wire.ends_with(&[b'z'; 10]));
        assert_eq!(*seen.lock().unwrap(), vec![(4, 4), (4, 8), (2, 10)]);
    }

    #[test]
    fn test_head_request_sends_headers_only() {
        let request = Arc::new(HttpRequest::new(Method::Head, "/"));
        let wire = HttpResponse::new(Status::OK)
            .follows(&request)
            .with_content("body")
            .to_wire()
            .unwrap();
        let text = String::from_utf8(wire).unwrap();

        assert!(text.contains("Content-Length: 4\r\n"));
        assert!(text.ends_with("\r\n\r\n"));
    }

    #[test]
    fn test_invalid_header_rejected_before_write() {
        let mut session = from_writer(Vec::new());
        let result = HttpResponse::new(Status::OK)
            .with_header("X-Bad", &["a\r\nSet-Cookie: evil=1"])
            .send(&mut session);

        assert!(matches!(result, Err(Error::InvalidHeader(_))));
        assert_eq!(session.bytes_written(), 0);
    }

    #[test]
    fn test_short_stream_is_error() {
        let stream = BodyStream::from_reader(io::Cursor::new(b"abc".to_vec())).with_len(10);
        let result = HttpResponse::new(Status::OK).with_body(stream, None).to_wire();
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_redirect_roundtrip_through_snapshot() {
        let request = HttpRequest::new(Method::Get, "/old");
        let target = url::Url::parse("https://example.com/new").unwrap();
        let snapshot = request.redirect_to(&target).send_with(|s| s);

        assert!(snapshot.status.is_redirection());
        assert_eq!(snapshot.headers.get("Location"), Some("https://example.com/new"));
        assert_eq!(snapshot.headers.get("Content-Length"), Some("0"));
    }
}
