//! Inbound request view
//!
//! [`RequestView`] is the read-only contract over one inbound HTTP message;
//! [`HttpRequest`] implements it over a fully assembled request. The
//! embedding transport hands the decoded request line, headers, body and
//! peer address to [`HttpRequestBuilder`], which derives query items,
//! cookies, form items and uploaded files once, up front.

use super::body::BodyStream;
use super::config::ProxyConfig;
use super::cookies::parse_cookies;
use super::headers::media_type;
use super::items::{Item, Items};
use super::negotiate::{self, Rule};
use super::response::{HttpResponse, ResponseBuilder};
use super::upload::{form_data_boundary, parse_multipart, UploadedFile};
use super::{Headers, Method, Result, Status, Version};
use bytes::Bytes;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr};
use url::Url;

/// Read contract over an inbound HTTP message
///
/// Every `has_*` query is conjunctive: it is true iff each given name
/// resolves on its own, and vacuously true for an empty list. Nothing here
/// mutates the request; the two factories build a new response without
/// sending it.
pub trait RequestView {
    type Response: ResponseBuilder;

    /// Combined value of a header, repeated values joined with `", "`
    fn header(&self, name: &str) -> Option<Cow<'_, str>>;

    fn has_header(&self, names: &[&str]) -> bool {
        names.iter().all(|n| self.header(n).is_some())
    }

    fn method(&self) -> Method;

    /// True iff the method equals one of `methods`, ignoring ASCII case
    fn uses_method(&self, methods: &[&str]) -> bool {
        let method = self.method();
        methods.iter().any(|m| m.eq_ignore_ascii_case(method.as_str()))
    }

    fn query_item(&self, key: &str) -> Option<&Item>;

    fn has_query_item(&self, keys: &[&str]) -> bool {
        keys.iter().all(|k| self.query_item(k).is_some())
    }

    /// True iff the query string carried any item
    fn has_query(&self) -> bool;

    /// Item submitted in the request body
    fn request_item(&self, key: &str) -> Option<&Item>;

    fn has_request_item(&self, keys: &[&str]) -> bool {
        keys.iter().all(|k| self.request_item(k).is_some())
    }

    /// Query item first, request body item second
    fn item(&self, key: &str) -> Option<&Item> {
        self.query_item(key).or_else(|| self.request_item(key))
    }

    fn has_item(&self, keys: &[&str]) -> bool {
        keys.iter().all(|k| self.item(k).is_some())
    }

    fn cookie(&self, key: &str) -> Option<&str>;

    fn has_cookie(&self, keys: &[&str]) -> bool {
        keys.iter().all(|k| self.cookie(k).is_some())
    }

    /// Uploaded file under its field name as sent, e.g. `docs[]`
    fn file(&self, key: &str) -> Option<&UploadedFile>;

    fn has_file(&self, keys: &[&str]) -> bool {
        keys.iter().all(|k| self.file(k).is_some())
    }

    /// True iff the body is `multipart/form-data` with a boundary
    fn is_upload(&self) -> bool {
        self.content_type()
            .and_then(|ct| form_data_boundary(&ct).map(|_| ()))
            .is_some()
    }

    /// True iff `X-Requested-With` equals `value` exactly
    fn is_requested_with(&self, value: &str) -> bool {
        self.header("X-Requested-With").is_some_and(|v| v == value)
    }

    /// A fresh stream over the raw body
    fn body(&self) -> Option<BodyStream>;

    fn has_body(&self) -> bool;

    /// The raw body as text, invalid UTF-8 replaced
    fn contents(&self) -> Option<String>;

    /// Full `Content-Type` value, parameters included
    fn content_type(&self) -> Option<Cow<'_, str>> {
        self.header("Content-Type")
    }

    /// `Content-Type` without parameters
    fn content_mime_type(&self) -> Option<String> {
        self.content_type().map(|ct| media_type(&ct).to_string())
    }

    /// Address of the immediate peer, which may be a proxy
    fn client_ip(&self) -> IpAddr;

    /// Best-effort original client address
    ///
    /// Taken from proxy headers when present, else the peer address. Those
    /// headers can be forged and transparent proxies add none, so this is
    /// unreliable for anything security related.
    fn real_client_ip(&self) -> IpAddr;

    /// True iff proxy headers claim an address other than the peer's
    fn is_proxy_request(&self) -> bool {
        self.real_client_ip() != self.client_ip()
    }

    /// True iff the negotiation header `rule` accepts any of `values`
    ///
    /// An absent header accepts everything.
    fn client_accepts(&self, rule: &str, values: &[&str]) -> bool {
        match self.header(rule) {
            Some(header) => negotiate::accepts(
                &negotiate::parse_preferences(&header),
                Rule::for_header(rule),
                values,
            ),
            None => true,
        }
    }

    /// Redirect response with `Location` set to `uri`; nothing is sent
    fn redirect_to(&self, uri: &Url) -> Self::Response;

    /// `500` response with an optional text body; nothing is sent
    fn abort(&self, message: Option<&str>) -> Self::Response;
}

/// An assembled inbound HTTP request
#[derive(Debug, Clone)]
pub struct HttpRequest {
    method: Method,
    uri: String,
    version: Version,
    headers: Headers,
    query: Items,
    form: Items,
    cookies: BTreeMap<String, String>,
    files: BTreeMap<String, UploadedFile>,
    body: Option<Bytes>,
    peer: IpAddr,
    proxy: ProxyConfig,
}

impl HttpRequest {
    /// Create a new HTTP request without headers or body
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        HttpRequest::builder().method(method).uri(uri).build()
    }

    /// Create a builder for constructing requests
    pub fn builder() -> HttpRequestBuilder {
        HttpRequestBuilder::default()
    }

    /// Get the request target as received
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Request target without the query string
    pub fn path(&self) -> &str {
        self.uri.split(['?', '#']).next().unwrap_or("")
    }

    /// Get the HTTP version
    pub fn version(&self) -> Version {
        self.version
    }

    /// Get the headers
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn query(&self) -> &Items {
        &self.query
    }

    /// Items decoded from the request body
    pub fn form(&self) -> &Items {
        &self.form
    }

    pub fn cookies(&self) -> &BTreeMap<String, String> {
        &self.cookies
    }

    pub fn files(&self) -> &BTreeMap<String, UploadedFile> {
        &self.files
    }

    /// Raw body bytes
    pub fn body_bytes(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// The candidate the negotiation header `rule` weighs highest
    pub fn preferred<'a>(&self, rule: &str, values: &[&'a str]) -> Option<&'a str> {
        match self.header(rule) {
            Some(header) => negotiate::preferred(
                &negotiate::parse_preferences(&header),
                Rule::for_header(rule),
                values,
            ),
            None => values.first().copied(),
        }
    }
}

impl RequestView for HttpRequest {
    type Response = HttpResponse;

    fn header(&self, name: &str) -> Option<Cow<'_, str>> {
        self.headers.get_combined(name)
    }

    fn method(&self) -> Method {
        self.method
    }

    fn query_item(&self, key: &str) -> Option<&Item> {
        self.query.get(key)
    }

    fn has_query(&self) -> bool {
        !self.query.is_empty()
    }

    fn request_item(&self, key: &str) -> Option<&Item> {
        self.form.get(key)
    }

    fn cookie(&self, key: &str) -> Option<&str> {
        self.cookies.get(key).map(String::as_str)
    }

    fn file(&self, key: &str) -> Option<&UploadedFile> {
        self.files.get(key)
    }

    fn body(&self) -> Option<BodyStream> {
        self.body.clone().map(BodyStream::from_bytes)
    }

    fn has_body(&self) -> bool {
        self.body.is_some()
    }

    fn contents(&self) -> Option<String> {
        self.body
            .as_ref()
            .map(|b| String::from_utf8_lossy(b).into_owned())
    }

    fn client_ip(&self) -> IpAddr {
        self.peer
    }

    fn real_client_ip(&self) -> IpAddr {
        super::proxy::real_client_ip(self.peer, &self.headers, &self.proxy)
    }

    fn is_proxy_request(&self) -> bool {
        super::proxy::is_proxied(self.peer, &self.headers, &self.proxy)
    }

    fn redirect_to(&self, uri: &Url) -> HttpResponse {
        let status = if self.method.is_retrieval() {
            Status::FOUND
        } else {
            Status::SEE_OTHER
        };
        HttpResponse::new(status).with_header("Location", &[uri.as_str()])
    }

    fn abort(&self, message: Option<&str>) -> HttpResponse {
        let response = HttpResponse::new(Status::INTERNAL_SERVER_ERROR);
        match message {
            Some(message) => response.with_content(message),
            None => response,
        }
    }
}

/// Builder for HTTP requests
#[derive(Debug, Default)]
pub struct HttpRequestBuilder {
    method: Option<Method>,
    uri: Option<String>,
    version: Option<Version>,
    headers: Headers,
    body: Option<Bytes>,
    peer: Option<IpAddr>,
    proxy: Option<ProxyConfig>,
}

impl HttpRequestBuilder {
    /// Set the HTTP method
    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Set the request target; its query string becomes the query items
    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    /// Set the HTTP version
    pub fn version(mut self, version: Version) -> Self {
        self.version = Some(version);
        self
    }

    /// Add a header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set the raw body
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Set the address of the immediate peer (defaults to 127.0.0.1)
    pub fn peer_addr(mut self, addr: IpAddr) -> Self {
        self.peer = Some(addr);
        self
    }

    /// Set which proxy headers are trusted
    pub fn proxy_config(mut self, config: ProxyConfig) -> Self {
        self.proxy = Some(config);
        self
    }

    /// Build the request
    ///
    /// A malformed multipart body is logged and leaves the form items and
    /// files empty.
    pub fn build(self) -> HttpRequest {
        let (mut request, body) = self.into_parts();
        match decode_body(&request.headers, body.as_ref()) {
            Ok((form, files)) => {
                request.form = form;
                request.files = files;
            }
            Err(e) => {
                tracing::warn!(error = %e, uri = %request.uri, "ignoring malformed request body");
            }
        }
        request.body = body;
        request
    }

    /// Build the request, failing on a malformed multipart body
    pub fn try_build(self) -> Result<HttpRequest> {
        let (mut request, body) = self.into_parts();
        let (form, files) = decode_body(&request.headers, body.as_ref())?;
        request.form = form;
        request.files = files;
        request.body = body;
        Ok(request)
    }

    fn into_parts(self) -> (HttpRequest, Option<Bytes>) {
        let uri = self.uri.unwrap_or_else(|| "/".to_string());
        let query = uri
            .split('#')
            .next()
            .and_then(|target| target.split_once('?'))
            .map(|(_, query)| Items::parse(query))
            .unwrap_or_default();
        let cookies = parse_cookies(&self.headers);

        let request = HttpRequest {
            method: self.method.unwrap_or(Method::Get),
            uri,
            version: self.version.unwrap_or_default(),
            headers: self.headers,
            query,
            form: Items::new(),
            cookies,
            files: BTreeMap::new(),
            body: None,
            peer: self.peer.unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST)),
            proxy: self.proxy.unwrap_or_default(),
        };
        (request, self.body)
    }
}

type DecodedBody = (Items, BTreeMap<String, UploadedFile>);

fn decode_body(headers: &Headers, body: Option<&Bytes>) -> Result<DecodedBody> {
    let (Some(body), Some(content_type)) = (body, headers.get("Content-Type")) else {
        return Ok((Items::new(), BTreeMap::new()));
    };

    if media_type(content_type).eq_ignore_ascii_case("application/x-www-form-urlencoded") {
        let text = String::from_utf8_lossy(body);
        return Ok((Items::parse(&text), BTreeMap::new()));
    }

    if let Some(boundary) = form_data_boundary(content_type) {
        let multipart = parse_multipart(body, boundary)?;
        return Ok((multipart.fields, multipart.files));
    }

    Ok((Items::new(), BTreeMap::new()))
}
