//! Compatibility rules between a response and the request it follows
//!
//! A response that follows no request is always valid. Otherwise every rule
//! below must hold:
//!
//! | rule                   | fails when                                              |
//! |------------------------|---------------------------------------------------------|
//! | `Informational`        | the final status is 1xx                                 |
//! | `BodyForbidden`        | 204 or 304 carries text or a stream                     |
//! | `MissingLocation`      | 301, 302, 303, 307 or 308 lacks `Location`              |
//! | `MissingAllow`         | 405 lacks `Allow`                                       |
//! | `MissingAuthenticate`  | 401 lacks `WWW-Authenticate`                            |
//! | `MissingContentRange`  | 206 lacks `Content-Range`                               |
//! | `NotModifiedMethod`    | 304 answers a method other than GET or HEAD             |
//! | `UnacceptableType`     | a 2xx MIME type is rejected by the request's `Accept`   |
//! | `UnacceptableCharset`  | a 2xx charset is rejected by `Accept-Charset`           |
//! | `UnacceptableLanguage` | a 2xx `Content-Language` is rejected by `Accept-Language` |

use super::request::{HttpRequest, RequestView};
use super::{Headers, Method, Status};

/// One failed compatibility rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Violation {
    #[error("1xx status used as a final response")]
    Informational,

    #[error("status does not allow a body")]
    BodyForbidden,

    #[error("redirect without a Location header")]
    MissingLocation,

    #[error("405 without an Allow header")]
    MissingAllow,

    #[error("401 without a WWW-Authenticate header")]
    MissingAuthenticate,

    #[error("206 without a Content-Range header")]
    MissingContentRange,

    #[error("304 answering a method other than GET or HEAD")]
    NotModifiedMethod,

    #[error("content type not accepted by the client")]
    UnacceptableType,

    #[error("charset not accepted by the client")]
    UnacceptableCharset,

    #[error("content language not accepted by the client")]
    UnacceptableLanguage,
}

/// The parts of a response the rules look at
#[derive(Debug, Clone, Copy)]
pub struct ResponseFacts<'a> {
    pub status: Status,
    pub headers: &'a Headers,
    pub has_body: bool,
    pub mime_type: Option<&'a str>,
    pub charset: Option<&'a str>,
}

/// Evaluate every rule of a response against its request
pub fn check(facts: &ResponseFacts<'_>, request: &HttpRequest) -> Vec<Violation> {
    let mut violations = Vec::new();
    let status = facts.status;
    let headers = facts.headers;

    if status.is_informational() {
        violations.push(Violation::Informational);
    }
    if matches!(status.code(), 204 | 304) && facts.has_body {
        violations.push(Violation::BodyForbidden);
    }

    let required = [
        (status.requires_location(), "Location", Violation::MissingLocation),
        (status.code() == 405, "Allow", Violation::MissingAllow),
        (status.code() == 401, "WWW-Authenticate", Violation::MissingAuthenticate),
        (status.code() == 206, "Content-Range", Violation::MissingContentRange),
    ];
    for (applies, header, violation) in required {
        if applies && !headers.contains(header) {
            violations.push(violation);
        }
    }

    if status.code() == 304 && !matches!(request.method(), Method::Get | Method::Head) {
        violations.push(Violation::NotModifiedMethod);
    }

    if status.is_success() {
        if let Some(mime) = facts.mime_type {
            if !request.client_accepts("Accept", &[mime]) {
                violations.push(Violation::UnacceptableType);
            }
        }
        if let Some(charset) = facts.charset {
            if !request.client_accepts("Accept-Charset", &[charset]) {
                violations.push(Violation::UnacceptableCharset);
            }
        }
        if let Some(languages) = headers.get_combined("Content-Language") {
            let languages: Vec<&str> = languages
                .split(',')
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .collect();
            if !languages.is_empty() && !request.client_accepts("Accept-Language", &languages) {
                violations.push(Violation::UnacceptableLanguage);
            }
        }
    }

    violations
}
