//! Header fields
//!
//! [`Headers`] is the field list of a request or response. The free
//! functions pick apart the `type/subtype; param=value` shape shared by
//! `Content-Type`, `Content-Disposition` and friends.

use super::{Error, Result, MAX_HEADERS};
use std::borrow::Cow;
use std::fmt;

/// Ordered header fields of one message
///
/// Names compare ASCII case-insensitively. A name may appear several times;
/// each appearance is its own entry and [`get_combined`](Headers::get_combined)
/// joins them with `", "`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Headers::default()
    }

    fn matching<'a, 'n>(&'a self, name: &'n str) -> impl Iterator<Item = &'a str> + 'n
    where
        'a: 'n,
    {
        self.entries
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Append an entry, keeping existing values of the same name
    ///
    /// Entries past [`MAX_HEADERS`] are dropped with a warning.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        if self.entries.len() >= MAX_HEADERS {
            tracing::warn!(header = %name, limit = MAX_HEADERS, "header limit reached, dropping header");
            return;
        }
        self.entries.push((name, value.into()));
    }

    /// Replace every value of `name` with `value`
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.remove(&name);
        self.insert(name, value);
    }

    /// Replace every value of `name` with `value`, ignoring [`MAX_HEADERS`]
    ///
    /// Reserved for headers the message framing depends on. The entry count
    /// grows by at most one per distinct name.
    pub(crate) fn replace(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.remove(&name);
        self.entries.push((name, value.into()));
    }

    /// First value of `name`
    pub fn get(&self, name: &str) -> Option<&str> {
        self.matching(name).next()
    }

    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.matching(name).collect()
    }

    /// Every value of `name` joined with `", "`; a lone value is borrowed
    pub fn get_combined(&self, name: &str) -> Option<Cow<'_, str>> {
        let mut values = self.matching(name);
        let first = values.next()?;
        match values.next() {
            None => Some(Cow::Borrowed(first)),
            Some(second) => {
                let mut joined = format!("{}, {}", first, second);
                for value in values {
                    joined.push_str(", ");
                    joined.push_str(value);
                }
                Some(Cow::Owned(joined))
            }
        }
    }

    pub fn count(&self, name: &str) -> usize {
        self.matching(name).count()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Drop every value of `name`, returning how many were removed
    pub fn remove(&mut self, name: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        before - self.entries.len()
    }

    /// Number of entries, counting repeated names separately
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Reject entries that would corrupt the header block on the wire
    ///
    /// Names must be non-empty tokens; values must not contain CR, LF or NUL.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in self.iter() {
            if name.is_empty() || !name.bytes().all(is_token_byte) {
                return Err(Error::InvalidHeader(format!("Invalid header name: {:?}", name)));
            }
            if value.bytes().any(|b| matches!(b, b'\r' | b'\n' | 0)) {
                return Err(Error::InvalidHeader(format!(
                    "Invalid value for header {}: {:?}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in self.iter() {
            writeln!(f, "{}: {}", name, value)?;
        }
        Ok(())
    }
}

impl FromIterator<(String, String)> for Headers {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.insert(name, value);
        }
        headers
    }
}

/// RFC 7230 `tchar`
fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}

/// Strip parameters from a `type/subtype; param=value` header value
pub fn media_type(value: &str) -> &str {
    value.split(';').next().unwrap_or("").trim()
}

/// Look up a parameter of a `type/subtype; param=value` header value
///
/// Parameter names compare case-insensitively; surrounding quotes are
/// removed from the value.
pub fn header_param<'a>(value: &'a str, param: &str) -> Option<&'a str> {
    value.split(';').skip(1).find_map(|part| {
        let (name, val) = part.split_once('=')?;
        if name.trim().eq_ignore_ascii_case(param) {
            Some(unquote(val.trim()))
        } else {
            None
        }
    })
}

/// Remove one level of surrounding double quotes
pub fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}
