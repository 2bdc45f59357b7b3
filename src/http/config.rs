//! Transfer and proxy configuration
//!
//! Both configurations are immutable once built and cheap to clone.

use super::Version;

/// Default size of a body chunk written during send
pub const DEFAULT_CHUNK_SIZE: usize = 8192;

/// Default charset applied to text content without an explicit type
pub const DEFAULT_CHARSET: &str = "UTF-8";

/// Headers inspected for a proxied client address, in priority order
pub const DEFAULT_PROXY_HEADERS: &[&str] = &[
    "Forwarded",
    "X-Forwarded-For",
    "X-Real-IP",
    "Client-IP",
    "X-Cluster-Client-IP",
];

/// How a response is put on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferConfig {
    pub(crate) chunk_size: usize,
    pub(crate) default_charset: String,
    pub(crate) version: Version,
}

impl TransferConfig {
    /// Create a new transfer configuration builder
    pub fn builder() -> TransferConfigBuilder {
        TransferConfigBuilder::default()
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn default_charset(&self) -> &str {
        &self.default_charset
    }

    pub fn version(&self) -> Version {
        self.version
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        TransferConfig {
            chunk_size: DEFAULT_CHUNK_SIZE,
            default_charset: DEFAULT_CHARSET.to_string(),
            version: Version::Http11,
        }
    }
}

/// Builder for transfer configuration
#[derive(Debug, Default)]
pub struct TransferConfigBuilder {
    chunk_size: Option<usize>,
    default_charset: Option<String>,
    version: Option<Version>,
}

impl TransferConfigBuilder {
    /// Set the body chunk size (zero is raised to one byte)
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = Some(size.max(1));
        self
    }

    /// Set the charset used for text content without an explicit type
    pub fn default_charset(mut self, charset: impl Into<String>) -> Self {
        self.default_charset = Some(charset.into());
        self
    }

    /// Set the protocol version written in the status line
    pub fn version(mut self, version: Version) -> Self {
        self.version = Some(version);
        self
    }

    pub fn build(self) -> TransferConfig {
        let defaults = TransferConfig::default();
        TransferConfig {
            chunk_size: self.chunk_size.unwrap_or(defaults.chunk_size),
            default_charset: self.default_charset.unwrap_or(defaults.default_charset),
            version: self.version.unwrap_or(defaults.version),
        }
    }
}

/// Which headers are trusted to carry the original client address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    pub(crate) headers: Vec<String>,
}

impl ProxyConfig {
    /// Create a new proxy configuration builder
    pub fn builder() -> ProxyConfigBuilder {
        ProxyConfigBuilder::default()
    }

    /// Configuration that ignores every proxy header
    pub fn disabled() -> Self {
        ProxyConfig { headers: Vec::new() }
    }

    pub fn headers(&self) -> impl Iterator<Item = &str> {
        self.headers.iter().map(String::as_str)
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        ProxyConfig {
            headers: DEFAULT_PROXY_HEADERS.iter().map(|h| h.to_string()).collect(),
        }
    }
}

/// Builder for proxy configuration
#[derive(Debug, Default)]
pub struct ProxyConfigBuilder {
    headers: Vec<String>,
}

impl ProxyConfigBuilder {
    /// Trust a header; earlier headers take priority
    pub fn header(mut self, name: impl Into<String>) -> Self {
        self.headers.push(name.into());
        self
    }

    /// Build, falling back to the default header list when none were given
    pub fn build(self) -> ProxyConfig {
        if self.headers.is_empty() {
            ProxyConfig::default()
        } else {
            ProxyConfig { headers: self.headers }
        }
    }
}
