use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use bytes::Bytes;
use hyper::{HeaderMap, Method};

use crate::webdav::error::DavResult;
use crate::webdav::ns::DAV;

/// WebDAV Depth
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Depth {
    Zero,
    One,
    Infinity,
}

impl Depth {
    pub fn as_str(self) -> &'static str {
        match self {
            Depth::Zero => "0",
            Depth::One => "1",
            Depth::Infinity => "infinity",
        }
    }
}

/// Scope of a WebDAV lock (RFC 4918 section 6.2).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LockScope {
    Exclusive,
    Shared,
}

impl LockScope {
    pub fn as_str(self) -> &'static str {
        match self {
            LockScope::Exclusive => "exclusive",
            LockScope::Shared => "shared",
        }
    }
}

/// Requested or granted lock duration, rendered as the `Timeout` header.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LockTimeout {
    Seconds(u32),
    Infinite,
}

impl LockTimeout {
    /// Header value: `Second-<n>` or `Infinite`.
    pub fn as_header(self) -> String {
        match self {
            LockTimeout::Seconds(n) => format!("Second-{n}"),
            LockTimeout::Infinite => "Infinite".to_string(),
        }
    }

    /// Parse a `Timeout` header or `<timeout>` element value. Servers may
    /// send a comma-separated list; the first recognized entry wins.
    pub fn parse(value: &str) -> Option<Self> {
        for entry in value.split(',') {
            let entry = entry.trim();
            if entry.eq_ignore_ascii_case("Infinite") {
                return Some(LockTimeout::Infinite);
            }
            if let Some(rest) = entry
                .strip_prefix("Second-")
                .or_else(|| entry.strip_prefix("second-"))
                && let Ok(n) = rest.parse::<u32>()
            {
                return Some(LockTimeout::Seconds(n));
            }
        }
        None
    }

    /// `None` for an infinite lock.
    pub fn duration(self) -> Option<Duration> {
        match self {
            LockTimeout::Seconds(n) => Some(Duration::from_secs(u64::from(n))),
            LockTimeout::Infinite => None,
        }
    }
}

/// A lock this client has acquired and still tracks.
#[derive(Debug, Clone)]
pub struct ActiveLock {
    pub token: String,
    pub scope: LockScope,
    pub timeout: LockTimeout,
    /// Absent for infinite locks.
    pub deadline: Option<Instant>,
}

/// Fully qualified property name: namespace URI plus local name.
///
/// Equality is structural on both fields; the same local name under two
/// namespaces is two different keys.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PropertyKey {
    pub namespace: String,
    pub name: String,
}

impl PropertyKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Shorthand for a property in the `DAV:` namespace.
    pub fn dav(name: impl Into<String>) -> Self {
        Self::new(DAV, name)
    }
}

/// Value of a single property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    /// Plain character content.
    Text(String),
    /// Raw inner XML, kept verbatim for structural or vendor-specific
    /// properties the client has no schema for.
    Fragment(String),
    /// Empty element, e.g. a property requested for removal or reported
    /// absent.
    Empty,
}

impl PropertyValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// One `<response>` element of a multi-status document.
#[derive(Debug, Clone, Default)]
pub struct ResourceRecord {
    pub href: String,
    /// Status line of the response (or of its first successful propstat
    /// block). Per-property outcomes live in the two maps below.
    pub status: Option<String>,
    /// Properties retrieved or applied successfully (2xx propstat blocks).
    pub properties: BTreeMap<PropertyKey, PropertyValue>,
    /// Properties whose propstat block reported a non-2xx code, keyed to that
    /// code. Never merged with `properties`.
    pub failed_properties: BTreeMap<PropertyKey, u16>,
    /// True iff a successful `resourcetype` property contained a
    /// `collection` child.
    pub is_collection: bool,
}

impl ResourceRecord {
    fn dav_text(&self, name: &str) -> Option<&str> {
        self.properties
            .get(&PropertyKey::dav(name))
            .and_then(|v| v.as_text())
    }

    pub fn display_name(&self) -> Option<&str> {
        self.dav_text("displayname")
    }

    pub fn etag(&self) -> Option<&str> {
        self.dav_text("getetag")
    }

    pub fn content_type(&self) -> Option<&str> {
        self.dav_text("getcontenttype")
    }

    pub fn last_modified(&self) -> Option<&str> {
        self.dav_text("getlastmodified")
    }

    pub fn creation_date(&self) -> Option<&str> {
        self.dav_text("creationdate")
    }

    pub fn content_length(&self) -> Option<u64> {
        self.dav_text("getcontentlength")
            .and_then(|s| s.trim().parse().ok())
    }
}

/// Wire-level request produced by the builder functions: everything the
/// transport needs, nothing it does not.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

/// Annotated result of a batch operation
pub struct BatchItem<T> {
    pub pub_path: String,
    pub result: DavResult<T>,
}
