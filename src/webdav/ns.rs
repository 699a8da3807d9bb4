use std::collections::BTreeMap;

use crate::webdav::error::{DavError, DavResult};

/// Namespace URI of the WebDAV core properties.
pub const DAV: &str = "DAV:";

/// Default abbreviation bound to [`DAV`].
pub const DEFAULT_DAV_ABBREVIATION: &str = "D";

/// Registry mapping namespace URIs to the abbreviations used when emitting
/// request bodies.
///
/// The `DAV:` namespace is always present. The table is only mutated by
/// explicit [`register`](Self::register) calls and is consulted read-only
/// while building requests; incoming documents resolve their own `xmlns`
/// declarations and never touch this table.
#[derive(Debug, Clone)]
pub struct NamespaceTable {
    by_uri: BTreeMap<String, String>,
}

impl Default for NamespaceTable {
    fn default() -> Self {
        Self::new()
    }
}

impl NamespaceTable {
    /// Table holding only `DAV:` under the default `"D"` abbreviation.
    pub fn new() -> Self {
        let mut by_uri = BTreeMap::new();
        by_uri.insert(DAV.to_string(), DEFAULT_DAV_ABBREVIATION.to_string());
        Self { by_uri }
    }

    /// Like [`new`](Self::new) but with a caller-chosen abbreviation for
    /// `DAV:`.
    pub fn with_dav_abbreviation(abbreviation: &str) -> DavResult<Self> {
        if abbreviation.is_empty() {
            return Err(DavError::invalid("namespace abbreviation must not be empty"));
        }
        let mut by_uri = BTreeMap::new();
        by_uri.insert(DAV.to_string(), abbreviation.to_string());
        Ok(Self { by_uri })
    }

    /// Register an abbreviation for a namespace URI.
    ///
    /// Both values must be non-empty and not already taken; the `DAV:` entry
    /// cannot be displaced.
    pub fn register(
        &mut self,
        abbreviation: impl Into<String>,
        uri: impl Into<String>,
    ) -> DavResult<()> {
        let abbreviation = abbreviation.into();
        let uri = uri.into();
        if abbreviation.is_empty() || uri.is_empty() {
            return Err(DavError::invalid(
                "namespace abbreviation and URI must not be empty",
            ));
        }
        if self.by_uri.contains_key(&uri) {
            return Err(DavError::invalid(format!(
                "namespace {uri} is already registered"
            )));
        }
        if self.by_uri.values().any(|a| *a == abbreviation) {
            return Err(DavError::invalid(format!(
                "abbreviation {abbreviation} is already in use"
            )));
        }
        self.by_uri.insert(uri, abbreviation);
        Ok(())
    }

    pub fn abbreviation_for(&self, uri: &str) -> Option<&str> {
        self.by_uri.get(uri).map(String::as_str)
    }

    /// True when the abbreviation is bound to any URI in this table.
    pub fn has_abbreviation(&self, abbreviation: &str) -> bool {
        self.by_uri.values().any(|a| a == abbreviation)
    }

    /// `(uri, abbreviation)` pairs in URI order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.by_uri.iter().map(|(u, a)| (u.as_str(), a.as_str()))
    }
}
