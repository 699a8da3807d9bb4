//! XML request-body construction for the WebDAV verbs that carry one.
//!
//! Every builder takes the client's [`NamespaceTable`] and emits each
//! namespace declaration exactly once, on the root element, for the
//! namespaces actually referenced by the body.

use crate::webdav::ns::{DAV, NamespaceTable};
use crate::webdav::types::{LockScope, PropertyKey, PropertyValue};

pub fn escape_xml(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}

const XML_DECL: &str = r#"<?xml version="1.0" encoding="utf-8"?>"#;

/// Per-request view over the namespace table. Namespaces without a
/// registered abbreviation get a fresh `ns0`, `ns1`, ... binding that lives
/// only for this body.
struct NamespaceBindings<'a> {
    table: &'a NamespaceTable,
    used: Vec<(String, String)>,
    next_generated: usize,
}

impl<'a> NamespaceBindings<'a> {
    fn new(table: &'a NamespaceTable) -> Self {
        Self {
            table,
            used: Vec::new(),
            next_generated: 0,
        }
    }

    fn prefix_for(&mut self, uri: &str) -> String {
        if let Some((_, abbrev)) = self.used.iter().find(|(u, _)| u == uri) {
            return abbrev.clone();
        }
        let abbrev = match self.table.abbreviation_for(uri) {
            Some(a) => a.to_string(),
            None => loop {
                let candidate = format!("ns{}", self.next_generated);
                self.next_generated += 1;
                if !self.table.has_abbreviation(&candidate) {
                    break candidate;
                }
            },
        };
        self.used.push((uri.to_string(), abbrev.clone()));
        abbrev
    }

    /// ` xmlns:D="DAV:" xmlns:ns0="..."` for every binding used, in
    /// first-use order.
    fn declarations(&self) -> String {
        let mut out = String::new();
        for (uri, abbrev) in &self.used {
            out.push_str(" xmlns:");
            out.push_str(abbrev);
            out.push_str("=\"");
            out.push_str(&escape_xml(uri));
            out.push('"');
        }
        out
    }
}

fn push_qualified_empty(out: &mut String, binds: &mut NamespaceBindings<'_>, key: &PropertyKey) {
    out.push('<');
    if !key.namespace.is_empty() {
        out.push_str(&binds.prefix_for(&key.namespace));
        out.push(':');
    }
    out.push_str(&key.name);
    out.push_str("/>");
}

fn push_qualified_value(
    out: &mut String,
    binds: &mut NamespaceBindings<'_>,
    key: &PropertyKey,
    value: &PropertyValue,
) {
    let qname = if key.namespace.is_empty() {
        key.name.clone()
    } else {
        format!("{}:{}", binds.prefix_for(&key.namespace), key.name)
    };
    match value {
        PropertyValue::Empty => {
            out.push('<');
            out.push_str(&qname);
            out.push_str("/>");
        }
        PropertyValue::Text(text) => {
            out.push('<');
            out.push_str(&qname);
            out.push('>');
            out.push_str(&escape_xml(text));
            out.push_str("</");
            out.push_str(&qname);
            out.push('>');
        }
        PropertyValue::Fragment(raw) => {
            out.push('<');
            out.push_str(&qname);
            out.push('>');
            out.push_str(raw);
            out.push_str("</");
            out.push_str(&qname);
            out.push('>');
        }
    }
}

/// Body of a `PROPFIND`: `<allprop/>` when `props` is `None`, otherwise one
/// empty element per requested key.
pub fn build_propfind_body(props: Option<&[PropertyKey]>, table: &NamespaceTable) -> String {
    let mut binds = NamespaceBindings::new(table);
    let d = binds.prefix_for(DAV);
    let mut inner = String::new();
    match props {
        None => {
            inner.push('<');
            inner.push_str(&d);
            inner.push_str(":allprop/>");
        }
        Some(keys) => {
            inner.push('<');
            inner.push_str(&d);
            inner.push_str(":prop>");
            for key in keys {
                push_qualified_empty(&mut inner, &mut binds, key);
            }
            inner.push_str("</");
            inner.push_str(&d);
            inner.push_str(":prop>");
        }
    }
    format!(
        "{XML_DECL}<{d}:propfind{}>{inner}</{d}:propfind>",
        binds.declarations()
    )
}

/// Body of a `PROPPATCH`: a `<set>` block for `set` and a `<remove>` block
/// for `remove`, either omitted when empty.
pub fn build_proppatch_body(
    set: &[(PropertyKey, PropertyValue)],
    remove: &[PropertyKey],
    table: &NamespaceTable,
) -> String {
    let mut binds = NamespaceBindings::new(table);
    let d = binds.prefix_for(DAV);
    let mut inner = String::new();
    if !set.is_empty() {
        inner.push_str(&format!("<{d}:set><{d}:prop>"));
        for (key, value) in set {
            push_qualified_value(&mut inner, &mut binds, key, value);
        }
        inner.push_str(&format!("</{d}:prop></{d}:set>"));
    }
    if !remove.is_empty() {
        inner.push_str(&format!("<{d}:remove><{d}:prop>"));
        for key in remove {
            push_qualified_empty(&mut inner, &mut binds, key);
        }
        inner.push_str(&format!("</{d}:prop></{d}:remove>"));
    }
    format!(
        "{XML_DECL}<{d}:propertyupdate{}>{inner}</{d}:propertyupdate>",
        binds.declarations()
    )
}

/// Body of a `LOCK`: scope, write lock type, and the owner href.
pub fn build_lockinfo_body(scope: LockScope, owner_href: &str, table: &NamespaceTable) -> String {
    let mut binds = NamespaceBindings::new(table);
    let d = binds.prefix_for(DAV);
    let inner = format!(
        "<{d}:lockscope><{d}:{}/></{d}:lockscope>\
         <{d}:locktype><{d}:write/></{d}:locktype>\
         <{d}:owner><{d}:href>{}</{d}:href></{d}:owner>",
        scope.as_str(),
        escape_xml(owner_href)
    );
    format!(
        "{XML_DECL}<{d}:lockinfo{}>{inner}</{d}:lockinfo>",
        binds.declarations()
    )
}

/// Body of a `REPORT`: a vendor-namespaced root wrapping the requested
/// property names and an optional href list.
pub fn build_report_body(
    root: &PropertyKey,
    props: &[PropertyKey],
    hrefs: &[String],
    table: &NamespaceTable,
) -> String {
    let mut binds = NamespaceBindings::new(table);
    let r = if root.namespace.is_empty() {
        root.name.clone()
    } else {
        format!("{}:{}", binds.prefix_for(&root.namespace), root.name)
    };
    let d = binds.prefix_for(DAV);
    let mut inner = String::new();
    if !props.is_empty() {
        inner.push_str(&format!("<{d}:prop>"));
        for key in props {
            push_qualified_empty(&mut inner, &mut binds, key);
        }
        inner.push_str(&format!("</{d}:prop>"));
    }
    for href in hrefs {
        inner.push_str(&format!("<{d}:href>"));
        inner.push_str(&escape_xml(href));
        inner.push_str(&format!("</{d}:href>"));
    }
    format!("{XML_DECL}<{r}{}>{inner}</{r}>", binds.declarations())
}
