//! Per-verb request construction.
//!
//! Every function here is pure: it validates its parameters, resolves
//! namespaces against the supplied table, and returns a
//! [`RequestDescriptor`] without touching the network. Validation failures
//! are [`DavError::InvalidRequest`] and happen before any I/O could.

use bytes::Bytes;
use hyper::{HeaderMap, Method, header};

use crate::webdav::error::{DavError, DavResult};
use crate::webdav::ns::NamespaceTable;
use crate::webdav::types::{
    Depth, LockScope, LockTimeout, PropertyKey, PropertyValue, RequestDescriptor,
};
use crate::webdav::xml;

const XML_CONTENT_TYPE: &str = "application/xml; charset=utf-8";

pub(crate) fn dav_method(name: &[u8]) -> DavResult<Method> {
    Method::from_bytes(name).map_err(|e| DavError::invalid(format!("invalid method: {e}")))
}

pub(crate) fn header_value(value: &str) -> DavResult<header::HeaderValue> {
    header::HeaderValue::from_str(value)
        .map_err(|e| DavError::invalid(format!("invalid header value: {e}")))
}

fn require_path(path: &str) -> DavResult<()> {
    if path.trim().is_empty() {
        return Err(DavError::invalid("path must not be empty"));
    }
    Ok(())
}

fn xml_headers(extra_depth: Option<Depth>) -> DavResult<HeaderMap> {
    let mut h = HeaderMap::new();
    if let Some(depth) = extra_depth {
        h.insert("Depth", header::HeaderValue::from_static(depth.as_str()));
    }
    h.insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static(XML_CONTENT_TYPE),
    );
    Ok(h)
}

/// `PROPFIND`: `props = None` requests `<allprop/>`; a non-empty slice
/// requests exactly those properties.
pub fn propfind(
    path: &str,
    props: Option<&[PropertyKey]>,
    depth: Depth,
    table: &NamespaceTable,
) -> DavResult<RequestDescriptor> {
    require_path(path)?;
    if let Some(keys) = props
        && keys.is_empty()
    {
        return Err(DavError::invalid("property list must not be empty"));
    }
    let body = xml::build_propfind_body(props, table);
    Ok(RequestDescriptor {
        method: dav_method(b"PROPFIND")?,
        path: path.to_string(),
        headers: xml_headers(Some(depth))?,
        body: Some(Bytes::from(body)),
    })
}

/// `PROPPATCH`: at least one of `set` / `remove` must be non-empty.
pub fn proppatch(
    path: &str,
    set: &[(PropertyKey, PropertyValue)],
    remove: &[PropertyKey],
    table: &NamespaceTable,
) -> DavResult<RequestDescriptor> {
    require_path(path)?;
    if set.is_empty() && remove.is_empty() {
        return Err(DavError::invalid(
            "PROPPATCH requires at least one property to set or remove",
        ));
    }
    let body = xml::build_proppatch_body(set, remove, table);
    Ok(RequestDescriptor {
        method: dav_method(b"PROPPATCH")?,
        path: path.to_string(),
        headers: xml_headers(None)?,
        body: Some(Bytes::from(body)),
    })
}

/// `MKCOL`: no body.
pub fn mkcol(path: &str) -> DavResult<RequestDescriptor> {
    require_path(path)?;
    Ok(RequestDescriptor {
        method: dav_method(b"MKCOL")?,
        path: path.to_string(),
        headers: HeaderMap::new(),
        body: None,
    })
}

/// `PUT`: raw bytes passed through unchanged. `Content-Type` defaults to
/// `application/octet-stream`.
pub fn put(path: &str, body: Bytes, content_type: Option<&str>) -> DavResult<RequestDescriptor> {
    require_path(path)?;
    let mut headers = HeaderMap::new();
    match content_type {
        Some(ct) => {
            headers.insert(header::CONTENT_TYPE, header_value(ct)?);
        }
        None => {
            headers.insert(
                header::CONTENT_TYPE,
                header::HeaderValue::from_static("application/octet-stream"),
            );
        }
    }
    Ok(RequestDescriptor {
        method: Method::PUT,
        path: path.to_string(),
        headers,
        body: Some(body),
    })
}

pub fn get(path: &str) -> DavResult<RequestDescriptor> {
    require_path(path)?;
    Ok(RequestDescriptor {
        method: Method::GET,
        path: path.to_string(),
        headers: HeaderMap::new(),
        body: None,
    })
}

pub fn head(path: &str) -> DavResult<RequestDescriptor> {
    require_path(path)?;
    Ok(RequestDescriptor {
        method: Method::HEAD,
        path: path.to_string(),
        headers: HeaderMap::new(),
        body: None,
    })
}

pub fn options(path: &str) -> DavResult<RequestDescriptor> {
    Ok(RequestDescriptor {
        method: Method::OPTIONS,
        path: path.to_string(),
        headers: HeaderMap::new(),
        body: None,
    })
}

pub fn delete(path: &str) -> DavResult<RequestDescriptor> {
    require_path(path)?;
    Ok(RequestDescriptor {
        method: Method::DELETE,
        path: path.to_string(),
        headers: HeaderMap::new(),
        body: None,
    })
}

fn copy_or_move(
    method: &'static [u8],
    src_path: &str,
    dest_absolute_url: &str,
    overwrite: bool,
    condition: Option<&str>,
) -> DavResult<RequestDescriptor> {
    require_path(src_path)?;
    if dest_absolute_url.trim().is_empty() {
        return Err(DavError::invalid("destination must not be empty"));
    }
    let mut h = HeaderMap::new();
    h.insert("Destination", header_value(dest_absolute_url)?);
    h.insert(
        "Overwrite",
        header::HeaderValue::from_static(if overwrite { "T" } else { "F" }),
    );
    if let Some(cond) = condition {
        h.insert("If", header_value(cond)?);
    }
    Ok(RequestDescriptor {
        method: dav_method(method)?,
        path: src_path.to_string(),
        headers: h,
        body: None,
    })
}

/// `COPY` to an absolute `Destination` URL.
pub fn copy(
    src_path: &str,
    dest_absolute_url: &str,
    overwrite: bool,
    condition: Option<&str>,
) -> DavResult<RequestDescriptor> {
    copy_or_move(b"COPY", src_path, dest_absolute_url, overwrite, condition)
}

/// `MOVE` to an absolute `Destination` URL.
pub fn r#move(
    src_path: &str,
    dest_absolute_url: &str,
    overwrite: bool,
    condition: Option<&str>,
) -> DavResult<RequestDescriptor> {
    copy_or_move(b"MOVE", src_path, dest_absolute_url, overwrite, condition)
}

/// `LOCK`: write lock with the given scope, owner href, and timeout.
///
/// RFC 4918 only permits Depth `0` or `infinity` on LOCK; `One` is
/// normalized to `0`.
pub fn lock(
    path: &str,
    scope: LockScope,
    owner_href: &str,
    timeout: LockTimeout,
    depth: Depth,
    table: &NamespaceTable,
) -> DavResult<RequestDescriptor> {
    require_path(path)?;
    if owner_href.trim().is_empty() {
        return Err(DavError::invalid("lock owner must not be empty"));
    }
    let depth = match depth {
        Depth::One => Depth::Zero,
        other => other,
    };
    let mut headers = xml_headers(Some(depth))?;
    headers.insert("Timeout", header_value(&timeout.as_header())?);
    let body = xml::build_lockinfo_body(scope, owner_href, table);
    Ok(RequestDescriptor {
        method: dav_method(b"LOCK")?,
        path: path.to_string(),
        headers,
        body: Some(Bytes::from(body)),
    })
}

/// `UNLOCK`: no body; the token travels in the `Lock-Token` header wrapped
/// in angle brackets.
pub fn unlock(path: &str, token: &str) -> DavResult<RequestDescriptor> {
    require_path(path)?;
    if token.trim().is_empty() {
        return Err(DavError::invalid("lock token must not be empty"));
    }
    let wrapped = if token.starts_with('<') {
        token.to_string()
    } else {
        format!("<{token}>")
    };
    let mut h = HeaderMap::new();
    h.insert("Lock-Token", header_value(&wrapped)?);
    Ok(RequestDescriptor {
        method: dav_method(b"UNLOCK")?,
        path: path.to_string(),
        headers: h,
        body: None,
    })
}

/// `REPORT`: vendor-namespaced root element wrapping property names and an
/// href list.
pub fn report(
    path: &str,
    root: &PropertyKey,
    props: &[PropertyKey],
    hrefs: &[String],
    depth: Depth,
    table: &NamespaceTable,
) -> DavResult<RequestDescriptor> {
    require_path(path)?;
    if root.name.trim().is_empty() {
        return Err(DavError::invalid("report root element must be named"));
    }
    let body = xml::build_report_body(root, props, hrefs, table);
    Ok(RequestDescriptor {
        method: dav_method(b"REPORT")?,
        path: path.to_string(),
        headers: xml_headers(Some(depth))?,
        body: Some(Bytes::from(body)),
    })
}
