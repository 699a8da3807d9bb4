//! Streaming parser for `207 Multi-Status` bodies.
//!
//! Responses are produced strictly in document order. Property names are
//! resolved against the document's own in-scope `xmlns` declarations, so the
//! parser copes with whatever prefixes a server chooses (standard WebDAV,
//! SharePoint-style default namespaces, vendor extensions). Properties the
//! parser has no schema for are preserved as raw XML fragments.

use std::collections::BTreeSet;
use std::io::{BufRead, Cursor};

use futures_util::TryStreamExt;
use http_body_util::BodyStream;
use hyper::body::Incoming;
use quick_xml::Reader;
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};
use tokio::io::BufReader;
use tokio_util::io::StreamReader;
use tracing::warn;

use crate::webdav::error::{DavError, DavResult};
use crate::webdav::ns::DAV;
use crate::webdav::types::{LockTimeout, PropertyKey, PropertyValue, ResourceRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementName {
    Multistatus,
    Response,
    Propstat,
    Prop,
    Href,
    Status,
    Other,
}

fn split_qname(raw: &[u8]) -> (&[u8], &[u8]) {
    match raw.iter().position(|b| *b == b':') {
        Some(idx) => (&raw[..idx], &raw[idx + 1..]),
        None => (&b""[..], raw),
    }
}

pub fn element_from_bytes(raw: &[u8]) -> ElementName {
    let (_, local) = split_qname(raw);

    if local.eq_ignore_ascii_case(b"multistatus") {
        ElementName::Multistatus
    } else if local.eq_ignore_ascii_case(b"response") {
        ElementName::Response
    } else if local.eq_ignore_ascii_case(b"propstat") {
        ElementName::Propstat
    } else if local.eq_ignore_ascii_case(b"prop") {
        ElementName::Prop
    } else if local.eq_ignore_ascii_case(b"href") {
        ElementName::Href
    } else if local.eq_ignore_ascii_case(b"status") {
        ElementName::Status
    } else {
        ElementName::Other
    }
}

pub(crate) trait RecordConsumer {
    fn consume(&mut self, record: ResourceRecord) -> DavResult<()>;
}

impl RecordConsumer for Vec<ResourceRecord> {
    fn consume(&mut self, record: ResourceRecord) -> DavResult<()> {
        self.push(record);
        Ok(())
    }
}

impl<F> RecordConsumer for F
where
    F: FnMut(ResourceRecord) -> DavResult<()>,
{
    fn consume(&mut self, record: ResourceRecord) -> DavResult<()> {
        (self)(record)
    }
}

fn status_code(line: &str) -> Option<u16> {
    line.split_whitespace().nth(1).and_then(|tok| tok.parse().ok())
}

fn start_tag_text(e: &BytesStart<'_>, self_closing: bool) -> String {
    let mut out = String::from("<");
    out.push_str(&String::from_utf8_lossy(e.name().as_ref()));
    for attr in e.attributes().with_checks(false).flatten() {
        out.push(' ');
        out.push_str(&String::from_utf8_lossy(attr.key.as_ref()));
        out.push_str("=\"");
        out.push_str(&String::from_utf8_lossy(&attr.value));
        out.push('"');
    }
    out.push_str(if self_closing { "/>" } else { ">" });
    out
}

fn xmlns_declarations(e: &BytesStart<'_>) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for attr in e.attributes().with_checks(false).flatten() {
        let key = attr.key.as_ref();
        let value = attr
            .unescape_value()
            .map(|v| v.into_owned())
            .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).into_owned());
        if key == b"xmlns" {
            out.push((String::new(), value));
        } else if let Some(prefix) = key.strip_prefix(b"xmlns:") {
            out.push((String::from_utf8_lossy(prefix).into_owned(), value));
        }
    }
    out
}

/// In-flight capture of one property element inside `<prop>`.
struct PropCapture {
    key: PropertyKey,
    depth: usize,
    text: String,
    fragment: String,
    has_child: bool,
    has_collection_child: bool,
}

pub(crate) struct MultistatusParser<C> {
    stack: Vec<ElementName>,
    scopes: Vec<Vec<(String, String)>>,
    capture: Option<PropCapture>,
    current: ResourceRecord,
    pending_props: Vec<(PropertyKey, PropertyValue)>,
    pending_status: Option<String>,
    pending_collection: bool,
    seen_hrefs: BTreeSet<String>,
    saw_multistatus: bool,
    sink: C,
}

impl<C: RecordConsumer> MultistatusParser<C> {
    pub fn new(sink: C) -> Self {
        Self {
            stack: Vec::with_capacity(16),
            scopes: Vec::with_capacity(16),
            capture: None,
            current: ResourceRecord::default(),
            pending_props: Vec::new(),
            pending_status: None,
            pending_collection: false,
            seen_hrefs: BTreeSet::new(),
            saw_multistatus: false,
            sink,
        }
    }

    fn finish(self) -> DavResult<C> {
        if !self.saw_multistatus {
            return Err(DavError::malformed("document has no multistatus element"));
        }
        Ok(self.sink)
    }

    fn path_ends_with(&self, needle: &[ElementName]) -> bool {
        self.stack.len() >= needle.len()
            && self.stack[self.stack.len() - needle.len()..] == needle[..]
    }

    fn resolve(&self, local_decls: &[(String, String)], prefix: &str) -> Option<String> {
        for (p, uri) in local_decls.iter().rev() {
            if p == prefix {
                return Some(uri.clone());
            }
        }
        for frame in self.scopes.iter().rev() {
            for (p, uri) in frame.iter().rev() {
                if p == prefix {
                    return Some(uri.clone());
                }
            }
        }
        None
    }

    fn on_event(&mut self, ev: &Event<'_>) -> DavResult<()> {
        match ev {
            Event::Start(e) => self.on_start(e, false),
            Event::Empty(e) => self.on_start(e, true),
            Event::End(e) => self.on_end(e.name().as_ref()),
            Event::Text(e) => {
                let decoded = decode_text(e.as_ref())?;
                self.on_text(&decoded, e.as_ref());
                Ok(())
            }
            Event::CData(e) => {
                let text = String::from_utf8_lossy(e.as_ref()).into_owned();
                self.on_cdata(&text);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn on_start(&mut self, e: &BytesStart<'_>, self_closing: bool) -> DavResult<()> {
        let decls = xmlns_declarations(e);
        if !self_closing {
            self.scopes.push(decls.clone());
        }

        if self.capture.is_some() {
            let name = e.name();
            let (prefix, local) = split_qname(name.as_ref());
            let prefix = String::from_utf8_lossy(prefix).into_owned();
            let local_decls = if self_closing { decls.as_slice() } else { &[] };
            let is_collection_child = self.resolve(local_decls, &prefix).as_deref() == Some(DAV)
                && local.eq_ignore_ascii_case(b"collection");
            let tag = start_tag_text(e, self_closing);
            if let Some(cap) = self.capture.as_mut() {
                cap.has_child = true;
                if is_collection_child {
                    cap.has_collection_child = true;
                }
                cap.fragment.push_str(&tag);
                if !self_closing {
                    cap.depth += 1;
                }
            }
            return Ok(());
        }

        // Direct child of <prop>: start (or immediately finish) a property.
        if self.path_ends_with(&[ElementName::Response, ElementName::Propstat, ElementName::Prop])
        {
            let name = e.name();
            let (prefix, local) = split_qname(name.as_ref());
            let prefix = String::from_utf8_lossy(prefix).into_owned();
            let local_decls = if self_closing { decls.as_slice() } else { &[] };
            let namespace = match self.resolve(local_decls, &prefix) {
                Some(uri) => uri,
                None => {
                    if !prefix.is_empty() {
                        warn!(prefix = %prefix, "unbound namespace prefix in multistatus");
                    }
                    String::new()
                }
            };
            let key = PropertyKey::new(namespace, String::from_utf8_lossy(local).into_owned());
            if self_closing {
                self.pending_props.push((key, PropertyValue::Empty));
            } else {
                self.capture = Some(PropCapture {
                    key,
                    depth: 0,
                    text: String::new(),
                    fragment: String::new(),
                    has_child: false,
                    has_collection_child: false,
                });
            }
            return Ok(());
        }

        let element = element_from_bytes(e.name().as_ref());
        if self_closing {
            if element == ElementName::Response
                && self.path_ends_with(&[ElementName::Multistatus])
            {
                return Err(DavError::malformed("response element missing href"));
            }
            return Ok(());
        }

        self.stack.push(element);
        match element {
            ElementName::Multistatus => {
                self.saw_multistatus = true;
            }
            ElementName::Response => {
                if self.path_ends_with(&[ElementName::Multistatus, ElementName::Response]) {
                    self.current = ResourceRecord::default();
                    self.pending_props.clear();
                    self.pending_status = None;
                    self.pending_collection = false;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn on_end(&mut self, qname: &[u8]) -> DavResult<()> {
        self.scopes.pop();

        if let Some(mut cap) = self.capture.take() {
            if cap.depth == 0 {
                self.finalize_property(cap);
            } else {
                cap.depth -= 1;
                cap.fragment.push_str("</");
                cap.fragment.push_str(&String::from_utf8_lossy(qname));
                cap.fragment.push('>');
                self.capture = Some(cap);
            }
            return Ok(());
        }

        let element = element_from_bytes(qname);
        let closing_response =
            self.path_ends_with(&[ElementName::Multistatus, ElementName::Response]);
        self.stack.pop();
        match element {
            ElementName::Propstat => self.flush_propstat(),
            ElementName::Response if closing_response => self.finish_response()?,
            _ => {}
        }
        Ok(())
    }

    fn on_text(&mut self, decoded: &str, raw: &[u8]) {
        if let Some(cap) = self.capture.as_mut() {
            cap.fragment.push_str(&String::from_utf8_lossy(raw));
            cap.text.push_str(decoded);
            return;
        }
        self.route_text(decoded);
    }

    fn on_cdata(&mut self, text: &str) {
        if let Some(cap) = self.capture.as_mut() {
            cap.fragment.push_str("<![CDATA[");
            cap.fragment.push_str(text);
            cap.fragment.push_str("]]>");
            cap.text.push_str(text);
            return;
        }
        self.route_text(text);
    }

    fn route_text(&mut self, text: &str) {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return;
        }
        if self.path_ends_with(&[ElementName::Response, ElementName::Href]) {
            // First href wins; RFC 4918 allows exactly one per response.
            if self.current.href.is_empty() {
                self.current.href = trimmed.to_string();
            }
        } else if self.path_ends_with(&[
            ElementName::Response,
            ElementName::Propstat,
            ElementName::Status,
        ]) {
            self.pending_status = Some(trimmed.to_string());
        } else if self.path_ends_with(&[ElementName::Response, ElementName::Status]) {
            self.current.status = Some(trimmed.to_string());
        }
    }

    fn finalize_property(&mut self, cap: PropCapture) {
        if cap.key.namespace == DAV
            && cap.key.name.eq_ignore_ascii_case("resourcetype")
            && cap.has_collection_child
        {
            self.pending_collection = true;
        }
        let value = if cap.has_child {
            PropertyValue::Fragment(cap.fragment)
        } else {
            let trimmed = cap.text.trim();
            if trimmed.is_empty() {
                PropertyValue::Empty
            } else {
                PropertyValue::Text(trimmed.to_string())
            }
        };
        self.pending_props.push((cap.key, value));
    }

    fn flush_propstat(&mut self) {
        let status_line = self.pending_status.take();
        let code = status_line.as_deref().and_then(status_code);
        // A propstat without a parsable status is treated as successful;
        // some servers omit it on all-200 responses.
        let succeeded = code.map(|c| (200..300).contains(&c)).unwrap_or(true);
        if self.current.status.is_none() && status_line.is_some() {
            self.current.status = status_line;
        }
        let props = std::mem::take(&mut self.pending_props);
        if succeeded {
            for (key, value) in props {
                self.current.properties.entry(key).or_insert(value);
            }
            if self.pending_collection {
                self.current.is_collection = true;
            }
        } else {
            let code = code.unwrap_or(0);
            for (key, _) in props {
                self.current.failed_properties.entry(key).or_insert(code);
            }
        }
        self.pending_collection = false;
    }

    fn finish_response(&mut self) -> DavResult<()> {
        let record = std::mem::take(&mut self.current);
        if record.href.is_empty() {
            return Err(DavError::malformed("response element missing href"));
        }
        if !self.seen_hrefs.insert(record.href.clone()) {
            warn!(href = %record.href, "duplicate href in multistatus, keeping first occurrence");
            return Ok(());
        }
        self.sink.consume(record)
    }
}

fn parse_multistatus_reader<R, C>(reader: R, sink: C) -> DavResult<C>
where
    R: BufRead,
    C: RecordConsumer,
{
    let mut xml = Reader::from_reader(reader);
    xml.config_mut().trim_text(false);

    let mut buf = Vec::with_capacity(8 * 1024);
    let mut parser = MultistatusParser::new(sink);

    loop {
        match xml.read_event_into(&mut buf) {
            Ok(Event::Eof) => break,
            Ok(ev) => parser.on_event(&ev)?,
            Err(e) => return Err(DavError::malformed(format!("invalid XML: {e}"))),
        }
        buf.clear();
    }

    parser.finish()
}

async fn parse_multistatus_incoming<C>(resp_body: Incoming, sink: C) -> DavResult<C>
where
    C: RecordConsumer + Send,
{
    let stream = BodyStream::new(resp_body)
        .map_ok(|frame| frame.into_data().unwrap_or_default())
        .map_err(std::io::Error::other);
    let reader = BufReader::new(StreamReader::new(stream));

    let mut xml = Reader::from_reader(reader);
    xml.config_mut().trim_text(false);

    let mut buf = Vec::with_capacity(8 * 1024);
    let mut parser = MultistatusParser::new(sink);

    loop {
        match xml.read_event_into_async(&mut buf).await {
            Ok(Event::Eof) => break,
            Ok(ev) => parser.on_event(&ev)?,
            Err(e) => return Err(DavError::malformed(format!("invalid XML: {e}"))),
        }
        buf.clear();
    }

    parser.finish()
}

/// Parse an aggregated `207 Multi-Status` body into records in document
/// order.
pub fn parse_multistatus_bytes(body: &[u8]) -> DavResult<Vec<ResourceRecord>> {
    parse_multistatus_reader(Cursor::new(body), Vec::<ResourceRecord>::new())
}

/// Parse an aggregated multistatus body, invoking a callback per record.
pub fn parse_multistatus_bytes_visit<F>(body: &[u8], on_record: F) -> DavResult<()>
where
    F: FnMut(ResourceRecord) -> DavResult<()>,
{
    parse_multistatus_reader(Cursor::new(body), on_record)?;
    Ok(())
}

/// Parse a `207 Multi-Status` body in **streaming mode**, without
/// aggregating the response into memory first.
pub async fn parse_multistatus_stream(resp_body: Incoming) -> DavResult<Vec<ResourceRecord>> {
    parse_multistatus_incoming(resp_body, Vec::<ResourceRecord>::new()).await
}

/// Stream parse a multistatus body, invoking a callback per record.
pub async fn parse_multistatus_stream_visit<F>(resp_body: Incoming, on_record: F) -> DavResult<()>
where
    F: FnMut(ResourceRecord) -> DavResult<()> + Send,
{
    parse_multistatus_incoming(resp_body, on_record).await?;
    Ok(())
}

/// Lock token and timeout extracted from a LOCK response body.
#[derive(Debug, Clone)]
pub struct LockDiscovery {
    pub token: String,
    pub timeout: Option<LockTimeout>,
}

/// Extract the lock token (and granted timeout, when present) from the
/// `<lockdiscovery>` XML of a LOCK response. Used when the `Lock-Token`
/// response header is absent.
pub fn parse_lockdiscovery(body: &[u8]) -> DavResult<Option<LockDiscovery>> {
    let mut xml = Reader::from_reader(Cursor::new(body));
    xml.config_mut().trim_text(false);

    let mut buf = Vec::with_capacity(1024);
    let mut in_locktoken = false;
    let mut in_timeout = false;
    let mut in_token_href = false;
    let mut token: Option<String> = None;
    let mut timeout: Option<LockTimeout> = None;

    loop {
        match xml.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = e.name();
                let (_, local) = split_qname(name.as_ref());
                if local.eq_ignore_ascii_case(b"locktoken") {
                    in_locktoken = true;
                } else if local.eq_ignore_ascii_case(b"timeout") {
                    in_timeout = true;
                } else if local.eq_ignore_ascii_case(b"href") && in_locktoken {
                    in_token_href = true;
                }
            }
            Ok(Event::End(e)) => {
                let name = e.name();
                let (_, local) = split_qname(name.as_ref());
                if local.eq_ignore_ascii_case(b"locktoken") {
                    in_locktoken = false;
                } else if local.eq_ignore_ascii_case(b"timeout") {
                    in_timeout = false;
                } else if local.eq_ignore_ascii_case(b"href") {
                    in_token_href = false;
                }
            }
            Ok(Event::Text(e)) => {
                let text = decode_text(e.as_ref())?;
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    if in_token_href && token.is_none() {
                        token = Some(trimmed.to_string());
                    } else if in_timeout && timeout.is_none() {
                        timeout = LockTimeout::parse(trimmed);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(DavError::malformed(format!("invalid XML: {e}"))),
            _ => {}
        }
        buf.clear();
    }

    Ok(token.map(|token| LockDiscovery { token, timeout }))
}

pub(crate) fn decode_text(raw: &[u8]) -> DavResult<String> {
    match std::str::from_utf8(raw) {
        Ok(s) => Ok(unescape(s)
            .map_err(|err| DavError::malformed(format!("invalid XML text: {err}")))?
            .into_owned()),
        Err(_) => Ok(String::from_utf8_lossy(raw).into_owned()),
    }
}
