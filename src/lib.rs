//! Asynchronous WebDAV (RFC 4918) client core for Rust.
//!
//! This library builds protocol-correct requests for the WebDAV verbs
//! (PROPFIND, PROPPATCH, MKCOL, COPY, MOVE, LOCK, UNLOCK, REPORT) and parses
//! the `207 Multi-Status` XML they return into strongly-typed resource
//! records, on top of a pluggable HTTP transport (hyper 1.x + rustls by
//! default).
//!
//! # Features
//!
//! - Pure, namespace-aware request builders producing wire-ready descriptors
//! - Streaming multi-status parsing with per-document `xmlns` resolution,
//!   tolerant of server prefix variation (standard WebDAV, SharePoint-style,
//!   vendor extensions)
//! - Per-property status partitioning: `404` propstat blocks never pollute
//!   the successful property set
//! - Lock token tracking with local conflict detection and automatic `If`
//!   header conditions on mutating requests
//! - Write serialization: mutating verbs run one at a time in FIFO order
//!   while reads proceed concurrently
//! - Batch operations with bounded concurrency
//!
//! # Examples
//!
//! ## Listing a collection
//!
//! ```no_run
//! use webdav_client_rs::{WebDavClient, Depth, PropertyKey};
//! use anyhow::Result;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = WebDavClient::new(
//!         "https://dav.example.com/remote.php/dav/files/user/",
//!         Some("username"),
//!         Some("password"),
//!     )?;
//!
//!     let props = [
//!         PropertyKey::dav("displayname"),
//!         PropertyKey::dav("getetag"),
//!         PropertyKey::dav("getcontentlength"),
//!         PropertyKey::dav("resourcetype"),
//!     ];
//!     let records = client.propfind("projects/", Some(&props), Depth::One).await?;
//!     for record in &records {
//!         println!(
//!             "{} collection={} etag={:?}",
//!             record.href,
//!             record.is_collection,
//!             record.etag()
//!         );
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Locked update
//!
//! ```no_run
//! use webdav_client_rs::{WebDavClient, Depth, LockScope, LockTimeout};
//! use bytes::Bytes;
//! use anyhow::Result;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = WebDavClient::new("https://dav.example.com/", None, None)?;
//!
//!     // Acquire an exclusive write lock; the granted token is attached as
//!     // an `If` condition to the PUT below automatically.
//!     let lock = client
//!         .lock(
//!             "docs/report.txt",
//!             LockScope::Exclusive,
//!             "https://example.com/users/me",
//!             LockTimeout::Seconds(600),
//!             Depth::Zero,
//!         )
//!         .await?;
//!     println!("locked with token {}", lock.token);
//!
//!     client
//!         .put("docs/report.txt", Bytes::from_static(b"updated"), Some("text/plain"))
//!         .await?;
//!     client.unlock("docs/report.txt").await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Parsing a multi-status body directly
//!
//! ```
//! use webdav_client_rs::parse_multistatus_bytes;
//!
//! let xml = br#"<?xml version="1.0" encoding="utf-8"?>
//! <D:multistatus xmlns:D="DAV:">
//!   <D:response>
//!     <D:href>/files/a.txt</D:href>
//!     <D:propstat>
//!       <D:prop><D:getetag>"abc"</D:getetag></D:prop>
//!       <D:status>HTTP/1.1 200 OK</D:status>
//!     </D:propstat>
//!   </D:response>
//! </D:multistatus>"#;
//!
//! let records = parse_multistatus_bytes(xml).unwrap();
//! assert_eq!(records[0].href, "/files/a.txt");
//! assert_eq!(records[0].etag(), Some("\"abc\""));
//! ```
pub mod common;
pub mod webdav;

pub use common::http::{HyperClient, HyperTransport, Transport, build_hyper_client};
pub use webdav::client::WebDavClient;
pub use webdav::error::{DavError, DavResult};
pub use webdav::gate::{GatePermit, OperationClass, RequestGate};
pub use webdav::lock::LockManager;
pub use webdav::ns::{DAV, NamespaceTable};
pub use webdav::streaming::{
    LockDiscovery, parse_lockdiscovery, parse_multistatus_bytes, parse_multistatus_bytes_visit,
    parse_multistatus_stream, parse_multistatus_stream_visit,
};
pub use webdav::types::{
    ActiveLock, BatchItem, Depth, LockScope, LockTimeout, PropertyKey, PropertyValue,
    RequestDescriptor, ResourceRecord,
};
pub use webdav::xml::escape_xml;
