pub mod client;
pub mod error;
pub mod gate;
pub mod lock;
pub mod ns;
pub mod request;
pub mod streaming;
pub mod types;
pub mod xml;

pub use client::WebDavClient;
pub use error::{DavError, DavResult};
pub use gate::{GatePermit, OperationClass, RequestGate};
pub use lock::LockManager;
pub use ns::{DAV, NamespaceTable};
pub use streaming::{
    LockDiscovery, parse_lockdiscovery, parse_multistatus_bytes, parse_multistatus_bytes_visit,
    parse_multistatus_stream, parse_multistatus_stream_visit,
};
pub use types::{
    ActiveLock, BatchItem, Depth, LockScope, LockTimeout, PropertyKey, PropertyValue,
    RequestDescriptor, ResourceRecord,
};
pub use xml::escape_xml;
