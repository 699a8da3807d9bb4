pub mod http;

pub use http::{HyperClient, HyperTransport, Transport, build_hyper_client};
