use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{Request, Response};
use hyper_rustls::HttpsConnectorBuilder;
use hyper_util::client::legacy::{Client, connect::HttpConnector};
use hyper_util::rt::TokioExecutor;

use crate::webdav::error::{DavError, DavResult};

/// Type alias for the Hyper client backing [`HyperTransport`].
pub type HyperClient = Client<hyper_rustls::HttpsConnector<HttpConnector>, Full<Bytes>>;

/// The capability this crate consumes from the HTTP layer: issue one
/// request, receive status + headers + body. Connection pooling, TLS,
/// redirects, and retry policy all live behind this seam.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn issue(&self, req: Request<Bytes>) -> DavResult<Response<Bytes>>;
}

/// Build a Hyper client configured with HTTP/2, connection pooling, and a
/// TLS connector that prefers native roots but falls back to the bundled
/// WebPKI store.
pub fn build_hyper_client() -> DavResult<HyperClient> {
    let https_builder = HttpsConnectorBuilder::new()
        .with_native_roots()
        .unwrap_or_else(|err| {
            tracing::warn!("falling back to webpki roots (native roots unavailable: {err})");
            HttpsConnectorBuilder::new().with_webpki_roots()
        });

    let https = https_builder
        .https_or_http()
        .enable_http1()
        .enable_http2()
        .build();

    Ok(Client::builder(TokioExecutor::new())
        .http2_adaptive_window(true)
        .pool_max_idle_per_host(128)
        .build::<_, Full<Bytes>>(https))
}

/// Production [`Transport`] on the Hyper stack. Responses are aggregated
/// into [`Bytes`] before being handed back.
pub struct HyperTransport {
    client: HyperClient,
}

impl HyperTransport {
    pub fn new() -> DavResult<Self> {
        Ok(Self {
            client: build_hyper_client()?,
        })
    }
}

#[async_trait]
impl Transport for HyperTransport {
    async fn issue(&self, req: Request<Bytes>) -> DavResult<Response<Bytes>> {
        let (parts, body) = req.into_parts();
        let req = Request::from_parts(parts, Full::new(body));
        let resp = self
            .client
            .request(req)
            .await
            .map_err(DavError::transport)?;
        let (parts, body) = resp.into_parts();
        let collected = body.collect().await.map_err(DavError::transport)?.to_bytes();
        Ok(Response::from_parts(parts, collected))
    }
}
