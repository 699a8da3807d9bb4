use std::sync::Arc;
use std::time::Instant;

use anyhow::anyhow;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use bytes::Bytes;
use futures::{StreamExt, stream::FuturesOrdered};
use hyper::{HeaderMap, Request, Response, Uri, header};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::{Duration, timeout};

use crate::common::http::{HyperTransport, Transport};
use crate::webdav::error::{DavError, DavResult};
use crate::webdav::gate::{DEFAULT_READ_CONCURRENCY, OperationClass, RequestGate};
use crate::webdav::lock::LockManager;
use crate::webdav::ns::NamespaceTable;
use crate::webdav::request::{self, header_value};
use crate::webdav::streaming::{parse_lockdiscovery, parse_multistatus_bytes};
use crate::webdav::types::{
    ActiveLock, BatchItem, Depth, LockScope, LockTimeout, PropertyKey, PropertyValue,
    RequestDescriptor, ResourceRecord,
};

/// Asynchronous WebDAV client.
///
/// The protocol pieces (request builder, multi-status parser, lock manager,
/// admission gate) are glued to a pluggable [`Transport`]; the default
/// transport is the Hyper stack from [`crate::common::http`].
#[derive(Clone)]
pub struct WebDavClient {
    base: Uri,
    transport: Arc<dyn Transport>,
    auth_header: Option<header::HeaderValue>,
    default_timeout: Duration,
    namespaces: NamespaceTable,
    locks: Arc<LockManager>,
    gate: Arc<RequestGate>,
}

impl WebDavClient {
    /// Create a new client from a **base URL** (collection root) and
    /// optional **Basic** credentials, on the default Hyper transport.
    pub fn new(base_url: &str, basic_user: Option<&str>, basic_pass: Option<&str>) -> DavResult<Self> {
        let transport = Arc::new(HyperTransport::new()?);
        let mut client = Self::with_transport(base_url, transport)?;
        client.auth_header = if let (Some(u), Some(p)) = (basic_user, basic_pass) {
            let token = format!("{}:{}", u, p);
            Some(header_value(&format!("Basic {}", B64.encode(token)))?)
        } else {
            None
        };
        Ok(client)
    }

    /// Create a client over a caller-supplied transport (tests, custom HTTP
    /// stacks).
    pub fn with_transport(base_url: &str, transport: Arc<dyn Transport>) -> DavResult<Self> {
        let base: Uri = base_url
            .parse()
            .map_err(|e| DavError::invalid(format!("invalid base URL: {e}")))?;
        Ok(Self {
            base,
            transport,
            auth_header: None,
            default_timeout: Duration::from_secs(20),
            namespaces: NamespaceTable::new(),
            locks: Arc::new(LockManager::new()),
            gate: Arc::new(RequestGate::new(DEFAULT_READ_CONCURRENCY)),
        })
    }

    pub fn set_default_timeout(&mut self, timeout: Duration) {
        self.default_timeout = timeout;
    }

    /// Register a namespace abbreviation for outbound request bodies.
    pub fn register_namespace(
        &mut self,
        abbreviation: impl Into<String>,
        uri: impl Into<String>,
    ) -> DavResult<()> {
        self.namespaces.register(abbreviation, uri)
    }

    pub fn namespaces(&self) -> &NamespaceTable {
        &self.namespaces
    }

    pub fn lock_manager(&self) -> &LockManager {
        &self.locks
    }

    pub fn build_uri(&self, path: &str) -> DavResult<Uri> {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path
                .parse()
                .map_err(|e| DavError::invalid(format!("invalid URL: {e}")));
        }

        let mut parts = self.base.clone().into_parts();
        let existing_path = parts
            .path_and_query
            .as_ref()
            .map(|pq| pq.path())
            .unwrap_or("/");

        let (path_only, query) = if let Some((p, q)) = path.split_once('?') {
            (p, Some(q))
        } else {
            (path, None)
        };

        let mut combined = if path_only.is_empty() {
            existing_path.to_string()
        } else if path_only.starts_with('/') {
            path_only.to_string()
        } else {
            let mut base = existing_path.trim_end_matches('/').to_string();
            if base.is_empty() {
                base.push('/');
            }
            if !base.ends_with('/') {
                base.push('/');
            }
            base.push_str(path_only);
            base
        };

        if combined.is_empty() {
            combined.push('/');
        }

        let path_and_query = if let Some(q) = query {
            format!("{}?{}", combined, q)
                .parse()
                .map_err(|e| DavError::invalid(format!("invalid path: {e}")))?
        } else {
            combined
                .parse()
                .map_err(|e| DavError::invalid(format!("invalid path: {e}")))?
        };

        parts.path_and_query = Some(path_and_query);
        Uri::from_parts(parts).map_err(|e| DavError::invalid(format!("invalid URL: {e}")))
    }

    /// Absolute URL string for a path, suitable for the `Destination`
    /// header. Already-absolute inputs pass through.
    pub fn absolute_url(&self, path: &str) -> DavResult<String> {
        Ok(self.build_uri(path)?.to_string())
    }

    /// Extract the `ETag` from a response header map, if present.
    pub fn etag_from_headers(headers: &HeaderMap) -> Option<String> {
        headers
            .get(header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
    }

    // ----------- Core send path -----------

    /// Admit the request through the serialization gate, attach auth and
    /// lock conditions, and exchange it over the transport.
    pub async fn execute(
        &self,
        desc: RequestDescriptor,
        per_req_timeout: Option<Duration>,
    ) -> DavResult<Response<Bytes>> {
        let class = OperationClass::of(&desc.method);
        let _permit = self.gate.admit(class).await;

        let uri = self.build_uri(&desc.path)?;
        let mut headers = desc.headers.clone();

        // Conditional mutating requests against a locked path carry the
        // tracked token. LOCK/UNLOCK manage tokens through their own
        // headers.
        let verb = desc.method.as_str();
        if class == OperationClass::Mutating
            && verb != "LOCK"
            && verb != "UNLOCK"
            && !headers.contains_key("If")
            && let Some(cond) = self.locks.if_header(&desc.path, Instant::now())
        {
            headers.insert("If", header_value(&cond)?);
        }

        let mut req_builder = Request::builder().method(desc.method.clone()).uri(uri);
        if let Some(auth) = &self.auth_header {
            req_builder = req_builder.header(header::AUTHORIZATION, auth);
        }
        for (k, v) in headers.iter() {
            req_builder = req_builder.header(k, v);
        }

        let req = req_builder
            .body(desc.body.unwrap_or_default())
            .map_err(|e| DavError::invalid(format!("invalid request: {e}")))?;

        let fut = self.transport.issue(req);
        match timeout(per_req_timeout.unwrap_or(self.default_timeout), fut).await {
            Ok(result) => result,
            Err(_) => Err(DavError::transport(anyhow!("request timed out"))),
        }
    }

    fn protocol_error(resp: &Response<Bytes>) -> DavError {
        let status = resp.status();
        let snippet: String = String::from_utf8_lossy(resp.body()).chars().take(200).collect();
        let message = if snippet.trim().is_empty() {
            status.canonical_reason().unwrap_or("").to_string()
        } else {
            snippet
        };
        DavError::Protocol {
            status: status.as_u16(),
            message,
        }
    }

    fn expect_success(resp: Response<Bytes>) -> DavResult<Response<Bytes>> {
        if resp.status().is_success() {
            Ok(resp)
        } else {
            Err(Self::protocol_error(&resp))
        }
    }

    /// 207 bodies run through the multi-status parser; any other success is
    /// an empty record set; failures become [`DavError::Protocol`].
    fn expect_multistatus(resp: Response<Bytes>) -> DavResult<Vec<ResourceRecord>> {
        match resp.status().as_u16() {
            207 => parse_multistatus_bytes(resp.body()),
            code if (200..300).contains(&code) => Ok(Vec::new()),
            _ => Err(Self::protocol_error(&resp)),
        }
    }

    // ----------- HTTP/WebDAV verbs -----------

    /// Send an `OPTIONS` request; the raw response is returned for
    /// capability inspection (`Allow`, `DAV` headers).
    pub async fn options(&self, path: &str) -> DavResult<Response<Bytes>> {
        self.execute(request::options(path)?, None).await
    }

    /// Send a `HEAD` request.
    pub async fn head(&self, path: &str) -> DavResult<Response<Bytes>> {
        self.execute(request::head(path)?, None).await
    }

    /// Send a `GET` request and return the raw response.
    pub async fn get(&self, path: &str) -> DavResult<Response<Bytes>> {
        self.execute(request::get(path)?, None).await
    }

    /// Send a `PUT`. `content_type` defaults to `application/octet-stream`.
    pub async fn put(
        &self,
        path: &str,
        body: Bytes,
        content_type: Option<&str>,
    ) -> DavResult<Response<Bytes>> {
        let resp = self
            .execute(request::put(path, body, content_type)?, None)
            .await?;
        Self::expect_success(resp)
    }

    /// Send a `DELETE`.
    pub async fn delete(&self, path: &str) -> DavResult<Response<Bytes>> {
        let resp = self.execute(request::delete(path)?, None).await?;
        Self::expect_success(resp)
    }

    /// Send a `MKCOL` to create a collection.
    pub async fn mkcol(&self, path: &str) -> DavResult<Response<Bytes>> {
        let resp = self.execute(request::mkcol(path)?, None).await?;
        Self::expect_success(resp)
    }

    /// Send a WebDAV `COPY` to a destination path or absolute URL.
    pub async fn copy(
        &self,
        src_path: &str,
        destination: &str,
        overwrite: bool,
        condition: Option<&str>,
    ) -> DavResult<Response<Bytes>> {
        let dest = self.absolute_url(destination)?;
        let resp = self
            .execute(request::copy(src_path, &dest, overwrite, condition)?, None)
            .await?;
        Self::expect_success(resp)
    }

    /// Send a WebDAV `MOVE` to a destination path or absolute URL.
    pub async fn r#move(
        &self,
        src_path: &str,
        destination: &str,
        overwrite: bool,
        condition: Option<&str>,
    ) -> DavResult<Response<Bytes>> {
        let dest = self.absolute_url(destination)?;
        let resp = self
            .execute(request::r#move(src_path, &dest, overwrite, condition)?, None)
            .await?;
        Self::expect_success(resp)
    }

    /// Send a `PROPFIND`. `props = None` requests `<allprop/>`.
    pub async fn propfind(
        &self,
        path: &str,
        props: Option<&[PropertyKey]>,
        depth: Depth,
    ) -> DavResult<Vec<ResourceRecord>> {
        let desc = request::propfind(path, props, depth, &self.namespaces)?;
        let resp = self.execute(desc, None).await?;
        Self::expect_multistatus(resp)
    }

    /// Send a `PROPPATCH` setting and/or removing properties.
    pub async fn proppatch(
        &self,
        path: &str,
        set: &[(PropertyKey, PropertyValue)],
        remove: &[PropertyKey],
    ) -> DavResult<Vec<ResourceRecord>> {
        let desc = request::proppatch(path, set, remove, &self.namespaces)?;
        let resp = self.execute(desc, None).await?;
        Self::expect_multistatus(resp)
    }

    /// Send a `REPORT` with a vendor-namespaced root element.
    pub async fn report(
        &self,
        path: &str,
        root: &PropertyKey,
        props: &[PropertyKey],
        hrefs: &[String],
        depth: Depth,
    ) -> DavResult<Vec<ResourceRecord>> {
        let desc = request::report(path, root, props, hrefs, depth, &self.namespaces)?;
        let resp = self.execute(desc, None).await?;
        Self::expect_multistatus(resp)
    }

    // ----------- Locking -----------

    /// Acquire a write lock on `path`.
    ///
    /// Conflicts with locally tracked locks fail with
    /// [`DavError::LockConflict`] before any I/O; a server-side `423` comes
    /// back as [`DavError::Protocol`]. The granted token is tracked and
    /// attached as an `If` condition to subsequent mutating requests
    /// against the path.
    pub async fn lock(
        &self,
        path: &str,
        scope: LockScope,
        owner_href: &str,
        lock_timeout: LockTimeout,
        depth: Depth,
    ) -> DavResult<ActiveLock> {
        let now = Instant::now();
        self.locks.check_acquire(path, scope, now)?;

        let desc = request::lock(path, scope, owner_href, lock_timeout, depth, &self.namespaces)?;
        let resp = self.execute(desc, None).await?;
        let resp = Self::expect_success(resp)?;

        let header_token = resp
            .headers()
            .get("Lock-Token")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.trim().trim_start_matches('<').trim_end_matches('>').to_string());

        let (token, granted) = match header_token {
            Some(token) => {
                let granted = parse_lockdiscovery(resp.body())
                    .ok()
                    .flatten()
                    .and_then(|d| d.timeout);
                (token, granted)
            }
            None => {
                let discovery = parse_lockdiscovery(resp.body())?.ok_or_else(|| {
                    DavError::malformed("LOCK response carried no lock token")
                })?;
                (discovery.token, discovery.timeout)
            }
        };

        Ok(self
            .locks
            .record_granted(path, token, scope, granted.unwrap_or(lock_timeout), now))
    }

    /// Release the tracked lock on `path`. Fails with
    /// [`DavError::NoSuchLock`] when none is tracked; no request is sent in
    /// that case.
    pub async fn unlock(&self, path: &str) -> DavResult<()> {
        let token = self.locks.unlock_token(path, Instant::now())?;
        let resp = self.execute(request::unlock(path, &token)?, None).await?;
        Self::expect_success(resp)?;
        self.locks.release(path, &token);
        Ok(())
    }

    // ----------- Batch operations -----------

    /// Run many `PROPFIND`s concurrently with a semaphore-bound concurrency
    /// limit. Results come back in submission order.
    pub async fn propfind_many(
        &self,
        paths: impl IntoIterator<Item = String>,
        props: Option<&[PropertyKey]>,
        depth: Depth,
        max_concurrency: usize,
    ) -> Vec<BatchItem<Vec<ResourceRecord>>> {
        let sem = Arc::new(Semaphore::new(max_concurrency.max(1)));
        let props: Option<Vec<PropertyKey>> = props.map(|p| p.to_vec());
        let mut tasks = FuturesOrdered::new();

        for path in paths {
            let sem_clone = sem.clone();
            let this = self.clone();
            let props = props.clone();
            tasks.push_back(async move {
                let _permit: OwnedSemaphorePermit =
                    sem_clone.acquire_owned().await.expect("semaphore closed");
                let result = this.propfind(&path, props.as_deref(), depth).await;
                BatchItem {
                    pub_path: path,
                    result,
                }
            });
        }

        let mut out = Vec::new();
        while let Some(item) = tasks.next().await {
            out.push(item);
        }
        out
    }

    // ----------- File-system style convenience layer -----------

    /// List a collection: PROPFIND allprop at Depth `1` (or `infinity` when
    /// `recursive`), with the collection's own record filtered out.
    pub async fn contents_of_directory(
        &self,
        path: &str,
        recursive: bool,
    ) -> DavResult<Vec<ResourceRecord>> {
        let depth = if recursive { Depth::Infinity } else { Depth::One };
        let records = self.propfind(path, None, depth).await?;
        let own_path = self.build_uri(path)?.path().to_string();
        Ok(records
            .into_iter()
            .filter(|r| !hrefs_equivalent(&r.href, &own_path))
            .collect())
    }

    /// Create a collection, optionally creating missing intermediate
    /// collections first (existing ones are tolerated).
    pub async fn create_directory(&self, path: &str, with_intermediates: bool) -> DavResult<()> {
        if with_intermediates {
            if let Some(parent) = parent_collection(path) {
                self.ensure_collections(&parent).await?;
            }
        }
        self.mkcol(path).await.map(|_| ())
    }

    /// Upload a file, optionally creating parent collections first.
    pub async fn create_file(
        &self,
        path: &str,
        with_intermediates: bool,
        contents: Bytes,
    ) -> DavResult<Response<Bytes>> {
        if with_intermediates {
            if let Some(parent) = parent_collection(path) {
                self.ensure_collections(&parent).await?;
            }
        }
        self.put(path, contents, None).await
    }

    /// Download a file and return its bytes.
    pub async fn contents_of_file(&self, path: &str) -> DavResult<Bytes> {
        let resp = self.get(path).await?;
        let resp = Self::expect_success(resp)?;
        Ok(resp.into_body())
    }

    /// Delete a file or collection.
    pub async fn remove_item(&self, path: &str) -> DavResult<()> {
        self.delete(path).await.map(|_| ())
    }

    /// Move an item, overwriting the destination when asked to.
    pub async fn move_item(&self, src: &str, dest: &str, overwrite: bool) -> DavResult<()> {
        self.r#move(src, dest, overwrite, None).await.map(|_| ())
    }

    /// Copy an item, overwriting the destination when asked to.
    pub async fn copy_item(&self, src: &str, dest: &str, overwrite: bool) -> DavResult<()> {
        self.copy(src, dest, overwrite, None).await.map(|_| ())
    }

    /// MKCOL every segment of `dir`, tolerating collections that already
    /// exist (405).
    async fn ensure_collections(&self, dir: &str) -> DavResult<()> {
        let prefix = if dir.starts_with('/') { "/" } else { "" };
        let mut acc = String::from(prefix);
        for segment in dir.split('/').filter(|s| !s.is_empty()) {
            acc.push_str(segment);
            acc.push('/');
            match self.mkcol(&acc).await {
                Ok(_) => {}
                Err(DavError::Protocol { status: 405, .. }) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

fn parent_collection(path: &str) -> Option<String> {
    let trimmed = path.trim_end_matches('/');
    let idx = trimmed.rfind('/')?;
    if idx == 0 {
        return None;
    }
    Some(trimmed[..idx].to_string())
}

fn hrefs_equivalent(a: &str, b: &str) -> bool {
    a.trim_end_matches('/') == b.trim_end_matches('/')
}
