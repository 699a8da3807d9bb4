//! Admission control for in-flight requests.
//!
//! WebDAV has no atomic multi-resource operations, so this client never
//! lets two mutating requests overlap: they are admitted one at a time in
//! FIFO order. Idempotent read verbs run concurrently up to a configurable
//! limit. Admission is purely cooperative — a queued waiter that is dropped
//! leaves the queue, and a permit dropped after completion (or mid-flight
//! cancellation) always admits the next waiter.

use std::sync::Arc;

use hyper::Method;
use tokio::sync::{Mutex, OwnedMutexGuard, OwnedSemaphorePermit, Semaphore};

pub const DEFAULT_READ_CONCURRENCY: usize = 8;

/// Idempotence class of a WebDAV verb, the single classification point for
/// the admission gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationClass {
    /// GET, HEAD, OPTIONS, PROPFIND, REPORT — safe to run concurrently.
    Read,
    /// Everything else: PUT, DELETE, MKCOL, COPY, MOVE, PROPPATCH, LOCK,
    /// UNLOCK — serialized.
    Mutating,
}

impl OperationClass {
    pub fn of(method: &Method) -> Self {
        match method.as_str() {
            "GET" | "HEAD" | "OPTIONS" | "PROPFIND" | "REPORT" => OperationClass::Read,
            _ => OperationClass::Mutating,
        }
    }
}

/// Held for the lifetime of an admitted request; dropping it releases the
/// slot.
pub struct GatePermit {
    _kind: PermitKind,
}

enum PermitKind {
    Read(OwnedSemaphorePermit),
    Write(OwnedMutexGuard<()>),
}

pub struct RequestGate {
    reads: Arc<Semaphore>,
    writes: Arc<Mutex<()>>,
}

impl Default for RequestGate {
    fn default() -> Self {
        Self::new(DEFAULT_READ_CONCURRENCY)
    }
}

impl RequestGate {
    pub fn new(read_concurrency: usize) -> Self {
        Self {
            reads: Arc::new(Semaphore::new(read_concurrency.max(1))),
            writes: Arc::new(Mutex::new(())),
        }
    }

    /// Wait until the operation may start. Mutating admissions are granted
    /// in the order they were requested (the underlying mutex queues
    /// waiters fairly); queuing depth is unbounded.
    pub async fn admit(&self, class: OperationClass) -> GatePermit {
        let kind = match class {
            OperationClass::Read => PermitKind::Read(
                self.reads
                    .clone()
                    .acquire_owned()
                    .await
                    .expect("semaphore closed"),
            ),
            OperationClass::Mutating => PermitKind::Write(self.writes.clone().lock_owned().await),
        };
        GatePermit { _kind: kind }
    }
}
