//! Client-side tracking of issued lock tokens.
//!
//! The manager is a conservative mirror of what the server granted: it
//! rejects lock acquisitions that are certain to conflict (saving a round
//! trip) and hands out the `If`/`Lock-Token` header material for conditional
//! requests. The server stays authoritative; a `423 Locked` from it must
//! still be handled by the caller. Expiry is caller-driven through the `now`
//! parameters; no timers run here.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use crate::webdav::error::{DavError, DavResult};
use crate::webdav::types::{ActiveLock, LockScope, LockTimeout};

#[derive(Debug, Default)]
pub struct LockManager {
    table: Mutex<HashMap<String, Vec<ActiveLock>>>,
}

fn purge_expired(entries: &mut Vec<ActiveLock>, now: Instant) {
    entries.retain(|lock| lock.deadline.map(|d| d > now).unwrap_or(true));
}

impl LockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Local conflict check before issuing a LOCK. Fails with
    /// [`DavError::LockConflict`] when an unexpired exclusive lock is
    /// tracked for the path, or when an exclusive lock is requested while
    /// any lock is tracked. Shared-on-shared is allowed.
    pub fn check_acquire(&self, path: &str, scope: LockScope, now: Instant) -> DavResult<()> {
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(entries) = table.get_mut(path) else {
            return Ok(());
        };
        purge_expired(entries, now);
        if entries.is_empty() {
            table.remove(path);
            return Ok(());
        }
        let has_exclusive = entries.iter().any(|l| l.scope == LockScope::Exclusive);
        if has_exclusive || scope == LockScope::Exclusive {
            return Err(DavError::LockConflict(path.to_string()));
        }
        Ok(())
    }

    /// Track a lock granted by the server.
    pub fn record(&self, path: &str, lock: ActiveLock) {
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        table.entry(path.to_string()).or_default().push(lock);
    }

    /// Build and track an [`ActiveLock`] from the server's grant.
    pub fn record_granted(
        &self,
        path: &str,
        token: String,
        scope: LockScope,
        timeout: LockTimeout,
        now: Instant,
    ) -> ActiveLock {
        let lock = ActiveLock {
            token,
            scope,
            timeout,
            deadline: timeout.duration().map(|d| now + d),
        };
        self.record(path, lock.clone());
        lock
    }

    /// First tracked, unexpired lock for the path.
    pub fn active_lock(&self, path: &str, now: Instant) -> Option<ActiveLock> {
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        let entries = table.get_mut(path)?;
        purge_expired(entries, now);
        entries.first().cloned()
    }

    /// Token to use for an UNLOCK of the path. Fails with
    /// [`DavError::NoSuchLock`] when nothing (unexpired) is tracked.
    pub fn unlock_token(&self, path: &str, now: Instant) -> DavResult<String> {
        self.active_lock(path, now)
            .map(|l| l.token)
            .ok_or_else(|| DavError::NoSuchLock(path.to_string()))
    }

    /// Forget a lock after a successful UNLOCK (or a server-side loss).
    pub fn release(&self, path: &str, token: &str) {
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(entries) = table.get_mut(path) {
            entries.retain(|l| l.token != token);
            if entries.is_empty() {
                table.remove(path);
            }
        }
    }

    /// True iff the path had tracked locks and every one of them has
    /// expired. Expired entries are dropped as a side effect.
    pub fn is_expired(&self, path: &str, now: Instant) -> bool {
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(entries) = table.get_mut(path) else {
            return false;
        };
        let had_locks = !entries.is_empty();
        purge_expired(entries, now);
        if entries.is_empty() {
            table.remove(path);
            had_locks
        } else {
            false
        }
    }

    /// `If` header condition for a conditional request against the path:
    /// `(<token>)`, or `None` when no unexpired lock is tracked.
    pub fn if_header(&self, path: &str, now: Instant) -> Option<String> {
        self.active_lock(path, now)
            .map(|l| format!("(<{}>)", l.token))
    }
}
