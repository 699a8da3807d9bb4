//! Error taxonomy for the WebDAV client.
//!
//! The public library API is typed via [`DavError`] (`thiserror`), while
//! `anyhow::Error` is retained as the opaque transport payload. Partial
//! failures inside a 207 Multi-Status are modelled as data
//! (`failed_properties`), never as errors.

use thiserror::Error;

/// The result type returned throughout the crate's public API.
pub type DavResult<T> = Result<T, DavError>;

/// The typed error surface of the WebDAV client.
#[derive(Debug, Error)]
pub enum DavError {
    /// Builder-level failure detected before any I/O was attempted.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Network, TLS, or timeout failure surfaced from the transport seam.
    #[error("transport error: {0}")]
    Transport(#[source] anyhow::Error),

    /// A response body failed to parse, or a well-formed document was
    /// missing a required element.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// A well-formed server failure (non-2xx overall status, including
    /// `423 Locked`).
    #[error("protocol error (status {status}): {message}")]
    Protocol { status: u16, message: String },

    /// No (unexpired) lock is tracked for the given path.
    #[error("no such lock: {0}")]
    NoSuchLock(String),

    /// A lock could not be acquired because a conflicting lock exists.
    #[error("lock conflict: {0}")]
    LockConflict(String),
}

impl DavError {
    /// Construct an [`DavError::InvalidRequest`].
    pub fn invalid(message: impl Into<String>) -> Self {
        DavError::InvalidRequest(message.into())
    }

    /// Construct a [`DavError::MalformedResponse`].
    pub fn malformed(message: impl Into<String>) -> Self {
        DavError::MalformedResponse(message.into())
    }

    /// Construct a [`DavError::Transport`] from any error convertible into
    /// `anyhow::Error`.
    pub fn transport(error: impl Into<anyhow::Error>) -> Self {
        DavError::Transport(error.into())
    }
}
