//! Error types for the `ManifoldDB` client.
//!
//! This module provides the [`enum@Error`] type returned by every client and
//! iterator operation, and [`ErrorKind`] for matching on the failure class.

use manifoldb_wire::WireError;
use thiserror::Error;

/// Machine-distinguishable class of an [`enum@Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A client-side precondition was violated before any RPC.
    InvalidArgument,
    /// The server reported that data does not match the collection schema.
    DataSchemaMismatch,
    /// The server lacks a capability the operation needs.
    NotSupported,
    /// The retry budget or a call deadline was exhausted.
    Timeout,
    /// A transport-level failure that cannot be retried.
    RpcFailed,
    /// The server reported an application error.
    ServerFailed,
    /// A response violated the client/server contract.
    UnknownError,
}

/// Errors that can occur when talking to a `ManifoldDB` server.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum Error {
    /// A client-side precondition was violated.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The server reported a schema mismatch.
    #[error("data schema mismatch: {0}")]
    DataSchemaMismatch(String),

    /// The operation is not supported by the server.
    #[error("not supported: {0}")]
    NotSupported(String),

    /// The retry budget or a deadline was exhausted.
    #[error("timeout: {0}")]
    Timeout(String),

    /// A terminal transport failure.
    #[error("rpc failed: {0}")]
    RpcFailed(String),

    /// The server reported an application error.
    #[error("server failed: {0}")]
    ServerFailed(String),

    /// A response violated an invariant.
    #[error("unknown error: {0}")]
    Unknown(String),
}

impl Error {
    /// The class of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::DataSchemaMismatch(_) => ErrorKind::DataSchemaMismatch,
            Self::NotSupported(_) => ErrorKind::NotSupported,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::RpcFailed(_) => ErrorKind::RpcFailed,
            Self::ServerFailed(_) => ErrorKind::ServerFailed,
            Self::Unknown(_) => ErrorKind::UnknownError,
        }
    }

    /// The error message without the kind prefix.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::InvalidArgument(m)
            | Self::DataSchemaMismatch(m)
            | Self::NotSupported(m)
            | Self::Timeout(m)
            | Self::RpcFailed(m)
            | Self::ServerFailed(m)
            | Self::Unknown(m) => m,
        }
    }

    /// Returns `true` if this is a client-side validation error.
    #[must_use]
    pub const fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }

    /// Returns `true` if the server lacks a needed capability.
    #[must_use]
    pub const fn is_not_supported(&self) -> bool {
        matches!(self, Self::NotSupported(_))
    }

    /// Returns `true` if a budget or deadline was exhausted.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Create an invalid argument error.
    #[must_use]
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a not supported error.
    #[must_use]
    pub fn not_supported(msg: impl Into<String>) -> Self {
        Self::NotSupported(msg.into())
    }

    /// Create a timeout error.
    #[must_use]
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create an unknown error.
    #[must_use]
    pub fn unknown(msg: impl Into<String>) -> Self {
        Self::Unknown(msg.into())
    }

    /// Prefix the message with context, keeping the kind.
    #[must_use]
    pub fn context(self, ctx: &str) -> Self {
        let wrap = |m: String| format!("{ctx}: {m}");
        match self {
            Self::InvalidArgument(m) => Self::InvalidArgument(wrap(m)),
            Self::DataSchemaMismatch(m) => Self::DataSchemaMismatch(wrap(m)),
            Self::NotSupported(m) => Self::NotSupported(wrap(m)),
            Self::Timeout(m) => Self::Timeout(wrap(m)),
            Self::RpcFailed(m) => Self::RpcFailed(wrap(m)),
            Self::ServerFailed(m) => Self::ServerFailed(wrap(m)),
            Self::Unknown(m) => Self::Unknown(wrap(m)),
        }
    }

    /// Convert a wire error raised while building a request.
    #[must_use]
    pub fn from_request(err: WireError) -> Self {
        Self::InvalidArgument(err.to_string())
    }
}

/// Wire errors surface while processing responses, where they are contract violations.
impl From<WireError> for Error {
    fn from(err: WireError) -> Self {
        Self::Unknown(err.to_string())
    }
}

/// A specialized `Result` type for client operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind() {
        assert_eq!(Error::invalid_argument("x").kind(), ErrorKind::InvalidArgument);
        assert_eq!(Error::not_supported("x").kind(), ErrorKind::NotSupported);
        assert_eq!(Error::timeout("x").kind(), ErrorKind::Timeout);
        assert_eq!(Error::unknown("x").kind(), ErrorKind::UnknownError);
        assert_eq!(Error::ServerFailed("x".into()).kind(), ErrorKind::ServerFailed);
    }

    #[test]
    fn test_context_keeps_kind() {
        let err = Error::timeout("3 retry times, stop retry").context("iterator fails to seek");
        assert!(err.is_timeout());
        assert_eq!(err.message(), "iterator fails to seek: 3 retry times, stop retry");
        assert_eq!(err.to_string(), "timeout: iterator fails to seek: 3 retry times, stop retry");
    }

    #[test]
    fn test_wire_error_conversion() {
        let err: Error = WireError::encoding("bad bytes").into();
        assert_eq!(err.kind(), ErrorKind::UnknownError);
        let err = Error::from_request(WireError::encoding("bad bytes"));
        assert!(err.is_invalid_argument());
    }
}
