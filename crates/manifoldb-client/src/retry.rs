//! Classification-aware retry with exponential backoff.
//!
//! Every RPC the client issues goes through [`execute`]. A failed attempt is
//! either terminal (returned immediately) or retryable (slept on, then tried
//! again) according to [`RpcFailure::is_retryable`].
//!
//! # Example
//!
//! ```
//! use manifoldb_client::retry::{execute, RetryPolicy, RpcFailure};
//! use manifoldb_wire::protocol::TransportCode;
//!
//! let policy = RetryPolicy::new().max_retry_times(5).initial_backoff_ms(1).max_backoff_ms(1);
//! let mut calls = 0;
//! let value = execute(&policy, || {
//!     calls += 1;
//!     if calls < 3 {
//!         Err(RpcFailure::transport(TransportCode::Unavailable, "connection reset"))
//!     } else {
//!         Ok(42)
//!     }
//! })
//! .unwrap();
//! assert_eq!((value, calls), (42, 3));
//! ```

use std::fmt;
use std::thread;
use std::time::{Duration, Instant};

use manifoldb_wire::protocol::{ServerStatus, TransportCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// The outcome of a failed RPC attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum RpcFailure {
    /// The call failed in the transport.
    Transport {
        /// Transport status code.
        code: TransportCode,
        /// Transport message.
        message: String,
    },
    /// The server answered with a non-success application status.
    Server(ServerStatus),
}

impl RpcFailure {
    /// Create a transport failure.
    #[must_use]
    pub fn transport(code: TransportCode, message: impl Into<String>) -> Self {
        Self::Transport { code, message: message.into() }
    }

    /// Create a server failure.
    #[must_use]
    pub const fn server(status: ServerStatus) -> Self {
        Self::Server(status)
    }

    /// Returns `true` if another attempt may succeed.
    ///
    /// Transport failures are retryable unless their code is terminal. Server
    /// failures are retryable only when they report a rate limit and the
    /// policy allows retrying rate limits.
    #[must_use]
    pub fn is_retryable(&self, retry_on_rate_limit: bool) -> bool {
        match self {
            Self::Transport { code, .. } => !code.is_terminal(),
            Self::Server(status) => retry_on_rate_limit && status.is_rate_limit(),
        }
    }

    /// Convert into a client error without any retry context.
    #[must_use]
    pub fn into_error(self) -> Error {
        match self {
            Self::Transport { code: TransportCode::DeadlineExceeded, message } => {
                Error::Timeout(format!("deadline exceeded: {message}"))
            }
            Self::Transport { code, message } => Error::RpcFailed(format!("{code}: {message}")),
            Self::Server(status) if status.is_schema_mismatch() => {
                Error::DataSchemaMismatch(status.to_string())
            }
            Self::Server(status) => Error::ServerFailed(status.to_string()),
        }
    }
}

impl fmt::Display for RpcFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport { code, message } => write!(f, "transport {code}: {message}"),
            Self::Server(status) => write!(f, "server {status}"),
        }
    }
}

/// Retry and backoff settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts; 1 or less disables retry.
    /// Default: 75
    pub max_retry_times: u64,

    /// Wall-clock budget from the first attempt in milliseconds; 0 is unbounded.
    /// Default: 0
    pub max_retry_timeout_ms: u64,

    /// Sleep after the first failed attempt.
    /// Default: 10ms
    pub initial_backoff_ms: u64,

    /// Factor applied to the sleep after every failed attempt.
    /// Default: 3
    pub backoff_multiplier: u64,

    /// Upper bound of the sleep.
    /// Default: 3000ms
    pub max_backoff_ms: u64,

    /// Whether server rate-limit rejections are retried.
    /// Default: true
    pub retry_on_rate_limit: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retry_times: 75,
            max_retry_timeout_ms: 0,
            initial_backoff_ms: 10,
            backoff_multiplier: 3,
            max_backoff_ms: 3000,
            retry_on_rate_limit: true,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A policy that calls exactly once.
    #[must_use]
    pub fn no_retry() -> Self {
        Self { max_retry_times: 1, ..Default::default() }
    }

    /// Set the maximum number of attempts.
    #[must_use]
    pub const fn max_retry_times(mut self, times: u64) -> Self {
        self.max_retry_times = times;
        self
    }

    /// Set the wall-clock budget; 0 is unbounded.
    #[must_use]
    pub const fn max_retry_timeout_ms(mut self, ms: u64) -> Self {
        self.max_retry_timeout_ms = ms;
        self
    }

    /// Set the initial sleep. Zero is ignored.
    #[must_use]
    pub const fn initial_backoff_ms(mut self, ms: u64) -> Self {
        if ms > 0 {
            self.initial_backoff_ms = ms;
        }
        self
    }

    /// Set the backoff factor. Zero is ignored.
    #[must_use]
    pub const fn backoff_multiplier(mut self, multiplier: u64) -> Self {
        if multiplier > 0 {
            self.backoff_multiplier = multiplier;
        }
        self
    }

    /// Set the sleep upper bound. Zero is ignored.
    #[must_use]
    pub const fn max_backoff_ms(mut self, ms: u64) -> Self {
        if ms > 0 {
            self.max_backoff_ms = ms;
        }
        self
    }

    /// Enable or disable retrying rate-limit rejections.
    #[must_use]
    pub const fn retry_on_rate_limit(mut self, retry: bool) -> Self {
        self.retry_on_rate_limit = retry;
        self
    }
}

/// Run `call` until it succeeds, fails terminally or the policy is exhausted.
///
/// # Errors
///
/// - Terminal transport failures map to [`Error::Timeout`] for deadline
///   exceeded and [`Error::RpcFailed`] otherwise.
/// - Terminal server failures map to [`Error::ServerFailed`], or
///   [`Error::DataSchemaMismatch`] for schema mismatches.
/// - Running out of attempts or wall-clock budget gives [`Error::Timeout`]
///   carrying the last failure.
pub fn execute<T, F>(policy: &RetryPolicy, mut call: F) -> Result<T>
where
    F: FnMut() -> std::result::Result<T, RpcFailure>,
{
    let max_times = policy.max_retry_times;
    if max_times <= 1 {
        return call().map_err(RpcFailure::into_error);
    }

    let begin = Instant::now();
    let mut backoff_ms = policy.initial_backoff_ms;
    let mut attempt: u64 = 1;
    loop {
        let failure = match call() {
            Ok(value) => return Ok(value),
            Err(failure) => failure,
        };

        if !failure.is_retryable(policy.retry_on_rate_limit) {
            debug!(attempt, %failure, "rpc failed terminally");
            return Err(failure.into_error());
        }

        if attempt >= max_times {
            return Err(Error::timeout(format!(
                "{max_times} retry times, stop retry, last failure: {failure}"
            )));
        }

        warn!(attempt, max_times, backoff_ms, %failure, "rpc failed, retrying");
        thread::sleep(Duration::from_millis(backoff_ms));
        backoff_ms = backoff_ms.saturating_mul(policy.backoff_multiplier).min(policy.max_backoff_ms);

        let elapsed = begin.elapsed();
        if policy.max_retry_timeout_ms > 0
            && elapsed >= Duration::from_millis(policy.max_retry_timeout_ms)
        {
            return Err(Error::timeout(format!(
                "retry timeout {}ms exceeded after {attempt} attempts, last failure: {failure}",
                policy.max_retry_timeout_ms
            )));
        }
        attempt += 1;
    }
}
