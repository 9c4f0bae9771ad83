//! Client configuration.

use std::time::Duration;

use crate::retry::RetryPolicy;

/// Name of the database used when none is configured.
pub const DEFAULT_DATABASE: &str = "default";

/// Configuration for a [`Client`](crate::Client).
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use manifoldb_client::{ClientConfig, RetryPolicy};
///
/// let config = ClientConfig::new()
///     .database("analytics")
///     .rpc_deadline(Duration::from_secs(5))
///     .retry(RetryPolicy::new().max_retry_times(3));
/// assert_eq!(config.database, "analytics");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Database used by requests that do not name one.
    /// Default: "default"
    pub database: String,

    /// Deadline handed to the transport for every RPC.
    /// Default: 60 seconds
    pub rpc_deadline: Duration,

    /// Retry policy applied to every RPC.
    pub retry: RetryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            database: DEFAULT_DATABASE.to_string(),
            rpc_deadline: Duration::from_secs(60),
            retry: RetryPolicy::default(),
        }
    }
}

impl ClientConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the database.
    #[must_use]
    pub fn database(mut self, name: impl Into<String>) -> Self {
        self.database = name.into();
        self
    }

    /// Set the per-RPC deadline.
    #[must_use]
    pub const fn rpc_deadline(mut self, deadline: Duration) -> Self {
        self.rpc_deadline = deadline;
        self
    }

    /// Set the retry policy.
    #[must_use]
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }
}
