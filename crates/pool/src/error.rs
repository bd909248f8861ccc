//! Error types for the client pool
//!
//! Only two kinds of failure ever reach a caller:
//!
//! - [`PoolError::Construction`] when the factory fails to build a client in
//!   [`ClientPool::get_or_create`](crate::ClientPool::get_or_create). The
//!   factory's error is carried unchanged as the source.
//! - [`PoolConfigError`] when a pool is constructed from an invalid
//!   [`PoolConfig`](crate::PoolConfig).
//!
//! Finding a stale client is not an error (the pool replaces it), and a failing
//! `close()` during cleanup is logged and counted but never returned.
//!
//! Both types implement [`ErrorClassification`] so hosts can make retry and
//! alerting decisions without matching on variants.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Result type for pool lookups, generic over the factory's error
pub type PoolResult<T, E> = Result<T, PoolError<E>>;

/// Failure returned from pool lookups
#[derive(Debug, Error)]
pub enum PoolError<E>
where
    E: std::error::Error + 'static,
{
    /// The factory could not build a client; nothing was cached
    #[error("failed to create client for {config}: {source}")]
    Construction {
        /// Debug rendering of the configuration that failed
        config: String,
        /// Error returned by the factory
        #[source]
        source: E,
    },
}

impl<E> PoolError<E>
where
    E: std::error::Error + 'static,
{
    pub(crate) fn construction<C: fmt::Debug>(config: &C, source: E) -> Self {
        Self::Construction { config: format!("{config:?}"), source }
    }

    /// Borrow the factory error
    pub fn source_error(&self) -> &E {
        match self {
            Self::Construction { source, .. } => source,
        }
    }

    /// Take the factory error by value
    pub fn into_source(self) -> E {
        match self {
            Self::Construction { source, .. } => source,
        }
    }
}

/// Invalid pool configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolConfigError {
    /// A pool must be able to hold at least one client
    #[error("pool capacity must be greater than zero")]
    ZeroCapacity,

    /// An environment override could not be parsed
    #[error("invalid value '{value}' for {var}: expected a positive integer")]
    InvalidEnv {
        /// Environment variable name
        var: String,
        /// Raw value found
        value: String,
    },
}

/// Error severity levels for monitoring and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational, typically for debugging
    Info,
    /// Warning, should be monitored but not critical
    Warning,
    /// Error, requires attention and action
    Error,
    /// Critical, immediate action required
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Classification shared by the pool's error types
pub trait ErrorClassification {
    /// Whether repeating the operation may succeed
    fn is_retryable(&self) -> bool;

    /// Severity for logging and alerting
    fn severity(&self) -> ErrorSeverity;

    /// Whether the error requires immediate attention
    fn is_critical(&self) -> bool {
        self.severity() == ErrorSeverity::Critical
    }

    /// Suggested delay before retrying, if any
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl<E> ErrorClassification for PoolError<E>
where
    E: std::error::Error + 'static,
{
    /// A failed construction leaves nothing cached, so retrying is safe.
    fn is_retryable(&self) -> bool {
        match self {
            Self::Construction { .. } => true,
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Construction { .. } => ErrorSeverity::Error,
        }
    }
}

impl ErrorClassification for PoolConfigError {
    fn is_retryable(&self) -> bool {
        false
    }

    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Error
    }
}
