//! Pool configuration and builder
//!
//! Capacity is fixed when the pool is constructed. There is no setter on a
//! live pool: the only way to choose a capacity is to put it in the
//! [`PoolConfig`] handed to [`ClientPool::new`](crate::ClientPool::new).

use std::num::NonZeroUsize;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::PoolConfigError;

/// Default number of live clients kept by a pool
pub const DEFAULT_CAPACITY: usize = 5;

pub(crate) const DEFAULT_CAPACITY_NONZERO: NonZeroUsize =
    NonZeroUsize::MIN.saturating_add(DEFAULT_CAPACITY - 1);

/// Environment variable read by [`PoolConfig::from_env`]
pub const CAPACITY_ENV_VAR: &str = "CLIENT_POOL_CAPACITY";

/// Configuration for a [`ClientPool`](crate::ClientPool)
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PoolConfig {
    /// Maximum number of live clients; the least recently used one is
    /// evicted and closed when an insert would exceed it
    pub capacity: usize,

    /// Whether to collect hit/miss/eviction counters
    pub track_metrics: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { capacity: DEFAULT_CAPACITY, track_metrics: true }
    }
}

impl PoolConfig {
    /// Create a new configuration builder
    pub fn builder() -> PoolConfigBuilder {
        PoolConfigBuilder::default()
    }

    /// Default configuration with a specific capacity
    ///
    /// # Example
    /// ```
    /// use clientcache_pool::PoolConfig;
    ///
    /// let config = PoolConfig::with_capacity(2);
    /// assert_eq!(config.capacity, 2);
    /// ```
    pub fn with_capacity(capacity: usize) -> Self {
        Self { capacity, ..Self::default() }
    }

    /// Default configuration, with capacity overridden by
    /// `CLIENT_POOL_CAPACITY` when that variable is set
    ///
    /// # Errors
    /// Returns [`PoolConfigError::InvalidEnv`] if the variable is set but is
    /// not a positive integer.
    pub fn from_env() -> Result<Self, PoolConfigError> {
        match std::env::var(CAPACITY_ENV_VAR) {
            Ok(raw) => Self::parse_capacity(&raw).map(Self::with_capacity),
            Err(_) => Ok(Self::default()),
        }
    }

    fn parse_capacity(raw: &str) -> Result<usize, PoolConfigError> {
        raw.trim().parse::<usize>().ok().filter(|n| *n > 0).ok_or_else(|| {
            PoolConfigError::InvalidEnv { var: CAPACITY_ENV_VAR.to_string(), value: raw.to_string() }
        })
    }

    /// Check the configuration and return the capacity as a non-zero value
    ///
    /// # Errors
    /// Returns [`PoolConfigError::ZeroCapacity`] when `capacity` is zero.
    pub fn validate(&self) -> Result<NonZeroUsize, PoolConfigError> {
        NonZeroUsize::new(self.capacity).ok_or(PoolConfigError::ZeroCapacity)
    }

    /// Log configuration at startup
    pub fn log_config(&self) {
        tracing::info!(
            capacity = self.capacity,
            track_metrics = self.track_metrics,
            "client pool configuration loaded"
        );
    }
}

/// Builder for [`PoolConfig`] with fluent API
#[derive(Debug, Default)]
pub struct PoolConfigBuilder {
    config: PoolConfig,
}

impl PoolConfigBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of live clients
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.config.capacity = capacity;
        self
    }

    /// Enable or disable metrics tracking
    pub fn track_metrics(mut self, enabled: bool) -> Self {
        self.config.track_metrics = enabled;
        self
    }

    /// Build the configuration
    pub fn build(self) -> PoolConfig {
        self.config
    }
}
