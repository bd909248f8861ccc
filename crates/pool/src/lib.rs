//! Bounded, thread-safe pool of network clients keyed by configuration.
//!
//! A process that talks to a messaging service usually wants one live client
//! per distinct connection configuration, shared by every consumer, with a
//! hard limit on how many stay open at once. [`ClientPool`] provides that:
//!
//! - lookups return the cached client while it is open,
//! - clients that have closed or faulted are replaced transparently,
//! - the least recently used client is evicted and closed at capacity,
//! - every client leaving the pool is closed exactly once.
//!
//! The pool is agnostic to the client type. Implement [`PooledClient`] for
//! the handle and [`ClientFactory`] for whatever builds it.
//!
//! # Feature Flags
//!
//! - `serde`: `Serialize`/`Deserialize` for [`PoolConfig`]
//! - `test-utils`: the [`testing`] module with mock clients and factories

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod bounded;
mod client;
mod config;
mod error;
mod pool;
mod stats;

// Testing utilities
// ---------------------------------------------------------------
#[cfg(any(feature = "test-utils", test))]
pub mod testing;

// Re-export the public surface
// ------------------------
pub use bounded::{BoundedMap, LoadOutcome, RemovalCause, RemovalListener};
pub use client::{ClientFactory, ClientState, PooledClient};
pub use config::{PoolConfig, PoolConfigBuilder, CAPACITY_ENV_VAR, DEFAULT_CAPACITY};
pub use error::{
    ErrorClassification, ErrorSeverity, PoolConfigError, PoolError, PoolResult,
};
pub use pool::ClientPool;
pub use stats::PoolStats;
