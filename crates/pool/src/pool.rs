//! Shared, size-bounded cache of live clients keyed by configuration
//!
//! A [`ClientPool`] lets many consumers in one process share a small number
//! of expensive connections. Consumers ask for a client by configuration; the
//! pool hands back the cached one while it is open, builds one on a miss, and
//! transparently rebuilds one whose connection has died.
//!
//! Every client that leaves the pool (capacity eviction, invalidation, stale
//! replacement, clear, or dropping the last pool handle) is closed exactly
//! once by the pool's removal hook. Close failures are logged and counted,
//! never returned.
//!
//! # Example
//! ```
//! use std::convert::Infallible;
//!
//! use clientcache_pool::{ClientFactory, ClientPool, ClientState, PoolConfig, PooledClient};
//!
//! #[derive(Debug, Clone, PartialEq, Eq, Hash)]
//! struct Endpoint(&'static str);
//!
//! struct Conn;
//!
//! impl PooledClient for Conn {
//!     type Error = Infallible;
//!     fn state(&self) -> ClientState {
//!         ClientState::Open
//!     }
//!     fn close(&self) -> Result<(), Infallible> {
//!         Ok(())
//!     }
//! }
//!
//! struct Connector;
//!
//! impl ClientFactory for Connector {
//!     type Config = Endpoint;
//!     type Client = Conn;
//!     type Error = Infallible;
//!     fn create(&self, _: &Endpoint) -> Result<Conn, Infallible> {
//!         Ok(Conn)
//!     }
//! }
//!
//! let pool = ClientPool::new(Connector, PoolConfig::with_capacity(2)).unwrap();
//! let first = pool.get_or_create(&Endpoint("pulsar://a:6650")).unwrap();
//! let again = pool.get_or_create(&Endpoint("pulsar://a:6650")).unwrap();
//! assert!(std::sync::Arc::ptr_eq(&first, &again));
//! ```

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::num::NonZeroUsize;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::bounded::{BoundedMap, LoadOutcome, RemovalCause, RemovalListener};
use crate::client::{ClientFactory, PooledClient};
use crate::config::{PoolConfig, DEFAULT_CAPACITY_NONZERO};
use crate::error::{PoolConfigError, PoolError, PoolResult};
use crate::stats::{MetricsCollector, PoolStats};

type ClientMap<F> = BoundedMap<<F as ClientFactory>::Config, Arc<<F as ClientFactory>::Client>>;

/// Removal hook that closes every client leaving the map
struct CloseOnRemoval<K, C> {
    metrics: MetricsCollector,
    _marker: PhantomData<fn(&K, C)>,
}

impl<K, C> RemovalListener<K, Arc<C>> for CloseOnRemoval<K, C>
where
    K: fmt::Debug,
    C: PooledClient,
{
    fn on_removal(&self, config: &K, client: Arc<C>, cause: RemovalCause) {
        debug!(?config, %cause, state = %client.state(), "removing client from pool");
        self.metrics.record_removal(cause);

        info!(?config, "closing client");
        match client.close() {
            Ok(()) => self.metrics.record_close(true),
            Err(err) => {
                warn!(?config, error = %err, "error while closing client");
                self.metrics.record_close(false);
            }
        }
    }
}

struct PoolInner<F: ClientFactory> {
    factory: F,
    entries: ClientMap<F>,
    metrics: MetricsCollector,
}

/// Bounded, thread-safe cache of clients keyed by configuration
///
/// Cloning a `ClientPool` is cheap and yields another handle to the same
/// pool. Build one at the composition root and hand clones to consumers.
/// When the last handle is dropped, all cached clients are closed.
///
/// # Capacity
///
/// Capacity comes from [`PoolConfig::capacity`] and is fixed for the life of
/// the pool.
pub struct ClientPool<F: ClientFactory> {
    inner: Arc<PoolInner<F>>,
}

impl<F: ClientFactory> ClientPool<F> {
    /// Create a pool that builds clients with `factory`
    ///
    /// # Errors
    /// Returns [`PoolConfigError::ZeroCapacity`] if `config.capacity` is zero.
    pub fn new(factory: F, config: PoolConfig) -> Result<Self, PoolConfigError> {
        let capacity = config.validate()?;
        config.log_config();
        Ok(Self::build(factory, capacity, config.track_metrics))
    }

    /// Create a pool with the default configuration (capacity 5)
    pub fn with_defaults(factory: F) -> Self {
        Self::build(factory, DEFAULT_CAPACITY_NONZERO, PoolConfig::default().track_metrics)
    }

    fn build(factory: F, capacity: NonZeroUsize, track_metrics: bool) -> Self {
        let metrics = MetricsCollector::new(track_metrics);
        let listener = CloseOnRemoval { metrics: metrics.clone(), _marker: PhantomData };

        info!(capacity = capacity.get(), track_metrics, "client pool initialized");

        Self {
            inner: Arc::new(PoolInner {
                factory,
                entries: BoundedMap::new(capacity, listener),
                metrics,
            }),
        }
    }

    /// Return an open client for `config`, building one if needed
    ///
    /// - A cached open client is returned as is.
    /// - A cached client that is no longer open is removed (and closed), and
    ///   a replacement is built once.
    /// - On a miss a client is built; inserting it may evict and close the
    ///   least recently used client for another configuration.
    ///
    /// # Errors
    /// Returns [`PoolError::Construction`] if the factory fails. Nothing is
    /// cached for `config` afterwards.
    pub fn get_or_create(&self, config: &F::Config) -> PoolResult<Arc<F::Client>, F::Error> {
        let inner = &self.inner;

        let (client, outcome) = inner.entries.get_or_try_insert_with(
            config,
            |client| client.state().is_open(),
            |config| self.create(config),
        )?;

        match outcome {
            LoadOutcome::Cached => inner.metrics.record_hit(),
            LoadOutcome::Reloaded => {
                debug!(?config, "replaced client that was no longer open");
                inner.metrics.record_stale_replacement();
            }
            LoadOutcome::Loaded | LoadOutcome::LostRace => {}
        }

        Ok(client)
    }

    fn create(&self, config: &F::Config) -> PoolResult<Arc<F::Client>, F::Error> {
        let metrics = &self.inner.metrics;
        metrics.record_miss();

        match self.inner.factory.create(config) {
            Ok(client) => {
                debug!(?config, "created new client");
                metrics.record_creation();
                Ok(Arc::new(client))
            }
            Err(err) => {
                error!(?config, error = %err, "failed to create client");
                metrics.record_construction_failure();
                Err(PoolError::construction(config, err))
            }
        }
    }

    /// Return the cached client for `config` without building one
    ///
    /// A cached client that is no longer open is removed (and closed) and
    /// `None` is returned.
    pub fn get(&self, config: &F::Config) -> Option<Arc<F::Client>> {
        let client = self.inner.entries.get(config)?;
        if client.state().is_open() {
            self.inner.metrics.record_hit();
            return Some(client);
        }

        debug!(?config, state = %client.state(), "dropping client that is no longer open");
        self.inner.entries.remove_if(
            config,
            |current| Arc::ptr_eq(current, &client),
            RemovalCause::Stale,
        );
        None
    }

    /// Remove and close the client for `config`, if any
    ///
    /// Returns whether a client was removed. Absent configs are a no-op.
    pub fn invalidate(&self, config: &F::Config) -> bool {
        self.inner.entries.remove(config)
    }

    /// Remove and close every cached client
    ///
    /// Safe to call repeatedly; later calls find nothing to close.
    pub fn clear(&self) {
        let removed = self.inner.entries.clear();
        info!(removed, "cleared client pool");
    }

    /// Point-in-time copy of the cached clients
    ///
    /// For diagnostics and tests. The pool may evict and close any of these
    /// clients at any time after the snapshot is taken.
    pub fn snapshot_entries(&self) -> HashMap<F::Config, Arc<F::Client>> {
        self.inner.entries.snapshot()
    }

    /// Whether a client is cached for `config`, open or not
    pub fn contains(&self, config: &F::Config) -> bool {
        self.inner.entries.contains(config)
    }

    /// Number of cached clients
    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    /// Whether the pool holds no clients
    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    /// Maximum number of cached clients
    pub fn capacity(&self) -> usize {
        self.inner.entries.capacity().get()
    }

    /// Current statistics
    pub fn stats(&self) -> PoolStats {
        self.inner.metrics.snapshot(self.len(), self.capacity())
    }
}

impl<F: ClientFactory> Clone for ClientPool<F> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<F: ClientFactory> fmt::Debug for ClientPool<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientPool")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish_non_exhaustive()
    }
}
