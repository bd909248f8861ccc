//! Contract between the pool and the network client it caches
//!
//! The pool never builds or drives a connection itself. It only needs to know
//! how to construct a client for a configuration, how to read the client's
//! lifecycle state, and how to tear it down.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

/// Lifecycle state reported by a pooled client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientState {
    /// Connection is usable
    Open,
    /// Shutdown has started but not finished
    Closing,
    /// Connection has been torn down
    Closed,
    /// Connection failed and cannot recover
    Faulted,
}

impl ClientState {
    /// Only `Open` clients may be handed out by the pool
    pub fn is_open(self) -> bool {
        matches!(self, Self::Open)
    }
}

impl fmt::Display for ClientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "Open"),
            Self::Closing => write!(f, "Closing"),
            Self::Closed => write!(f, "Closed"),
            Self::Faulted => write!(f, "Faulted"),
        }
    }
}

/// A live handle to an external connection
///
/// Implementations must be cheap to query: `state` is called on every pool
/// lookup and must not block on I/O.
pub trait PooledClient: Send + Sync + 'static {
    /// Error returned by [`PooledClient::close`]
    type Error: std::error::Error + Send + Sync + 'static;

    /// Current lifecycle state
    fn state(&self) -> ClientState;

    /// Release the underlying connection
    ///
    /// The pool calls this exactly once per client, after the client has left
    /// the pool. Failures are logged and otherwise ignored.
    fn close(&self) -> Result<(), Self::Error>;
}

/// Builds clients for a given configuration
///
/// # Example
/// ```
/// use std::convert::Infallible;
///
/// use clientcache_pool::{ClientFactory, ClientState, PooledClient};
///
/// #[derive(Debug, Clone, PartialEq, Eq, Hash)]
/// struct Endpoint {
///     url: String,
/// }
///
/// struct Conn;
///
/// impl PooledClient for Conn {
///     type Error = Infallible;
///
///     fn state(&self) -> ClientState {
///         ClientState::Open
///     }
///
///     fn close(&self) -> Result<(), Infallible> {
///         Ok(())
///     }
/// }
///
/// struct Connector;
///
/// impl ClientFactory for Connector {
///     type Config = Endpoint;
///     type Client = Conn;
///     type Error = Infallible;
///
///     fn create(&self, _config: &Endpoint) -> Result<Conn, Infallible> {
///         Ok(Conn)
///     }
/// }
/// ```
pub trait ClientFactory: Send + Sync + 'static {
    /// Connection parameters; equality and hash identify a cache entry
    type Config: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static;

    /// Client type produced by this factory
    type Client: PooledClient;

    /// Construction failure
    type Error: std::error::Error + Send + Sync + 'static;

    /// Synchronously construct a new live client
    ///
    /// Must not leave partial state behind on failure.
    fn create(&self, config: &Self::Config) -> Result<Self::Client, Self::Error>;
}

impl<F: ClientFactory> ClientFactory for Arc<F> {
    type Config = F::Config;
    type Client = F::Client;
    type Error = F::Error;

    fn create(&self, config: &Self::Config) -> Result<Self::Client, Self::Error> {
        F::create(self, config)
    }
}
