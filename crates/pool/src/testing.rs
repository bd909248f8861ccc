//! Mock client and factory for exercising a [`ClientPool`](crate::ClientPool)
//!
//! Every client built by [`MockFactory`] shares a [`ClientProbe`] with the
//! factory, so tests can force state changes and count `close()` calls even
//! after the pool has dropped the client.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;

use crate::client::{ClientFactory, ClientState, PooledClient};

/// Connection parameters used by the mocks
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MockConfig {
    /// Service URL, e.g. `pulsar://localhost:6650`
    pub service_url: String,
    /// Optional auth token; part of the key like every other field
    pub auth_token: Option<String>,
}

impl MockConfig {
    /// Config with only a service URL
    pub fn new(service_url: impl Into<String>) -> Self {
        Self { service_url: service_url.into(), auth_token: None }
    }

    /// Same URL with an auth token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }
}

/// Errors produced by the mocks
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MockError {
    /// Factory configured to refuse this config
    #[error("connection refused: {0}")]
    Refused(String),

    /// Client configured to fail on close
    #[error("close failed for client {0}")]
    CloseFailed(u64),
}

/// Shared observation point for one mock client
#[derive(Debug)]
pub struct ClientProbe {
    id: u64,
    config: MockConfig,
    state: Mutex<ClientState>,
    close_calls: AtomicUsize,
    fail_close: bool,
}

impl ClientProbe {
    /// Unique id assigned at creation, starting at 1
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Config the client was built for
    pub fn config(&self) -> &MockConfig {
        &self.config
    }

    /// Current state
    pub fn state(&self) -> ClientState {
        *self.state.lock()
    }

    /// Force a state, as if the connection changed underneath the pool
    pub fn set_state(&self, state: ClientState) {
        *self.state.lock() = state;
    }

    /// Number of `close()` calls received
    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

/// Client handed out by [`MockFactory`]
#[derive(Debug)]
pub struct MockClient {
    probe: Arc<ClientProbe>,
}

impl MockClient {
    /// Unique id assigned at creation
    pub fn id(&self) -> u64 {
        self.probe.id
    }

    /// Probe shared with the factory
    pub fn probe(&self) -> &Arc<ClientProbe> {
        &self.probe
    }

    /// Force a state on this client
    pub fn set_state(&self, state: ClientState) {
        self.probe.set_state(state);
    }

    /// Number of `close()` calls received
    pub fn close_calls(&self) -> usize {
        self.probe.close_calls()
    }
}

impl PooledClient for MockClient {
    type Error = MockError;

    fn state(&self) -> ClientState {
        self.probe.state()
    }

    fn close(&self) -> Result<(), MockError> {
        self.probe.close_calls.fetch_add(1, Ordering::SeqCst);
        self.probe.set_state(ClientState::Closed);
        if self.probe.fail_close {
            return Err(MockError::CloseFailed(self.probe.id));
        }
        Ok(())
    }
}

/// Factory that records every client it builds
#[derive(Debug, Default)]
pub struct MockFactory {
    next_id: AtomicU64,
    probes: Mutex<Vec<Arc<ClientProbe>>>,
    refused: Mutex<HashSet<MockConfig>>,
    failing_close: Mutex<HashSet<MockConfig>>,
    create_delay: Option<Duration>,
}

impl MockFactory {
    /// Factory that always succeeds
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long inside every `create` call
    pub fn with_create_delay(mut self, delay: Duration) -> Self {
        self.create_delay = Some(delay);
        self
    }

    /// Make `create` fail for `config`
    pub fn refuse(&self, config: &MockConfig) {
        self.refused.lock().insert(config.clone());
    }

    /// Make `create` succeed again for `config`
    pub fn accept(&self, config: &MockConfig) {
        self.refused.lock().remove(config);
    }

    /// Make clients built for `config` fail on `close()`
    pub fn fail_close_for(&self, config: &MockConfig) {
        self.failing_close.lock().insert(config.clone());
    }

    /// Probes of every client built so far, in creation order
    pub fn probes(&self) -> Vec<Arc<ClientProbe>> {
        self.probes.lock().clone()
    }

    /// Probes of clients built for `config`, in creation order
    pub fn probes_for(&self, config: &MockConfig) -> Vec<Arc<ClientProbe>> {
        self.probes.lock().iter().filter(|p| &p.config == config).cloned().collect()
    }

    /// Number of clients built so far
    pub fn created(&self) -> usize {
        self.probes.lock().len()
    }
}

impl ClientFactory for MockFactory {
    type Config = MockConfig;
    type Client = MockClient;
    type Error = MockError;

    fn create(&self, config: &MockConfig) -> Result<MockClient, MockError> {
        if let Some(delay) = self.create_delay {
            thread::sleep(delay);
        }
        if self.refused.lock().contains(config) {
            return Err(MockError::Refused(config.service_url.clone()));
        }

        let probe = Arc::new(ClientProbe {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            config: config.clone(),
            state: Mutex::new(ClientState::Open),
            close_calls: AtomicUsize::new(0),
            fail_close: self.failing_close.lock().contains(config),
        });
        self.probes.lock().push(Arc::clone(&probe));
        Ok(MockClient { probe })
    }
}
