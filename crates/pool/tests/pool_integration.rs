//! Integration tests for the client pool
//!
//! Exercises the public API end to end with the mock factory: reuse, stale
//! replacement, capacity eviction, invalidation, clearing, and concurrent
//! access from many threads.

#![cfg(feature = "test-utils")]

use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use clientcache_pool::testing::{MockConfig, MockFactory};
use clientcache_pool::{
    ClientPool, ClientState, ErrorClassification, PoolConfig, PoolConfigError, PooledClient,
};
use tracing_subscriber::EnvFilter;

/// Send pool logs to the test writer; filter with `RUST_LOG`.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn endpoint(name: &str) -> MockConfig {
    MockConfig::new(format!("pulsar://{name}:6650"))
}

fn new_pool(capacity: usize) -> (ClientPool<Arc<MockFactory>>, Arc<MockFactory>) {
    new_pool_with(MockFactory::new(), capacity)
}

fn new_pool_with(
    factory: MockFactory,
    capacity: usize,
) -> (ClientPool<Arc<MockFactory>>, Arc<MockFactory>) {
    init_tracing();
    let factory = Arc::new(factory);
    let pool = ClientPool::new(Arc::clone(&factory), PoolConfig::with_capacity(capacity))
        .expect("capacity is non-zero");
    (pool, factory)
}

/// Verifies the full lifecycle of a single configuration.
///
/// # Test Steps
/// 1. Build a client and look it up again (same instance)
/// 2. Close it behind the pool's back
/// 3. Look it up again (new instance, old one closed exactly once)
/// 4. Invalidate it (closed exactly once, pool empty)
#[test]
fn test_single_config_lifecycle() {
    let (pool, factory) = new_pool(5);
    let a = endpoint("a");

    let k1 = pool.get_or_create(&a).unwrap();
    assert!(Arc::ptr_eq(&k1, &pool.get_or_create(&a).unwrap()));

    k1.set_state(ClientState::Closed);
    let k2 = pool.get_or_create(&a).unwrap();
    assert!(!Arc::ptr_eq(&k1, &k2));
    assert_eq!(k2.state(), ClientState::Open);

    assert!(pool.invalidate(&a));
    assert!(pool.is_empty());

    assert_eq!(factory.created(), 2);
    assert!(factory.probes_for(&a).iter().all(|p| p.close_calls() == 1));
}

/// Verifies LRU eviction with capacity 2 and three configurations.
///
/// # Test Steps
/// 1. Create A, B, C in order
/// 2. Verify A was evicted and closed once, B and C still cached and open
#[test]
fn test_capacity_eviction() {
    let (pool, factory) = new_pool(2);
    let (a, b, c) = (endpoint("a"), endpoint("b"), endpoint("c"));

    for config in [&a, &b, &c] {
        pool.get_or_create(config).unwrap();
    }

    let snapshot = pool.snapshot_entries();
    assert_eq!(snapshot.len(), 2);
    assert!(snapshot.contains_key(&b));
    assert!(snapshot.contains_key(&c));

    let closed: Vec<_> =
        factory.probes().into_iter().filter(|p| p.close_calls() > 0).collect();
    assert_eq!(closed.len(), 1);
    assert_eq!(closed[0].config(), &a);
    assert_eq!(closed[0].close_calls(), 1);
}

/// Verifies the pool never holds more clients than its capacity and closes
/// exactly `created - capacity` clients over a long distinct-key workload.
#[test]
fn test_eviction_count_over_many_configs() {
    let (pool, factory) = new_pool(3);

    for i in 0..20 {
        pool.get_or_create(&endpoint(&format!("broker-{i}"))).unwrap();
        assert!(pool.len() <= 3);
    }

    let closed = factory.probes().iter().filter(|p| p.close_calls() == 1).count();
    assert_eq!(closed, 20 - 3);
    assert!(factory.probes().iter().all(|p| p.close_calls() <= 1));

    let stats = pool.stats();
    assert_eq!(stats.evictions, 17);
    assert_eq!(stats.size, 3);
    assert_eq!(stats.closes, 17);
}

/// Verifies a construction failure surfaces the factory error and caches
/// nothing, and that a later success is cached normally.
#[test]
fn test_construction_failure() {
    let (pool, factory) = new_pool(5);
    let d = endpoint("d");
    factory.refuse(&d);

    let err = pool.get_or_create(&d).unwrap_err();
    assert!(err.is_retryable());
    assert!(err.to_string().contains("pulsar://d:6650"));
    assert!(pool.snapshot_entries().get(&d).is_none());

    factory.accept(&d);
    let client = pool.get_or_create(&d).unwrap();
    assert_eq!(client.state(), ClientState::Open);
    assert_eq!(pool.len(), 1);
}

/// Verifies `clear` closes every client once and a second call is a no-op.
#[test]
fn test_clear_is_idempotent() {
    let (pool, factory) = new_pool(4);
    for name in ["a", "b", "c", "d"] {
        pool.get_or_create(&endpoint(name)).unwrap();
    }

    pool.clear();
    assert!(pool.is_empty());
    pool.clear();

    assert_eq!(factory.created(), 4);
    assert!(factory.probes().iter().all(|p| p.close_calls() == 1));
    assert_eq!(pool.stats().removals, 4);
}

/// Verifies a client whose `close()` fails does not disturb the pool.
#[test]
fn test_failing_close_is_logged_not_returned() {
    let (pool, factory) = new_pool(5);
    let a = endpoint("a");
    factory.fail_close_for(&a);

    pool.get_or_create(&a).unwrap();
    assert!(pool.invalidate(&a));
    pool.get_or_create(&a).unwrap();
    pool.clear();

    let stats = pool.stats();
    assert_eq!(stats.close_failures, 2);
    assert_eq!(stats.closes, 0);
}

/// Verifies dropping the last handle closes all remaining clients.
#[test]
fn test_dropping_last_handle_closes_clients() {
    let (pool, factory) = new_pool(5);
    let consumer = pool.clone();
    let worker = thread::spawn(move || {
        consumer.get_or_create(&endpoint("a")).unwrap();
    });
    worker.join().unwrap();
    pool.get_or_create(&endpoint("b")).unwrap();

    assert!(factory.probes().iter().all(|p| p.close_calls() == 0));
    drop(pool);
    assert!(factory.probes().iter().all(|p| p.close_calls() == 1));
}

/// Verifies zero capacity is rejected at construction.
#[test]
fn test_zero_capacity_rejected() {
    init_tracing();
    let err = ClientPool::new(MockFactory::new(), PoolConfig::with_capacity(0)).unwrap_err();
    assert_eq!(err, PoolConfigError::ZeroCapacity);
    assert!(!err.is_retryable());
}

/// Validates concurrent `get_or_create` for a single configuration.
///
/// # Test Steps
/// 1. Start 16 threads behind a barrier, all asking for the same config
/// 2. Verify the pool holds exactly one entry afterwards
/// 3. Verify every client the factory built that is not the cached one was
///    closed exactly once, and the cached one was never closed
#[test]
fn test_concurrent_same_config() {
    let (pool, factory) =
        new_pool_with(MockFactory::new().with_create_delay(Duration::from_millis(5)), 4);
    let a = endpoint("a");
    let barrier = Arc::new(Barrier::new(16));

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let pool = pool.clone();
            let barrier = Arc::clone(&barrier);
            let a = a.clone();
            thread::spawn(move || {
                barrier.wait();
                pool.get_or_create(&a).unwrap().id()
            })
        })
        .collect();

    let ids: HashSet<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(pool.len(), 1);
    let cached = pool.snapshot_entries()[&a].id();
    assert_eq!(ids, HashSet::from([cached]));

    for probe in factory.probes() {
        let expected = usize::from(probe.id() != cached);
        assert_eq!(probe.close_calls(), expected, "client {}", probe.id());
    }
}

/// Validates concurrent access across more configurations than capacity.
///
/// Every thread cycles through 8 configs with capacity 3. Afterwards the
/// pool must be within capacity and no client may have been closed twice.
#[test]
fn test_concurrent_mixed_configs_respect_capacity() {
    let (pool, factory) = new_pool(3);
    let configs: Arc<Vec<MockConfig>> =
        Arc::new((0..8).map(|i| endpoint(&format!("broker-{i}"))).collect());

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let pool = pool.clone();
            let configs = Arc::clone(&configs);
            thread::spawn(move || {
                for i in 0..200 {
                    let config = &configs[(t + i) % configs.len()];
                    let client = pool.get_or_create(config).unwrap();
                    assert_eq!(client.probe().config(), config);
                    assert!(pool.len() <= 3);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert!(pool.len() <= 3);
    let probes = factory.probes();
    assert!(probes.iter().all(|p| p.close_calls() <= 1));

    let live: HashSet<u64> = pool.snapshot_entries().values().map(|c| c.id()).collect();
    for probe in &probes {
        assert_eq!(probe.close_calls() == 0, live.contains(&probe.id()), "client {}", probe.id());
    }
}

/// Validates concurrent `get_or_create` when every caller finds the same
/// stale client.
///
/// # Test Steps
/// 1. Create K1 and force it to `Closed`
/// 2. Release 16 threads through a barrier, all asking for the same config
/// 3. Verify one entry remains and every thread got the same client
/// 4. Verify K1 and every losing rebuild were closed exactly once, and the
///    cached client never
#[test]
fn test_concurrent_rebuild_of_stale_client() {
    let (pool, factory) =
        new_pool_with(MockFactory::new().with_create_delay(Duration::from_millis(2)), 4);
    let a = endpoint("a");

    let k1 = pool.get_or_create(&a).unwrap();
    k1.set_state(ClientState::Closed);

    let barrier = Arc::new(Barrier::new(16));
    let handles: Vec<_> = (0..16)
        .map(|_| {
            let pool = pool.clone();
            let barrier = Arc::clone(&barrier);
            let a = a.clone();
            thread::spawn(move || {
                barrier.wait();
                let client = pool.get_or_create(&a).unwrap();
                assert_eq!(client.state(), ClientState::Open);
                client.id()
            })
        })
        .collect();

    let ids: HashSet<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(pool.len(), 1);
    let cached = pool.snapshot_entries()[&a].id();
    assert_ne!(cached, k1.id());
    assert_eq!(ids, HashSet::from([cached]));

    assert_eq!(k1.close_calls(), 1);
    for probe in factory.probes() {
        let expected = usize::from(probe.id() != cached);
        assert_eq!(probe.close_calls(), expected, "client {}", probe.id());
    }
}
