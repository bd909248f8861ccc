//! Size-bounded LRU map with removal notifications
//!
//! [`BoundedMap`] wraps an [`lru::LruCache`] behind a single mutex and reports
//! every entry that leaves the map to a [`RemovalListener`], whatever the
//! reason: capacity pressure, explicit removal, replacement, or a full clear.
//!
//! # Locking
//!
//! Each operation takes the mutex once and is atomic with respect to every
//! other operation. Removed entries are collected while the lock is held and
//! handed to the listener only after it has been released, so a slow listener
//! never blocks other callers. The loader passed to
//! [`BoundedMap::get_or_try_insert_with`] also runs without the lock.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;

/// Why an entry left the map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemovalCause {
    /// Least recently used entry dropped to make room for an insert
    Capacity,
    /// Removed by an explicit call
    Explicit,
    /// Removed because the owner found the value no longer usable
    Stale,
    /// Overwritten by an insert for the same key
    Replaced,
    /// Freshly loaded value discarded because another caller inserted first
    Superseded,
    /// Removed by [`BoundedMap::clear`] or when the map is dropped
    Cleared,
}

impl RemovalCause {
    /// Whether the map chose the victim itself rather than a caller
    pub fn was_evicted(self) -> bool {
        matches!(self, Self::Capacity)
    }
}

impl fmt::Display for RemovalCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Capacity => write!(f, "capacity"),
            Self::Explicit => write!(f, "explicit"),
            Self::Stale => write!(f, "stale"),
            Self::Replaced => write!(f, "replaced"),
            Self::Superseded => write!(f, "superseded"),
            Self::Cleared => write!(f, "cleared"),
        }
    }
}

/// Receives every entry removed from a [`BoundedMap`]
///
/// The listener takes ownership of the removed value. It is never called
/// while the map's lock is held, and it must not panic.
pub trait RemovalListener<K, V>: Send + Sync {
    /// Called once per removed entry
    fn on_removal(&self, key: &K, value: V, cause: RemovalCause);
}

impl<K, V, F> RemovalListener<K, V> for F
where
    F: Fn(&K, V, RemovalCause) + Send + Sync,
{
    fn on_removal(&self, key: &K, value: V, cause: RemovalCause) {
        self(key, value, cause);
    }
}

/// How [`BoundedMap::get_or_try_insert_with`] produced its value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// A valid value was already present
    Cached,
    /// Nothing was cached; the loader ran and its value was inserted
    Loaded,
    /// An invalid value was dropped; the loader ran and its value was
    /// inserted
    Reloaded,
    /// Loader ran but another caller inserted first; the existing value was
    /// returned and the loaded one reported as [`RemovalCause::Superseded`]
    LostRace,
}

type Removed<K, V> = (K, V, RemovalCause);

/// Thread-safe LRU map with a fixed capacity and a removal hook
pub struct BoundedMap<K, V>
where
    K: Hash + Eq,
{
    entries: Mutex<LruCache<K, V>>,
    listener: Box<dyn RemovalListener<K, V>>,
}

impl<K, V> BoundedMap<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Create an empty map holding at most `capacity` entries
    ///
    /// # Example
    /// ```
    /// use std::num::NonZeroUsize;
    ///
    /// use clientcache_pool::bounded::{BoundedMap, RemovalCause};
    ///
    /// let capacity = NonZeroUsize::MIN.saturating_add(1);
    /// let map = BoundedMap::new(capacity, |key: &String, _value: u32, cause: RemovalCause| {
    ///     println!("{key} removed ({cause})");
    /// });
    /// map.insert("a".to_string(), 1);
    /// map.insert("b".to_string(), 2);
    /// map.insert("c".to_string(), 3); // evicts "a"
    /// assert_eq!(map.len(), 2);
    /// assert!(!map.contains(&"a".to_string()));
    /// ```
    pub fn new<L>(capacity: NonZeroUsize, listener: L) -> Self
    where
        L: RemovalListener<K, V> + 'static,
    {
        Self { entries: Mutex::new(LruCache::new(capacity)), listener: Box::new(listener) }
    }

    /// Get a value and mark it most recently used
    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.lock().get(key).cloned()
    }

    /// Get a value without touching recency
    pub fn peek(&self, key: &K) -> Option<V> {
        self.entries.lock().peek(key).cloned()
    }

    /// Check whether a key is present without touching recency
    pub fn contains(&self, key: &K) -> bool {
        self.entries.lock().contains(key)
    }

    /// Insert a value
    ///
    /// An existing value for the same key is reported as
    /// [`RemovalCause::Replaced`]. If the map is full, the least recently used
    /// entry is reported as [`RemovalCause::Capacity`].
    pub fn insert(&self, key: K, value: V) {
        let removed = {
            let mut entries = self.entries.lock();
            Self::push(&mut entries, key, value)
        };
        self.notify(removed);
    }

    /// Return the cached value for `key` if `is_valid` accepts it, otherwise
    /// build one with `load`
    ///
    /// A cached value rejected by `is_valid` is removed and reported as
    /// [`RemovalCause::Stale`] before `load` runs. `load` runs without the lock
    /// held and at most once per call, so two callers that miss at the same
    /// time may both run it. Only the first insert wins; the other caller gets
    /// the winner's value back and its own value goes to the listener as
    /// [`RemovalCause::Superseded`].
    ///
    /// # Errors
    /// Returns whatever `load` returns; nothing is inserted in that case.
    pub fn get_or_try_insert_with<P, F, E>(
        &self,
        key: &K,
        is_valid: P,
        load: F,
    ) -> Result<(V, LoadOutcome), E>
    where
        P: Fn(&V) -> bool,
        F: FnOnce(&K) -> Result<V, E>,
    {
        let stale = {
            let mut entries = self.entries.lock();
            let cached = entries.get(key).cloned();
            match cached {
                Some(value) if is_valid(&value) => return Ok((value, LoadOutcome::Cached)),
                Some(_) => entries.pop_entry(key),
                None => None,
            }
        };
        let outcome = if stale.is_some() { LoadOutcome::Reloaded } else { LoadOutcome::Loaded };
        if let Some((key, value)) = stale {
            self.listener.on_removal(&key, value, RemovalCause::Stale);
        }

        let fresh = load(key)?;

        let (value, outcome, removed) = {
            let mut entries = self.entries.lock();
            let existing = entries.get(key).cloned();
            match existing {
                Some(existing) if is_valid(&existing) => (
                    existing,
                    LoadOutcome::LostRace,
                    vec![(key.clone(), fresh, RemovalCause::Superseded)],
                ),
                existing => {
                    let mut removed = Vec::with_capacity(1);
                    if existing.is_some() {
                        if let Some((old_key, old)) = entries.pop_entry(key) {
                            removed.push((old_key, old, RemovalCause::Stale));
                        }
                    }
                    removed.extend(Self::push(&mut entries, key.clone(), fresh.clone()));
                    (fresh, outcome, removed)
                }
            }
        };

        for (key, value, cause) in removed {
            self.listener.on_removal(&key, value, cause);
        }
        Ok((value, outcome))
    }

    /// Remove an entry, reporting it as [`RemovalCause::Explicit`]
    ///
    /// Returns `false` if the key was absent.
    pub fn remove(&self, key: &K) -> bool {
        self.remove_if(key, |_| true, RemovalCause::Explicit)
    }

    /// Remove an entry only if `predicate` accepts its current value
    ///
    /// The check and the removal happen under one lock acquisition, so the
    /// entry cannot be swapped out in between.
    pub fn remove_if<P>(&self, key: &K, predicate: P, cause: RemovalCause) -> bool
    where
        P: FnOnce(&V) -> bool,
    {
        let removed = {
            let mut entries = self.entries.lock();
            if entries.peek(key).is_some_and(predicate) {
                entries.pop_entry(key)
            } else {
                None
            }
        };

        match removed {
            Some((key, value)) => {
                self.listener.on_removal(&key, value, cause);
                true
            }
            None => false,
        }
    }

    /// Remove every entry, least recently used first
    ///
    /// Returns the number of entries removed.
    pub fn clear(&self) -> usize {
        let drained = Self::drain(&mut self.entries.lock());
        let count = drained.len();
        for (key, value) in drained {
            self.listener.on_removal(&key, value, RemovalCause::Cleared);
        }
        count
    }

    /// Point-in-time copy of all entries
    pub fn snapshot(&self) -> HashMap<K, V> {
        self.entries.lock().iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    /// Current number of entries
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the map is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of entries
    pub fn capacity(&self) -> NonZeroUsize {
        self.entries.lock().cap()
    }

    fn push(entries: &mut LruCache<K, V>, key: K, value: V) -> Option<Removed<K, V>> {
        let cause =
            if entries.contains(&key) { RemovalCause::Replaced } else { RemovalCause::Capacity };
        entries.push(key, value).map(|(k, v)| (k, v, cause))
    }

    fn drain(entries: &mut LruCache<K, V>) -> Vec<(K, V)> {
        let mut drained = Vec::with_capacity(entries.len());
        while let Some(entry) = entries.pop_lru() {
            drained.push(entry);
        }
        drained
    }

    fn notify(&self, removed: Option<Removed<K, V>>) {
        if let Some((key, value, cause)) = removed {
            self.listener.on_removal(&key, value, cause);
        }
    }
}

impl<K, V> Drop for BoundedMap<K, V>
where
    K: Hash + Eq,
{
    fn drop(&mut self) {
        let entries = self.entries.get_mut();
        while let Some((key, value)) = entries.pop_lru() {
            self.listener.on_removal(&key, value, RemovalCause::Cleared);
        }
    }
}

impl<K, V> fmt::Debug for BoundedMap<K, V>
where
    K: Hash + Eq,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.entries.lock();
        f.debug_struct("BoundedMap")
            .field("len", &entries.len())
            .field("capacity", &entries.cap())
            .finish_non_exhaustive()
    }
}
