//! Time-bounded memoization of resolver results.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::observability::metrics;

#[derive(Debug, Clone)]
struct CachedEntry<V> {
    value: V,
    cached_at: Instant,
}

/// A thread-safe per-IP cache with a fixed TTL.
///
/// Concurrent misses for the same address may both resolve and both insert;
/// the last write wins and the values are equal anyway.
#[derive(Debug, Clone)]
pub struct ResolverCache<V> {
    name: &'static str,
    inner: Arc<DashMap<IpAddr, CachedEntry<V>>>,
    ttl: Duration,
    max_entries: usize,
}

impl<V: Clone> ResolverCache<V> {
    /// Create an empty cache. `name` labels metrics ("geoip", "asn").
    pub fn new(name: &'static str, ttl: Duration, max_entries: usize) -> Self {
        Self {
            name,
            inner: Arc::new(DashMap::new()),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    /// Fresh value for `ip`, if any. Stale entries are dropped.
    pub fn get(&self, ip: &IpAddr) -> Option<V> {
        let stale = match self.inner.get(ip) {
            Some(entry) if entry.cached_at.elapsed() < self.ttl => {
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };
        if stale {
            self.inner.remove(ip);
        }
        None
    }

    /// Store `value` for `ip`, evicting the oldest entries when over capacity.
    pub fn insert(&self, ip: IpAddr, value: V) {
        self.inner.insert(
            ip,
            CachedEntry {
                value,
                cached_at: Instant::now(),
            },
        );
        if self.inner.len() > self.max_entries {
            self.evict_oldest_entries();
        }
    }

    /// Return the cached value or compute, store and return it.
    /// Errors are passed through and never cached.
    pub fn get_or_resolve<E, F>(&self, ip: IpAddr, resolve: F) -> Result<V, E>
    where
        F: FnOnce(IpAddr) -> Result<V, E>,
    {
        if let Some(value) = self.get(&ip) {
            metrics::record_cache_lookup(self.name, true);
            return Ok(value);
        }
        metrics::record_cache_lookup(self.name, false);

        let value = resolve(ip)?;
        self.insert(ip, value.clone());
        Ok(value)
    }

    /// Number of stored entries, fresh or not.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Drop every expired entry.
    pub fn purge_expired(&self) {
        let ttl = self.ttl;
        self.inner.retain(|_, entry| entry.cached_at.elapsed() < ttl);
    }

    fn evict_oldest_entries(&self) {
        // Evict down to 75% so inserts don't trigger eviction every time.
        // Never below one, or the entry just inserted goes too.
        let target_size = (self.max_entries * 3 / 4).max(1);
        let to_remove = self.inner.len().saturating_sub(target_size);
        if to_remove == 0 {
            return;
        }

        let mut entries: Vec<_> = self
            .inner
            .iter()
            .map(|e| (*e.key(), e.cached_at))
            .collect();
        let to_remove = to_remove.min(entries.len());
        entries.select_nth_unstable_by_key(to_remove - 1, |(_, time)| *time);
        for (ip, _) in entries.into_iter().take(to_remove) {
            self.inner.remove(&ip);
        }

        tracing::debug!(
            cache = self.name,
            evicted = to_remove,
            remaining = self.inner.len(),
            "Resolver cache evicted entries"
        );
    }
}
