//! In-memory rate cache with per-entry TTL.
//!
//! Expiry is checked on read; [`RateCache::purge_expired`] and
//! [`RateCache::spawn_sweeper`] exist only to bound memory.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use dashmap::DashMap;
use fx_types::FxError;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug)]
struct CacheEntry<V> {
    value: Arc<V>,
    created_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    /// Visible strictly before `created_at + ttl`.
    fn is_live(&self, now: Instant) -> bool {
        self.created_at
            .checked_add(self.ttl)
            .is_none_or(|expires_at| now < expires_at)
    }
}

/// Shared key/value store with lazy expiry.
///
/// Values are handed out as `Arc<V>` and replaced wholesale on refresh.
pub struct RateCache<V> {
    entries: DashMap<String, CacheEntry<V>>,
    /// One flight per key with a miss being filled.
    in_flight: DashMap<String, Arc<Flight>>,
}

/// A fetch for one key and the callers queued behind it.
#[derive(Default)]
struct Flight {
    gate: Mutex<()>,
    failure: OnceLock<FxError>,
    finished: AtomicBool,
}

/// A caller's hold on a flight.
///
/// Dropping it unregisters the flight once it has finished or nobody else
/// holds it, which also covers callers cancelled mid-fetch.
struct FlightHandle<'a> {
    flights: &'a DashMap<String, Arc<Flight>>,
    key: &'a str,
    flight: Arc<Flight>,
}

impl Drop for FlightHandle<'_> {
    fn drop(&mut self) {
        let flight = &self.flight;
        self.flights.remove_if(self.key, |_, current| {
            // The map and this handle account for two references.
            Arc::ptr_eq(current, flight)
                && (flight.finished.load(Ordering::Acquire) || Arc::strong_count(current) <= 2)
        });
    }
}

impl<V> RateCache<V>
where
    V: Send + Sync,
{
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            in_flight: DashMap::new(),
        }
    }

    /// Returns the live value for `key`; an expired entry is a miss.
    pub fn get(&self, key: &str) -> Option<Arc<V>> {
        let now = Instant::now();
        {
            let entry = self.entries.get(key)?;
            if entry.is_live(now) {
                return Some(entry.value.clone());
            }
        }
        self.entries.remove_if(key, |_, entry| !entry.is_live(now));
        None
    }

    /// Stores or overwrites `key`, restarting its expiry clock.
    pub fn put(&self, key: impl Into<String>, value: impl Into<Arc<V>>, ttl: Duration) {
        self.entries.insert(
            key.into(),
            CacheEntry {
                value: value.into(),
                created_at: Instant::now(),
                ttl,
            },
        );
    }

    /// Returns the cached value or fills the miss with `fetch`.
    ///
    /// Concurrent misses for the same key are collapsed: the first caller
    /// runs `fetch` and callers queued behind it get its outcome, the stored
    /// value on success or a clone of the error on failure. A failed fetch
    /// stores nothing, so the next caller to arrive afterwards fetches again.
    /// If the fetching caller is dropped before finishing, the next queued
    /// caller takes over. `fetch` is not called on a hit.
    pub async fn get_or_try_fetch<F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        fetch: F,
    ) -> Result<Arc<V>, FxError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, FxError>>,
    {
        if let Some(hit) = self.get(key) {
            debug!(key, "cache hit");
            return Ok(hit);
        }

        let handle = FlightHandle {
            flights: &self.in_flight,
            key,
            flight: self.in_flight.entry(key.to_string()).or_default().clone(),
        };
        let flight = &handle.flight;
        let _gate = flight.gate.lock().await;

        if let Some(hit) = self.get(key) {
            debug!(key, "cache filled by concurrent fetch");
            return Ok(hit);
        }
        if let Some(err) = flight.failure.get() {
            debug!(key, error = %err, "concurrent fetch failed");
            return Err(err.clone());
        }

        debug!(key, "cache miss");
        let result = fetch().await;
        if let Err(err) = &result {
            let _ = flight.failure.set(err.clone());
        }
        flight.finished.store(true, Ordering::Release);

        result.map(|value| {
            let value = Arc::new(value);
            self.put(key, value.clone(), ttl);
            value
        })
    }

    /// Drops `key` regardless of expiry.
    pub fn invalidate(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Removes every expired entry and returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut purged = 0;
        self.entries.retain(|_, entry| {
            let live = entry.is_live(now);
            if !live {
                purged += 1;
            }
            live
        });
        purged
    }

    /// Number of stored entries, expired ones included until purged.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V> RateCache<V>
where
    V: Send + Sync + 'static,
{
    /// Spawns a task purging expired entries every `period`.
    ///
    /// The task stops once every other handle to the cache is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let cache = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(cache) = cache.upgrade() else {
                    break;
                };
                let purged = cache.purge_expired();
                if purged > 0 {
                    debug!(purged, remaining = cache.len(), "purged expired cache entries");
                }
            }
        })
    }
}

impl<V> Default for RateCache<V>
where
    V: Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}
