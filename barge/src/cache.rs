// Time-boxed memoization of discovery results. Entries are visible until their
// expiry passes; a background sweep reclaims them, but reads never depend on it.
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::metrics_defs::DISCOVERY_CACHE_SIZE;
use shared::gauge;

pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(1);
const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when it is advanced.
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        ManualClock {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.offset.lock() += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + *self.offset.lock()
    }
}

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

struct CacheInner<V> {
    entries: RwLock<HashMap<String, Entry<V>>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

/// String-keyed cache where every entry expires `ttl` after it was set.
///
/// Cloning is cheap and all clones share the same entries. There is no
/// capacity bound.
pub struct ExpiringCache<V> {
    inner: Arc<CacheInner<V>>,
}

impl<V> Clone for ExpiringCache<V> {
    fn clone(&self) -> Self {
        ExpiringCache {
            inner: self.inner.clone(),
        }
    }
}

impl<V> ExpiringCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        ExpiringCache {
            inner: Arc::new(CacheInner {
                entries: RwLock::new(HashMap::new()),
                ttl,
                clock,
            }),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    /// Stores `value` under `key`, replacing any previous entry and its expiry.
    pub fn set<K: Into<String>>(&self, key: K, value: V) -> bool {
        let expires_at = self.inner.clock.now() + self.inner.ttl;
        self.inner
            .entries
            .write()
            .insert(key.into(), Entry { value, expires_at });
        true
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.inner.clock.now();
        self.inner
            .entries
            .read()
            .get(key)
            .filter(|entry| now < entry.expires_at)
            .map(|entry| entry.value.clone())
    }

    /// Number of stored entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.inner.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every expired entry and returns how many were removed.
    ///
    /// Collecting expired keys holds the read lock for one pass over the map,
    /// so a concurrent `set` waits for that scan. The cache holds one entry per
    /// barge, which keeps the pass short. The write lock is then taken once
    /// per removal, and an entry replaced after the keys were collected is
    /// left alone.
    pub fn sweep(&self) -> usize {
        let now = self.inner.clock.now();
        let expired: Vec<String> = self
            .inner
            .entries
            .read()
            .iter()
            .filter(|(_, entry)| entry.expires_at <= now)
            .map(|(key, _)| key.clone())
            .collect();

        let mut removed = 0;
        for key in expired {
            let mut entries = self.inner.entries.write();
            if entries
                .get(&key)
                .is_some_and(|entry| entry.expires_at <= now)
            {
                entries.remove(&key);
                removed += 1;
            }
        }
        removed
    }

    /// Starts the periodic sweep on the current tokio runtime.
    ///
    /// The task runs until the returned handle is shut down or dropped. A zero
    /// interval is raised to one millisecond.
    pub fn spawn_sweeper(&self, interval: Duration) -> SweepHandle {
        let cache = self.clone();
        let interval = interval.max(MIN_SWEEP_INTERVAL);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let removed = cache.sweep();
                if removed > 0 {
                    tracing::debug!(removed, "Swept expired cache entries");
                }
                gauge!(DISCOVERY_CACHE_SIZE).set(cache.len() as f64);
            }
        });

        SweepHandle { handle }
    }
}

/// Owns the background sweep task of an `ExpiringCache`.
pub struct SweepHandle {
    handle: JoinHandle<()>,
}

impl SweepHandle {
    pub fn shutdown(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for SweepHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
