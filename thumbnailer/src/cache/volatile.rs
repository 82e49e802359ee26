//! Time-bounded cache of recent render outcomes.
//!
//! Holds both successes and failures. Failures are what make this cache
//! matter: repeated requests for a broken key within the TTL are answered
//! from here instead of hammering the renderer. Entries are evicted lazily on
//! lookup; an optional sweeper daemon also purges them in the background.
//!
//! Ages are measured with [`tokio::time::Instant`] so a paused test clock
//! drives expiry deterministically.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::key::RenderKey;
use crate::outcome::RenderOutcome;

/// Default time-to-live for cached outcomes (5 minutes).
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
struct CacheEntry {
    outcome: RenderOutcome,
    inserted_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.inserted_at) > ttl
    }
}

/// Statistics for monitoring the volatile cache.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct VolatileCacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Entries dropped because they outlived the TTL.
    pub expired: u64,
    pub entries: usize,
}

/// Key → outcome cache with a fixed TTL and no size bound.
///
/// The key space is expected to self-limit through expiry.
pub struct VolatileCache {
    entries: DashMap<RenderKey, CacheEntry>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    expired: AtomicU64,
}

impl VolatileCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            expired: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Looks up an unexpired outcome.
    ///
    /// An entry older than the TTL is treated as absent and removed, unless
    /// a concurrent `put` has already replaced it.
    pub fn get(&self, key: &RenderKey) -> Option<RenderOutcome> {
        let now = Instant::now();

        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired(self.ttl, now) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.outcome.clone());
            }
        }

        let ttl = self.ttl;
        if self
            .entries
            .remove_if(key, |_, entry| entry.is_expired(ttl, now))
            .is_some()
        {
            self.expired.fetch_add(1, Ordering::Relaxed);
            debug!(key = %key, "Volatile cache entry expired");
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Stores an outcome, overwriting any previous entry and resetting its age.
    pub fn put(&self, key: RenderKey, outcome: RenderOutcome) {
        self.entries.insert(
            key,
            CacheEntry {
                outcome,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Removes every expired entry. Returns the number removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let ttl = self.ttl;
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(ttl, now));
        let removed = before.saturating_sub(self.entries.len());
        self.expired.fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    /// Number of entries currently held, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> VolatileCacheStats {
        VolatileCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }

    /// Spawns a daemon that purges expired entries every `interval` until
    /// `shutdown` is cancelled.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            info!(
                interval_secs = interval.as_secs(),
                ttl_secs = cache.ttl.as_secs(),
                "Volatile cache sweeper started"
            );

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        info!("Volatile cache sweeper shutting down");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        let removed = cache.purge_expired();
                        if removed > 0 {
                            debug!(removed, remaining = cache.len(), "Swept expired outcomes");
                        }
                    }
                }
            }
        })
    }
}

impl Default for VolatileCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}
