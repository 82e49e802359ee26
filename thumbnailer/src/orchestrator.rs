//! Render orchestration: the single public entry point of the pipeline.
//!
//! # Resolution order
//!
//! ```text
//! resolve(raw)
//!   │
//!   ├─ normalize ──────────────► reserved/empty → Failure(InvalidKey)
//!   ├─ persistent store ───────► hit → Success (authoritative)
//!   ├─ volatile cache ─────────► hit → cached Success or Failure
//!   └─ coalescer.get_or_start ─► render_and_persist (one per key)
//!                                  ├─ Ok  → store.write, cache Success
//!                                  └─ Err → cache Failure (never persisted)
//! ```
//!
//! The persistent store is consulted first so a durably rendered key never
//! costs any further renderer work or in-memory bookkeeping, including
//! after a restart.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::cache::VolatileCache;
use crate::coalesce::RequestCoalescer;
use crate::key::{KeyPolicy, RenderKey};
use crate::outcome::{RenderError, RenderOutcome};
use crate::renderer::{RenderOptions, Renderer};
use crate::store::{ArtifactStore, StoreError};

/// Snapshot of orchestrator counters.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OrchestratorStats {
    /// Requests answered from the persistent store
    pub disk_hits: u64,
    /// Requests answered from the volatile cache
    pub volatile_hits: u64,
    /// Renderer invocations
    pub renders: u64,
    /// Renderer invocations that failed
    pub render_failures: u64,
    /// Successful renders whose artifact could not be written
    pub persist_failures: u64,
    /// Requests rejected during key normalization
    pub reserved: u64,
}

#[derive(Default)]
struct Counters {
    disk_hits: AtomicU64,
    volatile_hits: AtomicU64,
    renders: AtomicU64,
    render_failures: AtomicU64,
    persist_failures: AtomicU64,
    reserved: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> OrchestratorStats {
        OrchestratorStats {
            disk_hits: self.disk_hits.load(Ordering::Relaxed),
            volatile_hits: self.volatile_hits.load(Ordering::Relaxed),
            renders: self.renders.load(Ordering::Relaxed),
            render_failures: self.render_failures.load(Ordering::Relaxed),
            persist_failures: self.persist_failures.load(Ordering::Relaxed),
            reserved: self.reserved.load(Ordering::Relaxed),
        }
    }
}

struct Inner<R, S> {
    renderer: R,
    store: S,
    volatile: Arc<VolatileCache>,
    coalescer: Arc<RequestCoalescer>,
    policy: KeyPolicy,
    options: RenderOptions,
    counters: Counters,
}

/// Composes store, volatile cache, coalescer and renderer into
/// [`resolve`](Self::resolve).
///
/// Cheap to clone; clones share all state.
pub struct RenderOrchestrator<R, S> {
    inner: Arc<Inner<R, S>>,
}

impl<R, S> Clone for RenderOrchestrator<R, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: Renderer, S: ArtifactStore> RenderOrchestrator<R, S> {
    /// Creates an orchestrator with default options, TTL and key policy.
    pub fn new(renderer: R, store: S) -> Self {
        Self::builder(renderer, store).build()
    }

    pub fn builder(renderer: R, store: S) -> OrchestratorBuilder<R, S> {
        OrchestratorBuilder {
            renderer,
            store,
            volatile: None,
            ttl: None,
            policy: KeyPolicy::default(),
            options: RenderOptions::default(),
        }
    }

    /// Resolves a raw key to its outcome.
    ///
    /// Never fails outright: every error is expressed as a
    /// [`RenderOutcome::Failure`].
    pub async fn resolve(&self, raw_key: &str) -> RenderOutcome {
        let key = match self.inner.policy.normalize(raw_key) {
            Ok(key) => key,
            Err(e) => {
                Counters::bump(&self.inner.counters.reserved);
                debug!(raw_key, "Rejected reserved key");
                return RenderOutcome::failure(e);
            }
        };

        if let Some(outcome) = self.inner.read_persisted(&key).await {
            return outcome;
        }

        if let Some(outcome) = self.inner.volatile.get(&key) {
            Counters::bump(&self.inner.counters.volatile_hits);
            debug!(key = %key, success = outcome.is_success(), "Volatile cache hit");
            return outcome;
        }

        let inner = Arc::clone(&self.inner);
        let render_key = key.clone();
        self.inner
            .coalescer
            .get_or_start(key, move || async move { inner.render_and_persist(render_key).await })
            .wait()
            .await
    }

    pub fn stats(&self) -> OrchestratorStats {
        self.inner.counters.snapshot()
    }

    pub fn volatile_cache(&self) -> &Arc<VolatileCache> {
        &self.inner.volatile
    }

    pub fn coalescer(&self) -> &Arc<RequestCoalescer> {
        &self.inner.coalescer
    }

    pub fn store(&self) -> &S {
        &self.inner.store
    }

    pub fn options(&self) -> &RenderOptions {
        &self.inner.options
    }

    /// Logs pipeline-wide statistics.
    pub fn log_stats(&self) {
        let stats = self.stats();
        let cache = self.inner.volatile.stats();

        info!(
            disk_hits = stats.disk_hits,
            volatile_hits = stats.volatile_hits,
            renders = stats.renders,
            render_failures = stats.render_failures,
            persist_failures = stats.persist_failures,
            reserved = stats.reserved,
            cached_outcomes = cache.entries,
            expired_outcomes = cache.expired,
            "Render orchestrator statistics"
        );
        self.inner.coalescer.log_stats();
    }
}

impl<R: Renderer, S: ArtifactStore> Inner<R, S> {
    /// Returns the persisted artifact for `key`, if any.
    ///
    /// A failed existence check is treated as absent. A failed read of an
    /// existing artifact fails the request.
    async fn read_persisted(&self, key: &RenderKey) -> Option<RenderOutcome> {
        match self.store.exists(key).await {
            Ok(true) => {}
            Ok(false) => return None,
            Err(e) => {
                warn!(key = %key, error = %e, "Store existence check failed, treating as absent");
                return None;
            }
        }

        match self.store.read(key).await {
            Ok(data) => {
                Counters::bump(&self.counters.disk_hits);
                debug!(key = %key, bytes = data.len(), "Persistent store hit");
                Some(RenderOutcome::success(data))
            }
            // Removed between the check and the read (cache clear).
            Err(StoreError::NotFound(_)) => None,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to read persisted artifact");
                Some(RenderOutcome::failure(RenderError::StoreIo(e.to_string())))
            }
        }
    }

    async fn render_and_persist(&self, key: RenderKey) -> RenderOutcome {
        // A computation for this key may have finished between the caller's
        // lookups and this registration.
        if let Some(outcome) = self.read_persisted(&key).await {
            return outcome;
        }
        if let Some(outcome) = self.volatile.get(&key) {
            Counters::bump(&self.counters.volatile_hits);
            return outcome;
        }

        Counters::bump(&self.counters.renders);
        let outcome = match self.renderer.render(&key, &self.options).await {
            Ok(data) => {
                if let Err(e) = self.store.write(&key, &data).await {
                    Counters::bump(&self.counters.persist_failures);
                    warn!(
                        key = %key,
                        error = %e,
                        "Failed to persist rendered thumbnail; serving from memory only"
                    );
                }
                info!(key = %key, bytes = data.len(), "Thumbnail rendered");
                RenderOutcome::success(data)
            }
            Err(e) => {
                Counters::bump(&self.counters.render_failures);
                warn!(key = %key, error = %e, "Thumbnail render failed");
                RenderOutcome::failure(e)
            }
        };

        self.volatile.put(key, outcome.clone());
        outcome
    }
}

/// Builder for [`RenderOrchestrator`].
pub struct OrchestratorBuilder<R, S> {
    renderer: R,
    store: S,
    volatile: Option<Arc<VolatileCache>>,
    ttl: Option<Duration>,
    policy: KeyPolicy,
    options: RenderOptions,
}

impl<R: Renderer, S: ArtifactStore> OrchestratorBuilder<R, S> {
    pub fn options(mut self, options: RenderOptions) -> Self {
        self.options = options;
        self
    }

    pub fn key_policy(mut self, policy: KeyPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the TTL of a fresh volatile cache. Ignored when a shared cache is
    /// supplied through [`volatile_cache`](Self::volatile_cache).
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Uses an existing volatile cache, e.g. one with a running sweeper.
    pub fn volatile_cache(mut self, cache: Arc<VolatileCache>) -> Self {
        self.volatile = Some(cache);
        self
    }

    pub fn build(self) -> RenderOrchestrator<R, S> {
        let volatile = self.volatile.unwrap_or_else(|| {
            Arc::new(match self.ttl {
                Some(ttl) => VolatileCache::new(ttl),
                None => VolatileCache::default(),
            })
        });

        RenderOrchestrator {
            inner: Arc::new(Inner {
                renderer: self.renderer,
                store: self.store,
                volatile,
                coalescer: Arc::new(RequestCoalescer::new()),
                policy: self.policy,
                options: self.options,
                counters: Counters::default(),
            }),
        }
    }
}
