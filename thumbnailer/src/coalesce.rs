//! Request coalescing for render computations.
//!
//! When many requests arrive for the same unrendered key at once, only one
//! render actually runs; every other caller waits on it and receives the
//! same outcome.
//!
//! # Architecture
//!
//! ```text
//! Request A ─┐
//!            │                                 spawned
//! Request B ─┼──► RequestCoalescer ──────► computation
//!            │        │                        │
//! Request C ─┘        │                        │
//!                     ▼                        ▼
//!               [A, B, C all             [one render]
//!                receive same                  │
//!                outcome]◄────────────────────┘
//! ```
//!
//! # Implementation
//!
//! Uses `DashMap`'s entry API for an atomic check-and-insert, so two callers
//! can never both register a computation for one key. Each registration owns
//! a broadcast sender. The computation is spawned on the runtime rather than
//! driven by the first caller, so a caller that goes away (client disconnect)
//! cannot strand its waiters.
//!
//! On completion the key is removed from the table *before* the outcome is
//! broadcast: a request that arrives afterwards starts fresh (or hits the
//! volatile cache) and never reattaches to a finished computation.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::key::RenderKey;
use crate::outcome::{RenderError, RenderOutcome};

/// Default broadcast capacity per in-flight key.
///
/// Only one message is ever sent per channel, so any capacity >= 1 works.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 16;

/// Tracks in-flight render computations, one per key.
pub struct RequestCoalescer {
    /// In-flight computations: key -> broadcast sender for the outcome
    in_flight: DashMap<RenderKey, broadcast::Sender<RenderOutcome>>,
    channel_capacity: usize,
    total_requests: AtomicU64,
    coalesced_requests: AtomicU64,
    new_requests: AtomicU64,
}

/// Statistics for monitoring coalescing effectiveness.
#[derive(Debug, Default, Clone)]
pub struct CoalescerStats {
    /// Total registrations received
    pub total_requests: u64,
    /// Registrations that attached to an existing computation
    pub coalesced_requests: u64,
    /// Registrations that started a computation
    pub new_requests: u64,
}

impl CoalescerStats {
    /// Returns the coalescing ratio (0.0 to 1.0)
    pub fn coalescing_ratio(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.coalesced_requests as f64 / self.total_requests as f64
        }
    }
}

impl RequestCoalescer {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Creates a coalescer with a specific broadcast channel capacity.
    pub fn with_capacity(channel_capacity: usize) -> Self {
        Self {
            in_flight: DashMap::new(),
            channel_capacity: channel_capacity.max(1),
            total_requests: AtomicU64::new(0),
            coalesced_requests: AtomicU64::new(0),
            new_requests: AtomicU64::new(0),
        }
    }

    /// Returns a handle on the computation for `key`, starting one if none
    /// is registered.
    ///
    /// `start` is invoked if and only if no computation for `key` is in
    /// flight. The future it returns is spawned on the current runtime.
    /// Every handle obtained while that computation is registered resolves
    /// to the same outcome.
    pub fn get_or_start<F, Fut>(self: &Arc<Self>, key: RenderKey, start: F) -> InFlight
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = RenderOutcome> + Send + 'static,
    {
        self.total_requests.fetch_add(1, Ordering::Relaxed);

        let rx = match self.in_flight.entry(key.clone()) {
            Entry::Occupied(entry) => {
                let rx = entry.get().subscribe();
                let coalesced = self.coalesced_requests.fetch_add(1, Ordering::Relaxed) + 1;
                debug!(
                    key = %key,
                    coalesced,
                    "Coalescing request - waiting for in-flight render"
                );
                return InFlight { rx, leader: false };
            }
            Entry::Vacant(entry) => {
                let (tx, rx) = broadcast::channel(self.channel_capacity);
                entry.insert(tx);
                rx
            }
        };

        self.new_requests.fetch_add(1, Ordering::Relaxed);
        debug!(
            key = %key,
            in_flight_count = self.in_flight.len(),
            "New request - starting render"
        );

        let computation = start();
        let guard = CompletionGuard {
            coalescer: Arc::clone(self),
            key: Some(key),
        };
        tokio::spawn(async move {
            let outcome = computation.await;
            guard.complete(outcome);
        });

        InFlight { rx, leader: true }
    }

    /// Removes the registration for `key` and broadcasts the outcome to all
    /// waiters.
    fn complete(&self, key: &RenderKey, outcome: RenderOutcome) {
        if let Some((_, tx)) = self.in_flight.remove(key) {
            let waiters = tx.receiver_count();
            // Receivers may have been dropped; nothing to do then.
            let _ = tx.send(outcome);
            debug!(key = %key, waiters, "Broadcast outcome to waiters");
        }
    }

    /// Drops the registration without an outcome; waiters observe
    /// [`RenderError::Aborted`].
    fn abandon(&self, key: &RenderKey) {
        if self.in_flight.remove(key).is_some() {
            warn!(key = %key, "Render computation ended without an outcome");
        }
    }

    /// Returns a snapshot of the current statistics.
    pub fn stats(&self) -> CoalescerStats {
        CoalescerStats {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            coalesced_requests: self.coalesced_requests.load(Ordering::Relaxed),
            new_requests: self.new_requests.load(Ordering::Relaxed),
        }
    }

    /// Returns the number of currently in-flight computations.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Whether a computation is registered for `key`.
    pub fn is_in_flight(&self, key: &RenderKey) -> bool {
        self.in_flight.contains_key(key)
    }

    /// Logs current statistics.
    pub fn log_stats(&self) {
        let stats = self.stats();

        info!(
            total_requests = stats.total_requests,
            coalesced = stats.coalesced_requests,
            new_requests = stats.new_requests,
            in_flight = self.in_flight_count(),
            coalescing_ratio = format!("{:.1}%", stats.coalescing_ratio() * 100.0),
            "Request coalescing statistics"
        );
    }
}

impl Default for RequestCoalescer {
    fn default() -> Self {
        Self::new()
    }
}

/// Unregisters a key when its computation finishes, including by panic.
struct CompletionGuard {
    coalescer: Arc<RequestCoalescer>,
    key: Option<RenderKey>,
}

impl CompletionGuard {
    fn complete(mut self, outcome: RenderOutcome) {
        if let Some(key) = self.key.take() {
            self.coalescer.complete(&key, outcome);
        }
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.coalescer.abandon(&key);
        }
    }
}

/// Handle on an in-flight computation.
pub struct InFlight {
    rx: broadcast::Receiver<RenderOutcome>,
    leader: bool,
}

impl InFlight {
    /// True if this handle's registration started the computation.
    pub fn is_leader(&self) -> bool {
        self.leader
    }

    /// Waits for the computation's outcome.
    pub async fn wait(mut self) -> RenderOutcome {
        match self.rx.recv().await {
            Ok(outcome) => outcome,
            Err(_) => RenderOutcome::failure(RenderError::Aborted),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::Ready;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::sync::oneshot;
    use tokio::time::sleep;

    fn key(s: &str) -> RenderKey {
        RenderKey::new(s)
    }

    #[tokio::test]
    async fn test_first_request_leads() {
        let coalescer = Arc::new(RequestCoalescer::new());

        let handle = coalescer.get_or_start(key("a"), || async { RenderOutcome::success(vec![1]) });

        assert!(handle.is_leader());
        assert!(handle.wait().await.is_success());
    }

    #[tokio::test]
    async fn test_second_request_is_coalesced() {
        let coalescer = Arc::new(RequestCoalescer::new());
        let (release, gate) = oneshot::channel::<()>();

        let first = coalescer.get_or_start(key("a"), move || async move {
            let _ = gate.await;
            RenderOutcome::success(vec![0xDD])
        });
        let second = coalescer.get_or_start(key("a"), || -> Ready<RenderOutcome> {
            panic!("second start must never run")
        });

        assert!(first.is_leader());
        assert!(!second.is_leader());

        release.send(()).unwrap();
        let a = first.wait().await;
        let b = second.wait().await;

        assert!(Arc::ptr_eq(a.data().unwrap(), b.data().unwrap()));
    }

    #[tokio::test]
    async fn test_different_keys_not_coalesced() {
        let coalescer = Arc::new(RequestCoalescer::new());
        let (_release, gate) = oneshot::channel::<()>();

        let first = coalescer.get_or_start(key("a"), move || async move {
            let _ = gate.await;
            RenderOutcome::success(vec![])
        });
        let second = coalescer.get_or_start(key("b"), || async { RenderOutcome::success(vec![]) });

        assert!(first.is_leader());
        assert!(second.is_leader());
    }

    #[tokio::test]
    async fn test_start_runs_once_under_contention() {
        let coalescer = Arc::new(RequestCoalescer::new());
        let starts = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..50)
            .map(|_| {
                let c = Arc::clone(&coalescer);
                let starts = Arc::clone(&starts);
                tokio::spawn(async move {
                    c.get_or_start(key("hot"), move || {
                        starts.fetch_add(1, Ordering::SeqCst);
                        async {
                            sleep(Duration::from_millis(20)).await;
                            RenderOutcome::success(vec![1, 2, 3])
                        }
                    })
                    .wait()
                    .await
                })
            })
            .collect();

        let outcomes: Vec<_> = futures::future::join_all(handles)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        assert_eq!(starts.load(Ordering::SeqCst), 1);
        let first = outcomes[0].data().unwrap();
        assert!(outcomes.iter().all(|o| Arc::ptr_eq(o.data().unwrap(), first)));

        let stats = coalescer.stats();
        assert_eq!(stats.total_requests, 50);
        assert_eq!(stats.new_requests, 1);
        assert_eq!(stats.coalesced_requests, 49);
    }

    #[tokio::test]
    async fn test_completion_removes_registration() {
        let coalescer = Arc::new(RequestCoalescer::new());

        let outcome = coalescer
            .get_or_start(key("a"), || async { RenderOutcome::success(vec![1]) })
            .wait()
            .await;
        assert!(outcome.is_success());
        assert_eq!(coalescer.in_flight_count(), 0);

        // A later request starts a brand-new computation.
        let again = coalescer.get_or_start(key("a"), || async { RenderOutcome::success(vec![2]) });
        assert!(again.is_leader());
        assert_eq!(again.wait().await.data().unwrap().as_slice(), &[2]);
    }

    #[tokio::test]
    async fn test_failure_is_shared_too() {
        let coalescer = Arc::new(RequestCoalescer::new());
        let (release, gate) = oneshot::channel::<()>();

        let first = coalescer.get_or_start(key("a"), move || async move {
            let _ = gate.await;
            RenderOutcome::failure(RenderError::UpstreamFailure)
        });
        let second = coalescer.get_or_start(key("a"), || async { RenderOutcome::success(vec![]) });
        release.send(()).unwrap();

        let a = first.wait().await;
        let b = second.wait().await;
        assert!(matches!(a.error(), Some(RenderError::UpstreamFailure)));
        assert!(matches!(b.error(), Some(RenderError::UpstreamFailure)));
    }

    #[tokio::test]
    async fn test_panicking_computation_aborts_waiters() {
        let coalescer = Arc::new(RequestCoalescer::new());

        async fn explode() -> RenderOutcome {
            sleep(Duration::from_millis(5)).await;
            panic!("renderer blew up")
        }

        let handle = coalescer.get_or_start(key("boom"), explode);

        let outcome = handle.wait().await;
        assert!(matches!(outcome.error(), Some(RenderError::Aborted)));
        assert_eq!(coalescer.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_dropped_handle_does_not_strand_computation() {
        let coalescer = Arc::new(RequestCoalescer::new());
        let (release, gate) = oneshot::channel::<()>();

        let leader = coalescer.get_or_start(key("a"), move || async move {
            let _ = gate.await;
            RenderOutcome::success(vec![5])
        });
        drop(leader);

        let follower =
            coalescer.get_or_start(key("a"), || async { RenderOutcome::success(vec![]) });
        release.send(()).unwrap();

        assert_eq!(follower.wait().await.data().unwrap().as_slice(), &[5]);
    }

    #[test]
    fn test_coalescing_ratio() {
        let stats = CoalescerStats {
            total_requests: 4,
            coalesced_requests: 3,
            new_requests: 1,
        };
        assert!((stats.coalescing_ratio() - 0.75).abs() < 0.001);
        assert_eq!(CoalescerStats::default().coalescing_ratio(), 0.0);
    }
}
