//! Sliding-window rate limiting with per-key actors.
//!
//! Every client key is owned by exactly one actor: a task with a bounded
//! mailbox that evaluates requests one at a time, in arrival order. Two
//! evaluations for the same key never interleave, so a burst submitted in
//! the same millisecond is still admitted at most `L` times. Different keys
//! have different actors and proceed concurrently.
//!
//! # Algorithm (per evaluation at instant `now`)
//! 1. Load the key's timestamp log (lazily, once per actor lifetime)
//! 2. Evict every timestamp `<= now - W`
//! 3. `count >= L`: reject, `reset = earliest + W`, `now` is not recorded
//! 4. Otherwise append `now`, persist, admit with `reset = now + W`
//!
//! # Failure semantics
//! - The log is persisted before the admission is reported. A failed or
//!   timed-out write rejects the request with a storage error (fail closed)
//!   and forces the actor to reload from the store on its next evaluation
//! - Idle actors close their mailbox, drain what is already queued, and
//!   exit. Their successor waits for them before loading the log
//! - A sweep of fully expired keys runs on a random fraction of
//!   evaluations; correctness never depends on it

use arc_swap::ArcSwap;
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::clock;
use crate::config::schema::RateLimitConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::observability::metrics;
use crate::resilience::with_timeout;
use crate::storage::{StoreError, WindowStore};

pub const X_RATELIMIT_LIMIT: &str = "x-ratelimit-limit";
pub const X_RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";
pub const X_RATELIMIT_RESET: &str = "x-ratelimit-reset";

/// Window length and ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub window_ms: u64,
    pub max_requests: u32,
}

impl RateLimitPolicy {
    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self {
            window_ms: config.window_secs.saturating_mul(1_000),
            max_requests: config.max_requests,
        }
    }
}

/// Outcome of one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitDecision {
    pub admitted: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Epoch millis at which capacity is next guaranteed.
    pub reset_ms: u64,
    /// Instant the decision was taken (epoch millis).
    pub evaluated_at_ms: u64,
}

impl RateLimitDecision {
    /// Seconds until the reset instant, at least 1.
    pub fn retry_after_secs(&self) -> u64 {
        clock::millis_to_secs_ceil(self.reset_ms.saturating_sub(self.evaluated_at_ms)).max(1)
    }

    /// Write the `X-RateLimit-*` headers (plus `Retry-After` on reject).
    pub fn apply_headers(&self, headers: &mut HeaderMap) {
        let reset_secs = clock::millis_to_secs_ceil(self.reset_ms);
        headers.insert(HeaderName::from_static(X_RATELIMIT_LIMIT), HeaderValue::from(self.limit));
        headers.insert(
            HeaderName::from_static(X_RATELIMIT_REMAINING),
            HeaderValue::from(self.remaining),
        );
        headers.insert(HeaderName::from_static(X_RATELIMIT_RESET), HeaderValue::from(reset_secs));
        if !self.admitted {
            headers.insert(
                axum::http::header::RETRY_AFTER,
                HeaderValue::from(self.retry_after_secs()),
            );
        }
    }
}

/// Actor lifecycle and housekeeping knobs.
#[derive(Debug, Clone)]
pub struct ActorSettings {
    pub idle_timeout: Duration,
    pub mailbox_capacity: usize,
    pub store_timeout: Duration,
    pub cleanup_probability: f64,
}

impl ActorSettings {
    pub fn from_config(config: &RateLimitConfig, store_timeout: Duration) -> Self {
        Self {
            idle_timeout: Duration::from_secs(config.actor_idle_secs),
            mailbox_capacity: config.mailbox_capacity,
            store_timeout,
            cleanup_probability: config.cleanup_probability,
        }
    }
}

struct Evaluation {
    now_ms: u64,
    policy: RateLimitPolicy,
    reply: oneshot::Sender<GatewayResult<RateLimitDecision>>,
}

struct ActorHandle {
    mailbox: mpsc::Sender<Evaluation>,
    task: Option<JoinHandle<()>>,
}

impl ActorHandle {
    fn is_retired(&self) -> bool {
        self.mailbox.is_closed()
    }

    fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |t| t.is_finished())
    }
}

/// Key-addressed sliding-window rate limiter.
pub struct RateLimiter {
    actors: DashMap<String, ActorHandle>,
    store: Arc<dyn WindowStore>,
    policy: ArcSwap<RateLimitPolicy>,
    settings: ActorSettings,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn WindowStore>, policy: RateLimitPolicy, settings: ActorSettings) -> Self {
        Self {
            actors: DashMap::new(),
            store,
            policy: ArcSwap::from_pointee(policy),
            settings,
        }
    }

    pub fn policy(&self) -> RateLimitPolicy {
        **self.policy.load()
    }

    /// Swap in a new window/ceiling; applies from the next evaluation.
    pub fn set_policy(&self, policy: RateLimitPolicy) {
        self.policy.store(Arc::new(policy));
    }

    /// Number of actor handles currently tracked.
    pub fn actor_count(&self) -> usize {
        self.actors.len()
    }

    /// Evaluate one request for `key` at `now_ms`.
    pub async fn evaluate(&self, key: &str, now_ms: u64) -> GatewayResult<RateLimitDecision> {
        let policy = self.policy();

        // A mailbox can close between lookup and send when its actor
        // retires; the second attempt reaches a fresh actor.
        for _ in 0..2 {
            let mailbox = self.mailbox(key);
            let (reply, response) = oneshot::channel();
            let evaluation = Evaluation {
                now_ms,
                policy,
                reply,
            };
            if mailbox.send(evaluation).await.is_err() {
                continue;
            }

            let decision = response
                .await
                .map_err(|_| actor_unavailable("rate limit actor dropped an evaluation"))?;
            self.maybe_sweep(now_ms, policy);
            if let Ok(d) = &decision {
                metrics::record_rate_limit(d.admitted);
            }
            return decision;
        }

        Err(actor_unavailable("rate limit actor unavailable"))
    }

    fn mailbox(&self, key: &str) -> mpsc::Sender<Evaluation> {
        let mut spawned = false;
        let mailbox = {
            let mut slot = self.actors.entry(key.to_string()).or_insert_with(|| {
                spawned = true;
                self.spawn_actor(key, None)
            });
            if slot.is_retired() {
                let predecessor = slot.task.take();
                *slot = self.spawn_actor(key, predecessor);
                spawned = true;
            }
            slot.mailbox.clone()
        };
        // The shard lock is released; counting takes every shard.
        if spawned {
            metrics::record_rate_limit_actors(self.actors.len());
        }
        mailbox
    }

    fn spawn_actor(&self, key: &str, predecessor: Option<JoinHandle<()>>) -> ActorHandle {
        let (mailbox, inbox) = mpsc::channel(self.settings.mailbox_capacity);
        let actor = WindowActor {
            key: key.to_string(),
            store: self.store.clone(),
            store_timeout: self.settings.store_timeout,
            log: None,
        };
        let idle_timeout = self.settings.idle_timeout;
        let task = tokio::spawn(async move {
            if let Some(previous) = predecessor {
                let _ = previous.await;
            }
            actor.run(inbox, idle_timeout).await;
        });
        ActorHandle {
            mailbox,
            task: Some(task),
        }
    }

    fn maybe_sweep(&self, now_ms: u64, policy: RateLimitPolicy) {
        if fastrand::f64() >= self.settings.cleanup_probability {
            return;
        }

        self.actors
            .retain(|_, handle| !(handle.is_retired() && handle.is_finished()));
        metrics::record_rate_limit_actors(self.actors.len());

        let store = self.store.clone();
        let cutoff = now_ms.saturating_sub(policy.window_ms);
        let limit = self.settings.store_timeout;
        tokio::spawn(async move {
            match with_timeout(limit, "window_store.prune", store.prune_expired(cutoff)).await {
                Ok(removed) if removed > 0 => {
                    tracing::debug!(removed = removed, "Pruned expired rate limit windows");
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "Rate limit window sweep failed"),
            }
        });
    }
}

fn actor_unavailable(message: &str) -> GatewayError {
    GatewayError::storage("rate_limit.actor")(StoreError::Unavailable(message.to_string()))
}

/// Single-threaded owner of one key's timestamp log.
struct WindowActor {
    key: String,
    store: Arc<dyn WindowStore>,
    store_timeout: Duration,
    /// In-memory copy of the persisted log; `None` means reload first.
    log: Option<Vec<u64>>,
}

impl WindowActor {
    async fn run(mut self, mut inbox: mpsc::Receiver<Evaluation>, idle_timeout: Duration) {
        loop {
            match tokio::time::timeout(idle_timeout, inbox.recv()).await {
                Ok(Some(evaluation)) => self.handle(evaluation).await,
                Ok(None) => return,
                Err(_) => break,
            }
        }

        // Retire: refuse new work, finish what was already accepted.
        inbox.close();
        while let Some(evaluation) = inbox.recv().await {
            self.handle(evaluation).await;
        }
        tracing::trace!(key = %self.key, "Rate limit actor retired");
    }

    async fn handle(&mut self, evaluation: Evaluation) {
        let result = self.evaluate(evaluation.now_ms, evaluation.policy).await;
        let _ = evaluation.reply.send(result);
    }

    async fn evaluate(&mut self, now_ms: u64, policy: RateLimitPolicy) -> GatewayResult<RateLimitDecision> {
        let log = match self.log.take() {
            Some(log) => log,
            None => {
                with_timeout(self.store_timeout, "window_store.load", self.store.load(&self.key))
                    .await?
            }
        };

        let cutoff = now_ms.saturating_sub(policy.window_ms);
        let mut live: Vec<u64> = log.into_iter().filter(|ts| *ts > cutoff).collect();
        let limit = policy.max_requests;

        if live.len() >= limit as usize {
            let earliest = live.first().copied().unwrap_or(now_ms);
            self.log = Some(live);
            tracing::debug!(key = %self.key, limit = limit, "Rate limit exceeded");
            return Ok(RateLimitDecision {
                admitted: false,
                limit,
                remaining: 0,
                reset_ms: earliest + policy.window_ms,
                evaluated_at_ms: now_ms,
            });
        }

        let position = live.partition_point(|ts| *ts <= now_ms);
        live.insert(position, now_ms);

        // Fail closed: nothing is admitted unless it was durably recorded.
        // `self.log` stays `None` on failure so the next call reloads.
        with_timeout(
            self.store_timeout,
            "window_store.save",
            self.store.save(&self.key, &live),
        )
        .await?;

        let remaining = limit - live.len() as u32;
        self.log = Some(live);
        Ok(RateLimitDecision {
            admitted: true,
            limit,
            remaining,
            reset_ms: now_ms + policy.window_ms,
            evaluated_at_ms: now_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::storage::{MemoryWindowStore, StoreResult};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    const W: u64 = 60_000;

    fn settings() -> ActorSettings {
        ActorSettings {
            idle_timeout: Duration::from_secs(60),
            mailbox_capacity: 64,
            store_timeout: Duration::from_secs(1),
            cleanup_probability: 0.0,
        }
    }

    fn limiter(limit: u32) -> RateLimiter {
        RateLimiter::new(
            Arc::new(MemoryWindowStore::new()),
            RateLimitPolicy {
                window_ms: W,
                max_requests: limit,
            },
            settings(),
        )
    }

    /// Window store whose writes can be switched off.
    #[derive(Default)]
    struct FlakyWindowStore {
        inner: MemoryWindowStore,
        failing: AtomicBool,
    }

    #[async_trait]
    impl WindowStore for FlakyWindowStore {
        async fn load(&self, key: &str) -> StoreResult<Vec<u64>> {
            self.inner.load(key).await
        }
        async fn save(&self, key: &str, timestamps: &[u64]) -> StoreResult<()> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("write rejected".into()));
            }
            self.inner.save(key, timestamps).await
        }
        async fn remove(&self, key: &str) -> StoreResult<()> {
            self.inner.remove(key).await
        }
        async fn prune_expired(&self, cutoff_ms: u64) -> StoreResult<usize> {
            self.inner.prune_expired(cutoff_ms).await
        }
    }

    #[tokio::test]
    async fn test_admits_up_to_limit_then_rejects() {
        let limiter = limiter(3);
        let t0 = 1_000_000;

        for (i, expected_remaining) in [2, 1, 0].into_iter().enumerate() {
            let d = limiter.evaluate("1.2.3.4", t0 + i as u64).await.unwrap();
            assert!(d.admitted);
            assert_eq!(d.remaining, expected_remaining);
            assert_eq!(d.reset_ms, t0 + i as u64 + W);
        }

        let rejected = limiter.evaluate("1.2.3.4", t0 + 10).await.unwrap();
        assert!(!rejected.admitted);
        assert_eq!(rejected.limit, 3);
        assert_eq!(rejected.remaining, 0);
        assert_eq!(rejected.reset_ms, t0 + W);
    }

    #[tokio::test]
    async fn test_rejected_requests_are_not_recorded() {
        let limiter = limiter(2);
        let t0 = 1_000_000;
        limiter.evaluate("k", t0).await.unwrap();
        limiter.evaluate("k", t0 + 1).await.unwrap();
        for i in 0..10 {
            assert!(!limiter.evaluate("k", t0 + 2 + i).await.unwrap().admitted);
        }
        // Only the two admitted timestamps age out; rejected ones never counted.
        let d = limiter.evaluate("k", t0 + W + 1).await.unwrap();
        assert!(d.admitted);
        assert_eq!(d.remaining, 1);
    }

    #[tokio::test]
    async fn test_eviction_boundary_is_inclusive() {
        let limiter = limiter(1);
        let t0 = 5_000_000;
        assert!(limiter.evaluate("k", t0).await.unwrap().admitted);
        assert!(!limiter.evaluate("k", t0 + W - 1).await.unwrap().admitted);
        // `t0 <= now - W` is evicted exactly at now = t0 + W.
        assert!(limiter.evaluate("k", t0 + W).await.unwrap().admitted);
    }

    #[tokio::test]
    async fn test_quiet_key_starts_fresh() {
        let limiter = limiter(100);
        let t0 = 10_000_000;
        for i in 0..100 {
            limiter.evaluate("k", t0 + i).await.unwrap();
        }
        let d = limiter.evaluate("k", t0 + 100 + W).await.unwrap();
        assert!(d.admitted);
        assert_eq!(d.remaining, 99);

        let other = limiter.evaluate("other", t0).await.unwrap();
        assert_eq!(other.remaining, 99);
    }

    #[tokio::test]
    async fn test_concurrent_burst_admits_exactly_limit() {
        let limiter = Arc::new(limiter(100));
        let now = 42_000_000;

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..250 {
            let limiter = limiter.clone();
            tasks.spawn(async move { limiter.evaluate("burst", now).await.unwrap().admitted });
        }

        let mut admitted = 0;
        while let Some(result) = tasks.join_next().await {
            if result.unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 100);
    }

    #[tokio::test]
    async fn test_sliding_window_never_exceeds_limit() {
        let limiter = limiter(5);
        let window = 1_000;
        limiter.set_policy(RateLimitPolicy {
            window_ms: window,
            max_requests: 5,
        });

        let mut now = 0u64;
        let mut admitted = Vec::new();
        for _ in 0..2_000 {
            now += fastrand::u64(0..60);
            if limiter.evaluate("k", now).await.unwrap().admitted {
                admitted.push(now);
            }
        }

        for (i, start) in admitted.iter().enumerate() {
            let in_window = admitted[i..].iter().take_while(|t| **t < start + window).count();
            assert!(in_window <= 5, "{in_window} admits inside one window");
        }
    }

    #[tokio::test]
    async fn test_fails_closed_when_persistence_fails() {
        let store = Arc::new(FlakyWindowStore::default());
        let limiter = RateLimiter::new(
            store.clone(),
            RateLimitPolicy {
                window_ms: W,
                max_requests: 2,
            },
            settings(),
        );
        let t0 = 1_000_000;

        assert!(limiter.evaluate("k", t0).await.unwrap().admitted);

        store.failing.store(true, Ordering::SeqCst);
        let err = limiter.evaluate("k", t0 + 1).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Storage);

        // The failed request was never counted.
        store.failing.store(false, Ordering::SeqCst);
        let d = limiter.evaluate("k", t0 + 2).await.unwrap();
        assert!(d.admitted);
        assert_eq!(d.remaining, 0);
        assert_eq!(store.inner.load("k").await.unwrap(), vec![t0, t0 + 2]);
    }

    #[tokio::test]
    async fn test_retired_actor_state_survives() {
        let limiter = RateLimiter::new(
            Arc::new(MemoryWindowStore::new()),
            RateLimitPolicy {
                window_ms: W,
                max_requests: 3,
            },
            ActorSettings {
                idle_timeout: Duration::from_millis(20),
                ..settings()
            },
        );
        let t0 = 1_000_000;

        assert_eq!(limiter.evaluate("k", t0).await.unwrap().remaining, 2);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(limiter.evaluate("k", t0 + 1).await.unwrap().remaining, 1);
        assert_eq!(limiter.actor_count(), 1);
    }

    #[tokio::test]
    async fn test_sweep_prunes_expired_windows() {
        let store = Arc::new(MemoryWindowStore::new());
        let limiter = RateLimiter::new(
            store.clone(),
            RateLimitPolicy {
                window_ms: W,
                max_requests: 3,
            },
            ActorSettings {
                cleanup_probability: 1.0,
                ..settings()
            },
        );

        limiter.evaluate("old", 1_000).await.unwrap();
        limiter.evaluate("new", 1_000 + 2 * W).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(store.load("old").await.unwrap().is_empty());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_headers() {
        let decision = RateLimitDecision {
            admitted: false,
            limit: 100,
            remaining: 0,
            reset_ms: 61_500,
            evaluated_at_ms: 30_000,
        };
        let mut headers = HeaderMap::new();
        decision.apply_headers(&mut headers);
        assert_eq!(headers[X_RATELIMIT_LIMIT], "100");
        assert_eq!(headers[X_RATELIMIT_REMAINING], "0");
        assert_eq!(headers[X_RATELIMIT_RESET], "62");
        assert_eq!(headers["retry-after"], "32");
    }
}
