//! Sliding-window rate limiting.
//!
//! Every caller key owns an ordered list of the instants at which its requests
//! were admitted. Each admission first prunes instants that fell out of the
//! trailing window, then either rejects (window full) or records the new
//! instant. The limiting policy lives in [`RateLimiter`]; where the timestamps
//! are kept is decided by an injected [`RateLimitStore`], so the policy can be
//! tested without caring about storage and swapped for a shared backend.
//!
//! State is process-local and ephemeral. Keys are created lazily and reclaimed
//! by [`spawn_sweeper`] once they have been idle past the retention threshold.
//!
//! @copyright 2025
//! Licensed under the AGPLv3 license.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::RateLimitSettings;

/// Limiter policy: how many requests per key per window.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window: Duration::from_secs(60),
        }
    }
}

impl From<&RateLimitSettings> for RateLimitConfig {
    fn from(settings: &RateLimitSettings) -> Self {
        Self {
            max_requests: settings.max_requests,
            window: Duration::from_secs(settings.window_secs),
        }
    }
}

/// Outcome of a single admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    /// Slots left in the current window after this request.
    pub remaining: u32,
    /// Seconds until the oldest counted request leaves the window. Zero when allowed.
    pub retry_after_secs: u64,
}

/// Timestamps of admitted requests for one key, oldest first.
#[derive(Debug, Default)]
pub struct RateLimitEntry {
    timestamps: VecDeque<Instant>,
}

impl RateLimitEntry {
    /// Prune, then admit or reject at `now`.
    pub fn admit(&mut self, now: Instant, max_requests: u32, window: Duration) -> Decision {
        self.prune(now, window);

        let count = self.timestamps.len() as u32;
        if count >= max_requests {
            let retry_after_secs = self
                .timestamps
                .front()
                .map(|oldest| retry_after(*oldest + window, now))
                .unwrap_or(1);
            return Decision {
                allowed: false,
                remaining: 0,
                retry_after_secs,
            };
        }

        self.timestamps.push_back(now);
        Decision {
            allowed: true,
            remaining: max_requests - (count + 1),
            retry_after_secs: 0,
        }
    }

    /// Drop every timestamp at or before `now - window`.
    fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(oldest) = self.timestamps.front() {
            if now.saturating_duration_since(*oldest) >= window {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    fn last_seen(&self) -> Option<Instant> {
        self.timestamps.back().copied()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.timestamps.len()
    }
}

/// Whole seconds from `now` until `reset`, rounded up, never below one.
fn retry_after(reset: Instant, now: Instant) -> u64 {
    let wait = reset.saturating_duration_since(now);
    let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
    secs.max(1)
}

/// Storage for per-key request timestamps.
///
/// `admit` must perform prune, check and append as one atomic step for a key,
/// otherwise concurrent requests undercount.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    async fn admit(&self, key: &str, now: Instant, max_requests: u32, window: Duration) -> Decision;

    /// Remove keys whose most recent request is older than `idle`. Returns how many were removed.
    async fn sweep(&self, now: Instant, idle: Duration) -> usize;
}

/// Single-process store backed by a mutex-guarded map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, RateLimitEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    async fn tracked_keys(&self) -> usize {
        self.entries.lock().await.len()
    }
}

#[async_trait]
impl RateLimitStore for MemoryStore {
    async fn admit(&self, key: &str, now: Instant, max_requests: u32, window: Duration) -> Decision {
        let mut entries = self.entries.lock().await;
        entries
            .entry(key.to_string())
            .or_default()
            .admit(now, max_requests, window)
    }

    async fn sweep(&self, now: Instant, idle: Duration) -> usize {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, entry| {
            entry
                .last_seen()
                .map(|last| now.saturating_duration_since(last) < idle)
                .unwrap_or(false)
        });
        before - entries.len()
    }
}

/// Applies a [`RateLimitConfig`] against a [`RateLimitStore`].
#[derive(Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    store: Arc<dyn RateLimitStore>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig, store: Arc<dyn RateLimitStore>) -> Self {
        Self { config, store }
    }

    pub fn in_memory(config: RateLimitConfig) -> Self {
        Self::new(config, Arc::new(MemoryStore::new()))
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<dyn RateLimitStore> {
        Arc::clone(&self.store)
    }

    pub async fn check_rate_limit(&self, key: &str) -> Decision {
        self.admit_at(key, Instant::now()).await
    }

    pub async fn admit_at(&self, key: &str, now: Instant) -> Decision {
        let decision = self
            .store
            .admit(key, now, self.config.max_requests, self.config.window)
            .await;
        if decision.allowed {
            debug!(key = %key, remaining = decision.remaining, "Request admitted");
        } else {
            warn!(key = %key, retry_after = decision.retry_after_secs, "Rate limit exceeded");
        }
        decision
    }
}

/// Periodically drops keys idle for longer than `idle`, bounding memory.
pub fn spawn_sweeper(
    store: Arc<dyn RateLimitStore>,
    every: Duration,
    idle: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = store.sweep(Instant::now(), idle).await;
            if removed > 0 {
                info!(removed, "Swept idle rate limit keys");
            }
        }
    })
}
