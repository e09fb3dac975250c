//! Login-specific rate limiting.
//!
//! Counts failed login attempts per origin address inside a fixed window.
//! This is a deterrent layered on top of whatever the identity provider
//! enforces. The default store is process-local; implement
//! [`RateLimitStore`] over a shared cache to enforce limits across
//! instances.
//!
//! # Tracing Events
//!
//! - `auth.login.rate_limited` - Login blocked due to rate limiting
//! - `auth.rate_limit.purged` - Expired entries removed

use crate::clock::{SharedClock, system_clock};
use crate::error::{Result, TenantryError};
use crate::utils::parse_env_with_prefix;
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Configuration for login rate limiting.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRateLimitConfig {
    /// Maximum failed attempts per window.
    pub max_attempts: u32,
    /// Window length in seconds.
    pub window_seconds: u64,
}

impl Default for LoginRateLimitConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            window_seconds: 900,
        }
    }
}

impl LoginRateLimitConfig {
    pub fn new(max_attempts: u32, window_seconds: u64) -> Self {
        Self {
            max_attempts,
            window_seconds,
        }
    }

    /// 3 attempts per 30 minutes.
    pub fn strict() -> Self {
        Self {
            max_attempts: 3,
            window_seconds: 1800,
        }
    }

    /// 10 attempts per 15 minutes.
    pub fn lenient() -> Self {
        Self {
            max_attempts: 10,
            window_seconds: 900,
        }
    }

    /// Load from `RATE_LIMIT_MAX_ATTEMPTS` and `RATE_LIMIT_WINDOW_SECONDS`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_attempts: parse_env_with_prefix("RATE_LIMIT_MAX_ATTEMPTS")
                .unwrap_or(defaults.max_attempts),
            window_seconds: parse_env_with_prefix("RATE_LIMIT_WINDOW_SECONDS")
                .unwrap_or(defaults.window_seconds),
        }
    }

    pub fn window(&self) -> TimeDelta {
        i64::try_from(self.window_seconds)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(TimeDelta::days(365))
    }
}

/// Failed-attempt counter for one key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitEntry {
    pub attempt_count: u32,
    pub window_started_at: DateTime<Utc>,
}

impl RateLimitEntry {
    pub fn is_expired(&self, now: DateTime<Utc>, window: TimeDelta) -> bool {
        now >= self.window_started_at + window
    }
}

/// Result of inspecting a key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RateLimitStatus {
    pub is_limited: bool,
    pub remaining_attempts: u32,
    /// Seconds until the window ends. 0 when the key is not tracked.
    pub reset_in_seconds: u64,
}

/// Storage for rate-limit counters.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<RateLimitEntry>>;

    /// Atomically count one attempt. Starts a new window when the key is
    /// absent or its window has elapsed.
    async fn record_attempt(
        &self,
        key: &str,
        now: DateTime<Utc>,
        window: TimeDelta,
    ) -> Result<RateLimitEntry>;

    async fn remove(&self, key: &str) -> Result<()>;

    /// Drop every entry whose window has elapsed. Returns the number removed.
    async fn purge_expired(&self, now: DateTime<Utc>, window: TimeDelta) -> Result<usize>;
}

/// Process-local store backed by a concurrent map.
#[derive(Default)]
pub struct InMemoryRateLimitStore {
    entries: DashMap<String, RateLimitEntry>,
}

impl InMemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl RateLimitStore for InMemoryRateLimitStore {
    async fn get(&self, key: &str) -> Result<Option<RateLimitEntry>> {
        Ok(self.entries.get(key).map(|e| e.value().clone()))
    }

    async fn record_attempt(
        &self,
        key: &str,
        now: DateTime<Utc>,
        window: TimeDelta,
    ) -> Result<RateLimitEntry> {
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| RateLimitEntry {
                attempt_count: 0,
                window_started_at: now,
            });

        if entry.attempt_count == 0 || entry.is_expired(now, window) {
            *entry = RateLimitEntry {
                attempt_count: 1,
                window_started_at: now,
            };
        } else {
            entry.attempt_count = entry.attempt_count.saturating_add(1);
        }

        Ok(entry.value().clone())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>, window: TimeDelta) -> Result<usize> {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now, window));
        Ok(before.saturating_sub(self.entries.len()))
    }
}

/// Rate limiter for failed login attempts, keyed by origin address.
///
/// # Example
///
/// ```rust
/// use tenantry::auth::{LoginRateLimiter, LoginRateLimitConfig};
///
/// # async fn run() -> tenantry::Result<()> {
/// let limiter = LoginRateLimiter::in_memory(LoginRateLimitConfig::default());
///
/// limiter.record_failed_attempt("203.0.113.9").await?;
/// let status = limiter.check_rate_limit("203.0.113.9").await?;
/// assert_eq!(status.remaining_attempts, 4);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LoginRateLimiter {
    store: Arc<dyn RateLimitStore>,
    config: LoginRateLimitConfig,
    clock: SharedClock,
}

impl LoginRateLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>, config: LoginRateLimitConfig) -> Self {
        Self {
            store,
            config,
            clock: system_clock(),
        }
    }

    /// Limiter over a fresh process-local store.
    pub fn in_memory(config: LoginRateLimitConfig) -> Self {
        Self::new(Arc::new(InMemoryRateLimitStore::new()), config)
    }

    #[must_use]
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &LoginRateLimitConfig {
        &self.config
    }

    /// Inspect a key without counting an attempt.
    pub async fn check_rate_limit(&self, key: &str) -> Result<RateLimitStatus> {
        let now = self.clock.now();
        let window = self.config.window();

        let status = match self.store.get(key).await? {
            Some(entry) if !entry.is_expired(now, window) => {
                let reset_in = (entry.window_started_at + window - now).num_seconds();
                RateLimitStatus {
                    is_limited: entry.attempt_count >= self.config.max_attempts,
                    remaining_attempts: self
                        .config
                        .max_attempts
                        .saturating_sub(entry.attempt_count),
                    reset_in_seconds: u64::try_from(reset_in).unwrap_or(0),
                }
            }
            _ => RateLimitStatus {
                is_limited: false,
                remaining_attempts: self.config.max_attempts,
                reset_in_seconds: 0,
            },
        };

        Ok(status)
    }

    pub async fn record_failed_attempt(&self, key: &str) -> Result<()> {
        let entry = self
            .store
            .record_attempt(key, self.clock.now(), self.config.window())
            .await?;

        tracing::debug!(
            target: "auth.rate_limit.attempt",
            key = %key,
            attempt_count = entry.attempt_count,
            max_attempts = self.config.max_attempts,
            "Failed login attempt recorded"
        );
        Ok(())
    }

    /// Forget a key. Called after a successful login.
    pub async fn clear_rate_limit(&self, key: &str) -> Result<()> {
        self.store.remove(key).await
    }

    /// Fail with `TooManyRequests` if the key is currently limited.
    pub async fn ensure_not_limited(&self, key: &str) -> Result<()> {
        let status = self.check_rate_limit(key).await?;
        if !status.is_limited {
            return Ok(());
        }

        tracing::warn!(
            target: "auth.login.rate_limited",
            key = %key,
            retry_after_secs = status.reset_in_seconds,
            max_attempts = self.config.max_attempts,
            window_secs = self.config.window_seconds,
            "Login rate limited"
        );

        let minutes = status.reset_in_seconds.div_ceil(60).max(1);
        Err(TenantryError::TooManyRequests(format!(
            "Too many login attempts. Please try again in {} minute{}.",
            minutes,
            if minutes == 1 { "" } else { "s" }
        )))
    }

    pub async fn purge_expired(&self) -> Result<usize> {
        let removed = self
            .store
            .purge_expired(self.clock.now(), self.config.window())
            .await?;
        if removed > 0 {
            tracing::debug!(
                target: "auth.rate_limit.purged",
                removed = removed,
                "Purged expired rate limit entries"
            );
        }
        Ok(removed)
    }

    /// Run [`purge_expired`](Self::purge_expired) every `interval` on the
    /// tokio runtime until the handle is aborted.
    pub fn spawn_purge_task(&self, interval: Duration) -> tokio::task::JoinHandle<()> {
        let limiter = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // First tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = limiter.purge_expired().await {
                    tracing::warn!(
                        target: "auth.rate_limit.purge_failed",
                        error = %e,
                        "Failed to purge rate limit entries"
                    );
                }
            }
        })
    }
}
