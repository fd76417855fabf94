//! Advisory per-key rate limiter.
//!
//! Each key (an upstream host, or a provider call signature) has at most one
//! holder at a time. Other callers poll for the slot at a fixed interval and,
//! after a bounded number of polls, proceed without it: the limiter trades
//! strict ordering for availability so a hung upstream can never block all
//! resolution. A release starts a cool-down during which the key stays
//! unavailable, which bounds the request rate to a single upstream.
//!
//! Guards release on drop, so every exit path (including `?`) frees the key.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use tracing::{trace, warn};

/// Polling and cool-down parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimiterSettings {
    pub poll_interval: Duration,
    pub max_polls: u32,
    pub cooldown: Duration,
}

impl Default for LimiterSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
            max_polls: 100,
            cooldown: Duration::from_millis(100),
        }
    }
}

#[derive(Debug)]
struct Slot {
    holder: Option<u64>,
    available_at: Instant,
}

struct Inner {
    slots: DashMap<String, Slot>,
    settings: LimiterSettings,
    next_token: AtomicU64,
}

/// Shared limiter handle. Clones refer to the same slots.
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<Inner>,
}

impl RateLimiter {
    pub fn new(settings: LimiterSettings) -> Self {
        Self {
            inner: Arc::new(Inner {
                slots: DashMap::new(),
                settings,
                next_token: AtomicU64::new(1),
            }),
        }
    }

    pub fn settings(&self) -> LimiterSettings {
        self.inner.settings
    }

    /// Wait for `key` and take it.
    ///
    /// Never fails: after `max_polls` unsuccessful polls the caller takes the
    /// key over and the returned guard reports [`LimitGuard::forced`].
    pub async fn acquire(&self, key: &str) -> LimitGuard {
        let token = self.inner.next_token.fetch_add(1, Ordering::Relaxed);
        let settings = self.inner.settings;
        let mut polls = 0u32;

        loop {
            if self.try_take(key, token) {
                trace!(key, polls, "Rate limit acquired");
                return self.guard(key, token, false);
            }
            if polls >= settings.max_polls {
                warn!(
                    key,
                    polls, "Rate limit wait exhausted, proceeding without exclusive hold"
                );
                self.take_over(key, token);
                return self.guard(key, token, true);
            }
            polls += 1;
            tokio::time::sleep(settings.poll_interval).await;
        }
    }

    /// Take `key` only if it is free right now.
    pub fn try_acquire(&self, key: &str) -> Option<LimitGuard> {
        let token = self.inner.next_token.fetch_add(1, Ordering::Relaxed);
        self.try_take(key, token)
            .then(|| self.guard(key, token, false))
    }

    /// Release a guard explicitly. Equivalent to dropping it.
    pub fn release(&self, guard: LimitGuard) {
        drop(guard);
    }

    /// Whether some caller currently holds `key`.
    pub fn is_held(&self, key: &str) -> bool {
        self.inner
            .slots
            .get(key)
            .is_some_and(|slot| slot.holder.is_some())
    }

    fn guard(&self, key: &str, token: u64, forced: bool) -> LimitGuard {
        LimitGuard {
            limiter: self.clone(),
            key: key.to_string(),
            token,
            forced,
        }
    }

    fn try_take(&self, key: &str, token: u64) -> bool {
        let now = Instant::now();
        let mut slot = self.inner.slots.entry(key.to_string()).or_insert(Slot {
            holder: None,
            available_at: now,
        });
        if slot.holder.is_none() && slot.available_at <= now {
            slot.holder = Some(token);
            true
        } else {
            false
        }
    }

    fn take_over(&self, key: &str, token: u64) {
        let mut slot = self.inner.slots.entry(key.to_string()).or_insert(Slot {
            holder: None,
            available_at: Instant::now(),
        });
        slot.holder = Some(token);
    }

    fn release_token(&self, key: &str, token: u64) {
        let cooldown = self.inner.settings.cooldown;
        // A waiter that took the key over owns it now; a stale release from
        // the previous holder must not free it.
        let released = if cooldown.is_zero() {
            self.inner
                .slots
                .remove_if(key, |_, slot| slot.holder == Some(token))
                .is_some()
        } else {
            match self.inner.slots.get_mut(key) {
                Some(mut slot) if slot.holder == Some(token) => {
                    slot.holder = None;
                    slot.available_at = Instant::now() + cooldown;
                    true
                }
                _ => false,
            }
        };
        if released {
            trace!(key, "Rate limit released");
            self.prune_idle();
        }
    }

    /// Forget keys that are neither held nor cooling down.
    fn prune_idle(&self) {
        if self.inner.settings.cooldown.is_zero() {
            return;
        }
        let now = Instant::now();
        self.inner
            .slots
            .retain(|_, slot| slot.holder.is_some() || slot.available_at > now);
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(LimiterSettings::default())
    }
}

/// Exclusive hold on one limiter key.
#[must_use = "the key is released as soon as the guard is dropped"]
pub struct LimitGuard {
    limiter: RateLimiter,
    key: String,
    token: u64,
    forced: bool,
}

impl LimitGuard {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Whether the hold was taken over after the wait bound ran out.
    pub fn forced(&self) -> bool {
        self.forced
    }
}

impl Drop for LimitGuard {
    fn drop(&mut self) {
        self.limiter.release_token(&self.key, self.token);
    }
}

impl std::fmt::Debug for LimitGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LimitGuard")
            .field("key", &self.key)
            .field("forced", &self.forced)
            .finish()
    }
}
