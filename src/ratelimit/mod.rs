//! Token-bucket client-side rate limiting plus a hard per-run API call budget.
//!
//! Refill-by-elapsed-time token bucket timed off `std::time::Instant`.
//! `acquire` is an async wait rather than an immediate accept/reject, since a
//! long-running health-check run can afford to wait out a bucket refill
//! instead of failing the call.

use crate::config::RateLimitConfig;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
    capacity: f64,
    refill_rate: f64,
}

impl TokenBucket {
    fn new(capacity: f64, refill_rate: f64) -> Self {
        Self { tokens: capacity, last_refill: Instant::now(), capacity, refill_rate }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        self.last_refill = now;
    }

    fn try_consume(&mut self) -> bool {
        self.refill();
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Seconds until at least one token is available, given current state.
    fn wait_for_next_token(&mut self) -> Duration {
        self.refill();
        if self.tokens >= 1.0 {
            return Duration::ZERO;
        }
        let needed = 1.0 - self.tokens;
        Duration::from_secs_f64((needed / self.refill_rate).max(0.0))
    }
}

/// Signals that the run's hard API call budget is exhausted; distinct from a
/// rate-limit wait, which is transient and always eventually succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetExhausted;

/// Client-side rate limiter and per-run call-count ceiling shared by every
/// in-flight analyzer. One instance is created per [`crate::orchestrator`]
/// run and handed to the client as an `Arc`.
pub struct RateLimiter {
    bucket: Mutex<TokenBucket>,
    used: AtomicU32,
    budget: u32,
    backoff_base: Duration,
    backoff_cap: Duration,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig, budget: u32) -> Self {
        Self {
            bucket: Mutex::new(TokenBucket::new(
                config.requests_per_second.max(1.0),
                config.requests_per_second,
            )),
            used: AtomicU32::new(0),
            budget,
            backoff_base: Duration::from_millis(config.backoff_base_millis),
            backoff_cap: Duration::from_millis(config.backoff_cap_millis),
        }
    }

    /// Waits for both a rate-limit token and remaining call budget, or
    /// returns [`BudgetExhausted`] immediately if the budget is already
    /// spent. Returns early (without acquiring) if `cancel` fires while
    /// waiting.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<(), BudgetExhausted> {
        if self.used.load(Ordering::SeqCst) >= self.budget {
            return Err(BudgetExhausted);
        }

        loop {
            let wait = {
                let mut bucket = self.bucket.lock().expect("rate limiter bucket lock poisoned");
                if bucket.try_consume() {
                    None
                } else {
                    Some(bucket.wait_for_next_token())
                }
            };
            match wait {
                None => break,
                Some(duration) => {
                    tokio::select! {
                        _ = tokio::time::sleep(duration) => {},
                        _ = cancel.cancelled() => return Err(BudgetExhausted),
                    }
                },
            }
        }

        // Budget is checked again after the wait: another caller may have
        // exhausted it while this one slept for a token.
        let previous = self.used.fetch_add(1, Ordering::SeqCst);
        if previous >= self.budget {
            return Err(BudgetExhausted);
        }
        Ok(())
    }

    pub fn used(&self) -> u32 {
        self.used.load(Ordering::SeqCst)
    }

    pub fn remaining(&self) -> u32 {
        self.budget.saturating_sub(self.used())
    }

    /// `min(base * 2^attempt + jitter, cap)`, jitter uniform in `[0, base)`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = self.backoff_base.saturating_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX));
        let jitter = Duration::from_secs_f64(rand::random::<f64>() * self.backoff_base.as_secs_f64());
        (exp + jitter).min(self.backoff_cap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(rps: f64) -> RateLimitConfig {
        RateLimitConfig {
            requests_per_second: rps,
            backoff_base_millis: 10,
            backoff_cap_millis: 1000,
            max_retries: 3,
        }
    }

    #[tokio::test]
    async fn acquire_succeeds_until_budget_exhausted() {
        let limiter = RateLimiter::new(&config(1000.0), 3);
        let cancel = CancellationToken::new();
        for _ in 0..3 {
            limiter.acquire(&cancel).await.unwrap();
        }
        assert_eq!(limiter.acquire(&cancel).await, Err(BudgetExhausted));
    }

    #[tokio::test]
    async fn remaining_tracks_used() {
        let limiter = RateLimiter::new(&config(1000.0), 5);
        let cancel = CancellationToken::new();
        limiter.acquire(&cancel).await.unwrap();
        limiter.acquire(&cancel).await.unwrap();
        assert_eq!(limiter.used(), 2);
        assert_eq!(limiter.remaining(), 3);
    }

    #[tokio::test]
    async fn cancellation_aborts_a_pending_acquire() {
        let limiter = RateLimiter::new(&config(0.001), 10);
        let cancel = CancellationToken::new();
        limiter.acquire(&cancel).await.unwrap(); // drains the only token

        cancel.cancel();
        assert_eq!(limiter.acquire(&cancel).await, Err(BudgetExhausted));
    }

    #[test]
    fn backoff_never_exceeds_cap() {
        let limiter = RateLimiter::new(&config(1.0), 10);
        for attempt in 0..20 {
            assert!(limiter.backoff(attempt) <= Duration::from_millis(1000));
        }
    }
}
