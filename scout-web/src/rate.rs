//! Token-bucket pacing for outbound search requests.
//!
//! Semantics:
//! - the bucket starts full (`capacity` tokens)
//! - every whole `refill_every` elapsed since the last refill adds one token,
//!   capped at `capacity`; the refill timestamp advances by the intervals used
//! - `acquire` takes one token or waits one interval and re-checks, until the
//!   cancellation token fires
//!
//! Refill accounting and the decrement happen under one lock, which is never
//! held across an await.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use thiserror::Error;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;

pub const DEFAULT_CAPACITY: u32 = 10;
pub const DEFAULT_REFILL: Duration = Duration::from_millis(100);

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("rate limit wait cancelled")]
pub struct RateLimitCancelled;

#[derive(Debug)]
struct BucketState {
    tokens: u32,
    max_tokens: u32,
    refill_every: Duration,
    last_refill: Instant,
}

impl BucketState {
    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        let intervals = elapsed.as_nanos() / self.refill_every.as_nanos();
        if intervals == 0 {
            return;
        }
        let added = u32::try_from(intervals).unwrap_or(u32::MAX);
        self.tokens = self.tokens.saturating_add(added).min(self.max_tokens);
        self.last_refill = self
            .last_refill
            .checked_add(self.refill_every.saturating_mul(added))
            .unwrap_or(now);
    }

    fn try_take(&mut self, now: Instant) -> bool {
        self.refill(now);
        if self.tokens > 0 {
            self.tokens -= 1;
            true
        } else {
            false
        }
    }
}

#[derive(Debug)]
pub struct RateLimiter {
    state: Mutex<BucketState>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_REFILL)
    }
}

impl RateLimiter {
    /// A zero capacity or interval is raised to the smallest usable value.
    pub fn new(capacity: u32, refill_every: Duration) -> Self {
        let max_tokens = capacity.max(1);
        Self {
            state: Mutex::new(BucketState {
                tokens: max_tokens,
                max_tokens,
                refill_every: refill_every.max(Duration::from_millis(1)),
                last_refill: Instant::now(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BucketState> {
        // The guarded section cannot panic midway, so a poisoned lock still
        // holds a consistent bucket.
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Tokens available right now, after refill accounting.
    pub fn available(&self) -> u32 {
        let mut state = self.lock();
        state.refill(Instant::now());
        state.tokens
    }

    /// Wait for a token. A cancelled wait consumes nothing.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<(), RateLimitCancelled> {
        let started = Instant::now();
        loop {
            if cancel.is_cancelled() {
                tracing::debug!(target: "rate", "rate.acquire.cancelled");
                return Err(RateLimitCancelled);
            }

            let refill_every = {
                let mut state = self.lock();
                if state.try_take(Instant::now()) {
                    let waited = started.elapsed();
                    if !waited.is_zero() {
                        tracing::trace!(
                            target: "rate",
                            waited_ms = waited.as_millis() as u64,
                            "rate.acquire.waited"
                        );
                    }
                    return Ok(());
                }
                state.refill_every
            };

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!(target: "rate", "rate.acquire.cancelled");
                    return Err(RateLimitCancelled);
                }
                _ = sleep(refill_every) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn burst_up_to_capacity_does_not_wait() {
        let limiter = RateLimiter::new(10, Duration::from_millis(100));
        let cancel = CancellationToken::new();
        let t0 = Instant::now();
        for _ in 0..10 {
            limiter.acquire(&cancel).await.unwrap();
        }
        assert_eq!(t0.elapsed(), Duration::ZERO);
        assert_eq!(limiter.available(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn acquire_past_capacity_waits_for_refill() {
        let limiter = RateLimiter::new(10, Duration::from_millis(100));
        let cancel = CancellationToken::new();
        let t0 = Instant::now();
        for _ in 0..11 {
            limiter.acquire(&cancel).await.unwrap();
        }
        assert!(t0.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn refill_is_capped_at_capacity() {
        let limiter = RateLimiter::new(3, Duration::from_millis(100));
        let cancel = CancellationToken::new();
        for _ in 0..3 {
            limiter.acquire(&cancel).await.unwrap();
        }
        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(limiter.available(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn partial_intervals_carry_over() {
        let limiter = RateLimiter::new(2, Duration::from_millis(100));
        let cancel = CancellationToken::new();
        limiter.acquire(&cancel).await.unwrap();
        limiter.acquire(&cancel).await.unwrap();

        tokio::time::advance(Duration::from_millis(150)).await;
        assert_eq!(limiter.available(), 1);
        // 150ms + 50ms completes the second interval
        tokio::time::advance(Duration::from_millis(50)).await;
        assert_eq!(limiter.available(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_wait_consumes_nothing() {
        let limiter = RateLimiter::new(1, Duration::from_millis(100));
        let cancel = CancellationToken::new();
        limiter.acquire(&cancel).await.unwrap();

        let waiting = CancellationToken::new();
        let trigger = waiting.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(30)).await;
            trigger.cancel();
        });
        assert_eq!(limiter.acquire(&waiting).await, Err(RateLimitCancelled));

        tokio::time::advance(Duration::from_millis(100)).await;
        assert_eq!(limiter.available(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn pre_cancelled_token_is_rejected_even_with_tokens() {
        let limiter = RateLimiter::new(5, Duration::from_millis(100));
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert_eq!(limiter.acquire(&cancel).await, Err(RateLimitCancelled));
        assert_eq!(limiter.available(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_share_one_bucket() {
        let limiter = Arc::new(RateLimiter::new(10, Duration::from_millis(100)));
        let t0 = Instant::now();
        let mut handles = Vec::new();
        for _ in 0..20 {
            let limiter = Arc::clone(&limiter);
            handles.push(tokio::spawn(async move {
                limiter.acquire(&CancellationToken::new()).await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }
        // ten extra tokens need ten refill intervals
        assert!(t0.elapsed() >= Duration::from_millis(1000));
    }
}
