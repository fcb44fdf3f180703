use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tokio::time::sleep;

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl Bucket {
    fn refill(&mut self, now: Instant, rate: f64, capacity: f64) {
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * rate).min(capacity);
        self.last_refill = now;
    }
}

/// Token bucket rate limiter for outbound model calls.
///
/// Capacity equals the per-second rate (at least one token), so a fresh
/// limiter allows a burst of one second's worth of requests.
#[derive(Debug, Clone)]
pub struct TokenBucketRateLimiter {
    bucket: Arc<Mutex<Bucket>>,
    capacity: f64,
    refill_rate: f64,
}

impl TokenBucketRateLimiter {
    /// Non-positive rates are treated as one request per second.
    pub fn new(rate_limit_rps: f64) -> Self {
        let refill_rate = if rate_limit_rps > 0.0 { rate_limit_rps } else { 1.0 };
        let capacity = refill_rate.max(1.0);

        Self {
            bucket: Arc::new(Mutex::new(Bucket {
                tokens: capacity,
                last_refill: Instant::now(),
            })),
            capacity,
            refill_rate,
        }
    }

    /// Wait until a token is available, then consume it.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut bucket = self.bucket.lock().await;
                bucket.refill(Instant::now(), self.refill_rate, self.capacity);

                if bucket.tokens >= 1.0 {
                    bucket.tokens -= 1.0;
                    return;
                }

                let tokens_needed = 1.0 - bucket.tokens;
                Duration::from_secs_f64((tokens_needed / self.refill_rate).max(0.01))
            };

            sleep(wait).await;
        }
    }

    #[cfg(test)]
    async fn available_tokens(&self) -> f64 {
        let mut bucket = self.bucket.lock().await;
        bucket.refill(Instant::now(), self.refill_rate, self.capacity);
        bucket.tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_initial_burst_is_immediate() {
        let limiter = TokenBucketRateLimiter::new(10.0);

        let start = Instant::now();
        for _ in 0..3 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_millis(100));
        assert!(limiter.available_tokens().await < 10.0);
    }

    #[tokio::test]
    async fn test_enforces_delay_when_empty() {
        let limiter = TokenBucketRateLimiter::new(2.0);
        limiter.acquire().await;
        limiter.acquire().await;

        let start = Instant::now();
        limiter.acquire().await;
        let elapsed = start.elapsed();

        assert!(
            elapsed >= Duration::from_millis(400),
            "Expected delay >= 400ms, got {:?}",
            elapsed
        );
    }

    #[tokio::test]
    async fn test_fractional_rate_still_allows_one_request() {
        let limiter = TokenBucketRateLimiter::new(0.5);
        let start = Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(100));
    }
}
