use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket rate limiter keyed by client (API key, peer address, ...).
pub struct RateLimiter {
    max_tokens: f64,
    refill_rate: f64, // tokens per second
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl RateLimiter {
    /// Create a new rate limiter.
    /// - `max_tokens`: maximum burst size
    /// - `refill_rate`: tokens added per second
    pub fn new(max_tokens: f64, refill_rate: f64) -> Self {
        Self {
            max_tokens,
            refill_rate,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Try to consume one token for `client`.
    /// Returns `true` if allowed, `false` if rate limited.
    pub async fn check(&self, client: &str) -> bool {
        let mut buckets = self.buckets.lock().await;
        let now = Instant::now();

        let bucket = buckets.entry(client.to_string()).or_insert(Bucket {
            tokens: self.max_tokens,
            last_refill: now,
        });

        let elapsed = now.duration_since(bucket.last_refill);
        bucket.tokens =
            (bucket.tokens + elapsed.as_secs_f64() * self.refill_rate).min(self.max_tokens);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Time for an empty bucket to refill completely. A bucket idle for
    /// longer is indistinguishable from a fresh one.
    pub fn refill_window(&self) -> Duration {
        if self.refill_rate > 0.0 {
            Duration::try_from_secs_f64(self.max_tokens / self.refill_rate).unwrap_or(Duration::MAX)
        } else {
            Duration::MAX
        }
    }

    /// Number of tracked clients.
    pub async fn bucket_count(&self) -> usize {
        self.buckets.lock().await.len()
    }

    /// Spawn a task that drops fully refilled idle buckets every `interval`.
    /// The task runs until aborted.
    pub fn spawn_cleanup(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let limiter = Arc::clone(self);
        let interval = interval.max(Duration::from_millis(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = limiter.cleanup(limiter.refill_window()).await;
                if removed > 0 {
                    tracing::debug!(removed, "Dropped idle rate-limit buckets");
                }
            }
        })
    }

    /// Remove buckets with no activity for `max_idle`.
    pub async fn cleanup(&self, max_idle: Duration) -> usize {
        let mut buckets = self.buckets.lock().await;
        let before = buckets.len();
        let now = Instant::now();
        buckets.retain(|_, b| now.duration_since(b.last_refill) < max_idle);
        before - buckets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rate_limiter_allows() {
        let limiter = RateLimiter::new(5.0, 1.0);
        for _ in 0..5 {
            assert!(limiter.check("10.0.0.1").await);
        }
    }

    #[tokio::test]
    async fn test_rate_limiter_blocks() {
        let limiter = RateLimiter::new(2.0, 0.1);
        assert!(limiter.check("10.0.0.1").await);
        assert!(limiter.check("10.0.0.1").await);
        assert!(!limiter.check("10.0.0.1").await);
        // Other clients have their own bucket.
        assert!(limiter.check("10.0.0.2").await);
    }

    #[tokio::test]
    async fn test_cleanup_drops_idle_buckets() {
        let limiter = RateLimiter::new(2.0, 1.0);
        limiter.check("a").await;
        limiter.check("b").await;
        assert_eq!(limiter.cleanup(Duration::ZERO).await, 2);
    }

    #[test]
    fn test_refill_window() {
        assert_eq!(RateLimiter::new(50.0, 10.0).refill_window(), Duration::from_secs(5));
        assert_eq!(RateLimiter::new(5.0, 0.0).refill_window(), Duration::MAX);
    }

    #[tokio::test]
    async fn test_spawned_cleanup_bounds_buckets() {
        let limiter = Arc::new(RateLimiter::new(1.0, 1000.0));
        for n in 0..100 {
            assert!(limiter.check(&format!("10.0.0.{n}")).await);
        }
        assert_eq!(limiter.bucket_count().await, 100);

        let handle = limiter.spawn_cleanup(Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.abort();

        assert_eq!(limiter.bucket_count().await, 0);
    }

    #[tokio::test]
    async fn test_cleanup_keeps_draining_buckets() {
        let limiter = RateLimiter::new(1.0, 0.001);
        assert!(limiter.check("a").await);
        assert_eq!(limiter.cleanup(limiter.refill_window()).await, 0);
        assert!(!limiter.check("a").await);
    }
}
