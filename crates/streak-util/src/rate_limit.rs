//! Rate limiting utilities

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::ClientId;

/// Per-client token-bucket rate limiter
#[derive(Debug)]
pub struct RateLimiter {
    /// Maximum tokens (requests) per bucket
    max_tokens: u32,
    /// How often the bucket is refilled
    refill_interval: Duration,
    clients: HashMap<ClientId, ClientBucket>,
}

#[derive(Debug)]
struct ClientBucket {
    tokens: u32,
    last_refill: Instant,
}

impl RateLimiter {
    /// Allow `max_requests` per `interval` for each client
    pub fn new(max_requests: u32, interval: Duration) -> Self {
        Self {
            max_tokens: max_requests,
            refill_interval: interval,
            clients: HashMap::new(),
        }
    }

    /// Check if a request should be allowed for the given client
    ///
    /// Returns `true` if allowed, `false` if rate limited
    pub fn check(&mut self, client_id: &ClientId) -> bool {
        self.check_at(client_id, Instant::now())
    }

    fn check_at(&mut self, client_id: &ClientId, now: Instant) -> bool {
        let bucket = self.clients.entry(client_id.clone()).or_insert(ClientBucket {
            tokens: self.max_tokens,
            last_refill: now,
        });

        let elapsed = now.saturating_duration_since(bucket.last_refill);
        if !self.refill_interval.is_zero() && elapsed >= self.refill_interval {
            let intervals = (elapsed.as_nanos() / self.refill_interval.as_nanos()).min(u32::MAX as u128) as u32;
            bucket.tokens = bucket
                .tokens
                .saturating_add(intervals.saturating_mul(self.max_tokens))
                .min(self.max_tokens);
            bucket.last_refill = now;
        }

        if bucket.tokens > 0 {
            bucket.tokens -= 1;
            true
        } else {
            false
        }
    }

    /// Apply new limits after a config reload. Existing buckets are clamped to
    /// the new maximum.
    pub fn reconfigure(&mut self, max_requests: u32, interval: Duration) {
        self.max_tokens = max_requests;
        self.refill_interval = interval;
        for bucket in self.clients.values_mut() {
            bucket.tokens = bucket.tokens.min(max_requests);
        }
    }

    /// Remove a client's rate limit state
    pub fn remove_client(&mut self, client_id: &ClientId) {
        self.clients.remove(client_id);
    }

    pub fn tracked_clients(&self) -> usize {
        self.clients.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_within_limit() {
        let mut limiter = RateLimiter::new(5, Duration::from_secs(1));
        let client = ClientId::new();

        for _ in 0..5 {
            assert!(limiter.check(&client));
        }

        // 6th request should be denied
        assert!(!limiter.check(&client));
    }

    #[test]
    fn clients_have_separate_buckets() {
        let mut limiter = RateLimiter::new(2, Duration::from_secs(1));
        let client1 = ClientId::new();
        let client2 = ClientId::new();

        assert!(limiter.check(&client1));
        assert!(limiter.check(&client1));
        assert!(!limiter.check(&client1));

        assert!(limiter.check(&client2));
        assert!(limiter.check(&client2));
    }

    #[test]
    fn refills_after_interval() {
        let mut limiter = RateLimiter::new(1, Duration::from_secs(1));
        let client = ClientId::new();
        let start = Instant::now();

        assert!(limiter.check_at(&client, start));
        assert!(!limiter.check_at(&client, start + Duration::from_millis(500)));
        assert!(limiter.check_at(&client, start + Duration::from_millis(1500)));
    }

    #[test]
    fn reconfigure_clamps_existing_buckets() {
        let mut limiter = RateLimiter::new(10, Duration::from_secs(60));
        let client = ClientId::new();
        assert!(limiter.check(&client));

        limiter.reconfigure(1, Duration::from_secs(60));
        assert!(limiter.check(&client));
        assert!(!limiter.check(&client));
    }

    #[test]
    fn remove_client_forgets_state() {
        let mut limiter = RateLimiter::new(1, Duration::from_secs(60));
        let client = ClientId::new();
        assert!(limiter.check(&client));
        assert_eq!(limiter.tracked_clients(), 1);

        limiter.remove_client(&client);
        assert_eq!(limiter.tracked_clients(), 0);
        assert!(limiter.check(&client));
    }
}
