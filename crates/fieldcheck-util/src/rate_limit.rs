//! Rate limiting for IPC clients

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// Token-bucket rate limiter keyed by any client identifier.
///
/// Each key gets `capacity` requests per `window`; a full window of
/// inactivity refills the bucket completely.
#[derive(Debug)]
pub struct RateLimiter<K> {
    capacity: u32,
    window: Duration,
    buckets: HashMap<K, Bucket>,
}

#[derive(Debug)]
struct Bucket {
    remaining: u32,
    window_start: Instant,
}

impl<K: Hash + Eq + Clone> RateLimiter<K> {
    pub fn new(capacity: u32, window: Duration) -> Self {
        Self {
            capacity,
            window,
            buckets: HashMap::new(),
        }
    }

    /// Consume one token for `key`. Returns `false` when the key is over its limit.
    pub fn check(&mut self, key: &K) -> bool {
        self.check_at(key, Instant::now())
    }

    fn check_at(&mut self, key: &K, now: Instant) -> bool {
        let capacity = self.capacity;
        let bucket = self.buckets.entry(key.clone()).or_insert(Bucket {
            remaining: capacity,
            window_start: now,
        });

        if now.duration_since(bucket.window_start) >= self.window {
            bucket.remaining = capacity;
            bucket.window_start = now;
        }

        match bucket.remaining.checked_sub(1) {
            Some(left) => {
                bucket.remaining = left;
                true
            }
            None => false,
        }
    }

    /// Forget a key (e.g. when its connection closes)
    pub fn forget(&mut self, key: &K) {
        self.buckets.remove(key);
    }

    pub fn tracked(&self) -> usize {
        self.buckets.len()
    }
}
