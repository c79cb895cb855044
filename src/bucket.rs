//! Token-bucket rate limiter with request counters.
//!
//! Same refill-on-consume algorithm as a classic leaky bucket, extended with
//! five disjoint request counters the decision engine needs for telemetry.

use std::time::Instant;

use parking_lot::Mutex;

/// Snapshot of a bucket's counters, read-and-reset atomically by
/// [`TokenBucket::flush_counts`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BucketCounts {
    pub requested: u64,
    pub sampled: u64,
    pub traced: u64,
    pub through: u64,
    pub limited: u64,
}

struct State {
    rate_per_sec: f64,
    capacity: f64,
    available: f64,
    last: Instant,
    counts: BucketCounts,
}

/// Leaky-bucket rate limiter plus the counters `sample_request` needs to
/// report `requested`/`sampled`/`traced`/`through`/`limited`. Internally
/// synchronized: every public method is safe to call concurrently from
/// arbitrary request threads.
pub struct TokenBucket {
    state: Mutex<State>,
}

impl TokenBucket {
    pub fn new(rate_per_sec: f64, capacity: f64) -> Self {
        TokenBucket {
            state: Mutex::new(State {
                rate_per_sec,
                capacity,
                available: capacity,
                last: Instant::now(),
                counts: BucketCounts::default(),
            }),
        }
    }

    pub fn rate(&self) -> f64 {
        self.state.lock().rate_per_sec
    }

    pub fn capacity(&self) -> f64 {
        self.state.lock().capacity
    }

    /// Atomically installs a new rate and capacity. If `available` exceeds
    /// the new capacity it is clamped down; no refill is performed as part
    /// of this call.
    pub fn set_rate(&self, rate_per_sec: f64, capacity: f64) {
        let mut state = self.state.lock();
        state.rate_per_sec = rate_per_sec;
        state.capacity = capacity;
        if state.available > capacity {
            state.available = capacity;
        }
    }

    /// Refill-then-consume-one-token. Called only when `do_rate_limit` is
    /// true and `sampled` is true.
    fn consume(state: &mut State, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(state.last).as_secs_f64();
        state.available = (state.available + state.rate_per_sec * elapsed).min(state.capacity);
        state.last = now;
        if state.available >= 1.0 {
            state.available -= 1.0;
            true
        } else {
            false
        }
    }

    /// Updates counters and, when applicable, consumes a token:
    ///
    /// 1. `requested += 1`
    /// 2. if not `has_metadata`: `sampled += 1` (a fresh dice-roll attempt)
    /// 3. if not `sampled`: return false
    /// 4. if `do_rate_limit` and the bucket is exhausted: `limited += 1`, return false
    /// 5. if `has_metadata`: `through += 1` (a continuation was honored)
    /// 6. `traced += 1`; return true
    pub fn count(&self, sampled: bool, has_metadata: bool, do_rate_limit: bool) -> bool {
        let mut state = self.state.lock();
        state.counts.requested += 1;

        if !has_metadata {
            state.counts.sampled += 1;
        }

        if !sampled {
            return false;
        }

        if do_rate_limit {
            let now = Instant::now();
            if !Self::consume(&mut state, now) {
                state.counts.limited += 1;
                return false;
            }
        }

        if has_metadata {
            state.counts.through += 1;
        }

        state.counts.traced += 1;
        true
    }

    /// Atomically reads and resets the counters.
    pub fn flush_counts(&self) -> BucketCounts {
        let mut state = self.state.lock();
        std::mem::take(&mut state.counts)
    }
}

impl std::fmt::Debug for TokenBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("TokenBucket")
            .field("rate_per_sec", &state.rate_per_sec)
            .field("capacity", &state.capacity)
            .field("available", &state.available)
            .finish()
    }
}
