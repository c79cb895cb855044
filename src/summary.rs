//! Per-bucket counter flush for telemetry export.
//!
//! `Settings` owns three `TokenBucket`s (`bucket`, `trigger_relaxed_bucket`,
//! `trigger_strict_bucket`); this module reduces their flushed counters into
//! the six gauges an external metrics exporter is expected to publish.

use crate::bucket::TokenBucket;

/// Snapshot of the six gauges a metrics exporter reads off a `Settings`
/// snapshot on its own schedule. `requested`/`sampled`/`traced`/`through`/
/// `limited` are the regular bucket's counters; `tt_traced` sums the
/// `traced` counter across both trigger-trace buckets, since neither
/// relaxed nor strict trigger traces are distinguished in the observability
/// surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateSummarySnapshot {
    pub requested: u64,
    pub sampled: u64,
    pub traced: u64,
    pub through: u64,
    pub limited: u64,
    pub tt_traced: u64,
}

/// Stateless reducer: flushing resets each bucket's counters as a side
/// effect, so callers should only invoke this on their own polling cadence.
pub struct RateSummary;

impl RateSummary {
    /// Flushes `bucket`, `trigger_relaxed_bucket`, and `trigger_strict_bucket`
    /// (in that order) and folds the result into one snapshot.
    pub fn flush(buckets: [&TokenBucket; 3]) -> RateSummarySnapshot {
        let [bucket, relaxed, strict] = buckets;
        let regular = bucket.flush_counts();
        let relaxed_counts = relaxed.flush_counts();
        let strict_counts = strict.flush_counts();

        RateSummarySnapshot {
            requested: regular.requested,
            sampled: regular.sampled,
            traced: regular.traced,
            through: regular.through,
            limited: regular.limited,
            tt_traced: relaxed_counts.traced + strict_counts.traced,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flush_sums_trigger_trace_buckets_into_one_counter() {
        let bucket = TokenBucket::new(1_000_000.0, 1_000_000.0);
        let relaxed = TokenBucket::new(100.0, 100.0);
        let strict = TokenBucket::new(10.0, 10.0);

        bucket.count(true, false, true);
        relaxed.count(true, false, true);
        strict.count(true, false, true);
        strict.count(true, false, true);

        let snapshot = RateSummary::flush([&bucket, &relaxed, &strict]);
        assert_eq!(snapshot.requested, 1);
        assert_eq!(snapshot.traced, 1);
        assert_eq!(snapshot.tt_traced, 3);
    }

    #[test]
    fn flush_resets_all_three_buckets() {
        let bucket = TokenBucket::new(1.0, 1.0);
        let relaxed = TokenBucket::new(1.0, 1.0);
        let strict = TokenBucket::new(1.0, 1.0);
        bucket.count(true, false, true);

        let _ = RateSummary::flush([&bucket, &relaxed, &strict]);
        let second = RateSummary::flush([&bucket, &relaxed, &strict]);
        assert_eq!(second, RateSummarySnapshot::default());
    }
}
