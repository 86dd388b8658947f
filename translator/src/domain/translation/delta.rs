//! Delta/rate state cache
//!
//! Remembers the previous observation of every cumulative series so that
//! `delta_metric` and `compute_rate` rules can turn counters into gauges.
//!
//! Uses `DashMap` with its entry API: updates to one signature hold that
//! shard's write lock for the whole read-modify-write, while updates to
//! signatures in other shards proceed in parallel.
//!
//! Ages are measured on point timestamps. An entry older than `max_age`
//! relative to the incoming observation is treated as absent. A periodic
//! sweep drops entries older than `max_age` relative to the observation that
//! triggered it, clamped to the wall clock so that a series reporting from
//! the future cannot age out everyone else.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::core::constants::DELTA_CACHE_SWEEP_INTERVAL;
use crate::data::{DimensionSignature, Value};

/// Previous observation of one series
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheEntry {
    pub value: Value,
    pub timestamp: DateTime<Utc>,
}

pub struct DeltaCache {
    entries: DashMap<DimensionSignature, CacheEntry>,
    max_age: TimeDelta,
    /// Counter for sweep scheduling
    sweep_ops: AtomicU64,
}

impl DeltaCache {
    pub fn new(max_age_secs: u64) -> Self {
        let max_age_secs = i64::try_from(max_age_secs).unwrap_or(i64::MAX / 1_000);
        Self {
            entries: DashMap::new(),
            max_age: TimeDelta::try_seconds(max_age_secs).unwrap_or(TimeDelta::MAX),
            sweep_ops: AtomicU64::new(0),
        }
    }

    /// Store the observation and return the previous live one, if any.
    ///
    /// The cache always ends up holding the new observation, whether or not
    /// a previous one was returned.
    pub fn lookup_and_update(
        &self,
        signature: &DimensionSignature,
        value: Value,
        timestamp: DateTime<Utc>,
    ) -> Option<CacheEntry> {
        let current = CacheEntry { value, timestamp };

        let previous = match self.entries.entry(signature.clone()) {
            Entry::Occupied(mut occupied) => {
                let previous = occupied.insert(current);
                if self.is_expired(previous.timestamp, timestamp) {
                    tracing::debug!(
                        signature = %signature,
                        previous = %previous.timestamp,
                        "Delta cache entry expired, reseeding"
                    );
                    None
                } else {
                    Some(previous)
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(current);
                None
            }
        };

        let ops = self.sweep_ops.fetch_add(1, Ordering::Relaxed) + 1;
        if ops % DELTA_CACHE_SWEEP_INTERVAL == 0 {
            self.sweep(timestamp.min(Utc::now()));
        }

        previous
    }

    /// Difference to the previous observation, keeping the numeric kind.
    ///
    /// Returns `None` on first observation or when the kind changed.
    pub fn delta(
        &self,
        signature: &DimensionSignature,
        value: Value,
        timestamp: DateTime<Utc>,
    ) -> Option<Value> {
        let previous = self.lookup_and_update(signature, value, timestamp)?;
        match (value, previous.value) {
            (Value::Int(curr), Value::Int(prev)) => Some(Value::Int(curr.wrapping_sub(prev))),
            (Value::Double(curr), Value::Double(prev)) => Some(Value::Double(curr - prev)),
            _ => {
                tracing::debug!(signature = %signature, "Value kind changed between observations");
                None
            }
        }
    }

    /// Per-second rate of change since the previous observation.
    ///
    /// Returns `None` on first observation or when the elapsed time is not
    /// strictly positive.
    pub fn rate(
        &self,
        signature: &DimensionSignature,
        value: Value,
        timestamp: DateTime<Utc>,
    ) -> Option<f64> {
        let previous = self.lookup_and_update(signature, value, timestamp)?;
        let elapsed = timestamp - previous.timestamp;
        if elapsed <= TimeDelta::zero() {
            tracing::debug!(
                signature = %signature,
                elapsed = %elapsed,
                "Non-positive elapsed time, skipping rate"
            );
            return None;
        }
        let elapsed_secs = match elapsed.num_nanoseconds() {
            Some(nanos) => nanos as f64 / 1e9,
            None => elapsed.num_milliseconds() as f64 / 1e3,
        };
        Some((value.as_f64() - previous.value.as_f64()) / elapsed_secs)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn is_expired(&self, previous: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now - previous > self.max_age
    }

    fn sweep(&self, reference: DateTime<Utc>) {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| !self.is_expired(entry.timestamp, reference));
        let evicted = before.saturating_sub(self.entries.len());
        if evicted > 0 {
            tracing::debug!(evicted, remaining = self.entries.len(), "Swept delta cache");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Dimension;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_596_000_000 + secs, 0).unwrap()
    }

    fn sig(device: &str) -> DimensionSignature {
        DimensionSignature::new(
            "system.disk.operations",
            &[Dimension::new("host", "host0"), Dimension::new("device", device)],
        )
    }

    #[test]
    fn test_first_observation_seeds() {
        let cache = DeltaCache::new(3600);
        assert_eq!(cache.rate(&sig("sda1"), Value::Int(4_000), at(0)), None);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_rate_from_two_observations() {
        let cache = DeltaCache::new(3600);
        cache.rate(&sig("sda1"), Value::Int(4_000), at(0));
        let rate = cache.rate(&sig("sda1"), Value::Int(6_000), at(60)).unwrap();
        assert!((rate - 2_000.0 / 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_rate_requires_positive_elapsed_but_commits() {
        let cache = DeltaCache::new(3600);
        cache.rate(&sig("sda1"), Value::Int(10), at(0));
        assert_eq!(cache.rate(&sig("sda1"), Value::Int(20), at(0)), None);
        assert_eq!(cache.rate(&sig("sda1"), Value::Int(25), at(-10)), None);

        // The last observation (25 at -10s) is the new baseline
        let rate = cache.rate(&sig("sda1"), Value::Int(35), at(0)).unwrap();
        assert!((rate - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_delta_keeps_numeric_kind() {
        let cache = DeltaCache::new(3600);
        cache.delta(&sig("sda1"), Value::Int(4_000), at(0));
        assert_eq!(
            cache.delta(&sig("sda1"), Value::Int(6_000), at(60)),
            Some(Value::Int(2_000))
        );

        cache.delta(&sig("sda2"), Value::Double(1.5), at(0));
        assert_eq!(
            cache.delta(&sig("sda2"), Value::Double(4.0), at(60)),
            Some(Value::Double(2.5))
        );
    }

    #[test]
    fn test_delta_kind_change_emits_nothing() {
        let cache = DeltaCache::new(3600);
        cache.delta(&sig("sda1"), Value::Int(1), at(0));
        assert_eq!(cache.delta(&sig("sda1"), Value::Double(2.0), at(60)), None);
        assert_eq!(
            cache.delta(&sig("sda1"), Value::Double(3.0), at(120)),
            Some(Value::Double(1.0))
        );
    }

    #[test]
    fn test_signatures_are_independent() {
        let cache = DeltaCache::new(3600);
        cache.delta(&sig("sda1"), Value::Int(1), at(0));
        assert_eq!(cache.delta(&sig("sda2"), Value::Int(5), at(60)), None);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_expired_entry_is_treated_as_absent() {
        let cache = DeltaCache::new(60);
        cache.rate(&sig("sda1"), Value::Int(1), at(0));
        assert_eq!(cache.rate(&sig("sda1"), Value::Int(100), at(61)), None);
        // Replaced, so the next observation computes from the reseeded value
        let rate = cache.rate(&sig("sda1"), Value::Int(160), at(121)).unwrap();
        assert!((rate - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_entry_at_exact_ttl_is_live() {
        let cache = DeltaCache::new(60);
        cache.delta(&sig("sda1"), Value::Int(1), at(0));
        assert_eq!(
            cache.delta(&sig("sda1"), Value::Int(3), at(60)),
            Some(Value::Int(2))
        );
    }

    #[test]
    fn test_sweep_evicts_stale_series() {
        let cache = DeltaCache::new(60);
        cache.lookup_and_update(&sig("stale"), Value::Int(1), at(0));

        let live = sig("live");
        for i in 1..DELTA_CACHE_SWEEP_INTERVAL {
            cache.lookup_and_update(&live, Value::Int(i as i64), at(1_000));
        }

        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_sweep_ignores_series_from_the_future() {
        let cache = DeltaCache::new(3600);
        let now = Utc::now();
        let secs = |s: i64| now + TimeDelta::seconds(s);

        let sda1 = sig("sda1");
        cache.rate(&sda1, Value::Int(1_000), secs(-60));
        cache.lookup_and_update(&sig("skewed"), Value::Int(1), secs(86_400));
        for i in 0..300 {
            cache.lookup_and_update(&sig(&format!("churn{i}")), Value::Int(i), secs(-30));
        }
        // The skewed series triggers the next sweep
        let remaining = DELTA_CACHE_SWEEP_INTERVAL - (302 % DELTA_CACHE_SWEEP_INTERVAL);
        for _ in 0..remaining - 1 {
            cache.lookup_and_update(&sig("churn0"), Value::Int(0), secs(-30));
        }
        cache.lookup_and_update(&sig("skewed"), Value::Int(2), secs(86_460));

        let rate = cache.rate(&sda1, Value::Int(7_000), secs(0)).unwrap();
        assert!((rate - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_sweep_reference_is_the_triggering_observation() {
        let cache = DeltaCache::new(3600);
        let sda1 = sig("sda1");
        cache.rate(&sda1, Value::Int(1_000), at(0));
        cache.lookup_and_update(&sig("skewed"), Value::Int(1), at(86_400));
        for i in 0..300 {
            cache.lookup_and_update(&sig(&format!("churn{i}")), Value::Int(i), at(30));
        }

        let rate = cache.rate(&sda1, Value::Int(7_000), at(60)).unwrap();
        assert!((rate - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_rate_uses_sub_millisecond_elapsed_time() {
        let cache = DeltaCache::new(3600);
        let t0 = DateTime::from_timestamp(1_596_000_000, 0).unwrap();
        let t1 = DateTime::from_timestamp(1_596_000_000, 500_000).unwrap();
        cache.rate(&sig("sda1"), Value::Int(0), t0);

        let rate = cache.rate(&sig("sda1"), Value::Int(1), t1).unwrap();
        assert!((rate - 2_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_rate_keeps_nanosecond_precision() {
        let cache = DeltaCache::new(3600);
        let t0 = DateTime::from_timestamp(1_596_000_000, 0).unwrap();
        let t1 = DateTime::from_timestamp(1_596_000_001, 999_999).unwrap();
        cache.rate(&sig("sda1"), Value::Int(0), t0);

        let rate = cache.rate(&sig("sda1"), Value::Int(1_000_000), t1).unwrap();
        let expected = 1_000_000.0 / 1.000_999_999;
        assert!((rate - expected).abs() < 1e-6);
    }

    #[test]
    fn test_same_signature_updates_are_linearized() {
        let cache = DeltaCache::new(3600);
        let key = sig("sda1");
        let seeded = std::sync::atomic::AtomicUsize::new(0);

        std::thread::scope(|s| {
            for t in 0..8 {
                let cache = &cache;
                let key = &key;
                let seeded = &seeded;
                s.spawn(move || {
                    for i in 0..500 {
                        if cache
                            .lookup_and_update(key, Value::Int(t * 1_000 + i), at(0))
                            .is_none()
                        {
                            seeded.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                });
            }
        });

        assert_eq!(seeded.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_concurrent_distinct_signatures() {
        let cache = DeltaCache::new(3600);

        std::thread::scope(|s| {
            for t in 0..8 {
                let cache = &cache;
                s.spawn(move || {
                    let key = sig(&format!("dev{t}"));
                    cache.delta(&key, Value::Int(0), at(0));
                    assert_eq!(cache.delta(&key, Value::Int(t), at(10)), Some(Value::Int(t)));
                });
            }
        });

        assert_eq!(cache.len(), 8);
    }
}
