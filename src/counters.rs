//! Publish counters owned by the distributor.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic count of subscriptions served plus a sampling checkpoint.
///
/// The total only ever grows and is reset only by a restart. Sampling
/// advances the checkpoint with `fetch_max`, so concurrent samplers never
/// see a negative delta and their deltas always add up to the total.
#[derive(Debug, Default)]
pub struct PublishCounters {
    total: AtomicU64,
    last_sample: AtomicU64,
}

impl PublishCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self) {
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    /// Total minus the value seen by the previous sample; moves the checkpoint.
    pub fn since_last_sample(&self) -> u64 {
        let total = self.total.load(Ordering::Acquire);
        let previous = self.last_sample.fetch_max(total, Ordering::AcqRel);
        total.saturating_sub(previous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_sample_resets_checkpoint() {
        let counters = PublishCounters::new();
        for _ in 0..5 {
            counters.increment();
        }

        assert_eq!(counters.total(), 5);
        assert_eq!(counters.since_last_sample(), 5);
        assert_eq!(counters.since_last_sample(), 0);

        counters.increment();
        assert_eq!(counters.since_last_sample(), 1);
        assert_eq!(counters.total(), 6);
    }

    #[test]
    fn test_concurrent_samplers_add_up() {
        let counters = Arc::new(PublishCounters::new());

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let counters = Arc::clone(&counters);
                std::thread::spawn(move || {
                    let mut sampled = 0;
                    for _ in 0..1000 {
                        counters.increment();
                        sampled += counters.since_last_sample();
                    }
                    sampled
                })
            })
            .collect();

        let sampled: u64 = handles.into_iter().map(|h| h.join().unwrap()).sum();
        let rest = counters.since_last_sample();

        assert_eq!(counters.total(), 4000);
        assert_eq!(sampled + rest, 4000);
    }
}
