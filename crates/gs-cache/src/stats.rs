//! Hit/miss accounting for cache consumers.

/// Monotonic hit/miss counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    hits: u64,
    misses: u64,
}

impl CacheStats {
    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn accesses(&self) -> u64 {
        self.hits + self.misses
    }

    /// Share of accesses served from cache, in percent. 0.0 before any access.
    pub fn hit_percentage(&self) -> f64 {
        let total = self.accesses();
        if total == 0 {
            return 0.0;
        }
        self.hits as f64 / total as f64 * 100.0
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn percentage_is_bounded(hits in 0u64..500, misses in 0u64..500) {
            let mut stats = CacheStats::default();
            for _ in 0..hits { stats.record_hit(); }
            for _ in 0..misses { stats.record_miss(); }
            let pct = stats.hit_percentage();
            prop_assert!((0.0..=100.0).contains(&pct));
            prop_assert_eq!(stats.accesses(), hits + misses);
        }
    }
}
