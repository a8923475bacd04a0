use std::cell::Cell;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use gs_cache::{
    CacheError, CacheResult, MIB, SeriesType, TimeSeriesCache, TimeSeriesCacheConfig,
    TimeSeriesKey, TimeSeriesSource,
};
use gs_core::{ComponentId, Resolution};

fn origin() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

fn hourly() -> Resolution {
    Resolution::from_minutes(60).unwrap()
}

/// Hour-indexed ramp with a fixed length; counts source reads.
struct CountingSource {
    len: usize,
    scenarios: usize,
    reads: Cell<usize>,
}

impl CountingSource {
    fn new(len: usize) -> Self {
        Self {
            len,
            scenarios: 1,
            reads: Cell::new(0),
        }
    }
}

impl TimeSeriesSource for CountingSource {
    fn read_series(
        &self,
        _key: &TimeSeriesKey,
        start: DateTime<Utc>,
        length: usize,
    ) -> CacheResult<Vec<f64>> {
        self.reads.set(self.reads.get() + 1);
        let first = (start - origin()).num_hours() as usize;
        let last = (first + length).min(self.len);
        let mut out = Vec::new();
        for s in 0..self.scenarios {
            out.extend((first.min(last)..last).map(|i| (s * 1000 + i) as f64));
        }
        Ok(out)
    }

    fn scenario_count(&self, _key: &TimeSeriesKey) -> usize {
        self.scenarios
    }
}

fn key(series_type: SeriesType) -> TimeSeriesKey {
    TimeSeriesKey::new(ComponentId::new(), series_type, "max_active_power")
}

#[test]
fn repeated_request_is_a_hit() {
    let source = CountingSource::new(10_000);
    let mut cache = TimeSeriesCache::new(TimeSeriesCacheConfig::default(), hourly());
    let k = key(SeriesType::Deterministic);

    let first = cache.get_window(&k, origin(), 24, &source).unwrap();
    let second = cache.get_window(&k, origin(), 24, &source).unwrap();

    assert_eq!(first, second);
    assert_eq!(first.values().len(), 24);
    assert_eq!(cache.stats().misses(), 1);
    assert_eq!(cache.stats().hits(), 1);
    assert_eq!(source.reads.get(), 1);
}

#[test]
fn disjoint_later_window_refills_once() {
    let source = CountingSource::new(10_000);
    let config = TimeSeriesCacheConfig {
        bytes_per_series: 24 * 8,
        max_total_bytes: MIB,
    };
    let mut cache = TimeSeriesCache::new(config, hourly());
    let k = key(SeriesType::Static);

    cache.get_window(&k, origin(), 24, &source).unwrap();
    let reads_before = source.reads.get();
    let later = cache
        .get_window(&k, origin() + TimeDelta::hours(48), 24, &source)
        .unwrap();

    assert_eq!(source.reads.get() - reads_before, 1);
    assert_eq!(later.values()[0], 48.0);
    assert_eq!(cache.stats().misses(), 2);
    assert_eq!(cache.stats().hits(), 0);
}

#[test]
fn disabled_cache_bypasses_everything() {
    let source = CountingSource::new(10_000);
    let mut cache = TimeSeriesCache::new(TimeSeriesCacheConfig::disabled(), hourly());
    let k = key(SeriesType::Static);

    for i in 0..100 {
        let w = cache
            .get_window(&k, origin() + TimeDelta::hours(i), 24, &source)
            .unwrap();
        assert_eq!(w.values()[0], i as f64);
    }

    assert!(cache.is_empty());
    assert_eq!(cache.retained_bytes(), 0);
    assert_eq!(cache.stats().hits(), 0);
    assert_eq!(cache.stats().misses(), 0);
    assert_eq!(source.reads.get(), 100);
}

#[test]
fn end_of_series_is_clamped_and_flagged() {
    let source = CountingSource::new(30);
    let mut cache = TimeSeriesCache::new(TimeSeriesCacheConfig::default(), hourly());
    let k = key(SeriesType::Static);

    let window = cache
        .get_window(&k, origin() + TimeDelta::hours(20), 24, &source)
        .unwrap();
    assert_eq!(window.periods(), 10);
    assert!(window.is_exhausted());

    match window.into_complete(&k) {
        Err(CacheError::WindowExhausted {
            requested,
            available,
            ..
        }) => {
            assert_eq!(requested, 24);
            assert_eq!(available, 10);
        }
        other => panic!("expected WindowExhausted, got {other:?}"),
    }

    // The short read is remembered; asking again does not hit the source.
    let reads = source.reads.get();
    cache
        .get_window(&k, origin() + TimeDelta::hours(20), 24, &source)
        .unwrap();
    assert_eq!(source.reads.get(), reads);
}

#[test]
fn least_recently_used_series_is_evicted() {
    let source = CountingSource::new(10_000);
    let config = TimeSeriesCacheConfig {
        bytes_per_series: 24 * 8,
        max_total_bytes: 2 * 24 * 8,
    };
    let mut cache = TimeSeriesCache::new(config, hourly());
    let a = key(SeriesType::Static);
    let b = key(SeriesType::Static);
    let c = key(SeriesType::Static);

    cache.get_window(&a, origin(), 24, &source).unwrap();
    cache.get_window(&b, origin(), 24, &source).unwrap();
    // Touch `a` so `b` becomes least recently used.
    cache.get_window(&a, origin(), 24, &source).unwrap();
    cache.get_window(&c, origin(), 24, &source).unwrap();

    assert!(cache.contains(&a));
    assert!(!cache.contains(&b));
    assert!(cache.contains(&c));
    assert_eq!(cache.evictions(), 1);
    assert!(cache.retained_bytes() <= 2 * 24 * 8);
}

#[test]
fn probabilistic_windows_are_scenario_major() {
    let mut source = CountingSource::new(10_000);
    source.scenarios = 3;
    let mut cache = TimeSeriesCache::new(TimeSeriesCacheConfig::default(), hourly());
    let k = key(SeriesType::Probabilistic);

    let window = cache.get_window(&k, origin(), 4, &source).unwrap();
    assert_eq!(window.scenarios(), 3);
    assert_eq!(window.periods(), 4);
    assert_eq!(window.values()[0], 0.0);
    assert_eq!(window.values()[4], 1000.0);
    assert_eq!(window.values()[8], 2000.0);

    // A shorter horizon at the same initial time is served from the stored window.
    let shorter = cache.get_window(&k, origin(), 2, &source).unwrap();
    assert_eq!(shorter.values(), &[0.0, 1.0, 1000.0, 1001.0, 2000.0, 2001.0]);
    assert_eq!(cache.stats().hits(), 1);
}

#[test]
fn clear_releases_all_windows() {
    let source = CountingSource::new(10_000);
    let mut cache = TimeSeriesCache::new(TimeSeriesCacheConfig::default(), hourly());
    for _ in 0..5 {
        cache
            .get_window(&key(SeriesType::Deterministic), origin(), 24, &source)
            .unwrap();
    }
    assert_eq!(cache.len(), 5);
    cache.clear();
    assert!(cache.is_empty());
    assert_eq!(cache.retained_bytes(), 0);
    assert_eq!(cache.stats().misses(), 5);
}

#[test]
fn forecast_reader_keeps_one_window_within_series_budget() {
    let source = CountingSource::new(10_000);
    let config = TimeSeriesCacheConfig {
        bytes_per_series: 24 * 8,
        max_total_bytes: MIB,
    };
    let mut cache = TimeSeriesCache::new(config, hourly());
    let k = key(SeriesType::Deterministic);
    let hour = TimeDelta::hours(1);

    for offset in 0..3 {
        cache
            .get_window(&k, origin() + hour * offset, 24, &source)
            .unwrap();
        assert!(cache.retained_bytes() <= 24 * 8);
    }
    assert_eq!(cache.stats().misses(), 3);

    let latest = cache.get_window(&k, origin() + hour * 2, 24, &source).unwrap();
    assert_eq!(latest.values()[0], 2.0);
    assert_eq!(cache.stats().hits(), 1);

    cache.get_window(&k, origin(), 24, &source).unwrap();
    assert_eq!(cache.stats().misses(), 4);
    assert_eq!(source.reads.get(), 4);
    assert!(cache.retained_bytes() <= 24 * 8);
}

#[test]
fn backwards_request_keeps_the_newest_window() {
    let source = CountingSource::new(10_000);
    let config = TimeSeriesCacheConfig {
        bytes_per_series: 2 * 24 * 8,
        max_total_bytes: MIB,
    };
    let mut cache = TimeSeriesCache::new(config, hourly());
    let k = key(SeriesType::Deterministic);
    let hour = TimeDelta::hours(1);

    cache.get_window(&k, origin() + hour * 2, 24, &source).unwrap();
    cache.get_window(&k, origin() + hour, 24, &source).unwrap();
    cache.get_window(&k, origin(), 24, &source).unwrap();
    assert_eq!(cache.stats().misses(), 3);
    assert!(cache.retained_bytes() <= 2 * 24 * 8);

    cache.get_window(&k, origin() + hour * 2, 24, &source).unwrap();
    cache.get_window(&k, origin(), 24, &source).unwrap();
    assert_eq!(cache.stats().hits(), 2);

    cache.get_window(&k, origin() + hour, 24, &source).unwrap();
    assert_eq!(cache.stats().misses(), 4);
}
