use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use gs_cache::{CacheFlushRules, CachePriority, OptimizationResultCacheKey, OutputCache};
use gs_core::ContainerKey;

fn t(h: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + TimeDelta::hours(h)
}

fn result_key(entry: &str) -> OptimizationResultCacheKey {
    OptimizationResultCacheKey::new("UC", ContainerKey::variable(entry, "ThermalStandard"))
}

#[test]
fn flush_writes_everything_and_keeps_only_ruled_keys() {
    let mut rules = CacheFlushRules::new(1024, 0).unwrap();
    rules.add_rule(
        "UC",
        ContainerKey::variable("OnVariable", "ThermalStandard"),
        true,
        CachePriority::High,
    );
    let mut cache = OutputCache::new(rules);

    cache.append(result_key("OnVariable"), t(0), vec![1.0, 0.0]).unwrap();
    cache.append(result_key("ActivePower"), t(0), vec![50.0, 0.0]).unwrap();

    let mut written = Vec::new();
    let report = cache
        .flush(|key, ts, values| {
            written.push((key.key.entry.clone(), ts, values.to_vec()));
            Ok::<(), std::io::Error>(())
        })
        .unwrap();

    assert_eq!(report.rows_written, 2);
    assert_eq!(written.len(), 2);
    assert_eq!(cache.dirty_bytes(), 0);
    assert_eq!(cache.retained_rows(&result_key("OnVariable")), 1);
    assert_eq!(cache.retained_rows(&result_key("ActivePower")), 0);
    assert_eq!(cache.kept_bytes(), 16);

    assert_eq!(cache.get(&result_key("OnVariable"), t(0)), Some(&[1.0, 0.0][..]));
    assert_eq!(cache.get(&result_key("ActivePower"), t(0)), None);
    assert_eq!(cache.stats().hits(), 1);
    assert_eq!(cache.stats().misses(), 1);
}

#[test]
fn second_flush_does_not_rewrite_rows() {
    let mut rules = CacheFlushRules::new(1024, 0).unwrap();
    rules.add_rule("UC", ContainerKey::variable("P", "ThermalStandard"), true, CachePriority::Low);
    let mut cache = OutputCache::new(rules);
    cache.append(result_key("P"), t(0), vec![1.0]).unwrap();

    let mut count = 0;
    cache.flush(|_, _, _| { count += 1; Ok::<(), ()>(()) }).unwrap();
    cache.append(result_key("P"), t(1), vec![2.0]).unwrap();
    cache.flush(|_, _, _| { count += 1; Ok::<(), ()>(()) }).unwrap();

    assert_eq!(count, 2);
    assert_eq!(cache.retained_rows(&result_key("P")), 2);
}

#[test]
fn retained_data_never_exceeds_max_size() {
    // Room for four 8-byte rows.
    let mut rules = CacheFlushRules::new(32, 0).unwrap();
    rules.add_rule("UC", ContainerKey::variable("Low", "ThermalStandard"), true, CachePriority::Low);
    rules.add_rule("UC", ContainerKey::variable("High", "ThermalStandard"), true, CachePriority::High);
    let mut cache = OutputCache::new(rules);

    for h in 0..3 {
        cache.append(result_key("High"), t(h), vec![h as f64]).unwrap();
        cache.append(result_key("Low"), t(h), vec![h as f64]).unwrap();
    }
    let report = cache.flush(|_, _, _| Ok::<(), ()>(())).unwrap();

    assert_eq!(report.rows_evicted, 2);
    assert!(cache.kept_bytes() <= 32);
    // Low priority goes first, oldest rows first.
    assert_eq!(cache.retained_rows(&result_key("High")), 3);
    assert_eq!(cache.retained_rows(&result_key("Low")), 1);
    assert!(cache.get(&result_key("Low"), t(2)).is_some());
    assert!(cache.get(&result_key("Low"), t(0)).is_none());
}
