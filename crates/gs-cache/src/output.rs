//! Per-problem output cache.
//!
//! Solved results are appended here first and written to the result store in
//! batches. After a flush, keys whose rule says `keep_in_cache` stay in memory
//! so later stages can read them back without touching the store; everything
//! else is dropped. Retained data is bounded by the rule table's `max_size`.

use crate::lru::ByteLru;
use crate::rules::{CacheFlushRules, OptimizationResultCacheKey};
use crate::stats::CacheStats;
use chrono::{DateTime, Utc};
use gs_core::{GsError, GsResult};
use std::collections::{HashMap, VecDeque};

const BYTES_PER_VALUE: usize = std::mem::size_of::<f64>();

#[derive(Debug)]
struct Row {
    timestamp: DateTime<Utc>,
    values: Vec<f64>,
    flushed: bool,
}

impl Row {
    fn bytes(&self) -> usize {
        self.values.len() * BYTES_PER_VALUE
    }
}

/// What a flush did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub rows_written: usize,
    pub bytes_written: usize,
    pub rows_evicted: usize,
}

#[derive(Debug)]
pub struct OutputCache {
    rules: CacheFlushRules,
    buffers: HashMap<OptimizationResultCacheKey, VecDeque<Row>>,
    last_written: HashMap<OptimizationResultCacheKey, DateTime<Utc>>,
    kept: ByteLru<OptimizationResultCacheKey>,
    dirty_bytes: usize,
    stats: CacheStats,
}

impl Default for OutputCache {
    fn default() -> Self {
        Self::new(CacheFlushRules::default())
    }
}

impl OutputCache {
    pub fn new(rules: CacheFlushRules) -> Self {
        Self {
            rules,
            buffers: HashMap::new(),
            last_written: HashMap::new(),
            kept: ByteLru::new(),
            dirty_bytes: 0,
            stats: CacheStats::default(),
        }
    }

    pub fn rules(&self) -> &CacheFlushRules {
        &self.rules
    }

    pub fn rules_mut(&mut self) -> &mut CacheFlushRules {
        &mut self.rules
    }

    /// Buffer one row of results. Rows of a key must arrive in time order.
    pub fn append(
        &mut self,
        key: OptimizationResultCacheKey,
        timestamp: DateTime<Utc>,
        values: Vec<f64>,
    ) -> GsResult<()> {
        if let Some(last) = self.last_written.get(&key)
            && *last >= timestamp
        {
            return Err(GsError::consistency(format!(
                "result {key} at {timestamp} does not follow previous row at {last}"
            )));
        }
        self.last_written.insert(key.clone(), timestamp);
        let row = Row {
            timestamp,
            values,
            flushed: false,
        };
        self.dirty_bytes += row.bytes();
        self.buffers.entry(key).or_default().push_back(row);
        Ok(())
    }

    /// Retained row for `key` at `timestamp`, recording a hit or a miss.
    pub fn get(&mut self, key: &OptimizationResultCacheKey, timestamp: DateTime<Utc>) -> Option<&[f64]> {
        let position = self
            .buffers
            .get(key)
            .and_then(|rows| rows.iter().position(|r| r.timestamp == timestamp));
        match position {
            Some(idx) => {
                self.stats.record_hit();
                self.kept.touch(key);
                self.buffers.get(key).map(|rows| rows[idx].values.as_slice())
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    /// True once unwritten data reaches the rule table's `min_flush_size`.
    pub fn should_flush(&self) -> bool {
        self.dirty_bytes > 0 && self.dirty_bytes >= self.rules.min_flush_size()
    }

    /// Write every unwritten row through `write`, then drop or retain rows per rule.
    ///
    /// Rows written before a failing `write` stay marked as written.
    pub fn flush<E, F>(&mut self, mut write: F) -> Result<FlushReport, E>
    where
        F: FnMut(&OptimizationResultCacheKey, DateTime<Utc>, &[f64]) -> Result<(), E>,
    {
        let mut report = FlushReport::default();
        let mut keys: Vec<OptimizationResultCacheKey> = self.buffers.keys().cloned().collect();
        keys.sort();

        for key in keys {
            let keep = self.rules.rule_for(&key).keep_in_cache();
            let Some(rows) = self.buffers.get_mut(&key) else {
                continue;
            };
            for row in rows.iter_mut().filter(|r| !r.flushed) {
                write(&key, row.timestamp, &row.values)?;
                row.flushed = true;
                self.dirty_bytes -= row.bytes();
                report.rows_written += 1;
                report.bytes_written += row.bytes();
            }
            if keep {
                let bytes = rows.iter().map(Row::bytes).sum();
                self.kept.set_size(&key, bytes);
            } else {
                self.buffers.remove(&key);
            }
        }

        report.rows_evicted = self.enforce_max_size();
        if report.rows_written > 0 {
            tracing::debug!(
                rows = report.rows_written,
                bytes = report.bytes_written,
                evicted = report.rows_evicted,
                "flushed output cache"
            );
        }
        Ok(report)
    }

    /// Evict the oldest retained rows, lowest priority and least recently used
    /// key first, until retained data fits `max_size`.
    fn enforce_max_size(&mut self) -> usize {
        let mut evicted = 0;
        while self.kept.total_bytes() > self.rules.max_size() {
            let victim = self
                .kept
                .iter_lru()
                .min_by_key(|k| self.rules.rule_for(k).priority())
                .cloned();
            let Some(victim) = victim else {
                break;
            };
            let Some(rows) = self.buffers.get_mut(&victim) else {
                self.kept.remove(&victim);
                continue;
            };
            match rows.pop_front() {
                Some(row) => {
                    evicted += 1;
                    let remaining = self.kept.size_of(&victim).saturating_sub(row.bytes());
                    if rows.is_empty() {
                        self.buffers.remove(&victim);
                        self.kept.remove(&victim);
                    } else {
                        self.kept.resize(&victim, remaining);
                    }
                }
                None => {
                    self.buffers.remove(&victim);
                    self.kept.remove(&victim);
                }
            }
        }
        evicted
    }

    /// Drop all buffered and retained rows. Rules and statistics are kept.
    pub fn clear(&mut self) {
        self.buffers.clear();
        self.last_written.clear();
        self.kept.clear();
        self.dirty_bytes = 0;
    }

    pub fn retained_rows(&self, key: &OptimizationResultCacheKey) -> usize {
        self.buffers.get(key).map_or(0, VecDeque::len)
    }

    pub fn kept_bytes(&self) -> usize {
        self.kept.total_bytes()
    }

    pub fn dirty_bytes(&self) -> usize {
        self.dirty_bytes
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};
    use gs_core::ContainerKey;

    fn t(h: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + TimeDelta::hours(h)
    }

    fn key(entry: &str) -> OptimizationResultCacheKey {
        OptimizationResultCacheKey::new("UC", ContainerKey::variable(entry, "ThermalStandard"))
    }

    #[test]
    fn out_of_order_rows_rejected() {
        let mut cache = OutputCache::default();
        cache.append(key("P"), t(1), vec![1.0]).unwrap();
        let err = cache.append(key("P"), t(1), vec![2.0]).unwrap_err();
        assert!(matches!(err, GsError::Consistency { .. }));
    }

    #[test]
    fn should_flush_at_threshold() {
        let rules = CacheFlushRules::new(1024, 16).unwrap();
        let mut cache = OutputCache::new(rules);
        cache.append(key("P"), t(0), vec![1.0]).unwrap();
        assert!(!cache.should_flush());
        cache.append(key("P"), t(1), vec![1.0]).unwrap();
        assert!(cache.should_flush());
    }

    #[test]
    fn write_error_leaves_rows_dirty() {
        let mut cache = OutputCache::default();
        cache.append(key("P"), t(0), vec![1.0, 2.0]).unwrap();
        let result: Result<FlushReport, &str> = cache.flush(|_, _, _| Err("disk full"));
        assert!(result.is_err());
        assert_eq!(cache.dirty_bytes(), 16);
    }
}
