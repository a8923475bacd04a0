//! Time-series window cache.
//!
//! A rolling-horizon problem asks for the same device series over and over,
//! each time shifted by one interval. Each series key gets a window reader
//! that retains a bounded range of values and only goes back to the source
//! when a request falls outside that range.

use crate::error::{CacheError, CacheResult};
use crate::lru::ByteLru;
use crate::rules::MIB;
use crate::stats::CacheStats;
use chrono::{DateTime, Utc};
use gs_core::{ComponentId, GsError, Resolution};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

const BYTES_PER_VALUE: usize = std::mem::size_of::<f64>();

/// Kind of time series; selects the window reader strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SeriesType {
    /// One long series indexed by timestamp.
    Static,
    /// Forecasts issued per initial time.
    Deterministic,
    /// Scenario forecasts issued per initial time.
    Probabilistic,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeSeriesKey {
    pub component: ComponentId,
    pub series_type: SeriesType,
    pub field: String,
}

impl TimeSeriesKey {
    pub fn new(component: ComponentId, series_type: SeriesType, field: impl Into<String>) -> Self {
        Self {
            component,
            series_type,
            field: field.into(),
        }
    }
}

impl fmt::Display for TimeSeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{:?}/{}", self.component, self.series_type, self.field)
    }
}

/// External provider of time-series values.
pub trait TimeSeriesSource {
    /// Read `length` periods starting at `start`.
    ///
    /// May return fewer periods when the series ends. For probabilistic series
    /// the result holds `length * scenario_count` values, scenario-major.
    fn read_series(
        &self,
        key: &TimeSeriesKey,
        start: DateTime<Utc>,
        length: usize,
    ) -> CacheResult<Vec<f64>>;

    fn scenario_count(&self, _key: &TimeSeriesKey) -> usize {
        1
    }
}

/// Values returned for one request, clamped to the data available.
#[derive(Clone, Debug, PartialEq)]
pub struct SeriesWindow {
    values: Vec<f64>,
    requested: usize,
    scenarios: usize,
}

impl SeriesWindow {
    fn new(values: Vec<f64>, requested: usize, scenarios: usize) -> Self {
        Self {
            values,
            requested,
            scenarios: scenarios.max(1),
        }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn into_values(self) -> Vec<f64> {
        self.values
    }

    /// Periods actually available (per scenario).
    pub fn periods(&self) -> usize {
        self.values.len() / self.scenarios
    }

    pub fn requested(&self) -> usize {
        self.requested
    }

    pub fn scenarios(&self) -> usize {
        self.scenarios
    }

    /// True when the series ended before the requested horizon.
    pub fn is_exhausted(&self) -> bool {
        self.periods() < self.requested
    }

    /// Values of the full horizon, or `WindowExhausted` when it was truncated.
    pub fn into_complete(self, key: &TimeSeriesKey) -> CacheResult<Vec<f64>> {
        if self.is_exhausted() {
            return Err(CacheError::WindowExhausted {
                key: key.to_string(),
                requested: self.requested,
                available: self.periods(),
            });
        }
        Ok(self.values)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSeriesCacheConfig {
    /// Retained bytes per series. Zero disables caching.
    pub bytes_per_series: usize,
    /// Retained bytes across all series of one problem.
    pub max_total_bytes: usize,
}

impl Default for TimeSeriesCacheConfig {
    fn default() -> Self {
        Self {
            bytes_per_series: MIB,
            max_total_bytes: 64 * MIB,
        }
    }
}

impl TimeSeriesCacheConfig {
    pub fn disabled() -> Self {
        Self {
            bytes_per_series: 0,
            max_total_bytes: 0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.bytes_per_series > 0
    }
}

/// Contiguous chunk of a static series.
#[derive(Debug, Default)]
struct ChunkReader {
    start: Option<DateTime<Utc>>,
    values: Vec<f64>,
    source_exhausted: bool,
}

impl ChunkReader {
    fn offset(&self, t: DateTime<Utc>, resolution: Resolution) -> Option<usize> {
        resolution.index_of(self.start?, t)
    }

    fn covers(&self, t: DateTime<Utc>, horizon: usize, resolution: Resolution) -> bool {
        match self.offset(t, resolution) {
            Some(off) => {
                off + horizon <= self.values.len()
                    || (self.source_exhausted && off <= self.values.len())
            }
            None => false,
        }
    }

    fn window(&self, t: DateTime<Utc>, horizon: usize, resolution: Resolution) -> SeriesWindow {
        let len = self.values.len();
        let off = self.offset(t, resolution).unwrap_or(len).min(len);
        let end = (off + horizon).min(len);
        SeriesWindow::new(self.values[off..end].to_vec(), horizon, 1)
    }

    fn refill(
        &mut self,
        key: &TimeSeriesKey,
        source: &dyn TimeSeriesSource,
        t: DateTime<Utc>,
        length: usize,
    ) -> CacheResult<()> {
        let mut values = source.read_series(key, t, length)?;
        values.truncate(length);
        self.source_exhausted = values.len() < length;
        self.start = Some(t);
        self.values = values;
        Ok(())
    }

    fn retained_bytes(&self) -> usize {
        self.values.len() * BYTES_PER_VALUE
    }
}

#[derive(Debug)]
struct ForecastWindow {
    values: Vec<f64>,
    requested: usize,
}

impl ForecastWindow {
    fn periods(&self, scenarios: usize) -> usize {
        self.values.len() / scenarios
    }
}

/// Forecast windows keyed by their initial time.
#[derive(Debug)]
struct ForecastReader {
    scenarios: usize,
    windows: BTreeMap<DateTime<Utc>, ForecastWindow>,
}

impl ForecastReader {
    fn new(scenarios: usize) -> Self {
        Self {
            scenarios: scenarios.max(1),
            windows: BTreeMap::new(),
        }
    }

    fn covers(&self, t: DateTime<Utc>, horizon: usize) -> bool {
        match self.windows.get(&t) {
            Some(w) => {
                let periods = w.periods(self.scenarios);
                periods >= horizon || periods < w.requested
            }
            None => false,
        }
    }

    fn window(&self, t: DateTime<Utc>, horizon: usize) -> SeriesWindow {
        let Some(w) = self.windows.get(&t) else {
            return SeriesWindow::new(Vec::new(), horizon, self.scenarios);
        };
        let stored = w.periods(self.scenarios);
        let take = stored.min(horizon);
        let mut values = Vec::with_capacity(take * self.scenarios);
        for s in 0..self.scenarios {
            let base = s * stored;
            values.extend_from_slice(&w.values[base..base + take]);
        }
        SeriesWindow::new(values, horizon, self.scenarios)
    }

    fn refill(
        &mut self,
        key: &TimeSeriesKey,
        source: &dyn TimeSeriesSource,
        t: DateTime<Utc>,
        horizon: usize,
        budget: usize,
    ) -> CacheResult<()> {
        let mut values = source.read_series(key, t, horizon)?;
        values.truncate(horizon * self.scenarios);
        let usable = values.len() - values.len() % self.scenarios;
        values.truncate(usable);
        self.windows.insert(
            t,
            ForecastWindow {
                values,
                requested: horizon,
            },
        );

        // Oldest windows below the newest go first; `t` always survives.
        while self.retained_bytes() > budget && self.windows.len() > 1 {
            let newest = self.windows.keys().next_back().copied();
            let victim = self
                .windows
                .keys()
                .find(|k| **k != t && Some(**k) != newest)
                .or_else(|| self.windows.keys().find(|k| **k != t))
                .copied();
            match victim {
                Some(k) => {
                    self.windows.remove(&k);
                }
                None => break,
            }
        }
        Ok(())
    }

    fn retained_bytes(&self) -> usize {
        self.windows
            .values()
            .map(|w| w.values.len() * BYTES_PER_VALUE)
            .sum()
    }
}

#[derive(Debug)]
enum WindowReader {
    Static(ChunkReader),
    Deterministic(ForecastReader),
    Probabilistic(ForecastReader),
}

impl WindowReader {
    fn for_key(key: &TimeSeriesKey, source: &dyn TimeSeriesSource) -> Self {
        match key.series_type {
            SeriesType::Static => WindowReader::Static(ChunkReader::default()),
            SeriesType::Deterministic => WindowReader::Deterministic(ForecastReader::new(1)),
            SeriesType::Probabilistic => {
                WindowReader::Probabilistic(ForecastReader::new(source.scenario_count(key)))
            }
        }
    }

    fn covers(&self, t: DateTime<Utc>, horizon: usize, resolution: Resolution) -> bool {
        match self {
            WindowReader::Static(r) => r.covers(t, horizon, resolution),
            WindowReader::Deterministic(r) | WindowReader::Probabilistic(r) => r.covers(t, horizon),
        }
    }

    fn window(&self, t: DateTime<Utc>, horizon: usize, resolution: Resolution) -> SeriesWindow {
        match self {
            WindowReader::Static(r) => r.window(t, horizon, resolution),
            WindowReader::Deterministic(r) | WindowReader::Probabilistic(r) => r.window(t, horizon),
        }
    }

    /// Upper bound on retained bytes after the next refill.
    fn projected_bytes(&self, horizon: usize, chunk_len: usize, budget: usize) -> usize {
        match self {
            WindowReader::Static(_) => chunk_len * BYTES_PER_VALUE,
            WindowReader::Deterministic(r) | WindowReader::Probabilistic(r) => {
                let window = horizon * r.scenarios * BYTES_PER_VALUE;
                (r.retained_bytes() + window).min(budget.max(window))
            }
        }
    }

    fn refill(
        &mut self,
        key: &TimeSeriesKey,
        source: &dyn TimeSeriesSource,
        t: DateTime<Utc>,
        horizon: usize,
        chunk_len: usize,
        budget: usize,
    ) -> CacheResult<()> {
        match self {
            WindowReader::Static(r) => r.refill(key, source, t, chunk_len),
            WindowReader::Deterministic(r) | WindowReader::Probabilistic(r) => {
                r.refill(key, source, t, horizon, budget)
            }
        }
    }

    fn retained_bytes(&self) -> usize {
        match self {
            WindowReader::Static(r) => r.retained_bytes(),
            WindowReader::Deterministic(r) | WindowReader::Probabilistic(r) => r.retained_bytes(),
        }
    }
}

/// Per-problem cache of time-series windows.
#[derive(Debug)]
pub struct TimeSeriesCache {
    config: TimeSeriesCacheConfig,
    resolution: Resolution,
    readers: HashMap<TimeSeriesKey, WindowReader>,
    lru: ByteLru<TimeSeriesKey>,
    stats: CacheStats,
    evictions: u64,
}

impl TimeSeriesCache {
    pub fn new(config: TimeSeriesCacheConfig, resolution: Resolution) -> Self {
        Self {
            config,
            resolution,
            readers: HashMap::new(),
            lru: ByteLru::new(),
            stats: CacheStats::default(),
            evictions: 0,
        }
    }

    /// Values of `key` for `[initial_time, initial_time + horizon)`.
    pub fn get_window(
        &mut self,
        key: &TimeSeriesKey,
        initial_time: DateTime<Utc>,
        horizon: usize,
        source: &dyn TimeSeriesSource,
    ) -> CacheResult<SeriesWindow> {
        if horizon == 0 {
            return Err(GsError::invalid_argument("window horizon must be positive").into());
        }
        if !self.config.is_enabled() {
            return read_direct(key, initial_time, horizon, source);
        }

        if let Some(reader) = self.readers.get(key)
            && reader.covers(initial_time, horizon, self.resolution)
        {
            let window = reader.window(initial_time, horizon, self.resolution);
            self.stats.record_hit();
            self.lru.touch(key);
            return Ok(window);
        }

        self.stats.record_miss();
        let mut reader = match self.readers.remove(key) {
            Some(reader) => reader,
            None => WindowReader::for_key(key, source),
        };
        let chunk_len = self.chunk_len(horizon);
        let budget = self.config.bytes_per_series;
        self.make_room(key, reader.projected_bytes(horizon, chunk_len, budget));

        if let Err(e) = reader.refill(key, source, initial_time, horizon, chunk_len, budget) {
            self.lru.remove(key);
            return Err(e);
        }
        let window = reader.window(initial_time, horizon, self.resolution);
        self.lru.set_size(key, reader.retained_bytes());
        self.readers.insert(key.clone(), reader);
        Ok(window)
    }

    /// Periods a static reader retains per refill: the per-series budget,
    /// never less than one horizon.
    fn chunk_len(&self, horizon: usize) -> usize {
        let budget = self.config.bytes_per_series.min(self.config.max_total_bytes.max(1));
        (budget / BYTES_PER_VALUE).max(horizon)
    }

    /// Evict least recently used readers until `projected` more bytes for `key` fit.
    fn make_room(&mut self, key: &TimeSeriesKey, projected: usize) {
        loop {
            let others = self.lru.total_bytes() - self.lru.size_of(key);
            if others + projected <= self.config.max_total_bytes {
                break;
            }
            let Some(victim) = self.lru.lru_except(key).cloned() else {
                break;
            };
            let freed = self.lru.remove(&victim).unwrap_or(0);
            self.readers.remove(&victim);
            self.evictions += 1;
            tracing::debug!(series = %victim, freed_bytes = freed, "evicted time series window");
        }
    }

    /// Drop every reader. Statistics are kept.
    pub fn clear(&mut self) {
        self.readers.clear();
        self.lru.clear();
    }

    pub fn invalidate(&mut self, key: &TimeSeriesKey) {
        self.readers.remove(key);
        self.lru.remove(key);
    }

    pub fn contains(&self, key: &TimeSeriesKey) -> bool {
        self.readers.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.readers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readers.is_empty()
    }

    pub fn retained_bytes(&self) -> usize {
        self.lru.total_bytes()
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats.reset();
    }

    pub fn evictions(&self) -> u64 {
        self.evictions
    }

    pub fn config(&self) -> &TimeSeriesCacheConfig {
        &self.config
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }
}

fn read_direct(
    key: &TimeSeriesKey,
    initial_time: DateTime<Utc>,
    horizon: usize,
    source: &dyn TimeSeriesSource,
) -> CacheResult<SeriesWindow> {
    let scenarios = match key.series_type {
        SeriesType::Probabilistic => source.scenario_count(key).max(1),
        _ => 1,
    };
    let mut values = source.read_series(key, initial_time, horizon)?;
    values.truncate(horizon * scenarios);
    let usable = values.len() - values.len() % scenarios;
    values.truncate(usable);
    Ok(SeriesWindow::new(values, horizon, scenarios))
}
