//! Result and time-series caching for gridseq optimization problems.
//!
//! Provides:
//! - cache flush rules keyed by (model, container key)
//! - hit/miss statistics
//! - a byte-budgeted LRU ledger shared by both caches
//! - the per-problem output cache that buffers solved results before they are written
//! - the time-series window cache with lazy refill

pub mod error;
pub mod lru;
pub mod output;
pub mod rules;
pub mod stats;
pub mod timeseries;

pub use error::{CacheError, CacheResult};
pub use lru::ByteLru;
pub use output::{FlushReport, OutputCache};
pub use rules::{
    CacheFlushRule, CacheFlushRules, CachePriority, DEFAULT_MAX_SIZE, DEFAULT_MIN_FLUSH_SIZE, MIB,
    OptimizationResultCacheKey,
};
pub use stats::CacheStats;
pub use timeseries::{
    SeriesType, SeriesWindow, TimeSeriesCache, TimeSeriesCacheConfig, TimeSeriesKey,
    TimeSeriesSource,
};
