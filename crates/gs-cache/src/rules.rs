//! Cache flush rules: which solved results stay in memory after they are written.

use gs_core::{ContainerKey, GsError, GsResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const MIB: usize = 1024 * 1024;
pub const DEFAULT_MAX_SIZE: usize = 1024 * MIB;
pub const DEFAULT_MIN_FLUSH_SIZE: usize = MIB;

/// Eviction priority of retained results. Lower priorities are evicted first.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum CachePriority {
    #[default]
    Low,
    Medium,
    High,
}

/// Retention decision for one result key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheFlushRule {
    keep_in_cache: bool,
    priority: CachePriority,
}

impl CacheFlushRule {
    pub const fn new(keep_in_cache: bool, priority: CachePriority) -> Self {
        Self {
            keep_in_cache,
            priority,
        }
    }

    pub fn keep_in_cache(&self) -> bool {
        self.keep_in_cache
    }

    pub fn priority(&self) -> CachePriority {
        self.priority
    }
}

/// Result key: the model that produced the data and the container table it came from.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OptimizationResultCacheKey {
    pub model: String,
    pub key: ContainerKey,
}

impl OptimizationResultCacheKey {
    pub fn new(model: impl Into<String>, key: ContainerKey) -> Self {
        Self {
            model: model.into(),
            key,
        }
    }
}

impl std::fmt::Display for OptimizationResultCacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.model, self.key)
    }
}

/// Rule table plus the byte thresholds the output cache works against.
#[derive(Clone, Debug)]
pub struct CacheFlushRules {
    rules: HashMap<OptimizationResultCacheKey, CacheFlushRule>,
    min_flush_size: usize,
    max_size: usize,
}

impl Default for CacheFlushRules {
    fn default() -> Self {
        Self {
            rules: HashMap::new(),
            min_flush_size: DEFAULT_MIN_FLUSH_SIZE,
            max_size: DEFAULT_MAX_SIZE,
        }
    }
}

impl CacheFlushRules {
    pub fn new(max_size: usize, min_flush_size: usize) -> GsResult<Self> {
        if min_flush_size > max_size {
            return Err(GsError::invalid_argument(format!(
                "min_flush_size ({min_flush_size}) exceeds max_size ({max_size})"
            )));
        }
        Ok(Self {
            rules: HashMap::new(),
            min_flush_size,
            max_size,
        })
    }

    /// Insert or overwrite the rule for `(model, key)`.
    pub fn add_rule(
        &mut self,
        model: impl Into<String>,
        key: ContainerKey,
        keep_in_cache: bool,
        priority: CachePriority,
    ) {
        self.rules.insert(
            OptimizationResultCacheKey::new(model, key),
            CacheFlushRule::new(keep_in_cache, priority),
        );
    }

    /// Stored rule for `(model, key)`; fails when none was registered.
    pub fn get_rule(&self, model: &str, key: &ContainerKey) -> GsResult<CacheFlushRule> {
        self.lookup(model, key)
            .ok_or_else(|| GsError::key_not_found(format!("cache rule for {model}:{key}")))
    }

    /// Stored rule for `(model, key)`, or the default `(false, Low)` rule.
    pub fn get_rule_or_default(&self, model: &str, key: &ContainerKey) -> CacheFlushRule {
        self.lookup(model, key).unwrap_or_default()
    }

    pub fn rule_for(&self, key: &OptimizationResultCacheKey) -> CacheFlushRule {
        self.rules.get(key).copied().unwrap_or_default()
    }

    fn lookup(&self, model: &str, key: &ContainerKey) -> Option<CacheFlushRule> {
        // HashMap lookup needs an owned key; rule tables are small.
        self.rules
            .get(&OptimizationResultCacheKey::new(model, key.clone()))
            .copied()
    }

    pub fn min_flush_size(&self) -> usize {
        self.min_flush_size
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&OptimizationResultCacheKey, &CacheFlushRule)> {
        self.rules.iter()
    }
}
