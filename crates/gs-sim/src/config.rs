//! Simulation configuration file format and validation.

use crate::error::SimResult;
use crate::execution::Chronology;
use chrono::{DateTime, TimeDelta, Utc};
use gs_cache::{CacheFlushRules, CachePriority, MIB, TimeSeriesCacheConfig};
use gs_core::{ContainerKey, GsResult, Resolution, StageNumber};
use gs_problem::Settings;
use gs_results::{RunManifest, StageManifest, compute_run_id};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

pub const CONFIG_VERSION: &str = "1";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub name: String,
    pub steps: u32,
    pub initial_time: DateTime<Utc>,
    pub step_minutes: u64,
    #[serde(default)]
    pub fault_tolerant: bool,
    pub stages: Vec<StageConfig>,
    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StageConfig {
    pub number: StageNumber,
    /// Also the problem name; used as a directory name under `results/`.
    pub name: String,
    pub horizon: usize,
    pub resolution_minutes: u64,
    pub interval_minutes: u64,
    #[serde(default)]
    pub chronology: Chronology,
    #[serde(default)]
    pub allow_fails: bool,
    #[serde(default = "default_time_series_cache_bytes")]
    pub time_series_cache_bytes: usize,
}

fn default_time_series_cache_bytes() -> usize {
    MIB
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    pub max_size_mib: usize,
    pub min_flush_size_mib: usize,
    #[serde(default)]
    pub rules: Vec<CacheRuleConfig>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size_mib: 1024,
            min_flush_size_mib: 1,
            rules: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CacheRuleConfig {
    /// Stage name the rule applies to.
    pub model: String,
    pub key: ContainerKey,
    pub keep_in_cache: bool,
    #[serde(default)]
    pub priority: CachePriority,
}

impl StageConfig {
    pub fn resolution(&self) -> GsResult<Resolution> {
        Resolution::from_minutes(self.resolution_minutes)
    }

    pub fn interval(&self) -> TimeDelta {
        TimeDelta::minutes(self.interval_minutes as i64)
    }

    /// Problem settings for this stage; the initial time is set per execution.
    pub fn settings(&self) -> GsResult<Settings> {
        let time_series = if self.time_series_cache_bytes == 0 {
            TimeSeriesCacheConfig::disabled()
        } else {
            TimeSeriesCacheConfig {
                bytes_per_series: self.time_series_cache_bytes,
                ..TimeSeriesCacheConfig::default()
            }
        };
        Ok(Settings::new(self.horizon, self.resolution()?)?
            .with_allow_fails(self.allow_fails)
            .with_time_series_cache(time_series))
    }
}

impl SimulationConfig {
    pub fn step_length(&self) -> TimeDelta {
        TimeDelta::minutes(self.step_minutes as i64)
    }

    pub fn stage_keys(&self) -> Vec<StageNumber> {
        self.stages.iter().map(|s| s.number).collect()
    }

    pub fn stage(&self, name: &str) -> Option<&StageConfig> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// Solves of `stage` within one step.
    pub fn executions_per_step(&self, stage: &StageConfig) -> u32 {
        if stage.interval_minutes == 0 {
            return 0;
        }
        (self.step_minutes / stage.interval_minutes) as u32
    }

    /// Flush rules for one stage problem: the shared size limits plus the rules naming it.
    pub fn cache_rules_for(&self, stage_name: &str) -> GsResult<CacheFlushRules> {
        let mut rules = CacheFlushRules::new(
            self.cache.max_size_mib.saturating_mul(MIB),
            self.cache.min_flush_size_mib.saturating_mul(MIB),
        )?;
        for rule in self.cache.rules.iter().filter(|r| r.model == stage_name) {
            rules.add_rule(rule.model.clone(), rule.key.clone(), rule.keep_in_cache, rule.priority);
        }
        Ok(rules)
    }

    pub fn run_id(&self) -> String {
        compute_run_id(self, CONFIG_VERSION)
    }

    pub fn manifest(&self, created: DateTime<Utc>) -> GsResult<RunManifest> {
        let stages = self
            .stages
            .iter()
            .map(|s| {
                Ok(StageManifest {
                    number: s.number,
                    name: s.name.clone(),
                    executions_per_step: self.executions_per_step(s) as usize,
                    horizon: s.horizon,
                    resolution_s: s.resolution()?.seconds(),
                })
            })
            .collect::<GsResult<Vec<_>>>()?;
        Ok(RunManifest {
            run_id: self.run_id(),
            name: self.name.clone(),
            created,
            initial_time: self.initial_time,
            steps: self.steps,
            stages,
            version: CONFIG_VERSION.to_string(),
        })
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error("Duplicate ID: {id} in {context}")]
    DuplicateId { id: String, context: String },

    #[error("Missing reference: {id} in {context}")]
    MissingReference { id: String, context: String },

    #[error("Invalid value: {field} = {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

fn invalid(field: impl Into<String>, value: impl ToString, reason: impl Into<String>) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.into(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

fn check_name(field: &str, name: &str) -> Result<(), ValidationError> {
    if name.is_empty() || name.contains(['/', '\\']) {
        return Err(invalid(field, name, "must be non-empty without path separators"));
    }
    Ok(())
}

pub fn validate_config(config: &SimulationConfig) -> Result<(), ValidationError> {
    check_name("name", &config.name)?;
    if config.steps < 1 {
        return Err(invalid("steps", config.steps, "must be at least 1"));
    }
    if config.step_minutes == 0 {
        return Err(invalid("step_minutes", config.step_minutes, "must be positive"));
    }
    if config.stages.is_empty() {
        return Err(invalid("stages", "[]", "at least one stage is required"));
    }

    let mut numbers = HashSet::new();
    let mut names = HashSet::new();
    for stage in &config.stages {
        if !numbers.insert(stage.number) {
            return Err(ValidationError::DuplicateId {
                id: stage.number.to_string(),
                context: "stage numbers".to_string(),
            });
        }
        if !names.insert(stage.name.as_str()) {
            return Err(ValidationError::DuplicateId {
                id: stage.name.clone(),
                context: "stage names".to_string(),
            });
        }
        validate_stage(config, stage)?;
    }

    if config.cache.min_flush_size_mib > config.cache.max_size_mib {
        return Err(invalid(
            "cache.min_flush_size_mib",
            config.cache.min_flush_size_mib,
            "must not exceed cache.max_size_mib",
        ));
    }
    for rule in &config.cache.rules {
        if !names.contains(rule.model.as_str()) {
            return Err(ValidationError::MissingReference {
                id: rule.model.clone(),
                context: "cache rule model".to_string(),
            });
        }
    }
    Ok(())
}

fn validate_stage(config: &SimulationConfig, stage: &StageConfig) -> Result<(), ValidationError> {
    let field = |name: &str| format!("stages[{}].{}", stage.number, name);
    check_name(&field("name"), &stage.name)?;
    if stage.horizon == 0 {
        return Err(invalid(field("horizon"), stage.horizon, "must be positive"));
    }
    let resolution = stage
        .resolution()
        .map_err(|e| invalid(field("resolution_minutes"), stage.resolution_minutes, e.to_string()))?;
    if stage.interval_minutes == 0 {
        return Err(invalid(field("interval_minutes"), stage.interval_minutes, "must be positive"));
    }
    if config.step_minutes % stage.interval_minutes != 0 {
        return Err(invalid(
            field("interval_minutes"),
            stage.interval_minutes,
            format!("must divide the step length of {} minutes", config.step_minutes),
        ));
    }
    stage
        .chronology
        .end_of_interval_step(stage.interval(), resolution)
        .map_err(|e| invalid(field("interval_minutes"), stage.interval_minutes, e.to_string()))?;
    let covered = (stage.horizon as u64)
        .checked_mul(stage.resolution_minutes)
        .ok_or_else(|| invalid(field("horizon"), stage.horizon, "horizon span overflows"))?;
    if covered < stage.interval_minutes {
        return Err(invalid(
            field("horizon"),
            stage.horizon,
            format!("covers {covered} minutes, shorter than the interval"),
        ));
    }
    Ok(())
}

pub fn load_yaml(path: &Path) -> SimResult<SimulationConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: SimulationConfig = serde_yaml::from_str(&content)?;
    validate_config(&config)?;
    Ok(config)
}

pub fn save_yaml(path: &Path, config: &SimulationConfig) -> SimResult<()> {
    validate_config(config)?;
    let content = serde_yaml::to_string(config)?;
    std::fs::write(path, content)?;
    Ok(())
}
