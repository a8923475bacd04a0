//! Problem settings, template and system reference.

use chrono::{DateTime, Utc};
use gs_cache::TimeSeriesCacheConfig;
use gs_core::{ContainerKey, GsError, GsResult, Resolution};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Settings a container is built from. Survive every reset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Periods per build.
    pub horizon: usize,
    pub resolution: Resolution,
    /// Start of the next build window. Required before `build`.
    pub initial_time: Option<DateTime<Utc>>,
    /// Record build/solve failures on the status instead of returning them.
    pub allow_fails: bool,
    pub time_series_cache: TimeSeriesCacheConfig,
}

impl Settings {
    pub fn new(horizon: usize, resolution: Resolution) -> GsResult<Self> {
        if horizon == 0 {
            return Err(GsError::invalid_argument("horizon must be at least one period"));
        }
        Ok(Self {
            horizon,
            resolution,
            initial_time: None,
            allow_fails: false,
            time_series_cache: TimeSeriesCacheConfig::default(),
        })
    }

    pub fn with_initial_time(mut self, initial_time: DateTime<Utc>) -> Self {
        self.initial_time = Some(initial_time);
        self
    }

    pub fn with_allow_fails(mut self, allow_fails: bool) -> Self {
        self.allow_fails = allow_fails;
        self
    }

    pub fn with_time_series_cache(mut self, config: TimeSeriesCacheConfig) -> Self {
        self.time_series_cache = config;
        self
    }
}

/// Which formulation each part of the system uses. Interpreted by the model builder.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemTemplate {
    pub network: String,
    /// Component type → device formulation.
    pub devices: BTreeMap<String, String>,
    /// Service type → service formulation.
    pub services: BTreeMap<String, String>,
    /// Constraint tables whose duals are exported after a successful solve.
    pub duals: Vec<ContainerKey>,
}

impl ProblemTemplate {
    pub fn new(network: impl Into<String>) -> Self {
        Self {
            network: network.into(),
            ..Self::default()
        }
    }

    pub fn with_device(mut self, component_type: impl Into<String>, formulation: impl Into<String>) -> Self {
        self.devices.insert(component_type.into(), formulation.into());
        self
    }

    pub fn with_dual(mut self, constraint: ContainerKey) -> Self {
        self.duals.push(constraint);
        self
    }
}

/// Handle on the power system a problem is built for.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemRef {
    pub name: String,
    /// File the system was loaded from, if any.
    pub file: Option<PathBuf>,
}

impl SystemRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            file: None,
        }
    }

    pub fn with_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_horizon_rejected() {
        let res = Resolution::from_minutes(60).unwrap();
        assert!(Settings::new(0, res).is_err());
    }

    #[test]
    fn builder_methods_chain() {
        let res = Resolution::from_minutes(5).unwrap();
        let settings = Settings::new(12, res)
            .unwrap()
            .with_allow_fails(true)
            .with_time_series_cache(TimeSeriesCacheConfig::disabled());
        assert!(settings.allow_fails);
        assert!(!settings.time_series_cache.is_enabled());
        assert!(settings.initial_time.is_none());
    }
}
