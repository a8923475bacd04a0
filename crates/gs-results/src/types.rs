//! Result data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type RunId = String;

/// Description of one simulation run, written next to its results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: RunId,
    pub name: String,
    pub created: DateTime<Utc>,
    pub initial_time: DateTime<Utc>,
    pub steps: u32,
    pub stages: Vec<StageManifest>,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageManifest {
    pub number: u32,
    pub name: String,
    pub executions_per_step: usize,
    pub horizon: usize,
    pub resolution_s: u64,
}

/// One written block of results: every value of an artifact table for one
/// execution, flattened time-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub timestamp: DateTime<Utc>,
    pub values: Vec<f64>,
}
