//! Versioned binary snapshot of a problem definition.
//!
//! A snapshot file is a bincode envelope `{schema_version, payload}`. The payload
//! is decoded with the layout of its own version and migrated forward one
//! version at a time.

use crate::error::{ProblemError, ProblemResult};
use crate::settings::{ProblemTemplate, Settings};
use gs_core::GsError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const SNAPSHOT_SCHEMA_VERSION: u32 = 2;

/// Everything needed to rebuild a problem against the same system.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProblemSnapshot {
    pub schema_version: u32,
    pub problem_type: String,
    pub name: String,
    pub template: ProblemTemplate,
    pub system_file: Option<PathBuf>,
    pub settings: Settings,
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    schema_version: u32,
    payload: Vec<u8>,
}

/// Version 1 had no system file reference.
#[derive(Serialize, Deserialize)]
struct SnapshotV1 {
    problem_type: String,
    name: String,
    template: ProblemTemplate,
    settings: Settings,
}

impl From<SnapshotV1> for ProblemSnapshot {
    fn from(v1: SnapshotV1) -> Self {
        Self {
            schema_version: 2,
            problem_type: v1.problem_type,
            name: v1.name,
            template: v1.template,
            system_file: None,
            settings: v1.settings,
        }
    }
}

impl ProblemSnapshot {
    pub fn to_bytes(&self) -> ProblemResult<Vec<u8>> {
        let envelope = Envelope {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            payload: bincode::serialize(self)?,
        };
        Ok(bincode::serialize(&envelope)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> ProblemResult<Self> {
        let envelope: Envelope = bincode::deserialize(bytes)?;
        match envelope.schema_version {
            1 => {
                let v1: SnapshotV1 = bincode::deserialize(&envelope.payload)?;
                Ok(v1.into())
            }
            SNAPSHOT_SCHEMA_VERSION => Ok(bincode::deserialize(&envelope.payload)?),
            v if v > SNAPSHOT_SCHEMA_VERSION => Err(GsError::consistency(format!(
                "snapshot schema version {v} is newer than supported version {SNAPSHOT_SCHEMA_VERSION}"
            ))
            .into()),
            v => Err(GsError::consistency(format!("unknown snapshot schema version {v}")).into()),
        }
    }

    /// Write to `<dir>/<name>.bin`.
    pub fn save(&self, dir: &Path) -> ProblemResult<PathBuf> {
        let path = dir.join(format!("{}.bin", self.name));
        fs::write(&path, self.to_bytes()?)?;
        info!(problem = %self.name, path = %path.display(), "snapshot written");
        Ok(path)
    }

    pub fn load(path: &Path) -> ProblemResult<Self> {
        let bytes = fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    /// Fails with a consistency error when the snapshot came from another problem type.
    pub fn ensure_type(&self, expected: &str) -> ProblemResult<()> {
        if self.problem_type != expected {
            return Err(ProblemError::Core(GsError::consistency(format!(
                "snapshot {} holds a {} problem, expected {}",
                self.name, self.problem_type, expected
            ))));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use gs_core::{ContainerKey, Resolution};

    fn snapshot() -> ProblemSnapshot {
        let start = chrono::Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let settings = Settings::new(24, Resolution::from_minutes(60).unwrap())
            .unwrap()
            .with_initial_time(start);
        ProblemSnapshot {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            problem_type: "UnitCommitment".to_string(),
            name: "UC".to_string(),
            template: ProblemTemplate::new("CopperPlate")
                .with_device("ThermalStandard", "ThermalBasicUnitCommitment")
                .with_dual(ContainerKey::constraint("CopperPlateBalance", "System")),
            system_file: Some(PathBuf::from("sys.json")),
            settings,
        }
    }

    #[test]
    fn bytes_roundtrip() {
        let snap = snapshot();
        let decoded = ProblemSnapshot::from_bytes(&snap.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, snap);
    }

    #[test]
    fn version_one_is_migrated() {
        let snap = snapshot();
        let v1 = SnapshotV1 {
            problem_type: snap.problem_type.clone(),
            name: snap.name.clone(),
            template: snap.template.clone(),
            settings: snap.settings.clone(),
        };
        let bytes = bincode::serialize(&Envelope {
            schema_version: 1,
            payload: bincode::serialize(&v1).unwrap(),
        })
        .unwrap();
        let decoded = ProblemSnapshot::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.schema_version, SNAPSHOT_SCHEMA_VERSION);
        assert_eq!(decoded.system_file, None);
        assert_eq!(decoded.template, snap.template);
    }

    #[test]
    fn newer_version_rejected() {
        let bytes = bincode::serialize(&Envelope {
            schema_version: SNAPSHOT_SCHEMA_VERSION + 1,
            payload: Vec::new(),
        })
        .unwrap();
        let err = ProblemSnapshot::from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, ProblemError::Core(GsError::Consistency { .. })));
    }

    #[test]
    fn version_zero_is_unknown() {
        let bytes = bincode::serialize(&Envelope {
            schema_version: 0,
            payload: Vec::new(),
        })
        .unwrap();
        let err = ProblemSnapshot::from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, ProblemError::Core(GsError::Consistency { .. })));
        let message = err.to_string();
        assert!(message.contains("unknown snapshot schema version 0"), "{message}");
        assert!(!message.contains("newer"));
    }

    #[test]
    fn type_mismatch_is_consistency_error() {
        let snap = snapshot();
        assert!(snap.ensure_type("UnitCommitment").is_ok());
        assert!(matches!(
            snap.ensure_type("EconomicDispatch"),
            Err(ProblemError::Core(GsError::Consistency { .. }))
        ));
    }
}
