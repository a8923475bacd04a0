//! Run workspace: a fresh timestamped directory tree per simulation run.

use crate::error::SimResult;
use chrono::{DateTime, Utc};
use gs_core::GsError;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::info;

pub const RAW_OUTPUT_DIR: &str = "raw_output";
pub const MODELS_DIR: &str = "models_json";
pub const RESULTS_DIR: &str = "results";

/// Most same-minute collisions tried before giving up.
const MAX_SUFFIX: u32 = 10_000;

/// Directories of one prepared run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunWorkspace {
    pub root: PathBuf,
    pub raw_output: PathBuf,
    pub models: PathBuf,
    pub results: PathBuf,
}

/// Create `<parent>/<base>-<YYYY-MM-DDTHH-MM>[-N]` with its subdirectories.
pub fn prepare_workspace(base_name: &str, parent: &Path) -> SimResult<RunWorkspace> {
    prepare_workspace_at(base_name, parent, Utc::now())
}

/// As [`prepare_workspace`], stamped with `now`.
///
/// A directory that already exists is never reused: the first free `-N`
/// suffix is taken instead.
pub fn prepare_workspace_at(base_name: &str, parent: &Path, now: DateTime<Utc>) -> SimResult<RunWorkspace> {
    if base_name.is_empty() || base_name.contains(['/', '\\']) {
        return Err(GsError::invalid_argument(format!("invalid run name {base_name:?}")).into());
    }
    if !parent.is_dir() {
        return Err(GsError::invalid_argument(format!(
            "output folder {} does not exist",
            parent.display()
        ))
        .into());
    }

    let stem = format!("{}-{}", base_name, now.format("%Y-%m-%dT%H-%M"));
    let root = create_unique_dir(parent, &stem)?;
    let workspace = RunWorkspace {
        raw_output: root.join(RAW_OUTPUT_DIR),
        models: root.join(MODELS_DIR),
        results: root.join(RESULTS_DIR),
        root,
    };
    for dir in [&workspace.raw_output, &workspace.models, &workspace.results] {
        fs::create_dir(dir)?;
    }
    info!(root = %workspace.root.display(), "run workspace prepared");
    Ok(workspace)
}

fn create_unique_dir(parent: &Path, stem: &str) -> SimResult<PathBuf> {
    for n in 0..=MAX_SUFFIX {
        let name = if n == 0 {
            stem.to_string()
        } else {
            format!("{stem}-{n}")
        };
        let candidate = parent.join(name);
        match fs::create_dir(&candidate) {
            Ok(()) => return Ok(candidate),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Err(GsError::consistency(format!(
        "no free run directory for {stem} after {MAX_SUFFIX} attempts"
    ))
    .into())
}
