//! Result storage API.

use crate::types::{ResultRecord, RunManifest};
use crate::{ResultsError, ResultsResult};
use chrono::{DateTime, Utc};
use gs_core::ArtifactKind;
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Sink for solved results.
pub trait ResultStore {
    fn write(
        &mut self,
        problem: &str,
        category: ArtifactKind,
        key: &str,
        timestamp: DateTime<Utc>,
        data: &[f64],
    ) -> ResultsResult<()>;
}

/// JSON-lines store rooted at a run's `results/` directory.
///
/// Layout: `<root>/<problem>/<category>/<key>.jsonl`, one record per line.
#[derive(Clone, Debug)]
pub struct FileResultStore {
    root_dir: PathBuf,
}

impl FileResultStore {
    pub fn new(root_dir: PathBuf) -> ResultsResult<Self> {
        if !root_dir.exists() {
            fs::create_dir_all(&root_dir)?;
        }
        Ok(Self { root_dir })
    }

    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    fn category_dir(&self, problem: &str, category: ArtifactKind) -> PathBuf {
        self.root_dir.join(problem).join(category.as_str())
    }

    fn series_path(&self, problem: &str, category: ArtifactKind, key: &str) -> ResultsResult<PathBuf> {
        if key.is_empty() || key.contains(['/', '\\']) || problem.contains(['/', '\\']) {
            return Err(ResultsError::InvalidPath {
                message: format!("result key {problem}/{key} is not a plain file name"),
            });
        }
        Ok(self
            .category_dir(problem, category)
            .join(format!("{key}.jsonl")))
    }

    pub fn load_records(
        &self,
        problem: &str,
        category: ArtifactKind,
        key: &str,
    ) -> ResultsResult<Vec<ResultRecord>> {
        let path = self.series_path(problem, category, key)?;
        if !path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(path)?;
        let mut records = Vec::new();
        for line in content.lines() {
            if !line.trim().is_empty() {
                let record: ResultRecord = serde_json::from_str(line)?;
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Keys written for `problem` under `category`, sorted.
    pub fn list_keys(&self, problem: &str, category: ArtifactKind) -> ResultsResult<Vec<String>> {
        let dir = self.category_dir(problem, category);
        let mut keys = Vec::new();
        if !dir.exists() {
            return Ok(keys);
        }
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "jsonl")
                && let Some(stem) = path.file_stem()
            {
                keys.push(stem.to_string_lossy().to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }

    pub fn save_manifest(&self, manifest: &RunManifest) -> ResultsResult<()> {
        let manifest_json = serde_json::to_string_pretty(manifest)?;
        fs::write(self.root_dir.join("manifest.json"), manifest_json)?;
        Ok(())
    }

    pub fn load_manifest(&self) -> ResultsResult<RunManifest> {
        let manifest_path = self.root_dir.join("manifest.json");

        if !manifest_path.exists() {
            return Err(ResultsError::ManifestNotFound {
                path: manifest_path.display().to_string(),
            });
        }

        let content = fs::read_to_string(manifest_path)?;
        let manifest = serde_json::from_str(&content)?;
        Ok(manifest)
    }
}

impl ResultStore for FileResultStore {
    fn write(
        &mut self,
        problem: &str,
        category: ArtifactKind,
        key: &str,
        timestamp: DateTime<Utc>,
        data: &[f64],
    ) -> ResultsResult<()> {
        let path = self.series_path(problem, category, key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let record = ResultRecord {
            timestamp,
            values: data.to_vec(),
        };
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }
}

/// In-memory store, used by tests and dry runs.
#[derive(Clone, Debug, Default)]
pub struct InMemoryResultStore {
    records: BTreeMap<(String, ArtifactKind, String), Vec<ResultRecord>>,
}

impl InMemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self, problem: &str, category: ArtifactKind, key: &str) -> &[ResultRecord] {
        self.records
            .get(&(problem.to_string(), category, key.to_string()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Total number of records across all keys.
    pub fn len(&self) -> usize {
        self.records.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keys(&self) -> impl Iterator<Item = &(String, ArtifactKind, String)> {
        self.records.keys()
    }
}

impl ResultStore for InMemoryResultStore {
    fn write(
        &mut self,
        problem: &str,
        category: ArtifactKind,
        key: &str,
        timestamp: DateTime<Utc>,
        data: &[f64],
    ) -> ResultsResult<()> {
        self.records
            .entry((problem.to_string(), category, key.to_string()))
            .or_default()
            .push(ResultRecord {
                timestamp,
                values: data.to_vec(),
            });
        Ok(())
    }
}
