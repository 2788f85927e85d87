use crate::tracking::{Experiment, Run, RunData, RunInfo, RunQuery, RunStatus, sort_runs};
use crate::traits::{StoreError, StoreResult, TrackingStore};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

const META_FILE: &str = "meta.yaml";
const DELETED_STAGE: &str = "deleted";
const RUN_NAME_TAG: &str = "mlflow.runName";
const NOTE_TAG: &str = "mlflow.note.content";

/// Scalar that MLflow may write either quoted or bare depending on version.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Scalar {
    Int(i64),
    Float(f64),
    Str(String),
}

impl Scalar {
    fn into_string(self) -> String {
        match self {
            Self::Int(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Str(s) => s,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ExperimentMeta {
    experiment_id: Scalar,
    name: String,
    #[serde(default)]
    lifecycle_stage: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RunMeta {
    #[serde(default)]
    run_id: Option<String>,
    #[serde(default)]
    run_uuid: Option<String>,
    #[serde(default)]
    run_name: Option<String>,
    experiment_id: Scalar,
    #[serde(default)]
    status: Option<Scalar>,
    #[serde(default)]
    start_time: Option<i64>,
    #[serde(default)]
    end_time: Option<i64>,
    #[serde(default)]
    lifecycle_stage: Option<String>,
}

/// Reads an MLflow `mlruns` directory in place.
pub struct FileStore {
    root: PathBuf,
    location: String,
}

impl FileStore {
    pub fn new(uri: impl AsRef<str>) -> Self {
        let uri = uri.as_ref();
        let path = uri.strip_prefix("file://").unwrap_or(uri);
        Self {
            root: PathBuf::from(path),
            location: uri.to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn experiment_dirs(&self) -> StoreResult<Vec<PathBuf>> {
        let entries = fs::read_dir(&self.root).map_err(|source| StoreError::Io {
            path: self.root.clone(),
            source,
        })?;

        let mut dirs: Vec<PathBuf> = entries
            .flatten()
            .filter(|e| !e.file_name().to_string_lossy().starts_with('.'))
            .map(|e| e.path())
            .filter(|p| p.join(META_FILE).is_file())
            .collect();
        dirs.sort();
        Ok(dirs)
    }

    fn read_experiment(&self, dir: &Path) -> StoreResult<Option<Experiment>> {
        let meta: ExperimentMeta = read_yaml(&dir.join(META_FILE))?;
        if meta.lifecycle_stage.as_deref() == Some(DELETED_STAGE) {
            return Ok(None);
        }

        let description = read_tag(dir, NOTE_TAG);
        Ok(Some(Experiment {
            experiment_id: meta.experiment_id.into_string(),
            name: meta.name,
            description,
        }))
    }

    fn runs_of(&self, experiment_id: &str) -> StoreResult<Vec<Run>> {
        if !is_plain_name(experiment_id) {
            return Ok(vec![]);
        }

        let dir = self.root.join(experiment_id);
        if !dir.join(META_FILE).is_file() {
            debug!(experiment_id, "no such experiment in file store");
            return Ok(vec![]);
        }
        match self.read_experiment(&dir) {
            Ok(Some(_)) => {}
            Ok(None) => return Ok(vec![]),
            Err(e) => {
                warn!("Skipping unreadable experiment at {}: {}", dir.display(), e);
                return Ok(vec![]);
            }
        }

        let entries = fs::read_dir(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;

        let mut runs = vec![];
        for entry in entries.flatten() {
            let run_dir = entry.path();
            if !run_dir.join(META_FILE).is_file() {
                continue;
            }
            match read_run(&run_dir) {
                Ok(Some(run)) => runs.push(run),
                Ok(None) => {}
                Err(e) => warn!("Skipping unreadable run at {}: {}", run_dir.display(), e),
            }
        }
        Ok(runs)
    }
}

#[async_trait]
impl TrackingStore for FileStore {
    fn name(&self) -> &str {
        "file"
    }

    fn location(&self) -> &str {
        &self.location
    }

    async fn list_experiments(&self) -> StoreResult<Vec<Experiment>> {
        let mut experiments = vec![];
        for dir in self.experiment_dirs()? {
            match self.read_experiment(&dir) {
                Ok(Some(experiment)) => experiments.push(experiment),
                Ok(None) => {}
                Err(e) => warn!("Skipping unreadable experiment at {}: {}", dir.display(), e),
            }
        }
        Ok(experiments)
    }

    async fn search_runs(&self, query: &RunQuery) -> StoreResult<Vec<Run>> {
        let experiment_ids: BTreeSet<&String> = query.experiment_ids.iter().collect();
        let mut runs = vec![];
        for experiment_id in experiment_ids {
            runs.extend(self.runs_of(experiment_id)?);
        }

        sort_runs(&mut runs, query.order_by.as_ref());
        runs.truncate(query.max_results);
        Ok(runs)
    }

    async fn get_run(&self, run_id: &str) -> StoreResult<Run> {
        if !is_plain_name(run_id) {
            return Err(StoreError::RunNotFound(run_id.to_string()));
        }

        for dir in self.experiment_dirs()? {
            let run_dir = dir.join(run_id);
            if run_dir.join(META_FILE).is_file()
                && let Some(run) = read_run(&run_dir)?
            {
                return Ok(run);
            }
        }
        Err(StoreError::RunNotFound(run_id.to_string()))
    }
}

fn read_run(run_dir: &Path) -> StoreResult<Option<Run>> {
    let meta: RunMeta = read_yaml(&run_dir.join(META_FILE))?;
    if meta.lifecycle_stage.as_deref() == Some(DELETED_STAGE) {
        return Ok(None);
    }

    let run_id = meta
        .run_id
        .or(meta.run_uuid)
        .or_else(|| {
            run_dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
        })
        .unwrap_or_default();

    let status = meta.status.and_then(|s| match s {
        Scalar::Int(code) => RunStatus::from_code(code),
        Scalar::Str(name) => name.parse().ok(),
        Scalar::Float(_) => None,
    });

    let run_name = meta
        .run_name
        .filter(|n| !n.is_empty())
        .or_else(|| read_tag(run_dir, RUN_NAME_TAG));

    let metrics = read_entries(&run_dir.join("metrics"))?
        .into_iter()
        .filter_map(|(name, content)| latest_metric_value(&content).map(|v| (name, v)))
        .collect();
    let params = read_entries(&run_dir.join("params"))?.into_iter().collect();

    Ok(Some(Run {
        info: RunInfo {
            run_id,
            run_name,
            experiment_id: meta.experiment_id.into_string(),
            status,
            start_time: meta.start_time,
            end_time: meta.end_time,
        },
        data: RunData { metrics, params },
    }))
}

/// Reads every file under `dir` keyed by its `/`-joined relative path, so
/// nested names like `val/loss` come back whole.
fn read_entries(dir: &Path) -> StoreResult<BTreeMap<String, String>> {
    let mut entries = BTreeMap::new();
    if !dir.is_dir() {
        return Ok(entries);
    }

    for entry in WalkDir::new(dir).min_depth(1) {
        let entry = entry.map_err(|e| StoreError::Malformed {
            path: dir.to_path_buf(),
            message: e.to_string(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let Ok(relative) = entry.path().strip_prefix(dir) else {
            continue;
        };
        let key = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let content = fs::read_to_string(entry.path()).map_err(|source| StoreError::Io {
            path: entry.path().to_path_buf(),
            source,
        })?;
        entries.insert(key, content);
    }
    Ok(entries)
}

fn read_tag(dir: &Path, tag: &str) -> Option<String> {
    fs::read_to_string(dir.join("tags").join(tag))
        .ok()
        .filter(|v| !v.trim().is_empty())
}

fn read_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> StoreResult<T> {
    let content = fs::read_to_string(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&content).map_err(|e| StoreError::Malformed {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Metric files hold `timestamp value step` lines. The latest value is the
/// one with the greatest step, then the greatest timestamp; later lines win ties.
fn latest_metric_value(content: &str) -> Option<f64> {
    content
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let timestamp: i64 = parts.next()?.parse().ok()?;
            let value: f64 = parts.next()?.parse().ok()?;
            let step: i64 = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
            Some(((step, timestamp), value))
        })
        .max_by(|a, b| a.0.cmp(&b.0))
        .map(|(_, value)| value)
}

fn is_plain_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
}
