use crate::tracking::{Experiment, Run, RunQuery};
use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Run '{0}' not found")]
    RunNotFound(String),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed tracking data in {path}: {message}")]
    Malformed { path: PathBuf, message: String },

    #[error("Tracking server error {code}: {message}")]
    Api { code: String, message: String },

    #[error("Tracking server returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Read-only view of an experiment-tracking backend.
#[async_trait]
pub trait TrackingStore: Send + Sync {
    fn name(&self) -> &str;

    /// The path or URI this store reads from.
    fn location(&self) -> &str;

    async fn list_experiments(&self) -> StoreResult<Vec<Experiment>>;

    /// Runs of the requested experiments, ordered by `query.order_by` when set.
    /// Runs missing the ordering metric come last in either direction.
    async fn search_runs(&self, query: &RunQuery) -> StoreResult<Vec<Run>>;

    async fn get_run(&self, run_id: &str) -> StoreResult<Run>;
}
