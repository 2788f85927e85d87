use crate::tracking::{Experiment, Run, RunData, RunInfo, RunQuery, RunStatus, sort_runs};
use crate::traits::{StoreError, StoreResult, TrackingStore};
use async_trait::async_trait;

/// In-memory store backing unit tests of the layers above the backends.
#[derive(Default)]
pub struct StaticStore {
    pub experiments: Vec<Experiment>,
    pub runs: Vec<Run>,
}

impl StaticStore {
    pub fn with_experiment(mut self, id: &str, name: &str) -> Self {
        self.experiments.push(Experiment {
            experiment_id: id.into(),
            name: name.into(),
            description: None,
        });
        self
    }

    pub fn with_run(mut self, run: Run) -> Self {
        self.runs.push(run);
        self
    }
}

pub fn run(experiment_id: &str, run_id: &str, metrics: &[(&str, f64)]) -> Run {
    Run {
        info: RunInfo {
            run_id: run_id.into(),
            run_name: Some(format!("name-{run_id}")),
            experiment_id: experiment_id.into(),
            status: Some(RunStatus::Finished),
            start_time: Some(1_000),
            end_time: Some(2_000),
        },
        data: RunData {
            metrics: metrics.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            params: [("seed".to_string(), "42".to_string())].into_iter().collect(),
        },
    }
}

#[async_trait]
impl TrackingStore for StaticStore {
    fn name(&self) -> &str {
        "static"
    }

    fn location(&self) -> &str {
        "memory"
    }

    async fn list_experiments(&self) -> StoreResult<Vec<Experiment>> {
        Ok(self.experiments.clone())
    }

    async fn search_runs(&self, query: &RunQuery) -> StoreResult<Vec<Run>> {
        let mut runs: Vec<Run> = self
            .runs
            .iter()
            .filter(|r| query.experiment_ids.contains(&r.info.experiment_id))
            .cloned()
            .collect();
        sort_runs(&mut runs, query.order_by.as_ref());
        runs.truncate(query.max_results);
        Ok(runs)
    }

    async fn get_run(&self, run_id: &str) -> StoreResult<Run> {
        self.runs
            .iter()
            .find(|r| r.run_id() == run_id)
            .cloned()
            .ok_or_else(|| StoreError::RunNotFound(run_id.to_string()))
    }
}
