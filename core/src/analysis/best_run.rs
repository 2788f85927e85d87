use crate::tracking::{MetricOrder, Run, RunQuery, SortDirection};
use crate::traits::{StoreResult, TrackingStore};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Max,
    Min,
}

impl Mode {
    pub fn direction(self) -> SortDirection {
        match self {
            Self::Max => SortDirection::Desc,
            Self::Min => SortDirection::Asc,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BestRun {
    pub run_id: String,
    pub run_name: Option<String>,
    pub metrics: BTreeMap<String, f64>,
    pub params: BTreeMap<String, String>,
}

impl From<Run> for BestRun {
    fn from(run: Run) -> Self {
        Self {
            run_id: run.info.run_id,
            run_name: run.info.run_name,
            metrics: run.data.metrics,
            params: run.data.params,
        }
    }
}

/// Returns the run with the highest (`Max`) or lowest (`Min`) value of
/// `metric` across the given experiments. Sorting is left to the store;
/// ties resolve in whatever order the store returns.
///
/// `None` when there are no experiments, no runs, or no run logged the metric.
pub async fn find_best_run(
    store: &dyn TrackingStore,
    experiment_ids: &[String],
    metric: &str,
    mode: Mode,
) -> StoreResult<Option<BestRun>> {
    if experiment_ids.is_empty() {
        return Ok(None);
    }

    let query = RunQuery::new(experiment_ids.to_vec())
        .order_by(MetricOrder::new(metric, mode.direction()))
        .max_results(1);
    let runs = store.search_runs(&query).await?;

    // Runs lacking the metric (or holding NaN) sort last, so a top run
    // without a usable value means none have one.
    Ok(runs
        .into_iter()
        .next()
        .filter(|run| run.metric(metric).is_some_and(|v| !v.is_nan()))
        .map(BestRun::from))
}
