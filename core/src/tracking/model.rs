use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Experiment {
    pub experiment_id: String,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunStatus {
    Running,
    Scheduled,
    Finished,
    Failed,
    Killed,
}

impl RunStatus {
    /// Maps the integer codes the MLflow file store writes into `meta.yaml`.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::Running),
            2 => Some(Self::Scheduled),
            3 => Some(Self::Finished),
            4 => Some(Self::Failed),
            5 => Some(Self::Killed),
            _ => None,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Running => "RUNNING",
            Self::Scheduled => "SCHEDULED",
            Self::Finished => "FINISHED",
            Self::Failed => "FAILED",
            Self::Killed => "KILLED",
        };
        write!(f, "{s}")
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "RUNNING" => Ok(Self::Running),
            "SCHEDULED" => Ok(Self::Scheduled),
            "FINISHED" => Ok(Self::Finished),
            "FAILED" => Ok(Self::Failed),
            "KILLED" => Ok(Self::Killed),
            other => Err(format!("unknown run status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunInfo {
    pub run_id: String,
    pub run_name: Option<String>,
    pub experiment_id: String,
    pub status: Option<RunStatus>,
    /// Epoch milliseconds.
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RunData {
    /// Latest logged value per metric.
    pub metrics: BTreeMap<String, f64>,
    pub params: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Run {
    pub info: RunInfo,
    pub data: RunData,
}

impl Run {
    pub fn metric(&self, name: &str) -> Option<f64> {
        self.data.metrics.get(name).copied()
    }

    pub fn run_id(&self) -> &str {
        &self.info.run_id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricOrder {
    pub metric: String,
    pub direction: SortDirection,
}

impl MetricOrder {
    pub fn new(metric: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            metric: metric.into(),
            direction,
        }
    }

    /// `order_by` clause in MLflow search syntax, e.g. ``metrics.`val_loss` ASC``.
    pub fn to_clause(&self) -> String {
        format!("metrics.`{}` {}", self.metric, self.direction.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunQuery {
    pub experiment_ids: Vec<String>,
    pub order_by: Option<MetricOrder>,
    pub max_results: usize,
}

pub const DEFAULT_MAX_RESULTS: usize = 20;

impl RunQuery {
    pub fn new(experiment_ids: Vec<String>) -> Self {
        Self {
            experiment_ids,
            order_by: None,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }

    pub fn order_by(mut self, order: MetricOrder) -> Self {
        self.order_by = Some(order);
        self
    }

    pub fn max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }
}

/// Sorts runs the way an MLflow server does: by the ordering metric with
/// missing values last, then newest start time first, then run id.
pub fn sort_runs(runs: &mut [Run], order: Option<&MetricOrder>) {
    runs.sort_by(|a, b| {
        let by_metric = match order {
            Some(order) => compare_metric(
                a.metric(&order.metric),
                b.metric(&order.metric),
                order.direction,
            ),
            None => Ordering::Equal,
        };
        by_metric
            .then_with(|| b.info.start_time.cmp(&a.info.start_time))
            .then_with(|| a.info.run_id.cmp(&b.info.run_id))
    });
}

/// NaN sorts with missing values, last in either direction.
fn compare_metric(a: Option<f64>, b: Option<f64>, direction: SortDirection) -> Ordering {
    let a = a.filter(|v| !v.is_nan());
    let b = b.filter(|v| !v.is_nan());
    match (a, b) {
        (Some(x), Some(y)) => match direction {
            SortDirection::Asc => x.total_cmp(&y),
            SortDirection::Desc => y.total_cmp(&x),
        },
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
