use crate::tracking::{Run, RunQuery};
use crate::traits::{StoreResult, TrackingStore};
use std::fmt;
use tracing::warn;

pub const DEFAULT_METRIC: &str = "loss";

/// Default rule: a run fails when its test value exceeds train by more than 20%.
pub const DEFAULT_RATIO: f64 = 1.2;

const MAX_RUNS: usize = 1000;

const HIGHER_IS_BETTER: &[&str] = &["acc", "accuracy", "f1", "precision", "recall", "auc"];

/// Both rules treat larger values as worse, which only holds for loss-like
/// metrics. For accuracy-like metrics the verdict is inverted.
pub fn fails_to_generalize(train: f64, test: f64, threshold: Option<f64>) -> bool {
    match threshold {
        Some(threshold) => test - train > threshold,
        None => test > train * DEFAULT_RATIO,
    }
}

pub fn looks_higher_is_better(metric: &str) -> bool {
    metric
        .to_ascii_lowercase()
        .split(['_', '-', '/', '.'])
        .any(|token| HIGHER_IS_BETTER.contains(&token))
}

#[derive(Debug, Clone, PartialEq)]
pub enum GeneralizationReport {
    ExperimentNotFound {
        experiment_name: String,
    },
    Checked {
        experiment_name: String,
        /// Runs that logged both `train_<metric>` and `test_<metric>`.
        evaluated: usize,
        failing: Vec<String>,
    },
}

impl GeneralizationReport {
    pub fn failing(&self) -> &[String] {
        match self {
            Self::ExperimentNotFound { .. } => &[],
            Self::Checked { failing, .. } => failing,
        }
    }
}

impl fmt::Display for GeneralizationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExperimentNotFound { experiment_name } => {
                write!(f, "Experiment '{experiment_name}' not found.")
            }
            Self::Checked {
                experiment_name,
                failing,
                ..
            } if !failing.is_empty() => {
                let ids: Vec<String> = failing.iter().map(|id| format!("'{id}'")).collect();
                write!(
                    f,
                    "Runs that failed to generalize in '{}': [{}]",
                    experiment_name,
                    ids.join(", ")
                )
            }
            Self::Checked {
                experiment_name, ..
            } => write!(f, "All runs in '{experiment_name}' generalized well."),
        }
    }
}

/// Splits runs into evaluated count and failing run ids. Runs missing either
/// side of the pair are left out.
pub fn evaluate_runs(runs: &[Run], metric: &str, threshold: Option<f64>) -> (usize, Vec<String>) {
    let train_key = format!("train_{metric}");
    let test_key = format!("test_{metric}");

    let mut evaluated = 0;
    let mut failing = vec![];
    for run in runs {
        let (Some(train), Some(test)) = (run.metric(&train_key), run.metric(&test_key)) else {
            continue;
        };
        evaluated += 1;
        if fails_to_generalize(train, test, threshold) {
            failing.push(run.info.run_id.clone());
        }
    }
    (evaluated, failing)
}

pub async fn check_generalization(
    store: &dyn TrackingStore,
    experiment_name: &str,
    metric: &str,
    threshold: Option<f64>,
) -> StoreResult<GeneralizationReport> {
    if looks_higher_is_better(metric) {
        warn!(
            metric,
            "generalization check assumes lower is better; results for this metric are inverted"
        );
    }

    let experiments = store.list_experiments().await?;
    let Some(experiment) = experiments.into_iter().find(|e| e.name == experiment_name) else {
        return Ok(GeneralizationReport::ExperimentNotFound {
            experiment_name: experiment_name.to_string(),
        });
    };

    let query = RunQuery::new(vec![experiment.experiment_id]).max_results(MAX_RUNS);
    let runs = store.search_runs(&query).await?;
    let (evaluated, failing) = evaluate_runs(&runs, metric, threshold);

    Ok(GeneralizationReport::Checked {
        experiment_name: experiment_name.to_string(),
        evaluated,
        failing,
    })
}
