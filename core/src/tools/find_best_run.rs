use crate::analysis::{Mode, find_best_run};
use crate::tools::{parse_args, to_output};
use crate::traits::{Tool, ToolError, TrackingStore};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FindBestRunArgs {
    pub experiment_ids: Vec<String>,
    pub metric: String,
    #[serde(default)]
    pub mode: Mode,
}

pub struct FindBestRunTool {
    store: Arc<dyn TrackingStore>,
}

impl FindBestRunTool {
    pub fn new(store: Arc<dyn TrackingStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for FindBestRunTool {
    fn name(&self) -> &str {
        "find_best_run_by_metric"
    }

    fn description(&self) -> &str {
        "Find the best run for a metric in an experiment. Returns null when no run logged the metric."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "experiment_ids": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "IDs of the experiments to search in."
                },
                "metric": {
                    "type": "string",
                    "description": "Metric name to optimize."
                },
                "mode": {
                    "type": "string",
                    "enum": ["max", "min"],
                    "description": "Whether to maximize or minimize the metric (default: max)."
                }
            },
            "required": ["experiment_ids", "metric"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, args: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let args: FindBestRunArgs = parse_args(self.name(), args)?;

        let best = find_best_run(
            self.store.as_ref(),
            &args.experiment_ids,
            &args.metric,
            args.mode,
        )
        .await
        .map_err(|e| ToolError::execution(self.name(), e))?;
        to_output(self.name(), &best)
    }
}
