use crate::analysis::check_generalization;
use crate::analysis::generalization::DEFAULT_METRIC;
use crate::tools::parse_args;
use crate::traits::{Tool, ToolError, TrackingStore};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CheckGeneralizationArgs {
    pub experiment_name: String,
    #[serde(default = "default_metric")]
    pub metric: String,
    #[serde(default)]
    pub threshold: Option<f64>,
}

fn default_metric() -> String {
    DEFAULT_METRIC.to_string()
}

pub struct CheckGeneralizationTool {
    store: Arc<dyn TrackingStore>,
}

impl CheckGeneralizationTool {
    pub fn new(store: Arc<dyn TrackingStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for CheckGeneralizationTool {
    fn name(&self) -> &str {
        "check_experiment_generalization"
    }

    fn description(&self) -> &str {
        "Check if any runs in an experiment failed to generalize (test metric much worse than train metric). \
         Compares train_<metric> with test_<metric> and assumes lower values are better, so use it with loss-like metrics."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "experiment_name": {
                    "type": "string",
                    "description": "Name of the experiment to check."
                },
                "metric": {
                    "type": "string",
                    "description": "Metric to compare between train and test (default: loss)."
                },
                "threshold": {
                    "type": "number",
                    "description": "Flag runs whose test value exceeds train by more than this. Without it, runs with test > 1.2 * train are flagged."
                }
            },
            "required": ["experiment_name"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, args: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let args: CheckGeneralizationArgs = parse_args(self.name(), args)?;

        let report = check_generalization(
            self.store.as_ref(),
            &args.experiment_name,
            &args.metric,
            args.threshold,
        )
        .await
        .map_err(|e| ToolError::execution(self.name(), e))?;
        Ok(serde_json::Value::String(report.to_string()))
    }
}
