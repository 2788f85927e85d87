use crate::tools::{parse_args, to_output};
use crate::traits::{Tool, ToolError, TrackingStore};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunIdArgs {
    pub run_id: String,
}

pub struct GetRunMetricsTool {
    store: Arc<dyn TrackingStore>,
}

impl GetRunMetricsTool {
    pub fn new(store: Arc<dyn TrackingStore>) -> Self {
        Self { store }
    }
}

pub(crate) fn run_id_schema(purpose: &str) -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "run_id": {
                "type": "string",
                "description": format!("ID of the run to get {purpose} for.")
            }
        },
        "required": ["run_id"],
        "additionalProperties": false
    })
}

#[async_trait]
impl Tool for GetRunMetricsTool {
    fn name(&self) -> &str {
        "get_run_metrics"
    }

    fn description(&self) -> &str {
        "Get all metrics for a given run_id."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        run_id_schema("metrics")
    }

    async fn execute(&self, args: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let args: RunIdArgs = parse_args(self.name(), args)?;

        let run = self
            .store
            .get_run(&args.run_id)
            .await
            .map_err(|e| ToolError::execution(self.name(), e))?;
        to_output(self.name(), &run.data.metrics)
    }
}
