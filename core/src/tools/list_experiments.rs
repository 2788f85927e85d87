use crate::tools::{parse_args, to_output};
use crate::traits::{Tool, ToolError, TrackingStore};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListExperimentsArgs {}

pub struct ListExperimentsTool {
    store: Arc<dyn TrackingStore>,
}

impl ListExperimentsTool {
    pub fn new(store: Arc<dyn TrackingStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for ListExperimentsTool {
    fn name(&self) -> &str {
        "list_experiments"
    }

    fn description(&self) -> &str {
        "List all MLflow experiments."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {},
            "additionalProperties": false
        })
    }

    async fn execute(&self, args: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let ListExperimentsArgs {} = parse_args(self.name(), args)?;

        let experiments = self
            .store
            .list_experiments()
            .await
            .map_err(|e| ToolError::execution(self.name(), e))?;
        to_output(self.name(), &experiments)
    }
}
