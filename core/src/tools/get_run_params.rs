use crate::tools::get_run_metrics::{RunIdArgs, run_id_schema};
use crate::tools::{parse_args, to_output};
use crate::traits::{Tool, ToolError, TrackingStore};
use async_trait::async_trait;
use std::sync::Arc;

pub struct GetRunParamsTool {
    store: Arc<dyn TrackingStore>,
}

impl GetRunParamsTool {
    pub fn new(store: Arc<dyn TrackingStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for GetRunParamsTool {
    fn name(&self) -> &str {
        "get_run_params"
    }

    fn description(&self) -> &str {
        "Get all parameters for a given run_id."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        run_id_schema("parameters")
    }

    async fn execute(&self, args: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let args: RunIdArgs = parse_args(self.name(), args)?;

        let run = self
            .store
            .get_run(&args.run_id)
            .await
            .map_err(|e| ToolError::execution(self.name(), e))?;
        to_output(self.name(), &run.data.params)
    }
}
