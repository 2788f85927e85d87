use crate::tools::{parse_args, to_output};
use crate::tracking::{DEFAULT_MAX_RESULTS, RunQuery, RunStatus};
use crate::traits::{Tool, ToolError, TrackingStore};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListRunsArgs {
    pub experiment_ids: Vec<String>,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

fn default_max_results() -> usize {
    DEFAULT_MAX_RESULTS
}

#[derive(Debug, Serialize)]
struct RunSummary {
    run_id: String,
    run_name: Option<String>,
    status: Option<RunStatus>,
    start_time: Option<i64>,
    end_time: Option<i64>,
}

pub struct ListRunsTool {
    store: Arc<dyn TrackingStore>,
}

impl ListRunsTool {
    pub fn new(store: Arc<dyn TrackingStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for ListRunsTool {
    fn name(&self) -> &str {
        "list_runs"
    }

    fn description(&self) -> &str {
        "List runs for a given experiment_id."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "experiment_ids": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "IDs of the experiments to list runs for."
                },
                "max_results": {
                    "type": "integer",
                    "minimum": 0,
                    "description": "Maximum number of runs to return (default: 20)."
                }
            },
            "required": ["experiment_ids"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, args: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let args: ListRunsArgs = parse_args(self.name(), args)?;

        let query = RunQuery::new(args.experiment_ids).max_results(args.max_results);
        let runs = self
            .store
            .search_runs(&query)
            .await
            .map_err(|e| ToolError::execution(self.name(), e))?;

        let summaries: Vec<RunSummary> = runs
            .into_iter()
            .map(|run| RunSummary {
                run_id: run.info.run_id,
                run_name: run.info.run_name,
                status: run.info.status,
                start_time: run.info.start_time,
                end_time: run.info.end_time,
            })
            .collect();
        to_output(self.name(), &summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::testing::{StaticStore, run};

    fn tool() -> ListRunsTool {
        let store = StaticStore::default()
            .with_run(run("1", "a", &[]))
            .with_run(run("1", "b", &[]))
            .with_run(run("2", "c", &[]));
        ListRunsTool::new(Arc::new(store))
    }

    #[tokio::test]
    async fn summarizes_runs_without_metrics() {
        let output = tool()
            .execute(json!({"experiment_ids": ["2"]}))
            .await
            .unwrap();
        assert_eq!(
            output,
            json!([{
                "run_id": "c",
                "run_name": "name-c",
                "status": "FINISHED",
                "start_time": 1000,
                "end_time": 2000
            }])
        );
    }

    #[tokio::test]
    async fn honors_max_results() {
        let output = tool()
            .execute(json!({"experiment_ids": ["1", "2"], "max_results": 2}))
            .await
            .unwrap();
        assert_eq!(output.as_array().unwrap().len(), 2);

        let output = tool()
            .execute(json!({"experiment_ids": ["1"], "max_results": 0}))
            .await
            .unwrap();
        assert_eq!(output, json!([]));
    }
}
