use crate::agent::ToolRegistry;
use crate::traits::{ToolError, TrackingStore};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

pub mod check_generalization;
pub mod find_best_run;
pub mod get_run_metrics;
pub mod get_run_params;
pub mod list_experiments;
pub mod list_runs;

pub use check_generalization::CheckGeneralizationTool;
pub use find_best_run::FindBestRunTool;
pub use get_run_metrics::GetRunMetricsTool;
pub use get_run_params::GetRunParamsTool;
pub use list_experiments::ListExperimentsTool;
pub use list_runs::ListRunsTool;

/// Deserializes a tool's argument object into its typed form. A missing
/// object is treated as `{}`.
pub fn parse_args<T: DeserializeOwned>(tool: &str, args: Value) -> Result<T, ToolError> {
    let args = if args.is_null() {
        Value::Object(Default::default())
    } else {
        args
    };
    serde_json::from_value(args).map_err(|e| ToolError::invalid(tool, e))
}

pub fn to_output<T: Serialize>(tool: &str, value: &T) -> Result<Value, ToolError> {
    serde_json::to_value(value).map_err(|e| ToolError::execution(tool, e))
}

pub fn register_tracking_tools(registry: &ToolRegistry, store: Arc<dyn TrackingStore>) {
    registry.register(Arc::new(ListExperimentsTool::new(store.clone())));
    registry.register(Arc::new(ListRunsTool::new(store.clone())));
    registry.register(Arc::new(GetRunMetricsTool::new(store.clone())));
    registry.register(Arc::new(GetRunParamsTool::new(store.clone())));
    registry.register(Arc::new(FindBestRunTool::new(store.clone())));
    registry.register(Arc::new(CheckGeneralizationTool::new(store)));
}
