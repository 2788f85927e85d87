pub mod factory;
pub mod file_store;
pub mod model;
pub mod rest_store;

pub use factory::create_store;
pub use file_store::FileStore;
pub use model::{
    DEFAULT_MAX_RESULTS, Experiment, MetricOrder, Run, RunData, RunInfo, RunQuery, RunStatus,
    SortDirection, sort_runs,
};
pub use rest_store::RestStore;

#[cfg(test)]
pub(crate) mod testing;
