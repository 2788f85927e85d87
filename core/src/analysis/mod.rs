//! Derived views over tracking data: best-run selection and
//! train/test generalization checks.

pub mod best_run;
pub mod generalization;

pub use best_run::{BestRun, Mode, find_best_run};
pub use generalization::{GeneralizationReport, check_generalization, fails_to_generalize};
