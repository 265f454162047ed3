// schoolcanon-core/src/application/mod.rs

pub mod catalog;
pub mod clean;
pub mod pipeline;

// --- RE-EXPORTS (FACADE PATTERN) ---
// `use schoolcanon_core::application::{run_pipeline, clean_project, CatalogGenerator};`

pub use catalog::CatalogGenerator;
pub use clean::clean_project;
pub use pipeline::{RunResult, VintageStatus, load_run_results, run_pipeline};
