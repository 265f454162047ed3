// schoolcanon-core/src/infrastructure/config/mod.rs

pub mod project;

pub use project::{ExportFormat, ProjectConfig, load_project_config, load_registry};
