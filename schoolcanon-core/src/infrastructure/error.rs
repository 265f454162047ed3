// schoolcanon-core/src/infrastructure/error.rs

use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum DatabaseError {
    #[error("DuckDB Engine Error: {0}")]
    #[diagnostic(
        code(schoolcanon::infra::database::duckdb),
        help("An error occurred inside the SQL engine while reading CSV input or writing the dataset.")
    )]
    DuckDB(#[from] duckdb::Error),
}

#[derive(Error, Debug, Diagnostic)]
pub enum InfrastructureError {
    // --- DATABASE (Abstracted) ---
    #[error(transparent)]
    #[diagnostic(transparent)]
    Database(#[from] DatabaseError),

    // --- FILESYSTEM (IO) ---
    #[error("File System Error: {0}")]
    #[diagnostic(
        code(schoolcanon::infra::io),
        help("Check file permissions or path validity.")
    )]
    Io(#[from] std::io::Error),

    // --- CONFIG / YAML / JSON ---
    #[error("YAML Parsing Error: {0}")]
    #[diagnostic(
        code(schoolcanon::infra::yaml),
        help("Check your YAML syntax (indentation, types).")
    )]
    YamlError(#[from] serde_yaml::Error),

    #[error("JSON Error: {0}")]
    #[diagnostic(code(schoolcanon::infra::json))]
    JsonError(#[from] serde_json::Error),

    #[error("Configuration Error: {0}")]
    #[diagnostic(code(schoolcanon::infra::config))]
    ConfigError(String),

    #[error("Project configuration not found at '{0}'")]
    #[diagnostic(code(schoolcanon::infra::config_missing))]
    ConfigNotFound(String),

    // --- RAW INPUTS ---
    #[error("Spreadsheet Error: {0}")]
    #[diagnostic(
        code(schoolcanon::infra::spreadsheet),
        help("The workbook could not be opened or a listed sheet is missing.")
    )]
    Spreadsheet(#[from] calamine::Error),

    #[error("Cannot read source '{path}': {reason}")]
    #[diagnostic(code(schoolcanon::infra::source))]
    Source { path: String, reason: String },

    // --- TEMPLATING ---
    #[error("Template Rendering Error: {0}")]
    #[diagnostic(
        code(schoolcanon::infra::template),
        help("Check the Jinja syntax ({{ ... }}) of the catalog template.")
    )]
    TemplateError(#[from] minijinja::Error),
}

// Manual implementation for shortcuts (e.g. `?` operator on duckdb calls)
impl From<duckdb::Error> for InfrastructureError {
    fn from(err: duckdb::Error) -> Self {
        InfrastructureError::Database(DatabaseError::DuckDB(err))
    }
}
