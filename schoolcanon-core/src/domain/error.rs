// schoolcanon-core/src/domain/error.rs

use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic, Clone, PartialEq)]
pub enum DomainError {
    #[error("Schema violation in vintage '{vintage}': field '{field}' {reason}")]
    #[diagnostic(
        code(schoolcanon::domain::schema_violation),
        help("The vintage descriptor does not produce this canonical field. Check its column_map, derived fields and defaults.")
    )]
    SchemaViolation {
        vintage: String,
        field: String,
        reason: String,
    },

    #[error("Merge conflict on key {key}: {reason}")]
    #[diagnostic(
        code(schoolcanon::domain::merge_conflict),
        help("A source emitted the same entity key twice, or two disjoint population scopes overlap.")
    )]
    MergeConflict { key: String, reason: String },

    #[error("Vintage '{0}' is not registered")]
    #[diagnostic(code(schoolcanon::domain::unknown_vintage))]
    UnknownVintage(String),

    #[error("Vintage registry error: {0}")]
    #[diagnostic(
        code(schoolcanon::domain::registry),
        help("Check the vintage catalog YAML (ids, year ranges, regex rules).")
    )]
    Registry(String),

    #[error("Crosswalk '{path}' for vintage '{vintage}' {reason}")]
    #[diagnostic(
        code(schoolcanon::domain::crosswalk),
        help("The crosswalk must map each source identifier to exactly one DBN.")
    )]
    Crosswalk {
        vintage: String,
        path: String,
        reason: String,
    },

    #[error("Aggregate synthesis failed: {0}")]
    #[diagnostic(code(schoolcanon::domain::synthesis))]
    Synthesis(String),
}
