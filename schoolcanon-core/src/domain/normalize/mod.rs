// schoolcanon-core/src/domain/normalize/mod.rs

pub mod normalizer;
pub mod sentinel;

use std::fmt;
use thiserror::Error;

pub use normalizer::{Degradation, PercentScale, Resolved, ValueNormalizer};
pub use sentinel::{RawScalar, SentinelGrammar, SentinelRules};

/// Failure to parse one cell. Caught at the row boundary and quarantined.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NormalizationError {
    #[error("unrecognized value '{raw}'")]
    Unrecognized { raw: String },

    #[error("percentage '{raw}' is outside [0, 100]")]
    PercentOutOfRange { raw: String },

    #[error("count '{raw}' is not a non-negative integer")]
    InvalidCount { raw: String },

    #[error("sentinel '{raw}' has no population to resolve against")]
    MissingPopulation { raw: String },

    #[error("score '{raw}' is not numeric")]
    InvalidScore { raw: String },

    #[error("integer '{raw}' is not a whole number")]
    InvalidInteger { raw: String },

    #[error("flag '{raw}' is not a yes/no value")]
    InvalidFlag { raw: String },
}

impl NormalizationError {
    /// The cell text that failed to parse.
    pub fn raw(&self) -> &str {
        match self {
            Self::Unrecognized { raw }
            | Self::PercentOutOfRange { raw }
            | Self::InvalidCount { raw }
            | Self::MissingPopulation { raw }
            | Self::InvalidScore { raw }
            | Self::InvalidInteger { raw }
            | Self::InvalidFlag { raw } => raw,
        }
    }
}

/// Source row a cell came from: 1-based data line plus the entity key when
/// the row carries one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowRef {
    pub line: usize,
    pub key: Option<String>,
}

impl fmt::Display for RowRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            Some(key) => write!(f, "line {} ({})", self.line, key),
            None => write!(f, "line {}", self.line),
        }
    }
}

/// A `NormalizationError` located in its row and field.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{row}, {field}: {source}")]
pub struct CellError {
    pub row: RowRef,
    pub field: String,
    #[source]
    pub source: NormalizationError,
}

impl CellError {
    pub fn raw(&self) -> &str {
        self.source.raw()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_error_names_row_field_and_value() {
        let err = CellError {
            row: RowRef {
                line: 2,
                key: Some("01M019".into()),
            },
            field: "female_n".into(),
            source: NormalizationError::InvalidCount {
                raw: "forty".into(),
            },
        };
        assert_eq!(err.raw(), "forty");
        assert_eq!(
            err.to_string(),
            "line 2 (01M019), female_n: count 'forty' is not a non-negative integer"
        );

        let keyless = RowRef { line: 7, key: None };
        assert_eq!(keyless.to_string(), "line 7");
    }
}
