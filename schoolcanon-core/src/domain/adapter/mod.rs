// schoolcanon-core/src/domain/adapter/mod.rs

pub mod crosswalk;
pub mod derived;
pub mod engine;
pub mod kinds;

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::domain::harmonize::UnmappedLabel;
use crate::domain::normalize::PercentScale;
use crate::domain::schema::{CanonicalRecord, DatasetKind};
use crate::domain::vintage::{
    AcademicYearRule, AdapterKind, AuxiliaryField, ColumnRule, DerivedField, PopulationScope,
};

pub use crosswalk::Crosswalk;
pub use engine::{adapt, adapt_with};

/// Per-kind conventions of a source family. The generic engine does the
/// work; a strategy only supplies the defaults a descriptor may override.
pub trait SchemaAdapter: Send + Sync {
    fn kind(&self) -> AdapterKind;

    /// Maps the family's published names onto canonical ones. Applied to
    /// the output of the descriptor's own `column_map`.
    fn builtin_rules(&self) -> Vec<ColumnRule>;

    fn academic_year(&self) -> AcademicYearRule;

    fn derived(&self) -> Vec<DerivedField>;

    fn percent_scale(&self) -> PercentScale {
        PercentScale::Auto
    }

    fn auxiliary(&self) -> Vec<AuxiliaryField> {
        Vec::new()
    }

    fn has_rollup(&self) -> bool {
        true
    }

    fn normalize_header(&self, header: &str) -> String {
        normalize_header(header)
    }
}

pub fn strategy(kind: AdapterKind) -> &'static dyn SchemaAdapter {
    match kind {
        AdapterKind::Demographics => &kinds::DemographicsAdapter,
        AdapterKind::LegacyDemographics => &kinds::LegacyDemographicsAdapter,
        AdapterKind::DistrictExam => &kinds::DistrictExamAdapter,
        AdapterKind::CharterExam => &kinds::CharterExamAdapter,
        AdapterKind::StateExam => &kinds::StateExamAdapter,
        AdapterKind::Regents => &kinds::RegentsAdapter,
    }
}

/// Lower-cases, joins words with `_`, turns `# x` into `x` and `% x` into `x_1`.
pub fn normalize_header(header: &str) -> String {
    let lowered = header.trim().trim_start_matches('\u{feff}').to_lowercase();
    let (body, suffix) = if let Some(rest) = lowered.strip_prefix('%') {
        (rest.trim_start(), "_1")
    } else if let Some(rest) = lowered.strip_prefix('#') {
        (rest.trim_start(), "")
    } else {
        (lowered.as_str(), "")
    };
    let joined = body.split_whitespace().collect::<Vec<_>>().join("_");
    format!("{}{}", joined, suffix)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuarantineCause {
    Normalization {
        field: String,
        raw: String,
        message: String,
    },
    MissingIdentifier { field: String },
    AcademicYear { column: String, raw: String },
    InvariantViolation { detail: String },
}

impl fmt::Display for QuarantineCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normalization { field, message, .. } => write!(f, "{}: {}", field, message),
            Self::MissingIdentifier { field } => write!(f, "{} is empty", field),
            Self::AcademicYear { column, raw } => {
                write!(f, "academic year '{}' in {} is unreadable", raw, column)
            }
            Self::InvariantViolation { detail } => write!(f, "invariant violated: {}", detail),
        }
    }
}

/// A row excluded from the canonical output, with the evidence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuarantinedRow {
    pub vintage_id: String,
    pub line: usize,
    pub key: Option<String>,
    pub cause: QuarantineCause,
    pub raw: BTreeMap<String, String>,
}

/// Output of one adapter invocation.
#[derive(Debug, Clone)]
pub struct AdaptedBatch {
    pub vintage_id: String,
    pub dataset: DatasetKind,
    pub precedence: u32,
    pub scope: PopulationScope,
    pub has_rollup: bool,
    pub rows: Vec<CanonicalRecord>,
    pub quarantine: Vec<QuarantinedRow>,
    /// Rows dropped by the year range, scope or crosswalk filters.
    pub filtered: usize,
    /// Cells resolved to a default, per canonical field.
    pub degraded: BTreeMap<String, u64>,
    pub unmapped: Vec<UnmappedLabel>,
}

impl AdaptedBatch {
    pub fn empty(
        vintage_id: &str,
        dataset: DatasetKind,
        precedence: u32,
        scope: PopulationScope,
    ) -> Self {
        Self {
            vintage_id: vintage_id.to_string(),
            dataset,
            precedence,
            scope,
            has_rollup: true,
            rows: Vec::new(),
            quarantine: Vec::new(),
            filtered: 0,
            degraded: BTreeMap::new(),
            unmapped: Vec::new(),
        }
    }
}
