// schoolcanon-core/src/domain/schema/canonical.rs

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

use super::record::{CanonicalRecord, EntityKey};
use super::value::CanonicalValue;

pub const SCHEMA_VERSION: u32 = 1;
pub const SOURCE_VINTAGE: &str = "source_vintage";

/// Which longitudinal dataset a vintage feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetKind {
    Demographics,
    Exams,
    Regents,
}

impl DatasetKind {
    pub const ALL: [DatasetKind; 3] = [Self::Demographics, Self::Exams, Self::Regents];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Demographics => "demographics",
            Self::Exams => "exams",
            Self::Regents => "regents",
        }
    }

    pub fn schema(&self) -> &'static CanonicalSchema {
        match self {
            Self::Demographics => &DEMOGRAPHICS,
            Self::Exams => &EXAMS,
            Self::Regents => &REGENTS,
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Non-empty identifier (DBN, Regents exam title).
    Identifier,
    /// Fall calendar year of the school year.
    AcademicYear,
    /// Nullable integer (district, test year...).
    Integer,
    /// The row's population size, bound of every `Count`.
    Population,
    /// Count bounded by the population field.
    Count,
    /// Count with no population bound (aggregation weights).
    UnboundedCount,
    /// Unit-interval share; `numerator` names the count it derives from.
    Percentage { numerator: Option<&'static str> },
    /// Nullable float.
    Score,
    Category,
    Subject,
    Grade,
    /// Nullable free text.
    Text,
    Flag,
}

impl FieldKind {
    pub fn accepts(&self, value: &CanonicalValue) -> bool {
        use CanonicalValue as V;
        match self {
            Self::Identifier => matches!(value, V::Text(s) if !s.is_empty()),
            Self::AcademicYear => matches!(value, V::Int(_)),
            Self::Integer => matches!(value, V::Int(_) | V::Null),
            Self::Population | Self::Count | Self::UnboundedCount => {
                matches!(value, V::Count(_))
            }
            Self::Percentage { .. } => matches!(value, V::Pct(_)),
            Self::Score => matches!(value, V::Float(_) | V::Null),
            Self::Category => matches!(value, V::Category(_)),
            Self::Subject => matches!(value, V::Subject(_)),
            Self::Grade => matches!(value, V::Grade(_)),
            Self::Text => matches!(value, V::Text(_) | V::Null),
            Self::Flag => matches!(value, V::Flag(_)),
        }
    }

    /// Value used when a vintage does not publish the field at all.
    /// `None` means the field is required.
    pub fn default_value(&self) -> Option<CanonicalValue> {
        match self {
            Self::Count | Self::UnboundedCount => Some(CanonicalValue::Count(0)),
            Self::Percentage { .. } => Some(CanonicalValue::Pct(0.0)),
            Self::Score | Self::Text | Self::Integer => Some(CanonicalValue::Null),
            Self::Flag => Some(CanonicalValue::Flag(false)),
            Self::Identifier
            | Self::AcademicYear
            | Self::Population
            | Self::Category
            | Self::Subject
            | Self::Grade => None,
        }
    }

    pub fn sql_type(&self) -> &'static str {
        match self {
            Self::Identifier | Self::Category | Self::Subject | Self::Grade | Self::Text => {
                "VARCHAR"
            }
            Self::AcademicYear | Self::Integer => "BIGINT",
            Self::Population | Self::Count | Self::UnboundedCount => "UBIGINT",
            Self::Percentage { .. } | Self::Score => "DOUBLE",
            Self::Flag => "BOOLEAN",
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
}

/// The fixed target column set of one dataset, in persisted order.
#[derive(Debug)]
pub struct CanonicalSchema {
    pub dataset: DatasetKind,
    pub version: u32,
    pub fields: Vec<FieldSpec>,
    pub key: &'static [&'static str],
    pub population: &'static str,
}

impl CanonicalSchema {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|f| f.name)
    }

    pub fn key_of(&self, record: &CanonicalRecord) -> EntityKey {
        EntityKey(
            self.key
                .iter()
                .map(|k| record.get(k).map(|v| v.render()).unwrap_or_default())
                .collect(),
        )
    }

    pub fn counts(&self) -> impl Iterator<Item = &FieldSpec> + '_ {
        self.fields
            .iter()
            .filter(|f| matches!(f.kind, FieldKind::Count | FieldKind::UnboundedCount))
    }

    pub fn percentages(&self) -> impl Iterator<Item = &FieldSpec> + '_ {
        self.fields
            .iter()
            .filter(|f| matches!(f.kind, FieldKind::Percentage { .. }))
    }

    /// Verifies the record exposes every canonical field with the right type.
    /// Returns the offending field and the reason.
    pub fn conforms(&self, record: &CanonicalRecord) -> Result<(), (String, String)> {
        for spec in &self.fields {
            match record.get(spec.name) {
                None => return Err((spec.name.to_string(), "is missing".to_string())),
                Some(v) if !spec.kind.accepts(v) => {
                    return Err((
                        spec.name.to_string(),
                        format!("has type {} (expected {:?})", v.type_name(), spec.kind),
                    ));
                }
                Some(_) => {}
            }
        }
        if let Some(extra) = record.names().find(|n| !self.contains(n)) {
            return Err((extra.to_string(), "is not canonical".to_string()));
        }
        Ok(())
    }

    /// Checks the row-level invariants: percentages in [0,1], counts within
    /// the population. Returns a description of the first violation.
    pub fn check_invariants(&self, record: &CanonicalRecord) -> Result<(), String> {
        for spec in self.percentages() {
            if let Some(p) = record.pct(spec.name)
                && !(0.0..=1.0).contains(&p)
            {
                return Err(format!("{} = {} is outside [0, 1]", spec.name, p));
            }
        }
        let population = record.count(self.population).unwrap_or(0);
        for spec in self.fields.iter().filter(|f| f.kind == FieldKind::Count) {
            if let Some(n) = record.count(spec.name)
                && n > population
            {
                return Err(format!(
                    "{} = {} exceeds {} = {}",
                    spec.name, n, self.population, population
                ));
            }
        }
        Ok(())
    }
}

// =============================================================================
//  SCHEMA DEFINITIONS
// =============================================================================

fn spec(name: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec { name, kind }
}

fn count_and_pct(fields: &mut Vec<FieldSpec>, count: &'static str, pct: &'static str) {
    fields.push(spec(count, FieldKind::Count));
    fields.push(spec(
        pct,
        FieldKind::Percentage {
            numerator: Some(count),
        },
    ));
}

pub const DEMOGRAPHIC_GROUPS: [(&str, &str); 13] = [
    ("female_n", "female_pct"),
    ("male_n", "male_pct"),
    ("non_binary_n", "non_binary_pct"),
    ("asian_n", "asian_pct"),
    ("black_n", "black_pct"),
    ("hispanic_n", "hispanic_pct"),
    ("multi_racial_n", "multi_racial_pct"),
    ("native_american_n", "native_american_pct"),
    ("white_n", "white_pct"),
    (
        "missing_race_ethnicity_data_n",
        "missing_race_ethnicity_data_pct",
    ),
    ("swd_n", "swd_pct"),
    ("ell_n", "ell_pct"),
    ("poverty_n", "poverty_pct"),
];

pub const GRADE_COLUMNS: [&str; 15] = [
    "grade_3k", "grade_pk", "grade_k", "grade_1", "grade_2", "grade_3", "grade_4", "grade_5",
    "grade_6", "grade_7", "grade_8", "grade_9", "grade_10", "grade_11", "grade_12",
];

pub const LEVELS: [(&str, &str); 5] = [
    ("level_1_n", "level_1_pct"),
    ("level_2_n", "level_2_pct"),
    ("level_3_n", "level_3_pct"),
    ("level_4_n", "level_4_pct"),
    ("level_3_4_n", "level_3_4_pct"),
];

pub static DEMOGRAPHICS: LazyLock<CanonicalSchema> = LazyLock::new(|| {
    let mut fields = vec![
        spec("dbn", FieldKind::Identifier),
        spec("ay", FieldKind::AcademicYear),
        spec("year", FieldKind::Text),
        spec("school_name", FieldKind::Text),
        spec("district", FieldKind::Integer),
        spec("boro", FieldKind::Text),
        spec("school_num", FieldKind::Integer),
        spec("charter", FieldKind::Flag),
        spec("school_type", FieldKind::Text),
        spec("grade_level", FieldKind::Text),
        spec("serves_pk", FieldKind::Flag),
        spec("serves_elementary", FieldKind::Flag),
        spec("serves_middle", FieldKind::Flag),
        spec("serves_hs", FieldKind::Flag),
        spec("total_enrollment", FieldKind::Population),
    ];
    for grade in GRADE_COLUMNS {
        fields.push(spec(grade, FieldKind::Count));
    }
    for (count, pct) in DEMOGRAPHIC_GROUPS {
        count_and_pct(&mut fields, count, pct);
    }
    fields.push(spec("eni", FieldKind::Percentage { numerator: None }));
    fields.push(spec("clean_name", FieldKind::Text));
    fields.push(spec("short_name", FieldKind::Text));
    fields.push(spec(SOURCE_VINTAGE, FieldKind::Text));

    CanonicalSchema {
        dataset: DatasetKind::Demographics,
        version: SCHEMA_VERSION,
        fields,
        key: &["dbn", "ay"],
        population: "total_enrollment",
    }
});

pub static EXAMS: LazyLock<CanonicalSchema> = LazyLock::new(|| {
    let mut fields = vec![
        spec("dbn", FieldKind::Identifier),
        spec("beds", FieldKind::Text),
        spec("ay", FieldKind::AcademicYear),
        spec("test_year", FieldKind::Integer),
        spec("exam", FieldKind::Subject),
        spec("grade", FieldKind::Grade),
        spec("category", FieldKind::Category),
        spec("charter", FieldKind::Flag),
        spec("number_tested", FieldKind::Population),
        spec("number_not_tested", FieldKind::UnboundedCount),
        spec("total_enrollment", FieldKind::UnboundedCount),
        spec("mean_scale_score", FieldKind::Score),
    ];
    for (count, pct) in LEVELS {
        count_and_pct(&mut fields, count, pct);
    }
    fields.push(spec(SOURCE_VINTAGE, FieldKind::Text));

    CanonicalSchema {
        dataset: DatasetKind::Exams,
        version: SCHEMA_VERSION,
        fields,
        key: &["dbn", "ay", "exam", "grade", "category"],
        population: "number_tested",
    }
});

pub const REGENTS_BANDS: [(&str, &str); 4] = [
    ("below_65_n", "below_65_pct"),
    ("above_64_n", "above_64_pct"),
    ("above_79_n", "above_79_pct"),
    ("college_ready_n", "college_ready_pct"),
];

pub static REGENTS: LazyLock<CanonicalSchema> = LazyLock::new(|| {
    let mut fields = vec![
        spec("dbn", FieldKind::Identifier),
        spec("ay", FieldKind::AcademicYear),
        spec("test_year", FieldKind::Integer),
        spec("regents_exam", FieldKind::Identifier),
        spec("category", FieldKind::Category),
        spec("charter", FieldKind::Flag),
        spec("school_type", FieldKind::Text),
        spec("school_level", FieldKind::Text),
        spec("number_tested", FieldKind::Population),
        spec("mean_score", FieldKind::Score),
    ];
    for (count, pct) in REGENTS_BANDS {
        count_and_pct(&mut fields, count, pct);
    }
    fields.push(spec(SOURCE_VINTAGE, FieldKind::Text));

    CanonicalSchema {
        dataset: DatasetKind::Regents,
        version: SCHEMA_VERSION,
        fields,
        key: &["dbn", "ay", "regents_exam", "category"],
        population: "number_tested",
    }
});
