// schoolcanon-core/src/domain/vintage/descriptor.rs

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use validator::{Validate, ValidationError};

use crate::domain::normalize::{PercentScale, SentinelRules};
use crate::domain::schema::DatasetKind;

/// Which adapter strategy transforms a vintage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterKind {
    Demographics,
    LegacyDemographics,
    DistrictExam,
    CharterExam,
    StateExam,
    Regents,
}

impl AdapterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Demographics => "demographics",
            Self::LegacyDemographics => "legacy_demographics",
            Self::DistrictExam => "district_exam",
            Self::CharterExam => "charter_exam",
            Self::StateExam => "state_exam",
            Self::Regents => "regents",
        }
    }

    pub fn dataset(&self) -> DatasetKind {
        match self {
            Self::Demographics | Self::LegacyDemographics => DatasetKind::Demographics,
            Self::DistrictExam | Self::CharterExam | Self::StateExam => DatasetKind::Exams,
            Self::Regents => DatasetKind::Regents,
        }
    }
}

impl fmt::Display for AdapterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Population a source covers. Distinct non-`all` scopes are disjoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PopulationScope {
    #[default]
    All,
    District,
    Charter,
    State,
}

impl PopulationScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::District => "district",
            Self::Charter => "charter",
            Self::State => "state",
        }
    }

    /// Whether two sources of these scopes may legitimately share keys.
    pub fn overlaps(&self, other: &PopulationScope) -> bool {
        *self == PopulationScope::All || *other == PopulationScope::All || self == other
    }
}

impl fmt::Display for PopulationScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Column rename rule. Rules are tried in order, first match wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnRule {
    Exact { from: String, to: String },
    Pattern { pattern: String, replace: String },
}

impl ColumnRule {
    pub fn exact(from: &str, to: &str) -> Self {
        Self::Exact {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub fn pattern(pattern: &str, replace: &str) -> Self {
        Self::Pattern {
            pattern: pattern.to_string(),
            replace: replace.to_string(),
        }
    }
}

/// How the academic year (fall calendar year) is read from a row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum AcademicYearRule {
    /// `"2016-17"` is 2016.
    Label { column: String },
    /// `20062007` is 2006.
    SchoolYearCode { column: String },
    /// Spring test year minus one. Accepts `2019` or `06/30/2019`.
    TestYear { column: String },
    Direct { column: String },
}

impl AcademicYearRule {
    pub fn column(&self) -> &str {
        match self {
            Self::Label { column }
            | Self::SchoolYearCode { column }
            | Self::TestYear { column }
            | Self::Direct { column } => column,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DerivedField {
    YearLabel,
    District,
    Boro,
    SchoolNum,
    CharterFromDistrict,
    CharterFromDbn,
    CharterConstant,
    SchoolType,
    GradeBands,
    GradeLevel,
    CleanName,
    ShortName,
    PovertyFromLunch,
    Level34Count,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuxiliaryKind {
    Percentage,
    Count,
}

/// Typed source column that feeds derivations but is not persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuxiliaryField {
    pub name: String,
    pub kind: AuxiliaryKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Csv,
    Xlsx,
}

impl SourceFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "csv" => Some(Self::Csv),
            "xlsx" | "xls" => Some(Self::Xlsx),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceSpec {
    /// Path relative to the data directory.
    pub path: Option<String>,
    pub format: Option<SourceFormat>,
    /// Workbook sheets to concatenate. Empty means the first sheet.
    #[serde(default)]
    pub sheets: Vec<String>,
}

fn default_crosswalk_from() -> String {
    "beds".to_string()
}

fn default_crosswalk_to() -> String {
    "dbn".to_string()
}

/// Table that maps a release's school identifier onto the DBN. Rows whose
/// identifier is not in the table are dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CrosswalkSpec {
    /// Path relative to the data directory.
    pub path: String,
    #[serde(default = "default_crosswalk_from")]
    pub from: String,
    #[serde(default = "default_crosswalk_to")]
    pub to: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRange {
    pub from: i64,
    pub to: i64,
}

impl YearRange {
    pub fn contains(&self, ay: i64) -> bool {
        (self.from..=self.to).contains(&ay)
    }
}

impl fmt::Display for YearRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.from == self.to {
            write!(f, "{}", self.from)
        } else {
            write!(f, "{}-{}", self.from, self.to)
        }
    }
}

/// Static description of one source release. Loaded once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct VintageDescriptor {
    #[validate(length(min = 1, message = "Vintage id cannot be empty"))]
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
    pub adapter: AdapterKind,
    #[validate(custom(function = "validate_year_range"))]
    pub year_range: YearRange,
    /// Higher wins when sources overlap.
    pub precedence: u32,
    #[serde(default)]
    #[validate(custom(function = "validate_column_rules"))]
    pub column_map: Vec<ColumnRule>,
    #[serde(default)]
    pub sentinel_rules: SentinelRules,
    /// Defaults to the adapter's convention.
    #[serde(default)]
    pub percent_scale: Option<PercentScale>,
    #[serde(default)]
    pub category_map: BTreeMap<String, String>,
    #[serde(default)]
    pub subject_map: BTreeMap<String, String>,
    #[serde(default)]
    pub population_scope: PopulationScope,
    /// Whether the release carries its own "All Grades" rows. Defaults to
    /// the adapter's convention.
    #[serde(default)]
    pub has_rollup: Option<bool>,
    #[serde(default)]
    pub academic_year: Option<AcademicYearRule>,
    #[serde(default)]
    pub auxiliary: Vec<AuxiliaryField>,
    #[serde(default)]
    pub derived: Option<Vec<DerivedField>>,
    /// Raw values injected for canonical fields the release does not carry.
    #[serde(default)]
    pub defaults: BTreeMap<String, String>,
    #[serde(default)]
    #[validate(custom(function = "validate_crosswalk"))]
    pub crosswalk: Option<CrosswalkSpec>,
    #[serde(default)]
    pub source: SourceSpec,
}

impl VintageDescriptor {
    pub fn dataset(&self) -> DatasetKind {
        self.adapter.dataset()
    }
}

fn validate_year_range(range: &YearRange) -> Result<(), ValidationError> {
    if range.from > range.to {
        let mut err = ValidationError::new("year_range");
        err.message = Some(format!("from {} is after to {}", range.from, range.to).into());
        return Err(err);
    }
    Ok(())
}

fn validate_crosswalk(spec: &CrosswalkSpec) -> Result<(), ValidationError> {
    if spec.path.is_empty() || spec.from.is_empty() || spec.to.is_empty() {
        return Err(ValidationError::new("empty_crosswalk"));
    }
    Ok(())
}

fn validate_column_rules(rules: &[ColumnRule]) -> Result<(), ValidationError> {
    for rule in rules {
        match rule {
            ColumnRule::Exact { from, to } if from.is_empty() || to.is_empty() => {
                return Err(ValidationError::new("empty_column_name"));
            }
            ColumnRule::Pattern { pattern, .. } if Regex::new(pattern).is_err() => {
                let mut err = ValidationError::new("invalid_pattern");
                err.message = Some(format!("'{}' does not compile", pattern).into());
                return Err(err);
            }
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const CHARTER_ELA: &str = r#"
id: charter_ela
adapter: charter_exam
year_range: { from: 2012, to: 2018 }
precedence: 10
population_scope: charter
column_map:
  - { from: year, to: test_year }
  - { pattern: "^level_(\\d)_1$", replace: "level_${1}_pct" }
academic_year: { rule: test_year, column: test_year }
defaults: { exam: ela }
source: { path: charter_ela.csv }
"#;

    #[test]
    fn test_descriptor_deserializes() -> anyhow::Result<()> {
        let d: VintageDescriptor = serde_yaml::from_str(CHARTER_ELA)?;
        assert_eq!(d.dataset(), DatasetKind::Exams);
        assert_eq!(d.population_scope, PopulationScope::Charter);
        assert_eq!(d.has_rollup, None);
        assert_eq!(d.column_map[0], ColumnRule::exact("year", "test_year"));
        assert!(matches!(d.column_map[1], ColumnRule::Pattern { .. }));
        assert_eq!(
            d.academic_year,
            Some(AcademicYearRule::TestYear {
                column: "test_year".into()
            })
        );
        assert_eq!(d.defaults.get("exam").map(String::as_str), Some("ela"));
        d.validate()?;
        Ok(())
    }

    #[test]
    fn test_validation_rejects_bad_descriptors() {
        let mut d: VintageDescriptor = serde_yaml::from_str(CHARTER_ELA).unwrap();
        d.year_range = YearRange { from: 2019, to: 2012 };
        assert!(d.validate().is_err());

        let mut d: VintageDescriptor = serde_yaml::from_str(CHARTER_ELA).unwrap();
        d.column_map.push(ColumnRule::pattern("(unclosed", "x"));
        assert!(d.validate().is_err());

        let mut d: VintageDescriptor = serde_yaml::from_str(CHARTER_ELA).unwrap();
        d.id.clear();
        assert!(d.validate().is_err());
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let yaml = format!("{}\nprecedense: 3\n", CHARTER_ELA);
        assert!(serde_yaml::from_str::<VintageDescriptor>(&yaml).is_err());
    }

    #[test]
    fn test_crosswalk_defaults_to_beds_and_dbn() -> anyhow::Result<()> {
        let yaml = format!("{}\ncrosswalk: {{ path: crosswalk/dbn_beds.csv }}\n", CHARTER_ELA);
        let d: VintageDescriptor = serde_yaml::from_str(&yaml)?;
        let cw = d.crosswalk.as_ref().unwrap();
        assert_eq!(cw.from, "beds");
        assert_eq!(cw.to, "dbn");
        d.validate()?;

        let yaml = format!("{}\ncrosswalk: {{ path: \"\" }}\n", CHARTER_ELA);
        let d: VintageDescriptor = serde_yaml::from_str(&yaml)?;
        assert!(d.validate().is_err());
        Ok(())
    }

    #[test]
    fn test_scope_overlap() {
        use PopulationScope::*;
        assert!(All.overlaps(&Charter));
        assert!(District.overlaps(&District));
        assert!(!District.overlaps(&Charter));
        assert!(!State.overlaps(&District));
    }
}
