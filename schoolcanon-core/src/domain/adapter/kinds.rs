// schoolcanon-core/src/domain/adapter/kinds.rs

use super::SchemaAdapter;
use crate::domain::normalize::PercentScale;
use crate::domain::vintage::{
    AcademicYearRule, AdapterKind, AuxiliaryField, AuxiliaryKind, ColumnRule, DerivedField,
};

/// (published stem, canonical stem): `stem` is the count, `stem_1` the share.
const DEMOGRAPHIC_STEMS: [(&str, &str); 16] = [
    ("female", "female"),
    ("male", "male"),
    ("neither_female_nor_male", "non_binary"),
    ("asian", "asian"),
    ("black", "black"),
    ("hispanic", "hispanic"),
    ("multi_racial", "multi_racial"),
    ("multi-racial", "multi_racial"),
    ("multiple_race_categories_not_represented", "multi_racial"),
    ("native_american", "native_american"),
    ("white", "white"),
    ("missing_race_ethnicity_data", "missing_race_ethnicity_data"),
    ("missing_race/ethnicity_data", "missing_race_ethnicity_data"),
    ("students_with_disabilities", "swd"),
    ("english_language_learners", "ell"),
    ("poverty", "poverty"),
];

fn test_year_rule() -> AcademicYearRule {
    AcademicYearRule::TestYear {
        column: "test_year".to_string(),
    }
}

// =============================================================================
//  DEMOGRAPHIC SNAPSHOTS (2013 onwards)
// =============================================================================

pub struct DemographicsAdapter;

impl SchemaAdapter for DemographicsAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::Demographics
    }

    fn builtin_rules(&self) -> Vec<ColumnRule> {
        let mut rules = vec![
            ColumnRule::exact("economic_need_index", "eni"),
            ColumnRule::exact("grade_3k_pk_half_day_full", "grade_pk"),
            ColumnRule::exact("grade_pk_half_day_full_day", "grade_pk"),
            ColumnRule::exact("grade_pk_(half_day_&_full_day)", "grade_pk"),
        ];
        for (stem, canonical) in DEMOGRAPHIC_STEMS {
            rules.push(ColumnRule::exact(stem, &format!("{}_n", canonical)));
            rules.push(ColumnRule::exact(
                &format!("{}_1", stem),
                &format!("{}_pct", canonical),
            ));
        }
        rules
    }

    fn academic_year(&self) -> AcademicYearRule {
        AcademicYearRule::Label {
            column: "year".to_string(),
        }
    }

    fn derived(&self) -> Vec<DerivedField> {
        vec![
            DerivedField::District,
            DerivedField::Boro,
            DerivedField::SchoolNum,
            DerivedField::CharterFromDistrict,
            DerivedField::SchoolType,
            DerivedField::GradeBands,
            DerivedField::GradeLevel,
            DerivedField::CleanName,
            DerivedField::ShortName,
        ]
    }
}

// =============================================================================
//  LEGACY DEMOGRAPHICS (2006 release)
// =============================================================================

pub struct LegacyDemographicsAdapter;

impl SchemaAdapter for LegacyDemographicsAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::LegacyDemographics
    }

    fn builtin_rules(&self) -> Vec<ColumnRule> {
        vec![
            ColumnRule::exact("name", "school_name"),
            ColumnRule::exact("prek", "grade_pk"),
            ColumnRule::exact("k", "grade_k"),
            ColumnRule::exact("sped_num", "swd_n"),
            ColumnRule::exact("sped_percent", "swd_pct"),
            ColumnRule::pattern(r"^grade_?(\d+)$", "grade_${1}"),
            ColumnRule::pattern(r"^(.+)_num$", "${1}_n"),
            ColumnRule::pattern(r"^(.+)_percent$", "${1}_pct"),
            ColumnRule::pattern(r"^(.+)_per$", "${1}_pct"),
        ]
    }

    fn academic_year(&self) -> AcademicYearRule {
        AcademicYearRule::SchoolYearCode {
            column: "schoolyear".to_string(),
        }
    }

    fn derived(&self) -> Vec<DerivedField> {
        vec![
            DerivedField::YearLabel,
            DerivedField::District,
            DerivedField::Boro,
            DerivedField::SchoolNum,
            DerivedField::CharterFromDistrict,
            DerivedField::SchoolType,
            DerivedField::GradeBands,
            DerivedField::GradeLevel,
            DerivedField::CleanName,
            DerivedField::ShortName,
            DerivedField::PovertyFromLunch,
        ]
    }

    fn percent_scale(&self) -> PercentScale {
        PercentScale::Hundred
    }

    fn auxiliary(&self) -> Vec<AuxiliaryField> {
        ["fl_pct", "frl_pct"]
            .into_iter()
            .map(|name| AuxiliaryField {
                name: name.to_string(),
                kind: AuxiliaryKind::Percentage,
            })
            .collect()
    }
}

// =============================================================================
//  DISTRICT EXAM WORKBOOKS
// =============================================================================

fn level_rules() -> Vec<ColumnRule> {
    vec![
        ColumnRule::exact("year", "test_year"),
        ColumnRule::exact("level_3+4", "level_3_4_n"),
        ColumnRule::exact("level_3+4_1", "level_3_4_pct"),
        ColumnRule::exact("level_3_4", "level_3_4_n"),
        ColumnRule::exact("level_3_4_1", "level_3_4_pct"),
        ColumnRule::pattern(r"^level_(\d)$", "level_${1}_n"),
        ColumnRule::pattern(r"^level_(\d)_1$", "level_${1}_pct"),
    ]
}

pub struct DistrictExamAdapter;

impl SchemaAdapter for DistrictExamAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::DistrictExam
    }

    fn builtin_rules(&self) -> Vec<ColumnRule> {
        level_rules()
    }

    fn academic_year(&self) -> AcademicYearRule {
        test_year_rule()
    }

    fn derived(&self) -> Vec<DerivedField> {
        vec![DerivedField::CharterFromDbn]
    }

    fn percent_scale(&self) -> PercentScale {
        PercentScale::Hundred
    }
}

// =============================================================================
//  CHARTER EXAM EXTRACTS
// =============================================================================

pub struct CharterExamAdapter;

impl SchemaAdapter for CharterExamAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::CharterExam
    }

    fn builtin_rules(&self) -> Vec<ColumnRule> {
        level_rules()
    }

    fn academic_year(&self) -> AcademicYearRule {
        test_year_rule()
    }

    fn derived(&self) -> Vec<DerivedField> {
        vec![DerivedField::CharterConstant]
    }

    fn percent_scale(&self) -> PercentScale {
        PercentScale::Hundred
    }
}

// =============================================================================
//  STATE RESEARCHER FILES
// =============================================================================

pub struct StateExamAdapter;

impl SchemaAdapter for StateExamAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::StateExam
    }

    fn builtin_rules(&self) -> Vec<ColumnRule> {
        vec![
            ColumnRule::exact("bedscode", "beds"),
            ColumnRule::exact("name", "school_name"),
            ColumnRule::exact("subgroup_name", "category"),
            ColumnRule::exact("item_subject_area", "exam"),
            ColumnRule::exact("item_desc", "grade"),
            ColumnRule::exact("sy_end_date", "test_year"),
            ColumnRule::exact("total_tested", "number_tested"),
            ColumnRule::exact("total_not_tested", "number_not_tested"),
            ColumnRule::exact("total_enrolled", "total_enrollment"),
            ColumnRule::exact("l3-l4_pct", "level_3_4_pct"),
            ColumnRule::pattern(r"^l(\d)_count$", "level_${1}_n"),
            ColumnRule::pattern(r"^l(\d)_pct$", "level_${1}_pct"),
        ]
    }

    fn academic_year(&self) -> AcademicYearRule {
        test_year_rule()
    }

    fn derived(&self) -> Vec<DerivedField> {
        vec![DerivedField::Level34Count, DerivedField::CharterFromDbn]
    }

    fn has_rollup(&self) -> bool {
        false
    }
}

// =============================================================================
//  REGENTS WORKBOOKS (high school exit exams)
// =============================================================================

pub struct RegentsAdapter;

impl SchemaAdapter for RegentsAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::Regents
    }

    fn builtin_rules(&self) -> Vec<ColumnRule> {
        vec![
            ColumnRule::exact("school_dbn", "dbn"),
            ColumnRule::exact("year", "test_year"),
            ColumnRule::exact("total_tested", "number_tested"),
            ColumnRule::exact("number_scoring_below_65", "below_65_n"),
            ColumnRule::exact("percent_scoring_below_65", "below_65_pct"),
            ColumnRule::exact("number_scoring_65_or_above", "above_64_n"),
            ColumnRule::exact("percent_scoring_65_or_above", "above_64_pct"),
            ColumnRule::exact("number_scoring_80_or_above", "above_79_n"),
            ColumnRule::exact("percent_scoring_80_or_above", "above_79_pct"),
            ColumnRule::exact("number_scoring_cr", "college_ready_n"),
            ColumnRule::exact("percent_scoring_cr", "college_ready_pct"),
        ]
    }

    fn academic_year(&self) -> AcademicYearRule {
        test_year_rule()
    }

    fn derived(&self) -> Vec<DerivedField> {
        vec![DerivedField::CharterFromDbn]
    }

    fn percent_scale(&self) -> PercentScale {
        PercentScale::Hundred
    }
}
