// schoolcanon-core/src/domain/adapter/engine.rs

use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;
use tracing::{debug, info, instrument, warn};

use super::derived;
use super::{AdaptedBatch, Crosswalk, QuarantineCause, QuarantinedRow};
use crate::domain::error::DomainError;
use crate::domain::harmonize::CategoryHarmonizer;
use crate::domain::normalize::{CellError, Degradation, NormalizationError, Resolved, RowRef};
use crate::domain::schema::{
    CanonicalRecord, CanonicalValue, ExamGrade, FieldKind, RawRecord, RawTable, SOURCE_VINTAGE,
};
use crate::domain::vintage::{AcademicYearRule, AuxiliaryKind, CompiledVintage, PopulationScope};

#[allow(clippy::expect_used)]
static FOUR_DIGIT_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4})").expect("static year regex"));

enum RowOutcome {
    Kept(CanonicalRecord),
    Filtered(&'static str),
    Quarantined(QuarantineCause),
}

/// Per-invocation state. Nothing here outlives one `adapt` call.
struct RowContext<'a> {
    vintage: &'a CompiledVintage,
    crosswalk: Option<&'a Crosswalk>,
    harmonizer: CategoryHarmonizer,
    degraded: BTreeMap<String, u64>,
}

/// Transforms one vintage's raw table into canonical rows plus quarantine.
///
/// Pure over `(vintage, table)`: no other vintage is consulted. Row-level
/// failures are quarantined; a structural defect (a required field with no
/// source, derivation or default) fails the whole vintage.
pub fn adapt(vintage: &CompiledVintage, table: RawTable) -> Result<AdaptedBatch, DomainError> {
    adapt_with(vintage, table, None)
}

/// [`adapt`] for releases keyed by a foreign identifier. Rows whose BEDS
/// code is absent from `crosswalk` are filtered; without one the BEDS code
/// stands in for the DBN.
#[instrument(skip(vintage, table, crosswalk), fields(vintage = %vintage.id(), rows = table.len()))]
pub fn adapt_with(
    vintage: &CompiledVintage,
    table: RawTable,
    crosswalk: Option<&Crosswalk>,
) -> Result<AdaptedBatch, DomainError> {
    let descriptor = &vintage.descriptor;
    let mut batch = AdaptedBatch::empty(
        vintage.id(),
        vintage.dataset(),
        descriptor.precedence,
        descriptor.population_scope,
    );
    batch.has_rollup = vintage.has_rollup;

    let table = rename_columns(vintage, table);
    let mut ctx = RowContext {
        vintage,
        crosswalk,
        harmonizer: CategoryHarmonizer::new(
            vintage.id(),
            &descriptor.category_map,
            &descriptor.subject_map,
        )?,
        degraded: BTreeMap::new(),
    };

    let mut filtered_by: BTreeMap<&'static str, usize> = BTreeMap::new();
    for raw in table.into_records(vintage.id()) {
        match ctx.adapt_row(&raw)? {
            RowOutcome::Kept(record) => batch.rows.push(record),
            RowOutcome::Filtered(reason) => *filtered_by.entry(reason).or_insert(0) += 1,
            RowOutcome::Quarantined(cause) => {
                debug!(line = raw.line, %cause, "Row quarantined");
                batch.quarantine.push(QuarantinedRow {
                    vintage_id: vintage.id().to_string(),
                    line: raw.line,
                    key: row_key(&raw),
                    cause,
                    raw: raw.fields,
                });
            }
        }
    }

    for (field, cells) in &ctx.degraded {
        warn!(
            vintage = %vintage.id(),
            field = %field,
            cells,
            "Missing or unreadable values resolved to defaults"
        );
    }
    for (reason, rows) in &filtered_by {
        debug!(vintage = %vintage.id(), reason, rows, "Rows filtered");
    }

    batch.filtered = filtered_by.values().sum();
    batch.unmapped = ctx.harmonizer.unmapped_labels();
    batch.degraded = ctx.degraded;
    info!(
        kept = batch.rows.len(),
        quarantined = batch.quarantine.len(),
        filtered = batch.filtered,
        "Vintage adapted"
    );
    Ok(batch)
}

/// Applies the header mapping. When two headers land on the same name the
/// first one is kept.
fn rename_columns(vintage: &CompiledVintage, table: RawTable) -> RawTable {
    let mut seen = BTreeSet::new();
    let mut keep = Vec::with_capacity(table.headers.len());
    let mut headers = Vec::with_capacity(table.headers.len());
    for header in &table.headers {
        let mapped = vintage.map_header(header);
        if seen.insert(mapped.clone()) {
            keep.push(true);
            headers.push(mapped);
        } else {
            debug!(vintage = %vintage.id(), header = %header, target = %mapped, "Duplicate column dropped");
            keep.push(false);
        }
    }
    let rows = table
        .rows
        .into_iter()
        .map(|row| {
            row.into_iter()
                .zip(&keep)
                .filter_map(|(cell, k)| k.then_some(cell))
                .collect()
        })
        .collect();
    RawTable { headers, rows }
}

/// School identifier of a raw row: the DBN, or the BEDS code for state files.
fn row_key(raw: &RawRecord) -> Option<String> {
    ["dbn", "beds"]
        .iter()
        .filter_map(|name| raw.get(name))
        .map(|id| id.trim())
        .find(|id| !id.is_empty())
        .map(str::to_string)
}

fn row_ref(raw: &RawRecord) -> RowRef {
    RowRef {
        line: raw.line,
        key: row_key(raw),
    }
}

fn parse_academic_year(rule: &AcademicYearRule, raw: &str) -> Option<(i64, Option<i64>)> {
    let raw = raw.trim();
    match rule {
        AcademicYearRule::Label { .. } => {
            let head = raw.split(['-', '/']).next()?.trim();
            let ay = head.parse::<i64>().ok()?;
            (head.len() == 4).then_some((ay, None))
        }
        AcademicYearRule::SchoolYearCode { .. } => {
            let code = raw.split('.').next()?.parse::<i64>().ok()?;
            (code >= 10_000_000).then_some((code / 10_000, None))
        }
        AcademicYearRule::TestYear { .. } => {
            let year = FOUR_DIGIT_YEAR
                .captures_iter(raw)
                .last()?
                .get(1)?
                .as_str()
                .parse::<i64>()
                .ok()?;
            Some((year - 1, Some(year)))
        }
        AcademicYearRule::Direct { .. } => {
            let ay = raw.split('.').next()?.parse::<i64>().ok()?;
            Some((ay, None))
        }
    }
}

impl RowContext<'_> {
    fn degrade<T>(&mut self, row: &RawRecord, field: &str, resolved: Resolved<T>) -> T {
        if let Some(why) = &resolved.degraded {
            *self.degraded.entry(field.to_string()).or_insert(0) += 1;
            if let Degradation::Unrecognized(raw) = why {
                debug!(row = %row_ref(row), field, raw = %raw, "Unrecognized value resolved to 0");
            }
        }
        resolved.value
    }

    fn adapt_row(&mut self, raw: &RawRecord) -> Result<RowOutcome, DomainError> {
        let vintage = self.vintage;
        let descriptor = &vintage.descriptor;
        let schema = vintage.schema();

        let cell = |name: &str| {
            raw.get(name)
                .or_else(|| descriptor.defaults.get(name).map(String::as_str))
        };
        let normalization = |field: &str, e: NormalizationError| {
            let err = CellError {
                row: row_ref(raw),
                field: field.to_string(),
                source: e,
            };
            debug!(vintage = %vintage.id(), error = %err, "Cell rejected");
            Ok(RowOutcome::Quarantined(QuarantineCause::Normalization {
                field: err.field,
                raw: err.source.raw().to_string(),
                message: err.source.to_string(),
            }))
        };

        let mut record = CanonicalRecord::new();

        // Academic year first: it decides whether the row is in range at all.
        let ay_column = vintage.academic_year.column();
        let ay_raw = cell(ay_column).unwrap_or_default();
        let Some((ay, test_year)) = parse_academic_year(&vintage.academic_year, ay_raw) else {
            return Ok(RowOutcome::Quarantined(QuarantineCause::AcademicYear {
                column: ay_column.to_string(),
                raw: ay_raw.to_string(),
            }));
        };
        if !descriptor.year_range.contains(ay) {
            return Ok(RowOutcome::Filtered("year_range"));
        }
        record.set("ay", CanonicalValue::Int(ay));
        if raw.get("dbn").is_none()
            && let Some(beds) = raw.get("beds").map(str::trim)
        {
            if beds.is_empty() {
                return Ok(RowOutcome::Quarantined(QuarantineCause::MissingIdentifier {
                    field: "beds".to_string(),
                }));
            }
            let dbn = match self.crosswalk {
                Some(crosswalk) => match crosswalk.lookup(beds) {
                    Some(dbn) => dbn,
                    None => return Ok(RowOutcome::Filtered("crosswalk")),
                },
                None => beds,
            };
            record.set("dbn", CanonicalValue::Text(dbn.to_string()));
        }
        if let Some(year) = test_year
            && schema.contains("test_year")
        {
            record.set("test_year", CanonicalValue::Int(year));
        }

        // Population next: counts and sentinels resolve against it.
        let population_field = schema.population;
        let Some(population_raw) = cell(population_field) else {
            return Err(self.schema_violation(population_field, "has no source column or default"));
        };
        let population = match vintage.normalizer.parse_count(population_raw, None) {
            Ok(resolved) => self.degrade(raw, population_field, resolved),
            Err(e) => return normalization(population_field, e),
        };
        record.set(population_field, CanonicalValue::Count(population));

        for spec in &schema.fields {
            if record.contains(spec.name) || spec.name == SOURCE_VINTAGE {
                continue;
            }
            let Some(value) = cell(spec.name) else {
                continue;
            };
            let n = &vintage.normalizer;
            let pop = Some(population);
            let typed = match spec.kind {
                FieldKind::Identifier => {
                    let id = value.trim();
                    if id.is_empty() {
                        return Ok(RowOutcome::Quarantined(QuarantineCause::MissingIdentifier {
                            field: spec.name.to_string(),
                        }));
                    }
                    CanonicalValue::Text(id.to_string())
                }
                FieldKind::Count | FieldKind::UnboundedCount | FieldKind::Population => {
                    match n.parse_count(value, pop) {
                        Ok(r) => CanonicalValue::Count(self.degrade(raw, spec.name, r)),
                        Err(e) => return normalization(spec.name, e),
                    }
                }
                FieldKind::Percentage { .. } => match n.parse_percentage(value, pop) {
                    Ok(r) => CanonicalValue::Pct(self.degrade(raw, spec.name, r)),
                    Err(e) => return normalization(spec.name, e),
                },
                FieldKind::Score => match n.parse_score(value) {
                    Ok(Some(s)) => CanonicalValue::Float(s),
                    Ok(None) => CanonicalValue::Null,
                    Err(e) => return normalization(spec.name, e),
                },
                FieldKind::Integer | FieldKind::AcademicYear => match n.parse_integer(value) {
                    Ok(Some(i)) => CanonicalValue::Int(i),
                    Ok(None) => CanonicalValue::Null,
                    Err(e) => return normalization(spec.name, e),
                },
                FieldKind::Flag => match n.parse_flag(value) {
                    Ok(b) => CanonicalValue::Flag(b),
                    Err(e) => return normalization(spec.name, e),
                },
                FieldKind::Text => {
                    let text = value.trim();
                    if text.is_empty() {
                        CanonicalValue::Null
                    } else {
                        CanonicalValue::Text(text.to_string())
                    }
                }
                FieldKind::Category => {
                    CanonicalValue::Category(self.harmonizer.map_category(value))
                }
                FieldKind::Subject => CanonicalValue::Subject(self.harmonizer.map_subject(value)),
                FieldKind::Grade => match ExamGrade::parse(value) {
                    Some(g) => CanonicalValue::Grade(g),
                    None => {
                        return Ok(RowOutcome::Quarantined(QuarantineCause::Normalization {
                            field: spec.name.to_string(),
                            raw: value.to_string(),
                            message: format!("grade '{}' is not 1-12 or All Grades", value),
                        }));
                    }
                },
            };
            record.set(spec.name, typed);
        }

        for aux in &vintage.auxiliary {
            let Some(value) = cell(aux.name.as_str()) else {
                continue;
            };
            let n = &vintage.normalizer;
            let typed = match aux.kind {
                AuxiliaryKind::Percentage => match n.parse_percentage(value, Some(population)) {
                    Ok(r) => CanonicalValue::Pct(self.degrade(raw, &aux.name, r)),
                    Err(e) => return normalization(&aux.name, e),
                },
                AuxiliaryKind::Count => match n.parse_count(value, Some(population)) {
                    Ok(r) => CanonicalValue::Count(self.degrade(raw, &aux.name, r)),
                    Err(e) => return normalization(&aux.name, e),
                },
            };
            record.set(aux.name.clone(), typed);
        }

        for field in &vintage.derived {
            derived::apply(*field, &mut record, descriptor.population_scope);
        }

        for aux in &vintage.auxiliary {
            record.remove(&aux.name);
        }
        for spec in &schema.fields {
            if record.contains(spec.name) || spec.name == SOURCE_VINTAGE {
                continue;
            }
            match spec.kind.default_value() {
                Some(default) => record.set(spec.name, default),
                None => {
                    return Err(self.schema_violation(
                        spec.name,
                        "has no source column, derivation or default",
                    ));
                }
            }
        }
        record.set(SOURCE_VINTAGE, CanonicalValue::Text(vintage.id().to_string()));

        let charter = record.flag("charter").unwrap_or(false);
        match descriptor.population_scope {
            PopulationScope::District if charter => return Ok(RowOutcome::Filtered("scope")),
            PopulationScope::Charter if !charter => return Ok(RowOutcome::Filtered("scope")),
            _ => {}
        }

        if let Err(detail) = schema.check_invariants(&record) {
            return Ok(RowOutcome::Quarantined(QuarantineCause::InvariantViolation {
                detail,
            }));
        }
        if let Err((field, reason)) = schema.conforms(&record) {
            return Err(self.schema_violation(&field, &reason));
        }
        Ok(RowOutcome::Kept(record))
    }

    fn schema_violation(&self, field: &str, reason: &str) -> DomainError {
        DomainError::SchemaViolation {
            vintage: self.vintage.id().to_string(),
            field: field.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::schema::{CanonicalCategory, ExamSubject};
    use crate::domain::vintage::VintageDescriptor;

    fn vintage(yaml: &str) -> CompiledVintage {
        let d: VintageDescriptor = serde_yaml::from_str(yaml).unwrap();
        CompiledVintage::try_compile(d).unwrap()
    }

    fn table(headers: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        }
    }

    const DEMO: &str = r#"
id: demo_2016
adapter: demographics
year_range: { from: 2016, to: 2016 }
precedence: 30
"#;

    #[test]
    fn test_demographic_row_with_sentinels() -> anyhow::Result<()> {
        let v = vintage(DEMO);
        let t = table(
            &["dbn", "school_name", "year", "total_enrollment", "grade_2", "poverty", "poverty_1", "economic_need_index"],
            &[&["01M015", "P.S. 015 Roberto Clemente", "2016-17", "500", "80", "Above 95%", "Above 95%", "0.891"]],
        );
        let batch = adapt(&v, t)?;
        assert_eq!(batch.rows.len(), 1);
        let row = &batch.rows[0];
        assert_eq!(row.pct("poverty_pct"), Some(0.96));
        assert_eq!(row.count("poverty_n"), Some(480));
        assert_eq!(row.pct("eni"), Some(0.891));
        assert_eq!(row.int("ay"), Some(2016));
        assert_eq!(row.int("district"), Some(1));
        assert_eq!(row.text("boro"), Some("Manhattan"));
        assert_eq!(row.text("school_type"), Some("community"));
        assert_eq!(row.text("short_name"), Some("PS 15"));
        assert_eq!(row.text("source_vintage"), Some("demo_2016"));
        // absent grades default to 0
        assert_eq!(row.count("grade_12"), Some(0));
        // full canonical column set
        assert!(v.schema().conforms(row).is_ok());
        Ok(())
    }

    #[test]
    fn test_rows_outside_year_range_are_filtered() -> anyhow::Result<()> {
        let v = vintage(DEMO);
        let t = table(
            &["dbn", "year", "total_enrollment"],
            &[&["01M015", "2015-16", "500"], &["01M015", "2016-17", "500"]],
        );
        let batch = adapt(&v, t)?;
        assert_eq!(batch.rows.len(), 1);
        assert_eq!(batch.filtered, 1);
        assert!(batch.quarantine.is_empty());
        Ok(())
    }

    #[test]
    fn test_bad_rows_are_quarantined_with_cause() -> anyhow::Result<()> {
        let v = vintage(DEMO);
        let t = table(
            &["dbn", "year", "total_enrollment", "female", "female_1"],
            &[
                &["01M015", "2016-17", "100", "40", "40%"],
                &["01M019", "2016-17", "100", "forty", "40%"],
                &["01M020", "2016-17", "100", "140", "40%"],
                &["", "2016-17", "100", "40", "40%"],
                &["01M021", "unknown", "100", "40", "40%"],
            ],
        );
        let batch = adapt(&v, t)?;
        assert_eq!(batch.rows.len(), 1);
        assert_eq!(batch.quarantine.len(), 4);
        assert!(matches!(
            batch.quarantine[0].cause,
            QuarantineCause::Normalization { ref field, ref raw, .. }
                if field == "female_n" && raw == "forty"
        ));
        assert!(matches!(
            batch.quarantine[1].cause,
            QuarantineCause::InvariantViolation { .. }
        ));
        assert!(matches!(
            batch.quarantine[2].cause,
            QuarantineCause::MissingIdentifier { .. }
        ));
        assert!(matches!(
            batch.quarantine[3].cause,
            QuarantineCause::AcademicYear { .. }
        ));
        assert_eq!(batch.quarantine[0].line, 2);
        assert_eq!(batch.quarantine[0].key.as_deref(), Some("01M019"));
        Ok(())
    }

    #[test]
    fn test_missing_population_fails_the_vintage() {
        let v = vintage(DEMO);
        let t = table(&["dbn", "year"], &[&["01M015", "2016-17"]]);
        assert!(matches!(
            adapt(&v, t),
            Err(DomainError::SchemaViolation { ref field, .. }) if field == "total_enrollment"
        ));
    }

    #[test]
    fn test_state_exam_row() -> anyhow::Result<()> {
        let v = vintage(
            r#"
id: state
adapter: state_exam
year_range: { from: 2014, to: 2022 }
precedence: 5
population_scope: state
category_map: { "Hispanic or Latino": Hispanic }
subject_map: { Mathematics: math }
"#,
        );
        let t = table(
            &["BEDSCODE", "ITEM_SUBJECT_AREA", "ITEM_DESC", "SUBGROUP_NAME", "SY_END_DATE", "TOTAL_TESTED", "TOTAL_ENROLLED", "L1_COUNT", "L1_PCT", "L2_COUNT", "L2_PCT", "L3_COUNT", "L3_PCT", "L4_COUNT", "L4_PCT", "L3-L4_PCT", "MEAN_SCALE_SCORE"],
            &[&["310200010001", "Mathematics", "Grade 3 Math", "Hispanic or Latino", "06/30/2019", "40", "42", "10", "25%", "10", "25%", "12", "30%", "8", "20%", "50%", "601"]],
        );
        let batch = adapt(&v, t)?;
        assert!(!batch.has_rollup);
        let row = &batch.rows[0];
        assert_eq!(row.int("ay"), Some(2018));
        assert_eq!(row.int("test_year"), Some(2019));
        assert_eq!(row.count("level_3_4_n"), Some(20));
        assert_eq!(row.pct("level_3_4_pct"), Some(0.5));
        assert_eq!(
            row.get("category"),
            Some(&CanonicalValue::Category(CanonicalCategory::Hispanic))
        );
        assert_eq!(
            row.get("exam"),
            Some(&CanonicalValue::Subject(ExamSubject::Math))
        );
        assert_eq!(row.get("grade"), Some(&CanonicalValue::Grade(ExamGrade::Grade(3))));
        assert_eq!(row.float("mean_scale_score"), Some(601.0));
        assert_eq!(row.flag("charter"), Some(false));
        // no crosswalk: the BEDS code stands in for the DBN
        assert_eq!(row.text("dbn"), Some("310200010001"));
        assert_eq!(row.text("beds"), Some("310200010001"));
        Ok(())
    }

    const STATE_ALL: &str = r#"
id: state
adapter: state_exam
year_range: { from: 2014, to: 2022 }
precedence: 5
subject_map: { Mathematics: math }
"#;

    fn state_table() -> RawTable {
        table(
            &["BEDSCODE", "ITEM_SUBJECT_AREA", "ITEM_DESC", "SUBGROUP_NAME", "SY_END_DATE", "TOTAL_TESTED", "TOTAL_NOT_TESTED", "TOTAL_ENROLLED"],
            &[
                &["310100010015", "Mathematics", "Grade 3 Math", "All Students", "06/30/2019", "40", "2", "42"],
                &["800000081568", "Mathematics", "Grade 3 Math", "All Students", "06/30/2019", "25", "0", "25"],
                &["331500860009", "Mathematics", "Grade 3 Math", "All Students", "06/30/2019", "30", "1", "31"],
                &["", "Mathematics", "Grade 3 Math", "All Students", "06/30/2019", "30", "1", "31"],
            ],
        )
    }

    #[test]
    fn test_crosswalk_maps_beds_to_dbn_and_drops_unmatched() -> anyhow::Result<()> {
        let v = vintage(STATE_ALL);
        let crosswalk: Crosswalk = [("310100010015", "01M015"), ("331500860009", "84K009")]
            .into_iter()
            .collect();
        let batch = adapt_with(&v, state_table(), Some(&crosswalk))?;

        assert_eq!(batch.rows.len(), 2);
        assert_eq!(batch.filtered, 1);
        let district = &batch.rows[0];
        assert_eq!(district.text("dbn"), Some("01M015"));
        assert_eq!(district.text("beds"), Some("310100010015"));
        assert_eq!(district.count("number_not_tested"), Some(2));
        assert_eq!(district.flag("charter"), Some(false));
        let charter = &batch.rows[1];
        assert_eq!(charter.text("dbn"), Some("84K009"));
        assert_eq!(charter.flag("charter"), Some(true));

        assert_eq!(batch.quarantine.len(), 1);
        assert!(matches!(
            batch.quarantine[0].cause,
            QuarantineCause::MissingIdentifier { ref field } if field == "beds"
        ));
        Ok(())
    }

    #[test]
    fn test_quarantined_state_row_is_keyed_by_beds() -> anyhow::Result<()> {
        let v = vintage(STATE_ALL);
        let t = table(
            &["BEDSCODE", "ITEM_SUBJECT_AREA", "ITEM_DESC", "SUBGROUP_NAME", "SY_END_DATE", "TOTAL_TESTED"],
            &[&["310100010015", "Mathematics", "Grade 3 Math", "All Students", "06/30/2019", "many"]],
        );
        let batch = adapt(&v, t)?;
        let row = &batch.quarantine[0];
        assert_eq!(row.key.as_deref(), Some("310100010015"));
        assert!(matches!(
            row.cause,
            QuarantineCause::Normalization { ref field, ref raw, .. }
                if field == "number_tested" && raw == "many"
        ));
        Ok(())
    }

    #[test]
    fn test_regents_row() -> anyhow::Result<()> {
        let v = vintage(
            r#"
id: regents
adapter: regents
year_range: { from: 2014, to: 2018 }
precedence: 10
"#,
        );
        let t = table(
            &["School DBN", "School Type", "School Level", "Regents Exam", "Year", "Category", "Total Tested", "Mean Score", "Number Scoring Below 65", "Percent Scoring Below 65", "Number Scoring 65 or Above", "Percent Scoring 65 or Above", "Number Scoring 80 or Above", "Percent Scoring 80 or Above", "Number Scoring CR", "Percent Scoring CR"],
            &[
                &["01M448", "General Academic", "High school", "Common Core Algebra", "2017", "All Students", "120", "68.4", "30", "25", "90", "75", "18", "15", "s", "s"],
                &["84X704", "Charter", "High school", "Living Environment", "2020", "All Students", "50", "70", "10", "20", "40", "80", "12", "24", "na", "na"],
            ],
        );
        let batch = adapt(&v, t)?;
        assert_eq!(batch.dataset, crate::domain::schema::DatasetKind::Regents);
        assert_eq!(batch.rows.len(), 1);
        assert_eq!(batch.filtered, 1);
        let row = &batch.rows[0];
        assert_eq!(row.text("dbn"), Some("01M448"));
        assert_eq!(row.int("ay"), Some(2016));
        assert_eq!(row.int("test_year"), Some(2017));
        assert_eq!(row.text("regents_exam"), Some("Common Core Algebra"));
        assert_eq!(row.text("school_level"), Some("High school"));
        assert_eq!(row.count("above_64_n"), Some(90));
        assert_eq!(row.pct("above_64_pct"), Some(0.75));
        assert_eq!(row.count("college_ready_n"), Some(0));
        assert_eq!(row.float("mean_score"), Some(68.4));
        assert_eq!(row.flag("charter"), Some(false));
        assert!(v.schema().conforms(row).is_ok());
        Ok(())
    }

    #[test]
    fn test_scope_filter_keeps_sources_disjoint() -> anyhow::Result<()> {
        let v = vintage(
            r#"
id: district_math
adapter: district_exam
year_range: { from: 2013, to: 2023 }
precedence: 20
population_scope: district
defaults: { exam: math }
"#,
        );
        let t = table(
            &["DBN", "Grade", "Year", "Category", "Number Tested", "Mean Scale Score", "# Level 1", "% Level 1"],
            &[
                &["01M015", "3", "2019", "All Students", "30", "s", "3", "10"],
                &["84X717", "3", "2019", "All Students", "50", "610", "5", "10"],
            ],
        );
        let batch = adapt(&v, t)?;
        assert_eq!(batch.rows.len(), 1);
        assert_eq!(batch.filtered, 1);
        let row = &batch.rows[0];
        assert_eq!(row.text("dbn"), Some("01M015"));
        assert_eq!(row.get("mean_scale_score"), Some(&CanonicalValue::Null));
        assert_eq!(row.pct("level_1_pct"), Some(0.1));
        Ok(())
    }

    #[test]
    fn test_unmapped_category_is_carried_and_reported() -> anyhow::Result<()> {
        let v = vintage(
            r#"
id: charter_ela
adapter: charter_exam
year_range: { from: 2013, to: 2023 }
precedence: 20
population_scope: charter
defaults: { exam: ela }
"#,
        );
        let t = table(
            &["dbn", "grade", "year", "category", "number_tested", "mean_scale_score"],
            &[
                &["84K001", "4", "2017", "Homeless", "12", "590"],
                &["84K001", "4", "2017", "All Students", "60", "600"],
            ],
        );
        let batch = adapt(&v, t)?;
        assert_eq!(batch.rows.len(), 2);
        assert_eq!(
            batch.rows[0].get("category"),
            Some(&CanonicalValue::Category(CanonicalCategory::Unmapped(
                "Homeless".into()
            )))
        );
        assert_eq!(batch.unmapped.len(), 1);
        assert_eq!(batch.rows[1].flag("charter"), Some(true));
        Ok(())
    }

    #[test]
    fn test_parse_academic_year_rules() {
        let col = || "c".to_string();
        assert_eq!(
            parse_academic_year(&AcademicYearRule::Label { column: col() }, "2016-17"),
            Some((2016, None))
        );
        assert_eq!(
            parse_academic_year(&AcademicYearRule::SchoolYearCode { column: col() }, "20062007"),
            Some((2006, None))
        );
        assert_eq!(
            parse_academic_year(&AcademicYearRule::TestYear { column: col() }, "2019"),
            Some((2018, Some(2019)))
        );
        assert_eq!(
            parse_academic_year(&AcademicYearRule::Direct { column: col() }, "2012"),
            Some((2012, None))
        );
        assert_eq!(
            parse_academic_year(&AcademicYearRule::Label { column: col() }, "n/a"),
            None
        );
    }
}
