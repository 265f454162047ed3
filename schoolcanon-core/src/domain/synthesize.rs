// schoolcanon-core/src/domain/synthesize.rs

use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::{debug, info, instrument};

use crate::domain::error::DomainError;
use crate::domain::schema::{
    CanonicalRecord, CanonicalValue, DatasetKind, EXAMS, ExamGrade, FieldKind, SOURCE_VINTAGE,
};

pub const DEFAULT_GROUP_KEYS: [&str; 4] = ["dbn", "ay", "exam", "category"];

/// Weight of the synthesized scale score.
pub const WEIGHT_FIELD: &str = "total_enrollment";

fn is_rollup(row: &CanonicalRecord) -> bool {
    matches!(row.get("grade"), Some(CanonicalValue::Grade(ExamGrade::AllGrades)))
}

/// Builds the "All Grades" rows that sources without a native rollup lack.
///
/// Only rows whose `source_vintage` is in `sources` contribute. Each group
/// of `group_keys` yields one row: counts are summed, percentages are
/// recomputed from summed counts over the summed population, and the scale
/// score is the `total_enrollment`-weighted mean. A group whose rollup key
/// already exists in `dataset` is skipped.
///
/// Level counts are summed as-is, also when the summed `number_tested` is
/// 0. Adapted rows hold every count within their own population, so such a
/// group sums to zero counts and only the percentages need the 0 guard.
#[instrument(skip(dataset, sources), fields(rows = dataset.len()))]
pub fn synthesize_all_grades(
    dataset: &[CanonicalRecord],
    sources: &BTreeSet<String>,
    group_keys: &[&str],
) -> Result<Vec<CanonicalRecord>, DomainError> {
    let schema = DatasetKind::Exams.schema();
    if group_keys.is_empty() {
        return Err(DomainError::Synthesis("no group keys given".to_string()));
    }
    if let Some(bad) = group_keys.iter().find(|k| !schema.contains(k) || **k == "grade") {
        return Err(DomainError::Synthesis(format!(
            "'{}' cannot be a group key",
            bad
        )));
    }

    let mut groups: BTreeMap<Vec<String>, Vec<&CanonicalRecord>> = BTreeMap::new();
    for row in dataset {
        let contributes = row
            .text(SOURCE_VINTAGE)
            .is_some_and(|v| sources.contains(v));
        if !contributes || is_rollup(row) {
            continue;
        }
        let group: Vec<String> = group_keys
            .iter()
            .map(|k| row.get(k).map(|v| v.render()).unwrap_or_default())
            .collect();
        groups.entry(group).or_default().push(row);
    }

    let existing: HashSet<_> = dataset
        .iter()
        .filter(|r| is_rollup(r))
        .map(|r| schema.key_of(r))
        .collect();

    let mut synthesized = Vec::new();
    let mut skipped = 0usize;
    for members in groups.values() {
        let row = aggregate(members, group_keys);
        if existing.contains(&schema.key_of(&row)) {
            skipped += 1;
            continue;
        }
        synthesized.push(row);
    }

    if skipped > 0 {
        debug!(skipped, "Groups with a native rollup left untouched");
    }
    info!(groups = groups.len(), synthesized = synthesized.len(), "All Grades rows synthesized");
    Ok(synthesized)
}

fn sum_counts(members: &[&CanonicalRecord], field: &str) -> u64 {
    members.iter().filter_map(|r| r.count(field)).sum()
}

fn share(numerator: f64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator / denominator as f64
    }
}

/// Counts are summed even when the population sums to 0. Only shares take
/// the zero-denominator guard, see [`synthesize_all_grades`].
fn aggregate(members: &[&CanonicalRecord], group_keys: &[&str]) -> CanonicalRecord {
    use CanonicalValue as V;

    let schema = &*EXAMS;
    let first = members[0];
    let population = sum_counts(members, schema.population);
    let mut row = CanonicalRecord::new();

    for spec in &schema.fields {
        let name = spec.name;
        let value = if group_keys.contains(&name) {
            first.get(name).cloned().unwrap_or(V::Null)
        } else if name == "grade" {
            V::Grade(ExamGrade::AllGrades)
        } else {
            match spec.kind {
                FieldKind::Population | FieldKind::Count | FieldKind::UnboundedCount => {
                    V::Count(sum_counts(members, name))
                }
                FieldKind::Percentage {
                    numerator: Some(count),
                } => V::Pct(share(sum_counts(members, count) as f64, population)),
                FieldKind::Percentage { numerator: None } => {
                    let weighted: f64 = members
                        .iter()
                        .filter_map(|r| Some(r.pct(name)? * r.count(schema.population)? as f64))
                        .sum();
                    V::Pct(share(weighted, population))
                }
                FieldKind::Score => weighted_mean(members, name),
                FieldKind::Integer => members
                    .iter()
                    .filter_map(|r| r.int(name))
                    .max()
                    .map_or(V::Null, V::Int),
                FieldKind::Flag => V::Flag(members.iter().any(|r| r.flag(name).unwrap_or(false))),
                _ => first.get(name).cloned().unwrap_or(V::Null),
            }
        };
        row.set(name, value);
    }
    row
}

/// `WEIGHT_FIELD`-weighted mean over members carrying a score. Null when
/// the total weight is 0.
fn weighted_mean(members: &[&CanonicalRecord], field: &str) -> CanonicalValue {
    let (total, weight) = members
        .iter()
        .filter_map(|r| Some((r.float(field)?, r.count(WEIGHT_FIELD)? as f64)))
        .fold((0.0, 0.0), |(t, w), (score, weight)| {
            (t + score * weight, w + weight)
        });
    if weight > 0.0 {
        CanonicalValue::Float(total / weight)
    } else {
        CanonicalValue::Null
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::schema::{CanonicalCategory, ExamSubject};

    fn exam_row(grade: u8, enrollment: u64, tested: u64, l34: u64, score: Option<f64>) -> CanonicalRecord {
        let mut row: CanonicalRecord = [
            ("dbn", CanonicalValue::Text("310200010001".into())),
            ("ay", CanonicalValue::Int(2018)),
            ("test_year", CanonicalValue::Int(2019)),
            ("exam", CanonicalValue::Subject(ExamSubject::Math)),
            ("grade", CanonicalValue::Grade(ExamGrade::Grade(grade))),
            ("category", CanonicalValue::Category(CanonicalCategory::AllStudents)),
            ("charter", CanonicalValue::Flag(false)),
            ("number_tested", CanonicalValue::Count(tested)),
            ("total_enrollment", CanonicalValue::Count(enrollment)),
            ("mean_scale_score", score.map_or(CanonicalValue::Null, CanonicalValue::Float)),
            ("level_3_4_n", CanonicalValue::Count(l34)),
            ("source_vintage", CanonicalValue::Text("state".into())),
        ]
        .into_iter()
        .collect();
        for (n, p) in crate::domain::schema::canonical::LEVELS.iter().take(4) {
            row.set(*n, CanonicalValue::Count(0));
            row.set(*p, CanonicalValue::Pct(0.0));
        }
        row.set("level_3_4_pct", CanonicalValue::Pct(share(l34 as f64, tested)));
        row
    }

    fn sources() -> BTreeSet<String> {
        BTreeSet::from(["state".to_string()])
    }

    #[test]
    fn test_score_is_enrollment_weighted() -> anyhow::Result<()> {
        let rows = vec![
            exam_row(3, 100, 90, 45, Some(600.0)),
            exam_row(4, 200, 190, 95, Some(650.0)),
            exam_row(5, 50, 45, 30, Some(700.0)),
        ];
        let out = synthesize_all_grades(&rows, &sources(), &DEFAULT_GROUP_KEYS)?;
        assert_eq!(out.len(), 1);
        let all = &out[0];
        let score = all.float("mean_scale_score").unwrap();
        // (100*600 + 200*650 + 50*700) / 350, not the plain mean 650
        assert!((score - 225_000.0 / 350.0).abs() < 0.01);
        assert_eq!(all.get("grade"), Some(&CanonicalValue::Grade(ExamGrade::AllGrades)));
        assert_eq!(all.count("number_tested"), Some(325));
        assert_eq!(all.count("level_3_4_n"), Some(170));
        assert_eq!(all.pct("level_3_4_pct"), Some(170.0 / 325.0));
        assert_eq!(all.int("test_year"), Some(2019));
        assert_eq!(all.text("source_vintage"), Some("state"));
        assert!(EXAMS.conforms(all).is_ok());
        assert!(EXAMS.check_invariants(all).is_ok());
        Ok(())
    }

    #[test]
    fn test_zero_denominator_and_zero_weight() -> anyhow::Result<()> {
        let rows = vec![exam_row(3, 0, 0, 0, Some(600.0)), exam_row(4, 0, 0, 0, None)];
        let out = synthesize_all_grades(&rows, &sources(), &DEFAULT_GROUP_KEYS)?;
        assert_eq!(out[0].pct("level_3_4_pct"), Some(0.0));
        assert_eq!(out[0].count("level_3_4_n"), Some(0));
        assert_eq!(out[0].get("mean_scale_score"), Some(&CanonicalValue::Null));
        Ok(())
    }

    #[test]
    fn test_native_rollups_and_other_sources_are_left_alone() -> anyhow::Result<()> {
        let mut native = exam_row(3, 10, 10, 5, Some(600.0));
        native.set("grade", CanonicalValue::Grade(ExamGrade::AllGrades));
        let rows = vec![exam_row(3, 10, 10, 5, Some(600.0)), native];
        let out = synthesize_all_grades(&rows, &sources(), &DEFAULT_GROUP_KEYS)?;
        assert!(out.is_empty());

        let out = synthesize_all_grades(&rows, &BTreeSet::new(), &DEFAULT_GROUP_KEYS)?;
        assert!(out.is_empty());
        Ok(())
    }

    #[test]
    fn test_groups_are_independent() -> anyhow::Result<()> {
        let mut other = exam_row(3, 40, 40, 10, Some(610.0));
        other.set("category", CanonicalValue::Category(CanonicalCategory::Female));
        let rows = vec![exam_row(3, 10, 10, 5, Some(600.0)), other];
        let out = synthesize_all_grades(&rows, &sources(), &DEFAULT_GROUP_KEYS)?;
        assert_eq!(out.len(), 2);
        assert!(out.iter().any(|r| r.count("number_tested") == Some(40)));
        Ok(())
    }

    #[test]
    fn test_grade_is_not_a_group_key() {
        assert!(matches!(
            synthesize_all_grades(&[], &sources(), &["dbn", "grade"]),
            Err(DomainError::Synthesis(_))
        ));
    }
}
