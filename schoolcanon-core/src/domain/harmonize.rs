// schoolcanon-core/src/domain/harmonize.rs

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::warn;

use crate::domain::error::DomainError;
use crate::domain::schema::{CanonicalCategory, ExamSubject, Vocabulary};

/// Source label seen by a vintage that matched no canonical value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnmappedLabel {
    pub field: String,
    pub label: String,
    pub rows: u64,
}

struct LabelTable<V> {
    exact: HashMap<String, V>,
    folded: HashMap<String, V>,
}

impl<V: Vocabulary> LabelTable<V> {
    fn compile(vintage_id: &str, map: &BTreeMap<String, String>) -> Result<Self, DomainError> {
        let mut exact = HashMap::with_capacity(map.len());
        let mut folded = HashMap::with_capacity(map.len());
        for (raw, target) in map {
            let value = V::from_label(target).ok_or_else(|| {
                DomainError::Registry(format!(
                    "vintage '{}' maps '{}' to '{}', which is not a canonical {}",
                    vintage_id,
                    raw,
                    target,
                    V::FIELD
                ))
            })?;
            folded.insert(raw.trim().to_lowercase(), value.clone());
            exact.insert(raw.clone(), value);
        }
        Ok(Self { exact, folded })
    }

    fn lookup(&self, raw: &str) -> Option<V> {
        if let Some(v) = self.exact.get(raw) {
            return Some(v.clone());
        }
        let trimmed = raw.trim();
        self.folded
            .get(&trimmed.to_lowercase())
            .cloned()
            .or_else(|| V::from_label(trimmed))
    }
}

/// Maps one vintage's category and subject labels onto the closed
/// vocabularies. Total: labels that match nothing pass through as
/// `Unmapped` and are warned about once per label.
pub struct CategoryHarmonizer {
    vintage_id: String,
    categories: LabelTable<CanonicalCategory>,
    subjects: LabelTable<ExamSubject>,
    warned: HashSet<(&'static str, String)>,
    unmapped: BTreeMap<(&'static str, String), u64>,
}

impl CategoryHarmonizer {
    pub fn new(
        vintage_id: &str,
        category_map: &BTreeMap<String, String>,
        subject_map: &BTreeMap<String, String>,
    ) -> Result<Self, DomainError> {
        Ok(Self {
            vintage_id: vintage_id.to_string(),
            categories: LabelTable::compile(vintage_id, category_map)?,
            subjects: LabelTable::compile(vintage_id, subject_map)?,
            warned: HashSet::new(),
            unmapped: BTreeMap::new(),
        })
    }

    pub fn map_category(&mut self, raw_label: &str) -> CanonicalCategory {
        let found = self.categories.lookup(raw_label);
        self.resolve(found, raw_label)
    }

    pub fn map_subject(&mut self, raw_label: &str) -> ExamSubject {
        let found = self.subjects.lookup(raw_label);
        self.resolve(found, raw_label)
    }

    fn resolve<V: Vocabulary>(&mut self, found: Option<V>, raw_label: &str) -> V {
        if let Some(v) = found {
            return v;
        }
        let label = raw_label.trim().to_string();
        *self.unmapped.entry((V::FIELD, label.clone())).or_insert(0) += 1;
        if self.warned.insert((V::FIELD, label.clone())) {
            warn!(
                vintage = %self.vintage_id,
                field = V::FIELD,
                label = %label,
                "Unmapped label passed through"
            );
        }
        V::unmapped(&label)
    }

    /// Pass-through labels with the number of rows that carried them.
    pub fn unmapped_labels(&self) -> Vec<UnmappedLabel> {
        self.unmapped
            .iter()
            .map(|((field, label), rows)| UnmappedLabel {
                field: field.to_string(),
                label: label.clone(),
                rows: *rows,
            })
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn harmonizer() -> CategoryHarmonizer {
        CategoryHarmonizer::new(
            "state_ela_2019",
            &map(&[
                ("English Language Learner", "Current ELL"),
                ("Hispanic or Latino", "Hispanic"),
                ("All Students", "All Students"),
            ]),
            &map(&[("Mathematics", "math")]),
        )
        .unwrap()
    }

    #[test]
    fn test_lookup_order() {
        let mut h = harmonizer();
        assert_eq!(
            h.map_category("English Language Learner"),
            CanonicalCategory::CurrentEll
        );
        // case-insensitive descriptor match
        assert_eq!(
            h.map_category("hispanic or latino"),
            CanonicalCategory::Hispanic
        );
        // canonical label match
        assert_eq!(h.map_category("not swd"), CanonicalCategory::NotSwd);
        assert_eq!(h.map_subject("Mathematics"), ExamSubject::Math);
        assert_eq!(h.map_subject("ELA"), ExamSubject::Ela);
        assert!(h.unmapped_labels().is_empty());
    }

    #[test]
    fn test_unmapped_labels_pass_through_and_are_tallied() {
        let mut h = harmonizer();
        assert_eq!(
            h.map_category(" Homeless "),
            CanonicalCategory::Unmapped("Homeless".to_string())
        );
        h.map_category("Homeless");
        h.map_subject("Science");

        let labels = h.unmapped_labels();
        assert_eq!(labels.len(), 2);
        assert_eq!(
            labels[0],
            UnmappedLabel {
                field: "category".into(),
                label: "Homeless".into(),
                rows: 2
            }
        );
        assert_eq!(labels[1].field, "exam");
    }

    #[test]
    fn test_harmonizer_is_deterministic() {
        let mut h = harmonizer();
        let first = h.map_category("Hispanic or Latino");
        let second = h.map_category("Hispanic or Latino");
        assert_eq!(first, second);
        let a = h.map_category("Migrant");
        let b = h.map_category("Migrant");
        assert_eq!(a, b);
    }

    #[test]
    fn test_map_targets_must_be_canonical() {
        let err = CategoryHarmonizer::new(
            "bad",
            &map(&[("Econ. Disadvantaged", "Poor")]),
            &BTreeMap::new(),
        );
        assert!(matches!(err, Err(DomainError::Registry(_))));
    }
}
