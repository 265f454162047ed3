// schoolcanon-core/src/domain/adapter/crosswalk.rs

use std::collections::HashMap;
use tracing::debug;

use super::normalize_header;
use crate::domain::error::DomainError;
use crate::domain::schema::RawTable;
use crate::domain::vintage::CrosswalkSpec;

/// Lookup from a foreign school identifier (BEDS code) to the DBN.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Crosswalk {
    ids: HashMap<String, String>,
}

impl Crosswalk {
    /// Builds the lookup from the `from` and `to` columns of `table`.
    /// Headers are compared after normalization. Blank cells are skipped and
    /// an identifier mapped to two different targets is an error.
    pub fn from_table(
        vintage_id: &str,
        spec: &CrosswalkSpec,
        table: RawTable,
    ) -> Result<Self, DomainError> {
        let invalid = |reason: String| DomainError::Crosswalk {
            vintage: vintage_id.to_string(),
            path: spec.path.clone(),
            reason,
        };
        let column = |name: &str| {
            table
                .headers
                .iter()
                .position(|h| normalize_header(h) == name)
                .ok_or_else(|| invalid(format!("has no '{}' column", name)))
        };
        let from = column(&spec.from)?;
        let to = column(&spec.to)?;

        let mut ids = HashMap::with_capacity(table.len());
        for row in &table.rows {
            let (Some(key), Some(target)) = (row.get(from), row.get(to)) else {
                continue;
            };
            let (key, target) = (key.trim(), target.trim());
            if key.is_empty() || target.is_empty() {
                continue;
            }
            match ids.get(key) {
                Some(existing) if existing != target => {
                    return Err(invalid(format!(
                        "{} '{}' maps to both '{}' and '{}'",
                        spec.from, key, existing, target
                    )));
                }
                Some(_) => {}
                None => {
                    ids.insert(key.to_string(), target.to_string());
                }
            }
        }
        debug!(vintage = vintage_id, entries = ids.len(), "Crosswalk loaded");
        Ok(Self { ids })
    }

    pub fn lookup(&self, id: &str) -> Option<&str> {
        self.ids.get(id.trim()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Crosswalk {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn spec() -> CrosswalkSpec {
        serde_yaml::from_str("{ path: crosswalk/dbn_beds.csv }").unwrap()
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

    #[test]
    fn test_crosswalk_reads_named_columns() -> anyhow::Result<()> {
        let t = table(
            &["DBN", "BEDS", "school_name"],
            &[
                &["01M015", "310100010015", "P.S. 015"],
                &["01M015", "310100010015", "P.S. 015"],
                &["", "310100010099", "closed"],
            ],
        );
        let cw = Crosswalk::from_table("state_exams", &spec(), t)?;
        assert_eq!(cw.len(), 1);
        assert_eq!(cw.lookup(" 310100010015 "), Some("01M015"));
        assert_eq!(cw.lookup("310100010099"), None);
        Ok(())
    }

    #[test]
    fn test_conflicting_targets_are_rejected() {
        let t = table(
            &["dbn", "beds"],
            &[&["01M015", "310100010015"], &["01M019", "310100010015"]],
        );
        assert!(matches!(
            Crosswalk::from_table("state_exams", &spec(), t),
            Err(DomainError::Crosswalk { ref reason, .. }) if reason.contains("maps to both")
        ));
    }

    #[test]
    fn test_missing_column_is_rejected() {
        let t = table(&["dbn", "school"], &[&["01M015", "x"]]);
        assert!(Crosswalk::from_table("state_exams", &spec(), t).is_err());
    }
}
