// schoolcanon-core/src/domain/schema/record.rs

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use super::value::CanonicalValue;

/// A source table as handed over by ingestion: every cell is a string.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Appends another table, aligning its columns by header name.
    /// Headers unknown so far are appended and back-filled with empty cells.
    pub fn append(&mut self, other: RawTable) {
        let mut positions = Vec::with_capacity(other.headers.len());
        for header in &other.headers {
            let pos = match self.headers.iter().position(|h| h == header) {
                Some(pos) => pos,
                None => {
                    self.headers.push(header.clone());
                    for row in &mut self.rows {
                        row.push(String::new());
                    }
                    self.headers.len() - 1
                }
            };
            positions.push(pos);
        }
        for row in other.rows {
            let mut aligned = vec![String::new(); self.headers.len()];
            for (cell, pos) in row.into_iter().zip(&positions) {
                aligned[*pos] = cell;
            }
            self.rows.push(aligned);
        }
    }

    /// Turns the table into per-row records tagged with the vintage id.
    /// `line` is 1-based and counts data rows only.
    pub fn into_records(self, vintage_id: &str) -> Vec<RawRecord> {
        let headers = self.headers;
        self.rows
            .into_iter()
            .enumerate()
            .map(|(i, row)| RawRecord {
                vintage_id: vintage_id.to_string(),
                line: i + 1,
                fields: headers.iter().cloned().zip(row).collect(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawRecord {
    pub vintage_id: String,
    pub line: usize,
    pub fields: BTreeMap<String, String>,
}

impl RawRecord {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// A typed row over a canonical schema.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CanonicalRecord {
    values: BTreeMap<String, CanonicalValue>,
}

impl CanonicalRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&CanonicalValue> {
        self.values.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: CanonicalValue) {
        self.values.insert(name.into(), value);
    }

    pub fn remove(&mut self, name: &str) -> Option<CanonicalValue> {
        self.values.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.values.keys().map(String::as_str)
    }

    pub fn count(&self, name: &str) -> Option<u64> {
        self.get(name).and_then(CanonicalValue::as_count)
    }

    pub fn pct(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(CanonicalValue::as_pct)
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(CanonicalValue::as_int)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(CanonicalValue::as_text)
    }

    pub fn flag(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(CanonicalValue::as_flag)
    }

    pub fn float(&self, name: &str) -> Option<f64> {
        match self.get(name) {
            Some(CanonicalValue::Float(f)) => Some(*f),
            _ => None,
        }
    }
}

impl<K: Into<String>> FromIterator<(K, CanonicalValue)> for CanonicalRecord {
    fn from_iter<I: IntoIterator<Item = (K, CanonicalValue)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Rendered entity key of a canonical record, ordered as the schema key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EntityKey(pub Vec<String>);

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("|"))
    }
}
