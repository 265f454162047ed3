// schoolcanon-core/src/domain/schema/value.rs

use super::vocabulary::{CanonicalCategory, ExamGrade, ExamSubject};

/// A typed cell of the canonical schema.
#[derive(Debug, Clone, PartialEq)]
pub enum CanonicalValue {
    Null,
    Text(String),
    Int(i64),
    Count(u64),
    Pct(f64),
    Float(f64),
    Flag(bool),
    Category(CanonicalCategory),
    Subject(ExamSubject),
    Grade(ExamGrade),
}

impl CanonicalValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Text(_) => "text",
            Self::Int(_) => "integer",
            Self::Count(_) => "count",
            Self::Pct(_) => "percentage",
            Self::Float(_) => "float",
            Self::Flag(_) => "flag",
            Self::Category(_) => "category",
            Self::Subject(_) => "subject",
            Self::Grade(_) => "grade",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_count(&self) -> Option<u64> {
        match self {
            Self::Count(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_pct(&self) -> Option<f64> {
        match self {
            Self::Pct(p) => Some(*p),
            _ => None,
        }
    }

    /// Numeric view of counts, percentages, integers and floats.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Count(n) => Some(*n as f64),
            Self::Pct(p) | Self::Float(p) => Some(*p),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Self::Flag(b) => Some(*b),
            _ => None,
        }
    }

    /// Rendering used for entity keys and flat-file export. Null renders empty.
    pub fn render(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Text(s) => s.clone(),
            Self::Int(i) => i.to_string(),
            Self::Count(n) => n.to_string(),
            Self::Pct(p) | Self::Float(p) => p.to_string(),
            Self::Flag(b) => b.to_string(),
            Self::Category(c) => c.to_string(),
            Self::Subject(s) => s.to_string(),
            Self::Grade(g) => g.to_string(),
        }
    }
}

impl From<&str> for CanonicalValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}
