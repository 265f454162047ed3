// schoolcanon-core/src/domain/normalize/sentinel.rs

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use super::NormalizationError;

pub const DEFAULT_ABOVE_VALUE: f64 = 0.96;
pub const DEFAULT_BELOW_VALUE: f64 = 0.04;

const DEFAULT_ABOVE: &str = r"^above\b";
const DEFAULT_BELOW: &str = r"^below\b";
const DEFAULT_MISSING: [&str; 7] = ["", "-", "s", "n/a", "na", "no data", "nan"];

/// Classification of one raw cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawScalar {
    /// A plain number. `percent_sign` records a stripped trailing `%`.
    Exact { value: f64, percent_sign: bool },
    AboveThreshold,
    BelowThreshold,
    Missing,
}

/// Descriptor-level extension of the sentinel grammar.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SentinelRules {
    #[serde(default)]
    pub above: Vec<String>,
    #[serde(default)]
    pub below: Vec<String>,
    #[serde(default)]
    pub missing: Vec<String>,
    pub above_value: Option<f64>,
    pub below_value: Option<f64>,
}

/// Compiled sentinel grammar: defaults plus the descriptor's extra rules.
#[derive(Debug, Clone)]
pub struct SentinelGrammar {
    above: Vec<Regex>,
    below: Vec<Regex>,
    missing: Vec<String>,
    pub above_value: f64,
    pub below_value: f64,
}

fn compile_all(defaults: &[&str], extra: &[String]) -> Result<Vec<Regex>, regex::Error> {
    defaults
        .iter()
        .copied()
        .chain(extra.iter().map(String::as_str))
        .map(|p| RegexBuilder::new(p).case_insensitive(true).build())
        .collect()
}

impl SentinelGrammar {
    pub fn compile(rules: &SentinelRules) -> Result<Self, regex::Error> {
        Ok(Self {
            above: compile_all(&[DEFAULT_ABOVE], &rules.above)?,
            below: compile_all(&[DEFAULT_BELOW], &rules.below)?,
            missing: DEFAULT_MISSING
                .iter()
                .map(|m| m.to_string())
                .chain(rules.missing.iter().map(|m| m.trim().to_lowercase()))
                .collect(),
            above_value: rules.above_value.unwrap_or(DEFAULT_ABOVE_VALUE),
            below_value: rules.below_value.unwrap_or(DEFAULT_BELOW_VALUE),
        })
    }

    /// Classifies a raw cell. Non-numeric text that is neither a sentinel
    /// nor a missing marker is an error.
    pub fn classify(&self, raw: &str) -> Result<RawScalar, NormalizationError> {
        let trimmed = raw.trim();
        let lowered = trimmed.to_lowercase();
        if self.missing.iter().any(|m| *m == lowered) {
            return Ok(RawScalar::Missing);
        }
        if self.above.iter().any(|re| re.is_match(trimmed)) {
            return Ok(RawScalar::AboveThreshold);
        }
        if self.below.iter().any(|re| re.is_match(trimmed)) {
            return Ok(RawScalar::BelowThreshold);
        }

        let (number, percent_sign) = match trimmed.strip_suffix('%') {
            Some(rest) => (rest.trim_end(), true),
            None => (trimmed, false),
        };
        let number = number.replace(',', "");
        match number.parse::<f64>() {
            Ok(value) if value.is_finite() => Ok(RawScalar::Exact {
                value,
                percent_sign,
            }),
            Ok(_) => Ok(RawScalar::Missing),
            Err(_) => Err(NormalizationError::Unrecognized {
                raw: raw.to_string(),
            }),
        }
    }
}

impl Default for SentinelGrammar {
    fn default() -> Self {
        Self {
            above: compile_all(&[DEFAULT_ABOVE], &[]).unwrap_or_default(),
            below: compile_all(&[DEFAULT_BELOW], &[]).unwrap_or_default(),
            missing: DEFAULT_MISSING.iter().map(|m| m.to_string()).collect(),
            above_value: DEFAULT_ABOVE_VALUE,
            below_value: DEFAULT_BELOW_VALUE,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_defaults() {
        let g = SentinelGrammar::default();
        assert_eq!(g.classify("Above 95%").unwrap(), RawScalar::AboveThreshold);
        assert_eq!(g.classify("below 5%").unwrap(), RawScalar::BelowThreshold);
        assert_eq!(g.classify(" s ").unwrap(), RawScalar::Missing);
        assert_eq!(g.classify("No Data").unwrap(), RawScalar::Missing);
        assert_eq!(
            g.classify("1,234").unwrap(),
            RawScalar::Exact {
                value: 1234.0,
                percent_sign: false
            }
        );
        assert_eq!(
            g.classify("45.5%").unwrap(),
            RawScalar::Exact {
                value: 45.5,
                percent_sign: true
            }
        );
        assert!(matches!(
            g.classify("Brooklyn"),
            Err(NormalizationError::Unrecognized { .. })
        ));
    }

    #[test]
    fn test_descriptor_rules_extend_grammar() {
        let rules = SentinelRules {
            below: vec![r"^<\s*5".to_string()],
            missing: vec!["**".to_string()],
            above_value: Some(0.95),
            ..Default::default()
        };
        let g = SentinelGrammar::compile(&rules).unwrap();
        assert_eq!(g.classify("< 5").unwrap(), RawScalar::BelowThreshold);
        assert_eq!(g.classify("**").unwrap(), RawScalar::Missing);
        assert_eq!(g.classify("Above 95%").unwrap(), RawScalar::AboveThreshold);
        assert_eq!(g.above_value, 0.95);
        assert_eq!(g.below_value, DEFAULT_BELOW_VALUE);
    }
}
