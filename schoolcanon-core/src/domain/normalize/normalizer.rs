// schoolcanon-core/src/domain/normalize/normalizer.rs

use serde::{Deserialize, Serialize};

use super::NormalizationError;
use super::sentinel::{RawScalar, SentinelGrammar};

/// How exact percentage values are scaled into [0, 1].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PercentScale {
    /// Values in [0, 1] pass through, values in (1, 100] are divided by 100.
    #[default]
    Auto,
    /// The vintage publishes whole percents: always divided by 100.
    Hundred,
    /// The vintage publishes shares: never scaled.
    Unit,
}

/// A value resolved to a default instead of being parsed.
#[derive(Debug, Clone, PartialEq)]
pub enum Degradation {
    Missing,
    Unrecognized(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<T> {
    pub value: T,
    pub degraded: Option<Degradation>,
}

impl<T> Resolved<T> {
    fn exact(value: T) -> Self {
        Self {
            value,
            degraded: None,
        }
    }

    fn degraded(value: T, why: Degradation) -> Self {
        Self {
            value,
            degraded: Some(why),
        }
    }
}

// Largest integer an f64 holds exactly. Casts beyond it would saturate.
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

// Products like 500 * 0.96 land a few ulps off the integer.
fn settle(x: f64) -> f64 {
    (x * 1e9).round() / 1e9
}

/// Parses ambiguous source scalars into typed canonical values.
#[derive(Debug, Clone, Default)]
pub struct ValueNormalizer {
    grammar: SentinelGrammar,
    scale: PercentScale,
}

impl ValueNormalizer {
    pub fn new(grammar: SentinelGrammar, scale: PercentScale) -> Self {
        Self { grammar, scale }
    }

    pub fn grammar(&self) -> &SentinelGrammar {
        &self.grammar
    }

    /// Resolves a percentage to [0, 1].
    ///
    /// Missing and unrecognized cells resolve to 0 and are reported as
    /// degraded. Sentinels resolve to the grammar thresholds, or 0 when
    /// the row's population is 0.
    pub fn parse_percentage(
        &self,
        raw: &str,
        population: Option<u64>,
    ) -> Result<Resolved<f64>, NormalizationError> {
        let scalar = match self.grammar.classify(raw) {
            Ok(s) => s,
            Err(NormalizationError::Unrecognized { raw }) => {
                return Ok(Resolved::degraded(0.0, Degradation::Unrecognized(raw)));
            }
            Err(e) => return Err(e),
        };

        match scalar {
            RawScalar::Missing => Ok(Resolved::degraded(0.0, Degradation::Missing)),
            RawScalar::AboveThreshold | RawScalar::BelowThreshold if population == Some(0) => {
                Ok(Resolved::exact(0.0))
            }
            RawScalar::AboveThreshold => Ok(Resolved::exact(self.grammar.above_value)),
            RawScalar::BelowThreshold => Ok(Resolved::exact(self.grammar.below_value)),
            RawScalar::Exact {
                value,
                percent_sign,
            } => {
                let out_of_range = || NormalizationError::PercentOutOfRange {
                    raw: raw.to_string(),
                };
                if !(0.0..=100.0).contains(&value) {
                    return Err(out_of_range());
                }
                let share = match self.scale {
                    _ if percent_sign => value / 100.0,
                    PercentScale::Hundred => value / 100.0,
                    PercentScale::Unit if value > 1.0 => return Err(out_of_range()),
                    PercentScale::Unit => value,
                    PercentScale::Auto if value <= 1.0 => value,
                    PercentScale::Auto => value / 100.0,
                };
                Ok(Resolved::exact(share))
            }
        }
    }

    /// Resolves a count to a non-negative integer.
    ///
    /// Sentinels resolve against the row's population: `ceil(n * above)`
    /// and `floor(n * below)`, consistent with the percentage thresholds.
    pub fn parse_count(
        &self,
        raw: &str,
        population: Option<u64>,
    ) -> Result<Resolved<u64>, NormalizationError> {
        let invalid = || NormalizationError::InvalidCount {
            raw: raw.to_string(),
        };
        match self.grammar.classify(raw).map_err(|_| invalid())? {
            RawScalar::Missing => Ok(Resolved::degraded(0, Degradation::Missing)),
            RawScalar::Exact { percent_sign: true, .. } => Err(invalid()),
            RawScalar::Exact { value, .. } => {
                if !(0.0..=MAX_EXACT_INTEGER).contains(&value) || value.fract() != 0.0 {
                    return Err(invalid());
                }
                Ok(Resolved::exact(value as u64))
            }
            sentinel => {
                let n = population.ok_or_else(|| NormalizationError::MissingPopulation {
                    raw: raw.to_string(),
                })? as f64;
                let resolved = if sentinel == RawScalar::AboveThreshold {
                    settle(n * self.grammar.above_value).ceil()
                } else {
                    settle(n * self.grammar.below_value).floor()
                };
                Ok(Resolved::exact(resolved as u64))
            }
        }
    }

    /// Resolves a scale score. Missing cells are null; sentinels are errors.
    pub fn parse_score(&self, raw: &str) -> Result<Option<f64>, NormalizationError> {
        let invalid = || NormalizationError::InvalidScore {
            raw: raw.to_string(),
        };
        match self.grammar.classify(raw).map_err(|_| invalid())? {
            RawScalar::Missing => Ok(None),
            RawScalar::Exact { value, percent_sign: false } => Ok(Some(value)),
            _ => Err(invalid()),
        }
    }

    /// Resolves a nullable integer such as a district number or test year.
    pub fn parse_integer(&self, raw: &str) -> Result<Option<i64>, NormalizationError> {
        let invalid = || NormalizationError::InvalidInteger {
            raw: raw.to_string(),
        };
        match self.grammar.classify(raw).map_err(|_| invalid())? {
            RawScalar::Missing => Ok(None),
            RawScalar::Exact { value, percent_sign: false }
                if value.fract() == 0.0 && value.abs() <= MAX_EXACT_INTEGER =>
            {
                Ok(Some(value as i64))
            }
            _ => Err(invalid()),
        }
    }

    pub fn parse_flag(&self, raw: &str) -> Result<bool, NormalizationError> {
        match raw.trim().to_lowercase().as_str() {
            "y" | "yes" | "true" | "t" | "1" | "1.0" => Ok(true),
            "n" | "no" | "false" | "f" | "0" | "0.0" | "" => Ok(false),
            _ => Err(NormalizationError::InvalidFlag {
                raw: raw.to_string(),
            }),
        }
    }
}
