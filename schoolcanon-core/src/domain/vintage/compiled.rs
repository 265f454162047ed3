// schoolcanon-core/src/domain/vintage/compiled.rs

use regex::Regex;
use validator::Validate;

use super::descriptor::{
    AcademicYearRule, AuxiliaryField, ColumnRule, DerivedField, VintageDescriptor,
};
use crate::domain::adapter::strategy;
use crate::domain::error::DomainError;
use crate::domain::harmonize::CategoryHarmonizer;
use crate::domain::normalize::{SentinelGrammar, ValueNormalizer};
use crate::domain::schema::{CanonicalSchema, DatasetKind};

#[derive(Debug, Clone)]
pub enum CompiledRule {
    Exact { from: String, to: String },
    Pattern { regex: Regex, replace: String },
}

impl CompiledRule {
    pub fn try_compile(rule: &ColumnRule) -> Result<Self, regex::Error> {
        Ok(match rule {
            ColumnRule::Exact { from, to } => Self::Exact {
                from: from.clone(),
                to: to.clone(),
            },
            ColumnRule::Pattern { pattern, replace } => Self::Pattern {
                regex: Regex::new(pattern)?,
                replace: replace.clone(),
            },
        })
    }

    pub fn apply(&self, header: &str) -> Option<String> {
        match self {
            Self::Exact { from, to } => (from == header).then(|| to.clone()),
            Self::Pattern { regex, replace } => regex
                .is_match(header)
                .then(|| regex.replace(header, replace.as_str()).into_owned()),
        }
    }
}

/// First matching rule of an ordered list.
fn first_match(rules: &[CompiledRule], header: &str) -> Option<String> {
    rules.iter().find_map(|r| r.apply(header))
}

/// A descriptor resolved against its adapter's conventions, ready to run.
#[derive(Debug, Clone)]
pub struct CompiledVintage {
    pub descriptor: VintageDescriptor,
    pub vintage_rules: Vec<CompiledRule>,
    pub builtin_rules: Vec<CompiledRule>,
    pub normalizer: ValueNormalizer,
    pub academic_year: AcademicYearRule,
    pub derived: Vec<DerivedField>,
    pub auxiliary: Vec<AuxiliaryField>,
    pub has_rollup: bool,
}

impl CompiledVintage {
    pub fn try_compile(descriptor: VintageDescriptor) -> Result<Self, DomainError> {
        let id = descriptor.id.clone();
        let invalid = |reason: String| DomainError::Registry(format!("vintage '{}': {}", id, reason));

        descriptor.validate().map_err(|e| invalid(e.to_string()))?;

        let adapter = strategy(descriptor.adapter);
        let compile_all = |rules: &[ColumnRule]| {
            rules
                .iter()
                .map(CompiledRule::try_compile)
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| invalid(e.to_string()))
        };
        let vintage_rules = compile_all(&descriptor.column_map)?;
        let builtin_rules = compile_all(&adapter.builtin_rules())?;

        let grammar =
            SentinelGrammar::compile(&descriptor.sentinel_rules).map_err(|e| invalid(e.to_string()))?;
        let scale = descriptor
            .percent_scale
            .unwrap_or_else(|| adapter.percent_scale());

        // Label maps are checked here so a bad target fails the load, not the run.
        CategoryHarmonizer::new(&id, &descriptor.category_map, &descriptor.subject_map)?;

        let schema = descriptor.dataset().schema();
        if let Some(field) = descriptor.defaults.keys().find(|k| !schema.contains(k)) {
            return Err(invalid(format!(
                "default for '{}', which is not a {} field",
                field,
                descriptor.dataset()
            )));
        }

        let mut auxiliary = adapter.auxiliary();
        for field in &descriptor.auxiliary {
            if schema.contains(&field.name) {
                return Err(invalid(format!(
                    "auxiliary field '{}' shadows a canonical field",
                    field.name
                )));
            }
            if !auxiliary.iter().any(|a| a.name == field.name) {
                auxiliary.push(field.clone());
            }
        }

        Ok(Self {
            academic_year: descriptor
                .academic_year
                .clone()
                .unwrap_or_else(|| adapter.academic_year()),
            derived: descriptor
                .derived
                .clone()
                .unwrap_or_else(|| adapter.derived()),
            has_rollup: descriptor.has_rollup.unwrap_or_else(|| adapter.has_rollup()),
            normalizer: ValueNormalizer::new(grammar, scale),
            vintage_rules,
            builtin_rules,
            auxiliary,
            descriptor,
        })
    }

    pub fn id(&self) -> &str {
        &self.descriptor.id
    }

    pub fn dataset(&self) -> DatasetKind {
        self.descriptor.dataset()
    }

    pub fn schema(&self) -> &'static CanonicalSchema {
        self.dataset().schema()
    }

    /// Canonical name of a source header: adapter normalization, then the
    /// vintage's rules, then the adapter family's rules.
    pub fn map_header(&self, header: &str) -> String {
        let normalized = strategy(self.descriptor.adapter).normalize_header(header);
        let renamed = first_match(&self.vintage_rules, &normalized).unwrap_or(normalized);
        first_match(&self.builtin_rules, &renamed).unwrap_or(renamed)
    }
}
