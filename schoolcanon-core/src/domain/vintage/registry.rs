// schoolcanon-core/src/domain/vintage/registry.rs

use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::compiled::CompiledVintage;
use super::descriptor::VintageDescriptor;
use crate::domain::error::DomainError;
use crate::domain::schema::DatasetKind;

const BUILTIN_CATALOG: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/vintages/nyc.yaml"));

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RegistryFile {
    vintages: Vec<VintageDescriptor>,
}

/// Immutable catalog of compiled vintages keyed by id.
#[derive(Debug, Clone, Default)]
pub struct VintageRegistry {
    vintages: BTreeMap<String, Arc<CompiledVintage>>,
}

impl VintageRegistry {
    /// The NYC catalog shipped with the library.
    pub fn builtin() -> Result<Self, DomainError> {
        Self::from_yaml(BUILTIN_CATALOG)
    }

    pub fn from_yaml(content: &str) -> Result<Self, DomainError> {
        let file: RegistryFile = serde_yaml::from_str(content)
            .map_err(|e| DomainError::Registry(format!("invalid vintage catalog: {}", e)))?;
        Self::from_descriptors(file.vintages)
    }

    pub fn from_descriptors(descriptors: Vec<VintageDescriptor>) -> Result<Self, DomainError> {
        let mut vintages = BTreeMap::new();
        for descriptor in descriptors {
            let id = descriptor.id.clone();
            let compiled = CompiledVintage::try_compile(descriptor)?;
            if vintages.insert(id.clone(), Arc::new(compiled)).is_some() {
                return Err(DomainError::Registry(format!(
                    "vintage '{}' is declared twice",
                    id
                )));
            }
        }
        Ok(Self { vintages })
    }

    pub fn get(&self, id: &str) -> Result<&Arc<CompiledVintage>, DomainError> {
        self.vintages
            .get(id)
            .ok_or_else(|| DomainError::UnknownVintage(id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.vintages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vintages.is_empty()
    }

    /// All vintages ordered by dataset, then precedence (highest first), then id.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<CompiledVintage>> + '_ {
        let mut all: Vec<_> = self.vintages.values().collect();
        all.sort_by(|a, b| {
            a.dataset()
                .cmp(&b.dataset())
                .then(b.descriptor.precedence.cmp(&a.descriptor.precedence))
                .then(a.id().cmp(b.id()))
        });
        all.into_iter()
    }

    pub fn for_dataset(&self, dataset: DatasetKind) -> Vec<Arc<CompiledVintage>> {
        self.iter()
            .filter(|v| v.dataset() == dataset)
            .cloned()
            .collect()
    }
}
