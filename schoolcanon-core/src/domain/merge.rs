// schoolcanon-core/src/domain/merge.rs

use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info, instrument};

use crate::domain::adapter::AdaptedBatch;
use crate::domain::error::DomainError;
use crate::domain::schema::{CanonicalRecord, DatasetKind, EntityKey};
use crate::domain::vintage::PopulationScope;

/// What one source contributed to the merged table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceContribution {
    pub vintage_id: String,
    pub precedence: u32,
    pub scope: PopulationScope,
    pub kept: usize,
    /// Rows dropped because a higher-precedence source owns the key.
    pub superseded: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub sources: Vec<SourceContribution>,
}

impl MergeReport {
    pub fn kept(&self) -> usize {
        self.sources.iter().map(|s| s.kept).sum()
    }

    pub fn superseded(&self) -> usize {
        self.sources.iter().map(|s| s.superseded).sum()
    }
}

#[derive(Debug, Clone)]
pub struct MergedDataset {
    pub dataset: DatasetKind,
    pub rows: Vec<CanonicalRecord>,
    pub report: MergeReport,
}

/// Combines adapted batches of one dataset into a single table.
///
/// Batches are visited by precedence (highest first, ties by vintage id).
/// The first source to claim a key keeps its whole row; later claims are
/// superseded, repeats included. A key the winning batch itself emits twice,
/// or a key claimed by two sources of distinct non-`all` scopes, is a
/// conflict.
#[instrument(skip(batches), fields(dataset = %dataset, sources = batches.len()))]
pub fn merge(dataset: DatasetKind, batches: &[AdaptedBatch]) -> Result<MergedDataset, DomainError> {
    let schema = dataset.schema();

    let mut order: Vec<&AdaptedBatch> = batches.iter().collect();
    order.sort_by(|a, b| {
        b.precedence
            .cmp(&a.precedence)
            .then_with(|| a.vintage_id.cmp(&b.vintage_id))
    });

    let mut rows = Vec::with_capacity(batches.iter().map(|b| b.rows.len()).sum());
    let mut owners: HashMap<EntityKey, usize> = HashMap::new();
    let mut report = MergeReport::default();

    for (index, batch) in order.iter().enumerate() {
        if batch.dataset != dataset {
            return Err(DomainError::MergeConflict {
                key: batch.vintage_id.clone(),
                reason: format!(
                    "vintage feeds {} and cannot be merged into {}",
                    batch.dataset, dataset
                ),
            });
        }

        let mut contribution = SourceContribution {
            vintage_id: batch.vintage_id.clone(),
            precedence: batch.precedence,
            scope: batch.scope,
            kept: 0,
            superseded: 0,
        };
        for row in &batch.rows {
            let key = schema.key_of(row);
            match owners.get(&key) {
                Some(&owner) if owner == index => {
                    return Err(DomainError::MergeConflict {
                        key: key.to_string(),
                        reason: format!("emitted twice by vintage '{}'", batch.vintage_id),
                    });
                }
                Some(&owner) => {
                    let winner = order[owner];
                    if !winner.scope.overlaps(&batch.scope) {
                        return Err(DomainError::MergeConflict {
                            key: key.to_string(),
                            reason: format!(
                                "claimed by '{}' ({}) and '{}' ({}), whose scopes are disjoint",
                                winner.vintage_id, winner.scope, batch.vintage_id, batch.scope
                            ),
                        });
                    }
                    debug!(
                        key = %key,
                        winner = %winner.vintage_id,
                        loser = %batch.vintage_id,
                        "Row superseded"
                    );
                    contribution.superseded += 1;
                }
                None => {
                    owners.insert(key, index);
                    rows.push(row.clone());
                    contribution.kept += 1;
                }
            }
        }
        report.sources.push(contribution);
    }

    info!(
        kept = report.kept(),
        superseded = report.superseded(),
        "Merged {}",
        dataset
    );
    Ok(MergedDataset {
        dataset,
        rows,
        report,
    })
}
