// schoolcanon-core/src/ports/sink.rs

use async_trait::async_trait;
use std::path::PathBuf;

use crate::domain::schema::{CanonicalRecord, DatasetKind};
use crate::error::CanonError;

/// Downstream consumer of the canonical dataset.
#[async_trait]
pub trait DatasetSink: Send + Sync {
    /// Replaces the stored dataset with `rows` and returns the files written.
    /// Rows arrive sorted by entity key and conforming to the dataset schema.
    async fn write(
        &self,
        dataset: DatasetKind,
        rows: &[CanonicalRecord],
    ) -> Result<Vec<PathBuf>, CanonError>;

    fn engine_name(&self) -> &str;
}
