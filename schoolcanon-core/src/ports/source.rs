// schoolcanon-core/src/ports/source.rs

use async_trait::async_trait;

use crate::domain::schema::RawTable;
use crate::domain::vintage::{CrosswalkSpec, VintageDescriptor};
use crate::error::CanonError;

/// Ingestion collaborator: hands over the raw table of one vintage.
#[async_trait]
pub trait RawSource: Send + Sync {
    /// `Ok(None)` when no input exists for the vintage. Unreadable input is an error.
    async fn fetch(&self, descriptor: &VintageDescriptor) -> Result<Option<RawTable>, CanonError>;

    /// Reads the identifier crosswalk a descriptor names. A configured but
    /// missing crosswalk is an error.
    async fn fetch_crosswalk(&self, spec: &CrosswalkSpec) -> Result<RawTable, CanonError>;

    /// Where the vintage would be read from, for reporting.
    fn locate(&self, descriptor: &VintageDescriptor) -> Option<String>;
}
