// schoolcanon-core/src/infrastructure/adapters/filesystem.rs

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};
use walkdir::WalkDir;

use super::duckdb::read_csv_table;
use super::xlsx::read_workbook;
use crate::domain::schema::RawTable;
use crate::domain::vintage::{CrosswalkSpec, SourceFormat, VintageDescriptor};
use crate::error::CanonError;
use crate::infrastructure::error::InfrastructureError;
use crate::ports::source::RawSource;

/// Raw files under the project's data directory.
///
/// A vintage's file is, in order: the project's `sources` entry, the
/// descriptor's `source.path`, or the first `<vintage_id>.csv|.xlsx|.xls`
/// found walking the data directory.
pub struct FileSystemSource {
    data_dir: PathBuf,
    sources: BTreeMap<String, String>,
}

impl FileSystemSource {
    pub fn new(data_dir: PathBuf, sources: BTreeMap<String, String>) -> Self {
        Self { data_dir, sources }
    }

    fn resolve(&self, descriptor: &VintageDescriptor) -> Option<PathBuf> {
        let explicit = self
            .sources
            .get(&descriptor.id)
            .or(descriptor.source.path.as_ref());
        if let Some(rel) = explicit {
            return Some(self.data_dir.join(rel));
        }
        self.discover(&descriptor.id)
    }

    fn discover(&self, vintage_id: &str) -> Option<PathBuf> {
        let mut found: Vec<PathBuf> = WalkDir::new(&self.data_dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| {
                let stem_matches = p.file_stem().is_some_and(|s| s == vintage_id);
                let known_format = p
                    .extension()
                    .and_then(|e| e.to_str())
                    .and_then(SourceFormat::from_extension)
                    .is_some();
                stem_matches && known_format
            })
            .collect();
        found.sort();
        found.into_iter().next()
    }
}

fn format_of(path: &Path, declared: Option<SourceFormat>) -> Result<SourceFormat, InfrastructureError> {
    declared
        .or_else(|| {
            path.extension()
                .and_then(|e| e.to_str())
                .and_then(SourceFormat::from_extension)
        })
        .ok_or_else(|| InfrastructureError::Source {
            path: path.display().to_string(),
            reason: "unknown file format (expected csv or xlsx)".to_string(),
        })
}

async fn read_table(
    path: PathBuf,
    format: SourceFormat,
    sheets: Vec<String>,
) -> Result<RawTable, CanonError> {
    let table = tokio::task::spawn_blocking(move || match format {
        SourceFormat::Csv => read_csv_table(&path),
        SourceFormat::Xlsx => read_workbook(&path, &sheets),
    })
    .await
    .map_err(|e| CanonError::InternalError(format!("reader task failed: {}", e)))??;
    Ok(table)
}

#[async_trait]
impl RawSource for FileSystemSource {
    #[instrument(skip(self, descriptor), fields(vintage = %descriptor.id))]
    async fn fetch(&self, descriptor: &VintageDescriptor) -> Result<Option<RawTable>, CanonError> {
        let Some(path) = self.resolve(descriptor) else {
            debug!("No input file found");
            return Ok(None);
        };
        if !path.exists() {
            return Err(InfrastructureError::Source {
                path: path.display().to_string(),
                reason: "file does not exist".to_string(),
            }
            .into());
        }

        let format = format_of(&path, descriptor.source.format)?;
        let table = read_table(path, format, descriptor.source.sheets.clone()).await?;
        Ok(Some(table))
    }

    #[instrument(skip(self, spec), fields(crosswalk = %spec.path))]
    async fn fetch_crosswalk(&self, spec: &CrosswalkSpec) -> Result<RawTable, CanonError> {
        let path = self.data_dir.join(&spec.path);
        if !path.exists() {
            return Err(InfrastructureError::Source {
                path: path.display().to_string(),
                reason: "crosswalk file does not exist".to_string(),
            }
            .into());
        }
        let format = format_of(&path, None)?;
        read_table(path, format, Vec::new()).await
    }

    fn locate(&self, descriptor: &VintageDescriptor) -> Option<String> {
        self.resolve(descriptor).map(|p| p.display().to_string())
    }
}
