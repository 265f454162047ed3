// schoolcanon-core/src/application/catalog.rs

use chrono::Utc;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::application::pipeline::{RunResult, load_run_results};
use crate::domain::schema::{DatasetKind, FieldKind};
use crate::domain::vintage::VintageRegistry;
use crate::error::CanonError;
use crate::infrastructure::fs::{atomic_write, write_json};
use crate::infrastructure::render::CATALOG_TEMPLATE;
use crate::ports::TemplateEngine;

pub const CATALOG_MARKDOWN: &str = "catalog.md";
pub const CATALOG_JSON: &str = "catalog.json";

// --- DTOs (Data Transfer Objects) ---
// Exactly what the data dictionary displays.

#[derive(Serialize)]
pub struct CatalogArtifact {
    pub generated_at: String,
    pub project: String,
    pub schema_version: u32,
    pub last_run: Option<LastRun>,
    pub datasets: Vec<CatalogDataset>,
    pub vintages: Vec<CatalogVintage>,
}

#[derive(Serialize)]
pub struct LastRun {
    pub generated_at: String,
    pub success: bool,
    pub elapsed: f64,
}

#[derive(Serialize)]
pub struct CatalogDataset {
    pub name: String,
    pub key: Vec<String>,
    pub population: String,
    pub rows: Option<usize>,
    pub columns: Vec<CatalogColumn>,
}

#[derive(Serialize)]
pub struct CatalogColumn {
    pub name: String,
    pub sql_type: String,
    pub kind: String,
}

#[derive(Serialize)]
pub struct CatalogVintage {
    pub id: String,
    pub dataset: String,
    pub adapter: String,
    pub years: String,
    pub precedence: u32,
    pub scope: String,
    pub has_rollup: bool,
    pub description: Option<String>,
    pub last_status: Option<String>,
}

fn kind_label(kind: &FieldKind) -> String {
    match kind {
        FieldKind::Identifier => "identifier".into(),
        FieldKind::AcademicYear => "academic year".into(),
        FieldKind::Integer => "integer".into(),
        FieldKind::Population => "population".into(),
        FieldKind::Count => "count".into(),
        FieldKind::UnboundedCount => "count (unbounded)".into(),
        FieldKind::Percentage {
            numerator: Some(count),
        } => format!("share of `{}`", count),
        FieldKind::Percentage { numerator: None } => "share".into(),
        FieldKind::Score => "score".into(),
        FieldKind::Category => "category".into(),
        FieldKind::Subject => "subject".into(),
        FieldKind::Grade => "grade".into(),
        FieldKind::Text => "text".into(),
        FieldKind::Flag => "flag".into(),
    }
}

// --- GENERATOR SERVICE ---

pub struct CatalogGenerator;

impl CatalogGenerator {
    /// Builds the data dictionary from the canonical schemas, the registry and
    /// the last run results, then writes `catalog.md` and `catalog.json` into
    /// `target_dir`. Returns the Markdown path.
    pub fn generate(
        project_name: &str,
        target_dir: &Path,
        registry: &VintageRegistry,
        engine: &dyn TemplateEngine,
    ) -> Result<PathBuf, CanonError> {
        println!("📚 Generating Data Dictionary...");

        let last_run = load_run_results(target_dir);
        let artifact = Self::build(project_name, registry, last_run.as_ref());

        if !target_dir.exists() {
            fs::create_dir_all(target_dir)?;
        }
        let context = serde_json::to_value(&artifact)
            .map_err(|e| CanonError::InternalError(format!("catalog context: {}", e)))?;
        let markdown = engine.render(CATALOG_TEMPLATE, &context)?;

        let md_path = target_dir.join(CATALOG_MARKDOWN);
        atomic_write(&md_path, markdown)?;
        write_json(target_dir.join(CATALOG_JSON), &artifact)?;

        println!("✨ Data dictionary generated at: {}", md_path.display());
        Ok(md_path)
    }

    pub fn build(
        project_name: &str,
        registry: &VintageRegistry,
        last_run: Option<&RunResult>,
    ) -> CatalogArtifact {
        let datasets = DatasetKind::ALL
            .into_iter()
            .map(|dataset| {
                let schema = dataset.schema();
                let rows = last_run.and_then(|run| {
                    run.datasets
                        .iter()
                        .find(|d| d.dataset == dataset)
                        .map(|d| d.rows)
                });
                CatalogDataset {
                    name: dataset.as_str().to_string(),
                    key: schema.key.iter().map(|k| k.to_string()).collect(),
                    population: schema.population.to_string(),
                    rows,
                    columns: schema
                        .fields
                        .iter()
                        .map(|f| CatalogColumn {
                            name: f.name.to_string(),
                            sql_type: f.kind.sql_type().to_string(),
                            kind: kind_label(&f.kind),
                        })
                        .collect(),
                }
            })
            .collect();

        let vintages = registry
            .iter()
            .map(|v| {
                let d = &v.descriptor;
                let last_status = last_run.and_then(|run| {
                    run.vintages
                        .iter()
                        .find(|o| o.vintage_id == d.id)
                        .map(|o| o.status.as_str().to_string())
                });
                CatalogVintage {
                    id: d.id.clone(),
                    dataset: v.dataset().as_str().to_string(),
                    adapter: d.adapter.as_str().to_string(),
                    years: d.year_range.to_string(),
                    precedence: d.precedence,
                    scope: d.population_scope.as_str().to_string(),
                    has_rollup: v.has_rollup,
                    description: d.description.clone(),
                    last_status,
                }
            })
            .collect();

        CatalogArtifact {
            generated_at: Utc::now().to_rfc3339(),
            project: project_name.to_string(),
            schema_version: DatasetKind::Exams.schema().version,
            last_run: last_run.map(|run| LastRun {
                generated_at: run.generated_at.clone(),
                success: run.success,
                elapsed: run.elapsed,
            }),
            datasets,
            vintages,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::infrastructure::render::JinjaRenderer;
    use anyhow::Result;
    use tempfile::tempdir;

    #[test]
    fn test_catalog_covers_schemas_and_registry() -> Result<()> {
        let registry = VintageRegistry::builtin()?;
        let artifact = CatalogGenerator::build("nyc", &registry, None);

        assert_eq!(artifact.datasets.len(), 3);
        let exams = &artifact.datasets[1];
        assert_eq!(exams.population, "number_tested");
        assert_eq!(exams.rows, None);
        assert_eq!(exams.columns.len(), DatasetKind::Exams.schema().fields.len());
        assert_eq!(artifact.vintages.len(), registry.len());

        let state = artifact.vintages.iter().find(|v| v.id == "state_exams").unwrap();
        assert!(!state.has_rollup);
        assert_eq!(state.scope, "all");

        let regents = &artifact.datasets[2];
        assert_eq!(regents.name, "regents");
        assert_eq!(regents.key, vec!["dbn", "ay", "regents_exam", "category"]);
        assert!(artifact.vintages.iter().any(|v| v.dataset == "regents"));
        Ok(())
    }

    #[test]
    fn test_generate_writes_markdown_and_json() -> Result<()> {
        let dir = tempdir()?;
        let registry = VintageRegistry::builtin()?;
        let path = CatalogGenerator::generate("nyc", dir.path(), &registry, &JinjaRenderer::new())?;

        let markdown = fs::read_to_string(&path)?;
        assert!(markdown.starts_with("# nyc data dictionary"));
        assert!(markdown.contains("## `demographics`"));
        assert!(markdown.contains("| `demo_2023` |"));
        assert!(dir.path().join(CATALOG_JSON).exists());
        Ok(())
    }
}
