// schoolcanon/src/commands/docs.rs
//
// USE CASE: Generate the data dictionary (Markdown + JSON).

use std::path::PathBuf;

use anyhow::Context;
use schoolcanon_core::application::CatalogGenerator;
use schoolcanon_core::infrastructure::config::{load_project_config, load_registry};
use schoolcanon_core::infrastructure::render::JinjaRenderer;

pub fn execute(project_dir: PathBuf) -> anyhow::Result<()> {
    let config = load_project_config(&project_dir)?;
    let registry = load_registry(&project_dir, &config)
        .with_context(|| format!("Failed to load the vintage catalog for {:?}", project_dir))?;
    let target_dir = config.target_dir(&project_dir);

    let renderer = JinjaRenderer::new();
    let path = CatalogGenerator::generate(&config.name, &target_dir, &registry, &renderer)
        .context("Failed to generate the data dictionary")?;

    println!(
        "✨ Documentation generated successfully in {}",
        path.display()
    );
    Ok(())
}
