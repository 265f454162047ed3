// schoolcanon/src/commands/vintages.rs
//
// USE CASE: List the vintage catalog.

use std::path::PathBuf;

use anyhow::Context;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};
use schoolcanon_core::domain::schema::DatasetKind;
use schoolcanon_core::infrastructure::config::{load_project_config, load_registry};

use crate::cli::DatasetArg;

pub fn execute(project_dir: PathBuf, dataset: Option<DatasetArg>) -> anyhow::Result<()> {
    let config = load_project_config(&project_dir)?;
    let registry = load_registry(&project_dir, &config)
        .with_context(|| format!("Failed to load the vintage catalog for {:?}", project_dir))?;
    let filter = dataset.map(DatasetKind::from);

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            "id", "dataset", "adapter", "years", "precedence", "scope", "rollup",
        ]);

    let mut shown = 0;
    for vintage in registry.iter() {
        if filter.is_some_and(|d| d != vintage.dataset()) {
            continue;
        }
        let d = &vintage.descriptor;
        table.add_row(vec![
            d.id.clone(),
            vintage.dataset().to_string(),
            d.adapter.to_string(),
            d.year_range.to_string(),
            d.precedence.to_string(),
            d.population_scope.to_string(),
            if vintage.has_rollup { "native" } else { "synthesized" }.to_string(),
        ]);
        shown += 1;
    }

    println!("{table}");
    println!("🗂️  {} vintage(s)", shown);
    Ok(())
}
