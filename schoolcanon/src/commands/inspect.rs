// schoolcanon/src/commands/inspect.rs
//
// USE CASE: Inspect a canonical table (schema + sample rows).

use std::path::PathBuf;

use anyhow::Context;
use schoolcanon_core::infrastructure::adapters::{DATABASE_FILE, sample_table};
use schoolcanon_core::infrastructure::config::load_project_config;

pub fn execute(project_dir: PathBuf, table: String, limit: usize) -> anyhow::Result<()> {
    let config = load_project_config(&project_dir)?;
    let db_path = config.target_dir(&project_dir).join(DATABASE_FILE);
    if !db_path.exists() {
        anyhow::bail!(
            "❌ Database not found at: {}\n👉 Have you run 'schoolcanon run'?",
            db_path.display()
        );
    }

    let (columns, rows) = sample_table(&db_path, &table, limit)
        .with_context(|| format!("Failed to read table '{}' from {:?}", table, db_path))?;

    println!("\n🔍 Inspecting Table: '{}'", table);
    println!("   Columns: [{}]", columns.join(", "));
    println!("   --- Rows (Limit {}) ---", limit);
    for row in rows {
        println!("   ➜ {}", row.join(" | "));
    }

    Ok(())
}
