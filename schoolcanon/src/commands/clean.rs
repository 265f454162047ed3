// schoolcanon/src/commands/clean.rs
//
// USE CASE: Clean build artifacts.

use std::path::PathBuf;

use anyhow::Context;
use schoolcanon_core::application::clean_project;
use schoolcanon_core::infrastructure::config::load_project_config;

pub fn execute(project_dir: PathBuf) -> anyhow::Result<()> {
    let config = load_project_config(&project_dir).with_context(|| {
        format!(
            "Failed to load project configuration from {:?}",
            project_dir
        )
    })?;

    match clean_project(&project_dir, &config) {
        Ok(removed) if removed.is_empty() => println!("✨ Nothing to clean."),
        Ok(removed) => println!("✨ {} artifact(s) removed.", removed.len()),
        Err(e) => {
            eprintln!("❌ Clean failed: {}", e);
            std::process::exit(1);
        }
    }
    Ok(())
}
