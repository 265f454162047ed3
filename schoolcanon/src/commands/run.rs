// schoolcanon/src/commands/run.rs
//
// USE CASE: Run the harmonization pipeline.

use std::path::PathBuf;

use anyhow::Context;
use schoolcanon_core::CanonError;
use schoolcanon_core::application::run_pipeline;
use schoolcanon_core::infrastructure::adapters::{DATABASE_FILE, DuckDbSink, FileSystemSource};
use schoolcanon_core::infrastructure::config::{load_project_config, load_registry};

pub async fn execute(project_dir: PathBuf, select: Vec<String>, strict: bool) -> anyhow::Result<()> {
    let start = std::time::Instant::now();

    // A. Load the Config (Infra)
    println!("⚙️  Loading configuration...");
    let mut config = load_project_config(&project_dir).with_context(|| {
        format!(
            "Failed to load project configuration from {:?}",
            project_dir
        )
    })?;
    if strict {
        config.strict = true;
    }
    println!("   Project: {} (v{})", config.name, config.version);

    let registry = load_registry(&project_dir, &config)
        .with_context(|| format!("Failed to load the vintage catalog for {:?}", project_dir))?;
    println!("   Vintages: {} registered", registry.len());
    tracing::debug!(strict = config.strict, selected = select.len(), "Run configured");

    // B. Adapters: raw files in, DuckDB + exports out
    let target_dir = config.target_dir(&project_dir);
    std::fs::create_dir_all(&target_dir)
        .with_context(|| format!("Failed to create target dir {:?}", target_dir))?;
    let db_path = target_dir.join(DATABASE_FILE);
    println!("   Engine: DuckDB 🦆 ({})", db_path.display());
    let sink = DuckDbSink::new(&db_path.to_string_lossy(), target_dir.clone(), config.exports.clone())
        .with_context(|| format!("Failed to initialize DuckDB at {:?}", db_path))?;
    let source = FileSystemSource::new(config.data_dir(&project_dir), config.sources.clone());

    // C. Run the Pipeline (Application Layer)
    let result = run_pipeline(&project_dir, &config, &registry, &source, &sink, &select).await;

    match result {
        Ok(run_res) => {
            if run_res.success {
                println!("\n✨ SUCCESS! Pipeline finished in {:.2?}", start.elapsed());
            } else {
                eprintln!(
                    "\n❌ FAILURE. {} vintage(s) failed in strict mode.",
                    run_res.failures().count()
                );
                std::process::exit(1);
            }
        }
        Err(CanonError::Domain(e)) => {
            eprintln!("\n💥 CRITICAL PIPELINE ERROR");
            eprintln!("{:?}", miette::Report::new(e));
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("\n💥 CRITICAL PIPELINE ERROR: {}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}
