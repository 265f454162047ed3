// schoolcanon/src/main.rs

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG=debug schoolcanon run ... for adapter-level events
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            project_dir,
            select,
            strict,
        } => commands::run::execute(project_dir, select, strict).await,
        Commands::Clean { project_dir } => commands::clean::execute(project_dir),
        Commands::Vintages {
            project_dir,
            dataset,
        } => commands::vintages::execute(project_dir, dataset),
        Commands::Inspect {
            project_dir,
            table,
            limit,
        } => commands::inspect::execute(project_dir, table, limit),
        Commands::Docs { project_dir } => commands::docs::execute(project_dir),
    }
}
