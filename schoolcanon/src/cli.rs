// schoolcanon/src/cli.rs
//
// Single source of truth for all CLI definitions (Clap structs).

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use schoolcanon_core::domain::schema::DatasetKind;

#[derive(Parser)]
#[command(name = "schoolcanon")]
#[command(about = "Harmonizes NYC school demographic and exam releases into one canonical dataset", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DatasetArg {
    Demographics,
    Exams,
    Regents,
}

impl From<DatasetArg> for DatasetKind {
    fn from(arg: DatasetArg) -> Self {
        match arg {
            DatasetArg::Demographics => DatasetKind::Demographics,
            DatasetArg::Exams => DatasetKind::Exams,
            DatasetArg::Regents => DatasetKind::Regents,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// 🚀 Runs the pipeline (Raw files -> Adapters -> Merge -> Canonical tables)
    Run {
        /// Project directory
        #[arg(long, default_value = ".")]
        project_dir: PathBuf,

        /// Run only these vintages (ex: "demo_2016,state_exams")
        #[arg(long, short, value_delimiter = ',')]
        select: Vec<String>,

        /// Fail the run when any vintage fails
        #[arg(long)]
        strict: bool,
    },

    /// 🧹 Cleans build artifacts (clean-targets, target/ by default)
    Clean {
        #[arg(long, default_value = ".")]
        project_dir: PathBuf,
    },

    /// 🗂️  Lists the vintage catalog
    Vintages {
        #[arg(long, default_value = ".")]
        project_dir: PathBuf,

        /// Only vintages feeding this dataset
        #[arg(long, short, value_enum)]
        dataset: Option<DatasetArg>,
    },

    /// 🔍 Inspects a canonical table (schema + sample rows)
    Inspect {
        #[arg(long, default_value = ".")]
        project_dir: PathBuf,

        /// Table name to inspect (demographics | exams)
        #[arg(long, short)]
        table: String,

        /// Number of sample rows to display
        #[arg(long, default_value = "5")]
        limit: usize,
    },

    /// 📚 Generates the data dictionary (catalog.md)
    Docs {
        #[arg(long, default_value = ".")]
        project_dir: PathBuf,
    },
}
