// schoolcanon-core/src/infrastructure/adapters/mod.rs

pub mod duckdb;
pub mod filesystem;
pub mod xlsx;

pub use duckdb::{DATABASE_FILE, DuckDbSink, read_csv_table, sample_table};
pub use filesystem::FileSystemSource;
pub use xlsx::read_workbook;
