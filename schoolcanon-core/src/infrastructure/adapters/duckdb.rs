// schoolcanon-core/src/infrastructure/adapters/duckdb.rs

use async_trait::async_trait;
use duckdb::types::{ToSql, Value};
use duckdb::{Config, Connection};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

// Hexagonal imports
use crate::domain::schema::{CanonicalRecord, CanonicalValue, DatasetKind, RawTable};
use crate::error::CanonError;
use crate::infrastructure::config::ExportFormat;
use crate::infrastructure::error::InfrastructureError;
use crate::ports::sink::DatasetSink;

pub const DATABASE_FILE: &str = "schoolcanon.duckdb";

fn sql_literal(path: &Path) -> String {
    path.to_string_lossy().replace('\'', "''")
}

fn open(db_path: &str) -> Result<Connection, InfrastructureError> {
    let config = Config::default();
    let conn = if db_path == ":memory:" {
        Connection::open_in_memory_with_flags(config)?
    } else {
        Connection::open_with_flags(db_path, config)?
    };
    Ok(conn)
}

fn column_names(conn: &Connection, relation: &str) -> Result<Vec<String>, InfrastructureError> {
    let mut stmt = conn.prepare(&format!("DESCRIBE SELECT * FROM {}", relation))?;
    let names = stmt.query_map([], |row| row.get::<_, String>(0))?;
    let mut columns = Vec::new();
    for name in names {
        columns.push(name?);
    }
    Ok(columns)
}

fn read_strings(
    conn: &Connection,
    query: &str,
    width: usize,
) -> Result<Vec<Vec<String>>, InfrastructureError> {
    let mut stmt = conn.prepare(query)?;
    let rows = stmt.query_map([], |row| {
        (0..width)
            .map(|i| row.get::<_, Option<String>>(i).map(Option::unwrap_or_default))
            .collect::<Result<Vec<_>, _>>()
    })?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

// =============================================================================
//  CSV INGESTION
// =============================================================================

/// Reads a CSV file with every column as text. Empty cells come back as "".
pub fn read_csv_table(path: &Path) -> Result<RawTable, InfrastructureError> {
    let conn = open(":memory:")?;
    let relation = format!(
        "read_csv('{}', header = true, all_varchar = true, sample_size = -1)",
        sql_literal(path)
    );
    let headers = column_names(&conn, &relation)?;
    let rows = read_strings(&conn, &format!("SELECT * FROM {}", relation), headers.len())?;
    debug!(path = ?path, columns = headers.len(), rows = rows.len(), "CSV loaded");
    Ok(RawTable { headers, rows })
}

/// First `limit` rows of a persisted table, every value rendered as text.
pub fn sample_table(
    db_path: &Path,
    table: &str,
    limit: usize,
) -> Result<(Vec<String>, Vec<Vec<String>>), InfrastructureError> {
    let conn = open(&db_path.to_string_lossy())?;
    let relation = format!("\"{}\"", table.replace('"', ""));
    let headers = column_names(&conn, &relation)?;
    let rows = read_strings(
        &conn,
        &format!("SELECT COLUMNS(*)::VARCHAR FROM {} LIMIT {}", relation, limit),
        headers.len(),
    )?;
    Ok((headers, rows))
}

// =============================================================================
//  DATASET SINK
// =============================================================================

fn to_sql_value(value: Option<&CanonicalValue>) -> Value {
    use CanonicalValue as V;
    match value {
        None | Some(V::Null) => Value::Null,
        Some(V::Int(i)) => Value::BigInt(*i),
        Some(V::Count(n)) => Value::UBigInt(*n),
        Some(V::Pct(p)) | Some(V::Float(p)) => Value::Double(*p),
        Some(V::Flag(b)) => Value::Boolean(*b),
        Some(other) => Value::Text(other.render()),
    }
}

pub struct DuckDbSink {
    conn: Arc<Mutex<Connection>>,
    export_dir: PathBuf,
    exports: Vec<ExportFormat>,
}

impl DuckDbSink {
    pub fn new(
        db_path: &str,
        export_dir: PathBuf,
        exports: Vec<ExportFormat>,
    ) -> Result<Self, InfrastructureError> {
        Ok(Self {
            conn: Arc::new(Mutex::new(open(db_path)?)),
            export_dir,
            exports,
        })
    }

    fn write_table(
        &self,
        dataset: DatasetKind,
        rows: &[CanonicalRecord],
    ) -> Result<Vec<PathBuf>, InfrastructureError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| InfrastructureError::Io(std::io::Error::other("DuckDB Mutex Poisoned")))?;
        let schema = dataset.schema();
        let table = dataset.as_str();

        let columns: Vec<String> = schema
            .fields
            .iter()
            .map(|f| format!("\"{}\" {}", f.name, f.kind.sql_type()))
            .collect();
        conn.execute_batch(&format!(
            "CREATE OR REPLACE TABLE \"{}\" ({})",
            table,
            columns.join(", ")
        ))?;

        {
            let mut appender = conn.appender(table)?;
            for row in rows {
                let values: Vec<Value> = schema
                    .fields
                    .iter()
                    .map(|f| to_sql_value(row.get(f.name)))
                    .collect();
                let params: Vec<&dyn ToSql> = values.iter().map(|v| v as &dyn ToSql).collect();
                appender.append_row(params.as_slice())?;
            }
            appender.flush()?;
        }
        info!(table, rows = rows.len(), "Table written");

        let mut written = Vec::with_capacity(self.exports.len());
        for format in &self.exports {
            let path = self
                .export_dir
                .join(format!("{}.{}", table, format.extension()));
            let options = match format {
                ExportFormat::Csv => "FORMAT CSV, HEADER",
                ExportFormat::Parquet => "FORMAT PARQUET",
            };
            conn.execute_batch(&format!(
                "COPY \"{}\" TO '{}' ({})",
                table,
                sql_literal(&path),
                options
            ))?;
            debug!(path = ?path, "Exported");
            written.push(path);
        }
        Ok(written)
    }
}

#[async_trait]
impl DatasetSink for DuckDbSink {
    async fn write(
        &self,
        dataset: DatasetKind,
        rows: &[CanonicalRecord],
    ) -> Result<Vec<PathBuf>, CanonError> {
        Ok(self.write_table(dataset, rows)?)
    }

    fn engine_name(&self) -> &str {
        "duckdb"
    }
}
