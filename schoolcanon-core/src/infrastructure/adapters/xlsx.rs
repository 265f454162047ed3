// schoolcanon-core/src/infrastructure/adapters/xlsx.rs

use calamine::{Data, Range, Reader, open_workbook_auto};
use std::path::Path;
use tracing::{debug, info};

use crate::domain::schema::RawTable;
use crate::infrastructure::error::InfrastructureError;

/// Cell text as the normalizer expects it. Integral floats lose their
/// fraction, dates render as `MM/DD/YYYY`, error cells become blank.
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{:.0}", f),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|d| d.format("%m/%d/%Y").to_string())
            .unwrap_or_else(|| dt.as_f64().to_string()),
    }
}

/// First non-empty row is the header; fully blank rows are skipped.
fn range_to_table(range: &Range<Data>) -> RawTable {
    let mut rows = range
        .rows()
        .map(|r| r.iter().map(cell_text).collect::<Vec<_>>())
        .filter(|r| r.iter().any(|c| !c.is_empty()));

    let Some(headers) = rows.next() else {
        return RawTable::default();
    };
    let mut table = RawTable::new(headers);
    table.rows.extend(rows);
    table
}

/// Reads the listed sheets of a workbook and concatenates them, aligning
/// columns by header. An empty list reads the first sheet.
pub fn read_workbook(path: &Path, sheets: &[String]) -> Result<RawTable, InfrastructureError> {
    let mut workbook = open_workbook_auto(path)?;
    let available = workbook.sheet_names();

    let selected: Vec<String> = if sheets.is_empty() {
        available.first().cloned().into_iter().collect()
    } else {
        sheets.to_vec()
    };
    if let Some(missing) = selected.iter().find(|s| !available.contains(s)) {
        return Err(InfrastructureError::Source {
            path: path.display().to_string(),
            reason: format!("sheet '{}' not found (available: {:?})", missing, available),
        });
    }

    let mut combined: Option<RawTable> = None;
    for sheet in &selected {
        let range = workbook.worksheet_range(sheet)?;
        let table = range_to_table(&range);
        debug!(sheet = %sheet, rows = table.len(), "Sheet loaded");
        match combined.as_mut() {
            Some(all) => all.append(table),
            None => combined = Some(table),
        }
    }

    let table = combined.unwrap_or_default();
    info!(path = ?path, sheets = selected.len(), rows = table.len(), "Workbook loaded");
    Ok(table)
}
