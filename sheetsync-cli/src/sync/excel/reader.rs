//! Read the first sheet of a spreadsheet into a dataset

use std::io::{Read, Seek};
use std::path::Path;

use calamine::{Data, Reader, Sheets, open_workbook_auto};

use crate::error::{SyncError, SyncResult};
use crate::sync::{Dataset, Value};

/// Largest float that still converts to an exact integer
const MAX_EXACT_FLOAT: f64 = 9_007_199_254_740_992.0;

/// Read a spreadsheet file (xlsx, xlsm, xlsb, xls or ods)
pub fn read_dataset_path(path: &Path) -> SyncResult<Dataset> {
    let workbook = open_workbook_auto(path).map_err(|e| {
        SyncError::Spreadsheet(format!("Failed to open {}: {}", path.display(), e))
    })?;
    read_first_sheet(workbook)
}

/// Read a spreadsheet held in memory
#[cfg(test)]
pub fn read_dataset_bytes(bytes: Vec<u8>) -> SyncResult<Dataset> {
    let workbook = calamine::open_workbook_auto_from_rs(std::io::Cursor::new(bytes))
        .map_err(|e| SyncError::Spreadsheet(format!("Failed to open spreadsheet: {}", e)))?;
    read_first_sheet(workbook)
}

/// First row is the header, every further non-empty row is data
fn read_first_sheet<RS: Read + Seek>(mut workbook: Sheets<RS>) -> SyncResult<Dataset> {
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| SyncError::Spreadsheet("Spreadsheet has no sheets".to_string()))?;

    let range = workbook.worksheet_range(&sheet_name).map_err(|e| {
        SyncError::Spreadsheet(format!("Failed to read sheet '{}': {}", sheet_name, e))
    })?;

    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Dataset::new(Vec::new(), Vec::new());
    };

    let data_rows: Vec<&[Data]> = rows
        .filter(|row| row.iter().any(|cell| !matches!(cell, Data::Empty)))
        .collect();

    // header-less columns are dropped when they hold no data, rejected otherwise
    let mut columns = Vec::new();
    let mut kept = Vec::new();
    for (col, cell) in header.iter().enumerate() {
        match header_name(cell) {
            Some(name) => {
                columns.push(name);
                kept.push(col);
            }
            None => {
                let has_data = data_rows
                    .iter()
                    .any(|row| row.get(col).is_some_and(|c| !matches!(c, Data::Empty)));
                if has_data {
                    return Err(SyncError::Validation(format!(
                        "Column {} has data but no header",
                        col + 1
                    )));
                }
            }
        }
    }

    let values = data_rows
        .iter()
        .map(|row| {
            kept.iter()
                .map(|&col| row.get(col).map(cell_value).unwrap_or(Value::Null))
                .collect()
        })
        .collect();

    log::debug!(
        "Read {} rows x {} columns from sheet '{}'",
        data_rows.len(),
        columns.len(),
        sheet_name
    );

    Dataset::new(columns, values)
}

fn header_name(cell: &Data) -> Option<String> {
    let name = match cell {
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) if f.fract() == 0.0 => (*f as i64).to_string(),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!name.is_empty()).then_some(name)
}

fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Empty | Data::Error(_) => Value::Null,
        Data::Int(i) => Value::Int(*i),
        // spreadsheets store every number as a float
        Data::Float(f) if f.fract() == 0.0 && f.abs() < MAX_EXACT_FLOAT => Value::Int(*f as i64),
        Data::Float(f) => Value::Float(*f),
        Data::Bool(b) => Value::Bool(*b),
        Data::String(s) if s.is_empty() => Value::Null,
        Data::String(s) => Value::Text(s.clone()),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(naive) => Value::DateTime(naive),
            None => Value::Float(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => Value::Text(s.clone()),
    }
}
