//! Write a dataset to an xlsx workbook

use chrono::NaiveDateTime;
use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};

use crate::error::{SyncError, SyncResult};
use crate::sync::{DATETIME_FORMAT, Dataset, Value};

/// MIME type of the produced workbook
pub const XLSX_MIME_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Excel limits a sheet name to 31 characters
const MAX_SHEET_NAME_LEN: usize = 31;

/// Integers beyond this lose precision as Excel numbers and are written as text
const MAX_EXACT_INT: u64 = 9_007_199_254_740_992;

/// An export ready to be saved or served
#[derive(Debug, Clone)]
pub struct ExportFile {
    pub file_name: String,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

/// `export_<YYYYMMDD_HHMMSS>.xlsx`
pub fn export_file_name(now: NaiveDateTime) -> String {
    format!("export_{}.xlsx", now.format("%Y%m%d_%H%M%S"))
}

/// Build the export workbook for `dataset`, stamped with `now`
pub fn build_export_file(
    dataset: &Dataset,
    sheet_name: &str,
    now: NaiveDateTime,
) -> SyncResult<ExportFile> {
    Ok(ExportFile {
        file_name: export_file_name(now),
        mime_type: XLSX_MIME_TYPE,
        bytes: write_dataset_xlsx(dataset, sheet_name)?,
    })
}

/// Serialize a dataset to xlsx bytes: a bold header row, then one row per record
pub fn write_dataset_xlsx(dataset: &Dataset, sheet_name: &str) -> SyncResult<Vec<u8>> {
    write_workbook(dataset, sheet_name)
        .map_err(|e| SyncError::Spreadsheet(format!("Failed to write workbook: {}", e)))
}

fn write_workbook(dataset: &Dataset, sheet_name: &str) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();

    let name: String = sheet_name.chars().take(MAX_SHEET_NAME_LEN).collect();
    if !name.is_empty() {
        worksheet.set_name(&name)?;
    }

    let header_format = Format::new().set_bold();
    for (col, column) in dataset.columns().iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, column, &header_format)?;
    }

    for (row_idx, row) in dataset.rows().iter().enumerate() {
        let row_num = (row_idx + 1) as u32;
        for (col, value) in row.iter().enumerate() {
            write_value(worksheet, row_num, col as u16, value)?;
        }
    }

    workbook.save_to_buffer()
}

/// Null cells are left empty
fn write_value(ws: &mut Worksheet, row: u32, col: u16, value: &Value) -> Result<(), XlsxError> {
    match value {
        Value::Null => return Ok(()),
        Value::Int(i) if i.unsigned_abs() <= MAX_EXACT_INT => ws.write_number(row, col, *i as f64),
        Value::Int(i) => ws.write_string(row, col, i.to_string()),
        Value::Float(f) => ws.write_number(row, col, *f),
        Value::Bool(b) => ws.write_boolean(row, col, *b),
        Value::Text(s) => ws.write_string(row, col, s),
        Value::DateTime(dt) => ws.write_string(row, col, dt.format(DATETIME_FORMAT).to_string()),
    }?;
    Ok(())
}
