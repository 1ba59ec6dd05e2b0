//! Tabular dataset: the parsed spreadsheet on the way in, the table snapshot on the way out

use std::collections::HashSet;

use crate::error::{SyncError, SyncResult};

use super::Value;

/// Storage type inferred for a dataset column when it is staged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Double,
    Boolean,
    Text,
}

/// Ordered, uniquely named columns with one value per column in every row
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Dataset {
    /// Build a dataset, rejecting duplicate column names and ragged rows
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> SyncResult<Self> {
        let mut seen = HashSet::new();
        for name in &columns {
            if !seen.insert(name.as_str()) {
                return Err(SyncError::Validation(format!(
                    "Duplicate column name '{}'",
                    name
                )));
            }
        }

        for (idx, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(SyncError::Validation(format!(
                    "Row {} has {} values but the dataset has {} columns",
                    idx + 1,
                    row.len(),
                    columns.len()
                )));
            }
        }

        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// First `n` rows, for previews
    pub fn head(&self, n: usize) -> &[Vec<Value>] {
        &self.rows[..n.min(self.rows.len())]
    }

    /// Values of one column, top to bottom
    pub fn column_values(&self, index: usize) -> impl Iterator<Item = &Value> {
        self.rows.iter().filter_map(move |row| row.get(index))
    }

    /// Infer the staging type of a column from its non-null values
    ///
    /// Integers widen to doubles when mixed with floats; any other mix,
    /// as well as an all-null column, falls back to text.
    pub fn column_type(&self, index: usize) -> ColumnType {
        let mut inferred: Option<ColumnType> = None;

        for value in self.column_values(index) {
            let current = match value {
                Value::Null => continue,
                Value::Int(_) => ColumnType::Integer,
                Value::Float(_) => ColumnType::Double,
                Value::Bool(_) => ColumnType::Boolean,
                Value::Text(_) | Value::DateTime(_) => return ColumnType::Text,
            };

            inferred = Some(match (inferred, current) {
                (None, t) => t,
                (Some(a), b) if a == b => a,
                (Some(ColumnType::Integer), ColumnType::Double)
                | (Some(ColumnType::Double), ColumnType::Integer) => ColumnType::Double,
                _ => return ColumnType::Text,
            });
        }

        inferred.unwrap_or(ColumnType::Text)
    }

    /// Column names paired with their inferred staging types
    pub fn column_types(&self) -> Vec<(String, ColumnType)> {
        self.columns
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.clone(), self.column_type(idx)))
            .collect()
    }
}
