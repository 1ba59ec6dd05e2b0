//! Identifier checks and qualified table references
//!
//! Column names arrive from spreadsheet headers, so they are checked against
//! an allow-list before they are quoted into generated SQL.

use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{SyncError, SyncResult};

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("identifier pattern is valid"));

/// Check whether a name may be used as an SQL identifier
pub fn is_valid_identifier(name: &str) -> bool {
    IDENTIFIER_RE.is_match(name)
}

/// Validate a column name taken from a dataset header
pub fn validate_column_name(name: &str) -> SyncResult<()> {
    if is_valid_identifier(name) {
        Ok(())
    } else {
        Err(SyncError::Validation(format!(
            "Column name '{}' is not allowed (use letters, digits and underscores only)",
            name
        )))
    }
}

/// Destination table: `schema.table` or a bare `table`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    schema: Option<String>,
    name: String,
}

impl TableRef {
    pub fn new(schema: Option<&str>, name: &str) -> SyncResult<Self> {
        for part in schema.iter().chain(std::iter::once(&name)) {
            if !is_valid_identifier(part) {
                return Err(SyncError::Configuration(format!(
                    "Invalid table name part '{}' (use letters, digits and underscores only)",
                    part
                )));
            }
        }

        Ok(Self {
            schema: schema.map(str::to_string),
            name: name.to_string(),
        })
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl FromStr for TableRef {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('.').collect();
        match parts.as_slice() {
            [name] => TableRef::new(None, name),
            [schema, name] => TableRef::new(Some(schema), name),
            _ => Err(SyncError::Configuration(format!(
                "Table reference '{}' must be 'table' or 'schema.table'",
                s
            ))),
        }
    }
}

impl std::fmt::Display for TableRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{}.{}", schema, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}
