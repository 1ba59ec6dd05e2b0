//! SQL generation per supported store
//!
//! Everything that differs between stores lives here: identifier quoting,
//! bind placeholders, staging DDL, the merge statement and the export
//! projection. Cell values never reach these strings; they are bound.

use std::collections::HashMap;
use std::str::FromStr;

use crate::error::{SyncError, SyncResult};
use crate::sync::ColumnType;

use super::TableRef;

/// Supported destination stores
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// PostgreSQL 15 or newer (needs `MERGE`)
    Postgres,
    /// SQLite, merging through `INSERT ... ON CONFLICT`
    Sqlite,
}

impl FromStr for Dialect {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Dialect::Postgres),
            "sqlite" => Ok(Dialect::Sqlite),
            other => Err(SyncError::Configuration(format!(
                "Unsupported driver '{}' (expected 'postgres' or 'sqlite')",
                other
            ))),
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dialect::Postgres => write!(f, "postgres"),
            Dialect::Sqlite => write!(f, "sqlite"),
        }
    }
}

impl Dialect {
    /// Map the backend name reported by an open connection
    pub fn from_backend_name(name: &str) -> SyncResult<Self> {
        match name.to_lowercase().as_str() {
            "postgresql" | "postgres" => Ok(Dialect::Postgres),
            "sqlite" => Ok(Dialect::Sqlite),
            other => Err(SyncError::Connection(format!(
                "Connected store '{}' is not supported",
                other
            ))),
        }
    }

    /// Whether the store needs host, user and password to connect
    pub fn is_networked(&self) -> bool {
        matches!(self, Dialect::Postgres)
    }

    /// Quote an identifier, doubling embedded quotes
    pub fn quote(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    /// Quoted, schema-qualified table name
    pub fn qualified(&self, table: &TableRef) -> String {
        match table.schema() {
            Some(schema) => format!("{}.{}", self.quote(schema), self.quote(table.name())),
            None => self.quote(table.name()),
        }
    }

    /// Bind placeholder for the 1-based parameter `n`
    pub fn placeholder(&self, n: usize) -> String {
        match self {
            Dialect::Postgres => format!("${}", n),
            Dialect::Sqlite => "?".to_string(),
        }
    }

    /// Upper bound on bind parameters per statement, kept below the store limit
    pub fn max_bind_params(&self) -> usize {
        match self {
            Dialect::Postgres => 65_000,
            Dialect::Sqlite => 32_000,
        }
    }

    pub fn column_type_sql(&self, column_type: ColumnType) -> &'static str {
        match (self, column_type) {
            (Dialect::Postgres, ColumnType::Integer) => "BIGINT",
            (Dialect::Postgres, ColumnType::Double) => "DOUBLE PRECISION",
            (Dialect::Postgres, ColumnType::Boolean) => "BOOLEAN",
            (Dialect::Postgres, ColumnType::Text) => "TEXT",
            (Dialect::Sqlite, ColumnType::Integer) => "INTEGER",
            (Dialect::Sqlite, ColumnType::Double) => "REAL",
            (Dialect::Sqlite, ColumnType::Boolean) => "INTEGER",
            (Dialect::Sqlite, ColumnType::Text) => "TEXT",
        }
    }

    /// `CREATE TEMPORARY TABLE` for the staging area
    ///
    /// Temporary tables are only visible to the connection that created them.
    pub fn create_staging_sql(&self, stage: &str, columns: &[(String, ColumnType)]) -> String {
        let column_defs = columns
            .iter()
            .map(|(name, ty)| format!("{} {}", self.quote(name), self.column_type_sql(*ty)))
            .collect::<Vec<_>>()
            .join(", ");

        format!("CREATE TEMPORARY TABLE {} ({})", self.quote(stage), column_defs)
    }

    /// Multi-row `INSERT` into the staging area with one placeholder per cell
    pub fn insert_staging_sql(&self, stage: &str, columns: &[String], row_count: usize) -> String {
        let column_list = self.column_list(columns);

        let mut param = 0;
        let rows = (0..row_count)
            .map(|_| {
                let cells = (0..columns.len())
                    .map(|_| {
                        param += 1;
                        self.placeholder(param)
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("({})", cells)
            })
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "INSERT INTO {} ({}) VALUES {}",
            self.quote(stage),
            column_list,
            rows
        )
    }

    pub fn drop_staging_sql(&self, stage: &str) -> String {
        format!("DROP TABLE {}", self.quote(stage))
    }

    /// The merge statement applying the staging area to the destination
    ///
    /// Rows matching on `key` get every other column updated, unmatched rows
    /// are inserted with all columns, destination-only rows are left alone.
    /// If `columns` holds only the key, matched rows are not touched.
    ///
    /// `target_types` maps destination columns to their declared types. On
    /// Postgres every staged column found there is cast to that type, since
    /// staging types follow the dataset and text has no implicit cast to
    /// dates, numbers or uuids. SQLite ignores it.
    pub fn merge_sql(
        &self,
        table: &TableRef,
        stage: &str,
        columns: &[String],
        key: &str,
        target_types: &HashMap<String, String>,
    ) -> String {
        let target = self.qualified(table);
        let source = self.quote(stage);
        let quoted_key = self.quote(key);
        let updatable: Vec<&String> = columns.iter().filter(|c| c.as_str() != key).collect();
        let column_list = self.column_list(columns);

        match self {
            Dialect::Postgres => {
                let source_value = |column: &str| {
                    let value = format!("source.{}", self.quote(column));
                    match target_types.get(column) {
                        Some(data_type) => format!("CAST({} AS {})", value, data_type),
                        None => value,
                    }
                };

                let source_values = columns
                    .iter()
                    .map(|c| source_value(c.as_str()))
                    .collect::<Vec<_>>()
                    .join(", ");

                let mut sql = format!(
                    "MERGE INTO {} AS target\nUSING {} AS source\nON target.{} = {}",
                    target,
                    source,
                    quoted_key,
                    source_value(key)
                );

                if !updatable.is_empty() {
                    let set_clauses = updatable
                        .iter()
                        .map(|c| format!("{} = {}", self.quote(c), source_value(c.as_str())))
                        .collect::<Vec<_>>()
                        .join(", ");
                    sql.push_str(&format!("\nWHEN MATCHED THEN\n    UPDATE SET {}", set_clauses));
                }

                sql.push_str(&format!(
                    "\nWHEN NOT MATCHED THEN\n    INSERT ({})\n    VALUES ({})",
                    column_list, source_values
                ));
                sql
            }
            Dialect::Sqlite => {
                // `WHERE true` keeps SQLite from reading ON CONFLICT as a join constraint
                let mut sql = format!(
                    "INSERT INTO {} ({})\nSELECT {} FROM {} WHERE true\nON CONFLICT ({})",
                    target, column_list, column_list, source, quoted_key
                );

                if updatable.is_empty() {
                    sql.push_str(" DO NOTHING");
                } else {
                    let set_clauses = updatable
                        .iter()
                        .map(|c| {
                            let col = self.quote(c);
                            format!("{} = excluded.{}", col, col)
                        })
                        .collect::<Vec<_>>()
                        .join(", ");
                    sql.push_str(&format!(" DO UPDATE SET {}", set_clauses));
                }
                sql
            }
        }
    }

    /// Query listing `(column name, declared type)` of a table in ordinal order
    ///
    /// Binds: schema (nullable), table name. Postgres types come from
    /// `format_type`, so they keep modifiers and user-defined names and can be
    /// used as cast targets as is.
    pub fn describe_columns_sql(&self) -> String {
        match self {
            Dialect::Postgres => "SELECT a.attname::text, format_type(a.atttypid, a.atttypmod) \
                 FROM pg_catalog.pg_attribute a \
                 JOIN pg_catalog.pg_class c ON c.oid = a.attrelid \
                 JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace \
                 WHERE n.nspname::text = COALESCE($1, current_schema()) \
                 AND c.relname::text = $2 \
                 AND a.attnum > 0 AND NOT a.attisdropped \
                 ORDER BY a.attnum"
                .to_string(),
            Dialect::Sqlite => "SELECT +name, +type \
                 FROM pragma_table_info(?2, COALESCE(?1, 'main')) \
                 ORDER BY cid"
                .to_string(),
        }
    }

    /// Full read of a table, projecting every column to a decodable type
    pub fn export_sql(&self, table: &TableRef, columns: &[(String, String)]) -> String {
        let projection = columns
            .iter()
            .map(|(name, data_type)| {
                let col = self.quote(name);
                match self {
                    Dialect::Postgres => {
                        format!("CAST({} AS {}) AS {}", col, postgres_export_type(data_type), col)
                    }
                    // unary plus drops the declared type and keeps the stored value
                    Dialect::Sqlite => format!("+{} AS {}", col, col),
                }
            })
            .collect::<Vec<_>>()
            .join(", ");

        format!("SELECT {} FROM {}", projection, self.qualified(table))
    }

    fn column_list(&self, columns: &[String]) -> String {
        columns
            .iter()
            .map(|c| self.quote(c))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Decodable type for a Postgres column, ignoring modifiers such as `numeric(10,2)`
fn postgres_export_type(data_type: &str) -> &'static str {
    let base = data_type.split('(').next().unwrap_or(data_type).trim();
    match base {
        "smallint" | "integer" | "bigint" => "bigint",
        "real" | "double precision" | "numeric" | "money" => "double precision",
        "boolean" => "boolean",
        _ => "text",
    }
}
