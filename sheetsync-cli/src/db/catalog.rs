//! Reading a table's column layout from the store

use sqlx::AnyConnection;

use crate::error::{SyncError, SyncResult};

use super::{Dialect, TableRef};

/// `(column name, declared type)` of `table` in ordinal order; empty when the table is missing
pub async fn describe_columns(
    conn: &mut AnyConnection,
    table: &TableRef,
) -> SyncResult<Vec<(String, String)>> {
    let dialect = Dialect::from_backend_name(conn.backend_name())?;

    let columns: Vec<(String, String)> = sqlx::query_as(&dialect.describe_columns_sql())
        .bind(table.schema().map(str::to_string))
        .bind(table.name().to_string())
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| SyncError::execution("Failed to read table columns", e))?;

    log::debug!("Columns of {}: {:?}", table, columns);
    Ok(columns)
}
