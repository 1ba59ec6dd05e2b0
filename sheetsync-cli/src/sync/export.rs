//! Table exporter: full read of the destination table into a dataset

use sqlx::any::{AnyRow, AnyTypeInfoKind};
use sqlx::{AnyConnection, Connection, Row, TypeInfo, ValueRef};

use crate::db::{ConnectionProvider, Dialect, TableRef, describe_columns};
use crate::error::{SyncError, SyncResult};

use super::{Dataset, Value};

/// Read every row of `table` on a connection of its own
///
/// The connection is closed before returning, whether the read succeeded or not.
pub async fn export_table(
    provider: &ConnectionProvider,
    table: &TableRef,
) -> SyncResult<Dataset> {
    let mut conn = provider.open().await?;
    let result = read_table(&mut conn, table).await;

    if let Err(e) = conn.close().await {
        log::warn!("Failed to close export connection: {}", e);
    }

    if let Ok(dataset) = &result {
        log::info!("Exported {} rows from {}", dataset.row_count(), table);
    }
    result
}

/// Read every row of `table` on an existing connection
pub(crate) async fn read_table(conn: &mut AnyConnection, table: &TableRef) -> SyncResult<Dataset> {
    let dialect = Dialect::from_backend_name(conn.backend_name())?;
    let described = describe_columns(conn, table).await?;

    if described.is_empty() {
        return Err(SyncError::Execution(format!(
            "Table {} not found or has no columns",
            table
        )));
    }

    let sql = dialect.export_sql(table, &described);
    log::debug!("Export query: {}", sql);

    let rows = sqlx::query(&sql)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| SyncError::execution("Failed to read table", e))?;

    let width = described.len();
    let mut values = Vec::with_capacity(rows.len());
    for row in &rows {
        let mut cells = Vec::with_capacity(width);
        for index in 0..width {
            let cell = decode_cell(row, index)
                .map_err(|e| SyncError::execution("Failed to decode column", e))?;
            cells.push(cell);
        }
        values.push(cells);
    }

    let columns = described.into_iter().map(|(name, _)| name).collect();
    Dataset::new(columns, values)
}

fn decode_cell(row: &AnyRow, index: usize) -> Result<Value, sqlx::Error> {
    let kind = {
        let raw = row.try_get_raw(index)?;
        if raw.is_null() {
            return Ok(Value::Null);
        }
        let type_info = raw.type_info();
        if type_info.is_null() {
            return Ok(Value::Null);
        }
        type_info.kind()
    };

    Ok(match kind {
        AnyTypeInfoKind::Null => Value::Null,
        AnyTypeInfoKind::Bool => Value::Bool(row.try_get(index)?),
        AnyTypeInfoKind::SmallInt => Value::Int(row.try_get::<i16, _>(index)? as i64),
        AnyTypeInfoKind::Integer => Value::Int(row.try_get::<i32, _>(index)? as i64),
        AnyTypeInfoKind::BigInt => Value::Int(row.try_get(index)?),
        AnyTypeInfoKind::Real => Value::Float(row.try_get::<f32, _>(index)? as f64),
        AnyTypeInfoKind::Double => Value::Float(row.try_get(index)?),
        AnyTypeInfoKind::Text => Value::Text(row.try_get(index)?),
        AnyTypeInfoKind::Blob => {
            let bytes: Vec<u8> = row.try_get(index)?;
            Value::Text(String::from_utf8_lossy(&bytes).into_owned())
        }
    })
}
