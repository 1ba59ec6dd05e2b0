//! Upsert engine: stage a dataset and merge it into the destination table
//!
//! Staging and merge run inside one transaction on the caller's connection.
//! The staging table is temporary (connection-local) and carries a
//! per-invocation suffix, so concurrent upserts never share it.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use sqlx::any::AnyArguments;
use sqlx::query::Query;
use sqlx::{Any, AnyConnection, Connection};
use uuid::Uuid;

use crate::db::{Dialect, TableRef, describe_columns, validate_column_name};
use crate::error::{SyncError, SyncResult};

use super::{ColumnType, Dataset, Value};

const STAGE_PREFIX: &str = "sheetsync_stage_";

/// Statements prepared for one upsert
#[derive(Debug, Clone)]
pub struct MergePlan {
    pub dialect: Dialect,
    pub stage_name: String,
    pub columns: Vec<(String, ColumnType)>,
    pub create_sql: String,
    pub merge_sql: String,
    pub drop_sql: String,
}

/// Result of a committed upsert
#[derive(Debug, Clone)]
pub struct UpsertSummary {
    pub table: String,
    pub key_column: String,
    pub rows_staged: usize,
    pub rows_affected: u64,
    pub elapsed: Duration,
}

impl UpsertSummary {
    pub fn message(&self) -> String {
        format!(
            "Upsert completed: {} rows applied to {} on '{}' ({} rows affected) in {:.2}s",
            self.rows_staged,
            self.table,
            self.key_column,
            self.rows_affected,
            self.elapsed.as_secs_f64()
        )
    }
}

/// Check the dataset can be upserted on `key_column`; nothing is written
pub fn validate_dataset(dataset: &Dataset, key_column: &str) -> SyncResult<()> {
    if dataset.is_empty() {
        return Err(SyncError::Validation(
            "Dataset is empty, nothing to upsert".to_string(),
        ));
    }

    if !dataset.has_column(key_column) {
        return Err(SyncError::Validation(format!(
            "Identity column '{}' not found in dataset (columns: {})",
            key_column,
            dataset.columns().join(", ")
        )));
    }

    validate_column_name(key_column)?;
    for column in dataset.columns() {
        validate_column_name(column)?;
    }

    Ok(())
}

/// Validate and generate the statements for an upsert without running them
///
/// `target_types` holds the destination's declared column types, used as
/// cast targets in the Postgres merge; an empty map leaves staged values uncast.
pub fn plan_upsert(
    dataset: &Dataset,
    table: &TableRef,
    key_column: &str,
    dialect: Dialect,
    target_types: &HashMap<String, String>,
) -> SyncResult<MergePlan> {
    validate_dataset(dataset, key_column)?;

    let stage_name = format!("{}{}", STAGE_PREFIX, Uuid::new_v4().simple());
    let columns = dataset.column_types();

    Ok(MergePlan {
        dialect,
        create_sql: dialect.create_staging_sql(&stage_name, &columns),
        merge_sql: dialect.merge_sql(
            table,
            &stage_name,
            dataset.columns(),
            key_column,
            target_types,
        ),
        drop_sql: dialect.drop_staging_sql(&stage_name),
        stage_name,
        columns,
    })
}

/// Upsert `dataset` into `table`, matching rows on `key_column`
///
/// Either every row is applied or, on any failure, nothing is: the
/// transaction is rolled back and the store's message is returned.
pub async fn upsert(
    dataset: &Dataset,
    table: &TableRef,
    key_column: &str,
    conn: &mut AnyConnection,
) -> SyncResult<UpsertSummary> {
    let dialect = Dialect::from_backend_name(conn.backend_name())?;
    validate_dataset(dataset, key_column)?;

    let target_types: HashMap<String, String> = match dialect {
        Dialect::Postgres => describe_columns(conn, table).await?.into_iter().collect(),
        Dialect::Sqlite => HashMap::new(),
    };
    let plan = plan_upsert(dataset, table, key_column, dialect, &target_types)?;
    let start = Instant::now();

    log::info!(
        "Upserting {} rows into {} on '{}'",
        dataset.row_count(),
        table,
        key_column
    );
    log::debug!("Staging table: {}", plan.stage_name);

    let mut tx = conn
        .begin()
        .await
        .map_err(|e| SyncError::execution("Failed to start transaction", e))?;

    let rows_affected = match stage_and_merge(&mut tx, &plan, dataset).await {
        Ok(affected) => affected,
        Err(err) => {
            log::warn!("Upsert into {} rolled back: {}", table, err);
            if let Err(rollback_err) = tx.rollback().await {
                log::error!("Rollback failed: {}", rollback_err);
            }
            return Err(err);
        }
    };

    tx.commit()
        .await
        .map_err(|e| SyncError::execution("Failed to commit transaction", e))?;

    let summary = UpsertSummary {
        table: table.to_string(),
        key_column: key_column.to_string(),
        rows_staged: dataset.row_count(),
        rows_affected,
        elapsed: start.elapsed(),
    };
    log::info!("{}", summary.message());

    Ok(summary)
}

async fn stage_and_merge(
    conn: &mut AnyConnection,
    plan: &MergePlan,
    dataset: &Dataset,
) -> SyncResult<u64> {
    sqlx::query(&plan.create_sql)
        .persistent(false)
        .execute(&mut *conn)
        .await
        .map_err(|e| SyncError::execution("Failed to create staging table", e))?;

    stage_rows(conn, plan, dataset).await?;

    log::debug!("Merge statement:\n{}", plan.merge_sql);
    let result = sqlx::query(&plan.merge_sql)
        .persistent(false)
        .execute(&mut *conn)
        .await
        .map_err(|e| SyncError::execution("Merge failed", e))?;

    sqlx::query(&plan.drop_sql)
        .persistent(false)
        .execute(&mut *conn)
        .await
        .map_err(|e| SyncError::execution("Failed to drop staging table", e))?;

    Ok(result.rows_affected())
}

/// Insert all rows into the staging table in bind-limit sized chunks
async fn stage_rows(
    conn: &mut AnyConnection,
    plan: &MergePlan,
    dataset: &Dataset,
) -> SyncResult<()> {
    let width = plan.columns.len();
    let rows_per_chunk = (plan.dialect.max_bind_params() / width).max(1);
    let names = dataset.columns();

    for chunk in dataset.rows().chunks(rows_per_chunk) {
        let sql = plan
            .dialect
            .insert_staging_sql(&plan.stage_name, names, chunk.len());

        // statements name a one-off staging table; keep them out of the statement cache
        let mut query = sqlx::query(&sql).persistent(false);
        for row in chunk {
            for (value, (_, column_type)) in row.iter().zip(&plan.columns) {
                query = bind_value(query, value, *column_type);
            }
        }

        query
            .execute(&mut *conn)
            .await
            .map_err(|e| SyncError::execution("Failed to stage rows", e))?;
    }

    log::debug!("Staged {} rows into {}", dataset.row_count(), plan.stage_name);
    Ok(())
}

/// Bind a cell using its column's staging type so nulls carry the right type
fn bind_value<'q>(
    query: Query<'q, Any, AnyArguments<'q>>,
    value: &Value,
    column_type: ColumnType,
) -> Query<'q, Any, AnyArguments<'q>> {
    match (column_type, value) {
        (ColumnType::Integer, Value::Null) => query.bind(None::<i64>),
        (ColumnType::Double, Value::Null) => query.bind(None::<f64>),
        (ColumnType::Boolean, Value::Null) => query.bind(None::<bool>),
        (ColumnType::Text, Value::Null) => query.bind(None::<String>),
        (ColumnType::Integer, Value::Int(i)) => query.bind(*i),
        (ColumnType::Double, v) if v.as_float().is_some() => query.bind(v.as_float()),
        (ColumnType::Boolean, Value::Bool(b)) => query.bind(*b),
        (_, v) => query.bind(v.to_text()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::{
        create_unique_table, drop_table, execute_all, id_value_dataset, memory_connection,
        postgres_connection, temp_table_count,
    };
    use crate::sync::export::read_table;
    use chrono::NaiveDate;

    const CREATE_ITEMS: &str = "CREATE TABLE items (id INTEGER PRIMARY KEY, v TEXT)";

    fn items() -> TableRef {
        "items".parse().unwrap()
    }

    async fn seeded() -> AnyConnection {
        let mut conn = memory_connection().await;
        execute_all(
            &mut conn,
            &[CREATE_ITEMS, "INSERT INTO items (id, v) VALUES (1, 'a'), (2, 'b')"],
        )
        .await;
        conn
    }

    async fn snapshot(conn: &mut AnyConnection) -> Vec<(i64, String)> {
        sqlx::query_as("SELECT id, v FROM items ORDER BY id")
            .fetch_all(&mut *conn)
            .await
            .unwrap()
    }

    fn pairs(rows: &[(i64, &str)]) -> Vec<(i64, String)> {
        rows.iter().map(|(id, v)| (*id, v.to_string())).collect()
    }

    #[tokio::test]
    async fn test_updates_matches_inserts_new_keeps_others() {
        let mut conn = seeded().await;
        let dataset = id_value_dataset(&[(2, "B"), (3, "c")]);

        let summary = upsert(&dataset, &items(), "id", &mut conn).await.unwrap();

        assert_eq!(summary.rows_staged, 2);
        assert_eq!(snapshot(&mut conn).await, pairs(&[(1, "a"), (2, "B"), (3, "c")]));
        assert_eq!(temp_table_count(&mut conn).await, 0);
    }

    #[tokio::test]
    async fn test_applying_twice_equals_applying_once() {
        let mut conn = seeded().await;
        let dataset = id_value_dataset(&[(2, "B"), (3, "c")]);

        upsert(&dataset, &items(), "id", &mut conn).await.unwrap();
        let once = snapshot(&mut conn).await;
        upsert(&dataset, &items(), "id", &mut conn).await.unwrap();

        assert_eq!(snapshot(&mut conn).await, once);
    }

    #[tokio::test]
    async fn test_failed_merge_leaves_destination_untouched() {
        let mut conn = memory_connection().await;
        execute_all(
            &mut conn,
            &[
                "CREATE TABLE items (id INTEGER PRIMARY KEY, v TEXT NOT NULL CHECK (v <> 'bad'))",
                "INSERT INTO items (id, v) VALUES (1, 'a'), (2, 'b')",
            ],
        )
        .await;

        // staging accepts 'bad'; the destination's CHECK rejects it during the merge
        let dataset = id_value_dataset(&[(2, "B"), (3, "bad")]);
        let err = upsert(&dataset, &items(), "id", &mut conn).await.unwrap_err();

        assert!(matches!(err, SyncError::Execution(_)));
        assert!(err.to_string().contains("Merge failed"));
        assert_eq!(snapshot(&mut conn).await, pairs(&[(1, "a"), (2, "b")]));
        assert_eq!(temp_table_count(&mut conn).await, 0);
    }

    #[tokio::test]
    async fn test_missing_key_column_rejected_before_write() {
        let mut conn = seeded().await;
        let dataset = Dataset::new(
            vec!["code".to_string(), "v".to_string()],
            vec![vec![Value::Int(9), Value::Text("z".into())]],
        )
        .unwrap();

        let err = upsert(&dataset, &items(), "id", &mut conn).await.unwrap_err();

        assert!(matches!(err, SyncError::Validation(_)));
        assert!(err.to_string().contains("'id'"));
        assert_eq!(snapshot(&mut conn).await, pairs(&[(1, "a"), (2, "b")]));
        assert_eq!(temp_table_count(&mut conn).await, 0);
    }

    #[tokio::test]
    async fn test_empty_dataset_is_a_failure() {
        let mut conn = seeded().await;
        let dataset = Dataset::new(vec!["id".to_string(), "v".to_string()], vec![]).unwrap();

        let err = upsert(&dataset, &items(), "id", &mut conn).await.unwrap_err();

        assert!(matches!(err, SyncError::Validation(_)));
        assert!(err.to_string().contains("empty"));
    }

    #[tokio::test]
    async fn test_unsafe_header_rejected() {
        let mut conn = seeded().await;
        let dataset = Dataset::new(
            vec!["id".to_string(), "v\" = 1; --".to_string()],
            vec![vec![Value::Int(1), Value::Text("x".into())]],
        )
        .unwrap();

        let err = upsert(&dataset, &items(), "id", &mut conn).await.unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)));
        assert_eq!(snapshot(&mut conn).await, pairs(&[(1, "a"), (2, "b")]));
    }

    #[tokio::test]
    async fn test_unknown_destination_column_surfaces_store_error() {
        let mut conn = seeded().await;
        let dataset = Dataset::new(
            vec!["id".to_string(), "extra".to_string()],
            vec![vec![Value::Int(1), Value::Text("x".into())]],
        )
        .unwrap();

        let err = upsert(&dataset, &items(), "id", &mut conn).await.unwrap_err();

        assert!(matches!(err, SyncError::Execution(_)));
        assert!(err.to_string().contains("extra"));
        assert_eq!(temp_table_count(&mut conn).await, 0);
    }

    #[tokio::test]
    async fn test_cell_values_are_bound_not_interpolated() {
        let mut conn = seeded().await;
        let hostile = "x'); DROP TABLE items; --";
        let dataset = id_value_dataset(&[(5, hostile)]);

        upsert(&dataset, &items(), "id", &mut conn).await.unwrap();

        let rows = snapshot(&mut conn).await;
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2], (5, hostile.to_string()));
    }

    #[tokio::test]
    async fn test_typed_columns_and_nulls() {
        let mut conn = memory_connection().await;
        execute_all(
            &mut conn,
            &["CREATE TABLE metrics (id INTEGER PRIMARY KEY, amount REAL, active INTEGER, note TEXT)"],
        )
        .await;
        let table: TableRef = "main.metrics".parse().unwrap();

        let dataset = Dataset::new(
            vec![
                "id".to_string(),
                "amount".to_string(),
                "active".to_string(),
                "note".to_string(),
            ],
            vec![
                vec![Value::Int(1), Value::Int(3), Value::Bool(true), Value::Null],
                vec![Value::Int(2), Value::Float(2.5), Value::Null, Value::Text("n".into())],
            ],
        )
        .unwrap();

        upsert(&dataset, &table, "id", &mut conn).await.unwrap();

        let exported = read_table(&mut conn, &table).await.unwrap();
        assert_eq!(
            exported.rows(),
            &[
                vec![Value::Int(1), Value::Float(3.0), Value::Int(1), Value::Null],
                vec![Value::Int(2), Value::Float(2.5), Value::Null, Value::Text("n".into())],
            ]
        );
    }

    #[tokio::test]
    async fn test_large_dataset_is_staged_in_chunks() {
        let mut conn = memory_connection().await;
        execute_all(&mut conn, &[CREATE_ITEMS]).await;

        let rows: Vec<(i64, String)> = (1..=20_000).map(|i| (i, format!("v{}", i))).collect();
        let borrowed: Vec<(i64, &str)> = rows.iter().map(|(i, v)| (*i, v.as_str())).collect();
        let dataset = id_value_dataset(&borrowed);

        upsert(&dataset, &items(), "id", &mut conn).await.unwrap();

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM items")
            .fetch_one(&mut conn)
            .await
            .unwrap();
        assert_eq!(count, 20_000);
    }

    #[tokio::test]
    async fn test_postgres_updates_matches_inserts_new_keeps_others() {
        let Some(mut conn) = postgres_connection().await else {
            return;
        };
        let table = create_unique_table(&mut conn, "id integer PRIMARY KEY, v text").await;
        let seed = format!("INSERT INTO {} VALUES (1, 'a'), (2, 'b')", table);
        execute_all(&mut conn, &[seed.as_str()]).await;

        let dataset = id_value_dataset(&[(2, "B"), (3, "c")]);
        let result = upsert(&dataset, &table, "id", &mut conn).await;

        let select = format!("SELECT CAST(id AS bigint), v FROM {} ORDER BY id", table);
        let rows: Vec<(i64, String)> = sqlx::query_as(&select).fetch_all(&mut conn).await.unwrap();
        drop_table(&mut conn, &table).await;

        assert!(result.is_ok(), "{:?}", result.err());
        assert_eq!(rows, pairs(&[(1, "a"), (2, "B"), (3, "c")]));
    }

    #[tokio::test]
    async fn test_postgres_datetime_and_blank_columns_take_destination_types() {
        let Some(mut conn) = postgres_connection().await else {
            return;
        };
        let table = create_unique_table(
            &mut conn,
            "id integer PRIMARY KEY, seen timestamp, qty integer, price numeric(10,2)",
        )
        .await;
        let seed = format!("INSERT INTO {} VALUES (1, NULL, 5, 1.00)", table);
        execute_all(&mut conn, &[seed.as_str()]).await;

        let seen = NaiveDate::from_ymd_opt(2024, 5, 17)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        let dataset = Dataset::new(
            vec![
                "id".to_string(),
                "seen".to_string(),
                "qty".to_string(),
                "price".to_string(),
            ],
            vec![
                vec![Value::Int(1), Value::DateTime(seen), Value::Null, Value::Float(2.5)],
                vec![Value::Int(2), Value::DateTime(seen), Value::Null, Value::Int(3)],
            ],
        )
        .unwrap();

        let result = upsert(&dataset, &table, "id", &mut conn).await;

        let select = format!(
            "SELECT CAST(id AS bigint), CAST(seen AS text), CAST(qty AS bigint), CAST(price AS text) \
             FROM {} ORDER BY id",
            table
        );
        let rows: Vec<(i64, Option<String>, Option<i64>, Option<String>)> =
            sqlx::query_as(&select).fetch_all(&mut conn).await.unwrap();
        drop_table(&mut conn, &table).await;

        assert!(result.is_ok(), "{:?}", result.err());
        let stamp = Some("2024-05-17 09:30:00".to_string());
        assert_eq!(
            rows,
            vec![
                (1, stamp.clone(), None, Some("2.50".to_string())),
                (2, stamp, None, Some("3.00".to_string())),
            ]
        );
    }

    #[tokio::test]
    async fn test_postgres_failed_merge_rolls_back() {
        let Some(mut conn) = postgres_connection().await else {
            return;
        };
        let table = create_unique_table(&mut conn, "id integer PRIMARY KEY, qty integer").await;
        let seed = format!("INSERT INTO {} VALUES (1, 10)", table);
        execute_all(&mut conn, &[seed.as_str()]).await;

        let dataset = Dataset::new(
            vec!["id".to_string(), "qty".to_string()],
            vec![
                vec![Value::Int(1), Value::Int(11)],
                vec![Value::Int(2), Value::Text("many".into())],
            ],
        )
        .unwrap();
        let result = upsert(&dataset, &table, "id", &mut conn).await;

        let select = format!("SELECT CAST(id AS bigint), CAST(qty AS bigint) FROM {}", table);
        let rows: Vec<(i64, i64)> = sqlx::query_as(&select).fetch_all(&mut conn).await.unwrap();
        drop_table(&mut conn, &table).await;

        assert!(matches!(result, Err(SyncError::Execution(_))));
        assert_eq!(rows, vec![(1, 10)]);
    }

    #[test]
    fn test_plan_uses_unique_stage_names() {
        let dataset = id_value_dataset(&[(1, "a")]);
        let no_types = HashMap::new();
        let a = plan_upsert(&dataset, &items(), "id", Dialect::Postgres, &no_types).unwrap();
        let b = plan_upsert(&dataset, &items(), "id", Dialect::Postgres, &no_types).unwrap();

        assert!(a.stage_name.starts_with(STAGE_PREFIX));
        assert_ne!(a.stage_name, b.stage_name);
        assert!(a.merge_sql.contains(&a.stage_name));
        assert!(a.create_sql.starts_with("CREATE TEMPORARY TABLE"));
    }
}
