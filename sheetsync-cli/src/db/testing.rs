//! Helpers for tests that need a real store

use sqlx::{AnyConnection, Connection};

use crate::db::TableRef;
use crate::sync::{Dataset, Value};

/// Fresh private in-memory SQLite database
pub async fn memory_connection() -> AnyConnection {
    sqlx::any::install_default_drivers();
    AnyConnection::connect("sqlite::memory:").await.unwrap()
}

/// Run a batch of setup statements
pub async fn execute_all(conn: &mut AnyConnection, statements: &[&str]) {
    for sql in statements {
        sqlx::query(sql).execute(&mut *conn).await.unwrap();
    }
}

/// Number of temporary tables left on the connection
pub async fn temp_table_count(conn: &mut AnyConnection) -> i64 {
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM sqlite_temp_master WHERE type = 'table'")
            .fetch_one(&mut *conn)
            .await
            .unwrap();
    count
}

/// `(id, v)` dataset from literal pairs
pub fn id_value_dataset(rows: &[(i64, &str)]) -> Dataset {
    Dataset::new(
        vec!["id".to_string(), "v".to_string()],
        rows.iter()
            .map(|(id, v)| vec![Value::Int(*id), Value::Text(v.to_string())])
            .collect(),
    )
    .unwrap()
}

/// Names a Postgres database for tests that need a real Postgres
pub const POSTGRES_URL_VAR: &str = "TESTS_POSTGRES_URL";

/// Postgres URL for store-specific tests; `None` (test skipped) when unset
pub fn postgres_url() -> Option<String> {
    let url = std::env::var(POSTGRES_URL_VAR).ok();
    if url.is_none() {
        eprintln!("Skipping test: {} not set", POSTGRES_URL_VAR);
    }
    url
}

pub async fn postgres_connection() -> Option<AnyConnection> {
    let url = postgres_url()?;
    sqlx::any::install_default_drivers();
    Some(AnyConnection::connect(&url).await.unwrap())
}

/// Create a uniquely named table so concurrent test runs never collide
pub async fn create_unique_table(conn: &mut AnyConnection, columns: &str) -> TableRef {
    let name = format!("sheetsync_test_{}", uuid::Uuid::new_v4().simple());
    let ddl = format!("CREATE TABLE {} ({})", name, columns);
    execute_all(conn, &[ddl.as_str()]).await;
    name.parse().unwrap()
}

pub async fn drop_table(conn: &mut AnyConnection, table: &TableRef) {
    let sql = format!("DROP TABLE IF EXISTS {}", table);
    execute_all(conn, &[sql.as_str()]).await;
}
