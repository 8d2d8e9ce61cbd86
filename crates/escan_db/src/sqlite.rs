//! SQLite storage engine (rusqlite).
//!
//! One connection guarded by a mutex: every statement and every transaction holds the
//! lock for its whole duration, so writers never interleave.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use rusqlite::types::{Value, ValueRef};
use rusqlite::Connection;
use tracing::{debug_span, info};

use crate::backend::{hash_sql, sql_op_name, BackendError, DbRow, DbValue, Executor, StorageEngine};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-backed [`StorageEngine`].
pub struct SqliteEngine {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for SqliteEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteEngine")
            .field("path", &self.path)
            .finish()
    }
}

impl SqliteEngine {
    /// Open or create a database file, creating parent directories as needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, BackendError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.query_row("PRAGMA journal_mode=WAL", [], |_| Ok(()))?;
        conn.execute_batch("PRAGMA foreign_keys=ON")?;
        info!(path = %path.display(), "Opened SQLite database");

        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        })
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self, BackendError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON")?;
        info!("Opened in-memory SQLite database");

        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
        })
    }

    /// Database file path, `None` for in-memory databases.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, BackendError> {
        self.conn
            .lock()
            .map_err(|_| BackendError::Database("connection lock poisoned".to_string()))
    }
}

impl Executor for SqliteEngine {
    fn execute(&self, sql: &str, params: &[DbValue]) -> Result<u64, BackendError> {
        let conn = self.lock()?;
        execute_on_conn(&conn, sql, params)
    }

    fn execute_batch(&self, sql: &str) -> Result<(), BackendError> {
        let conn = self.lock()?;
        execute_batch_on_conn(&conn, sql)
    }

    fn insert(&self, sql: &str, params: &[DbValue]) -> Result<i64, BackendError> {
        let conn = self.lock()?;
        insert_on_conn(&conn, sql, params)
    }

    fn query_all(&self, sql: &str, params: &[DbValue]) -> Result<Vec<DbRow>, BackendError> {
        let conn = self.lock()?;
        query_on_conn(&conn, sql, params)
    }

    fn schema_version(&self) -> Result<u32, BackendError> {
        let conn = self.lock()?;
        schema_version_on_conn(&conn)
    }

    fn set_schema_version(&self, version: u32) -> Result<(), BackendError> {
        let conn = self.lock()?;
        set_schema_version_on_conn(&conn, version)
    }
}

impl StorageEngine for SqliteEngine {
    fn backend_name(&self) -> &'static str {
        "SQLite"
    }

    fn transaction(
        &self,
        op: &mut dyn FnMut(&dyn Executor) -> Result<(), BackendError>,
    ) -> Result<(), BackendError> {
        let conn = self.lock()?;
        conn.execute_batch("BEGIN IMMEDIATE")?;
        let tx = SqliteTransaction { conn: &conn };

        match op(&tx) {
            Ok(()) => {
                conn.execute_batch("COMMIT")?;
                Ok(())
            }
            Err(err) => match conn.execute_batch("ROLLBACK") {
                Ok(()) => Err(err),
                Err(rollback_err) => Err(BackendError::Transaction(format!(
                    "Transaction failed: {}; rollback failed: {}",
                    err, rollback_err
                ))),
            },
        }
    }
}

/// Statements issued inside [`SqliteEngine::transaction`].
struct SqliteTransaction<'a> {
    conn: &'a Connection,
}

impl Executor for SqliteTransaction<'_> {
    fn execute(&self, sql: &str, params: &[DbValue]) -> Result<u64, BackendError> {
        execute_on_conn(self.conn, sql, params)
    }

    fn execute_batch(&self, sql: &str) -> Result<(), BackendError> {
        execute_batch_on_conn(self.conn, sql)
    }

    fn insert(&self, sql: &str, params: &[DbValue]) -> Result<i64, BackendError> {
        insert_on_conn(self.conn, sql, params)
    }

    fn query_all(&self, sql: &str, params: &[DbValue]) -> Result<Vec<DbRow>, BackendError> {
        query_on_conn(self.conn, sql, params)
    }

    fn schema_version(&self) -> Result<u32, BackendError> {
        schema_version_on_conn(self.conn)
    }

    fn set_schema_version(&self, version: u32) -> Result<(), BackendError> {
        set_schema_version_on_conn(self.conn, version)
    }
}

fn execute_on_conn(conn: &Connection, sql: &str, params: &[DbValue]) -> Result<u64, BackendError> {
    let sql_hash = hash_sql(sql);
    let span = debug_span!(
        "db.exec",
        op = sql_op_name(sql),
        sql_hash = %sql_hash,
        duration_ms = tracing::field::Empty
    );
    let _guard = span.enter();
    let start = Instant::now();

    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.execute(rusqlite::params_from_iter(to_sqlite_params(params)))?;
    span.record("duration_ms", start.elapsed().as_millis() as u64);
    Ok(rows as u64)
}

fn execute_batch_on_conn(conn: &Connection, sql: &str) -> Result<(), BackendError> {
    let sql_hash = hash_sql(sql);
    let span = debug_span!(
        "db.exec_batch",
        op = "BATCH",
        sql_hash = %sql_hash,
        duration_ms = tracing::field::Empty
    );
    let _guard = span.enter();
    let start = Instant::now();
    conn.execute_batch(sql)?;
    span.record("duration_ms", start.elapsed().as_millis() as u64);
    Ok(())
}

fn insert_on_conn(conn: &Connection, sql: &str, params: &[DbValue]) -> Result<i64, BackendError> {
    let affected = execute_on_conn(conn, sql, params)?;
    if affected == 0 {
        return Err(BackendError::Query(
            "INSERT did not create a row".to_string(),
        ));
    }
    Ok(conn.last_insert_rowid())
}

fn query_on_conn(
    conn: &Connection,
    sql: &str,
    params: &[DbValue],
) -> Result<Vec<DbRow>, BackendError> {
    let sql_hash = hash_sql(sql);
    let span = debug_span!(
        "db.query",
        op = sql_op_name(sql),
        sql_hash = %sql_hash,
        duration_ms = tracing::field::Empty
    );
    let _guard = span.enter();
    let start = Instant::now();

    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<String> = stmt
        .column_names()
        .into_iter()
        .map(|name| name.to_string())
        .collect();
    let column_count = columns.len();

    let mut rows = stmt.query(rusqlite::params_from_iter(to_sqlite_params(params)))?;
    let mut result = Vec::new();
    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(column_count);
        for i in 0..column_count {
            values.push(value_ref_to_db_value(row.get_ref(i)?));
        }
        result.push(DbRow::new(columns.clone(), values));
    }

    span.record("duration_ms", start.elapsed().as_millis() as u64);
    Ok(result)
}

fn schema_version_on_conn(conn: &Connection) -> Result<u32, BackendError> {
    let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    u32::try_from(version)
        .map_err(|_| BackendError::TypeConversion(format!("Invalid user_version {}", version)))
}

fn set_schema_version_on_conn(conn: &Connection, version: u32) -> Result<(), BackendError> {
    // PRAGMA does not accept bound parameters; the value is a plain integer.
    conn.execute_batch(&format!("PRAGMA user_version = {}", version))?;
    Ok(())
}

fn to_sqlite_params(params: &[DbValue]) -> Vec<Value> {
    params
        .iter()
        .map(|p| match p {
            DbValue::Null => Value::Null,
            DbValue::Integer(v) => Value::Integer(*v),
            DbValue::Real(v) => Value::Real(*v),
            DbValue::Text(v) => Value::Text(v.clone()),
            DbValue::Blob(v) => Value::Blob(v.clone()),
        })
        .collect()
}

fn value_ref_to_db_value(value: ValueRef<'_>) -> DbValue {
    match value {
        ValueRef::Null => DbValue::Null,
        ValueRef::Integer(v) => DbValue::Integer(v),
        ValueRef::Real(v) => DbValue::Real(v),
        ValueRef::Text(v) => DbValue::Text(String::from_utf8_lossy(v).to_string()),
        ValueRef::Blob(v) => DbValue::Blob(v.to_vec()),
    }
}
