//! Storage engine abstraction.
//!
//! The document library talks to persistence only through [`StorageEngine`] and
//! [`Executor`]. Values cross the boundary as [`DbValue`] and come back as [`DbRow`],
//! so any local relational backend can satisfy the same contract.

use thiserror::Error;

/// Errors from storage engine operations.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Type conversion error: {0}")]
    TypeConversion(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Schema version {found} is newer than the latest known version {supported}")]
    SchemaTooNew { found: u32, supported: u32 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "sqlite")]
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Value type for query parameters and result columns.
#[derive(Debug, Clone, PartialEq)]
pub enum DbValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl From<i64> for DbValue {
    fn from(v: i64) -> Self {
        DbValue::Integer(v)
    }
}

impl From<String> for DbValue {
    fn from(v: String) -> Self {
        DbValue::Text(v)
    }
}

impl From<&str> for DbValue {
    fn from(v: &str) -> Self {
        DbValue::Text(v.to_string())
    }
}

impl<T: Into<DbValue>> From<Option<T>> for DbValue {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => DbValue::Null,
        }
    }
}

/// Row data from a query result.
#[derive(Debug, Clone)]
pub struct DbRow {
    columns: Vec<String>,
    values: Vec<DbValue>,
}

impl DbRow {
    pub fn new(columns: Vec<String>, values: Vec<DbValue>) -> Self {
        Self { columns, values }
    }

    /// Get a value by column index.
    pub fn get<T: FromDbValue>(&self, index: usize) -> Result<T, BackendError> {
        self.values
            .get(index)
            .ok_or_else(|| {
                BackendError::TypeConversion(format!("Column index {} out of bounds", index))
            })
            .and_then(|v| T::from_db_value(v))
    }

    /// Get a value by column name.
    pub fn get_by_name<T: FromDbValue>(&self, name: &str) -> Result<T, BackendError> {
        let index =
            self.columns.iter().position(|c| c == name).ok_or_else(|| {
                BackendError::TypeConversion(format!("Column '{}' not found", name))
            })?;
        self.get(index)
    }
}

/// Conversion out of a [`DbValue`].
pub trait FromDbValue: Sized {
    fn from_db_value(value: &DbValue) -> Result<Self, BackendError>;
}

impl FromDbValue for i64 {
    fn from_db_value(value: &DbValue) -> Result<Self, BackendError> {
        match value {
            DbValue::Integer(v) => Ok(*v),
            DbValue::Null => Err(BackendError::TypeConversion(
                "i64 field is NULL - use Option<i64> for nullable columns".to_string(),
            )),
            _ => Err(BackendError::TypeConversion("Expected integer".to_string())),
        }
    }
}

impl FromDbValue for String {
    fn from_db_value(value: &DbValue) -> Result<Self, BackendError> {
        match value {
            DbValue::Text(v) => Ok(v.clone()),
            DbValue::Null => Err(BackendError::TypeConversion(
                "String field is NULL - use Option<String> for nullable columns".to_string(),
            )),
            _ => Err(BackendError::TypeConversion("Expected text".to_string())),
        }
    }
}

impl<T: FromDbValue> FromDbValue for Option<T> {
    fn from_db_value(value: &DbValue) -> Result<Self, BackendError> {
        match value {
            DbValue::Null => Ok(None),
            _ => T::from_db_value(value).map(Some),
        }
    }
}

/// Statement execution surface shared by engines and open transactions.
pub trait Executor {
    /// Execute a statement and return the number of affected rows.
    fn execute(&self, sql: &str, params: &[DbValue]) -> Result<u64, BackendError>;

    /// Execute several `;`-separated statements without parameters.
    fn execute_batch(&self, sql: &str) -> Result<(), BackendError>;

    /// Execute an INSERT and return the id the engine assigned to the new row.
    fn insert(&self, sql: &str, params: &[DbValue]) -> Result<i64, BackendError>;

    /// Query and return all rows.
    fn query_all(&self, sql: &str, params: &[DbValue]) -> Result<Vec<DbRow>, BackendError>;

    /// Version number of the schema currently stored.
    fn schema_version(&self) -> Result<u32, BackendError>;

    fn set_schema_version(&self, version: u32) -> Result<(), BackendError>;

    /// Query and return the first row, if any.
    fn query_optional(
        &self,
        sql: &str,
        params: &[DbValue],
    ) -> Result<Option<DbRow>, BackendError> {
        let rows = self.query_all(sql, params)?;
        Ok(rows.into_iter().next())
    }

    /// Query and return exactly one row.
    fn query_one(&self, sql: &str, params: &[DbValue]) -> Result<DbRow, BackendError> {
        self.query_optional(sql, params)?
            .ok_or_else(|| BackendError::Query("Expected one row, got none".to_string()))
    }
}

/// A local persistence backend.
///
/// Engines are constructed by their own `open` functions; everything after that goes
/// through this trait.
pub trait StorageEngine: Executor + Send + Sync {
    fn backend_name(&self) -> &'static str;

    /// Run `op` inside a transaction. The transaction commits when `op` returns `Ok`
    /// and rolls back otherwise.
    fn transaction(
        &self,
        op: &mut dyn FnMut(&dyn Executor) -> Result<(), BackendError>,
    ) -> Result<(), BackendError>;

    /// Apply every migration newer than the stored schema version.
    ///
    /// Returns the schema version after migrating.
    fn migrate(&self, migrations: &[crate::Migration]) -> Result<u32, BackendError> {
        crate::migrate::run_migrations(self, migrations)
    }
}

/// Query a single scalar value from the first column of the first row.
pub fn query_scalar<T, E>(exec: &E, sql: &str, params: &[DbValue]) -> Result<T, BackendError>
where
    T: FromDbValue,
    E: Executor + ?Sized,
{
    let row = exec.query_one(sql, params)?;
    row.get(0)
}

pub(crate) fn sql_op_name(sql: &str) -> &str {
    sql.split_whitespace().next().unwrap_or("unknown")
}

pub(crate) fn hash_sql(sql: &str) -> String {
    // FNV-1a 64-bit hash for low-cardinality, stable identification.
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in sql.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    format!("{:016x}", hash)
}
