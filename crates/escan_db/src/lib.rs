//! Storage layer for the eScan document library.
//!
//! Domain code depends on the [`StorageEngine`] trait only. The SQLite engine is the
//! default backend.
//!
//! # Usage
//!
//! ```rust,ignore
//! use escan_db::{Migration, SqliteEngine, StorageEngine};
//!
//! let engine = SqliteEngine::open("~/.escan/escan_documents.db")?;
//! engine.migrate(&[Migration { version: 1, description: "init", sql: "CREATE TABLE ..." }])?;
//! ```

pub mod backend;
mod migrate;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use backend::{
    query_scalar, BackendError, DbRow, DbValue, Executor, FromDbValue, StorageEngine,
};
pub use migrate::{run_migrations, Migration};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteEngine;
