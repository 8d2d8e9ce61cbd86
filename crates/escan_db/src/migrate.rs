//! Numbered schema migrations.

use tracing::info;

use crate::backend::{BackendError, Executor, StorageEngine};

/// One forward-only schema step.
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    /// Schema version after this migration has been applied. Starts at 1.
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// Apply pending migrations in order, each in its own transaction.
pub fn run_migrations<E>(engine: &E, migrations: &[Migration]) -> Result<u32, BackendError>
where
    E: StorageEngine + ?Sized,
{
    validate(migrations)?;

    let latest = migrations.last().map(|m| m.version).unwrap_or(0);
    let current = engine.schema_version()?;
    if current > latest {
        return Err(BackendError::SchemaTooNew {
            found: current,
            supported: latest,
        });
    }

    for migration in migrations.iter().filter(|m| m.version > current) {
        engine.transaction(&mut |tx: &dyn Executor| {
            tx.execute_batch(migration.sql)?;
            tx.set_schema_version(migration.version)
        })?;
        info!(
            backend = engine.backend_name(),
            version = migration.version,
            "Applied migration: {}",
            migration.description
        );
    }

    engine.schema_version()
}

fn validate(migrations: &[Migration]) -> Result<(), BackendError> {
    let mut previous = 0;
    for migration in migrations {
        if migration.version <= previous {
            return Err(BackendError::InvalidInput(format!(
                "Migration versions must be strictly increasing from 1; got {} after {}",
                migration.version, previous
            )));
        }
        previous = migration.version;
    }
    Ok(())
}
