//! Schema registry for the list database.
//!
//! # Invariants
//! - Step versions are strictly increasing.
//! - The applied version is mirrored to `PRAGMA user_version`.
//! - All pending steps run in one transaction.

use crate::db::{DbError, DbResult};
use log::debug;
use rusqlite::Connection;

struct SchemaStep {
    version: u32,
    sql: &'static str,
}

const SCHEMA_STEPS: &[SchemaStep] = &[SchemaStep {
    version: 1,
    sql: include_str!("0001_list_tables.sql"),
}];

/// Returns the schema version this binary writes.
pub fn latest_version() -> u32 {
    SCHEMA_STEPS.last().map_or(0, |step| step.version)
}

/// Reads `PRAGMA user_version` from the connection.
pub fn current_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?)
}

/// Brings the connection schema up to `latest_version()`.
pub fn apply_schema(conn: &mut Connection) -> DbResult<()> {
    let found = current_version(conn)?;
    let latest = latest_version();

    if found > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: found,
            latest_supported: latest,
        });
    }
    if found == latest {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for step in SCHEMA_STEPS.iter().filter(|step| step.version > found) {
        debug!(
            "event=schema_step module=db status=start version={}",
            step.version
        );
        tx.execute_batch(step.sql)?;
        tx.execute_batch(&format!("PRAGMA user_version = {};", step.version))?;
    }
    tx.commit()?;
    Ok(())
}
