//! Ordered schema migrations for the record store.
//!
//! # Invariants
//! - Versions are strictly increasing; the last one is the schema version
//!   this binary writes.
//! - Pending migrations run in one transaction, and `PRAGMA user_version`
//!   moves with each script inside it.
//! - A database newer than the binary is never touched.
//!
//! # See also
//! - `0001_records.sql` for the record store layout.

use crate::db::{DbError, DbResult};
use rusqlite::{Connection, Transaction};

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "records",
        sql: include_str!("0001_records.sql"),
    },
    Migration {
        version: 2,
        name: "lookup_indexes",
        sql: include_str!("0002_lookup_indexes.sql"),
    },
];

/// Schema version written by this binary.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Brings the connection's schema up to [`latest_version`].
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let from_version = schema_version(conn)?;
    let latest = latest_version();
    if from_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: from_version,
            latest_supported: latest,
        });
    }

    let pending: Vec<&Migration> = MIGRATIONS
        .iter()
        .filter(|migration| migration.version > from_version)
        .collect();
    if pending.is_empty() {
        log::debug!("event=db_migrate module=db status=skip version={from_version}");
        return Ok(());
    }

    let tx = conn.transaction()?;
    for migration in pending {
        run_migration(&tx, migration)?;
    }
    tx.commit()?;

    log::info!(
        "event=db_migrate module=db status=ok from_version={from_version} to_version={latest}"
    );
    Ok(())
}

fn run_migration(tx: &Transaction<'_>, migration: &Migration) -> DbResult<()> {
    log::debug!(
        "event=db_migrate module=db status=start version={} name={}",
        migration.version,
        migration.name
    );
    let script = format!(
        "{}\nPRAGMA user_version = {};",
        migration.sql, migration.version
    );
    tx.execute_batch(&script)
        .map_err(|source| DbError::Migration {
            version: migration.version,
            name: migration.name,
            source,
        })
}

fn schema_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?)
}
