//! Ordered schema scripts for the quote store.
//!
//! Each script runs at most once per database. Pending scripts run in one
//! transaction; `PRAGMA user_version` advances with each of them.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::{Connection, Transaction};

/// `(version, script)`; versions are strictly increasing.
const MIGRATIONS: &[(u32, &str)] = &[
    (1, include_str!("0001_quotes.sql")),
    (2, include_str!("0002_single_pin.sql")),
];

/// Schema version this build writes.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |&(version, _)| version)
}

/// Brings `conn` up to [`latest_version`].
///
/// A database already at a newer version is refused untouched.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let found: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    let latest = latest_version();
    if found > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: found,
            latest_supported: latest,
        });
    }

    let mut pending = MIGRATIONS
        .iter()
        .filter(|&&(version, _)| version > found)
        .peekable();
    if pending.peek().is_none() {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for &(version, script) in pending {
        run_script(&tx, version, script)?;
    }
    tx.commit()?;
    info!("event=db_migrate module=db status=ok from={found} to={latest}");
    Ok(())
}

fn run_script(tx: &Transaction<'_>, version: u32, script: &str) -> DbResult<()> {
    tx.execute_batch(script)
        .and_then(|()| tx.pragma_update(None, "user_version", version))
        .map_err(|source| DbError::Migration { version, source })
}
