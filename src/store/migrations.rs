// Forward-only schema migrations
//
// Each step runs inside a savepoint: failure rolls the step back, leaves the
// store at the prior version, and surfaces MIGRATION_FAILED for the operator.
// History rows are kept per applied version.

use super::{GraphStore, unix_now};
use crate::error::{BombeError, Result};
use rusqlite::params;
use tracing::{debug, info};

/// Current schema version. Increment together with a new migration arm.
pub const LATEST_SCHEMA_VERSION: i64 = 3;

impl GraphStore {
    /// Highest recorded migration version, or 0 for a fresh store.
    pub fn stored_schema_version(&self) -> Result<i64> {
        let table_exists: bool = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master
             WHERE type = 'table' AND name = 'schema_migrations'",
            [],
            |row| row.get::<_, i64>(0).map(|c| c > 0),
        )?;
        if !table_exists {
            return Ok(0);
        }
        Ok(self.conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )?)
    }

    pub(super) fn run_migrations(&mut self) -> Result<()> {
        let current = self.stored_schema_version()?;
        if current >= LATEST_SCHEMA_VERSION {
            debug!("schema up to date at version {current}");
            return Ok(());
        }

        info!(
            "running schema migrations {} -> {}",
            current, LATEST_SCHEMA_VERSION
        );
        for version in (current + 1)..=LATEST_SCHEMA_VERSION {
            self.apply_migration_step(version)?;
        }
        Ok(())
    }

    fn apply_migration_step(&mut self, version: i64) -> Result<()> {
        let savepoint = self
            .conn
            .savepoint()
            .map_err(BombeError::Store)?;

        let step = match version {
            1 => migration_001_core_graph(&savepoint),
            2 => migration_002_sync_tables(&savepoint),
            3 => migration_003_telemetry_tables(&savepoint),
            _ => Err(rusqlite::Error::InvalidQuery.into()),
        };

        match step {
            Ok(description) => {
                savepoint.execute(
                    "INSERT OR REPLACE INTO schema_migrations (version, applied_at, description)
                     VALUES (?1, ?2, ?3)",
                    params![version, unix_now(), description],
                )?;
                savepoint.commit()?;
                info!("✅ schema migration {version} applied: {description}");
                Ok(())
            }
            Err(e) => {
                // Dropping the savepoint rolls the step back.
                drop(savepoint);
                Err(BombeError::MigrationFailed {
                    version,
                    message: e.to_string(),
                })
            }
        }
    }
}

type StepResult = std::result::Result<&'static str, anyhow::Error>;

/// Migration 001: core graph tables. A no-op beyond version tracking, since
/// `initialize_schema` creates the current shape for fresh stores.
fn migration_001_core_graph(_sp: &rusqlite::Savepoint) -> StepResult {
    Ok("core graph tables")
}

/// Migration 002: operational sync tables (outbound queue, quarantine, pins,
/// circuit breaker, events, trusted keys). Idempotent against stores created
/// at the current shape.
fn migration_002_sync_tables(sp: &rusqlite::Savepoint) -> StepResult {
    sp.execute(
        "CREATE TABLE IF NOT EXISTS sync_outbound (
            delta_id TEXT PRIMARY KEY,
            payload TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            attempts INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )",
        [],
    )?;
    sp.execute(
        "CREATE TABLE IF NOT EXISTS artifact_quarantine (
            artifact_id TEXT PRIMARY KEY,
            reason TEXT NOT NULL,
            quarantined_at INTEGER NOT NULL
        )",
        [],
    )?;
    Ok("sync outbound, quarantine, pins, breaker, events, trusted keys")
}

/// Migration 003: telemetry tables (tool metrics, indexing diagnostics).
fn migration_003_telemetry_tables(sp: &rusqlite::Savepoint) -> StepResult {
    sp.execute(
        "CREATE TABLE IF NOT EXISTS tool_metrics (
            id INTEGER PRIMARY KEY,
            tool TEXT NOT NULL,
            duration_ms INTEGER NOT NULL,
            cache_mode TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )",
        [],
    )?;
    Ok("tool metrics and indexing diagnostics")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_store_lands_on_latest_version() {
        let store = GraphStore::open_in_memory().unwrap();
        assert_eq!(
            store.stored_schema_version().unwrap(),
            LATEST_SCHEMA_VERSION
        );

        let history: i64 = store
            .conn
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(history, LATEST_SCHEMA_VERSION);
    }

    #[test]
    fn migrations_are_idempotent_on_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.db");
        {
            GraphStore::open(&path).unwrap();
        }
        let store = GraphStore::open(&path).unwrap();
        assert_eq!(
            store.stored_schema_version().unwrap(),
            LATEST_SCHEMA_VERSION
        );
    }
}
