// Persistent graph store
//
// Single-file SQLite database owning all persisted state: files, symbols,
// parameters, edges, external deps, the FTS index, and the operational
// tables. Mutation happens only through whole-file mutators so re-indexing
// stays idempotent; every mutator bumps the cache epoch. Writers serialize on
// SQLite's own WAL writer latch; readers are non-blocking.

pub mod backup;
pub mod edges;
pub mod externals;
pub mod files;
pub mod migrations;
pub mod ops;
pub mod schema;
pub mod symbols;

pub use edges::{EdgeRow, EndpointKind, NewEdge};
pub use files::{FileRow, FileUpsert};
pub use ops::{DiagnosticRow, QuarantineRow, SyncEventRow, ToolMetricRow};
pub use symbols::SymbolRow;

use crate::error::{BombeError, Result};
use migrations::LATEST_SCHEMA_VERSION;
use rusqlite::Connection;
use std::path::Path;
use tracing::info;

#[derive(Debug)]
pub struct GraphStore {
    pub(crate) conn: Connection,
}

impl GraphStore {
    /// Open or create the store at the given path, migrating forward as
    /// needed. Refuses to operate on a store newer than this build.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| BombeError::io(parent.display().to_string(), e))?;
        }
        let conn = Connection::open(path)?;
        let mut store = Self { conn };
        store.initialize()?;
        info!("opened graph store at {}", path.display());
        Ok(store)
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let mut store = Self { conn };
        store.initialize()?;
        Ok(store)
    }

    fn initialize(&mut self) -> Result<()> {
        self.configure_pragmas()?;

        let found = self.stored_schema_version()?;
        if found > LATEST_SCHEMA_VERSION {
            return Err(BombeError::SchemaIncompatible {
                found,
                supported: LATEST_SCHEMA_VERSION,
            });
        }

        self.initialize_schema()?;
        self.run_migrations()?;
        Ok(())
    }

    fn configure_pragmas(&self) -> Result<()> {
        // WAL before anything else so schema work already benefits from it.
        self.conn
            .query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;
        self.conn.execute("PRAGMA foreign_keys = ON", [])?;
        self.conn.execute("PRAGMA synchronous = NORMAL", [])?;
        Ok(())
    }

    // ============================================================
    // CACHE EPOCH
    // ============================================================

    /// Monotonic counter bumped by every mutation; the query layer keys its
    /// response cache on it.
    pub fn cache_epoch(&self) -> Result<i64> {
        match self.conn.query_row(
            "SELECT value FROM meta WHERE key = 'cache_epoch'",
            [],
            |row| row.get::<_, String>(0),
        ) {
            Ok(value) => Ok(value.parse().unwrap_or(0)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    pub(crate) fn bump_cache_epoch(conn: &Connection) -> rusqlite::Result<()> {
        conn.execute(
            "INSERT INTO meta (key, value) VALUES ('cache_epoch', '1')
             ON CONFLICT(key) DO UPDATE SET value = CAST(CAST(value AS INTEGER) + 1 AS TEXT)",
            [],
        )?;
        Ok(())
    }

    /// Explicit epoch bump, used by the pipeline as the final step of a run
    /// that mutated anything.
    pub fn bump_epoch(&self) -> Result<()> {
        Self::bump_cache_epoch(&self.conn)?;
        Ok(())
    }

    pub fn meta_get(&self, key: &str) -> Result<Option<String>> {
        match self.conn.query_row(
            "SELECT value FROM meta WHERE key = ?1",
            [key],
            |row| row.get::<_, String>(0),
        ) {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn meta_set(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO meta (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            rusqlite::params![key, value],
        )?;
        Ok(())
    }

    // ============================================================
    // STATS
    // ============================================================

    pub fn total_symbols(&self) -> Result<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM symbols", [], |row| row.get(0))?)
    }

    pub fn total_files(&self) -> Result<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM files", [], |row| row.get(0))?)
    }

    pub fn total_edges(&self) -> Result<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM edges", [], |row| row.get(0))?)
    }
}

pub(crate) fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Expand a `?`-placeholder list for batched IN-clause queries.
pub(crate) fn placeholders(count: usize) -> String {
    let mut out = String::with_capacity(count * 2);
    for index in 0..count {
        if index > 0 {
            out.push(',');
        }
        out.push('?');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_starts_at_zero_and_bumps() {
        let store = GraphStore::open_in_memory().unwrap();
        assert_eq!(store.cache_epoch().unwrap(), 0);
        GraphStore::bump_cache_epoch(&store.conn).unwrap();
        GraphStore::bump_cache_epoch(&store.conn).unwrap();
        assert_eq!(store.cache_epoch().unwrap(), 2);
    }

    #[test]
    fn reopen_preserves_schema_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.db");
        {
            let store = GraphStore::open(&path).unwrap();
            assert_eq!(
                store.stored_schema_version().unwrap(),
                LATEST_SCHEMA_VERSION
            );
        }
        let store = GraphStore::open(&path).unwrap();
        assert_eq!(
            store.stored_schema_version().unwrap(),
            LATEST_SCHEMA_VERSION
        );
    }

    #[test]
    fn newer_schema_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.db");
        {
            let store = GraphStore::open(&path).unwrap();
            store
                .conn
                .execute(
                    "INSERT INTO schema_migrations (version, applied_at, description)
                     VALUES (999, 0, 'future')",
                    [],
                )
                .unwrap();
        }
        let err = GraphStore::open(&path).unwrap_err();
        assert_eq!(err.code(), "SCHEMA_INCOMPATIBLE");
    }
}
