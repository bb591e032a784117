// Schema initialization
//
// Everything is CREATE IF NOT EXISTS so a fresh store comes up at the latest
// version in one pass and migrations stay cheap no-ops on it. Edge endpoints
// are polymorphic (symbol or file), so referential cleanup for edges lives in
// the whole-file mutators rather than SQL foreign keys.

use super::GraphStore;
use crate::error::Result;
use tracing::debug;

impl GraphStore {
    pub(super) fn initialize_schema(&mut self) -> Result<()> {
        debug!("creating graph store schema");

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at INTEGER NOT NULL,
                description TEXT NOT NULL
            )",
            [],
        )?;

        self.create_files_table()?;
        self.create_symbols_table()?;
        self.create_parameters_table()?;
        self.create_edges_table()?;
        self.create_external_deps_table()?;
        self.create_symbol_fts()?;
        self.create_operational_tables()?;

        debug!("graph store schema ready");
        Ok(())
    }

    fn create_files_table(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS files (
                id INTEGER PRIMARY KEY,
                path TEXT NOT NULL UNIQUE,
                language TEXT NOT NULL,
                hash TEXT NOT NULL,
                size INTEGER NOT NULL,
                last_indexed INTEGER NOT NULL DEFAULT 0,
                content TEXT
            )",
            [],
        )?;
        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_files_language ON files(language)",
            [],
        )?;
        Ok(())
    }

    fn create_symbols_table(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS symbols (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                qualified_name TEXT NOT NULL,
                kind TEXT NOT NULL,
                file_path TEXT NOT NULL REFERENCES files(path)
                    ON DELETE CASCADE ON UPDATE CASCADE,
                start_line INTEGER NOT NULL,
                end_line INTEGER NOT NULL,
                signature TEXT NOT NULL DEFAULT '',
                signature_hash TEXT NOT NULL DEFAULT '',
                return_type TEXT,
                visibility TEXT NOT NULL DEFAULT 'public',
                is_async INTEGER NOT NULL DEFAULT 0,
                is_static INTEGER NOT NULL DEFAULT 0,
                parent_id INTEGER REFERENCES symbols(id) ON DELETE SET NULL,
                docstring TEXT,
                pagerank REAL NOT NULL DEFAULT 0.0
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_symbols_file ON symbols(file_path)",
            [],
        )?;
        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_symbols_name ON symbols(name)",
            [],
        )?;
        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_symbols_qualified ON symbols(qualified_name)",
            [],
        )?;
        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_symbols_rank ON symbols(pagerank)",
            [],
        )?;
        Ok(())
    }

    fn create_parameters_table(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS parameters (
                symbol_id INTEGER NOT NULL REFERENCES symbols(id) ON DELETE CASCADE,
                position INTEGER NOT NULL,
                name TEXT NOT NULL,
                type_hint TEXT,
                default_value TEXT,
                PRIMARY KEY (symbol_id, position)
            )",
            [],
        )?;
        Ok(())
    }

    fn create_edges_table(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS edges (
                id INTEGER PRIMARY KEY,
                source_id INTEGER NOT NULL,
                source_kind TEXT NOT NULL,
                target_id INTEGER NOT NULL,
                target_kind TEXT NOT NULL,
                relationship TEXT NOT NULL,
                file_path TEXT NOT NULL,
                line INTEGER NOT NULL DEFAULT 0,
                confidence REAL NOT NULL DEFAULT 1.0,
                UNIQUE (source_id, source_kind, target_id, target_kind, relationship)
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_edges_source ON edges(source_id, relationship)",
            [],
        )?;
        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_edges_target ON edges(target_id, relationship)",
            [],
        )?;
        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_edges_file ON edges(file_path)",
            [],
        )?;
        Ok(())
    }

    fn create_external_deps_table(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS external_deps (
                id INTEGER PRIMARY KEY,
                file_path TEXT NOT NULL,
                raw_import TEXT NOT NULL,
                module_name TEXT NOT NULL,
                line INTEGER NOT NULL DEFAULT 0
            )",
            [],
        )?;
        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_external_deps_file ON external_deps(file_path)",
            [],
        )?;
        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_external_deps_module ON external_deps(module_name)",
            [],
        )?;
        Ok(())
    }

    fn create_symbol_fts(&self) -> Result<()> {
        self.conn.execute(
            r#"CREATE VIRTUAL TABLE IF NOT EXISTS symbol_fts USING fts5(
                name,
                qualified_name,
                docstring,
                tokenize = "unicode61 separators '_.'",
                prefix = '2 3 4',
                content = 'symbols',
                content_rowid = 'id'
            )"#,
            [],
        )?;

        self.conn.execute(
            "CREATE TRIGGER IF NOT EXISTS symbols_ai AFTER INSERT ON symbols BEGIN
                INSERT INTO symbol_fts(rowid, name, qualified_name, docstring)
                VALUES (new.id, new.name, new.qualified_name, new.docstring);
            END",
            [],
        )?;
        self.conn.execute(
            "CREATE TRIGGER IF NOT EXISTS symbols_ad AFTER DELETE ON symbols BEGIN
                INSERT INTO symbol_fts(symbol_fts, rowid, name, qualified_name, docstring)
                VALUES ('delete', old.id, old.name, old.qualified_name, old.docstring);
            END",
            [],
        )?;
        self.conn.execute(
            "CREATE TRIGGER IF NOT EXISTS symbols_au AFTER UPDATE ON symbols BEGIN
                INSERT INTO symbol_fts(symbol_fts, rowid, name, qualified_name, docstring)
                VALUES ('delete', old.id, old.name, old.qualified_name, old.docstring);
                INSERT INTO symbol_fts(rowid, name, qualified_name, docstring)
                VALUES (new.id, new.name, new.qualified_name, new.docstring);
            END",
            [],
        )?;
        Ok(())
    }

    fn create_operational_tables(&self) -> Result<()> {
        self.conn.execute(
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

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS artifact_quarantine (
                artifact_id TEXT PRIMARY KEY,
                reason TEXT NOT NULL,
                quarantined_at INTEGER NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS artifact_pins (
                repo TEXT NOT NULL,
                snapshot TEXT NOT NULL,
                artifact_id TEXT NOT NULL,
                pinned_at INTEGER NOT NULL,
                PRIMARY KEY (repo, snapshot)
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS circuit_breaker (
                remote TEXT PRIMARY KEY,
                state TEXT NOT NULL DEFAULT 'closed',
                failure_count INTEGER NOT NULL DEFAULT 0,
                opened_at INTEGER
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS sync_events (
                id INTEGER PRIMARY KEY,
                event TEXT NOT NULL,
                detail TEXT,
                created_at INTEGER NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS trusted_keys (
                key_id TEXT PRIMARY KEY,
                algorithm TEXT NOT NULL,
                key_material TEXT NOT NULL,
                added_at INTEGER NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS tool_metrics (
                id INTEGER PRIMARY KEY,
                tool TEXT NOT NULL,
                duration_ms INTEGER NOT NULL,
                cache_mode TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS index_diagnostics (
                id INTEGER PRIMARY KEY,
                run_id TEXT NOT NULL,
                stage TEXT NOT NULL,
                category TEXT NOT NULL DEFAULT '',
                severity TEXT NOT NULL,
                file_path TEXT NOT NULL,
                message TEXT NOT NULL,
                hint TEXT,
                created_at INTEGER NOT NULL
            )",
            [],
        )?;
        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_diagnostics_run ON index_diagnostics(run_id)",
            [],
        )?;

        Ok(())
    }
}
