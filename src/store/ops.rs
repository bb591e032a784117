// Operational tables
//
// Append-or-upsert records for the sync plane and observability: outbound
// deltas, artifact quarantine and pins, circuit-breaker state, sync events,
// tool metrics, and indexing diagnostics. Bounded retention is the
// operator's concern; nothing here prunes.

use super::{GraphStore, unix_now};
use crate::error::Result;
use crate::extractor::ParseDiagnostic;
use rusqlite::params;

#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosticRow {
    pub run_id: String,
    pub stage: String,
    pub category: String,
    pub severity: String,
    pub file_path: String,
    pub message: String,
    pub hint: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolMetricRow {
    pub tool: String,
    pub duration_ms: i64,
    pub cache_mode: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuarantineRow {
    pub artifact_id: String,
    pub reason: String,
    pub quarantined_at: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncEventRow {
    pub event: String,
    pub detail: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl BreakerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakerState::Closed => "closed",
            BreakerState::Open => "open",
            BreakerState::HalfOpen => "half_open",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "closed" => Some(BreakerState::Closed),
            "open" => Some(BreakerState::Open),
            "half_open" => Some(BreakerState::HalfOpen),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutboundDelta {
    pub delta_id: String,
    pub payload: String,
    pub status: String,
    pub attempts: i64,
}

impl GraphStore {
    // ============================================================
    // INDEXING DIAGNOSTICS
    // ============================================================

    pub fn record_diagnostic(&self, run_id: &str, diagnostic: &ParseDiagnostic) -> Result<()> {
        self.conn.execute(
            "INSERT INTO index_diagnostics
             (run_id, stage, category, severity, file_path, message, hint, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                run_id,
                diagnostic.stage,
                diagnostic.category,
                diagnostic.severity.as_str(),
                diagnostic.file,
                diagnostic.message,
                diagnostic.hint,
                unix_now()
            ],
        )?;
        Ok(())
    }

    pub fn diagnostics_for_run(&self, run_id: &str) -> Result<Vec<DiagnosticRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT run_id, stage, category, severity, file_path, message, hint, created_at
             FROM index_diagnostics WHERE run_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![run_id], |row| {
            Ok(DiagnosticRow {
                run_id: row.get(0)?,
                stage: row.get(1)?,
                category: row.get(2)?,
                severity: row.get(3)?,
                file_path: row.get(4)?,
                message: row.get(5)?,
                hint: row.get(6)?,
                created_at: row.get(7)?,
            })
        })?;
        let mut diagnostics = Vec::new();
        for row in rows {
            diagnostics.push(row?);
        }
        Ok(diagnostics)
    }

    // ============================================================
    // TOOL METRICS
    // ============================================================

    pub fn record_tool_metric(&self, tool: &str, duration_ms: i64, cache_mode: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO tool_metrics (tool, duration_ms, cache_mode, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![tool, duration_ms, cache_mode, unix_now()],
        )?;
        Ok(())
    }

    // ============================================================
    // ARTIFACT QUARANTINE AND PINS
    // ============================================================

    pub fn quarantine_artifact(&self, artifact_id: &str, reason: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO artifact_quarantine (artifact_id, reason, quarantined_at)
             VALUES (?1, ?2, ?3)",
            params![artifact_id, reason, unix_now()],
        )?;
        Ok(())
    }

    pub fn is_quarantined(&self, artifact_id: &str) -> Result<bool> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM artifact_quarantine WHERE artifact_id = ?1",
            params![artifact_id],
            |row| row.get::<_, i64>(0).map(|c| c > 0),
        )?)
    }

    pub fn release_from_quarantine(&self, artifact_id: &str) -> Result<bool> {
        let removed = self.conn.execute(
            "DELETE FROM artifact_quarantine WHERE artifact_id = ?1",
            params![artifact_id],
        )?;
        Ok(removed > 0)
    }

    pub fn quarantined_artifacts(&self) -> Result<Vec<QuarantineRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT artifact_id, reason, quarantined_at
             FROM artifact_quarantine ORDER BY quarantined_at",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(QuarantineRow {
                artifact_id: row.get(0)?,
                reason: row.get(1)?,
                quarantined_at: row.get(2)?,
            })
        })?;
        let mut artifacts = Vec::new();
        for row in rows {
            artifacts.push(row?);
        }
        Ok(artifacts)
    }

    pub fn pin_artifact(&self, repo: &str, snapshot: &str, artifact_id: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO artifact_pins (repo, snapshot, artifact_id, pinned_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![repo, snapshot, artifact_id, unix_now()],
        )?;
        Ok(())
    }

    /// Apply a verified artifact's rank priors and record its pin and event
    /// in one transaction, the same atomicity the whole-file mutators give.
    /// Only rows whose rank actually moves are touched; the epoch bumps when
    /// any did. Returns the number of priors applied.
    pub fn apply_artifact_outcome(
        &mut self,
        priors: &[(i64, f64)],
        repo: &str,
        snapshot: &str,
        artifact_id: &str,
    ) -> Result<usize> {
        let now = unix_now();
        let tx = self.conn.transaction()?;
        let mut applied = 0;
        {
            let mut stmt = tx.prepare(
                "UPDATE symbols SET pagerank = ?2 WHERE id = ?1 AND pagerank != ?2",
            )?;
            for (id, rank) in priors {
                applied += stmt.execute(params![id, rank])?;
            }
        }
        tx.execute(
            "INSERT OR REPLACE INTO artifact_pins (repo, snapshot, artifact_id, pinned_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![repo, snapshot, artifact_id, now],
        )?;
        tx.execute(
            "INSERT INTO sync_events (event, detail, created_at) VALUES (?1, ?2, ?3)",
            params!["artifact_applied", artifact_id, now],
        )?;
        if applied > 0 {
            Self::bump_cache_epoch(&tx)?;
        }
        tx.commit()?;
        Ok(applied)
    }

    pub fn pinned_artifact(&self, repo: &str, snapshot: &str) -> Result<Option<String>> {
        match self.conn.query_row(
            "SELECT artifact_id FROM artifact_pins WHERE repo = ?1 AND snapshot = ?2",
            params![repo, snapshot],
            |row| row.get::<_, String>(0),
        ) {
            Ok(id) => Ok(Some(id)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    // ============================================================
    // CIRCUIT BREAKER
    // ============================================================

    pub fn breaker_state(&self, remote: &str) -> Result<(BreakerState, i64, Option<i64>)> {
        match self.conn.query_row(
            "SELECT state, failure_count, opened_at FROM circuit_breaker WHERE remote = ?1",
            params![remote],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, Option<i64>>(2)?,
                ))
            },
        ) {
            Ok((state, failures, opened_at)) => Ok((
                BreakerState::parse(&state).unwrap_or(BreakerState::Closed),
                failures,
                opened_at,
            )),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok((BreakerState::Closed, 0, None)),
            Err(e) => Err(e.into()),
        }
    }

    pub fn set_breaker_state(
        &self,
        remote: &str,
        state: BreakerState,
        failure_count: i64,
    ) -> Result<()> {
        let opened_at = if state == BreakerState::Open {
            Some(unix_now())
        } else {
            None
        };
        self.conn.execute(
            "INSERT OR REPLACE INTO circuit_breaker (remote, state, failure_count, opened_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![remote, state.as_str(), failure_count, opened_at],
        )?;
        Ok(())
    }

    // ============================================================
    // SYNC EVENT LOG AND OUTBOUND QUEUE
    // ============================================================

    pub fn record_sync_event(&self, event: &str, detail: Option<&str>) -> Result<()> {
        self.conn.execute(
            "INSERT INTO sync_events (event, detail, created_at) VALUES (?1, ?2, ?3)",
            params![event, detail, unix_now()],
        )?;
        Ok(())
    }

    pub fn recent_sync_events(&self, limit: usize) -> Result<Vec<SyncEventRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT event, detail, created_at FROM sync_events
             ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(SyncEventRow {
                event: row.get(0)?,
                detail: row.get(1)?,
                created_at: row.get(2)?,
            })
        })?;
        let mut events = Vec::new();
        for row in rows {
            events.push(row?);
        }
        Ok(events)
    }

    pub fn enqueue_outbound(&self, delta_id: &str, payload: &str) -> Result<()> {
        let now = unix_now();
        self.conn.execute(
            "INSERT INTO sync_outbound (delta_id, payload, status, attempts, created_at, updated_at)
             VALUES (?1, ?2, 'pending', 0, ?3, ?3)
             ON CONFLICT(delta_id) DO NOTHING",
            params![delta_id, payload, now],
        )?;
        Ok(())
    }

    pub fn mark_outbound(&self, delta_id: &str, status: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE sync_outbound
             SET status = ?2, attempts = attempts + 1, updated_at = ?3
             WHERE delta_id = ?1",
            params![delta_id, status, unix_now()],
        )?;
        Ok(())
    }

    pub fn pending_outbound(&self) -> Result<Vec<OutboundDelta>> {
        let mut stmt = self.conn.prepare(
            "SELECT delta_id, payload, status, attempts FROM sync_outbound
             WHERE status = 'pending' ORDER BY created_at",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(OutboundDelta {
                delta_id: row.get(0)?,
                payload: row.get(1)?,
                status: row.get(2)?,
                attempts: row.get(3)?,
            })
        })?;
        let mut deltas = Vec::new();
        for row in rows {
            deltas.push(row?);
        }
        Ok(deltas)
    }

    // ============================================================
    // TRUSTED SIGNING KEYS
    // ============================================================

    pub fn add_trusted_key(&self, key_id: &str, algorithm: &str, key_material: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO trusted_keys (key_id, algorithm, key_material, added_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![key_id, algorithm, key_material, unix_now()],
        )?;
        Ok(())
    }

    pub fn trusted_key(&self, key_id: &str) -> Result<Option<(String, String)>> {
        match self.conn.query_row(
            "SELECT algorithm, key_material FROM trusted_keys WHERE key_id = ?1",
            params![key_id],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
        ) {
            Ok(key) => Ok(Some(key)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quarantine_round_trip() {
        let store = GraphStore::open_in_memory().unwrap();
        assert!(!store.is_quarantined("a1").unwrap());
        store.quarantine_artifact("a1", "checksum mismatch").unwrap();
        assert!(store.is_quarantined("a1").unwrap());
        assert_eq!(store.quarantined_artifacts().unwrap().len(), 1);
        assert!(store.release_from_quarantine("a1").unwrap());
        assert!(!store.is_quarantined("a1").unwrap());
    }

    #[test]
    fn breaker_defaults_closed() {
        let store = GraphStore::open_in_memory().unwrap();
        let (state, failures, _) = store.breaker_state("remote-a").unwrap();
        assert_eq!(state, BreakerState::Closed);
        assert_eq!(failures, 0);

        store
            .set_breaker_state("remote-a", BreakerState::Open, 3)
            .unwrap();
        let (state, failures, opened_at) = store.breaker_state("remote-a").unwrap();
        assert_eq!(state, BreakerState::Open);
        assert_eq!(failures, 3);
        assert!(opened_at.is_some());
    }

    #[test]
    fn outbound_queue_status_flow() {
        let store = GraphStore::open_in_memory().unwrap();
        store.enqueue_outbound("d1", "{}").unwrap();
        store.enqueue_outbound("d1", "{}").unwrap(); // idempotent
        assert_eq!(store.pending_outbound().unwrap().len(), 1);
        store.mark_outbound("d1", "sent").unwrap();
        assert!(store.pending_outbound().unwrap().is_empty());
    }
}
