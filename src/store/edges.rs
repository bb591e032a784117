// Edge storage and traversal lookups
//
// Endpoints are polymorphic: symbol or file ids. Uniqueness is on the
// (source, target, relationship) tuple; INSERT OR IGNORE keeps duplicate call
// sites from multiplying edges. The per-file replace pairs with the symbol
// replace so an index run is idempotent.

use super::{GraphStore, placeholders};
use crate::error::Result;
use crate::extractor::Relationship;
use rusqlite::params;
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointKind {
    Symbol,
    File,
}

impl EndpointKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointKind::Symbol => "symbol",
            EndpointKind::File => "file",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "symbol" => Some(EndpointKind::Symbol),
            "file" => Some(EndpointKind::File),
            _ => None,
        }
    }
}

impl fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EdgeRow {
    pub id: i64,
    pub source_id: i64,
    pub source_kind: EndpointKind,
    pub target_id: i64,
    pub target_kind: EndpointKind,
    pub relationship: Relationship,
    pub file_path: String,
    pub line: u32,
    pub confidence: f64,
}

/// Edge waiting to be persisted; the file path comes from the replace call.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEdge {
    pub source_id: i64,
    pub source_kind: EndpointKind,
    pub target_id: i64,
    pub target_kind: EndpointKind,
    pub relationship: Relationship,
    pub line: u32,
    pub confidence: f64,
}

impl NewEdge {
    pub fn symbol_to_symbol(
        source_id: i64,
        target_id: i64,
        relationship: Relationship,
        line: u32,
        confidence: f64,
    ) -> Self {
        Self {
            source_id,
            source_kind: EndpointKind::Symbol,
            target_id,
            target_kind: EndpointKind::Symbol,
            relationship,
            line,
            confidence,
        }
    }
}

const EDGE_COLUMNS: &str =
    "id, source_id, source_kind, target_id, target_kind, relationship, file_path, line, confidence";

impl GraphStore {
    /// Whole-file edge replace: drops every edge recorded as appearing in the
    /// file, then inserts the new set.
    pub fn replace_file_edges(&mut self, path: &str, edges: &[NewEdge]) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM edges WHERE file_path = ?1", params![path])?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO edges
                 (source_id, source_kind, target_id, target_kind, relationship,
                  file_path, line, confidence)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for edge in edges {
                stmt.execute(params![
                    edge.source_id,
                    edge.source_kind.as_str(),
                    edge.target_id,
                    edge.target_kind.as_str(),
                    edge.relationship.as_str(),
                    path,
                    edge.line,
                    edge.confidence,
                ])?;
            }
        }
        Self::bump_cache_epoch(&tx)?;
        tx.commit()?;
        debug!("replaced {} edges for {path}", edges.len());
        Ok(())
    }

    /// Outgoing edges from any of `ids` (symbol endpoints) across the given
    /// relationship set.
    pub fn edges_from(&self, ids: &[i64], kinds: &[Relationship]) -> Result<Vec<EdgeRow>> {
        self.edges_touching(ids, kinds, "source_id", "source_kind")
    }

    /// Incoming edges into any of `ids` (symbol endpoints).
    pub fn edges_to(&self, ids: &[i64], kinds: &[Relationship]) -> Result<Vec<EdgeRow>> {
        self.edges_touching(ids, kinds, "target_id", "target_kind")
    }

    fn edges_touching(
        &self,
        ids: &[i64],
        kinds: &[Relationship],
        id_column: &str,
        kind_column: &str,
    ) -> Result<Vec<EdgeRow>> {
        if ids.is_empty() || kinds.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {EDGE_COLUMNS} FROM edges
             WHERE {kind_column} = 'symbol'
               AND {id_column} IN ({})
               AND relationship IN ({})
             ORDER BY id",
            placeholders(ids.len()),
            placeholders(kinds.len()),
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        for id in ids {
            params.push(Box::new(*id));
        }
        for kind in kinds {
            params.push(Box::new(kind.as_str()));
        }
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let rows = stmt.query_map(&param_refs[..], row_to_edge)?;
        let mut edges = Vec::new();
        for row in rows {
            edges.push(row?);
        }
        Ok(edges)
    }

    /// Edges whose endpoints are both inside the given symbol set, for
    /// relationship summaries.
    pub fn edges_among(&self, ids: &[i64]) -> Result<Vec<EdgeRow>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let marks = placeholders(ids.len());
        let sql = format!(
            "SELECT {EDGE_COLUMNS} FROM edges
             WHERE source_kind = 'symbol' AND target_kind = 'symbol'
               AND source_id IN ({marks}) AND target_id IN ({marks})
             ORDER BY id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        for id in ids {
            params.push(Box::new(*id));
        }
        for id in ids {
            params.push(Box::new(*id));
        }
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let rows = stmt.query_map(&param_refs[..], row_to_edge)?;
        let mut edges = Vec::new();
        for row in rows {
            edges.push(row?);
        }
        Ok(edges)
    }

    /// Symbol-to-symbol adjacency over the rank relationship set
    /// (CALLS, IMPORTS_SYMBOL, EXTENDS, IMPLEMENTS).
    pub fn rank_edges(&self) -> Result<Vec<(i64, i64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT source_id, target_id FROM edges
             WHERE source_kind = 'symbol' AND target_kind = 'symbol'
               AND relationship IN ('CALLS', 'IMPORTS_SYMBOL', 'EXTENDS', 'IMPLEMENTS')
             ORDER BY source_id, target_id",
        )?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        let mut edges = Vec::new();
        for row in rows {
            edges.push(row?);
        }
        Ok(edges)
    }

    pub fn all_symbol_ids(&self) -> Result<Vec<i64>> {
        let mut stmt = self.conn.prepare("SELECT id FROM symbols ORDER BY id")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }

    /// Files whose recorded edges point into symbols of the given files.
    /// These are the dependents whose edges must be re-resolved after an
    /// incremental change.
    pub fn files_with_edges_into(&self, paths: &[String]) -> Result<Vec<String>> {
        if paths.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT DISTINCT e.file_path FROM edges e
             JOIN symbols s ON e.target_kind = 'symbol' AND e.target_id = s.id
             WHERE s.file_path IN ({})
             ORDER BY e.file_path",
            placeholders(paths.len())
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let params: Vec<&dyn rusqlite::ToSql> =
            paths.iter().map(|p| p as &dyn rusqlite::ToSql).collect();
        let rows = stmt.query_map(&params[..], |row| row.get::<_, String>(0))?;
        let mut files = Vec::new();
        for row in rows {
            files.push(row?);
        }
        Ok(files)
    }

    /// Edges whose symbol endpoints no longer exist. Zero in a healthy store;
    /// exposed for invariant checks.
    pub fn orphan_edge_count(&self) -> Result<i64> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM edges e
             WHERE (e.source_kind = 'symbol'
                    AND NOT EXISTS (SELECT 1 FROM symbols s WHERE s.id = e.source_id))
                OR (e.target_kind = 'symbol'
                    AND NOT EXISTS (SELECT 1 FROM symbols s WHERE s.id = e.target_id))
                OR (e.source_kind = 'file'
                    AND NOT EXISTS (SELECT 1 FROM files f WHERE f.id = e.source_id))
                OR (e.target_kind = 'file'
                    AND NOT EXISTS (SELECT 1 FROM files f WHERE f.id = e.target_id))",
            [],
            |row| row.get(0),
        )?)
    }
}

fn row_to_edge(row: &rusqlite::Row) -> rusqlite::Result<EdgeRow> {
    let source_kind: String = row.get(2)?;
    let target_kind: String = row.get(4)?;
    let relationship: String = row.get(5)?;
    Ok(EdgeRow {
        id: row.get(0)?,
        source_id: row.get(1)?,
        source_kind: EndpointKind::parse(&source_kind).unwrap_or(EndpointKind::Symbol),
        target_id: row.get(3)?,
        target_kind: EndpointKind::parse(&target_kind).unwrap_or(EndpointKind::Symbol),
        relationship: Relationship::parse(&relationship).unwrap_or(Relationship::Calls),
        file_path: row.get(6)?,
        line: row.get(7)?,
        confidence: row.get(8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::{SymbolKind, SymbolRecord};
    use crate::scanner::Language;
    use crate::store::files::FileUpsert;

    fn seed(store: &mut GraphStore) -> Vec<i64> {
        let records = vec![
            SymbolRecord::new("f", "m.f", SymbolKind::Function, 1, 3),
            SymbolRecord::new("g", "m.g", SymbolKind::Function, 5, 7),
            SymbolRecord::new("h", "m.h", SymbolKind::Function, 9, 11),
        ];
        store
            .replace_file_symbols(
                &FileUpsert {
                    path: "m.py",
                    language: Language::Python,
                    hash: "h",
                    size: 1,
                    content: None,
                },
                &records,
            )
            .unwrap()
    }

    #[test]
    fn replace_and_query_directional() {
        let mut store = GraphStore::open_in_memory().unwrap();
        let ids = seed(&mut store);
        store
            .replace_file_edges(
                "m.py",
                &[
                    NewEdge::symbol_to_symbol(ids[0], ids[1], Relationship::Calls, 2, 1.0),
                    NewEdge::symbol_to_symbol(ids[1], ids[2], Relationship::Calls, 6, 1.0),
                ],
            )
            .unwrap();

        let from_f = store.edges_from(&[ids[0]], &[Relationship::Calls]).unwrap();
        assert_eq!(from_f.len(), 1);
        assert_eq!(from_f[0].target_id, ids[1]);

        let into_g = store.edges_to(&[ids[1]], &[Relationship::Calls]).unwrap();
        assert_eq!(into_g.len(), 1);
        assert_eq!(into_g[0].source_id, ids[0]);

        // other relationship kinds do not leak into the query
        let none = store.edges_from(&[ids[0]], &[Relationship::Extends]).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn duplicate_edges_collapse() {
        let mut store = GraphStore::open_in_memory().unwrap();
        let ids = seed(&mut store);
        let edge = NewEdge::symbol_to_symbol(ids[0], ids[1], Relationship::Calls, 2, 1.0);
        store
            .replace_file_edges("m.py", &[edge.clone(), edge])
            .unwrap();
        assert_eq!(store.total_edges().unwrap(), 1);
    }

    #[test]
    fn symbol_replace_cleans_reverse_edges() {
        let mut store = GraphStore::open_in_memory().unwrap();
        let ids = seed(&mut store);
        store
            .replace_file_edges(
                "m.py",
                &[NewEdge::symbol_to_symbol(ids[0], ids[1], Relationship::Calls, 2, 1.0)],
            )
            .unwrap();

        // replacing the file's symbols drops edges touching the old set
        seed(&mut store);
        assert_eq!(store.orphan_edge_count().unwrap(), 0);
        assert_eq!(store.total_edges().unwrap(), 0);
    }
}
