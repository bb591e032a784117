// Symbol storage and lookups
//
// The only write path is the whole-file replace: old symbols (and the edges
// touching them) go away, the new batch lands sorted by (start_line,
// qualified_name) so row ids are assigned in a run-independent order, and the
// cache epoch bumps once. Parameters are replaced wholesale with their
// parent symbol.

use super::files::{FileUpsert, upsert_file_tx};
use super::{GraphStore, placeholders};
use crate::error::Result;
use crate::extractor::{SymbolKind, SymbolRecord, Visibility};
use crate::scanner::hash_bytes;
use rusqlite::params;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct SymbolRow {
    pub id: i64,
    pub name: String,
    pub qualified_name: String,
    pub kind: SymbolKind,
    pub file_path: String,
    pub start_line: u32,
    pub end_line: u32,
    pub signature: String,
    pub return_type: Option<String>,
    pub visibility: Visibility,
    pub is_async: bool,
    pub is_static: bool,
    pub parent_id: Option<i64>,
    pub docstring: Option<String>,
    pub pagerank: f64,
}

/// Collision-safe identity key: (qualified_name, file_path, lines, signature hash).
pub fn signature_hash(signature: &str) -> String {
    hash_bytes(signature.as_bytes())[..16].to_string()
}

const SYMBOL_COLUMNS: &str = "id, name, qualified_name, kind, file_path, start_line, end_line,
     signature, return_type, visibility, is_async, is_static, parent_id, docstring, pagerank";

const SYMBOL_COLUMNS_QUALIFIED: &str =
    "s.id, s.name, s.qualified_name, s.kind, s.file_path, s.start_line, s.end_line,
     s.signature, s.return_type, s.visibility, s.is_async, s.is_static, s.parent_id,
     s.docstring, s.pagerank";

impl GraphStore {
    /// Whole-file symbol replace. Returns the new ids in the order of the
    /// input records.
    pub fn replace_file_symbols(
        &mut self,
        file: &FileUpsert,
        records: &[SymbolRecord],
    ) -> Result<Vec<i64>> {
        let tx = self.conn.transaction()?;
        upsert_file_tx(&tx, file)?;

        // Reverse edges into the outgoing symbol set are cleaned as part of
        // the atomic replace.
        tx.execute(
            "DELETE FROM edges
             WHERE (source_kind = 'symbol' AND source_id IN
                       (SELECT id FROM symbols WHERE file_path = ?1))
                OR (target_kind = 'symbol' AND target_id IN
                       (SELECT id FROM symbols WHERE file_path = ?1))",
            params![file.path],
        )?;
        tx.execute(
            "DELETE FROM symbols WHERE file_path = ?1",
            params![file.path],
        )?;

        // Insertion order determines row ids; sort for run independence.
        let mut order: Vec<usize> = (0..records.len()).collect();
        order.sort_by(|&a, &b| {
            records[a]
                .start_line
                .cmp(&records[b].start_line)
                .then_with(|| records[a].qualified_name.cmp(&records[b].qualified_name))
        });

        let mut ids = vec![0i64; records.len()];
        {
            let mut insert_symbol = tx.prepare(
                "INSERT INTO symbols
                 (name, qualified_name, kind, file_path, start_line, end_line, signature,
                  signature_hash, return_type, visibility, is_async, is_static, docstring)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            )?;
            let mut insert_param = tx.prepare(
                "INSERT INTO parameters (symbol_id, position, name, type_hint, default_value)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;

            for &index in &order {
                let record = &records[index];
                insert_symbol.execute(params![
                    record.name,
                    record.qualified_name,
                    record.kind.as_str(),
                    file.path,
                    record.start_line,
                    record.end_line,
                    record.signature,
                    signature_hash(&record.signature),
                    record.return_type,
                    record.visibility.as_str(),
                    record.is_async,
                    record.is_static,
                    record.docstring,
                ])?;
                let id = tx.last_insert_rowid();
                ids[index] = id;

                for (position, param) in record.parameters.iter().enumerate() {
                    insert_param.execute(params![
                        id,
                        position as i64,
                        param.name,
                        param.type_hint,
                        param.default_value,
                    ])?;
                }
            }

            // Second pass: methods point at their owning class.
            let mut set_parent = tx.prepare("UPDATE symbols SET parent_id = ?2 WHERE id = ?1")?;
            for (index, record) in records.iter().enumerate() {
                if let Some(parent_index) = record.parent_index
                    && parent_index < ids.len()
                {
                    set_parent.execute(params![ids[index], ids[parent_index]])?;
                }
            }
        }

        Self::bump_cache_epoch(&tx)?;
        tx.commit()?;
        debug!(
            "replaced {} symbols for {}",
            records.len(),
            file.path
        );
        Ok(ids)
    }

    /// Match extraction records against the stored symbols of an unchanged
    /// file, by identity key. Used when only a file's edges are re-resolved.
    pub fn map_file_symbol_ids(
        &self,
        path: &str,
        records: &[SymbolRecord],
    ) -> Result<Vec<Option<i64>>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, qualified_name, start_line, end_line FROM symbols WHERE file_path = ?1",
        )?;
        let rows = stmt.query_map(params![path], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, u32>(2)?,
                row.get::<_, u32>(3)?,
            ))
        })?;
        let mut by_key: HashMap<(String, u32, u32), i64> = HashMap::new();
        for row in rows {
            let (id, qualified, start, end) = row?;
            by_key.insert((qualified, start, end), id);
        }
        Ok(records
            .iter()
            .map(|record| {
                by_key
                    .get(&(
                        record.qualified_name.clone(),
                        record.start_line,
                        record.end_line,
                    ))
                    .copied()
            })
            .collect())
    }

    pub fn symbol_by_id(&self, id: i64) -> Result<Option<SymbolRow>> {
        let sql = format!("SELECT {SYMBOL_COLUMNS} FROM symbols WHERE id = ?1");
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query_map(params![id], row_to_symbol)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    pub fn symbols_by_ids(&self, ids: &[i64]) -> Result<Vec<SymbolRow>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {SYMBOL_COLUMNS} FROM symbols WHERE id IN ({}) ORDER BY id",
            placeholders(ids.len())
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let params: Vec<&dyn rusqlite::ToSql> =
            ids.iter().map(|id| id as &dyn rusqlite::ToSql).collect();
        let rows = stmt.query_map(&params[..], row_to_symbol)?;
        let mut symbols = Vec::new();
        for row in rows {
            symbols.push(row?);
        }
        Ok(symbols)
    }

    /// Exact qualified-name match; ties break by rank then id.
    pub fn symbol_by_qualified_name(&self, qualified: &str) -> Result<Option<SymbolRow>> {
        let sql = format!(
            "SELECT {SYMBOL_COLUMNS} FROM symbols
             WHERE qualified_name = ?1
             ORDER BY pagerank DESC, id ASC
             LIMIT 1"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query_map(params![qualified], row_to_symbol)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// All symbols with a given short name, best-ranked first.
    pub fn symbols_named(&self, name: &str) -> Result<Vec<SymbolRow>> {
        let sql = format!(
            "SELECT {SYMBOL_COLUMNS} FROM symbols
             WHERE name = ?1
             ORDER BY pagerank DESC, id ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![name], row_to_symbol)?;
        let mut symbols = Vec::new();
        for row in rows {
            symbols.push(row?);
        }
        Ok(symbols)
    }

    pub fn symbols_for_file(&self, path: &str) -> Result<Vec<SymbolRow>> {
        let sql = format!(
            "SELECT {SYMBOL_COLUMNS} FROM symbols
             WHERE file_path = ?1
             ORDER BY start_line, qualified_name"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![path], row_to_symbol)?;
        let mut symbols = Vec::new();
        for row in rows {
            symbols.push(row?);
        }
        Ok(symbols)
    }

    pub fn top_symbols_for_file(&self, path: &str, limit: usize) -> Result<Vec<SymbolRow>> {
        let sql = format!(
            "SELECT {SYMBOL_COLUMNS} FROM symbols
             WHERE file_path = ?1
             ORDER BY pagerank DESC, start_line ASC
             LIMIT ?2"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![path, limit as i64], row_to_symbol)?;
        let mut symbols = Vec::new();
        for row in rows {
            symbols.push(row?);
        }
        Ok(symbols)
    }

    /// FTS match over name, qualified name and docstring; scores are bm25
    /// (lower is better, so callers get them negated into "higher is better").
    pub fn fts_search(&self, query: &str, limit: usize) -> Result<Vec<(SymbolRow, f64)>> {
        let Some(match_expr) = fts_match_expression(query) else {
            return Ok(Vec::new());
        };
        let sql = format!(
            "SELECT {SYMBOL_COLUMNS_QUALIFIED}, -bm25(symbol_fts) AS score
             FROM symbol_fts
             JOIN symbols s ON s.id = symbol_fts.rowid
             WHERE symbol_fts MATCH ?1
             ORDER BY score DESC, s.id ASC
             LIMIT ?2"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![match_expr, limit as i64], |row| {
            let symbol = row_to_symbol(row)?;
            let score: f64 = row.get(15)?;
            Ok((symbol, score))
        })?;
        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    /// LIKE fallback when FTS produces nothing.
    pub fn like_search(&self, fragment: &str, limit: usize) -> Result<Vec<SymbolRow>> {
        let pattern = format!("%{}%", fragment.replace('%', "").replace('_', "\\_"));
        let sql = format!(
            "SELECT {SYMBOL_COLUMNS} FROM symbols
             WHERE name LIKE ?1 ESCAPE '\\' OR qualified_name LIKE ?1 ESCAPE '\\'
             ORDER BY pagerank DESC, id ASC
             LIMIT ?2"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![pattern, limit as i64], row_to_symbol)?;
        let mut symbols = Vec::new();
        for row in rows {
            symbols.push(row?);
        }
        Ok(symbols)
    }

    /// (inbound, outbound) edge counts per symbol, batched.
    pub fn symbol_degrees(&self, ids: &[i64]) -> Result<HashMap<i64, (i64, i64)>> {
        let mut degrees: HashMap<i64, (i64, i64)> = HashMap::new();
        if ids.is_empty() {
            return Ok(degrees);
        }
        let marks = placeholders(ids.len());
        let params: Vec<&dyn rusqlite::ToSql> =
            ids.iter().map(|id| id as &dyn rusqlite::ToSql).collect();

        let sql = format!(
            "SELECT target_id, COUNT(*) FROM edges
             WHERE target_kind = 'symbol' AND target_id IN ({marks})
             GROUP BY target_id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(&params[..], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (id, count) = row?;
            degrees.entry(id).or_default().0 = count;
        }

        let sql = format!(
            "SELECT source_id, COUNT(*) FROM edges
             WHERE source_kind = 'symbol' AND source_id IN ({marks})
             GROUP BY source_id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(&params[..], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (id, count) = row?;
            degrees.entry(id).or_default().1 = count;
        }
        Ok(degrees)
    }

    /// Write recomputed ranks in one transaction. Only rows whose value
    /// actually moves are touched, so an idempotent re-index leaves the store
    /// byte-identical.
    pub fn write_pageranks(&mut self, ranks: &[(i64, f64)]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let mut updated = 0;
        {
            let mut stmt = tx.prepare(
                "UPDATE symbols SET pagerank = ?2 WHERE id = ?1 AND pagerank != ?2",
            )?;
            for (id, rank) in ranks {
                updated += stmt.execute(params![id, rank])?;
            }
        }
        tx.commit()?;
        Ok(updated)
    }

    pub fn parameters_for_symbol(
        &self,
        symbol_id: i64,
    ) -> Result<Vec<crate::extractor::ParamRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT name, type_hint, default_value FROM parameters
             WHERE symbol_id = ?1 ORDER BY position",
        )?;
        let rows = stmt.query_map(params![symbol_id], |row| {
            Ok(crate::extractor::ParamRecord {
                name: row.get(0)?,
                type_hint: row.get(1)?,
                default_value: row.get(2)?,
            })
        })?;
        let mut parameters = Vec::new();
        for row in rows {
            parameters.push(row?);
        }
        Ok(parameters)
    }
}

/// Build an FTS5 match expression from free text: alphanumeric tokens become
/// quoted prefix terms so user punctuation can never break query syntax.
fn fts_match_expression(query: &str) -> Option<String> {
    let tokens: Vec<String> = query
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|t| !t.is_empty())
        .map(|t| format!("\"{t}\"*"))
        .collect();
    if tokens.is_empty() {
        None
    } else {
        Some(tokens.join(" OR "))
    }
}

pub(super) fn row_to_symbol(row: &rusqlite::Row) -> rusqlite::Result<SymbolRow> {
    let kind: String = row.get(3)?;
    let visibility: String = row.get(9)?;
    Ok(SymbolRow {
        id: row.get(0)?,
        name: row.get(1)?,
        qualified_name: row.get(2)?,
        kind: SymbolKind::parse(&kind).unwrap_or(SymbolKind::Function),
        file_path: row.get(4)?,
        start_line: row.get(5)?,
        end_line: row.get(6)?,
        signature: row.get(7)?,
        return_type: row.get(8)?,
        visibility: Visibility::parse(&visibility).unwrap_or(Visibility::Public),
        is_async: row.get(10)?,
        is_static: row.get(11)?,
        parent_id: row.get(12)?,
        docstring: row.get(13)?,
        pagerank: row.get(14)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::SymbolRecord;
    use crate::scanner::Language;

    fn record(name: &str, qualified: &str, start: u32) -> SymbolRecord {
        SymbolRecord::new(name, qualified, SymbolKind::Function, start, start + 2)
    }

    fn file<'a>(path: &'a str, hash: &'a str) -> FileUpsert<'a> {
        FileUpsert {
            path,
            language: Language::Python,
            hash,
            size: 1,
            content: None,
        }
    }

    #[test]
    fn replace_sorts_by_line_then_name() {
        let mut store = GraphStore::open_in_memory().unwrap();
        let records = vec![
            record("zeta", "m.zeta", 30),
            record("alpha", "m.alpha", 10),
            record("beta", "m.beta", 10),
        ];
        let ids = store
            .replace_file_symbols(&file("m.py", "h"), &records)
            .unwrap();

        // ids returned in input order, assigned in sorted order
        assert!(ids[1] < ids[2], "alpha before beta (same line, name order)");
        assert!(ids[2] < ids[0], "beta before zeta (line order)");

        let stored = store.symbols_for_file("m.py").unwrap();
        let names: Vec<&str> = stored.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "beta", "zeta"]);
    }

    #[test]
    fn replace_is_whole_file() {
        let mut store = GraphStore::open_in_memory().unwrap();
        store
            .replace_file_symbols(&file("m.py", "h1"), &[record("old", "m.old", 1)])
            .unwrap();
        store
            .replace_file_symbols(&file("m.py", "h2"), &[record("new", "m.new", 1)])
            .unwrap();
        let stored = store.symbols_for_file("m.py").unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].name, "new");
    }

    #[test]
    fn parent_linkage_survives_sorting() {
        let mut store = GraphStore::open_in_memory().unwrap();
        let mut method = record("run", "m.Task.run", 12);
        method.kind = SymbolKind::Method;
        method.parent_index = Some(1);
        let mut class = record("Task", "m.Task", 10);
        class.kind = SymbolKind::Class;
        class.end_line = 20;
        // method first in input order; class is its parent
        let ids = store
            .replace_file_symbols(&file("m.py", "h"), &[method, class])
            .unwrap();

        let run = store.symbol_by_id(ids[0]).unwrap().unwrap();
        assert_eq!(run.parent_id, Some(ids[1]));
    }

    #[test]
    fn fts_finds_by_name_and_docstring() {
        let mut store = GraphStore::open_in_memory().unwrap();
        let mut rec = record("authenticate", "auth.authenticate", 5);
        rec.docstring = Some("verify a login credential".to_string());
        store
            .replace_file_symbols(&file("auth.py", "h"), &[rec, record("other", "auth.other", 20)])
            .unwrap();

        let hits = store.fts_search("authenticate", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0.name, "authenticate");

        let hits = store.fts_search("credential", 10).unwrap();
        assert_eq!(hits.len(), 1);

        // punctuation-heavy input must not break FTS syntax
        let hits = store.fts_search("auth-enticate(\"x\")", 10).unwrap();
        assert!(!hits.is_empty());
    }

    #[test]
    fn like_fallback_matches_substrings() {
        let mut store = GraphStore::open_in_memory().unwrap();
        store
            .replace_file_symbols(&file("m.py", "h"), &[record("get_user_data", "m.get_user_data", 1)])
            .unwrap();
        let hits = store.like_search("user", 10).unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn pagerank_writes_only_changes() {
        let mut store = GraphStore::open_in_memory().unwrap();
        let ids = store
            .replace_file_symbols(&file("m.py", "h"), &[record("f", "m.f", 1)])
            .unwrap();
        assert_eq!(store.write_pageranks(&[(ids[0], 0.5)]).unwrap(), 1);
        assert_eq!(store.write_pageranks(&[(ids[0], 0.5)]).unwrap(), 0);
    }
}
