// File table operations
//
// File content is stored alongside the metadata so query engines can emit
// source fragments without touching the filesystem at query time.

use super::{GraphStore, unix_now};
use crate::error::Result;
use crate::scanner::Language;
use rusqlite::params;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct FileRow {
    pub id: i64,
    pub path: String,
    pub language: Language,
    pub hash: String,
    pub size: i64,
    pub last_indexed: i64,
}

#[derive(Debug, Clone)]
pub struct FileUpsert<'a> {
    pub path: &'a str,
    pub language: Language,
    pub hash: &'a str,
    pub size: i64,
    pub content: Option<&'a str>,
}

impl GraphStore {
    /// Create or refresh a file row. Part of the whole-file replace
    /// transaction in the merge stage; callable standalone for tests.
    pub fn upsert_file(&mut self, file: &FileUpsert) -> Result<i64> {
        let tx = self.conn.transaction()?;
        let id = upsert_file_tx(&tx, file)?;
        Self::bump_cache_epoch(&tx)?;
        tx.commit()?;
        Ok(id)
    }

    pub fn file_by_path(&self, path: &str) -> Result<Option<FileRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, path, language, hash, size, last_indexed
             FROM files WHERE path = ?1",
        )?;
        let mut rows = stmt.query_map(params![path], row_to_file)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    pub fn file_content(&self, path: &str) -> Result<Option<String>> {
        match self.conn.query_row(
            "SELECT content FROM files WHERE path = ?1",
            params![path],
            |row| row.get::<_, Option<String>>(0),
        ) {
            Ok(content) => Ok(content),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// All stored (path, hash) pairs, for incremental change detection.
    pub fn file_hashes(&self) -> Result<HashMap<String, String>> {
        let mut stmt = self.conn.prepare("SELECT path, hash FROM files")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut hashes = HashMap::new();
        for row in rows {
            let (path, hash) = row?;
            hashes.insert(path, hash);
        }
        Ok(hashes)
    }

    pub fn files_under(&self, prefix: &str) -> Result<Vec<FileRow>> {
        let pattern = if prefix.is_empty() {
            "%".to_string()
        } else {
            format!("{}%", prefix.trim_end_matches('/').to_string() + "/")
        };
        let mut stmt = self.conn.prepare(
            "SELECT id, path, language, hash, size, last_indexed
             FROM files
             WHERE path LIKE ?1 OR path = ?2
             ORDER BY path",
        )?;
        let rows = stmt.query_map(params![pattern, prefix], row_to_file)?;
        let mut files = Vec::new();
        for row in rows {
            files.push(row?);
        }
        Ok(files)
    }

    pub fn all_files(&self) -> Result<Vec<FileRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, path, language, hash, size, last_indexed
             FROM files ORDER BY path",
        )?;
        let rows = stmt.query_map([], row_to_file)?;
        let mut files = Vec::new();
        for row in rows {
            files.push(row?);
        }
        Ok(files)
    }

    /// Remove a file and its whole graph: symbols (and their parameters via
    /// cascade), every edge touching those symbols or the file itself, and
    /// the file's external deps. One transaction, one epoch bump.
    pub fn delete_file_graph(&mut self, path: &str) -> Result<()> {
        let tx = self.conn.transaction()?;

        let file_id: Option<i64> = match tx.query_row(
            "SELECT id FROM files WHERE path = ?1",
            params![path],
            |row| row.get(0),
        ) {
            Ok(id) => Some(id),
            Err(rusqlite::Error::QueryReturnedNoRows) => None,
            Err(e) => return Err(e.into()),
        };
        let Some(file_id) = file_id else {
            tx.commit()?;
            return Ok(());
        };

        tx.execute(
            "DELETE FROM edges
             WHERE (source_kind = 'symbol' AND source_id IN
                       (SELECT id FROM symbols WHERE file_path = ?1))
                OR (target_kind = 'symbol' AND target_id IN
                       (SELECT id FROM symbols WHERE file_path = ?1))
                OR (source_kind = 'file' AND source_id = ?2)
                OR (target_kind = 'file' AND target_id = ?2)",
            params![path, file_id],
        )?;
        tx.execute(
            "DELETE FROM external_deps WHERE file_path = ?1",
            params![path],
        )?;
        // Symbols and parameters cascade from the file row.
        tx.execute("DELETE FROM files WHERE path = ?1", params![path])?;

        Self::bump_cache_epoch(&tx)?;
        tx.commit()?;
        debug!("deleted file graph for {path}");
        Ok(())
    }

    /// Rename a file in place. Symbol rows migrate via the path cascade;
    /// qualified names that encode the path are recomputed by the caller
    /// (the pipeline knows the language rules) through `rewrite_qualified_names`.
    pub fn rename_file(&mut self, old_path: &str, new_path: &str) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "UPDATE files SET path = ?2 WHERE path = ?1",
            params![old_path, new_path],
        )?;
        tx.execute(
            "UPDATE edges SET file_path = ?2 WHERE file_path = ?1",
            params![old_path, new_path],
        )?;
        tx.execute(
            "UPDATE external_deps SET file_path = ?2 WHERE file_path = ?1",
            params![old_path, new_path],
        )?;
        Self::bump_cache_epoch(&tx)?;
        tx.commit()?;
        debug!("renamed file {old_path} -> {new_path}");
        Ok(())
    }

    /// Rewrite qualified-name prefixes after a rename, in one transaction.
    pub fn rewrite_qualified_names(&mut self, path: &str, old_prefix: &str, new_prefix: &str) -> Result<()> {
        if old_prefix == new_prefix {
            return Ok(());
        }
        let tx = self.conn.transaction()?;
        tx.execute(
            "UPDATE symbols
             SET qualified_name = ?3 || SUBSTR(qualified_name, LENGTH(?2) + 1)
             WHERE file_path = ?1
               AND SUBSTR(qualified_name, 1, LENGTH(?2) + 1) = ?2 || '.'",
            params![path, old_prefix, new_prefix],
        )?;
        Self::bump_cache_epoch(&tx)?;
        tx.commit()?;
        Ok(())
    }
}

pub(super) fn upsert_file_tx(
    tx: &rusqlite::Transaction,
    file: &FileUpsert,
) -> rusqlite::Result<i64> {
    tx.execute(
        "INSERT INTO files (path, language, hash, size, last_indexed, content)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(path) DO UPDATE SET
             language = excluded.language,
             hash = excluded.hash,
             size = excluded.size,
             last_indexed = excluded.last_indexed,
             content = excluded.content",
        params![
            file.path,
            file.language.as_str(),
            file.hash,
            file.size,
            unix_now(),
            file.content
        ],
    )?;
    tx.query_row(
        "SELECT id FROM files WHERE path = ?1",
        params![file.path],
        |row| row.get(0),
    )
}

fn row_to_file(row: &rusqlite::Row) -> rusqlite::Result<FileRow> {
    let language: String = row.get(2)?;
    Ok(FileRow {
        id: row.get(0)?,
        path: row.get(1)?,
        language: Language::parse(&language).unwrap_or(Language::Python),
        hash: row.get(3)?,
        size: row.get(4)?,
        last_indexed: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_and_lookup() {
        let mut store = GraphStore::open_in_memory().unwrap();
        let id = store
            .upsert_file(&FileUpsert {
                path: "a.py",
                language: Language::Python,
                hash: "h1",
                size: 10,
                content: Some("x = 1\n"),
            })
            .unwrap();
        assert!(id > 0);

        let row = store.file_by_path("a.py").unwrap().unwrap();
        assert_eq!(row.hash, "h1");
        assert_eq!(store.file_content("a.py").unwrap().as_deref(), Some("x = 1\n"));

        // Re-upsert keeps the id stable.
        let id2 = store
            .upsert_file(&FileUpsert {
                path: "a.py",
                language: Language::Python,
                hash: "h2",
                size: 12,
                content: None,
            })
            .unwrap();
        assert_eq!(id, id2);
        assert_eq!(store.file_by_path("a.py").unwrap().unwrap().hash, "h2");
    }

    #[test]
    fn files_under_prefix() {
        let mut store = GraphStore::open_in_memory().unwrap();
        for path in ["src/a.py", "src/sub/b.py", "other/c.py"] {
            store
                .upsert_file(&FileUpsert {
                    path,
                    language: Language::Python,
                    hash: "h",
                    size: 1,
                    content: None,
                })
                .unwrap();
        }
        let under = store.files_under("src").unwrap();
        let paths: Vec<&str> = under.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["src/a.py", "src/sub/b.py"]);
    }
}
