// External dependency records
//
// Imports that did not resolve to an in-repo file. They seed cross-repo
// resolution when sharding is enabled.

use super::GraphStore;
use crate::error::Result;
use crate::extractor::ImportRecord;
use rusqlite::params;

#[derive(Debug, Clone, PartialEq)]
pub struct ExternalDepRow {
    pub id: i64,
    pub file_path: String,
    pub raw_import: String,
    pub module_name: String,
    pub line: u32,
}

impl GraphStore {
    pub fn replace_external_deps(&mut self, path: &str, deps: &[ImportRecord]) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM external_deps WHERE file_path = ?1",
            params![path],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO external_deps (file_path, raw_import, module_name, line)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for dep in deps {
                stmt.execute(params![path, dep.raw_text, dep.module, dep.line])?;
            }
        }
        Self::bump_cache_epoch(&tx)?;
        tx.commit()?;
        Ok(())
    }

    pub fn external_deps_for_file(&self, path: &str) -> Result<Vec<ExternalDepRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, file_path, raw_import, module_name, line
             FROM external_deps WHERE file_path = ?1 ORDER BY line",
        )?;
        let rows = stmt.query_map(params![path], row_to_dep)?;
        let mut deps = Vec::new();
        for row in rows {
            deps.push(row?);
        }
        Ok(deps)
    }

    pub fn all_external_modules(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT module_name FROM external_deps ORDER BY module_name",
        )?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut modules = Vec::new();
        for row in rows {
            modules.push(row?);
        }
        Ok(modules)
    }
}

fn row_to_dep(row: &rusqlite::Row) -> rusqlite::Result<ExternalDepRow> {
    Ok(ExternalDepRow {
        id: row.get(0)?,
        file_path: row.get(1)?,
        raw_import: row.get(2)?,
        module_name: row.get(3)?,
        line: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replace_is_wholesale() {
        let mut store = GraphStore::open_in_memory().unwrap();
        let dep = |module: &str| ImportRecord {
            raw_text: format!("import {module}"),
            module: module.to_string(),
            imported_name: None,
            alias: None,
            line: 1,
        };
        store
            .replace_external_deps("a.py", &[dep("requests"), dep("numpy")])
            .unwrap();
        store.replace_external_deps("a.py", &[dep("requests")]).unwrap();

        let deps = store.external_deps_for_file("a.py").unwrap();
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].module_name, "requests");
        assert_eq!(store.all_external_modules().unwrap(), vec!["requests"]);
    }
}
