// Fixture helpers shared by the integration tests

use crate::config::Config;
use crate::pipeline::{IndexPipeline, IndexStats};
use crate::query::QueryEngine;
use crate::store::GraphStore;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub struct Fixture {
    pub dir: TempDir,
    pub config: Config,
    pub store: Arc<Mutex<GraphStore>>,
    pub stats: IndexStats,
}

impl Fixture {
    pub fn engine(&self) -> QueryEngine {
        QueryEngine::new(self.store.clone())
    }

    pub fn reindex(&mut self) -> IndexStats {
        let pipeline = IndexPipeline::new(self.config.clone());
        let mut store = self.store.lock().unwrap();
        pipeline.full_index(&mut store, None, None).unwrap()
    }

    pub fn incremental(&mut self, changeset: &crate::pipeline::Changeset) -> IndexStats {
        let pipeline = IndexPipeline::new(self.config.clone());
        let mut store = self.store.lock().unwrap();
        pipeline
            .incremental_index(&mut store, changeset, None, None)
            .unwrap()
    }

    pub fn store(&self) -> std::sync::MutexGuard<'_, GraphStore> {
        self.store.lock().unwrap()
    }

    pub fn write(&self, rel: &str, contents: &str) {
        write_file(self.dir.path(), rel, contents);
    }

    pub fn remove(&self, rel: &str) {
        fs::remove_file(self.dir.path().join(rel)).unwrap();
    }
}

pub fn write_file(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

/// Write the given files under a tempdir and run a full index.
pub fn index_fixture(files: &[(&str, &str)]) -> Fixture {
    index_fixture_with(files, |_| {})
}

pub fn index_fixture_with(files: &[(&str, &str)], tune: impl FnOnce(&mut Config)) -> Fixture {
    let dir = TempDir::new().unwrap();
    for (rel, contents) in files {
        write_file(dir.path(), rel, contents);
    }
    let mut config = Config::new(dir.path());
    tune(&mut config);

    let mut store = GraphStore::open(&config.db_path()).unwrap();
    let pipeline = IndexPipeline::new(config.clone());
    let stats = pipeline.full_index(&mut store, None, None).unwrap();

    Fixture {
        dir,
        config,
        store: Arc::new(Mutex::new(store)),
        stats,
    }
}

/// A python module with a call chain f0 -> f1 -> ... -> f{n-1}.
pub fn chain_module(n: usize) -> String {
    let mut source = String::new();
    for i in 0..n {
        source.push_str(&format!("def f{i}():\n"));
        if i + 1 < n {
            source.push_str(&format!("    f{}()\n", i + 1));
        } else {
            source.push_str("    pass\n");
        }
        source.push('\n');
    }
    source
}
