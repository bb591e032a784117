// Indexing pipeline
//
// Full and incremental entry points sharing one run loop: scan, hash-compare,
// parallel extraction on a bounded rayon pool, deterministic merge in path
// order, edge resolution over the complete symbol table, rank refresh, and a
// final epoch bump when anything mutated. Workers are pure; determinism is
// restored at the merge boundary by sorting on file path.

pub mod progress;
pub mod rank;
pub mod resolve;

pub use progress::{CancelToken, ProgressHandle, ProgressSnapshot};
pub use resolve::ResolutionIndex;

use crate::config::{Config, RuntimeProfile};
use crate::error::{BombeError, Result};
use crate::extractor::{self, DiagnosticSeverity, FileExtraction, ParseDiagnostic};
use crate::scanner::{Language, Scanner, hash_bytes};
use crate::store::{FileUpsert, GraphStore};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default)]
pub struct IndexStats {
    pub run_id: String,
    pub files_seen: usize,
    pub files_indexed: usize,
    pub files_unchanged: usize,
    pub files_skipped: usize,
    pub files_deleted: usize,
    pub symbols_indexed: usize,
    pub edges_resolved: usize,
    pub calls_ambiguous: usize,
    pub calls_unresolved: usize,
    pub rank_iterations: usize,
    pub elapsed_ms: u64,
    pub cancelled: bool,
}

/// Incremental changeset, repo-relative paths.
#[derive(Debug, Clone, Default)]
pub struct Changeset {
    pub added: Vec<String>,
    pub modified: Vec<String>,
    pub deleted: Vec<String>,
    pub renamed: Vec<(String, String)>,
}

struct ExtractedFile {
    relative_path: String,
    language: Language,
    hash: String,
    size: i64,
    source: String,
    extraction: FileExtraction,
    parse_ms: u64,
}

enum WorkerOutcome {
    Unchanged(String),
    Extracted(Box<ExtractedFile>),
    Skipped(ParseDiagnostic),
}

pub struct IndexPipeline {
    config: Config,
}

impl IndexPipeline {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Process every enumerated file under the configured root.
    pub fn full_index(
        &self,
        store: &mut GraphStore,
        progress: Option<&ProgressHandle>,
        cancel: Option<&CancelToken>,
    ) -> Result<IndexStats> {
        self.check_runtime_profile()?;
        let scanner = Scanner::from_config(&self.config)?;
        let scanned = scanner.enumerate()?;

        // Files that vanished from disk since the last run.
        let stored = store.file_hashes()?;
        let on_disk: HashSet<&str> = scanned.iter().map(|f| f.relative_path.as_str()).collect();
        let deleted: Vec<String> = stored
            .keys()
            .filter(|path| !on_disk.contains(path.as_str()))
            .cloned()
            .collect();

        self.run(store, scanned, deleted, Vec::new(), progress, cancel)
    }

    /// Process a supplied changeset of added/modified/deleted/renamed files.
    pub fn incremental_index(
        &self,
        store: &mut GraphStore,
        changeset: &Changeset,
        progress: Option<&ProgressHandle>,
        cancel: Option<&CancelToken>,
    ) -> Result<IndexStats> {
        self.check_runtime_profile()?;
        let root = self.config.repo_root.clone();
        let mut worklist = Vec::new();
        for path in changeset.added.iter().chain(changeset.modified.iter()) {
            let Some(language) = Language::from_path(std::path::Path::new(path)) else {
                continue;
            };
            worklist.push(crate::scanner::ScannedFile {
                path: root.join(path),
                relative_path: path.clone(),
                language,
            });
        }
        self.run(
            store,
            worklist,
            changeset.deleted.clone(),
            changeset.renamed.clone(),
            progress,
            cancel,
        )
    }

    /// Strict profile refuses to start without every required grammar.
    fn check_runtime_profile(&self) -> Result<()> {
        if self.config.runtime_profile != RuntimeProfile::Strict {
            return Ok(());
        }
        for language in Language::all() {
            if !extractor::grammar_available(*language) {
                return Err(BombeError::Config(format!(
                    "strict profile: parser grammar for {language} is unavailable"
                )));
            }
        }
        Ok(())
    }

    fn run(
        &self,
        store: &mut GraphStore,
        worklist: Vec<crate::scanner::ScannedFile>,
        deleted: Vec<String>,
        renamed: Vec<(String, String)>,
        progress: Option<&ProgressHandle>,
        cancel: Option<&CancelToken>,
    ) -> Result<IndexStats> {
        let started = Instant::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        let mut stats = IndexStats {
            run_id: run_id.clone(),
            files_seen: worklist.len(),
            ..Default::default()
        };
        if let Some(progress) = progress {
            progress.set_files_seen(worklist.len());
        }
        let hints = self.config.load_semantic_hints()?;
        let ts_aliases = resolve::load_ts_aliases(&self.config.repo_root);

        // Renames first: ids survive, path-derived qualified names do not.
        for (old_path, new_path) in &renamed {
            store.rename_file(old_path, new_path)?;
            self.recompute_qualified_prefix(store, old_path, new_path)?;
        }

        // Stage 2: parallel extraction on a bounded pool. Workers do the file
        // read, the hash compare and the parse; nothing touches the store.
        let stored_hashes = store.file_hashes()?;
        let outcomes = self.extract_parallel(&worklist, &stored_hashes)?;

        // Stage 3: deterministic merge, ascending path order.
        let mut merged: BTreeMap<String, (Language, Vec<i64>, FileExtraction)> = BTreeMap::new();
        let mut ordered: Vec<ExtractedFile> = Vec::new();
        for outcome in outcomes {
            match outcome {
                WorkerOutcome::Unchanged(_) => stats.files_unchanged += 1,
                WorkerOutcome::Skipped(diagnostic) => {
                    warn!("{}: {}", diagnostic.file, diagnostic.message);
                    store.record_diagnostic(&run_id, &diagnostic)?;
                    stats.files_skipped += 1;
                }
                WorkerOutcome::Extracted(extracted) => ordered.push(*extracted),
            }
        }
        ordered.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

        // Dependents are captured from the files that actually changed,
        // before their edges disappear under delete/replace.
        let changed_paths: Vec<String> = ordered
            .iter()
            .map(|f| f.relative_path.clone())
            .chain(deleted.iter().cloned())
            .chain(renamed.iter().map(|(_, new_path)| new_path.clone()))
            .collect();
        let dependents: Vec<String> = store
            .files_with_edges_into(&changed_paths)?
            .into_iter()
            .filter(|path| !changed_paths.contains(path) && !deleted.contains(path))
            .collect();

        for path in &deleted {
            store.delete_file_graph(path)?;
            stats.files_deleted += 1;
        }

        for extracted in ordered {
            if cancel.is_some_and(|token| token.is_cancelled()) {
                stats.cancelled = true;
                stats.elapsed_ms = started.elapsed().as_millis() as u64;
                info!("index run {run_id} cancelled after {} files", stats.files_indexed);
                return Ok(stats);
            }

            for diagnostic in &extracted.extraction.diagnostics {
                store.record_diagnostic(&run_id, diagnostic)?;
            }

            let ids = store.replace_file_symbols(
                &FileUpsert {
                    path: &extracted.relative_path,
                    language: extracted.language,
                    hash: &extracted.hash,
                    size: extracted.size,
                    content: Some(&extracted.source),
                },
                &extracted.extraction.symbols,
            )?;
            debug!(
                "merged {} ({} symbols, {}ms parse)",
                extracted.relative_path,
                ids.len(),
                extracted.parse_ms
            );
            stats.symbols_indexed += ids.len();
            stats.files_indexed += 1;
            if let Some(progress) = progress {
                progress.file_indexed();
            }
            merged.insert(
                extracted.relative_path.clone(),
                (extracted.language, ids, extracted.extraction),
            );
        }

        // Dependent files keep their symbols; only their edges re-resolve.
        for path in &dependents {
            let Some(file) = store.file_by_path(path)? else {
                continue;
            };
            let Some(content) = store.file_content(path)? else {
                continue;
            };
            let extraction = extractor::extract(content.as_bytes(), file.language, path);
            let ids = store.map_file_symbol_ids(path, &extraction.symbols)?;
            let ids: Vec<i64> = ids.into_iter().map(|id| id.unwrap_or(-1)).collect();
            merged.insert(path.clone(), (file.language, ids, extraction));
        }

        // Stage 4: edge resolution over the full symbol table.
        if !merged.is_empty() {
            let index = ResolutionIndex::build(store)?;
            for (path, (language, ids, extraction)) in &merged {
                let Some(file_id) = index.file_id(path) else {
                    continue;
                };
                let resolution = resolve::resolve_file(
                    &index,
                    path,
                    file_id,
                    *language,
                    ids,
                    extraction,
                    &hints,
                    &ts_aliases,
                );
                stats.edges_resolved += resolution.edges.len();
                stats.calls_ambiguous += resolution.ambiguous_calls;
                stats.calls_unresolved += resolution.unresolved_calls;
                store.replace_file_edges(path, &resolution.edges)?;
                store.replace_external_deps(path, &resolution.external_deps)?;
            }
        }

        // Stage 5: rank refresh, written only when values move.
        let nodes = store.all_symbol_ids()?;
        let edges = store.rank_edges()?;
        let outcome = rank::compute_pagerank(&nodes, &edges);
        stats.rank_iterations = outcome.iterations;
        store.write_pageranks(&outcome.ranks)?;

        // Stage 6: epoch bump, final step of a mutating run.
        let mutated = stats.files_indexed > 0
            || stats.files_deleted > 0
            || !renamed.is_empty()
            || !dependents.is_empty();
        if mutated {
            store.bump_epoch()?;
        }

        stats.elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            "index run {run_id}: {} indexed, {} unchanged, {} skipped, {} deleted, {} symbols, {} edges in {}ms",
            stats.files_indexed,
            stats.files_unchanged,
            stats.files_skipped,
            stats.files_deleted,
            stats.symbols_indexed,
            stats.edges_resolved,
            stats.elapsed_ms
        );
        Ok(stats)
    }

    fn extract_parallel(
        &self,
        worklist: &[crate::scanner::ScannedFile],
        stored_hashes: &HashMap<String, String>,
    ) -> Result<Vec<WorkerOutcome>> {
        let max_file_bytes = self.config.max_file_bytes;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.effective_workers())
            .build()
            .map_err(|e| BombeError::Config(format!("worker pool: {e}")))?;

        let outcomes: Vec<WorkerOutcome> = pool.install(|| {
            worklist
                .par_iter()
                .map(|file| {
                    let bytes = match std::fs::read(&file.path) {
                        Ok(bytes) => bytes,
                        Err(e) => {
                            return WorkerOutcome::Skipped(ParseDiagnostic {
                                stage: "scan".to_string(),
                                category: "io".to_string(),
                                severity: DiagnosticSeverity::Error,
                                file: file.relative_path.clone(),
                                message: format!("read failed: {e}"),
                                hint: None,
                            });
                        }
                    };
                    if bytes.len() as u64 > max_file_bytes {
                        return WorkerOutcome::Skipped(ParseDiagnostic {
                            stage: "scan".to_string(),
                            category: "resource".to_string(),
                            severity: DiagnosticSeverity::Warning,
                            file: file.relative_path.clone(),
                            message: format!(
                                "file is {} bytes, over the {} byte cap",
                                bytes.len(),
                                max_file_bytes
                            ),
                            hint: Some("raise max_file_bytes to index it".to_string()),
                        });
                    }

                    let hash = hash_bytes(&bytes);
                    if stored_hashes.get(&file.relative_path) == Some(&hash) {
                        return WorkerOutcome::Unchanged(file.relative_path.clone());
                    }

                    let parse_started = Instant::now();
                    let extraction =
                        extractor::extract(&bytes, file.language, &file.relative_path);
                    WorkerOutcome::Extracted(Box::new(ExtractedFile {
                        relative_path: file.relative_path.clone(),
                        language: file.language,
                        hash,
                        size: bytes.len() as i64,
                        source: String::from_utf8_lossy(&bytes).into_owned(),
                        extraction,
                        parse_ms: parse_started.elapsed().as_millis() as u64,
                    }))
                })
                .collect()
        });
        Ok(outcomes)
    }

    /// Path-derived qualified names must follow a rename; package-rooted
    /// languages (Java, Go) derive names from declarations instead and keep
    /// theirs.
    fn recompute_qualified_prefix(
        &self,
        store: &mut GraphStore,
        old_path: &str,
        new_path: &str,
    ) -> Result<()> {
        let Some(language) = Language::from_path(std::path::Path::new(new_path)) else {
            return Ok(());
        };
        let (old_prefix, new_prefix) = match language {
            Language::Python => (
                crate::extractor::python::module_path(old_path),
                crate::extractor::python::module_path(new_path),
            ),
            Language::TypeScript => (
                old_path
                    .trim_end_matches(".tsx")
                    .trim_end_matches(".ts")
                    .to_string(),
                new_path
                    .trim_end_matches(".tsx")
                    .trim_end_matches(".ts")
                    .to_string(),
            ),
            Language::Java | Language::Go => return Ok(()),
        };
        store.rewrite_qualified_names(new_path, &old_prefix, &new_prefix)
    }
}
