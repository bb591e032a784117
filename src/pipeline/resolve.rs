// Edge resolution
//
// Runs after every symbol for the run exists in the store. Call sites go
// through a cascading lookup: same-file, receiver-class scoped, alias and
// import scoped, qualified-name suffix, then global name match. The first
// tier that yields candidates wins; ties break by descending PageRank then
// ascending symbol id. Unresolvable sites produce no edge but are counted.
// Import declarations resolve against the file table per language; misses
// become external dependency rows.

use crate::extractor::{FileExtraction, ImportRecord, Relationship, SymbolKind};
use crate::scanner::Language;
use crate::store::{EndpointKind, GraphStore, NewEdge, SymbolRow};
use crate::error::Result;
use std::collections::HashMap;

/// Confidence per resolution tier.
const CONFIDENCE_SAME_FILE: f64 = 1.0;
const CONFIDENCE_RECEIVER: f64 = 1.0;
const CONFIDENCE_IMPORT: f64 = 0.95;
const CONFIDENCE_SUFFIX: f64 = 0.85;
const CONFIDENCE_GLOBAL: f64 = 0.5;

#[derive(Debug, Clone)]
pub struct SymbolLite {
    pub id: i64,
    pub name: String,
    pub qualified_name: String,
    pub file_path: String,
    pub kind: SymbolKind,
    pub parent_id: Option<i64>,
    pub pagerank: f64,
}

impl From<&SymbolRow> for SymbolLite {
    fn from(row: &SymbolRow) -> Self {
        Self {
            id: row.id,
            name: row.name.clone(),
            qualified_name: row.qualified_name.clone(),
            file_path: row.file_path.clone(),
            kind: row.kind,
            parent_id: row.parent_id,
            pagerank: row.pagerank,
        }
    }
}

/// Snapshot of the whole symbol table, indexed for cascade lookups.
pub struct ResolutionIndex {
    symbols: Vec<SymbolLite>,
    by_name: HashMap<String, Vec<usize>>,
    by_file: HashMap<String, Vec<usize>>,
    /// Class short name -> member symbol indexes (via parent links).
    members_by_class: HashMap<String, Vec<usize>>,
    file_ids: HashMap<String, i64>,
}

impl ResolutionIndex {
    pub fn build(store: &GraphStore) -> Result<Self> {
        let mut symbols = Vec::new();
        for file in store.all_files()? {
            for row in store.symbols_for_file(&file.path)? {
                symbols.push(SymbolLite::from(&row));
            }
        }

        let mut by_name: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_file: HashMap<String, Vec<usize>> = HashMap::new();
        let by_id: HashMap<i64, usize> = symbols
            .iter()
            .enumerate()
            .map(|(index, s)| (s.id, index))
            .collect();
        for (index, symbol) in symbols.iter().enumerate() {
            by_name
                .entry(symbol.name.clone())
                .or_default()
                .push(index);
            by_file
                .entry(symbol.file_path.clone())
                .or_default()
                .push(index);
        }

        let mut members_by_class: HashMap<String, Vec<usize>> = HashMap::new();
        for (index, symbol) in symbols.iter().enumerate() {
            if let Some(parent_id) = symbol.parent_id
                && let Some(&parent_index) = by_id.get(&parent_id)
            {
                members_by_class
                    .entry(symbols[parent_index].name.clone())
                    .or_default()
                    .push(index);
            }
        }

        let mut file_ids = HashMap::new();
        for file in store.all_files()? {
            file_ids.insert(file.path, file.id);
        }

        Ok(Self {
            symbols,
            by_name,
            by_file,
            members_by_class,
            file_ids,
        })
    }

    pub fn file_id(&self, path: &str) -> Option<i64> {
        self.file_ids.get(path).copied()
    }

    fn best_of(&self, mut candidates: Vec<usize>) -> Option<&SymbolLite> {
        if candidates.is_empty() {
            return None;
        }
        candidates.sort_by(|&a, &b| {
            self.symbols[b]
                .pagerank
                .partial_cmp(&self.symbols[a].pagerank)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(self.symbols[a].id.cmp(&self.symbols[b].id))
        });
        Some(&self.symbols[candidates[0]])
    }
}

#[derive(Debug, Default)]
pub struct FileResolution {
    pub edges: Vec<NewEdge>,
    pub external_deps: Vec<ImportRecord>,
    pub resolved_calls: usize,
    pub ambiguous_calls: usize,
    pub unresolved_calls: usize,
}

/// Per-file alias bindings from imports: local binding name ->
/// (module, optional imported name).
type AliasMap = HashMap<String, (String, Option<String>)>;

#[allow(clippy::too_many_arguments)]
pub fn resolve_file(
    index: &ResolutionIndex,
    file_path: &str,
    file_id: i64,
    language: Language,
    symbol_ids: &[i64],
    extraction: &FileExtraction,
    hints: &HashMap<(String, u32), Vec<String>>,
    ts_aliases: &[(String, String)],
) -> FileResolution {
    let mut out = FileResolution::default();
    let aliases = build_alias_map(&extraction.imports);

    // Each declared module resolves to in-repo files at most once; the map
    // also scopes the import tier of the call cascade.
    let mut module_files: HashMap<String, Vec<String>> = HashMap::new();
    for import in &extraction.imports {
        if !module_files.contains_key(&import.module) {
            let targets =
                resolve_import_target(index, language, file_path, &import.module, ts_aliases)
                    .unwrap_or_default();
            module_files.insert(import.module.clone(), targets);
        }
    }

    // DEFINES and HAS_METHOD come straight from the batch structure.
    for (batch_index, record) in extraction.symbols.iter().enumerate() {
        let Some(&symbol_id) = symbol_ids.get(batch_index) else {
            continue;
        };
        match record.parent_index {
            None => out.edges.push(NewEdge {
                source_id: file_id,
                source_kind: EndpointKind::File,
                target_id: symbol_id,
                target_kind: EndpointKind::Symbol,
                relationship: Relationship::Defines,
                line: record.start_line,
                confidence: 1.0,
            }),
            Some(parent_index) => {
                if let Some(&parent_id) = symbol_ids.get(parent_index) {
                    out.edges.push(NewEdge::symbol_to_symbol(
                        parent_id,
                        symbol_id,
                        Relationship::HasMethod,
                        record.start_line,
                        1.0,
                    ));
                }
            }
        }

        // Heritage: EXTENDS and IMPLEMENTS by type-name cascade.
        for (names, relationship) in [
            (&record.extends, Relationship::Extends),
            (&record.implements, Relationship::Implements),
        ] {
            for type_name in names {
                if let Some((target, confidence)) =
                    resolve_type_name(index, file_path, type_name, &aliases)
                {
                    out.edges.push(NewEdge::symbol_to_symbol(
                        symbol_id,
                        target,
                        relationship,
                        record.start_line,
                        confidence,
                    ));
                }
            }
        }
    }

    // CALLS via the cascade.
    for call in &extraction.call_sites {
        let Some(caller_index) = call.caller_index else {
            continue;
        };
        let Some(&caller_id) = symbol_ids.get(caller_index) else {
            continue;
        };

        // Hints from the optional semantic hints file override extractor hints.
        let hinted_types = hints.get(&(file_path.to_string(), call.line));
        let receiver = hinted_types
            .and_then(|types| types.first().cloned())
            .or_else(|| call.receiver_hint.clone());

        match resolve_callee(
            index,
            file_path,
            &call.callee_text,
            receiver.as_deref(),
            &aliases,
            &module_files,
        ) {
            Some((target, confidence)) => {
                out.resolved_calls += 1;
                if confidence < 1.0 {
                    out.ambiguous_calls += 1;
                }
                out.edges.push(NewEdge::symbol_to_symbol(
                    caller_id,
                    target,
                    Relationship::Calls,
                    call.line,
                    confidence,
                ));
            }
            None => out.unresolved_calls += 1,
        }
    }

    // Imports resolve against the file table.
    for import in &extraction.imports {
        match module_files.get(&import.module) {
            Some(targets) if !targets.is_empty() => {
                for target_path in targets {
                    if let Some(target_file_id) = index.file_id(target_path) {
                        out.edges.push(NewEdge {
                            source_id: file_id,
                            source_kind: EndpointKind::File,
                            target_id: target_file_id,
                            target_kind: EndpointKind::File,
                            relationship: Relationship::Imports,
                            line: import.line,
                            confidence: 1.0,
                        });
                    }
                }
                if let Some(name) = import
                    .imported_name
                    .as_deref()
                    .filter(|n| *n != "*" && *n != "default")
                {
                    let candidates: Vec<usize> = targets
                        .iter()
                        .filter_map(|path| index.by_file.get(path.as_str()))
                        .flatten()
                        .copied()
                        .filter(|&i| index.symbols[i].name == name)
                        .collect();
                    if let Some(symbol) = index.best_of(candidates) {
                        out.edges.push(NewEdge {
                            source_id: file_id,
                            source_kind: EndpointKind::File,
                            target_id: symbol.id,
                            target_kind: EndpointKind::Symbol,
                            relationship: Relationship::ImportsSymbol,
                            line: import.line,
                            confidence: 1.0,
                        });
                    }
                }
            }
            _ => out.external_deps.push(import.clone()),
        }
    }

    out
}

/// The call-site cascade. Tiers run in order; the first tier with any
/// candidate wins.
fn resolve_callee(
    index: &ResolutionIndex,
    file_path: &str,
    callee_text: &str,
    receiver_hint: Option<&str>,
    aliases: &AliasMap,
    module_files: &HashMap<String, Vec<String>>,
) -> Option<(i64, f64)> {
    let name = callee_text.rsplit('.').next().unwrap_or(callee_text);
    if name.is_empty() {
        return None;
    }
    let callable = |i: &usize| {
        matches!(
            index.symbols[*i].kind,
            SymbolKind::Function | SymbolKind::Method | SymbolKind::Class
        )
    };

    // (a) same-file symbols
    if let Some(file_symbols) = index.by_file.get(file_path) {
        let candidates: Vec<usize> = file_symbols
            .iter()
            .filter(|&&i| index.symbols[i].name == name)
            .filter(|i| callable(*i))
            .copied()
            .collect();
        if let Some(symbol) = index.best_of(candidates) {
            return Some((symbol.id, CONFIDENCE_SAME_FILE));
        }
    }

    // (b) class-scoped candidates from a receiver-type hint
    if let Some(class_name) = receiver_hint
        && let Some(members) = index.members_by_class.get(class_name)
    {
        let candidates: Vec<usize> = members
            .iter()
            .filter(|&&i| index.symbols[i].name == name)
            .copied()
            .collect();
        if let Some(symbol) = index.best_of(candidates) {
            return Some((symbol.id, CONFIDENCE_RECEIVER));
        }
    }

    // (c) alias / import-scoped candidates
    if let Some((target, confidence)) =
        resolve_via_imports(index, callee_text, name, aliases, module_files)
    {
        return Some((target, confidence));
    }

    // (d) qualified-name suffix match
    let dotted = callee_text.replace("::", ".");
    if dotted.contains('.') && !dotted.starts_with("self.") && !dotted.starts_with("this.") {
        let suffix = format!(".{dotted}");
        let candidates: Vec<usize> = index
            .by_name
            .get(name)
            .map(|ids| {
                ids.iter()
                    .filter(|&&i| {
                        let qualified = &index.symbols[i].qualified_name;
                        qualified.ends_with(&suffix) || qualified == &dotted
                    })
                    .copied()
                    .collect()
            })
            .unwrap_or_default();
        if let Some(symbol) = index.best_of(candidates) {
            return Some((symbol.id, CONFIDENCE_SUFFIX));
        }
    }

    // (e) global name match, ambiguous
    let candidates: Vec<usize> = index
        .by_name
        .get(name)
        .map(|ids| ids.iter().filter(|i| callable(*i)).copied().collect())
        .unwrap_or_default();
    index
        .best_of(candidates)
        .map(|symbol| (symbol.id, CONFIDENCE_GLOBAL))
}

fn resolve_via_imports(
    index: &ResolutionIndex,
    callee_text: &str,
    name: &str,
    aliases: &AliasMap,
    module_files: &HashMap<String, Vec<String>>,
) -> Option<(i64, f64)> {
    let scoped = |module: &str, symbol_name: &str| -> Option<(i64, f64)> {
        let files = module_files.get(module)?;
        if files.is_empty() {
            return None;
        }
        let candidates: Vec<usize> = index
            .by_name
            .get(symbol_name)
            .map(|ids| {
                ids.iter()
                    .filter(|&&i| files.contains(&index.symbols[i].file_path))
                    .copied()
                    .collect()
            })
            .unwrap_or_default();
        index
            .best_of(candidates)
            .map(|symbol| (symbol.id, CONFIDENCE_IMPORT))
    };

    // Direct binding: `from a import b` then `b()`.
    if let Some((module, Some(imported))) = aliases.get(callee_text)
        && let Some(found) = scoped(module, imported)
    {
        return Some(found);
    }

    // Prefix binding: `import pkg` / `import * as ns` then `ns.f()`.
    let first = callee_text.split('.').next()?;
    if first == callee_text {
        return None;
    }
    if let Some((module, _)) = aliases.get(first)
        && let Some(found) = scoped(module, name)
    {
        return Some(found);
    }
    None
}

fn resolve_type_name(
    index: &ResolutionIndex,
    file_path: &str,
    type_name: &str,
    aliases: &AliasMap,
) -> Option<(i64, f64)> {
    let name = type_name.rsplit('.').next().unwrap_or(type_name);
    let type_like = |i: &usize| {
        matches!(
            index.symbols[*i].kind,
            SymbolKind::Class | SymbolKind::Interface
        )
    };

    if let Some(file_symbols) = index.by_file.get(file_path) {
        let candidates: Vec<usize> = file_symbols
            .iter()
            .filter(|&&i| index.symbols[i].name == name)
            .filter(|i| type_like(*i))
            .copied()
            .collect();
        if let Some(symbol) = index.best_of(candidates) {
            return Some((symbol.id, CONFIDENCE_SAME_FILE));
        }
    }

    if aliases.contains_key(name) || aliases.contains_key(type_name) {
        let candidates: Vec<usize> = index
            .by_name
            .get(name)
            .map(|ids| ids.iter().filter(|i| type_like(*i)).copied().collect())
            .unwrap_or_default();
        if let Some(symbol) = index.best_of(candidates) {
            return Some((symbol.id, CONFIDENCE_IMPORT));
        }
    }

    let candidates: Vec<usize> = index
        .by_name
        .get(name)
        .map(|ids| ids.iter().filter(|i| type_like(*i)).copied().collect())
        .unwrap_or_default();
    index
        .best_of(candidates)
        .map(|symbol| (symbol.id, CONFIDENCE_GLOBAL))
}

fn build_alias_map(imports: &[ImportRecord]) -> AliasMap {
    let mut aliases = AliasMap::new();
    for import in imports {
        let binding = import
            .alias
            .clone()
            .or_else(|| {
                import
                    .imported_name
                    .clone()
                    .filter(|n| n != "*" && n != "default")
            })
            .unwrap_or_else(|| {
                import
                    .module
                    .rsplit(['.', '/'])
                    .next()
                    .unwrap_or(&import.module)
                    .to_string()
            });
        aliases.insert(
            binding,
            (import.module.clone(), import.imported_name.clone()),
        );
        // `import os.path` also binds the full dotted form.
        if import.alias.is_none() && import.imported_name.is_none() {
            aliases.insert(import.module.clone(), (import.module.clone(), None));
        }
    }
    aliases
}

// ============================================================
// IMPORT TARGET RESOLUTION (per language)
// ============================================================

/// Resolve an import's declared module to in-repo file paths. None or empty
/// means external.
pub fn resolve_import_target(
    index: &ResolutionIndex,
    language: Language,
    importing_file: &str,
    module: &str,
    ts_aliases: &[(String, String)],
) -> Option<Vec<String>> {
    match language {
        Language::Python => resolve_python_import(index, importing_file, module),
        Language::TypeScript => resolve_typescript_import(index, importing_file, module, ts_aliases),
        Language::Java => resolve_java_import(index, module),
        Language::Go => resolve_go_import(index, module),
    }
}

fn resolve_python_import(
    index: &ResolutionIndex,
    importing_file: &str,
    module: &str,
) -> Option<Vec<String>> {
    let dots = module.chars().take_while(|&c| c == '.').count();
    let rest = &module[dots..];
    let rest_path = rest.replace('.', "/");

    let mut candidates = Vec::new();
    if dots > 0 {
        // relative import: one directory up per dot beyond the first
        let mut dir = parent_dir(importing_file);
        for _ in 1..dots {
            dir = parent_dir(&dir);
        }
        let base = join_path(&dir, &rest_path);
        candidates.push(format!("{base}.py"));
        candidates.push(format!("{base}/__init__.py"));
    } else {
        candidates.push(format!("{rest_path}.py"));
        candidates.push(format!("{rest_path}/__init__.py"));
    }

    for candidate in &candidates {
        if index.file_ids.contains_key(candidate) {
            return Some(vec![candidate.clone()]);
        }
    }

    // Fall back to a unique suffix match for source roots below the repo root.
    if dots == 0 {
        let suffixes = [format!("/{rest_path}.py"), format!("/{rest_path}/__init__.py")];
        let mut matches: Vec<String> = index
            .file_ids
            .keys()
            .filter(|path| suffixes.iter().any(|suffix| path.ends_with(suffix)))
            .cloned()
            .collect();
        matches.sort();
        if matches.len() == 1 {
            return Some(matches);
        }
    }
    None
}

fn resolve_typescript_import(
    index: &ResolutionIndex,
    importing_file: &str,
    module: &str,
    ts_aliases: &[(String, String)],
) -> Option<Vec<String>> {
    let try_with_extensions = |base: &str| -> Option<Vec<String>> {
        for suffix in [".ts", ".tsx", "/index.ts", "/index.tsx"] {
            let candidate = format!("{base}{suffix}");
            if index.file_ids.contains_key(&candidate) {
                return Some(vec![candidate]);
            }
        }
        // exact path given with extension
        if index.file_ids.contains_key(base) {
            return Some(vec![base.to_string()]);
        }
        None
    };

    // Relative specifiers bind tightest.
    if module.starts_with("./") || module.starts_with("../") {
        let base = normalize_relative(&parent_dir(importing_file), module);
        return try_with_extensions(&base);
    }

    // tsconfig `paths` aliases: relative > alias > bare.
    for (pattern, replacement) in ts_aliases {
        if let Some(rest) = module.strip_prefix(pattern.as_str()) {
            let base = format!("{}{}", replacement, rest);
            if let Some(found) = try_with_extensions(base.trim_end_matches('/')) {
                return Some(found);
            }
        }
    }

    // Bare specifiers are packages, hence external.
    None
}

fn resolve_java_import(index: &ResolutionIndex, module: &str) -> Option<Vec<String>> {
    // `module` here is the package; the class lands in imported_name, so the
    // interesting suffix is the package directory.
    let package_dir = module.replace('.', "/");
    let mut matches: Vec<String> = index
        .file_ids
        .keys()
        .filter(|path| {
            path.ends_with(".java")
                && parent_dir(path)
                    .trim_end_matches('/')
                    .ends_with(&package_dir)
        })
        .cloned()
        .collect();
    matches.sort();
    if matches.is_empty() { None } else { Some(matches) }
}

fn resolve_go_import(index: &ResolutionIndex, module: &str) -> Option<Vec<String>> {
    // Match the import path's trailing segments against stored directories.
    let segments: Vec<&str> = module.split('/').collect();
    for take in (1..=segments.len().min(3)).rev() {
        let suffix = segments[segments.len() - take..].join("/");
        let mut matches: Vec<String> = index
            .file_ids
            .keys()
            .filter(|path| {
                path.ends_with(".go") && {
                    let dir = parent_dir(path);
                    dir == suffix || dir.ends_with(&format!("/{suffix}"))
                }
            })
            .cloned()
            .collect();
        matches.sort();
        if !matches.is_empty() {
            return Some(matches);
        }
    }
    None
}

fn parent_dir(path: &str) -> String {
    match path.rsplit_once('/') {
        Some((dir, _)) => dir.to_string(),
        None => String::new(),
    }
}

fn join_path(dir: &str, rest: &str) -> String {
    if dir.is_empty() {
        rest.to_string()
    } else {
        format!("{dir}/{rest}")
    }
}

fn normalize_relative(base_dir: &str, module: &str) -> String {
    let mut parts: Vec<&str> = if base_dir.is_empty() {
        Vec::new()
    } else {
        base_dir.split('/').collect()
    };
    for segment in module.split('/') {
        match segment {
            "." | "" => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

/// Read `paths` prefix mappings from a tsconfig.json at the repo root, if one
/// exists. Only `prefix/*` -> `replacement/*` patterns are honored.
pub fn load_ts_aliases(repo_root: &std::path::Path) -> Vec<(String, String)> {
    let path = repo_root.join("tsconfig.json");
    let Ok(raw) = std::fs::read_to_string(&path) else {
        return Vec::new();
    };
    let Ok(parsed) = serde_json::from_str::<serde_json::Value>(&raw) else {
        return Vec::new();
    };
    let mut aliases = Vec::new();
    if let Some(paths) = parsed
        .pointer("/compilerOptions/paths")
        .and_then(|v| v.as_object())
    {
        for (pattern, targets) in paths {
            let Some(target) = targets.as_array().and_then(|a| a.first()).and_then(|t| t.as_str())
            else {
                continue;
            };
            let prefix = pattern.trim_end_matches('*').to_string();
            let replacement = target.trim_end_matches('*').to_string();
            if !prefix.is_empty() {
                aliases.push((prefix, replacement));
            }
        }
    }
    aliases.sort();
    aliases
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::SymbolRecord;
    use crate::store::FileUpsert;

    fn seed_store() -> (GraphStore, Vec<i64>, Vec<i64>) {
        let mut store = GraphStore::open_in_memory().unwrap();
        let a_ids = store
            .replace_file_symbols(
                &FileUpsert {
                    path: "a.py",
                    language: Language::Python,
                    hash: "ha",
                    size: 1,
                    content: None,
                },
                &[SymbolRecord::new("f", "a.f", SymbolKind::Function, 1, 3)],
            )
            .unwrap();
        let b_ids = store
            .replace_file_symbols(
                &FileUpsert {
                    path: "b.py",
                    language: Language::Python,
                    hash: "hb",
                    size: 1,
                    content: None,
                },
                &[SymbolRecord::new("g", "b.g", SymbolKind::Function, 1, 3)],
            )
            .unwrap();
        (store, a_ids, b_ids)
    }

    #[test]
    fn same_file_tier_wins_over_global() {
        let (mut store, _, _) = seed_store();
        // add a second `g` in a.py so both tiers have candidates
        store
            .replace_file_symbols(
                &FileUpsert {
                    path: "a.py",
                    language: Language::Python,
                    hash: "ha2",
                    size: 1,
                    content: None,
                },
                &[
                    SymbolRecord::new("f", "a.f", SymbolKind::Function, 1, 3),
                    SymbolRecord::new("g", "a.g", SymbolKind::Function, 5, 7),
                ],
            )
            .unwrap();
        let index = ResolutionIndex::build(&store).unwrap();
        let (target, confidence) = resolve_callee(
            &index,
            "a.py",
            "g",
            None,
            &AliasMap::new(),
            &HashMap::new(),
        )
        .unwrap();
        let resolved = store.symbol_by_id(target).unwrap().unwrap();
        assert_eq!(resolved.qualified_name, "a.g");
        assert_eq!(confidence, CONFIDENCE_SAME_FILE);
    }

    #[test]
    fn global_tier_is_marked_ambiguous() {
        let (store, _, b_ids) = seed_store();
        let index = ResolutionIndex::build(&store).unwrap();
        let (target, confidence) = resolve_callee(
            &index,
            "a.py",
            "g",
            None,
            &AliasMap::new(),
            &HashMap::new(),
        )
        .unwrap();
        assert_eq!(target, b_ids[0]);
        assert!(confidence < 1.0);
    }

    #[test]
    fn import_scoped_tier() {
        let (store, _, b_ids) = seed_store();
        let index = ResolutionIndex::build(&store).unwrap();
        let imports = vec![ImportRecord {
            raw_text: "from b import g".into(),
            module: "b".into(),
            imported_name: Some("g".into()),
            alias: None,
            line: 1,
        }];
        let aliases = build_alias_map(&imports);
        let module_files =
            HashMap::from([("b".to_string(), vec!["b.py".to_string()])]);
        let (target, confidence) =
            resolve_callee(&index, "a.py", "g", None, &aliases, &module_files).unwrap();
        assert_eq!(target, b_ids[0]);
        assert_eq!(confidence, CONFIDENCE_IMPORT);
    }

    #[test]
    fn python_import_targets() {
        let (store, _, _) = seed_store();
        let index = ResolutionIndex::build(&store).unwrap();
        assert_eq!(
            resolve_python_import(&index, "a.py", "b"),
            Some(vec!["b.py".to_string()])
        );
        assert_eq!(resolve_python_import(&index, "a.py", "requests"), None);
    }

    #[test]
    fn relative_path_normalization() {
        assert_eq!(normalize_relative("src/app", "./util"), "src/app/util");
        assert_eq!(normalize_relative("src/app", "../lib/x"), "src/lib/x");
        assert_eq!(normalize_relative("", "./x"), "x");
    }
}
