// Query engines
//
// Seven engines over the graph store sharing guardrails, a response-cache
// planner and the hybrid ranker. Each engine is a pure function of (store
// snapshot, request); multiple requests run concurrently and serialize only
// on the store's reader lock. Unknown symbols produce empty well-formed
// responses; only store and schema failures surface as errors.

pub mod blast;
pub mod cache;
pub mod context;
pub mod dataflow;
pub mod guardrails;
pub mod impact;
pub mod ranking;
pub mod redact;
pub mod references;
pub mod search;
pub mod structure;
pub mod tokens;
pub mod walk;

pub use blast::{BlastRadiusRequest, BlastRadiusResponse, ChangeType};
pub use context::{ContextRequest, ContextResponse};
pub use dataflow::{DataFlowRequest, DataFlowResponse};
pub use impact::{ChangeImpactRequest, ChangeImpactResponse};
pub use references::{Direction, ReferencesRequest, ReferencesResponse};
pub use search::{SearchRequest, SearchResponse};
pub use structure::{StructureRequest, StructureResponse};

use crate::error::{BombeError, Result};
use crate::store::{GraphStore, SymbolRow};
use cache::{CacheMode, ResponseCache};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tokens::{HeuristicTokenizer, Tokenizer};
use tracing::debug;

/// Timing, cache and clamp details, included when the caller opts in.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct PlannerTrace {
    pub cache_mode: String,
    pub cache_epoch: i64,
    pub lookup_ms: u64,
    pub compute_ms: u64,
    pub clamped: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SymbolSummary {
    pub id: i64,
    pub name: String,
    pub qualified_name: String,
    pub kind: String,
    pub file_path: String,
    pub start_line: u32,
    pub end_line: u32,
    pub signature: String,
    pub visibility: String,
    pub pagerank: f64,
}

impl From<&SymbolRow> for SymbolSummary {
    fn from(row: &SymbolRow) -> Self {
        Self {
            id: row.id,
            name: row.name.clone(),
            qualified_name: row.qualified_name.clone(),
            kind: row.kind.as_str().to_string(),
            file_path: row.file_path.clone(),
            start_line: row.start_line,
            end_line: row.end_line,
            signature: row.signature.clone(),
            visibility: row.visibility.as_str().to_string(),
            pagerank: row.pagerank,
        }
    }
}

pub struct QueryEngine {
    store: Arc<Mutex<GraphStore>>,
    cache: ResponseCache,
    tokenizer: Arc<dyn Tokenizer>,
}

impl QueryEngine {
    pub fn new(store: Arc<Mutex<GraphStore>>) -> Self {
        Self {
            store,
            cache: ResponseCache::default(),
            tokenizer: Arc::new(HeuristicTokenizer),
        }
    }

    /// Swap in a model-aware tokenizer for exact budget packing.
    pub fn with_tokenizer(mut self, tokenizer: Arc<dyn Tokenizer>) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    pub(crate) fn store(&self) -> Result<MutexGuard<'_, GraphStore>> {
        self.store
            .lock()
            .map_err(|_| BombeError::Config("graph store lock poisoned".to_string()))
    }

    pub(crate) fn tokenizer(&self) -> &dyn Tokenizer {
        self.tokenizer.as_ref()
    }

    /// Cache planner shared by every engine: key on (tool, normalized
    /// payload, epoch), record the tool metric either way.
    pub(crate) fn cached<R, F>(&self, tool: &str, payload: &Value, compute: F) -> Result<(R, PlannerTrace)>
    where
        R: Serialize + serde::de::DeserializeOwned,
        F: FnOnce() -> Result<R>,
    {
        let lookup_started = Instant::now();
        let epoch = self.store()?.cache_epoch()?;
        let key = ResponseCache::key(tool, payload, epoch);
        let lookup_ms = lookup_started.elapsed().as_millis() as u64;

        if let Some(value) = self.cache.get(&key)
            && let Ok(response) = serde_json::from_value::<R>(value)
        {
            debug!("{tool}: cache hit at epoch {epoch}");
            let _ = self
                .store()?
                .record_tool_metric(tool, lookup_ms as i64, CacheMode::Hit.as_str());
            return Ok((
                response,
                PlannerTrace {
                    cache_mode: CacheMode::Hit.as_str().to_string(),
                    cache_epoch: epoch,
                    lookup_ms,
                    compute_ms: 0,
                    clamped: Vec::new(),
                },
            ));
        }

        let compute_started = Instant::now();
        let response = compute()?;
        let compute_ms = compute_started.elapsed().as_millis() as u64;
        if let Ok(value) = serde_json::to_value(&response) {
            self.cache.put(key, value);
        }
        let _ = self.store()?.record_tool_metric(
            tool,
            (lookup_ms + compute_ms) as i64,
            CacheMode::Miss.as_str(),
        );
        Ok((
            response,
            PlannerTrace {
                cache_mode: CacheMode::Miss.as_str().to_string(),
                cache_epoch: epoch,
                lookup_ms,
                compute_ms,
                clamped: Vec::new(),
            },
        ))
    }
}

/// Strip the opt-in presentation flags so they never split the cache.
pub(crate) fn normalize_payload(mut payload: Value) -> Value {
    if let Some(map) = payload.as_object_mut() {
        map.remove("include_trace");
        map.remove("explain");
    }
    payload
}

/// Resolve a symbol by name: exact qualified match wins, otherwise the
/// highest-ranked symbol with that short name.
pub(crate) fn resolve_symbol(store: &GraphStore, name: &str) -> Result<Option<SymbolRow>> {
    if let Some(row) = store.symbol_by_qualified_name(name)? {
        return Ok(Some(row));
    }
    Ok(store.symbols_named(name)?.into_iter().next())
}

/// Path heuristic for test files, used by risk bucketing.
pub(crate) fn is_test_path(path: &str) -> bool {
    let lower = path.to_lowercase();
    let file_name = lower.rsplit('/').next().unwrap_or(&lower);
    lower.split('/').any(|segment| {
        segment == "test" || segment == "tests" || segment == "spec" || segment == "__tests__"
    }) || file_name.starts_with("test_")
        || file_name.ends_with("_test.py")
        || file_name.ends_with("_test.go")
        || file_name.ends_with(".spec.ts")
        || file_name.ends_with(".test.ts")
        || file_name.ends_with(".spec.tsx")
        || file_name.ends_with(".test.tsx")
        || file_name.ends_with("test.java")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_heuristic() {
        assert!(is_test_path("tests/test_auth.py"));
        assert!(is_test_path("src/auth_test.go"));
        assert!(is_test_path("src/auth.spec.ts"));
        assert!(is_test_path("src/main/java/AuthTest.java"));
        assert!(!is_test_path("src/auth.py"));
        assert!(!is_test_path("src/contest.ts"));
    }

    #[test]
    fn normalize_strips_presentation_flags() {
        let payload = serde_json::json!({"query": "x", "include_trace": true, "explain": true});
        let normalized = normalize_payload(payload);
        assert_eq!(normalized, serde_json::json!({"query": "x"}));
    }
}
