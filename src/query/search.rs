// search_symbols
//
// FTS first, LIKE fallback when FTS matches nothing, hybrid-ranked top N.

use super::guardrails::{Clamps, MAX_QUERY_LENGTH, MAX_SEARCH_LIMIT};
use super::{QueryEngine, PlannerTrace, SymbolSummary, normalize_payload, ranking};
use crate::error::Result;
use crate::extractor::SymbolKind;
use crate::store::SymbolRow;
use globset::Glob;
use serde::{Deserialize, Serialize};

fn default_limit() -> usize {
    20
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub kind: Option<SymbolKind>,
    #[serde(default)]
    pub file_glob: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub include_trace: bool,
    #[serde(default)]
    pub explain: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(flatten)]
    pub symbol: SymbolSummary,
    pub score: f64,
    pub inbound: i64,
    pub outbound: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub total: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub planner_trace: Option<PlannerTrace>,
}

impl QueryEngine {
    pub fn search_symbols(&self, request: &SearchRequest) -> Result<SearchResponse> {
        let mut clamps = Clamps::default();
        let query = clamps
            .text("query", &request.query, MAX_QUERY_LENGTH)
            .to_string();
        let limit = clamps.count("limit", request.limit, MAX_SEARCH_LIMIT);

        let payload = normalize_payload(serde_json::json!({
            "query": query,
            "kind": request.kind,
            "file_glob": request.file_glob,
            "limit": limit,
        }));

        let (mut response, mut trace) = self.cached("search_symbols", &payload, || {
            self.compute_search(&query, request, limit)
        })?;
        trace.clamped = clamps.applied;
        if request.include_trace {
            response.planner_trace = Some(trace);
        }
        Ok(response)
    }

    fn compute_search(
        &self,
        query: &str,
        request: &SearchRequest,
        limit: usize,
    ) -> Result<SearchResponse> {
        if limit == 0 || query.is_empty() {
            return Ok(SearchResponse {
                results: Vec::new(),
                total: 0,
                planner_trace: None,
            });
        }

        let glob = request
            .file_glob
            .as_deref()
            .and_then(|pattern| Glob::new(pattern).ok())
            .map(|glob| glob.compile_matcher());

        let store = self.store()?;

        // Over-fetch so kind/glob filtering still fills the page.
        let fetch = (limit * 4).max(limit);
        let mut candidates: Vec<SymbolRow> = store
            .fts_search(query, fetch)?
            .into_iter()
            .map(|(row, _)| row)
            .collect();
        if candidates.is_empty() {
            candidates = store.like_search(query, fetch)?;
        }

        candidates.retain(|row| {
            if let Some(kind) = request.kind
                && row.kind != kind
            {
                return false;
            }
            if let Some(matcher) = &glob
                && !matcher.is_match(&row.file_path)
            {
                return false;
            }
            true
        });

        let ids: Vec<i64> = candidates.iter().map(|row| row.id).collect();
        let degrees = store.symbol_degrees(&ids)?;
        drop(store);

        let max_rank = candidates
            .iter()
            .map(|row| row.pagerank)
            .fold(0.0_f64, f64::max);
        let max_degree = degrees
            .values()
            .map(|(inbound, outbound)| (inbound + outbound) as f64)
            .fold(0.0_f64, f64::max);

        let mut results: Vec<SearchResult> = candidates
            .iter()
            .map(|row| {
                let (inbound, outbound) = degrees.get(&row.id).copied().unwrap_or((0, 0));
                let lexical = ranking::lexical_score(query, &row.name, &row.qualified_name);
                let score = ranking::hybrid_score(
                    lexical,
                    ranking::normalize(row.pagerank, max_rank),
                    ranking::normalize((inbound + outbound) as f64, max_degree),
                );
                let explanation = request.explain.then(|| {
                    format!(
                        "lexical {:.2}, rank {:.4}, {} in / {} out",
                        lexical, row.pagerank, inbound, outbound
                    )
                });
                SearchResult {
                    symbol: SymbolSummary::from(row),
                    score,
                    inbound,
                    outbound,
                    explanation,
                }
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.symbol.id.cmp(&b.symbol.id))
        });
        results.truncate(limit);

        Ok(SearchResponse {
            total: results.len(),
            results,
            planner_trace: None,
        })
    }
}
