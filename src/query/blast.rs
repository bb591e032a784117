// get_blast_radius
//
// Reverse-edge BFS over CALLS, IMPLEMENTS and EXTENDS: everything that could
// break if this symbol's contract changes. The risk bucket weighs direct and
// transitive counts plus whether test files depend on the symbol.

use super::guardrails::{Clamps, MAX_BLAST_DEPTH, MAX_GRAPH_VISITED};
use super::walk::{self, WalkDirection, WalkOptions};
use super::{QueryEngine, PlannerTrace, SymbolSummary, is_test_path, normalize_payload, resolve_symbol};
use crate::error::Result;
use crate::extractor::Relationship;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Signature,
    Behavior,
    Delete,
}

fn default_depth() -> u32 {
    3
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlastRadiusRequest {
    pub symbol: String,
    pub change_type: ChangeType,
    #[serde(default = "default_depth")]
    pub max_depth: u32,
    #[serde(default)]
    pub deadline_ms: Option<u64>,
    #[serde(default)]
    pub include_trace: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AffectedSymbol {
    #[serde(flatten)]
    pub symbol: SymbolSummary,
    pub depth: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlastRadiusResponse {
    pub target: Option<SymbolSummary>,
    pub direct: Vec<AffectedSymbol>,
    pub transitive: Vec<AffectedSymbol>,
    pub risk: String,
    pub test_dependents: usize,
    pub truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub planner_trace: Option<PlannerTrace>,
}

pub(crate) const BLAST_RELATIONSHIPS: [Relationship; 3] = [
    Relationship::Calls,
    Relationship::Implements,
    Relationship::Extends,
];

impl QueryEngine {
    pub fn get_blast_radius(&self, request: &BlastRadiusRequest) -> Result<BlastRadiusResponse> {
        let mut clamps = Clamps::default();
        let depth = clamps.depth("max_depth", request.max_depth, MAX_BLAST_DEPTH);

        let payload = normalize_payload(serde_json::json!({
            "symbol": request.symbol,
            "change_type": request.change_type,
            "max_depth": depth,
        }));

        let (mut response, mut trace) = self.cached("get_blast_radius", &payload, || {
            self.compute_blast(request, depth)
        })?;
        trace.clamped = clamps.applied;
        if request.include_trace {
            response.planner_trace = Some(trace);
        }
        Ok(response)
    }

    fn compute_blast(
        &self,
        request: &BlastRadiusRequest,
        depth: u32,
    ) -> Result<BlastRadiusResponse> {
        let store = self.store()?;
        let Some(target) = resolve_symbol(&store, &request.symbol)? else {
            return Ok(BlastRadiusResponse {
                target: None,
                direct: Vec::new(),
                transitive: Vec::new(),
                risk: "none".to_string(),
                test_dependents: 0,
                truncated: false,
                planner_trace: None,
            });
        };

        let walk = walk::bfs(
            &store,
            &[target.id],
            &BLAST_RELATIONSHIPS,
            WalkDirection::Reverse,
            &WalkOptions {
                max_depth: depth,
                max_visited: MAX_GRAPH_VISITED,
                deadline: request
                    .deadline_ms
                    .map(|ms| std::time::Instant::now() + std::time::Duration::from_millis(ms)),
            },
        )?;

        let ids: Vec<i64> = walk
            .visits
            .iter()
            .filter(|visit| visit.depth > 0)
            .map(|visit| visit.symbol_id)
            .collect();
        let rows = store.symbols_by_ids(&ids)?;
        let by_id: HashMap<i64, _> = rows.iter().map(|row| (row.id, row)).collect();
        drop(store);

        let mut direct = Vec::new();
        let mut transitive = Vec::new();
        let mut test_dependents = 0;
        for visit in walk.visits.iter().filter(|visit| visit.depth > 0) {
            let Some(row) = by_id.get(&visit.symbol_id) else {
                continue;
            };
            if is_test_path(&row.file_path) {
                test_dependents += 1;
            }
            let affected = AffectedSymbol {
                symbol: SymbolSummary::from(*row),
                depth: visit.depth,
            };
            if visit.depth == 1 {
                direct.push(affected);
            } else {
                transitive.push(affected);
            }
        }

        let risk = risk_bucket(
            request.change_type,
            direct.len(),
            transitive.len(),
            test_dependents,
        );

        Ok(BlastRadiusResponse {
            target: Some(SymbolSummary::from(&target)),
            direct,
            transitive,
            risk,
            test_dependents,
            truncated: walk.truncated,
            planner_trace: None,
        })
    }
}

fn risk_bucket(
    change_type: ChangeType,
    direct: usize,
    transitive: usize,
    test_dependents: usize,
) -> String {
    if direct == 0 && transitive == 0 {
        return "none".to_string();
    }
    let mut score = direct * 3 + transitive;
    if change_type == ChangeType::Delete {
        score *= 2;
    }
    let mut bucket = match score {
        0..=5 => 0,
        6..=20 => 1,
        _ => 2,
    };
    // test coverage is a safety net, but dependents in tests still mean churn
    if test_dependents > 0 && bucket < 2 {
        bucket += 1;
    }
    ["low", "medium", "high"][bucket].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_scales_with_counts_and_change_type() {
        assert_eq!(risk_bucket(ChangeType::Behavior, 0, 0, 0), "none");
        assert_eq!(risk_bucket(ChangeType::Behavior, 1, 1, 0), "low");
        assert_eq!(risk_bucket(ChangeType::Behavior, 4, 5, 0), "medium");
        assert_eq!(risk_bucket(ChangeType::Delete, 4, 5, 0), "high");
        assert_eq!(risk_bucket(ChangeType::Behavior, 1, 0, 2), "medium");
    }
}
