// change_impact
//
// The blast-radius walk plus explicit inclusion of EXTENDS/IMPLEMENTS
// dependents of any affected class or interface: changing a base contract
// reaches subtypes even when no call edge says so.

use super::blast::{BLAST_RELATIONSHIPS, ChangeType};
use super::guardrails::{Clamps, MAX_BLAST_DEPTH, MAX_GRAPH_VISITED};
use super::walk::{self, WalkDirection, WalkOptions};
use super::{QueryEngine, PlannerTrace, SymbolSummary, normalize_payload, resolve_symbol};
use crate::error::Result;
use crate::extractor::{Relationship, SymbolKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

fn default_depth() -> u32 {
    3
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeImpactRequest {
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
pub struct ImpactedSymbol {
    #[serde(flatten)]
    pub symbol: SymbolSummary,
    pub depth: u32,
    /// How the impact reaches this symbol: "call_graph" or "subtype".
    pub via: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeImpactResponse {
    pub target: Option<SymbolSummary>,
    pub affected: Vec<ImpactedSymbol>,
    pub truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub planner_trace: Option<PlannerTrace>,
}

impl QueryEngine {
    pub fn change_impact(&self, request: &ChangeImpactRequest) -> Result<ChangeImpactResponse> {
        let mut clamps = Clamps::default();
        let depth = clamps.depth("max_depth", request.max_depth, MAX_BLAST_DEPTH);

        let payload = normalize_payload(serde_json::json!({
            "symbol": request.symbol,
            "change_type": request.change_type,
            "max_depth": depth,
        }));

        let (mut response, mut trace) = self.cached("change_impact", &payload, || {
            self.compute_impact(request, depth)
        })?;
        trace.clamped = clamps.applied;
        if request.include_trace {
            response.planner_trace = Some(trace);
        }
        Ok(response)
    }

    fn compute_impact(
        &self,
        request: &ChangeImpactRequest,
        depth: u32,
    ) -> Result<ChangeImpactResponse> {
        let store = self.store()?;
        let Some(target) = resolve_symbol(&store, &request.symbol)? else {
            return Ok(ChangeImpactResponse {
                target: None,
                affected: Vec::new(),
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

        let mut depth_of: HashMap<i64, u32> = walk.depth_of();
        let mut via: HashMap<i64, &'static str> = walk
            .visits
            .iter()
            .map(|visit| (visit.symbol_id, "call_graph"))
            .collect();

        // Subtype sweep: classes among the affected set (the target included)
        // pull in their EXTENDS/IMPLEMENTS dependents explicitly.
        let affected_ids: Vec<i64> = walk.ids();
        let affected_rows = store.symbols_by_ids(&affected_ids)?;
        let class_ids: Vec<i64> = affected_rows
            .iter()
            .filter(|row| matches!(row.kind, SymbolKind::Class | SymbolKind::Interface))
            .map(|row| row.id)
            .collect();
        if !class_ids.is_empty() {
            for edge in store.edges_to(
                &class_ids,
                &[Relationship::Extends, Relationship::Implements],
            )? {
                let subtype = edge.source_id;
                let parent_depth = depth_of.get(&edge.target_id).copied().unwrap_or(0);
                depth_of.entry(subtype).or_insert(parent_depth + 1);
                via.entry(subtype).or_insert("subtype");
            }
        }

        let all_ids: Vec<i64> = depth_of
            .keys()
            .copied()
            .filter(|id| *id != target.id)
            .collect();
        let rows = store.symbols_by_ids(&all_ids)?;
        drop(store);

        let mut affected: Vec<ImpactedSymbol> = rows
            .iter()
            .map(|row| ImpactedSymbol {
                symbol: SymbolSummary::from(row),
                depth: depth_of.get(&row.id).copied().unwrap_or(1),
                via: via.get(&row.id).copied().unwrap_or("subtype").to_string(),
            })
            .collect();
        affected.sort_by(|a, b| a.depth.cmp(&b.depth).then(a.symbol.id.cmp(&b.symbol.id)));

        Ok(ChangeImpactResponse {
            target: Some(SymbolSummary::from(&target)),
            affected,
            truncated: walk.truncated,
            planner_trace: None,
        })
    }
}
