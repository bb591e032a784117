// trace_data_flow
//
// Bidirectional BFS over CALLS only, plus the simple paths within depth.
// Paths are enumerated by depth-first walk with a per-path visited set, so
// cycles terminate; path count is capped by the edge guardrail.

use super::guardrails::{Clamps, MAX_GRAPH_EDGES, MAX_GRAPH_VISITED, MAX_REFERENCE_DEPTH};
use super::walk::{self, WalkDirection, WalkOptions};
use super::{QueryEngine, PlannerTrace, SymbolSummary, normalize_payload, resolve_symbol};
use crate::error::Result;
use crate::extractor::Relationship;
use crate::store::GraphStore;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

fn default_depth() -> u32 {
    3
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataFlowRequest {
    pub symbol: String,
    #[serde(default = "default_depth")]
    pub depth: u32,
    #[serde(default)]
    pub deadline_ms: Option<u64>,
    #[serde(default)]
    pub include_trace: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowPath {
    pub direction: String,
    /// Qualified names from the target outward.
    pub symbols: Vec<String>,
    pub depth: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataFlowResponse {
    pub target: Option<SymbolSummary>,
    pub nodes: Vec<SymbolSummary>,
    pub paths: Vec<FlowPath>,
    pub truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub planner_trace: Option<PlannerTrace>,
}

impl QueryEngine {
    pub fn trace_data_flow(&self, request: &DataFlowRequest) -> Result<DataFlowResponse> {
        let mut clamps = Clamps::default();
        let depth = clamps.depth("depth", request.depth, MAX_REFERENCE_DEPTH);

        let payload = normalize_payload(serde_json::json!({
            "symbol": request.symbol,
            "depth": depth,
        }));

        let (mut response, mut trace) = self.cached("trace_data_flow", &payload, || {
            self.compute_data_flow(request, depth)
        })?;
        trace.clamped = clamps.applied;
        if request.include_trace {
            response.planner_trace = Some(trace);
        }
        Ok(response)
    }

    fn compute_data_flow(&self, request: &DataFlowRequest, depth: u32) -> Result<DataFlowResponse> {
        let store = self.store()?;
        let Some(target) = resolve_symbol(&store, &request.symbol)? else {
            return Ok(DataFlowResponse {
                target: None,
                nodes: Vec::new(),
                paths: Vec::new(),
                truncated: false,
                planner_trace: None,
            });
        };

        let walk = walk::bfs(
            &store,
            &[target.id],
            &[Relationship::Calls],
            WalkDirection::Both,
            &WalkOptions {
                max_depth: depth,
                max_visited: MAX_GRAPH_VISITED,
                deadline: request
                    .deadline_ms
                    .map(|ms| std::time::Instant::now() + std::time::Duration::from_millis(ms)),
            },
        )?;
        let node_ids = walk.ids();
        let rows = store.symbols_by_ids(&node_ids)?;
        let names: HashMap<i64, String> = rows
            .iter()
            .map(|row| (row.id, row.qualified_name.clone()))
            .collect();

        let mut paths = Vec::new();
        let mut truncated = walk.truncated;
        for (direction, walk_direction) in [
            ("downstream", WalkDirection::Forward),
            ("upstream", WalkDirection::Reverse),
        ] {
            let overflow = enumerate_paths(
                &store,
                target.id,
                walk_direction,
                depth,
                &names,
                direction,
                &mut paths,
            )?;
            truncated |= overflow;
        }

        Ok(DataFlowResponse {
            target: Some(SymbolSummary::from(&target)),
            nodes: rows.iter().map(SymbolSummary::from).collect(),
            paths,
            truncated,
            planner_trace: None,
        })
    }
}

/// Depth-first simple-path enumeration. Returns true if the path cap cut the
/// enumeration short.
fn enumerate_paths(
    store: &GraphStore,
    start: i64,
    direction: WalkDirection,
    max_depth: u32,
    names: &HashMap<i64, String>,
    label: &str,
    out: &mut Vec<FlowPath>,
) -> Result<bool> {
    let mut stack: Vec<(Vec<i64>, HashSet<i64>)> = vec![(vec![start], HashSet::from([start]))];
    let mut overflow = false;

    while let Some((path, on_path)) = stack.pop() {
        if out.len() >= MAX_GRAPH_EDGES {
            overflow = true;
            break;
        }
        let tip = *path.last().expect("path is never empty");
        let depth = (path.len() - 1) as u32;

        let neighbors: Vec<i64> = if depth < max_depth {
            let edges = match direction {
                WalkDirection::Forward => store.edges_from(&[tip], &[Relationship::Calls])?,
                _ => store.edges_to(&[tip], &[Relationship::Calls])?,
            };
            let mut next: Vec<i64> = edges
                .iter()
                .map(|edge| match direction {
                    WalkDirection::Forward => edge.target_id,
                    _ => edge.source_id,
                })
                .filter(|id| !on_path.contains(id) && names.contains_key(id))
                .collect();
            next.sort_unstable();
            next.dedup();
            next
        } else {
            Vec::new()
        };

        if neighbors.is_empty() {
            // a maximal simple path within depth; single nodes are not paths
            if path.len() > 1 {
                out.push(FlowPath {
                    direction: label.to_string(),
                    symbols: path
                        .iter()
                        .filter_map(|id| names.get(id).cloned())
                        .collect(),
                    depth,
                });
            }
            continue;
        }

        for neighbor in neighbors {
            let mut next_path = path.clone();
            next_path.push(neighbor);
            let mut next_on_path = on_path.clone();
            next_on_path.insert(neighbor);
            stack.push((next_path, next_on_path));
        }
    }

    Ok(overflow)
}
