// get_references
//
// Resolve the target, then BFS across the relationship set the direction
// implies, to the requested depth. A missing target is an empty response,
// not an error.

use super::guardrails::{Clamps, MAX_GRAPH_VISITED, MAX_REFERENCE_DEPTH};
use super::walk::{self, WalkDirection, WalkOptions};
use super::{QueryEngine, PlannerTrace, SymbolSummary, normalize_payload, resolve_symbol};
use crate::error::Result;
use crate::extractor::Relationship;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Callers,
    Callees,
    Both,
    Implementors,
    Supers,
}

fn default_depth() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferencesRequest {
    pub symbol: String,
    pub direction: Direction,
    #[serde(default = "default_depth")]
    pub depth: u32,
    #[serde(default)]
    pub include_source: bool,
    #[serde(default)]
    pub deadline_ms: Option<u64>,
    #[serde(default)]
    pub include_trace: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reference {
    #[serde(flatten)]
    pub symbol: SymbolSummary,
    pub depth: u32,
    pub line: u32,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceGroup {
    pub direction: String,
    pub items: Vec<Reference>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferencesResponse {
    pub target: Option<SymbolSummary>,
    pub groups: Vec<ReferenceGroup>,
    pub truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub planner_trace: Option<PlannerTrace>,
}

impl QueryEngine {
    pub fn get_references(&self, request: &ReferencesRequest) -> Result<ReferencesResponse> {
        let mut clamps = Clamps::default();
        let depth = clamps.depth("depth", request.depth, MAX_REFERENCE_DEPTH);

        let payload = normalize_payload(serde_json::json!({
            "symbol": request.symbol,
            "direction": request.direction,
            "depth": depth,
            "include_source": request.include_source,
        }));

        let (mut response, mut trace) = self.cached("get_references", &payload, || {
            self.compute_references(request, depth)
        })?;
        trace.clamped = clamps.applied;
        if request.include_trace {
            response.planner_trace = Some(trace);
        }
        Ok(response)
    }

    fn compute_references(
        &self,
        request: &ReferencesRequest,
        depth: u32,
    ) -> Result<ReferencesResponse> {
        let store = self.store()?;
        let Some(target) = resolve_symbol(&store, &request.symbol)? else {
            return Ok(ReferencesResponse {
                target: None,
                groups: Vec::new(),
                truncated: false,
                planner_trace: None,
            });
        };

        // (direction label, relationships, walk direction)
        let legs: Vec<(&str, Vec<Relationship>, WalkDirection)> = match request.direction {
            Direction::Callers => vec![("callers", vec![Relationship::Calls], WalkDirection::Reverse)],
            Direction::Callees => vec![("callees", vec![Relationship::Calls], WalkDirection::Forward)],
            Direction::Both => vec![
                ("callers", vec![Relationship::Calls], WalkDirection::Reverse),
                ("callees", vec![Relationship::Calls], WalkDirection::Forward),
            ],
            Direction::Implementors => vec![(
                "implementors",
                vec![Relationship::Implements, Relationship::Extends],
                WalkDirection::Reverse,
            )],
            Direction::Supers => vec![(
                "supers",
                vec![Relationship::Extends, Relationship::Implements],
                WalkDirection::Forward,
            )],
        };

        let options = WalkOptions {
            max_depth: depth,
            max_visited: MAX_GRAPH_VISITED,
            deadline: request
                .deadline_ms
                .map(|ms| std::time::Instant::now() + std::time::Duration::from_millis(ms)),
        };

        let mut groups = Vec::new();
        let mut truncated = false;
        for (label, relationships, walk_direction) in legs {
            let walk = walk::bfs(&store, &[target.id], &relationships, walk_direction, &options)?;
            truncated |= walk.truncated;

            let ids: Vec<i64> = walk
                .visits
                .iter()
                .filter(|visit| visit.depth > 0)
                .map(|visit| visit.symbol_id)
                .collect();
            let rows = store.symbols_by_ids(&ids)?;
            let by_id: HashMap<i64, _> = rows.iter().map(|row| (row.id, row)).collect();

            let mut items = Vec::new();
            for visit in walk.visits.iter().filter(|visit| visit.depth > 0) {
                let Some(row) = by_id.get(&visit.symbol_id) else {
                    continue;
                };
                let source = if request.include_source {
                    store
                        .file_content(&row.file_path)?
                        .map(|content| snippet(&content, row.start_line, row.end_line))
                } else {
                    None
                };
                items.push(Reference {
                    symbol: SymbolSummary::from(*row),
                    depth: visit.depth,
                    line: visit.line,
                    confidence: visit.confidence,
                    source,
                });
            }
            groups.push(ReferenceGroup {
                direction: label.to_string(),
                items,
            });
        }

        Ok(ReferencesResponse {
            target: Some(SymbolSummary::from(&target)),
            groups,
            truncated,
            planner_trace: None,
        })
    }
}

/// Extract the 1-based inclusive line range from file content.
pub(crate) fn snippet(content: &str, start_line: u32, end_line: u32) -> String {
    let start = start_line.saturating_sub(1) as usize;
    let count = (end_line.saturating_sub(start_line) as usize) + 1;
    content
        .lines()
        .skip(start)
        .take(count)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_is_inclusive() {
        let content = "a\nb\nc\nd\n";
        assert_eq!(snippet(content, 2, 3), "b\nc");
        assert_eq!(snippet(content, 1, 1), "a");
        assert_eq!(snippet(content, 4, 9), "d");
    }
}
