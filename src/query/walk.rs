// Shared graph traversal
//
// Breadth-first over the edges table by integer ids, one store round-trip per
// hop. The visited set is capped and the deadline is checked between hops;
// hitting either returns the partial result with a truncation flag instead
// of failing.

use crate::error::Result;
use crate::extractor::Relationship;
use crate::store::GraphStore;
use std::collections::{HashMap, HashSet};
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkDirection {
    Forward,
    Reverse,
    Both,
}

#[derive(Debug, Clone)]
pub struct WalkOptions {
    pub max_depth: u32,
    pub max_visited: usize,
    pub deadline: Option<Instant>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Visit {
    pub symbol_id: i64,
    pub depth: u32,
    /// Edge line at first discovery, 0 for seeds.
    pub line: u32,
    pub confidence: f64,
}

#[derive(Debug, Default)]
pub struct Walk {
    /// First-discovery order; seeds come first at depth 0.
    pub visits: Vec<Visit>,
    pub truncated: bool,
}

impl Walk {
    pub fn ids(&self) -> Vec<i64> {
        self.visits.iter().map(|v| v.symbol_id).collect()
    }

    pub fn depth_of(&self) -> HashMap<i64, u32> {
        self.visits.iter().map(|v| (v.symbol_id, v.depth)).collect()
    }
}

pub fn bfs(
    store: &GraphStore,
    seeds: &[i64],
    relationships: &[Relationship],
    direction: WalkDirection,
    options: &WalkOptions,
) -> Result<Walk> {
    let mut walk = Walk::default();
    let mut seen: HashSet<i64> = HashSet::new();
    let mut frontier: Vec<i64> = Vec::new();

    for &seed in seeds {
        if seen.insert(seed) {
            walk.visits.push(Visit {
                symbol_id: seed,
                depth: 0,
                line: 0,
                confidence: 1.0,
            });
            frontier.push(seed);
        }
    }

    for depth in 1..=options.max_depth {
        if frontier.is_empty() {
            break;
        }
        if let Some(deadline) = options.deadline
            && Instant::now() >= deadline
        {
            walk.truncated = true;
            break;
        }

        let mut next: Vec<Visit> = Vec::new();
        if matches!(direction, WalkDirection::Forward | WalkDirection::Both) {
            for edge in store.edges_from(&frontier, relationships)? {
                if edge.target_kind == crate::store::EndpointKind::Symbol {
                    next.push(Visit {
                        symbol_id: edge.target_id,
                        depth,
                        line: edge.line,
                        confidence: edge.confidence,
                    });
                }
            }
        }
        if matches!(direction, WalkDirection::Reverse | WalkDirection::Both) {
            for edge in store.edges_to(&frontier, relationships)? {
                if edge.source_kind == crate::store::EndpointKind::Symbol {
                    next.push(Visit {
                        symbol_id: edge.source_id,
                        depth,
                        line: edge.line,
                        confidence: edge.confidence,
                    });
                }
            }
        }

        frontier = Vec::new();
        for visit in next {
            if walk.visits.len() >= options.max_visited {
                walk.truncated = true;
                break;
            }
            if seen.insert(visit.symbol_id) {
                frontier.push(visit.symbol_id);
                walk.visits.push(visit);
            }
        }
        if walk.truncated {
            break;
        }
    }

    Ok(walk)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::{SymbolKind, SymbolRecord};
    use crate::scanner::Language;
    use crate::store::{FileUpsert, NewEdge};

    fn chain_store(len: usize) -> (GraphStore, Vec<i64>) {
        let mut store = GraphStore::open_in_memory().unwrap();
        let records: Vec<SymbolRecord> = (0..len)
            .map(|i| {
                SymbolRecord::new(
                    format!("f{i}"),
                    format!("m.f{i}"),
                    SymbolKind::Function,
                    (i as u32 + 1) * 10,
                    (i as u32 + 1) * 10 + 2,
                )
            })
            .collect();
        let ids = store
            .replace_file_symbols(
                &FileUpsert {
                    path: "m.py",
                    language: Language::Python,
                    hash: "h",
                    size: 1,
                    content: None,
                },
                &records,
            )
            .unwrap();
        let edges: Vec<NewEdge> = ids
            .windows(2)
            .map(|pair| NewEdge::symbol_to_symbol(pair[0], pair[1], Relationship::Calls, 1, 1.0))
            .collect();
        store.replace_file_edges("m.py", &edges).unwrap();
        (store, ids)
    }

    #[test]
    fn forward_walk_respects_depth() {
        let (store, ids) = chain_store(10);
        let walk = bfs(
            &store,
            &[ids[0]],
            &[Relationship::Calls],
            WalkDirection::Forward,
            &WalkOptions {
                max_depth: 3,
                max_visited: 100,
                deadline: None,
            },
        )
        .unwrap();
        // seed + 3 hops
        assert_eq!(walk.visits.len(), 4);
        assert_eq!(walk.visits.last().unwrap().depth, 3);
        assert!(!walk.truncated);
    }

    #[test]
    fn reverse_walk_finds_callers() {
        let (store, ids) = chain_store(5);
        let walk = bfs(
            &store,
            &[ids[4]],
            &[Relationship::Calls],
            WalkDirection::Reverse,
            &WalkOptions {
                max_depth: 2,
                max_visited: 100,
                deadline: None,
            },
        )
        .unwrap();
        let visited: Vec<i64> = walk.ids();
        assert_eq!(visited, vec![ids[4], ids[3], ids[2]]);
    }

    #[test]
    fn visited_cap_truncates() {
        let (store, ids) = chain_store(20);
        let walk = bfs(
            &store,
            &[ids[0]],
            &[Relationship::Calls],
            WalkDirection::Forward,
            &WalkOptions {
                max_depth: 19,
                max_visited: 5,
                deadline: None,
            },
        )
        .unwrap();
        assert_eq!(walk.visits.len(), 5);
        assert!(walk.truncated);
    }

    #[test]
    fn expired_deadline_returns_partial() {
        let (store, ids) = chain_store(5);
        let walk = bfs(
            &store,
            &[ids[0]],
            &[Relationship::Calls],
            WalkDirection::Forward,
            &WalkOptions {
                max_depth: 4,
                max_visited: 100,
                deadline: Some(Instant::now() - std::time::Duration::from_millis(1)),
            },
        )
        .unwrap();
        assert_eq!(walk.visits.len(), 1, "only the seed before the deadline");
        assert!(walk.truncated);
    }
}
