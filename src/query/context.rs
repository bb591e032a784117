// get_context
//
// Token-budgeted context assembly. Seeds come from entry points and FTS hits
// on the query; expansion is a capped BFS over the structural relationships;
// importance is personalized PageRank times global rank times a proximity
// bonus; packing is greedy by that score under the token budget; redaction
// runs last so nothing upstream can reintroduce a secret.

use super::guardrails::{
    Clamps, MAX_CONTEXT_EXPANSION_DEPTH, MAX_CONTEXT_SEEDS, MAX_CONTEXT_TOKEN_BUDGET,
    MAX_ENTRY_POINTS, MAX_GRAPH_VISITED, MAX_QUERY_LENGTH, MIN_CONTEXT_TOKEN_BUDGET,
    adaptive_graph_cap,
};
use super::references::snippet;
use super::walk::{self, WalkDirection, WalkOptions};
use super::{QueryEngine, PlannerTrace, normalize_payload, redact, resolve_symbol};
use crate::error::Result;
use crate::extractor::Relationship;
use crate::store::SymbolRow;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::{Duration, Instant};

const PPR_ITERATIONS: usize = 20;
const PPR_RESTART: f64 = 0.15;
const PPR_DAMPING: f64 = 0.85;

const EXPANSION_RELATIONSHIPS: [Relationship; 5] = [
    Relationship::Calls,
    Relationship::ImportsSymbol,
    Relationship::Extends,
    Relationship::Implements,
    Relationship::HasMethod,
];

fn default_budget() -> usize {
    8_000
}

fn default_depth() -> u32 {
    2
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextRequest {
    pub query: String,
    #[serde(default)]
    pub entry_points: Vec<String>,
    #[serde(default = "default_budget")]
    pub token_budget: usize,
    #[serde(default)]
    pub signatures_only: bool,
    #[serde(default = "default_depth")]
    pub depth: u32,
    #[serde(default)]
    pub deadline_ms: Option<u64>,
    #[serde(default)]
    pub include_trace: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextSymbol {
    pub qualified_name: String,
    pub kind: String,
    pub start_line: u32,
    pub end_line: u32,
    /// "full" or "signature"
    pub inclusion: String,
    pub text: String,
    pub score: f64,
    pub depth: u32,
    pub seed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileContext {
    pub file_path: String,
    pub symbols: Vec<ContextSymbol>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipSummary {
    pub from: String,
    pub to: String,
    pub relationship: String,
    pub line: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ContextMetrics {
    pub seed_hit_rate: f64,
    pub connectedness: f64,
    pub avg_depth: f64,
    pub token_efficiency: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextResponse {
    pub query: String,
    pub files: Vec<FileContext>,
    pub relationships: Vec<RelationshipSummary>,
    pub metrics: ContextMetrics,
    pub tokens_used: usize,
    pub token_budget: usize,
    pub redactions: usize,
    pub truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub planner_trace: Option<PlannerTrace>,
}

struct Candidate {
    row: SymbolRow,
    score: f64,
    depth: u32,
    seed: bool,
}

impl QueryEngine {
    pub fn get_context(&self, request: &ContextRequest) -> Result<ContextResponse> {
        let mut clamps = Clamps::default();
        let query = clamps
            .text("query", &request.query, MAX_QUERY_LENGTH)
            .to_string();
        let budget = clamps.range(
            "token_budget",
            request.token_budget,
            MIN_CONTEXT_TOKEN_BUDGET,
            MAX_CONTEXT_TOKEN_BUDGET,
        );
        let depth = clamps.depth("depth", request.depth, MAX_CONTEXT_EXPANSION_DEPTH);
        let entry_count = clamps.count(
            "entry_points",
            request.entry_points.len(),
            MAX_ENTRY_POINTS,
        );

        let payload = normalize_payload(serde_json::json!({
            "query": query,
            "entry_points": &request.entry_points[..entry_count],
            "token_budget": budget,
            "signatures_only": request.signatures_only,
            "depth": depth,
        }));

        let (mut response, mut trace) = self.cached("get_context", &payload, || {
            self.compute_context(request, &query, entry_count, budget, depth)
        })?;
        trace.clamped = clamps.applied;
        if request.include_trace {
            response.planner_trace = Some(trace);
        }
        Ok(response)
    }

    fn compute_context(
        &self,
        request: &ContextRequest,
        query: &str,
        entry_count: usize,
        budget: usize,
        depth: u32,
    ) -> Result<ContextResponse> {
        let deadline = request
            .deadline_ms
            .map(|ms| Instant::now() + Duration::from_millis(ms));
        let store = self.store()?;

        // 1. Seed selection: entry points first, then FTS hits on the query.
        let mut seeds: Vec<i64> = Vec::new();
        let mut seen: HashSet<i64> = HashSet::new();
        for name in request.entry_points.iter().take(entry_count) {
            if let Some(row) = resolve_symbol(&store, name)?
                && seen.insert(row.id)
            {
                seeds.push(row.id);
            }
        }
        for (row, _) in store.fts_search(query, MAX_CONTEXT_SEEDS)? {
            if seeds.len() >= MAX_CONTEXT_SEEDS {
                break;
            }
            if seen.insert(row.id) {
                seeds.push(row.id);
            }
        }

        if seeds.is_empty() {
            return Ok(ContextResponse {
                query: query.to_string(),
                files: Vec::new(),
                relationships: Vec::new(),
                metrics: ContextMetrics::default(),
                tokens_used: 0,
                token_budget: budget,
                redactions: 0,
                truncated: false,
                planner_trace: None,
            });
        }

        // 2. Graph expansion, visited set capped adaptively to repo size.
        let total_symbols = store.total_symbols()? as usize;
        let cap = adaptive_graph_cap(total_symbols, MAX_GRAPH_VISITED, 200);
        let walk = walk::bfs(
            &store,
            &seeds,
            &EXPANSION_RELATIONSHIPS,
            WalkDirection::Both,
            &WalkOptions {
                max_depth: depth,
                max_visited: cap,
                deadline,
            },
        )?;
        let mut truncated = walk.truncated;

        let node_ids = walk.ids();
        let depth_of = walk.depth_of();
        let subgraph_edges = store.edges_among(&node_ids)?;

        // 3. Personalized PageRank biased to the seed set.
        let ppr = personalized_pagerank(
            &node_ids,
            &subgraph_edges
                .iter()
                .filter(|edge| {
                    EXPANSION_RELATIONSHIPS.contains(&edge.relationship)
                })
                .map(|edge| (edge.source_id, edge.target_id))
                .collect::<Vec<_>>(),
            &seeds,
        );

        // 4. Composite score.
        let rows = store.symbols_by_ids(&node_ids)?;
        let seed_set: HashSet<i64> = seeds.iter().copied().collect();
        let mut candidates: Vec<Candidate> = rows
            .into_iter()
            .map(|row| {
                let node_depth = depth_of.get(&row.id).copied().unwrap_or(depth);
                let score = ppr.get(&row.id).copied().unwrap_or(0.0)
                    * (row.pagerank + 1e-6)
                    * proximity_bonus(node_depth);
                Candidate {
                    seed: seed_set.contains(&row.id),
                    depth: node_depth,
                    score,
                    row,
                }
            })
            .collect();
        // Seeds pack first, then descending composite score.
        candidates.sort_by(|a, b| {
            b.seed
                .cmp(&a.seed)
                .then(
                    b.score
                        .partial_cmp(&a.score)
                        .unwrap_or(std::cmp::Ordering::Equal),
                )
                .then(a.row.id.cmp(&b.row.id))
        });

        // 5. Token-budget packing.
        let mut contents: HashMap<String, Option<String>> = HashMap::new();
        let mut included: Vec<(ContextSymbol, String, i64)> = Vec::new();
        let mut tokens_used = 0;

        for candidate in &candidates {
            let content = contents
                .entry(candidate.row.file_path.clone())
                .or_insert_with(|| {
                    store.file_content(&candidate.row.file_path).ok().flatten()
                });
            let full_text = content
                .as_ref()
                .map(|text| snippet(text, candidate.row.start_line, candidate.row.end_line))
                .filter(|text| !text.is_empty())
                .unwrap_or_else(|| candidate.row.signature.clone());
            let signature_text = match &candidate.row.docstring {
                Some(docstring) => format!("{}\n{}", candidate.row.signature, docstring),
                None => candidate.row.signature.clone(),
            };

            let use_full = candidate.seed || !request.signatures_only;
            let (inclusion, text) = if candidate.seed {
                ("full", full_text)
            } else if use_full && tokens_used + self.tokenizer().count(&full_text) <= budget {
                ("full", full_text)
            } else {
                ("signature", signature_text)
            };

            let cost = self.tokenizer().count(&text);
            if tokens_used + cost > budget {
                if candidate.seed {
                    // a seed that cannot fit even alone: fall back to its signature
                    let fallback = candidate.row.signature.clone();
                    let fallback_cost = self.tokenizer().count(&fallback);
                    if tokens_used + fallback_cost <= budget {
                        tokens_used += fallback_cost;
                        included.push((
                            build_symbol(candidate, "signature", fallback),
                            candidate.row.file_path.clone(),
                            candidate.row.id,
                        ));
                        continue;
                    }
                }
                truncated = true;
                break;
            }
            tokens_used += cost;
            included.push((
                build_symbol(candidate, inclusion, text),
                candidate.row.file_path.clone(),
                candidate.row.id,
            ));
        }

        // 7 (assembly half). Relationship summary over the included set.
        let included_ids: Vec<i64> = included.iter().map(|(_, _, id)| *id).collect();
        let names: HashMap<i64, String> = candidates
            .iter()
            .map(|candidate| (candidate.row.id, candidate.row.qualified_name.clone()))
            .collect();
        let relationships: Vec<RelationshipSummary> = store
            .edges_among(&included_ids)?
            .iter()
            .filter_map(|edge| {
                Some(RelationshipSummary {
                    from: names.get(&edge.source_id)?.clone(),
                    to: names.get(&edge.target_id)?.clone(),
                    relationship: edge.relationship.as_str().to_string(),
                    line: edge.line,
                })
            })
            .collect();
        drop(store);

        // 6. Redaction, last, on the already-assembled fragments.
        let mut redactions = 0;
        let mut files: BTreeMap<String, Vec<ContextSymbol>> = BTreeMap::new();
        for (mut symbol, file_path, _) in included {
            let (clean, count) = redact::redact(&symbol.text);
            symbol.text = clean;
            redactions += count;
            files.entry(file_path).or_default().push(symbol);
        }
        let files: Vec<FileContext> = files
            .into_iter()
            .map(|(file_path, mut symbols)| {
                symbols.sort_by_key(|s| s.start_line);
                FileContext { file_path, symbols }
            })
            .collect();

        let included_count: usize = files.iter().map(|f| f.symbols.len()).sum();
        let included_seed_count = files
            .iter()
            .flat_map(|f| &f.symbols)
            .filter(|s| s.seed)
            .count();
        let avg_depth = if included_count == 0 {
            0.0
        } else {
            files
                .iter()
                .flat_map(|f| &f.symbols)
                .map(|s| s.depth as f64)
                .sum::<f64>()
                / included_count as f64
        };
        let metrics = ContextMetrics {
            seed_hit_rate: if seeds.is_empty() {
                0.0
            } else {
                included_seed_count as f64 / seeds.len() as f64
            },
            connectedness: if included_count == 0 {
                0.0
            } else {
                relationships.len() as f64 / included_count as f64
            },
            avg_depth,
            token_efficiency: tokens_used as f64 / budget as f64,
        };

        Ok(ContextResponse {
            query: query.to_string(),
            files,
            relationships,
            metrics,
            tokens_used,
            token_budget: budget,
            redactions,
            truncated,
            planner_trace: None,
        })
    }
}

fn build_symbol(candidate: &Candidate, inclusion: &str, text: String) -> ContextSymbol {
    ContextSymbol {
        qualified_name: candidate.row.qualified_name.clone(),
        kind: candidate.row.kind.as_str().to_string(),
        start_line: candidate.row.start_line,
        end_line: candidate.row.end_line,
        inclusion: inclusion.to_string(),
        text,
        score: candidate.score,
        depth: candidate.depth,
        seed: candidate.seed,
    }
}

/// Proximity bonus: 1.0 at the seed, 0.7 one hop out, 0.4 at two, halving
/// beyond that.
fn proximity_bonus(depth: u32) -> f64 {
    match depth {
        0 => 1.0,
        1 => 0.7,
        2 => 0.4,
        further => 0.4 / 2f64.powi(further as i32 - 2),
    }
}

/// Personalized PageRank with restart mass concentrated on the seeds.
fn personalized_pagerank(
    node_ids: &[i64],
    edges: &[(i64, i64)],
    seeds: &[i64],
) -> HashMap<i64, f64> {
    let n = node_ids.len();
    if n == 0 {
        return HashMap::new();
    }
    let index_of: HashMap<i64, usize> = node_ids
        .iter()
        .enumerate()
        .map(|(index, id)| (*id, index))
        .collect();

    let mut incoming: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut out_degree: Vec<usize> = vec![0; n];
    for (source, target) in edges {
        let (Some(&s), Some(&t)) = (index_of.get(source), index_of.get(target)) else {
            continue;
        };
        incoming[t].push(s);
        out_degree[s] += 1;
    }

    let mut restart = vec![0.0; n];
    let seed_indexes: Vec<usize> = seeds
        .iter()
        .filter_map(|seed| index_of.get(seed).copied())
        .collect();
    if seed_indexes.is_empty() {
        for value in restart.iter_mut() {
            *value = 1.0 / n as f64;
        }
    } else {
        for &index in &seed_indexes {
            restart[index] = 1.0 / seed_indexes.len() as f64;
        }
    }

    let mut ranks = restart.clone();
    let mut next = vec![0.0; n];
    for _ in 0..PPR_ITERATIONS {
        let dangling: f64 = (0..n)
            .filter(|&i| out_degree[i] == 0)
            .map(|i| ranks[i])
            .sum();
        for target in 0..n {
            let incoming_mass: f64 = incoming[target]
                .iter()
                .map(|&source| ranks[source] / out_degree[source] as f64)
                .sum();
            next[target] = PPR_RESTART * restart[target]
                + PPR_DAMPING * (incoming_mass + dangling * restart[target]);
        }
        std::mem::swap(&mut ranks, &mut next);
    }

    node_ids
        .iter()
        .zip(ranks.iter())
        .map(|(id, rank)| (*id, *rank))
        .collect()
}
