// get_structure
//
// Hierarchical view of files under a sub-path: top symbols by PageRank per
// file, optional signatures, stopping cleanly when the token budget would be
// exceeded.

use super::guardrails::{
    Clamps, MAX_CONTEXT_TOKEN_BUDGET, MIN_CONTEXT_TOKEN_BUDGET,
};
use super::{QueryEngine, PlannerTrace, normalize_payload};
use crate::error::Result;
use serde::{Deserialize, Serialize};

fn default_budget() -> usize {
    4_000
}

fn default_symbols_per_file() -> usize {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructureRequest {
    /// Sub-path under the repo root; empty means the whole tree.
    #[serde(default)]
    pub path: String,
    #[serde(default = "default_budget")]
    pub token_budget: usize,
    #[serde(default = "default_symbols_per_file")]
    pub symbols_per_file: usize,
    #[serde(default)]
    pub include_signatures: bool,
    #[serde(default)]
    pub include_trace: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructureSymbol {
    pub name: String,
    pub kind: String,
    pub start_line: u32,
    pub pagerank: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructureFile {
    pub path: String,
    pub language: String,
    pub symbols: Vec<StructureSymbol>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructureResponse {
    pub root: String,
    pub files: Vec<StructureFile>,
    pub tokens_used: usize,
    pub token_budget: usize,
    pub truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub planner_trace: Option<PlannerTrace>,
}

impl QueryEngine {
    pub fn get_structure(&self, request: &StructureRequest) -> Result<StructureResponse> {
        let mut clamps = Clamps::default();
        let budget = clamps.range(
            "token_budget",
            request.token_budget,
            MIN_CONTEXT_TOKEN_BUDGET,
            MAX_CONTEXT_TOKEN_BUDGET,
        );

        let payload = normalize_payload(serde_json::json!({
            "path": request.path,
            "token_budget": budget,
            "symbols_per_file": request.symbols_per_file,
            "include_signatures": request.include_signatures,
        }));

        let (mut response, mut trace) = self.cached("get_structure", &payload, || {
            self.compute_structure(request, budget)
        })?;
        trace.clamped = clamps.applied;
        if request.include_trace {
            response.planner_trace = Some(trace);
        }
        Ok(response)
    }

    fn compute_structure(
        &self,
        request: &StructureRequest,
        budget: usize,
    ) -> Result<StructureResponse> {
        let store = self.store()?;
        let files = store.files_under(&request.path)?;

        let mut out_files = Vec::new();
        let mut tokens_used = 0;
        let mut truncated = false;

        'files: for file in &files {
            let header_cost = self.tokenizer().count(&file.path) + 2;
            if tokens_used + header_cost > budget {
                truncated = true;
                break;
            }
            tokens_used += header_cost;

            let mut symbols = Vec::new();
            for row in store.top_symbols_for_file(&file.path, request.symbols_per_file)? {
                let rendered = if request.include_signatures && !row.signature.is_empty() {
                    row.signature.clone()
                } else {
                    format!("{} {}", row.kind.as_str(), row.name)
                };
                let cost = self.tokenizer().count(&rendered) + 1;
                if tokens_used + cost > budget {
                    truncated = true;
                    out_files.push(StructureFile {
                        path: file.path.clone(),
                        language: file.language.as_str().to_string(),
                        symbols,
                    });
                    break 'files;
                }
                tokens_used += cost;
                symbols.push(StructureSymbol {
                    name: row.name.clone(),
                    kind: row.kind.as_str().to_string(),
                    start_line: row.start_line,
                    pagerank: row.pagerank,
                    signature: (request.include_signatures && !row.signature.is_empty())
                        .then(|| row.signature.clone()),
                });
            }
            out_files.push(StructureFile {
                path: file.path.clone(),
                language: file.language.as_str().to_string(),
                symbols,
            });
        }

        Ok(StructureResponse {
            root: request.path.clone(),
            files: out_files,
            tokens_used,
            token_budget: budget,
            truncated,
            planner_trace: None,
        })
    }
}
