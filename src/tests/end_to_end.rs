// End-to-end scenarios: index a fixture tree, query it through the engines.

use super::helpers::{chain_module, index_fixture};
use crate::query::blast::{BlastRadiusRequest, ChangeType};
use crate::query::context::ContextRequest;
use crate::query::dataflow::DataFlowRequest;
use crate::query::impact::ChangeImpactRequest;
use crate::query::references::{Direction, ReferencesRequest};
use crate::query::search::SearchRequest;
use crate::query::structure::StructureRequest;

fn search_request(query: &str) -> SearchRequest {
    SearchRequest {
        query: query.to_string(),
        kind: None,
        file_glob: None,
        limit: 20,
        include_trace: false,
        explain: false,
    }
}

#[test]
fn cross_file_call_resolves_to_single_callee() {
    let fixture = index_fixture(&[
        ("a.py", "from b import g\n\ndef f():\n    g()\n"),
        ("b.py", "def g():\n    return 1\n"),
    ]);
    let engine = fixture.engine();

    let response = engine
        .get_references(&ReferencesRequest {
            symbol: "f".to_string(),
            direction: Direction::Callees,
            depth: 1,
            include_source: false,
            deadline_ms: None,
            include_trace: false,
        })
        .unwrap();

    assert_eq!(response.target.as_ref().unwrap().qualified_name, "a.f");
    assert_eq!(response.groups.len(), 1);
    let callees = &response.groups[0];
    assert_eq!(callees.direction, "callees");
    assert_eq!(callees.items.len(), 1, "exactly one callee");
    let callee = &callees.items[0];
    assert_eq!(callee.symbol.qualified_name, "b.g");
    assert_eq!(callee.symbol.file_path, "b.py");
    assert_eq!(callee.line, 4, "edge carries the call line");
}

#[test]
fn class_hierarchy_impact_includes_all_subtypes() {
    let fixture = index_fixture(&[(
        "animals.py",
        "class Animal:\n    def speak(self):\n        pass\n\n\nclass Dog(Animal):\n    pass\n\n\nclass Cat(Animal):\n    pass\n",
    )]);
    let engine = fixture.engine();

    let response = engine
        .change_impact(&ChangeImpactRequest {
            symbol: "Animal".to_string(),
            change_type: ChangeType::Signature,
            max_depth: 3,
            deadline_ms: None,
            include_trace: false,
        })
        .unwrap();

    let at_depth_one: Vec<&str> = response
        .affected
        .iter()
        .filter(|affected| affected.depth == 1)
        .map(|affected| affected.symbol.name.as_str())
        .collect();
    assert!(at_depth_one.contains(&"Dog"), "Dog at depth 1: {at_depth_one:?}");
    assert!(at_depth_one.contains(&"Cat"), "Cat at depth 1: {at_depth_one:?}");
}

#[test]
fn blast_radius_on_call_chain_is_exact() {
    let fixture = index_fixture(&[("chain.py", &chain_module(100))]);
    let engine = fixture.engine();

    let response = engine
        .get_blast_radius(&BlastRadiusRequest {
            symbol: "f50".to_string(),
            change_type: ChangeType::Behavior,
            max_depth: 3,
            deadline_ms: None,
            include_trace: false,
        })
        .unwrap();

    let mut affected: Vec<String> = response
        .direct
        .iter()
        .chain(response.transitive.iter())
        .map(|a| a.symbol.name.clone())
        .collect();
    affected.sort();
    assert_eq!(affected, vec!["f47", "f48", "f49"]);

    assert_eq!(response.direct.len(), 1);
    assert_eq!(response.direct[0].symbol.name, "f49");
}

#[test]
fn context_bundle_covers_flow_and_respects_budget() {
    let fixture = index_fixture(&[(
        "auth.py",
        r#"def login(user, password):
    """Entry point for the authenticate flow."""
    return authenticate(user, password)


def authenticate(user, password):
    """Authenticate a user."""
    return verify_password(user, password)


def verify_password(user, password):
    """Check the password hash."""
    return True
"#,
    )]);
    let engine = fixture.engine();

    let response = engine
        .get_context(&ContextRequest {
            query: "authenticate flow".to_string(),
            entry_points: vec!["login".to_string()],
            token_budget: 2_000,
            signatures_only: false,
            depth: 2,
            deadline_ms: None,
            include_trace: false,
        })
        .unwrap();

    assert!(response.tokens_used <= response.token_budget);
    let included: Vec<&str> = response
        .files
        .iter()
        .flat_map(|file| &file.symbols)
        .map(|symbol| symbol.qualified_name.as_str())
        .collect();
    for name in ["auth.login", "auth.authenticate", "auth.verify_password"] {
        assert!(included.contains(&name), "{name} missing from {included:?}");
    }

    let edges: Vec<(String, String)> = response
        .relationships
        .iter()
        .map(|edge| (edge.from.clone(), edge.to.clone()))
        .collect();
    assert!(edges.contains(&("auth.login".into(), "auth.authenticate".into())));
    assert!(edges.contains(&("auth.authenticate".into(), "auth.verify_password".into())));
    assert!(response.metrics.seed_hit_rate > 0.0);
}

#[test]
fn secrets_in_docstrings_are_redacted_from_context() {
    let fixture = index_fixture(&[(
        "creds.py",
        "def get_creds():\n    \"\"\"Uses AKIA0000000000000000 for access.\"\"\"\n    return None\n",
    )]);
    let engine = fixture.engine();

    // the symbol itself is indexed and findable
    let search = engine.search_symbols(&search_request("get_creds")).unwrap();
    assert_eq!(search.results.len(), 1);

    let response = engine
        .get_context(&ContextRequest {
            query: "creds".to_string(),
            entry_points: vec!["get_creds".to_string()],
            token_budget: 2_000,
            signatures_only: false,
            depth: 1,
            deadline_ms: None,
            include_trace: false,
        })
        .unwrap();

    assert!(response.redactions >= 1);
    for file in &response.files {
        for symbol in &file.symbols {
            assert!(
                !symbol.text.contains("AKIA0000000000000000"),
                "secret leaked in {}",
                symbol.qualified_name
            );
        }
    }
}

#[test]
fn data_flow_paths_are_tagged_by_direction() {
    let fixture = index_fixture(&[("chain.py", &chain_module(6))]);
    let engine = fixture.engine();

    let response = engine
        .trace_data_flow(&DataFlowRequest {
            symbol: "f2".to_string(),
            depth: 2,
            deadline_ms: None,
            include_trace: false,
        })
        .unwrap();

    assert!(response.target.is_some());
    let downstream: Vec<&crate::query::dataflow::FlowPath> = response
        .paths
        .iter()
        .filter(|path| path.direction == "downstream")
        .collect();
    let upstream: Vec<&crate::query::dataflow::FlowPath> = response
        .paths
        .iter()
        .filter(|path| path.direction == "upstream")
        .collect();
    assert!(!downstream.is_empty());
    assert!(!upstream.is_empty());
    assert!(
        downstream
            .iter()
            .any(|path| path.symbols == vec!["chain.f2", "chain.f3", "chain.f4"])
    );
    assert!(
        upstream
            .iter()
            .any(|path| path.symbols == vec!["chain.f2", "chain.f1", "chain.f0"])
    );
}

#[test]
fn search_ranks_exact_name_first() {
    let fixture = index_fixture(&[
        (
            "auth.py",
            "def authenticate(user):\n    pass\n\ndef authenticate_admin(user):\n    pass\n",
        ),
        ("other.py", "def unrelated():\n    pass\n"),
    ]);
    let engine = fixture.engine();

    let response = engine.search_symbols(&search_request("authenticate")).unwrap();
    assert!(response.results.len() >= 2);
    assert_eq!(response.results[0].symbol.name, "authenticate");
}

#[test]
fn structure_lists_files_with_top_symbols() {
    let fixture = index_fixture(&[
        ("src/a.py", "def alpha():\n    pass\n"),
        ("src/b.py", "def beta():\n    alpha()\n"),
        ("lib/c.py", "def gamma():\n    pass\n"),
    ]);
    let engine = fixture.engine();

    let response = engine
        .get_structure(&StructureRequest {
            path: "src".to_string(),
            token_budget: 4_000,
            symbols_per_file: 10,
            include_signatures: true,
            include_trace: false,
        })
        .unwrap();

    let paths: Vec<&str> = response.files.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(paths, vec!["src/a.py", "src/b.py"]);
    assert!(response.tokens_used <= response.token_budget);
    assert!(
        response.files[0]
            .symbols
            .iter()
            .any(|s| s.signature.is_some())
    );
}

#[test]
fn cross_language_fixture_indexes_all_four() {
    let fixture = index_fixture(&[
        ("py/app.py", "def run():\n    pass\n"),
        ("ts/app.ts", "export function run(): void {}\n"),
        (
            "java/App.java",
            "package app;\npublic class App {\n  public void run() {}\n}\n",
        ),
        ("go/app.go", "package app\n\nfunc Run() {}\n"),
    ]);
    assert_eq!(fixture.stats.files_indexed, 4);

    let engine = fixture.engine();
    let response = engine.search_symbols(&search_request("run")).unwrap();
    let files: Vec<&str> = response
        .results
        .iter()
        .map(|r| r.symbol.file_path.as_str())
        .collect();
    for expected in ["py/app.py", "ts/app.ts", "java/App.java", "go/app.go"] {
        assert!(files.contains(&expected), "{expected} missing in {files:?}");
    }
}
