// Incremental indexing semantics: stable ids, edge re-resolution, renames.

use super::helpers::index_fixture;
use crate::pipeline::Changeset;
use crate::query::references::{Direction, ReferencesRequest};

#[test]
fn touching_one_file_leaves_other_ids_alone() {
    let mut fixture = index_fixture(&[
        ("a.py", "from b import g\n\ndef f():\n    g()\n"),
        ("b.py", "def g():\n    return 1\n"),
    ]);

    let a_ids_before: Vec<(i64, String)> = {
        let store = fixture.store.lock().unwrap();
        store
            .symbols_for_file("a.py")
            .unwrap()
            .iter()
            .map(|s| (s.id, s.qualified_name.clone()))
            .collect()
    };

    // touch b.py only: g gains a helper
    fixture.write("b.py", "def g():\n    return helper()\n\n\ndef helper():\n    return 1\n");
    let stats = fixture.incremental(&Changeset {
        modified: vec!["b.py".to_string()],
        ..Default::default()
    });
    assert_eq!(stats.files_indexed, 1, "exactly b.py was replaced");

    let store = fixture.store.lock().unwrap();
    let a_ids_after: Vec<(i64, String)> = store
        .symbols_for_file("a.py")
        .unwrap()
        .iter()
        .map(|s| (s.id, s.qualified_name.clone()))
        .collect();
    assert_eq!(a_ids_before, a_ids_after, "a.py symbol ids unchanged");

    // the CALLS edge from a.f to the new b.g was re-resolved and is present
    let f = store.symbol_by_qualified_name("a.f").unwrap().unwrap();
    let g = store.symbol_by_qualified_name("b.g").unwrap().unwrap();
    let callees = store
        .edges_from(&[f.id], &[crate::extractor::Relationship::Calls])
        .unwrap();
    assert_eq!(callees.len(), 1);
    assert_eq!(callees[0].target_id, g.id);
}

#[test]
fn deleting_a_file_removes_its_whole_graph() {
    let mut fixture = index_fixture(&[
        ("a.py", "from b import g\n\ndef f():\n    g()\n"),
        ("b.py", "def g():\n    return 1\n"),
    ]);

    fixture.remove("b.py");
    let stats = fixture.incremental(&Changeset {
        deleted: vec!["b.py".to_string()],
        ..Default::default()
    });
    assert_eq!(stats.files_deleted, 1);

    let store = fixture.store.lock().unwrap();
    assert!(store.file_by_path("b.py").unwrap().is_none());
    assert!(store.symbol_by_qualified_name("b.g").unwrap().is_none());
    assert_eq!(store.orphan_edge_count().unwrap(), 0);

    // a.f's call now resolves nowhere; its import is external
    let f = store.symbol_by_qualified_name("a.f").unwrap().unwrap();
    let callees = store
        .edges_from(&[f.id], &[crate::extractor::Relationship::Calls])
        .unwrap();
    assert!(callees.is_empty());
    let externals = store.external_deps_for_file("a.py").unwrap();
    assert_eq!(externals.len(), 1);
    assert_eq!(externals[0].module_name, "b");
}

#[test]
fn rename_round_trip_restores_qualified_names() {
    let mut fixture = index_fixture(&[("mod_a.py", "def f():\n    pass\n")]);

    let id_before = {
        let store = fixture.store.lock().unwrap();
        store.symbol_by_qualified_name("mod_a.f").unwrap().unwrap().id
    };

    // rename on disk, then tell the pipeline
    let root = fixture.dir.path().to_path_buf();
    std::fs::rename(root.join("mod_a.py"), root.join("mod_b.py")).unwrap();
    fixture.incremental(&Changeset {
        renamed: vec![("mod_a.py".to_string(), "mod_b.py".to_string())],
        ..Default::default()
    });

    {
        let store = fixture.store.lock().unwrap();
        let moved = store.symbol_by_qualified_name("mod_b.f").unwrap().unwrap();
        assert_eq!(moved.id, id_before, "rename preserves symbol ids");
        assert_eq!(moved.file_path, "mod_b.py");
        assert!(store.symbol_by_qualified_name("mod_a.f").unwrap().is_none());
    }

    // and back again
    std::fs::rename(root.join("mod_b.py"), root.join("mod_a.py")).unwrap();
    fixture.incremental(&Changeset {
        renamed: vec![("mod_b.py".to_string(), "mod_a.py".to_string())],
        ..Default::default()
    });

    let store = fixture.store.lock().unwrap();
    let restored = store.symbol_by_qualified_name("mod_a.f").unwrap().unwrap();
    assert_eq!(restored.id, id_before);
    assert_eq!(restored.file_path, "mod_a.py");
}

#[test]
fn added_file_becomes_reachable_in_queries() {
    let mut fixture = index_fixture(&[("a.py", "def f():\n    pass\n")]);

    fixture.write("c.py", "from a import f\n\ndef caller():\n    f()\n");
    fixture.incremental(&Changeset {
        added: vec!["c.py".to_string()],
        ..Default::default()
    });

    let engine = fixture.engine();
    let response = engine
        .get_references(&ReferencesRequest {
            symbol: "f".to_string(),
            direction: Direction::Callers,
            depth: 1,
            include_source: false,
            deadline_ms: None,
            include_trace: false,
        })
        .unwrap();
    let callers = &response.groups[0];
    assert_eq!(callers.items.len(), 1);
    assert_eq!(callers.items[0].symbol.qualified_name, "c.caller");
}
