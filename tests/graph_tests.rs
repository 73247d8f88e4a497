//! Graph Utility Tests
//!
//! Tests for:
//! - topo_sort: Kahn ordering, insertion-order tie breaking, cycle detection
//! - validate_pipeline: exhaustive structural issue reporting
//! - upstream_nodes / downstream_nodes: traversal order and exclusions

use pipemagic::errors::ValidationIssue;
use pipemagic::graph::{downstream_nodes, topo_sort, upstream_nodes, validate_pipeline};
use pipemagic::pipeline::{EdgeDef, NodeDef, NodeKind};

fn node(id: &str, kind: NodeKind) -> NodeDef {
    NodeDef::new(id, kind)
}

fn edge(id: &str, source: &str, target: &str) -> EdgeDef {
    EdgeDef::new(id, source, target)
}

fn has_message(issues: &[ValidationIssue], fragment: &str) -> bool {
    issues.iter().any(|i| i.message.contains(fragment))
}

// ============================================================================
// topo_sort
// ============================================================================

#[test]
fn topo_sort_orders_every_edge_forward() {
    // Diamond: in -> (a, b) -> out
    let nodes = vec![
        node("in", NodeKind::Input),
        node("a", NodeKind::Normalize),
        node("b", NodeKind::Outline),
        node("out", NodeKind::Output),
    ];
    let edges = vec![
        edge("e1", "in", "a"),
        edge("e2", "in", "b"),
        edge("e3", "a", "out"),
        edge("e4", "b", "out"),
    ];

    let order = topo_sort(&nodes, &edges).unwrap();
    assert_eq!(order.len(), nodes.len());

    let index = |id: &str| order.iter().position(|n| n == id).unwrap();
    for e in &edges {
        assert!(
            index(&e.source) < index(&e.target),
            "edge {} must point forward in the order",
            e.id
        );
    }
}

#[test]
fn topo_sort_breaks_ties_by_insertion_order() {
    // Two independent chains; sources tie at zero in-degree.
    let nodes = vec![
        node("first", NodeKind::Input),
        node("second", NodeKind::Input),
        node("sink", NodeKind::Output),
    ];
    let edges = vec![edge("e1", "first", "sink"), edge("e2", "second", "sink")];

    let order = topo_sort(&nodes, &edges).unwrap();
    assert_eq!(order, vec!["first", "second", "sink"]);
}

#[test]
fn topo_sort_rejects_cycle() {
    let nodes = vec![node("a", NodeKind::Normalize), node("b", NodeKind::Outline)];
    let edges = vec![edge("e1", "a", "b"), edge("e2", "b", "a")];

    let err = topo_sort(&nodes, &edges).unwrap_err();
    assert_eq!(err.remaining.len(), 2);
}

#[test]
fn topo_sort_ignores_edges_to_unknown_nodes() {
    let nodes = vec![node("in", NodeKind::Input), node("out", NodeKind::Output)];
    let edges = vec![edge("e1", "in", "out"), edge("e2", "ghost", "out")];

    let order = topo_sort(&nodes, &edges).unwrap();
    assert_eq!(order, vec!["in", "out"]);
}

// ============================================================================
// validate_pipeline
// ============================================================================

#[test]
fn validate_reports_missing_input_and_output() {
    let nodes = vec![node("a", NodeKind::Normalize)];
    let issues = validate_pipeline(&nodes, &[]);

    assert!(has_message(&issues, "no input node"));
    assert!(has_message(&issues, "no output node"));
}

#[test]
fn validate_reports_cycle() {
    let nodes = vec![
        node("in", NodeKind::Input),
        node("a", NodeKind::Normalize),
        node("b", NodeKind::Outline),
        node("out", NodeKind::Output),
    ];
    let edges = vec![
        edge("e1", "in", "a"),
        edge("e2", "a", "b"),
        edge("e3", "b", "a"),
        edge("e4", "b", "out"),
    ];

    let issues = validate_pipeline(&nodes, &edges);
    assert!(has_message(&issues, "contains a cycle"));
}

#[test]
fn validate_reports_all_issues_without_failing_fast() {
    // No input, no output, and a dangling processing node: at least three
    // distinct problems must all be present.
    let nodes = vec![node("lonely", NodeKind::Outline)];
    let issues = validate_pipeline(&nodes, &[]);

    assert!(issues.len() >= 3, "expected several issues, got {issues:?}");
    assert!(has_message(&issues, "no incoming connection"));
    assert!(has_message(&issues, "no outgoing connection"));
}

#[test]
fn validate_reports_unconnected_input_and_output() {
    let nodes = vec![node("in", NodeKind::Input), node("out", NodeKind::Output)];
    let issues = validate_pipeline(&nodes, &[]);

    assert!(has_message(&issues, "not connected"));
    assert!(has_message(&issues, "no incoming connection"));
}

#[test]
fn validate_reports_unknown_edge_endpoints() {
    let nodes = vec![node("in", NodeKind::Input), node("out", NodeKind::Output)];
    let edges = vec![edge("e1", "in", "out"), edge("e2", "in", "ghost")];

    let issues = validate_pipeline(&nodes, &edges);
    assert!(has_message(&issues, "unknown target node ghost"));
}

#[test]
fn validate_accepts_minimal_pipeline() {
    let nodes = vec![node("in", NodeKind::Input), node("out", NodeKind::Output)];
    let edges = vec![edge("e1", "in", "out")];

    let issues = validate_pipeline(&nodes, &edges);
    assert!(issues.is_empty(), "unexpected issues: {issues:?}");
}

#[test]
fn validate_reports_duplicate_producer_for_same_slot() {
    let nodes = vec![
        node("in", NodeKind::Input),
        node("in2", NodeKind::Input),
        node("out", NodeKind::Output),
    ];
    let edges = vec![edge("e1", "in", "out"), edge("e2", "in2", "out")];

    let issues = validate_pipeline(&nodes, &edges);
    assert!(has_message(&issues, "more than one edge"));
}

// ============================================================================
// Traversal
// ============================================================================

#[test]
fn upstream_nodes_follow_edge_insertion_order() {
    let edges = vec![
        edge("e1", "b", "sink"),
        edge("e2", "a", "sink"),
        edge("e3", "c", "sink"),
    ];

    assert_eq!(upstream_nodes("sink", &edges), vec!["b", "a", "c"]);
}

#[test]
fn downstream_nodes_bfs_excludes_seed() {
    let edges = vec![
        edge("e1", "a", "b"),
        edge("e2", "b", "c"),
        edge("e3", "a", "d"),
        edge("e4", "d", "c"),
    ];

    let down = downstream_nodes("a", &edges);
    assert!(!down.contains(&"a".to_string()));
    assert_eq!(down.len(), 3);
    // BFS: direct successors first.
    assert_eq!(&down[..2], &["b".to_string(), "d".to_string()]);
}

#[test]
fn downstream_nodes_empty_for_sink() {
    let edges = vec![edge("e1", "a", "b")];
    assert!(downstream_nodes("b", &edges).is_empty());
}
