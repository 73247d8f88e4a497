//! Structural pipeline validation.

use rustc_hash::FxHashSet;

use crate::errors::ValidationIssue;
use crate::pipeline::{EdgeDef, NodeDef, NodeKind};

use super::topo::topo_sort;

/// Reports every structural problem in the pipeline. Does NOT fail fast;
/// the returned list is complete so the editor can surface all of them at
/// once.
///
/// Checks:
/// - at least one `input` and one `output` node exist
/// - the graph is acyclic
/// - edges reference existing node ids
/// - every `input` has an outgoing edge, every `output` an incoming one
/// - every processing node has both incoming and outgoing edges
/// - exactly one producer per `(target, targetHandle)` pair
#[must_use]
pub fn validate_pipeline(nodes: &[NodeDef], edges: &[EdgeDef]) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if !nodes.iter().any(|n| n.kind == NodeKind::Input) {
        issues.push(ValidationIssue::pipeline("Pipeline has no input node"));
    }
    if !nodes.iter().any(|n| n.kind == NodeKind::Output) {
        issues.push(ValidationIssue::pipeline("Pipeline has no output node"));
    }

    if topo_sort(nodes, edges).is_err() {
        issues.push(ValidationIssue::pipeline("Pipeline contains a cycle"));
    }

    let known: FxHashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
    for edge in edges {
        if !known.contains(edge.source.as_str()) {
            issues.push(ValidationIssue::pipeline(format!(
                "Edge {} references unknown source node {}",
                edge.id, edge.source
            )));
        }
        if !known.contains(edge.target.as_str()) {
            issues.push(ValidationIssue::pipeline(format!(
                "Edge {} references unknown target node {}",
                edge.id, edge.target
            )));
        }
    }

    // Duplicate producers for the same (target, targetHandle) slot.
    let mut slots: FxHashSet<(&str, &str)> = FxHashSet::default();
    for edge in edges {
        if !slots.insert((edge.target.as_str(), edge.target_handle.as_str())) {
            issues.push(ValidationIssue::node(
                edge.target.clone(),
                "Node input is driven by more than one edge",
            ));
        }
    }

    for node in nodes {
        let has_incoming = edges.iter().any(|e| e.target == node.id);
        let has_outgoing = edges.iter().any(|e| e.source == node.id);

        match node.kind {
            NodeKind::Input => {
                if !has_outgoing {
                    issues.push(ValidationIssue::node(
                        node.id.clone(),
                        "Input node is not connected to anything",
                    ));
                }
            }
            NodeKind::Output => {
                if !has_incoming {
                    issues.push(ValidationIssue::node(
                        node.id.clone(),
                        "Output node has no incoming connection",
                    ));
                }
            }
            _ => {
                if !has_incoming {
                    issues.push(ValidationIssue::node(
                        node.id.clone(),
                        "Node has no incoming connection",
                    ));
                }
                if !has_outgoing {
                    issues.push(ValidationIssue::node(
                        node.id.clone(),
                        "Node has no outgoing connection",
                    ));
                }
            }
        }
    }

    issues
}
