//! Upstream / downstream traversal.

use rustc_hash::FxHashSet;

use crate::pipeline::{EdgeDef, NodeId};

/// Direct producers of `node_id`, in edge insertion order.
///
/// Insertion order matters: the scheduler gathers input frames in this order,
/// and swapping two inputs must change downstream cache keys.
#[must_use]
pub fn upstream_nodes(node_id: &str, edges: &[EdgeDef]) -> Vec<NodeId> {
    edges
        .iter()
        .filter(|e| e.target == node_id)
        .map(|e| e.source.clone())
        .collect()
}

/// Every node reachable from `node_id` following edge direction, excluding
/// the seed itself. BFS order.
///
/// Editors use this to clear cached outputs transitively after a parameter
/// edit.
#[must_use]
pub fn downstream_nodes(node_id: &str, edges: &[EdgeDef]) -> Vec<NodeId> {
    let mut visited: FxHashSet<&str> = FxHashSet::default();
    let mut queue: std::collections::VecDeque<&str> = std::collections::VecDeque::new();
    let mut result = Vec::new();

    queue.push_back(node_id);
    visited.insert(node_id);

    while let Some(current) = queue.pop_front() {
        for edge in edges.iter().filter(|e| e.source == current) {
            let target = edge.target.as_str();
            if visited.insert(target) {
                result.push(target.to_string());
                queue.push_back(target);
            }
        }
    }

    result
}
