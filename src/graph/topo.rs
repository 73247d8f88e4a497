//! Topological ordering (Kahn's algorithm).

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use crate::errors::CycleError;
use crate::pipeline::{EdgeDef, NodeDef, NodeId};

/// Orders nodes so that every edge points forward in the result.
///
/// Ties among zero-in-degree nodes are broken by node insertion order, which
/// keeps execution order stable across runs of the same pipeline.
///
/// # Errors
///
/// Returns [`CycleError`] when any node remains unordered (it participates
/// in, or depends on, a cycle). Edges referencing unknown node ids are
/// ignored here; [`validate_pipeline`](super::validate_pipeline) reports them.
pub fn topo_sort(nodes: &[NodeDef], edges: &[EdgeDef]) -> Result<Vec<NodeId>, CycleError> {
    let known: FxHashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();

    let mut in_degree: FxHashMap<&str, usize> =
        nodes.iter().map(|n| (n.id.as_str(), 0)).collect();
    let mut outgoing: FxHashMap<&str, SmallVec<[&str; 4]>> = FxHashMap::default();

    for edge in edges {
        if !known.contains(edge.source.as_str()) || !known.contains(edge.target.as_str()) {
            continue;
        }
        *in_degree.entry(edge.target.as_str()).or_default() += 1;
        outgoing
            .entry(edge.source.as_str())
            .or_default()
            .push(edge.target.as_str());
    }

    // Seed queue in node insertion order; pop from the front so that ties
    // are resolved deterministically.
    let mut queue: std::collections::VecDeque<&str> = nodes
        .iter()
        .filter(|n| in_degree[n.id.as_str()] == 0)
        .map(|n| n.id.as_str())
        .collect();

    let mut order = Vec::with_capacity(nodes.len());
    while let Some(id) = queue.pop_front() {
        order.push(id.to_string());
        if let Some(targets) = outgoing.get(id) {
            for &target in targets {
                let degree = in_degree
                    .get_mut(target)
                    .expect("edge targets were filtered against known nodes");
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(target);
                }
            }
        }
    }

    if order.len() == nodes.len() {
        Ok(order)
    } else {
        let ordered: FxHashSet<&str> = order.iter().map(String::as_str).collect();
        let remaining = nodes
            .iter()
            .filter(|n| !ordered.contains(n.id.as_str()))
            .map(|n| n.id.clone())
            .collect();
        Err(CycleError { remaining })
    }
}
