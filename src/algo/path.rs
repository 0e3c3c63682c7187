//! Path reconstruction from SPF predecessor maps (§4.3 "Path resolution").

use std::collections::HashSet;

use crate::graph::EdgeId;

use super::spf::PredMap;

/// A single path expressed as `(node, [edge_id taken to reach the *next*
/// node])` pairs, terminating with an empty edge list at the destination.
pub type PathTuple = Vec<(String, Vec<EdgeId>)>;

/// All paths between a fixed `(src, dst)` pair, eagerly expanded from a
/// predecessor map into node sequences, flat edge lists, and edge tuples so
/// callers don't re-walk the DAG for each representation.
#[derive(Debug, Clone, Default)]
pub struct PathBundle {
    pub src: String,
    pub dst: String,
    pub cost: f64,
    /// Each element is one src->dst node sequence.
    pub nodes: Vec<Vec<String>>,
    /// Each element is the ordered `[edge_id]` sequence for that same path.
    pub edges: Vec<Vec<EdgeId>>,
    pub edge_tuples: Vec<PathTuple>,
}

impl PathBundle {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Walks `pred` backward from `dst` to `src`, enumerating every combination
/// of equal-cost predecessor edges. When `split_parallel_edges` is set, a
/// predecessor step with `k` parallel edges is expanded into `k` distinct
/// paths rather than being collapsed into a single tuple carrying all `k`
/// ids.
pub fn resolve_to_paths(
    pred: &PredMap,
    src: &str,
    dst: &str,
    cost: f64,
    split_parallel_edges: bool,
) -> PathBundle {
    let mut bundle = PathBundle {
        src: src.to_string(),
        dst: dst.to_string(),
        cost,
        ..Default::default()
    };

    if src == dst {
        bundle.nodes.push(vec![src.to_string()]);
        bundle.edges.push(Vec::new());
        bundle.edge_tuples.push(vec![(src.to_string(), Vec::new())]);
        return bundle;
    }

    if !pred.contains_key(dst) {
        return bundle;
    }

    let mut visiting = HashSet::new();
    let sequences = node_sequences(pred, src, dst, split_parallel_edges, &mut visiting);

    for seq in sequences {
        let nodes: Vec<String> = seq.iter().map(|(n, _)| n.clone()).collect();
        let edges: Vec<EdgeId> = seq.iter().flat_map(|(_, e)| e.iter().copied()).collect();
        bundle.nodes.push(nodes);
        bundle.edges.push(edges);
        bundle.edge_tuples.push(seq);
    }

    bundle
}

/// Returns every `src -> ... -> dst` sequence as a list of `(node,
/// [edge_id to next node])` pairs, recursing backward through `pred`.
fn node_sequences(
    pred: &PredMap,
    src: &str,
    node: &str,
    split_parallel_edges: bool,
    visiting: &mut HashSet<String>,
) -> Vec<PathTuple> {
    if node == src {
        return vec![vec![(src.to_string(), Vec::new())]];
    }

    let Some(preds) = pred.get(node) else {
        return Vec::new();
    };

    if !visiting.insert(node.to_string()) {
        // defensive: predecessor maps from SPF are acyclic by construction.
        return Vec::new();
    }

    let mut out = Vec::new();
    for (prev, edge_ids) in preds {
        let prefixes = node_sequences(pred, src, prev, split_parallel_edges, visiting);

        let edge_groups: Vec<Vec<EdgeId>> = if split_parallel_edges {
            edge_ids.iter().map(|id| vec![*id]).collect()
        } else {
            vec![edge_ids.clone()]
        };

        for prefix in &prefixes {
            for group in &edge_groups {
                let mut full = prefix.clone();
                if let Some(last) = full.last_mut() {
                    last.1 = group.clone();
                }
                full.push((node.to_string(), Vec::new()));
                out.push(full);
            }
        }
    }

    visiting.remove(node);
    out
}
