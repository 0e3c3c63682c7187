//! Blocking-flow capacity computation over an SPF predecessor DAG (§4.4).
//!
//! Both placement strategies only ever route flow along edges present in
//! the `pred` map handed in by the caller (normally straight from
//! [`super::spf::spf`]) — an edge that exists in `graph` but not in `pred`
//! is invisible to capacity computation, exactly as the specification's
//! "must be a DAG on the relevant subgraph" framing requires.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::error::{GraphError, GraphResult};
use crate::flow_index::FlowIndex;
use crate::graph::{EdgeId, StrictMultiDiGraph};

use super::spf::PredMap;

/// How a placed flow is split across parallel equal-cost paths/edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum FlowPlacement {
    /// Maximizes total throughput via blocking-flow (Dinic) augmentation;
    /// parallel paths may carry unequal shares.
    Proportional,
    /// Splits flow evenly at every branching node, then scales the whole
    /// placement down to the tightest bottleneck ratio.
    EqualBalanced,
}

/// `u -> [(v, [edge_id])]`, the forward view of a `pred` map (which is
/// naturally indexed by destination node).
fn forward_adjacency(pred: &PredMap) -> HashMap<String, Vec<(String, Vec<EdgeId>)>> {
    let mut fwd: HashMap<String, Vec<(String, Vec<EdgeId>)>> = HashMap::new();
    for (v, preds) in pred {
        for (u, edges) in preds {
            if edges.is_empty() {
                continue;
            }
            fwd.entry(u.clone()).or_default().push((v.clone(), edges.clone()));
        }
    }
    fwd
}

fn record_edge_flow(graph: &mut StrictMultiDiGraph, id: EdgeId, amount: f64, flow_index: &FlowIndex) {
    let edge = graph.get_edge_attr_mut(id).expect("edge id came from the caller's own pred map");
    edge.flow += amount;
    *edge.flows.entry(flow_index.clone()).or_insert(0.0) += amount;
}

fn record_node_flow(graph: &mut StrictMultiDiGraph, node: &str, amount: f64, flow_index: &FlowIndex) {
    let data = graph.get_node_attr_mut(node).expect("node came from the caller's own pred map");
    data.flow += amount;
    *data.flows.entry(flow_index.clone()).or_insert(0.0) += amount;
}

/// Places up to `requested` units of flow from `src` to `dst` along the
/// edges named in `pred`, using `placement`, mutating `graph`'s per-edge and
/// per-node flow bookkeeping under `flow_index`. Returns the amount
/// actually placed, which is `<= requested` and may be `0.0` if `dst` is
/// unreachable (absent from `pred`) even though both nodes exist.
///
/// Errors with `InvalidArgument` if `src == dst` or if either node is absent
/// from `graph` — per §4.4, these are degenerate inputs, not zero-flow
/// results.
pub fn calc_graph_capacity(
    graph: &mut StrictMultiDiGraph,
    pred: &PredMap,
    src: &str,
    dst: &str,
    placement: FlowPlacement,
    requested: f64,
    flow_index: &FlowIndex,
) -> GraphResult<f64> {
    if src == dst {
        return Err(GraphError::invalid_argument(format!("calc_graph_capacity: src and dst are both '{src}'")).with_context("node", src));
    }
    if !graph.has_node(src) {
        return Err(GraphError::invalid_argument(format!("calc_graph_capacity: source node '{src}' does not exist")).with_context("node", src));
    }
    if !graph.has_node(dst) {
        return Err(GraphError::invalid_argument(format!("calc_graph_capacity: destination node '{dst}' does not exist")).with_context("node", dst));
    }
    if requested <= 0.0 || !pred.contains_key(dst) {
        return Ok(0.0);
    }

    let fwd = forward_adjacency(pred);

    let placed = match placement {
        FlowPlacement::Proportional => dinic(graph, &fwd, src, dst, requested, flow_index),
        FlowPlacement::EqualBalanced => equal_balanced(graph, &fwd, src, dst, requested, flow_index),
    };
    tracing::debug!(src, dst, ?placement, requested, placed, "calc_graph_capacity: placed");
    Ok(placed)
}

// --- PROPORTIONAL: Dinic blocking flow, restricted to `fwd` -----------------

type Fwd = HashMap<String, Vec<(String, Vec<EdgeId>)>>;

fn bfs_levels(graph: &StrictMultiDiGraph, fwd: &Fwd, src: &str, dst: &str) -> Option<HashMap<String, u32>> {
    let mut level = HashMap::new();
    level.insert(src.to_string(), 0u32);
    let mut queue = VecDeque::new();
    queue.push_back(src.to_string());

    while let Some(u) = queue.pop_front() {
        let lu = level[&u];
        let Some(edges) = fwd.get(&u) else { continue };
        for (v, ids) in edges {
            if level.contains_key(v) {
                continue;
            }
            let has_residual = ids.iter().any(|id| graph.get_edge_attr(*id).map(|e| e.residual() > 1e-12).unwrap_or(false));
            if has_residual {
                level.insert(v.clone(), lu + 1);
                queue.push_back(v.clone());
            }
        }
    }

    if level.contains_key(dst) {
        Some(level)
    } else {
        None
    }
}

fn dfs_blocking(
    graph: &mut StrictMultiDiGraph,
    fwd: &Fwd,
    u: &str,
    dst: &str,
    pushed: f64,
    level: &HashMap<String, u32>,
    iter_pos: &mut HashMap<String, usize>,
    flow_index: &FlowIndex,
) -> f64 {
    if u == dst || pushed <= 0.0 {
        return pushed;
    }

    let Some(neighbors) = fwd.get(u) else { return 0.0 };
    let start = *iter_pos.get(u).unwrap_or(&0);

    for idx in start..neighbors.len() {
        let (v, ids) = &neighbors[idx];
        if level.get(v.as_str()) != Some(&(level[u] + 1)) {
            continue;
        }
        for &id in ids {
            let residual = graph.get_edge_attr(id).map(|e| e.residual()).unwrap_or(0.0);
            if residual <= 1e-12 {
                continue;
            }
            let try_push = pushed.min(residual);
            let got = dfs_blocking(graph, fwd, v, dst, try_push, level, iter_pos, flow_index);
            if got > 1e-12 {
                record_edge_flow(graph, id, got, flow_index);
                record_node_flow(graph, v, got, flow_index);
                iter_pos.insert(u.to_string(), idx);
                return got;
            }
        }
    }

    iter_pos.insert(u.to_string(), neighbors.len());
    0.0
}

fn dinic(graph: &mut StrictMultiDiGraph, fwd: &Fwd, src: &str, dst: &str, requested: f64, flow_index: &FlowIndex) -> f64 {
    let mut placed = 0.0;
    let mut phase = 0u32;

    while placed < requested - 1e-12 {
        let Some(level) = bfs_levels(graph, fwd, src, dst) else {
            break;
        };
        phase += 1;
        tracing::trace!(src, dst, phase, placed, "dinic: blocking-flow phase");

        let mut iter_pos: HashMap<String, usize> = HashMap::new();
        loop {
            let want = requested - placed;
            if want <= 1e-12 {
                break;
            }
            let got = dfs_blocking(graph, fwd, src, dst, want, &level, &mut iter_pos, flow_index);
            if got <= 1e-12 {
                break;
            }
            placed += got;
        }
    }

    placed
}

// --- EQUAL_BALANCED: equal-split propagation with capacity-scale clamping -

fn equal_balanced(graph: &mut StrictMultiDiGraph, fwd: &Fwd, src: &str, dst: &str, requested: f64, flow_index: &FlowIndex) -> f64 {
    // `fwd`'s keys come from a `pred` map, which is acyclic by construction
    // (SPF never records a predecessor edge that would close a cycle), so a
    // plain BFS visitation order already is a valid topological order.
    let mut node_frac: HashMap<String, f64> = HashMap::new();
    node_frac.insert(src.to_string(), 1.0);
    let mut edge_frac: HashMap<EdgeId, f64> = HashMap::new();

    let mut queue = VecDeque::new();
    queue.push_back(src.to_string());
    let mut visited = HashSet::new();

    while let Some(u) = queue.pop_front() {
        if !visited.insert(u.clone()) {
            continue;
        }
        let inflow = *node_frac.get(&u).unwrap_or(&0.0);
        let Some(neighbors) = fwd.get(&u) else { continue };

        // Two-level split: first equally across distinct neighbor bundles
        // that still have residual capacity, then equally across the
        // parallel edges within each bundle — a bundle of 2 parallel edges
        // to one neighbor and a single edge to another neighbor each get
        // half of `inflow`, not a three-way 1/3 split over all three edges.
        let live_bundles: Vec<(&String, Vec<EdgeId>)> = neighbors
            .iter()
            .map(|(v, ids)| {
                let live: Vec<EdgeId> = ids.iter().copied().filter(|id| graph.get_edge_attr(*id).map(|e| e.residual() > 1e-12).unwrap_or(false)).collect();
                (v, live)
            })
            .filter(|(_, live)| !live.is_empty())
            .collect();

        if inflow > 0.0 && !live_bundles.is_empty() {
            let bundle_share = inflow / live_bundles.len() as f64;
            for (v, live) in &live_bundles {
                let edge_share = bundle_share / live.len() as f64;
                for id in live {
                    *edge_frac.entry(*id).or_insert(0.0) += edge_share;
                }
                *node_frac.entry((*v).clone()).or_insert(0.0) += bundle_share;
            }
        }

        for (v, _) in neighbors {
            if !visited.contains(v) {
                queue.push_back(v.clone());
            }
        }
    }

    let dst_frac = *node_frac.get(dst).unwrap_or(&0.0);
    if dst_frac <= 1e-12 {
        return 0.0;
    }

    let mut bottleneck = f64::INFINITY;
    for (&id, &frac) in &edge_frac {
        if frac <= 1e-12 {
            continue;
        }
        let residual = graph.get_edge_attr(id).unwrap().residual();
        bottleneck = bottleneck.min(residual / frac);
    }

    let total = (bottleneck * dst_frac).min(requested).max(0.0);
    if total <= 1e-12 {
        return 0.0;
    }

    let scale = total / dst_frac;
    for (&id, &frac) in &edge_frac {
        let amount = frac * scale;
        if amount <= 1e-12 {
            continue;
        }
        let target = graph.get_edge_attr(id).unwrap().target.clone();
        record_edge_flow(graph, id, amount, flow_index);
        record_node_flow(graph, &target, amount, flow_index);
    }

    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::spf::{spf, EdgeSelect};
    use crate::attrs::AttrMap;

    fn flow_idx() -> FlowIndex {
        FlowIndex::new("A", "D", "default", 0)
    }

    fn diamond(cap_ab: f64, cap_ac: f64) -> StrictMultiDiGraph {
        let mut g = StrictMultiDiGraph::new();
        for n in ["A", "B", "C", "D"] {
            g.add_node(n, AttrMap::new()).unwrap();
        }
        g.add_edge("A", "B", None, 1.0, cap_ab, AttrMap::new()).unwrap();
        g.add_edge("A", "C", None, 1.0, cap_ac, AttrMap::new()).unwrap();
        g.add_edge("B", "D", None, 1.0, 10.0, AttrMap::new()).unwrap();
        g.add_edge("C", "D", None, 1.0, 10.0, AttrMap::new()).unwrap();
        g
    }

    #[test]
    fn proportional_finds_max_flow_across_two_paths() {
        let mut g = diamond(5.0, 5.0);
        let (_, pred) = spf(&g, "A", &EdgeSelect::AllMinCostWithCapRemaining, true, &HashSet::new(), &HashSet::new(), None).unwrap();
        let placed = calc_graph_capacity(&mut g, &pred, "A", "D", FlowPlacement::Proportional, f64::INFINITY, &flow_idx()).unwrap();
        assert_eq!(placed, 10.0);
    }

    #[test]
    fn proportional_respects_requested_cap() {
        let mut g = StrictMultiDiGraph::new();
        for n in ["A", "B"] {
            g.add_node(n, AttrMap::new()).unwrap();
        }
        g.add_edge("A", "B", None, 1.0, 100.0, AttrMap::new()).unwrap();
        let (_, pred) = spf(&g, "A", &EdgeSelect::AllMinCostWithCapRemaining, true, &HashSet::new(), &HashSet::new(), None).unwrap();
        let placed = calc_graph_capacity(&mut g, &pred, "A", "B", FlowPlacement::Proportional, 7.0, &flow_idx()).unwrap();
        assert_eq!(placed, 7.0);
    }

    #[test]
    fn equal_balanced_clamps_to_tightest_branch() {
        let mut g = diamond(10.0, 1.0);
        let (_, pred) = spf(&g, "A", &EdgeSelect::AllMinCostWithCapRemaining, true, &HashSet::new(), &HashSet::new(), None).unwrap();
        let placed = calc_graph_capacity(&mut g, &pred, "A", "D", FlowPlacement::EqualBalanced, f64::INFINITY, &flow_idx()).unwrap();
        // equal split sends half down each branch; the A->C branch caps at
        // 1.0, so total throughput clamps to 2.0 even though B->D has
        // headroom to spare.
        assert_eq!(placed, 2.0);
    }

    #[test]
    fn equal_balanced_splits_per_bundle_not_per_edge() {
        // A has a 2-edge bundle to B and a single edge to C, and both
        // branches rejoin at D. The A->C edge must get half of A's inflow
        // (one of two bundles), not a third (one of three raw edges).
        let mut g = StrictMultiDiGraph::new();
        for n in ["A", "B", "C", "D"] {
            g.add_node(n, AttrMap::new()).unwrap();
        }
        let ab1 = g.add_edge("A", "B", None, 1.0, 100.0, AttrMap::new()).unwrap();
        let ab2 = g.add_edge("A", "B", None, 1.0, 100.0, AttrMap::new()).unwrap();
        let ac = g.add_edge("A", "C", None, 1.0, 100.0, AttrMap::new()).unwrap();
        g.add_edge("B", "D", None, 1.0, 100.0, AttrMap::new()).unwrap();
        g.add_edge("C", "D", None, 1.0, 100.0, AttrMap::new()).unwrap();

        let (_, pred) = spf(&g, "A", &EdgeSelect::AllMinCostWithCapRemaining, true, &HashSet::new(), &HashSet::new(), None).unwrap();
        let placed = calc_graph_capacity(&mut g, &pred, "A", "D", FlowPlacement::EqualBalanced, f64::INFINITY, &flow_idx()).unwrap();

        assert_eq!(placed, 200.0);
        assert_eq!(g.get_edge_attr(ac).unwrap().flow, 100.0);
        assert_eq!(g.get_edge_attr(ab1).unwrap().flow, 50.0);
        assert_eq!(g.get_edge_attr(ab2).unwrap().flow, 50.0);
    }

    #[test]
    fn unreachable_destination_places_nothing() {
        let mut g = StrictMultiDiGraph::new();
        g.add_node("A", AttrMap::new()).unwrap();
        g.add_node("Z", AttrMap::new()).unwrap();
        let (_, pred) = spf(&g, "A", &EdgeSelect::AllMinCostWithCapRemaining, true, &HashSet::new(), &HashSet::new(), None).unwrap();
        let placed = calc_graph_capacity(&mut g, &pred, "A", "Z", FlowPlacement::Proportional, f64::INFINITY, &flow_idx()).unwrap();
        assert_eq!(placed, 0.0);
    }

    #[test]
    fn src_equals_dst_is_invalid_argument() {
        let mut g = StrictMultiDiGraph::new();
        g.add_node("A", AttrMap::new()).unwrap();
        let pred = PredMap::new();
        let err = calc_graph_capacity(&mut g, &pred, "A", "A", FlowPlacement::Proportional, 5.0, &flow_idx()).unwrap_err();
        assert!(matches!(err, GraphError::InvalidArgument { .. }));
    }

    #[test]
    fn absent_node_is_invalid_argument() {
        let mut g = StrictMultiDiGraph::new();
        g.add_node("A", AttrMap::new()).unwrap();
        let pred = PredMap::new();
        let err = calc_graph_capacity(&mut g, &pred, "A", "ghost", FlowPlacement::Proportional, 5.0, &flow_idx()).unwrap_err();
        assert!(matches!(err, GraphError::InvalidArgument { .. }));
    }
}
