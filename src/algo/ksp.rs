//! Yen-like k-shortest (simple) paths (§4.3 "K-shortest paths").

use std::collections::HashSet;

use crate::error::GraphResult;
use crate::graph::{EdgeId, StrictMultiDiGraph};

use super::path::{resolve_to_paths, PathTuple};
use super::spf::{spf, EdgeSelect};

/// One candidate/result path: total cost plus its node/edge tuple sequence.
#[derive(Debug, Clone)]
pub struct KspPath {
    pub cost: f64,
    pub tuple: PathTuple,
}

/// KSP always resolves one edge per hop, even if `edge_select` is an
/// `AllMinCost*` variant tying several parallel edges — deviation and
/// loopless-ness are defined over a fixed sequence of edges, so ties are
/// broken the same deterministic way [`EdgeSelect::SingleMinCost`] does.
fn to_single(edge_select: &EdgeSelect) -> EdgeSelect {
    match edge_select {
        EdgeSelect::AllMinCost | EdgeSelect::SingleMinCost => EdgeSelect::SingleMinCost,
        EdgeSelect::AllMinCostWithCapRemaining | EdgeSelect::SingleMinCostWithCapRemaining => {
            EdgeSelect::SingleMinCostWithCapRemaining
        }
        other @ EdgeSelect::UserDefined(_) => other.clone(),
    }
}

fn single_path(
    graph: &StrictMultiDiGraph,
    src: &str,
    dst: &str,
    edge_select: &EdgeSelect,
    excluded_edges: &HashSet<EdgeId>,
    excluded_nodes: &HashSet<String>,
) -> GraphResult<Option<KspPath>> {
    let (costs, pred) = spf(graph, src, edge_select, false, excluded_edges, excluded_nodes, Some(dst))?;
    let Some(&cost) = costs.get(dst) else {
        return Ok(None);
    };
    let bundle = resolve_to_paths(&pred, src, dst, cost, false);
    Ok(bundle.edge_tuples.into_iter().next().map(|tuple| KspPath { cost, tuple }))
}

fn tuple_nodes(tuple: &PathTuple) -> Vec<&str> {
    tuple.iter().map(|(n, _)| n.as_str()).collect()
}

/// Computes up to `max_k` shortest loopless paths from `src` to `dst`.
///
/// `max_path_cost` caps absolute path cost; `max_path_cost_factor`, if
/// `max_path_cost` is absent, caps cost at `factor * cost(first path)`.
/// Candidates exceeding the active cap are dropped rather than returned.
pub fn ksp(
    graph: &StrictMultiDiGraph,
    src: &str,
    dst: &str,
    edge_select: &EdgeSelect,
    max_k: Option<usize>,
    max_path_cost: Option<f64>,
    max_path_cost_factor: Option<f64>,
) -> GraphResult<Vec<KspPath>> {
    let edge_select = to_single(edge_select);
    let empty_edges = HashSet::new();
    let empty_nodes = HashSet::new();

    let Some(first) = single_path(graph, src, dst, &edge_select, &empty_edges, &empty_nodes)? else {
        return Ok(Vec::new());
    };

    let cap = max_path_cost.or_else(|| max_path_cost_factor.map(|f| first.cost * f));

    let mut found: Vec<KspPath> = vec![first];
    let mut candidates: Vec<KspPath> = Vec::new();
    let max_k = max_k.unwrap_or(usize::MAX);

    while found.len() < max_k {
        let prev = &found[found.len() - 1];
        let prev_nodes = tuple_nodes(&prev.tuple);

        for i in 0..prev_nodes.len().saturating_sub(1) {
            let spur_node = prev_nodes[i];
            let root_nodes: Vec<&str> = prev_nodes[..=i].to_vec();

            let mut excluded_edges: HashSet<EdgeId> = HashSet::new();
            for path in found.iter().chain(candidates.iter()) {
                let nodes = tuple_nodes(&path.tuple);
                if nodes.len() > i && nodes[..=i] == root_nodes[..] {
                    excluded_edges.extend(path.tuple[i].1.iter().copied());
                }
            }

            let excluded_nodes: HashSet<String> =
                root_nodes[..i].iter().map(|s| s.to_string()).collect();

            let Some(spur) = single_path(graph, spur_node, dst, &edge_select, &excluded_edges, &excluded_nodes)? else {
                continue;
            };

            let root_cost: f64 = root_nodes[..i]
                .iter()
                .enumerate()
                .map(|(idx, _)| {
                    let ids = &prev.tuple[idx].1;
                    ids.first()
                        .and_then(|id| graph.get_edge_attr(*id).ok())
                        .map(|e| e.cost)
                        .unwrap_or(0.0)
                })
                .sum();

            let mut tuple: PathTuple = prev.tuple[..i].to_vec();
            tuple.extend(spur.tuple);
            let total_cost = root_cost + spur.cost;

            let node_seq = tuple_nodes(&tuple);
            let already_known = found.iter().chain(candidates.iter()).any(|p| tuple_nodes(&p.tuple) == node_seq);
            if already_known {
                continue;
            }
            if let Some(cap) = cap {
                if total_cost > cap {
                    continue;
                }
            }

            candidates.push(KspPath { cost: total_cost, tuple });
        }

        candidates.sort_by(|a, b| a.cost.partial_cmp(&b.cost).unwrap());
        let Some(next) = candidates.first() else {
            break;
        };
        let next = candidates.remove(0);
        found.push(next);
    }

    Ok(found)
}
