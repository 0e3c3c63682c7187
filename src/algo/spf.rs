//! SPF: a Dijkstra variant with pluggable edge selection and multipath
//! predecessor recording (§4.3).

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::{GraphError, GraphResult};
use crate::graph::{EdgeId, StrictMultiDiGraph};

/// A user-defined edge-selection closure: `(graph, u, v, edges, excl_edges,
/// excl_nodes) -> (cost, [edge_id])`. A returned cost of `f64::INFINITY`
/// means "no usable edge".
pub type UserSelectFn = Arc<
    dyn Fn(&StrictMultiDiGraph, &str, &str, &[EdgeId], &HashSet<EdgeId>, &HashSet<String>) -> (f64, Vec<EdgeId>)
        + Send
        + Sync,
>;

/// Edge-selection policy, applied per `(u, v)` parallel-edge bundle.
#[derive(Clone)]
pub enum EdgeSelect {
    /// All edges tied at the minimum cost.
    AllMinCost,
    /// As above, ignoring edges with no residual capacity.
    AllMinCostWithCapRemaining,
    /// One lowest-cost edge, tie-broken deterministically by edge id.
    SingleMinCost,
    /// As above, ignoring edges with no residual capacity.
    SingleMinCostWithCapRemaining,
    /// Caller-supplied selection function.
    UserDefined(UserSelectFn),
}

impl std::fmt::Debug for EdgeSelect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EdgeSelect::AllMinCost => write!(f, "AllMinCost"),
            EdgeSelect::AllMinCostWithCapRemaining => write!(f, "AllMinCostWithCapRemaining"),
            EdgeSelect::SingleMinCost => write!(f, "SingleMinCost"),
            EdgeSelect::SingleMinCostWithCapRemaining => write!(f, "SingleMinCostWithCapRemaining"),
            EdgeSelect::UserDefined(_) => write!(f, "UserDefined(..)"),
        }
    }
}

fn all_min_cost(graph: &StrictMultiDiGraph, edges: &[EdgeId], excluded_edges: &HashSet<EdgeId>, require_cap: bool) -> (f64, Vec<EdgeId>) {
    let mut min_cost = f64::INFINITY;
    let mut chosen = Vec::new();
    for &id in edges {
        if excluded_edges.contains(&id) {
            continue;
        }
        let edge = graph.get_edge_attr(id).expect("adjacency references a live edge");
        if require_cap && edge.residual() <= 0.0 {
            continue;
        }
        if edge.cost < min_cost {
            min_cost = edge.cost;
            chosen.clear();
            chosen.push(id);
        } else if edge.cost == min_cost {
            chosen.push(id);
        }
    }
    if chosen.is_empty() {
        (f64::INFINITY, Vec::new())
    } else {
        (min_cost, chosen)
    }
}

fn single_min_cost(graph: &StrictMultiDiGraph, edges: &[EdgeId], excluded_edges: &HashSet<EdgeId>, require_cap: bool) -> (f64, Vec<EdgeId>) {
    let mut best: Option<(f64, EdgeId)> = None;
    for &id in edges {
        if excluded_edges.contains(&id) {
            continue;
        }
        let edge = graph.get_edge_attr(id).expect("adjacency references a live edge");
        if require_cap && edge.residual() <= 0.0 {
            continue;
        }
        best = match best {
            None => Some((edge.cost, id)),
            Some((cost, bid)) if edge.cost < cost || (edge.cost == cost && id.0 < bid.0) => Some((edge.cost, id)),
            other => other,
        };
    }
    match best {
        Some((cost, id)) => (cost, vec![id]),
        None => (f64::INFINITY, Vec::new()),
    }
}

impl EdgeSelect {
    fn select(
        &self,
        graph: &StrictMultiDiGraph,
        u: &str,
        v: &str,
        edges: &[EdgeId],
        excluded_edges: &HashSet<EdgeId>,
        excluded_nodes: &HashSet<String>,
    ) -> (f64, Vec<EdgeId>) {
        match self {
            EdgeSelect::AllMinCost => all_min_cost(graph, edges, excluded_edges, false),
            EdgeSelect::AllMinCostWithCapRemaining => all_min_cost(graph, edges, excluded_edges, true),
            EdgeSelect::SingleMinCost => single_min_cost(graph, edges, excluded_edges, false),
            EdgeSelect::SingleMinCostWithCapRemaining => single_min_cost(graph, edges, excluded_edges, true),
            EdgeSelect::UserDefined(f) => f(graph, u, v, edges, excluded_edges, excluded_nodes),
        }
    }

    fn is_fast_pathable(&self) -> bool {
        matches!(self, EdgeSelect::AllMinCost | EdgeSelect::AllMinCostWithCapRemaining)
    }

    fn requires_cap_remaining(&self) -> bool {
        matches!(self, EdgeSelect::AllMinCostWithCapRemaining)
    }
}

/// Predecessor map: `v -> (u -> [edge_id])`, insertion-ordered per node.
pub type PredMap = HashMap<String, IndexMap<String, Vec<EdgeId>>>;

#[derive(Clone, Copy, PartialEq)]
struct HeapEntry(f64, u64);

impl Eq for HeapEntry {}
impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse for a min-heap via `BinaryHeap` (which is a max-heap).
        other.0.partial_cmp(&self.0).unwrap_or(Ordering::Equal).then(other.1.cmp(&self.1))
    }
}
impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Runs SPF from `src`. See module docs and §4.3 for the full contract.
///
/// When `excluded_edges`/`excluded_nodes` are both empty and `edge_select`
/// is one of the two `AllMinCost*` variants, the neighbor scan inlines the
/// per-edge comparison directly rather than going through
/// [`EdgeSelect::select`]'s dynamic-dispatch-shaped call, matching the
/// specified fast path (§4.3).
#[allow(clippy::too_many_arguments)]
pub fn spf(
    graph: &StrictMultiDiGraph,
    src: &str,
    edge_select: &EdgeSelect,
    multipath: bool,
    excluded_edges: &HashSet<EdgeId>,
    excluded_nodes: &HashSet<String>,
    dst: Option<&str>,
) -> GraphResult<(HashMap<String, f64>, PredMap)> {
    if !graph.has_node(src) {
        return Err(GraphError::unknown_entity(format!("SPF source '{src}' does not exist")).with_context("node", src));
    }

    tracing::debug!(src, ?dst, multipath, edge_select = ?edge_select, "spf: start");

    let mut costs: HashMap<String, f64> = HashMap::new();
    let mut pred: PredMap = HashMap::new();
    let mut settled: HashSet<String> = HashSet::new();
    let mut node_index: HashMap<String, u64> = HashMap::new();
    let mut next_index: u64 = 0;
    let mut ids: HashMap<u64, String> = HashMap::new();
    let mut heap: BinaryHeap<HeapEntry> = BinaryHeap::new();

    let mut index_of = |name: &str, node_index: &mut HashMap<String, u64>, ids: &mut HashMap<u64, String>, next_index: &mut u64| -> u64 {
        if let Some(&i) = node_index.get(name) {
            return i;
        }
        let i = *next_index;
        *next_index += 1;
        node_index.insert(name.to_string(), i);
        ids.insert(i, name.to_string());
        i
    };

    let src_idx = index_of(src, &mut node_index, &mut ids, &mut next_index);
    costs.insert(src.to_string(), 0.0);
    pred.insert(src.to_string(), IndexMap::new());
    heap.push(HeapEntry(0.0, src_idx));

    let use_fast_path = excluded_edges.is_empty() && excluded_nodes.is_empty() && edge_select.is_fast_pathable();
    let require_cap = edge_select.requires_cap_remaining();

    let mut dst_best: Option<f64> = None;

    while let Some(HeapEntry(cost_u, u_idx)) = heap.pop() {
        if let Some(best) = dst_best {
            if cost_u > best {
                break;
            }
        }

        let u = ids[&u_idx].clone();
        if settled.contains(&u) {
            continue;
        }
        settled.insert(u.clone());

        let is_dst = dst == Some(u.as_str());
        if is_dst && dst_best.is_none() {
            dst_best = Some(cost_u);
        }
        if is_dst {
            continue;
        }

        for (v, edges) in graph.out_adjacency(&u) {
            if excluded_nodes.contains(v) {
                continue;
            }

            let (c, selected) = if use_fast_path {
                all_min_cost(graph, edges, excluded_edges, require_cap)
            } else {
                edge_select.select(graph, &u, v, edges, excluded_edges, excluded_nodes)
            };

            if selected.is_empty() || !c.is_finite() {
                continue;
            }

            let new_cost = cost_u + c;
            match costs.get(v).copied() {
                None => {
                    costs.insert(v.to_string(), new_cost);
                    let mut m = IndexMap::new();
                    m.insert(u.clone(), selected);
                    pred.insert(v.to_string(), m);
                    let v_idx = index_of(v, &mut node_index, &mut ids, &mut next_index);
                    heap.push(HeapEntry(new_cost, v_idx));
                }
                Some(existing) if new_cost < existing => {
                    costs.insert(v.to_string(), new_cost);
                    let mut m = IndexMap::new();
                    m.insert(u.clone(), selected);
                    pred.insert(v.to_string(), m);
                    let v_idx = index_of(v, &mut node_index, &mut ids, &mut next_index);
                    heap.push(HeapEntry(new_cost, v_idx));
                }
                Some(existing) if multipath && new_cost == existing => {
                    pred.entry(v.to_string()).or_default().insert(u.clone(), selected);
                }
                _ => {}
            }
        }
    }

    tracing::trace!(reachable = costs.len(), "spf: done");
    Ok((costs, pred))
}
