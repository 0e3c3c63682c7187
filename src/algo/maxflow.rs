//! The iterative max-flow driver, `FlowSummary`, sensitivity, and
//! group-level (pseudo-source/sink) wrappers (§4.5).

use std::collections::{HashMap, HashSet, VecDeque};

use crate::attrs::AttrMap;
use crate::error::{GraphError, GraphResult};
use crate::flow_index::FlowIndex;
use crate::graph::{EdgeId, StrictMultiDiGraph};
use crate::network::NetworkView;

use super::capacity::{calc_graph_capacity, FlowPlacement};
use super::spf::{spf, EdgeSelect};

/// Tunables for a single `calc_max_flow` call.
#[derive(Debug, Clone)]
pub struct MaxFlowOptions {
    pub flow_placement: FlowPlacement,
    /// Stop after the first non-zero augmentation instead of iterating to
    /// exhaustion.
    pub shortest_path: bool,
    /// Zero out any pre-existing flow bookkeeping before iterating.
    pub reset_flow_graph: bool,
    /// Operate on an internal clone, leaving the caller's graph untouched.
    pub copy_graph: bool,
    pub tolerance: f64,
    pub return_summary: bool,
    pub return_graph: bool,
}

impl Default for MaxFlowOptions {
    fn default() -> Self {
        MaxFlowOptions {
            flow_placement: FlowPlacement::Proportional,
            shortest_path: false,
            reset_flow_graph: true,
            copy_graph: true,
            tolerance: 1e-9,
            return_summary: true,
            return_graph: false,
        }
    }
}

/// A cost value used as a `cost_distribution` bucket key. Equality and
/// ordering are bitwise via [`f64::total_cmp`] rather than `PartialOrd`'s
/// IEEE comparison, since these costs are deterministic sums that must
/// compare exactly equal across runs — never NaN in practice, since edge
/// costs are finite by construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostKey(pub f64);

impl Eq for CostKey {}
impl PartialOrd for CostKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for CostKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Output of one `calc_max_flow` call (§3 `FlowSummary`).
#[derive(Debug, Clone)]
pub struct FlowSummary {
    pub total_flow: f64,
    pub edge_flow: HashMap<EdgeId, f64>,
    pub residual_capacity: HashMap<EdgeId, f64>,
    pub reachable: HashSet<String>,
    pub min_cut: Vec<EdgeId>,
    pub cost_distribution: std::collections::BTreeMap<CostKey, f64>,
}

/// The result of `calc_max_flow`: always a total, optionally a summary
/// and/or the mutated flow graph.
#[derive(Debug, Clone)]
pub struct MaxFlowResult {
    pub total_flow: f64,
    pub summary: Option<FlowSummary>,
    pub graph: Option<StrictMultiDiGraph>,
}

/// Runs the iterative SPF + blocking-flow augmentation loop from `src` to
/// `dst`, tagging placed flow under `FlowIndex::new(src, dst, flow_class,
/// flow_id)`.
pub fn calc_max_flow(
    graph: &mut StrictMultiDiGraph,
    src: &str,
    dst: &str,
    flow_class: &str,
    flow_id: u64,
    options: &MaxFlowOptions,
) -> GraphResult<MaxFlowResult> {
    if !graph.has_node(src) {
        return Err(GraphError::unknown_entity(format!("max-flow source '{src}' does not exist")).with_context("node", src));
    }
    if !graph.has_node(dst) {
        return Err(GraphError::unknown_entity(format!("max-flow destination '{dst}' does not exist")).with_context("node", dst));
    }

    let mut owned;
    let work: &mut StrictMultiDiGraph = if options.copy_graph {
        owned = graph.copy(true);
        &mut owned
    } else {
        graph
    };

    if options.reset_flow_graph {
        work.reset_flows();
    }

    tracing::debug!(src, dst, flow_class, flow_id, flow_placement = ?options.flow_placement, "calc_max_flow: start");

    let flow_index = FlowIndex::new(src, dst, flow_class, flow_id);
    let mut total = 0.0;
    let mut cost_distribution: std::collections::BTreeMap<CostKey, f64> = std::collections::BTreeMap::new();
    let mut round = 0u32;

    // `shortest_path` asks for a single augmenting path's worth, not a full
    // blocking flow: restricting SPF to `SingleMinCost*` collapses `pred` to
    // one edge per node, so the very same `calc_graph_capacity` call below
    // only ever has one path to saturate.
    let edge_select = if options.shortest_path {
        EdgeSelect::SingleMinCostWithCapRemaining
    } else {
        EdgeSelect::AllMinCostWithCapRemaining
    };

    loop {
        round += 1;
        let (costs, pred) = spf(work, src, &edge_select, true, &HashSet::new(), &HashSet::new(), Some(dst))?;

        let Some(&dst_cost) = costs.get(dst) else {
            break;
        };

        let placed = calc_graph_capacity(work, &pred, src, dst, options.flow_placement, f64::INFINITY, &flow_index)?;
        if placed <= options.tolerance {
            break;
        }

        total += placed;
        *cost_distribution.entry(CostKey(dst_cost)).or_insert(0.0) += placed;
        tracing::trace!(src, dst, round, dst_cost, placed, running_total = total, "calc_max_flow: augmenting round");

        if options.shortest_path {
            break;
        }
    }

    tracing::debug!(src, dst, total_flow = total, rounds = round, "calc_max_flow: done");

    let summary = if options.return_summary {
        Some(build_summary(work, src, total, cost_distribution, options.tolerance))
    } else {
        None
    };

    let returned_graph = if options.return_graph { Some(work.clone()) } else { None };

    Ok(MaxFlowResult {
        total_flow: total,
        summary,
        graph: returned_graph,
    })
}

fn build_summary(
    graph: &StrictMultiDiGraph,
    src: &str,
    total_flow: f64,
    cost_distribution: std::collections::BTreeMap<CostKey, f64>,
    tolerance: f64,
) -> FlowSummary {
    let mut edge_flow = HashMap::new();
    let mut residual_capacity = HashMap::new();
    for (id, data) in graph.edges() {
        edge_flow.insert(id, data.flow);
        residual_capacity.insert(id, data.residual());
    }

    // Residual-network reachability from `src`: forward along edges with
    // spare capacity, backward along edges already carrying flow (pushing
    // flow back frees capacity on the reverse arc).
    let mut reach_fwd: HashMap<&str, Vec<&str>> = HashMap::new();
    for (_, data) in graph.edges() {
        if data.residual() > tolerance {
            reach_fwd.entry(data.source.as_str()).or_default().push(data.target.as_str());
        }
        if data.flow > tolerance {
            reach_fwd.entry(data.target.as_str()).or_default().push(data.source.as_str());
        }
    }

    let mut reachable: HashSet<String> = HashSet::new();
    reachable.insert(src.to_string());
    let mut queue = VecDeque::new();
    queue.push_back(src.to_string());
    while let Some(u) = queue.pop_front() {
        if let Some(neighbors) = reach_fwd.get(u.as_str()) {
            for &v in neighbors {
                if reachable.insert(v.to_string()) {
                    queue.push_back(v.to_string());
                }
            }
        }
    }

    let min_cut: Vec<EdgeId> = graph
        .edges()
        .filter(|(_, data)| {
            reachable.contains(&data.source) && !reachable.contains(&data.target) && data.residual() <= tolerance
        })
        .map(|(id, _)| id)
        .collect();

    FlowSummary {
        total_flow,
        edge_flow,
        residual_capacity,
        reachable,
        min_cut,
        cost_distribution,
    }
}

/// Every edge left with `capacity - flow <= tolerance` after a fresh
/// max-flow computation. Always runs on an internal copy regardless of
/// `options.copy_graph`, since a derived query must not mutate the caller's
/// graph as a side effect.
pub fn saturated_edges(
    graph: &StrictMultiDiGraph,
    src: &str,
    dst: &str,
    flow_class: &str,
    flow_id: u64,
    options: &MaxFlowOptions,
) -> GraphResult<Vec<EdgeId>> {
    let mut work = graph.copy(true);
    let mut opts = options.clone();
    opts.copy_graph = false;
    opts.return_summary = false;
    let result = calc_max_flow(&mut work, src, dst, flow_class, flow_id, &opts)?;
    let _ = result;
    Ok(work
        .edges()
        .filter(|(_, data)| data.residual() <= options.tolerance)
        .map(|(id, _)| id)
        .collect())
}

/// For each saturated edge, perturbs its capacity by `change` (clamped at
/// zero), recomputes max-flow on a fresh copy, and reports the resulting
/// delta in `total_flow` relative to the unperturbed baseline.
pub fn run_sensitivity(
    graph: &StrictMultiDiGraph,
    src: &str,
    dst: &str,
    flow_class: &str,
    flow_id: u64,
    options: &MaxFlowOptions,
    change: f64,
) -> GraphResult<HashMap<EdgeId, f64>> {
    let mut baseline_opts = options.clone();
    baseline_opts.copy_graph = true;
    baseline_opts.return_summary = false;
    let mut baseline_graph = graph.copy(true);
    let baseline = calc_max_flow(&mut baseline_graph, src, dst, flow_class, flow_id, &baseline_opts)?.total_flow;

    let saturated = saturated_edges(graph, src, dst, flow_class, flow_id, options)?;

    let mut deltas = HashMap::new();
    for id in saturated {
        let mut perturbed = graph.copy(true);
        {
            let edge = perturbed.get_edge_attr_mut(id)?;
            edge.capacity = (edge.capacity + change).max(0.0);
        }
        let mut opts = options.clone();
        opts.copy_graph = false;
        opts.return_summary = false;
        let result = calc_max_flow(&mut perturbed, src, dst, flow_class, flow_id, &opts)?;
        deltas.insert(id, result.total_flow - baseline);
    }

    Ok(deltas)
}

/// How a group-level max-flow call combines multiple source/sink labels
/// into pseudo-source/pseudo-sink pairs (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupMode {
    /// One pseudo-source/pseudo-sink pair spanning every matched node.
    Combine,
    /// One pseudo pair per `(source_label, sink_label)` combination.
    Pairwise,
}

const PSEUDO_CAPACITY: f64 = f64::INFINITY;
const PSEUDO_COST: f64 = 0.0;

fn attach_pseudo_source(graph: &mut StrictMultiDiGraph, pseudo: &str, members: &[&str]) -> GraphResult<()> {
    graph.add_node(pseudo, AttrMap::new())?;
    for &m in members {
        graph.add_edge(pseudo, m, None, PSEUDO_COST, PSEUDO_CAPACITY, AttrMap::new())?;
    }
    Ok(())
}

fn attach_pseudo_sink(graph: &mut StrictMultiDiGraph, pseudo: &str, members: &[&str]) -> GraphResult<()> {
    graph.add_node(pseudo, AttrMap::new())?;
    for &m in members {
        graph.add_edge(m, pseudo, None, PSEUDO_COST, PSEUDO_CAPACITY, AttrMap::new())?;
    }
    Ok(())
}

/// Group-level max-flow: matches `source_pattern`/`sink_pattern` against
/// `view`'s visible nodes, wraps each resulting group (or group pair, under
/// [`GroupMode::Pairwise`]) with pseudo-source/pseudo-sink nodes on a scratch
/// copy of the working graph, and returns total flow per `(source_label,
/// sink_label)`. Never mutates `view`'s base network or cached working
/// graph.
pub fn max_flow(
    view: &NetworkView,
    source_pattern: &str,
    sink_pattern: &str,
    mode: GroupMode,
    flow_placement: FlowPlacement,
) -> GraphResult<HashMap<(String, String), f64>> {
    let detailed = max_flow_detailed(view, source_pattern, sink_pattern, mode, flow_placement, false, false)?;
    Ok(detailed.into_iter().map(|(k, v)| (k, v.total_flow)).collect())
}

/// As [`max_flow`], but every result carries a full [`MaxFlowResult`]
/// (summary/graph presence controlled by `return_summary`/`return_graph`).
pub fn max_flow_detailed(
    view: &NetworkView,
    source_pattern: &str,
    sink_pattern: &str,
    mode: GroupMode,
    flow_placement: FlowPlacement,
    return_summary: bool,
    return_graph: bool,
) -> GraphResult<HashMap<(String, String), MaxFlowResult>> {
    let source_groups = view.select_node_groups_by_path(source_pattern)?;
    if source_groups.is_empty() {
        return Err(GraphError::no_match(format!("source pattern '{source_pattern}' matched no nodes"))
            .with_context("pattern", source_pattern));
    }
    let sink_groups = view.select_node_groups_by_path(sink_pattern)?;
    if sink_groups.is_empty() {
        return Err(GraphError::no_match(format!("sink pattern '{sink_pattern}' matched no nodes"))
            .with_context("pattern", sink_pattern));
    }

    let base = view.working_graph(true, false)?;
    let options = MaxFlowOptions {
        flow_placement,
        shortest_path: false,
        reset_flow_graph: true,
        copy_graph: false,
        tolerance: 1e-9,
        return_summary,
        return_graph,
    };

    let mut out = HashMap::new();

    match mode {
        GroupMode::Combine => {
            let src_members: Vec<&str> = source_groups.values().flatten().map(|n| n.name.as_str()).collect();
            let sink_members: Vec<&str> = sink_groups.values().flatten().map(|n| n.name.as_str()).collect();

            let mut g = (*base).clone();
            attach_pseudo_source(&mut g, "__pseudo_src__", &src_members)?;
            attach_pseudo_sink(&mut g, "__pseudo_sink__", &sink_members)?;
            let result = calc_max_flow(&mut g, "__pseudo_src__", "__pseudo_sink__", "group", 0, &options)?;
            out.insert((source_pattern.to_string(), sink_pattern.to_string()), result);
        }
        GroupMode::Pairwise => {
            for (src_label, src_nodes) in &source_groups {
                for (sink_label, sink_nodes) in &sink_groups {
                    if src_label == sink_label {
                        continue;
                    }
                    let src_members: Vec<&str> = src_nodes.iter().map(|n| n.name.as_str()).collect();
                    let sink_members: Vec<&str> = sink_nodes.iter().map(|n| n.name.as_str()).collect();

                    let pseudo_src = format!("__pseudo_src__::{src_label}");
                    let pseudo_sink = format!("__pseudo_sink__::{sink_label}");

                    let mut g = (*base).clone();
                    attach_pseudo_source(&mut g, &pseudo_src, &src_members)?;
                    attach_pseudo_sink(&mut g, &pseudo_sink, &sink_members)?;
                    let result = calc_max_flow(&mut g, &pseudo_src, &pseudo_sink, "group", 0, &options)?;
                    out.insert((src_label.clone(), sink_label.clone()), result);
                }
            }
        }
    }

    Ok(out)
}

/// As [`max_flow`], forcing `return_summary = true` on every result.
pub fn max_flow_with_summary(
    view: &NetworkView,
    source_pattern: &str,
    sink_pattern: &str,
    mode: GroupMode,
    flow_placement: FlowPlacement,
) -> GraphResult<HashMap<(String, String), MaxFlowResult>> {
    max_flow_detailed(view, source_pattern, sink_pattern, mode, flow_placement, true, false)
}
