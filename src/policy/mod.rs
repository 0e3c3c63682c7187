//! `FlowPolicy`: converts a `(src, dst, class, volume)` demand into one or
//! more flows on a flow-initialized graph (§4.6).

use std::collections::HashSet;

use crate::algo::{ksp, resolve_to_paths, spf, EdgeSelect, FlowPlacement, PathBundle, PathTuple};
use crate::error::GraphResult;
use crate::flow_index::FlowIndex;
use crate::graph::{EdgeId, StrictMultiDiGraph};

/// Which algorithm a [`FlowPolicy`] uses to find each flow's path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathAlg {
    Spf,
    KspYens,
}

/// The tunables of one named routing strategy.
#[derive(Debug, Clone)]
pub struct FlowPolicyConfig {
    pub path_alg: PathAlg,
    pub edge_select: EdgeSelect,
    pub flow_placement: FlowPlacement,
    pub min_flow_count: u16,
    pub max_flow_count: Option<u16>,
    pub max_path_cost: f64,
    pub max_path_cost_factor: Option<f64>,
    pub static_paths: Option<Vec<PathBundle>>,
    pub shortest_path: bool,
    pub reoptimize_flows_on_each_placement: bool,
    pub diminishing_returns_enabled: bool,
    pub diminishing_returns_iters: u32,
    pub diminishing_returns_stagnation_tolerance: f64,
}

impl FlowPolicyConfig {
    /// IP forwarding with ECMP: all shortest paths, split proportionally to
    /// residual capacity, as many flows as the topology offers parallelism.
    pub fn ip_ecmp() -> Self {
        FlowPolicyConfig {
            path_alg: PathAlg::Spf,
            edge_select: EdgeSelect::AllMinCostWithCapRemaining,
            flow_placement: FlowPlacement::Proportional,
            min_flow_count: 1,
            max_flow_count: None,
            max_path_cost: f64::INFINITY,
            max_path_cost_factor: None,
            static_paths: None,
            shortest_path: false,
            reoptimize_flows_on_each_placement: false,
            diminishing_returns_enabled: false,
            diminishing_returns_iters: 0,
            diminishing_returns_stagnation_tolerance: 0.0,
        }
    }

    /// IP forwarding with UCMP: shortest paths, split unequally so every
    /// parallel branch carries the same share regardless of capacity.
    pub fn ip_ucmp() -> Self {
        FlowPolicyConfig {
            flow_placement: FlowPlacement::EqualBalanced,
            ..FlowPolicyConfig::ip_ecmp()
        }
    }

    /// MPLS-like explicit multipath: up to `k` shortest paths via KSP,
    /// capacity-aware proportional placement.
    pub fn mpls_multipath(k: u16) -> Self {
        FlowPolicyConfig {
            path_alg: PathAlg::KspYens,
            edge_select: EdgeSelect::SingleMinCostWithCapRemaining,
            flow_placement: FlowPlacement::Proportional,
            min_flow_count: k,
            max_flow_count: Some(k),
            max_path_cost: f64::INFINITY,
            max_path_cost_factor: None,
            static_paths: None,
            shortest_path: false,
            reoptimize_flows_on_each_placement: false,
            diminishing_returns_enabled: true,
            diminishing_returns_iters: 3,
            diminishing_returns_stagnation_tolerance: 1e-6,
        }
    }

    /// Strict single path: exactly one flow, single augmentation.
    pub fn single_path() -> Self {
        FlowPolicyConfig {
            path_alg: PathAlg::Spf,
            edge_select: EdgeSelect::SingleMinCostWithCapRemaining,
            flow_placement: FlowPlacement::Proportional,
            min_flow_count: 1,
            max_flow_count: Some(1),
            max_path_cost: f64::INFINITY,
            max_path_cost_factor: None,
            static_paths: None,
            shortest_path: true,
            reoptimize_flows_on_each_placement: false,
            diminishing_returns_enabled: false,
            diminishing_returns_iters: 0,
            diminishing_returns_stagnation_tolerance: 0.0,
        }
    }
}

/// One placed flow: its identity, the single path it follows, and how much
/// volume it currently carries.
#[derive(Debug, Clone)]
pub struct Flow {
    pub index: FlowIndex,
    pub path: PathTuple,
    pub placed_volume: f64,
}

/// Converts demands into flows on a flow-initialized graph, per
/// `FlowPolicyConfig`. A policy instance is scoped to one `(src, dst,
/// class)` demand at a time; callers manage one `FlowPolicy` per demand.
#[derive(Debug, Clone)]
pub struct FlowPolicy {
    config: FlowPolicyConfig,
    flows: Vec<Flow>,
    next_flow_id: u64,
}

const EPSILON: f64 = 1e-12;

fn place_along_path(graph: &mut StrictMultiDiGraph, path: &PathTuple, amount: f64, flow_index: &FlowIndex) -> f64 {
    if amount <= 0.0 {
        return 0.0;
    }
    let edge_ids: Vec<EdgeId> = path.iter().filter_map(|(_, ids)| ids.first().copied()).collect();
    if edge_ids.is_empty() {
        return 0.0;
    }

    let bottleneck = edge_ids
        .iter()
        .map(|id| graph.get_edge_attr(*id).map(|e| e.residual()).unwrap_or(0.0))
        .fold(f64::INFINITY, f64::min);
    let actual = amount.min(bottleneck);
    if actual <= EPSILON {
        return 0.0;
    }

    for id in &edge_ids {
        let target = graph.get_edge_attr(*id).unwrap().target.clone();
        {
            let edge = graph.get_edge_attr_mut(*id).unwrap();
            edge.flow += actual;
            *edge.flows.entry(flow_index.clone()).or_insert(0.0) += actual;
        }
        let node = graph.get_node_attr_mut(&target).unwrap();
        node.flow += actual;
        *node.flows.entry(flow_index.clone()).or_insert(0.0) += actual;
    }

    actual
}

fn unplace_along_path(graph: &mut StrictMultiDiGraph, path: &PathTuple, flow_index: &FlowIndex) {
    for (_, ids) in path {
        let Some(&id) = ids.first() else { continue };
        let Ok(edge) = graph.get_edge_attr(id) else { continue };
        let Some(&amount) = edge.flows.get(flow_index) else { continue };
        let target = edge.target.clone();
        if let Ok(edge) = graph.get_edge_attr_mut(id) {
            edge.flow -= amount;
            edge.flows.remove(flow_index);
        }
        if let Ok(node) = graph.get_node_attr_mut(&target) {
            node.flow -= amount;
            node.flows.remove(flow_index);
        }
    }
}

impl FlowPolicy {
    pub fn new(config: FlowPolicyConfig) -> Self {
        FlowPolicy {
            config,
            flows: Vec::new(),
            next_flow_id: 0,
        }
    }

    pub fn flows(&self) -> &[Flow] {
        &self.flows
    }

    fn find_path(&self, graph: &StrictMultiDiGraph, src: &str, dst: &str, rank: usize) -> GraphResult<Option<PathTuple>> {
        if let Some(static_paths) = &self.config.static_paths {
            return Ok(static_paths.get(rank).and_then(|b| b.edge_tuples.first().cloned()));
        }

        match self.config.path_alg {
            PathAlg::Spf => {
                let (costs, pred) = spf(graph, src, &self.config.edge_select, true, &HashSet::new(), &HashSet::new(), Some(dst))?;
                let Some(&cost) = costs.get(dst) else {
                    return Ok(None);
                };
                if cost > self.config.max_path_cost {
                    return Ok(None);
                }
                let bundle = resolve_to_paths(&pred, src, dst, cost, true);
                Ok(bundle.edge_tuples.into_iter().nth(rank))
            }
            PathAlg::KspYens => {
                let max_k = self
                    .config
                    .max_flow_count
                    .map(|m| m as usize)
                    .unwrap_or(self.config.min_flow_count as usize)
                    .max(rank + 1);
                let paths = ksp(
                    graph,
                    src,
                    dst,
                    &self.config.edge_select,
                    Some(max_k),
                    Some(self.config.max_path_cost).filter(|c| c.is_finite()),
                    self.config.max_path_cost_factor,
                )?;
                Ok(paths.into_iter().nth(rank).map(|p| p.tuple))
            }
        }
    }

    fn ensure_flows(&mut self, graph: &StrictMultiDiGraph, src: &str, dst: &str, class: &str) -> GraphResult<()> {
        // `min_flow_count` is only a floor: the Spf/KspYens algorithms above
        // already deliver one path per rank, so for a multipath preset
        // (`max_flow_count` unset or above 1) we keep asking for more ranks
        // until the topology runs out of equal-cost paths, rather than
        // stopping as soon as the floor is met.
        let max = self.config.max_flow_count.map(|m| m as usize).unwrap_or(usize::MAX);
        while self.flows.len() < max {
            let rank = self.flows.len();
            let Some(path) = self.find_path(graph, src, dst, rank)? else {
                break;
            };
            let index = FlowIndex::new(src, dst, class, self.next_flow_id);
            self.next_flow_id += 1;
            self.flows.push(Flow {
                index,
                path,
                placed_volume: 0.0,
            });
        }
        Ok(())
    }

    /// Grows the flow set (subject to `max_flow_count`) and rebalances
    /// `volume` round-robin across flows, stopping on saturation or
    /// diminishing returns. Returns `(placed, remaining)`.
    pub fn place_demand(
        &mut self,
        graph: &mut StrictMultiDiGraph,
        src: &str,
        dst: &str,
        class: &str,
        volume: f64,
        target_flow_volume: Option<f64>,
    ) -> GraphResult<(f64, f64)> {
        self.ensure_flows(graph, src, dst, class)?;

        let mut remaining = volume;
        let mut placed_total = 0.0;
        let mut stagnant_rounds = 0u32;

        loop {
            if remaining <= EPSILON || self.flows.is_empty() {
                break;
            }

            let share = target_flow_volume.unwrap_or(remaining / self.flows.len() as f64);
            let mut round_progress = 0.0;

            for flow in &mut self.flows {
                if remaining <= EPSILON {
                    break;
                }
                let want = share.min(remaining);
                let got = place_along_path(graph, &flow.path, want, &flow.index);
                flow.placed_volume += got;
                remaining -= got;
                placed_total += got;
                round_progress += got;

                if self.config.shortest_path && got > EPSILON {
                    return Ok((placed_total, remaining));
                }
            }

            if round_progress <= EPSILON {
                break;
            }

            if self.config.diminishing_returns_enabled {
                if round_progress < self.config.diminishing_returns_stagnation_tolerance {
                    stagnant_rounds += 1;
                    if stagnant_rounds >= self.config.diminishing_returns_iters {
                        break;
                    }
                } else {
                    stagnant_rounds = 0;
                }
            }
        }

        Ok((placed_total, remaining))
    }

    /// Removes the current placement and re-places each flow up to
    /// `target_volume`. Flow identities are preserved across the
    /// rebalance.
    pub fn rebalance_demand(&mut self, graph: &mut StrictMultiDiGraph, target_volume: f64) -> GraphResult<(f64, f64)> {
        self.remove_demand(graph);

        let mut placed_total = 0.0;
        for flow in &mut self.flows {
            let got = place_along_path(graph, &flow.path, target_volume, &flow.index);
            flow.placed_volume = got;
            placed_total += got;
        }

        let target_total = target_volume * self.flows.len() as f64;
        Ok((placed_total, (target_total - placed_total).max(0.0)))
    }

    /// Subtracts each flow's contribution from the graph's flow
    /// bookkeeping. Flow identities (and paths) survive for a later
    /// `place_demand`/`rebalance_demand` call.
    pub fn remove_demand(&mut self, graph: &mut StrictMultiDiGraph) {
        for flow in &mut self.flows {
            unplace_along_path(graph, &flow.path, &flow.index);
            flow.placed_volume = 0.0;
        }
    }

    pub fn total_placed(&self) -> f64 {
        self.flows.iter().map(|f| f.placed_volume).sum()
    }
}
