//! Demand expansion and priority-ordered placement scheduling (§4.7).

use std::collections::HashMap;

use crate::attrs::AttrMap;
use crate::error::{GraphError, GraphResult};
use crate::flow_index::FlowIndex;
use crate::graph::{EdgeId, StrictMultiDiGraph};
use crate::network::NetworkView;
use crate::policy::{FlowPolicy, FlowPolicyConfig};

/// How a [`TrafficDemand`]'s source/sink group matches expand into concrete
/// [`Demand`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpansionMode {
    /// One pseudo-source/pseudo-sink pair spanning every matched node; a
    /// single `Demand` carries the full volume.
    Combine,
    /// One `Demand` per `(src, sink)` pair with `src != sink`, volume split
    /// equally.
    FullMesh,
}

/// A named demand spec against regex-matched node groups, before
/// expansion.
#[derive(Debug, Clone)]
pub struct TrafficDemand {
    pub source_path: String,
    pub sink_path: String,
    pub priority: i32,
    pub demand: f64,
    pub mode: ExpansionMode,
    pub policy_config: FlowPolicyConfig,
    pub attrs: AttrMap,
}

/// One concrete, placeable demand produced by expansion.
#[derive(Debug, Clone)]
pub struct Demand {
    pub src: String,
    pub dst: String,
    pub class: String,
    pub priority: i32,
    pub volume: f64,
    pub placed_volume: f64,
    policy: FlowPolicy,
}

impl Demand {
    pub fn remaining(&self) -> f64 {
        (self.volume - self.placed_volume).max(0.0)
    }
}

const TOLERANCE: f64 = 1e-9;
const MAX_AUTO_PASSES: u32 = 3;

/// Expands a set of [`TrafficDemand`]s against a [`NetworkView`] into
/// concrete [`Demand`]s on an owned, flow-initialized working graph, and
/// places them priority-round-robin.
pub struct DemandManager<'a> {
    #[allow(dead_code)]
    view: &'a NetworkView<'a>,
    graph: StrictMultiDiGraph,
    demands: Vec<Demand>,
}

impl<'a> DemandManager<'a> {
    pub fn new(view: &'a NetworkView<'a>, traffic: &[TrafficDemand]) -> GraphResult<Self> {
        let working = view.working_graph(true, false)?;
        let mut graph = (*working).clone();
        graph.reset_flows();

        let mut demands = Vec::new();
        for (idx, td) in traffic.iter().enumerate() {
            match td.mode {
                ExpansionMode::Combine => {
                    demands.push(Self::expand_combine(view, &mut graph, td, idx)?);
                }
                ExpansionMode::FullMesh => {
                    demands.extend(Self::expand_full_mesh(view, td, idx)?);
                }
            }
        }

        Ok(DemandManager { view, graph, demands })
    }

    fn matched_sorted_names(view: &NetworkView, pattern: &str) -> GraphResult<Vec<String>> {
        let groups = view.select_node_groups_by_path(pattern)?;
        if groups.is_empty() {
            return Err(GraphError::no_match(format!("demand pattern '{pattern}' matched no nodes"))
                .with_context("pattern", pattern));
        }
        let mut names: Vec<String> = groups.values().flatten().map(|n| n.name.clone()).collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    fn expand_combine(view: &NetworkView, graph: &mut StrictMultiDiGraph, td: &TrafficDemand, idx: usize) -> GraphResult<Demand> {
        let sources = Self::matched_sorted_names(view, &td.source_path)?;
        let sinks = Self::matched_sorted_names(view, &td.sink_path)?;

        let pseudo_src = format!("__demand_src_{idx}__");
        let pseudo_sink = format!("__demand_sink_{idx}__");
        graph.add_node(&pseudo_src, AttrMap::new())?;
        graph.add_node(&pseudo_sink, AttrMap::new())?;
        for name in &sources {
            graph.add_edge(&pseudo_src, name, None, 0.0, f64::INFINITY, AttrMap::new())?;
        }
        for name in &sinks {
            graph.add_edge(name, &pseudo_sink, None, 0.0, f64::INFINITY, AttrMap::new())?;
        }

        Ok(Demand {
            src: pseudo_src,
            dst: pseudo_sink,
            class: format!("demand_{idx}"),
            priority: td.priority,
            volume: td.demand,
            placed_volume: 0.0,
            policy: FlowPolicy::new(td.policy_config.clone()),
        })
    }

    fn expand_full_mesh(view: &NetworkView, td: &TrafficDemand, idx: usize) -> GraphResult<Vec<Demand>> {
        let sources = Self::matched_sorted_names(view, &td.source_path)?;
        let sinks = Self::matched_sorted_names(view, &td.sink_path)?;

        let pairs: Vec<(String, String)> = sources
            .iter()
            .flat_map(|s| sinks.iter().map(move |t| (s.clone(), t.clone())))
            .filter(|(s, t)| s != t)
            .collect();

        if pairs.is_empty() {
            return Err(GraphError::no_match(format!(
                "full_mesh demand '{}'->'{}' produced no distinct (src,dst) pairs",
                td.source_path, td.sink_path
            )));
        }

        let n = pairs.len();
        let base = td.demand / n as f64;
        let mut demands = Vec::with_capacity(n);
        let mut allocated = 0.0;
        for (i, (src, dst)) in pairs.into_iter().enumerate() {
            let volume = if i + 1 == n { td.demand - allocated } else { base };
            allocated += volume;
            demands.push(Demand {
                src,
                dst,
                class: format!("demand_{idx}_{i}"),
                priority: td.priority,
                volume,
                placed_volume: 0.0,
                policy: FlowPolicy::new(td.policy_config.clone()),
            });
        }
        Ok(demands)
    }

    pub fn demands(&self) -> &[Demand] {
        &self.demands
    }

    pub fn graph(&self) -> &StrictMultiDiGraph {
        &self.graph
    }

    /// Places every demand priority-round-robin, up to three passes,
    /// stopping early once a pass makes no progress or total unplaced
    /// volume is within tolerance.
    pub fn place_all(&mut self, reoptimize_after_each_round: bool) -> GraphResult<f64> {
        let mut order: Vec<usize> = (0..self.demands.len()).collect();
        order.sort_by_key(|&i| self.demands[i].priority);

        let mut total_placed = 0.0;

        for pass in 0..MAX_AUTO_PASSES {
            tracing::debug!(pass, demand_count = self.demands.len(), "demand manager: placement pass");
            let mut progress = false;
            let mut i = 0;
            while i < order.len() {
                let prio = self.demands[order[i]].priority;
                let mut j = i;
                while j < order.len() && self.demands[order[j]].priority == prio {
                    j += 1;
                }

                for &idx in &order[i..j] {
                    let remaining = self.demands[idx].remaining();
                    if remaining <= TOLERANCE {
                        continue;
                    }
                    let (src, dst, class) = {
                        let d = &self.demands[idx];
                        (d.src.clone(), d.dst.clone(), d.class.clone())
                    };
                    let (placed, _) = self.demands[idx]
                        .policy
                        .place_demand(&mut self.graph, &src, &dst, &class, remaining, None)?;
                    self.demands[idx].placed_volume += placed;
                    total_placed += placed;
                    if placed > TOLERANCE {
                        progress = true;
                    }
                }
                i = j;
            }

            if reoptimize_after_each_round {
                for d in &mut self.demands {
                    let flow_count = d.policy.flows().len();
                    if flow_count == 0 {
                        continue;
                    }
                    let target_per_flow = d.volume / flow_count as f64;
                    let (placed, _) = d.policy.rebalance_demand(&mut self.graph, target_per_flow)?;
                    d.placed_volume = placed;
                }
            }

            let total_unplaced: f64 = self.demands.iter().map(Demand::remaining).sum();
            if !progress || total_unplaced <= TOLERANCE {
                break;
            }
        }

        Ok(total_placed)
    }

    /// `(src, dst, class, flow_id) -> placed_volume` for every flow across
    /// every demand.
    pub fn get_flow_details(&self) -> HashMap<FlowIndex, f64> {
        self.demands
            .iter()
            .flat_map(|d| d.policy.flows().iter())
            .map(|f| (f.index.clone(), f.placed_volume))
            .collect()
    }

    /// Total flow currently recorded on each edge of the working graph.
    pub fn summarize_link_usage(&self) -> HashMap<EdgeId, f64> {
        self.graph.edges().map(|(id, data)| (id, data.flow)).collect()
    }

    /// `(src, dst, class) -> (placed, volume)` per demand, or per-flow
    /// breakdown when `detailed`.
    pub fn get_traffic_results(&self, detailed: bool) -> Vec<TrafficResult> {
        self.demands
            .iter()
            .map(|d| TrafficResult {
                src: d.src.clone(),
                dst: d.dst.clone(),
                class: d.class.clone(),
                priority: d.priority,
                volume: d.volume,
                placed_volume: d.placed_volume,
                flows: if detailed {
                    d.policy.flows().iter().map(|f| (f.index.clone(), f.placed_volume)).collect()
                } else {
                    Vec::new()
                },
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct TrafficResult {
    pub src: String,
    pub dst: String,
    pub class: String,
    pub priority: i32,
    pub volume: f64,
    pub placed_volume: f64,
    pub flows: Vec<(FlowIndex, f64)>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Network;
    use indexmap::IndexSet;

    fn mesh_network() -> Network {
        let mut net = Network::new();
        for n in ["s1", "s2", "t1", "t2"] {
            net.add_node(n, AttrMap::new()).unwrap();
        }
        net.add_link("s1", "t1", 1.0, 10.0, AttrMap::new()).unwrap();
        net.add_link("s2", "t2", 1.0, 10.0, AttrMap::new()).unwrap();
        net
    }

    #[test]
    fn combine_mode_places_full_volume_through_pseudo_nodes() {
        let net = mesh_network();
        let view = NetworkView::from_excluded_sets(&net, IndexSet::new(), IndexSet::new());
        let traffic = vec![TrafficDemand {
            source_path: "^s".to_string(),
            sink_path: "^t".to_string(),
            priority: 0,
            demand: 20.0,
            mode: ExpansionMode::Combine,
            policy_config: FlowPolicyConfig::ip_ecmp(),
            attrs: AttrMap::new(),
        }];
        let mut manager = DemandManager::new(&view, &traffic).unwrap();
        let placed = manager.place_all(false).unwrap();
        assert_eq!(placed, 20.0);
        assert_eq!(manager.demands().len(), 1);
    }

    #[test]
    fn full_mesh_mode_splits_volume_exactly_across_pairs() {
        let net = mesh_network();
        let view = NetworkView::from_excluded_sets(&net, IndexSet::new(), IndexSet::new());
        let traffic = vec![TrafficDemand {
            source_path: "^s".to_string(),
            sink_path: "^t".to_string(),
            priority: 0,
            demand: 10.0,
            mode: ExpansionMode::FullMesh,
            policy_config: FlowPolicyConfig::single_path(),
            attrs: AttrMap::new(),
        }];
        let manager = DemandManager::new(&view, &traffic).unwrap();
        assert_eq!(manager.demands().len(), 4);
        let sum: f64 = manager.demands().iter().map(|d| d.volume).sum();
        assert!((sum - 10.0).abs() < 1e-9);
    }

    #[test]
    fn priority_classes_are_served_lowest_first() {
        let mut net = Network::new();
        for n in ["A", "B"] {
            net.add_node(n, AttrMap::new()).unwrap();
        }
        net.add_link("A", "B", 1.0, 5.0, AttrMap::new()).unwrap();
        let view = NetworkView::from_excluded_sets(&net, IndexSet::new(), IndexSet::new());

        let traffic = vec![
            TrafficDemand {
                source_path: "^A$".to_string(),
                sink_path: "^B$".to_string(),
                priority: 1,
                demand: 5.0,
                mode: ExpansionMode::FullMesh,
                policy_config: FlowPolicyConfig::single_path(),
                attrs: AttrMap::new(),
            },
            TrafficDemand {
                source_path: "^A$".to_string(),
                sink_path: "^B$".to_string(),
                priority: 0,
                demand: 5.0,
                mode: ExpansionMode::FullMesh,
                policy_config: FlowPolicyConfig::single_path(),
                attrs: AttrMap::new(),
            },
        ];
        let mut manager = DemandManager::new(&view, &traffic).unwrap();
        manager.place_all(false).unwrap();

        // the shared A->B link has only 5.0 capacity; the priority-0 demand
        // (second in `traffic`, first in serving order) must win it.
        assert_eq!(manager.demands()[1].placed_volume, 5.0);
        assert_eq!(manager.demands()[0].placed_volume, 0.0);
    }

    #[test]
    fn unmatched_source_pattern_is_a_no_match_error() {
        let net = mesh_network();
        let view = NetworkView::from_excluded_sets(&net, IndexSet::new(), IndexSet::new());
        let traffic = vec![TrafficDemand {
            source_path: "^zzz".to_string(),
            sink_path: "^t".to_string(),
            priority: 0,
            demand: 1.0,
            mode: ExpansionMode::Combine,
            policy_config: FlowPolicyConfig::ip_ecmp(),
            attrs: AttrMap::new(),
        }];
        assert!(DemandManager::new(&view, &traffic).is_err());
    }
}
