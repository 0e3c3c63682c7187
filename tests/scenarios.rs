//! End-to-end scenarios against the public API (spec §8, S1-S6).

use netgraph::algo::{
    calc_max_flow, ksp, max_flow, resolve_to_paths, run_sensitivity, saturated_edges, spf, EdgeSelect, FlowPlacement,
    MaxFlowOptions,
};
use netgraph::attrs::AttrMap;
use netgraph::failure::{EntityScope, FailureManager, FailurePolicy, FailureRule, Logic, RuleType};
use netgraph::flow_index::FlowIndex;
use netgraph::graph::StrictMultiDiGraph;
use netgraph::network::{Network, NetworkView};
use std::collections::HashSet;

fn diamond() -> StrictMultiDiGraph {
    let mut g = StrictMultiDiGraph::new();
    for n in ["A", "B", "C", "D"] {
        g.add_node(n, AttrMap::new()).unwrap();
    }
    g.add_edge("A", "B", None, 1.0, 10.0, AttrMap::new()).unwrap();
    g.add_edge("A", "C", None, 1.0, 10.0, AttrMap::new()).unwrap();
    g.add_edge("B", "D", None, 1.0, 10.0, AttrMap::new()).unwrap();
    g.add_edge("C", "D", None, 1.0, 10.0, AttrMap::new()).unwrap();
    g
}

#[test]
fn s1_diamond_with_two_parallel_sinks() {
    let mut g = diamond();
    let result = calc_max_flow(&mut g, "A", "D", "default", 0, &MaxFlowOptions::default()).unwrap();
    assert_eq!(result.total_flow, 20.0);

    let mut g2 = diamond();
    let opts = MaxFlowOptions {
        shortest_path: true,
        ..MaxFlowOptions::default()
    };
    let result2 = calc_max_flow(&mut g2, "A", "D", "default", 0, &opts).unwrap();
    assert_eq!(result2.total_flow, 10.0);
}

#[test]
fn s2_bottleneck_chain() {
    let mut g = StrictMultiDiGraph::new();
    for n in ["A", "B", "C"] {
        g.add_node(n, AttrMap::new()).unwrap();
    }
    g.add_edge("A", "B", None, 1.0, 10.0, AttrMap::new()).unwrap();
    let bc = g.add_edge("B", "C", None, 1.0, 5.0, AttrMap::new()).unwrap();

    let mut g2 = g.clone();
    let result = calc_max_flow(&mut g2, "A", "C", "default", 0, &MaxFlowOptions::default()).unwrap();
    assert_eq!(result.total_flow, 5.0);

    let sat = saturated_edges(&g.clone(), "A", "C", "default", 0, &MaxFlowOptions::default()).unwrap();
    assert_eq!(sat, vec![bc]);

    let sensitivity = run_sensitivity(&g, "A", "C", "default", 0, &MaxFlowOptions::default(), 1.0).unwrap();
    assert_eq!(sensitivity.get(&bc), Some(&1.0));
}

#[test]
fn s3_equal_cost_parallel_edges_split_by_placement() {
    let mut g = StrictMultiDiGraph::new();
    for n in ["A", "B", "C"] {
        g.add_node(n, AttrMap::new()).unwrap();
    }
    g.add_edge("A", "B", None, 1.0, 3.0, AttrMap::new()).unwrap();
    g.add_edge("A", "B", None, 1.0, 7.0, AttrMap::new()).unwrap();
    g.add_edge("B", "C", None, 1.0, 100.0, AttrMap::new()).unwrap();

    let mut proportional = g.clone();
    let opts = MaxFlowOptions {
        flow_placement: FlowPlacement::Proportional,
        ..MaxFlowOptions::default()
    };
    let r = calc_max_flow(&mut proportional, "A", "C", "default", 0, &opts).unwrap();
    assert_eq!(r.total_flow, 10.0);

    let mut balanced = g.clone();
    let opts2 = MaxFlowOptions {
        flow_placement: FlowPlacement::EqualBalanced,
        ..MaxFlowOptions::default()
    };
    let r2 = calc_max_flow(&mut balanced, "A", "C", "default", 0, &opts2).unwrap();
    assert_eq!(r2.total_flow, 6.0);
}

#[test]
fn s4_spf_multipath_predecessor_yields_two_paths() {
    let mut g = StrictMultiDiGraph::new();
    for n in ["A", "B", "C", "D"] {
        g.add_node(n, AttrMap::new()).unwrap();
    }
    g.add_edge("A", "B", None, 1.0, 10.0, AttrMap::new()).unwrap();
    g.add_edge("A", "C", None, 1.0, 10.0, AttrMap::new()).unwrap();
    g.add_edge("B", "D", None, 1.0, 10.0, AttrMap::new()).unwrap();
    g.add_edge("C", "D", None, 1.0, 10.0, AttrMap::new()).unwrap();

    let (costs, pred) = spf(&g, "A", &EdgeSelect::AllMinCost, true, &HashSet::new(), &HashSet::new(), Some("D")).unwrap();
    assert_eq!(costs["D"], 2.0);
    assert_eq!(pred["D"].len(), 2);
    assert!(pred["D"].contains_key("B"));
    assert!(pred["D"].contains_key("C"));

    let bundle = resolve_to_paths(&pred, "A", "D", costs["D"], false);
    assert_eq!(bundle.edge_tuples.len(), 2);
}

#[test]
fn s5_ksp_with_cost_factor_cap() {
    let mut g = StrictMultiDiGraph::new();
    for n in ["S", "M1", "M2", "M3", "T"] {
        g.add_node(n, AttrMap::new()).unwrap();
    }
    // three disjoint S->T paths of cost 2, 3, 5
    g.add_edge("S", "M1", None, 1.0, 10.0, AttrMap::new()).unwrap();
    g.add_edge("M1", "T", None, 1.0, 10.0, AttrMap::new()).unwrap();
    g.add_edge("S", "M2", None, 1.5, 10.0, AttrMap::new()).unwrap();
    g.add_edge("M2", "T", None, 1.5, 10.0, AttrMap::new()).unwrap();
    g.add_edge("S", "M3", None, 2.5, 10.0, AttrMap::new()).unwrap();
    g.add_edge("M3", "T", None, 2.5, 10.0, AttrMap::new()).unwrap();

    let paths = ksp(&g, "S", "T", &EdgeSelect::AllMinCost, Some(5), None, Some(2.0)).unwrap();
    assert_eq!(paths.len(), 2);
    assert_eq!(paths[0].cost, 2.0);
    assert_eq!(paths[1].cost, 3.0);
}

#[test]
fn s6_failure_monte_carlo_dedup_and_total_samples() {
    let mut net = Network::new();
    net.add_node("S", AttrMap::new()).unwrap();
    net.add_node("T", AttrMap::new()).unwrap();
    for _ in 0..10 {
        net.add_link("S", "T", 1.0, 1.0, AttrMap::new()).unwrap();
    }

    let policy = FailurePolicy::new(vec![FailureRule {
        entity_scope: EntityScope::Link,
        conditions: Vec::new(),
        logic: Logic::Or,
        rule_type: RuleType::Choice { count: 1 },
    }]);
    let manager = FailureManager::new(&net, policy);

    let mc = manager
        .run_monte_carlo_analysis(
            |view| max_flow(view, "^S$", "^T$", netgraph::algo::GroupMode::Combine, FlowPlacement::Proportional)
                .map(|m| m.values().sum::<f64>())
                .unwrap_or(0.0),
            100,
            1,
            true,
            Some(0),
            true,
        )
        .unwrap();

    assert_eq!(mc.results.len(), 100);
    let patterns = mc.failure_patterns.unwrap();
    assert!(patterns.len() <= 11);

    let total_samples: usize = patterns.iter().map(|p| p.count).sum();
    assert_eq!(total_samples, 100);
}

#[test]
fn view_never_mutates_base_network_across_analyses() {
    let net = diamond_network();
    let before = serde_json::to_string(&net).unwrap();
    {
        let view = NetworkView::from_excluded_sets(&net, Default::default(), Default::default());
        let _ = max_flow(&view, "^A$", "^D$", netgraph::algo::GroupMode::Combine, FlowPlacement::Proportional).unwrap();
    }
    let after = serde_json::to_string(&net).unwrap();
    assert_eq!(before, after);
}

fn diamond_network() -> Network {
    let mut net = Network::new();
    for n in ["A", "B", "C", "D"] {
        net.add_node(n, AttrMap::new()).unwrap();
    }
    net.add_link("A", "B", 1.0, 10.0, AttrMap::new()).unwrap();
    net.add_link("A", "C", 1.0, 10.0, AttrMap::new()).unwrap();
    net.add_link("B", "D", 1.0, 10.0, AttrMap::new()).unwrap();
    net.add_link("C", "D", 1.0, 10.0, AttrMap::new()).unwrap();
    net
}

#[test]
fn reversed_input_symmetry_holds_for_diamond() {
    let mut forward = diamond();
    let forward_result = calc_max_flow(&mut forward, "A", "D", "default", 0, &MaxFlowOptions::default()).unwrap();

    let mut reversed = StrictMultiDiGraph::new();
    for n in ["A", "B", "C", "D"] {
        reversed.add_node(n, AttrMap::new()).unwrap();
    }
    reversed.add_edge("B", "A", None, 1.0, 10.0, AttrMap::new()).unwrap();
    reversed.add_edge("C", "A", None, 1.0, 10.0, AttrMap::new()).unwrap();
    reversed.add_edge("D", "B", None, 1.0, 10.0, AttrMap::new()).unwrap();
    reversed.add_edge("D", "C", None, 1.0, 10.0, AttrMap::new()).unwrap();
    let reversed_result = calc_max_flow(&mut reversed, "D", "A", "default", 0, &MaxFlowOptions::default()).unwrap();

    assert_eq!(forward_result.total_flow, reversed_result.total_flow);
}

#[test]
fn flow_index_identity_is_stable_across_rank_and_class() {
    let a = FlowIndex::new("A", "D", "default", 0);
    let b = FlowIndex::new("A", "D", "default", 1);
    assert_ne!(a, b);
    assert_eq!(a, FlowIndex::new("A", "D", "default", 0));
}
