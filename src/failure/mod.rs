//! Failure policies and the Monte-Carlo failure manager (§4.8).

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use indexmap::IndexSet;
use parking_lot::Mutex;
use rand::Rng;

use crate::attrs::AttrMap;
use crate::error::{GraphError, GraphResult};
use crate::graph::StrictMultiDiGraph;
use crate::network::{Network, NetworkView, RiskGroup};
use crate::results::CapacityEnvelope;
use crate::seed::{derive_iteration_seed, rng_from_seed};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityScope {
    Node,
    Link,
    RiskGroup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConditionOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Contains,
    NotContains,
    AnyValue,
    NoValue,
}

/// `(attr, operator, value)`; `value` is unused for `AnyValue`/`NoValue`.
#[derive(Debug, Clone, PartialEq)]
pub struct FailureCondition {
    pub attr: String,
    pub op: ConditionOp,
    pub value: Option<crate::attrs::AttrValue>,
}

impl FailureCondition {
    fn matches(&self, attrs: &AttrMap) -> bool {
        match self.op {
            ConditionOp::AnyValue => attrs.contains_key(&self.attr),
            ConditionOp::NoValue => !attrs.contains_key(&self.attr),
            _ => {
                let Some(actual) = attrs.get(&self.attr) else {
                    return false;
                };
                match self.op {
                    ConditionOp::Eq => self.value.as_ref() == Some(actual),
                    ConditionOp::Ne => self.value.as_ref() != Some(actual),
                    ConditionOp::Lt | ConditionOp::Le | ConditionOp::Gt | ConditionOp::Ge => {
                        let (Some(a), Some(b)) = (actual.as_f64(), self.value.as_ref().and_then(|v| v.as_f64())) else {
                            return false;
                        };
                        match self.op {
                            ConditionOp::Lt => a < b,
                            ConditionOp::Le => a <= b,
                            ConditionOp::Gt => a > b,
                            ConditionOp::Ge => a >= b,
                            _ => unreachable!(),
                        }
                    }
                    ConditionOp::Contains | ConditionOp::NotContains => {
                        let found = match (&self.value, actual) {
                            (Some(needle), crate::attrs::AttrValue::String(s)) => {
                                needle.as_str().map(|n| s.contains(n)).unwrap_or(false)
                            }
                            (Some(needle), crate::attrs::AttrValue::List(items)) => items.contains(needle),
                            _ => false,
                        };
                        if self.op == ConditionOp::Contains {
                            found
                        } else {
                            !found
                        }
                    }
                    ConditionOp::AnyValue | ConditionOp::NoValue => unreachable!(),
                }
            }
        }
    }

    fn structural_hash(&self, hasher: &mut DefaultHasher) {
        self.attr.hash(hasher);
        self.op.hash(hasher);
        if let Some(v) = &self.value {
            v.to_string().hash(hasher);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Logic {
    And,
    Or,
}

#[derive(Debug, Clone)]
pub enum RuleType {
    All,
    Random { probability: f64 },
    Choice { count: usize },
}

#[derive(Debug, Clone)]
pub struct FailureRule {
    pub entity_scope: EntityScope,
    pub conditions: Vec<FailureCondition>,
    pub logic: Logic,
    pub rule_type: RuleType,
}

impl FailureRule {
    fn matches_attrs(&self, attrs: &AttrMap) -> bool {
        if self.conditions.is_empty() {
            return true;
        }
        match self.logic {
            Logic::And => self.conditions.iter().all(|c| c.matches(attrs)),
            Logic::Or => self.conditions.iter().any(|c| c.matches(attrs)),
        }
    }

    fn structural_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.entity_scope.hash(&mut hasher);
        self.logic.hash(&mut hasher);
        std::mem::discriminant(&self.rule_type).hash(&mut hasher);
        match self.rule_type {
            RuleType::All => {}
            RuleType::Random { probability } => probability.to_bits().hash(&mut hasher),
            RuleType::Choice { count } => count.hash(&mut hasher),
        }
        for c in &self.conditions {
            c.structural_hash(&mut hasher);
        }
        hasher.finish()
    }

    /// Selects entities from `candidates` (already filtered by scope and
    /// condition), consuming `rng` for `random`/`choice` rule types.
    fn select(&self, candidates: Vec<String>, rng: &mut impl Rng) -> Vec<String> {
        match self.rule_type {
            RuleType::All => candidates,
            RuleType::Random { probability } => candidates.into_iter().filter(|_| rng.gen_bool(probability.clamp(0.0, 1.0))).collect(),
            RuleType::Choice { count } => {
                let mut pool = candidates;
                let k = count.min(pool.len());
                let mut chosen = Vec::with_capacity(k);
                for _ in 0..k {
                    let idx = rng.gen_range(0..pool.len());
                    chosen.push(pool.swap_remove(idx));
                }
                chosen
            }
        }
    }
}

fn find_risk_group<'a>(groups: &'a indexmap::IndexMap<String, RiskGroup>, name: &str) -> Option<&'a RiskGroup> {
    for g in groups.values() {
        if let Some(found) = find_in(g, name) {
            return Some(found);
        }
    }
    None
}

fn find_in<'a>(group: &'a RiskGroup, name: &str) -> Option<&'a RiskGroup> {
    if group.name == name {
        return Some(group);
    }
    group.children.iter().find_map(|c| find_in(c, name))
}

fn collect_descendant_names(group: &RiskGroup, out: &mut Vec<String>) {
    for child in &group.children {
        out.push(child.name.clone());
        collect_descendant_names(child, out);
    }
}

/// A list of [`FailureRule`]s whose matched selections are unioned to
/// produce a failure set (§4.8).
#[derive(Debug, Clone)]
pub struct FailurePolicy {
    pub rules: Vec<FailureRule>,
    pub fail_risk_groups: bool,
    pub fail_risk_group_children: bool,
    pub use_cache: bool,
    pub seed: Option<u64>,
    cache: Arc<Mutex<HashMap<u64, Vec<String>>>>,
}

impl FailurePolicy {
    pub fn new(rules: Vec<FailureRule>) -> Self {
        FailurePolicy {
            rules,
            fail_risk_groups: false,
            fail_risk_group_children: false,
            use_cache: true,
            seed: None,
            cache: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Drops memoized per-rule candidate sets; call after the topology
    /// changes identity.
    pub fn invalidate_cache(&self) {
        self.cache.lock().clear();
    }

    fn candidates_for(&self, rule: &FailureRule, network: &Network) -> Vec<String> {
        let key = rule.structural_hash();
        if self.use_cache {
            if let Some(hit) = self.cache.lock().get(&key) {
                return hit.clone();
            }
        }

        let matches: Vec<String> = match rule.entity_scope {
            EntityScope::Node => network
                .nodes
                .values()
                .filter(|n| rule.matches_attrs(&n.attrs))
                .map(|n| n.name.clone())
                .collect(),
            EntityScope::Link => network
                .links
                .values()
                .filter(|l| rule.matches_attrs(&l.attrs))
                .map(|l| l.id.clone())
                .collect(),
            EntityScope::RiskGroup => network
                .risk_groups
                .values()
                .flat_map(|g| {
                    let mut names = Vec::new();
                    names.push(g.name.clone());
                    collect_descendant_names(g, &mut names);
                    names
                })
                .filter(|name| {
                    find_risk_group(&network.risk_groups, name)
                        .map(|g| rule.matches_attrs(&g.attrs))
                        .unwrap_or(false)
                })
                .collect(),
        };

        if self.use_cache {
            self.cache.lock().insert(key, matches.clone());
        }
        matches
    }

    /// Runs every rule, unions the selections, expands risk groups, and
    /// returns sorted `(excluded_nodes, excluded_links)`.
    pub fn apply_failures(&self, network: &Network, seed: Option<u64>) -> GraphResult<(IndexSet<String>, IndexSet<String>)> {
        let mut rng = rng_from_seed(seed);

        let mut selected_nodes: IndexSet<String> = IndexSet::new();
        let mut selected_links: IndexSet<String> = IndexSet::new();
        let mut selected_risk_groups: IndexSet<String> = IndexSet::new();

        for rule in &self.rules {
            let candidates = self.candidates_for(rule, network);
            let chosen = rule.select(candidates, &mut rng);
            match rule.entity_scope {
                EntityScope::Node => selected_nodes.extend(chosen),
                EntityScope::Link => selected_links.extend(chosen),
                EntityScope::RiskGroup => selected_risk_groups.extend(chosen),
            }
        }

        if self.fail_risk_groups || self.fail_risk_group_children {
            for name in network.nodes.keys() {
                let node = &network.nodes[name];
                if node.risk_groups.iter().any(|rg| selected_risk_groups.contains(rg)) {
                    selected_nodes.insert(name.clone());
                }
            }
            for id in network.links.keys() {
                let link = &network.links[id];
                if link.risk_groups.iter().any(|rg| selected_risk_groups.contains(rg)) {
                    selected_links.insert(id.clone());
                }
            }
        }

        if self.fail_risk_group_children {
            let mut expanded = selected_risk_groups.clone();
            for name in &selected_risk_groups {
                if let Some(group) = find_risk_group(&network.risk_groups, name) {
                    let mut descendants = Vec::new();
                    collect_descendant_names(group, &mut descendants);
                    expanded.extend(descendants);
                }
            }
            for name in network.nodes.keys() {
                let node = &network.nodes[name];
                if node.risk_groups.iter().any(|rg| expanded.contains(rg)) {
                    selected_nodes.insert(name.clone());
                }
            }
            for id in network.links.keys() {
                let link = &network.links[id];
                if link.risk_groups.iter().any(|rg| expanded.contains(rg)) {
                    selected_links.insert(id.clone());
                }
            }
        }

        let mut nodes_sorted: Vec<String> = selected_nodes.into_iter().collect();
        nodes_sorted.sort();
        let mut links_sorted: Vec<String> = selected_links.into_iter().collect();
        links_sorted.sort();
        Ok((nodes_sorted.into_iter().collect(), links_sorted.into_iter().collect()))
    }
}

const DEFAULT_CACHE_CAPACITY: usize = 1000;

type ExclusionKey = (Vec<String>, Vec<String>);

struct GraphCache {
    order: VecDeque<ExclusionKey>,
    entries: HashMap<ExclusionKey, Arc<StrictMultiDiGraph>>,
    capacity: usize,
}

impl GraphCache {
    fn new(capacity: usize) -> Self {
        GraphCache {
            order: VecDeque::new(),
            entries: HashMap::new(),
            capacity,
        }
    }

    fn get(&self, key: &ExclusionKey) -> Option<Arc<StrictMultiDiGraph>> {
        self.entries.get(key).cloned()
    }

    fn insert(&mut self, key: ExclusionKey, graph: Arc<StrictMultiDiGraph>) {
        if !self.entries.contains_key(&key) {
            self.order.push_back(key.clone());
            while self.order.len() > self.capacity {
                if let Some(evict) = self.order.pop_front() {
                    self.entries.remove(&evict);
                }
            }
        }
        self.entries.insert(key, graph);
    }
}

/// Result of [`FailureManager::run_monte_carlo_analysis`].
#[derive(Debug, Clone)]
pub struct MonteCarloResult<R> {
    pub results: Vec<R>,
    pub failure_patterns: Option<Vec<FailurePatternRecord>>,
}

#[derive(Debug, Clone)]
pub struct FailurePatternRecord {
    pub excluded_nodes: Vec<String>,
    pub excluded_links: Vec<String>,
    pub count: usize,
    pub is_baseline: bool,
}

/// Orchestrates failure-exclusion sampling and deduplicated, optionally
/// parallel analysis dispatch over a base [`Network`] (§4.8).
pub struct FailureManager<'a> {
    network: &'a Network,
    policy: FailurePolicy,
    graph_cache: Mutex<GraphCache>,
}

impl<'a> FailureManager<'a> {
    pub fn new(network: &'a Network, policy: FailurePolicy) -> Self {
        FailureManager {
            network,
            policy,
            graph_cache: Mutex::new(GraphCache::new(DEFAULT_CACHE_CAPACITY)),
        }
    }

    pub fn compute_exclusions(&self, seed_offset: Option<u64>) -> GraphResult<(IndexSet<String>, IndexSet<String>)> {
        self.policy.apply_failures(self.network, seed_offset)
    }

    pub fn create_network_view(&self, excluded_nodes: IndexSet<String>, excluded_links: IndexSet<String>) -> NetworkView<'a> {
        NetworkView::from_excluded_sets(self.network, excluded_nodes, excluded_links)
    }

    /// Returns the `(add_reverse=true, compact=false)` working graph for
    /// `view`, consulting this manager's FIFO-bounded cross-call cache
    /// before delegating to the view's own build.
    pub fn working_graph_cached(&self, view: &NetworkView<'a>) -> GraphResult<Arc<StrictMultiDiGraph>> {
        let key = (
            view.excluded_nodes().iter().cloned().collect::<Vec<_>>(),
            view.excluded_links().iter().cloned().collect::<Vec<_>>(),
        );
        if let Some(hit) = self.graph_cache.lock().get(&key) {
            return Ok(hit);
        }
        let built = view.working_graph(true, false)?;
        self.graph_cache.lock().insert(key, built.clone());
        Ok(built)
    }

    /// Runs `analysis_fn` once per unique exclusion-set group and
    /// replicates results to every iteration sharing that group, in
    /// original iteration order.
    pub fn run_monte_carlo_analysis<F, R>(
        &self,
        analysis_fn: F,
        iterations: usize,
        parallelism: usize,
        baseline: bool,
        seed: Option<u64>,
        store_failure_patterns: bool,
    ) -> GraphResult<MonteCarloResult<R>>
    where
        F: Fn(&NetworkView<'a>) -> R + Sync,
        R: Clone + Send,
    {
        if self.policy.rules.is_empty() && !baseline && iterations != 1 {
            return Err(GraphError::invalid_argument(
                "a failure policy with no rules requires baseline=true or iterations==1",
            ));
        }
        if baseline && iterations < 2 {
            return Err(GraphError::invalid_argument("baseline=true requires iterations >= 2"));
        }

        let mut exclusions_per_iter: Vec<(Vec<String>, Vec<String>)> = Vec::with_capacity(iterations);
        for i in 0..iterations {
            if baseline && i == 0 {
                exclusions_per_iter.push((Vec::new(), Vec::new()));
                continue;
            }
            let iter_seed = derive_iteration_seed(seed, "failure_monte_carlo", i as u64);
            let (nodes, links) = self.policy.apply_failures(self.network, iter_seed)?;
            exclusions_per_iter.push((nodes.into_iter().collect(), links.into_iter().collect()));
        }

        let mut group_order: Vec<ExclusionKey> = Vec::new();
        let mut group_index: HashMap<ExclusionKey, usize> = HashMap::new();
        let mut membership: Vec<usize> = Vec::with_capacity(iterations);
        for key in &exclusions_per_iter {
            let idx = if let Some(&idx) = group_index.get(key) {
                idx
            } else {
                group_order.push(key.clone());
                let idx = group_order.len() - 1;
                group_index.insert(key.clone(), idx);
                idx
            };
            membership.push(idx);
        }

        let run_group = |(nodes, links): &ExclusionKey| -> R {
            let nset: IndexSet<String> = nodes.iter().cloned().collect();
            let lset: IndexSet<String> = links.iter().cloned().collect();
            let view = self.create_network_view(nset, lset);
            analysis_fn(&view)
        };

        tracing::debug!(
            iterations,
            unique_groups = group_order.len(),
            parallelism,
            baseline,
            "failure monte-carlo: dispatching"
        );

        let group_results: Vec<R> = if parallelism > 1 {
            use rayon::prelude::*;
            group_order.par_iter().map(run_group).collect()
        } else {
            group_order.iter().map(run_group).collect()
        };

        let results: Vec<R> = membership.iter().map(|&idx| group_results[idx].clone()).collect();
        tracing::trace!(iterations, unique_groups = group_order.len(), "failure monte-carlo: reassembled");

        let failure_patterns = if store_failure_patterns {
            let mut counts = vec![0usize; group_order.len()];
            for &idx in &membership {
                counts[idx] += 1;
            }
            Some(
                group_order
                    .iter()
                    .enumerate()
                    .map(|(idx, (nodes, links))| FailurePatternRecord {
                        excluded_nodes: nodes.clone(),
                        excluded_links: links.clone(),
                        count: counts[idx],
                        is_baseline: baseline && membership[0] == idx && nodes.is_empty() && links.is_empty(),
                    })
                    .collect(),
            )
        } else {
            None
        };

        Ok(MonteCarloResult { results, failure_patterns })
    }

    /// Convenience driver: Monte-Carlo max-flow, aggregated into a
    /// [`CapacityEnvelope`] histogram over total flow.
    pub fn run_max_flow_monte_carlo(
        &self,
        source_pattern: &str,
        sink_pattern: &str,
        mode: crate::algo::GroupMode,
        flow_placement: crate::algo::FlowPlacement,
        iterations: usize,
        parallelism: usize,
        baseline: bool,
        seed: Option<u64>,
        store_failure_patterns: bool,
    ) -> GraphResult<(CapacityEnvelope, Option<Vec<FailurePatternRecord>>)> {
        let mc = self.run_monte_carlo_analysis(
            |view| crate::algo::max_flow(view, source_pattern, sink_pattern, mode, flow_placement).map(|m| m.values().sum::<f64>()),
            iterations,
            parallelism,
            baseline,
            seed,
            store_failure_patterns,
        )?;

        let samples: Vec<f64> = mc.results.into_iter().filter_map(Result::ok).collect();
        let mode_label = match mode {
            crate::algo::GroupMode::Combine => "combine",
            crate::algo::GroupMode::Pairwise => "pairwise",
        };
        let envelope = CapacityEnvelope::from_samples(source_pattern, sink_pattern, mode_label, &samples);
        Ok((envelope, mc.failure_patterns))
    }

    /// Convenience driver: Monte-Carlo demand placement, aggregated into a
    /// [`CapacityEnvelope`] histogram over total placed volume per
    /// iteration.
    pub fn run_demand_placement_monte_carlo(
        &self,
        traffic: &[crate::demand::TrafficDemand],
        reoptimize_after_each_round: bool,
        iterations: usize,
        parallelism: usize,
        baseline: bool,
        seed: Option<u64>,
        store_failure_patterns: bool,
    ) -> GraphResult<(CapacityEnvelope, Option<Vec<FailurePatternRecord>>)> {
        let mc = self.run_monte_carlo_analysis(
            |view| -> GraphResult<f64> {
                let mut manager = crate::demand::DemandManager::new(view, traffic)?;
                manager.place_all(reoptimize_after_each_round)
            },
            iterations,
            parallelism,
            baseline,
            seed,
            store_failure_patterns,
        )?;

        let samples: Vec<f64> = mc.results.into_iter().filter_map(Result::ok).collect();
        let envelope = CapacityEnvelope::from_samples("demand_placement", "demand_placement", "total_placed", &samples);
        Ok((envelope, mc.failure_patterns))
    }

    /// Convenience driver: Monte-Carlo edge-capacity sensitivity. Each
    /// iteration builds the `(add_reverse=true, compact=false)` working
    /// graph for its failure-exclusion view and runs
    /// [`crate::algo::run_sensitivity`] against it; the returned map
    /// averages each edge's delta across every iteration in which that
    /// edge appeared (edges absent from a given iteration's working graph
    /// simply don't contribute to its average).
    #[allow(clippy::too_many_arguments)]
    pub fn run_sensitivity_monte_carlo(
        &self,
        src: &str,
        dst: &str,
        flow_class: &str,
        flow_id: u64,
        options: &crate::algo::MaxFlowOptions,
        change: f64,
        iterations: usize,
        parallelism: usize,
        baseline: bool,
        seed: Option<u64>,
        store_failure_patterns: bool,
    ) -> GraphResult<(HashMap<crate::graph::EdgeId, f64>, Option<Vec<FailurePatternRecord>>)> {
        let mc = self.run_monte_carlo_analysis(
            |view| -> GraphResult<HashMap<crate::graph::EdgeId, f64>> {
                let graph = view.working_graph(true, false)?;
                crate::algo::run_sensitivity(&graph, src, dst, flow_class, flow_id, options, change)
            },
            iterations,
            parallelism,
            baseline,
            seed,
            store_failure_patterns,
        )?;

        let mut sums: HashMap<crate::graph::EdgeId, f64> = HashMap::new();
        let mut counts: HashMap<crate::graph::EdgeId, u64> = HashMap::new();
        for per_iter in mc.results.into_iter().filter_map(Result::ok) {
            for (id, delta) in per_iter {
                *sums.entry(id).or_insert(0.0) += delta;
                *counts.entry(id).or_insert(0) += 1;
            }
        }
        let averaged: HashMap<crate::graph::EdgeId, f64> = sums.into_iter().map(|(id, sum)| (id, sum / counts[&id] as f64)).collect();
        Ok((averaged, mc.failure_patterns))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs::AttrMap;
    use crate::network::Network;

    fn line_of_links(n: usize) -> Network {
        let mut net = Network::new();
        net.add_node("S", AttrMap::new()).unwrap();
        net.add_node("T", AttrMap::new()).unwrap();
        for i in 0..n {
            net.add_link("S", "T", 1.0, 1.0, AttrMap::new()).unwrap();
            let _ = i;
        }
        net
    }

    fn choose_one_link_policy() -> FailurePolicy {
        FailurePolicy::new(vec![FailureRule {
            entity_scope: EntityScope::Link,
            conditions: Vec::new(),
            logic: Logic::Or,
            rule_type: RuleType::Choice { count: 1 },
        }])
    }

    #[test]
    fn condition_eq_matches_only_equal_attribute() {
        let mut attrs = AttrMap::new();
        attrs.insert("role".to_string(), "leaf".into());
        let cond = FailureCondition {
            attr: "role".to_string(),
            op: ConditionOp::Eq,
            value: Some("leaf".into()),
        };
        assert!(cond.matches(&attrs));
        let cond_ne = FailureCondition {
            attr: "role".to_string(),
            op: ConditionOp::Eq,
            value: Some("spine".into()),
        };
        assert!(!cond_ne.matches(&attrs));
    }

    #[test]
    fn choice_rule_selects_exactly_count_entities() {
        let net = line_of_links(10);
        let policy = choose_one_link_policy();
        let (nodes, links) = policy.apply_failures(&net, Some(1)).unwrap();
        assert!(nodes.is_empty());
        assert_eq!(links.len(), 1);
    }

    #[test]
    fn all_rule_selects_every_match() {
        let net = line_of_links(5);
        let policy = FailurePolicy::new(vec![FailureRule {
            entity_scope: EntityScope::Link,
            conditions: Vec::new(),
            logic: Logic::Or,
            rule_type: RuleType::All,
        }]);
        let (_, links) = policy.apply_failures(&net, None).unwrap();
        assert_eq!(links.len(), 5);
    }

    #[test]
    fn risk_group_expansion_adds_tagged_entities() {
        let mut net = Network::new();
        net.add_node("A", AttrMap::new()).unwrap();
        net.add_node("B", AttrMap::new()).unwrap();
        net.nodes.get_mut("B").unwrap().risk_groups.insert("rack1".to_string());
        net.add_risk_group(RiskGroup::new("rack1")).unwrap();

        let mut policy = FailurePolicy::new(vec![FailureRule {
            entity_scope: EntityScope::RiskGroup,
            conditions: Vec::new(),
            logic: Logic::Or,
            rule_type: RuleType::All,
        }]);
        policy.fail_risk_groups = true;

        let (nodes, _) = policy.apply_failures(&net, None).unwrap();
        assert!(nodes.contains("B"));
        assert!(!nodes.contains("A"));
    }

    #[test]
    fn s6_monte_carlo_dedup_bounds_unique_tasks() {
        let net = line_of_links(10);
        let manager = FailureManager::new(&net, choose_one_link_policy());

        let mc = manager
            .run_monte_carlo_analysis(
                |view| view.visible_links().count(),
                100,
                1,
                true,
                Some(0),
                false,
            )
            .unwrap();

        assert_eq!(mc.results.len(), 100);
        let unique: std::collections::HashSet<_> = mc.results.iter().collect();
        // 10 single-link failures leave 9 visible links; baseline leaves 10.
        assert!(unique.len() <= 2);
    }

    #[test]
    fn working_graph_cached_reuses_arc_across_calls() {
        let net = line_of_links(3);
        let manager = FailureManager::new(&net, choose_one_link_policy());
        let view = manager.create_network_view(IndexSet::new(), IndexSet::new());
        let g1 = manager.working_graph_cached(&view).unwrap();
        let g2 = manager.working_graph_cached(&view).unwrap();
        assert!(Arc::ptr_eq(&g1, &g2));
    }

    #[test]
    fn baseline_requires_at_least_two_iterations() {
        let net = line_of_links(3);
        let manager = FailureManager::new(&net, choose_one_link_policy());
        let err = manager.run_monte_carlo_analysis(|_v| 0, 1, 1, true, Some(0), false).unwrap_err();
        assert!(matches!(err, GraphError::InvalidArgument { .. }));
    }

    #[test]
    fn demand_placement_monte_carlo_aggregates_into_an_envelope() {
        let net = line_of_links(4);
        let manager = FailureManager::new(&net, choose_one_link_policy());
        let traffic = vec![crate::demand::TrafficDemand {
            source_path: "^S$".to_string(),
            sink_path: "^T$".to_string(),
            priority: 0,
            demand: 4.0,
            mode: crate::demand::ExpansionMode::Combine,
            policy_config: crate::policy::FlowPolicyConfig::ip_ecmp(),
            attrs: AttrMap::new(),
        }];
        let (envelope, patterns) = manager
            .run_demand_placement_monte_carlo(&traffic, false, 20, 1, true, Some(7), true)
            .unwrap();
        assert_eq!(envelope.total_samples, 20);
        assert!(patterns.is_some());
    }

    #[test]
    fn sensitivity_monte_carlo_averages_deltas_per_edge() {
        let net = line_of_links(4);
        let manager = FailureManager::new(&net, choose_one_link_policy());
        let options = crate::algo::MaxFlowOptions::default();
        let (deltas, _) = manager
            .run_sensitivity_monte_carlo("S", "T", "default", 0, &options, 1.0, 10, 1, true, Some(3), false)
            .unwrap();
        assert!(deltas.values().all(|d| d.is_finite()));
    }
}
