//! Read-only exclusion overlay over a [`super::Network`] (§3, §4.2).

use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use parking_lot::RwLock;

use crate::error::GraphResult;
use crate::graph::StrictMultiDiGraph;

use super::{builder::build_working_graph, select, Link, Network, Node};

/// A read-only exclusion overlay on top of a borrowed [`Network`].
///
/// A node is hidden iff it is in `excluded_nodes` or `node.disabled`. A
/// link is hidden iff it is in `excluded_links`, it is itself disabled, or
/// either endpoint is hidden. The view caches its built working graph per
/// `(add_reverse, compact)` tuple behind a read-write lock, so concurrent
/// readers share the cache and a writer only takes the exclusive lock to
/// materialize a variant that hasn't been built yet.
pub struct NetworkView<'a> {
    base: &'a Network,
    excluded_nodes: IndexSet<String>,
    excluded_links: IndexSet<String>,
    graph_cache: RwLock<IndexMap<(bool, bool), Arc<StrictMultiDiGraph>>>,
}

impl<'a> NetworkView<'a> {
    pub fn from_excluded_sets(
        base: &'a Network,
        excluded_nodes: IndexSet<String>,
        excluded_links: IndexSet<String>,
    ) -> Self {
        NetworkView {
            base,
            excluded_nodes,
            excluded_links,
            graph_cache: RwLock::new(IndexMap::new()),
        }
    }

    pub fn base(&self) -> &Network {
        self.base
    }

    pub fn excluded_nodes(&self) -> &IndexSet<String> {
        &self.excluded_nodes
    }

    pub fn excluded_links(&self) -> &IndexSet<String> {
        &self.excluded_links
    }

    pub fn is_node_hidden(&self, name: &str) -> bool {
        self.excluded_nodes.contains(name)
            || self.base.nodes.get(name).map(|n| n.disabled).unwrap_or(true)
    }

    pub fn is_link_hidden(&self, link: &Link) -> bool {
        self.excluded_links.contains(&link.id)
            || link.disabled
            || self.is_node_hidden(&link.source)
            || self.is_node_hidden(&link.target)
    }

    pub fn visible_nodes(&self) -> impl Iterator<Item = &Node> {
        self.base.nodes.values().filter(move |n| !self.is_node_hidden(&n.name))
    }

    pub fn visible_links(&self) -> impl Iterator<Item = &Link> {
        self.base.links.values().filter(move |l| !self.is_link_hidden(l))
    }

    pub fn select_node_groups_by_path(&self, pattern: &str) -> GraphResult<IndexMap<String, Vec<&Node>>> {
        select::select_node_groups_by_path(self.visible_nodes(), pattern)
    }

    pub fn find_links<F>(&self, pred: F) -> Vec<&Link>
    where
        F: Fn(&Link) -> bool,
    {
        self.visible_links().filter(|l| pred(l)).collect()
    }

    pub fn get_links_between(&self, source: &str, target: &str) -> Vec<&Link> {
        self.visible_links()
            .filter(|l| l.source == source && l.target == target)
            .collect()
    }

    /// Returns the working graph for `(add_reverse, compact)`, building and
    /// caching it on first request.
    pub fn working_graph(&self, add_reverse: bool, compact: bool) -> GraphResult<Arc<StrictMultiDiGraph>> {
        let key = (add_reverse, compact);

        if let Some(graph) = self.graph_cache.read().get(&key) {
            return Ok(graph.clone());
        }

        let mut cache = self.graph_cache.write();
        if let Some(graph) = cache.get(&key) {
            return Ok(graph.clone());
        }

        let built = Arc::new(build_working_graph(self, add_reverse, compact)?);
        cache.insert(key, built.clone());
        Ok(built)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs::AttrMap;

    fn sample() -> Network {
        let mut net = Network::new();
        net.add_node("A", AttrMap::new()).unwrap();
        net.add_node("B", AttrMap::new()).unwrap();
        net.add_node("C", AttrMap::new()).unwrap();
        net.add_link("A", "B", 1.0, 10.0, AttrMap::new()).unwrap();
        net.add_link("B", "C", 1.0, 10.0, AttrMap::new()).unwrap();
        net
    }

    #[test]
    fn excluded_node_hides_incident_links() {
        let net = sample();
        let mut excluded = IndexSet::new();
        excluded.insert("B".to_string());
        let view = NetworkView::from_excluded_sets(&net, excluded, IndexSet::new());

        assert_eq!(view.visible_nodes().count(), 2);
        assert_eq!(view.visible_links().count(), 0);
    }

    #[test]
    fn disabled_node_is_hidden_without_explicit_exclusion() {
        let mut net = sample();
        net.disable_node("C").unwrap();
        let view = NetworkView::from_excluded_sets(&net, IndexSet::new(), IndexSet::new());
        assert_eq!(view.visible_nodes().count(), 2);
        assert_eq!(view.visible_links().count(), 1);
    }

    #[test]
    fn working_graph_is_cached_per_flag_tuple() {
        let net = sample();
        let view = NetworkView::from_excluded_sets(&net, IndexSet::new(), IndexSet::new());
        let g1 = view.working_graph(false, false).unwrap();
        let g2 = view.working_graph(false, false).unwrap();
        assert!(Arc::ptr_eq(&g1, &g2));

        let g3 = view.working_graph(true, false).unwrap();
        assert!(!Arc::ptr_eq(&g1, &g3));
    }

    #[test]
    fn view_never_mutates_base_network() {
        let net = sample();
        let before = serde_json::to_string(&net).unwrap();
        {
            let view = NetworkView::from_excluded_sets(&net, IndexSet::new(), IndexSet::new());
            let _ = view.working_graph(true, true).unwrap();
        }
        let after = serde_json::to_string(&net).unwrap();
        assert_eq!(before, after);
    }
}
