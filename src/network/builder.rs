//! Materializes a [`crate::graph::StrictMultiDiGraph`] working graph from a
//! [`super::NetworkView`] (§4.2, "Working-graph builder").

use crate::attrs::{AttrMap, AttrValue};
use crate::error::GraphResult;
use crate::graph::StrictMultiDiGraph;

use super::view::NetworkView;

/// Builds the working graph for `view`.
///
/// Each visible link becomes one forward edge; if `add_reverse`, a
/// `target -> source` edge with the same cost/capacity is added too. In
/// `compact` mode only `cost`/`capacity` survive and nodes carry no
/// attributes; otherwise the original link id and attributes are kept on
/// the forward edge (the synthesized reverse edge never existed in the
/// base topology, so it carries no link id).
pub fn build_working_graph(
    view: &NetworkView,
    add_reverse: bool,
    compact: bool,
) -> GraphResult<StrictMultiDiGraph> {
    let mut graph = StrictMultiDiGraph::new();

    for node in view.visible_nodes() {
        let attrs = if compact { AttrMap::new() } else { node.attrs.clone() };
        graph.add_node(node.name.clone(), attrs)?;
    }

    for link in view.visible_links() {
        let forward_attrs = if compact {
            AttrMap::new()
        } else {
            let mut attrs = link.attrs.clone();
            attrs.insert("id".to_string(), AttrValue::String(link.id.clone()));
            attrs
        };

        graph.add_edge(&link.source, &link.target, None, link.cost, link.capacity, forward_attrs)?;

        if add_reverse {
            graph.add_edge(&link.target, &link.source, None, link.cost, link.capacity, AttrMap::new())?;
        }
    }

    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Network;
    use indexmap::IndexSet;

    fn sample() -> Network {
        let mut net = Network::new();
        net.add_node("A", AttrMap::new()).unwrap();
        net.add_node("B", AttrMap::new()).unwrap();
        net.add_link("A", "B", 1.0, 10.0, AttrMap::new()).unwrap();
        net
    }

    #[test]
    fn builder_adds_reverse_edges_when_requested() {
        let net = sample();
        let view = NetworkView::from_excluded_sets(&net, IndexSet::new(), IndexSet::new());
        let graph = build_working_graph(&view, true, false).unwrap();
        assert_eq!(graph.edges_between("A", "B").len(), 1);
        assert_eq!(graph.edges_between("B", "A").len(), 1);
    }

    #[test]
    fn compact_mode_strips_attributes() {
        let mut net = sample();
        net.nodes.get_mut("A").unwrap().attrs.insert("x".to_string(), 1i64.into());
        let view = NetworkView::from_excluded_sets(&net, IndexSet::new(), IndexSet::new());
        let graph = build_working_graph(&view, false, true).unwrap();
        assert!(graph.get_node_attr("A").unwrap().attrs.is_empty());
    }
}
