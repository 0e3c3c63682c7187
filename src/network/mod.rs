//! The authoritative topology (§3, §4.2).
//!
//! `Network` owns nodes, links, and risk groups; it is never mutated during
//! an analysis iteration. Per-iteration exclusion overlays are
//! [`view::NetworkView`]s, built on top of an (immutable, as far as any
//! analysis is concerned) `&Network`.

pub mod builder;
pub mod select;
pub mod view;

use indexmap::{IndexMap, IndexSet};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::attrs::AttrMap;
use crate::error::{GraphError, GraphResult};

pub use select::select_node_groups_by_path;
pub use view::NetworkView;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    pub disabled: bool,
    pub risk_groups: IndexSet<String>,
    pub attrs: AttrMap,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Node {
            name: name.into(),
            disabled: false,
            risk_groups: IndexSet::new(),
            attrs: AttrMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Link {
    pub id: String,
    pub source: String,
    pub target: String,
    pub capacity: f64,
    pub cost: f64,
    pub disabled: bool,
    pub risk_groups: IndexSet<String>,
    pub attrs: AttrMap,
}

/// Generates a link id of the form `source|target|<rand22>`, matching §3.
/// Uniqueness, not reproducibility, is the property that matters here — the
/// specification's seeded-determinism requirements (§4.9) are scoped to
/// Monte-Carlo selection and failure sampling, not to link identity.
fn random_link_id(source: &str, target: &str) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(22)
        .map(char::from)
        .collect();
    format!("{source}|{target}|{suffix}")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskGroup {
    pub name: String,
    pub children: Vec<RiskGroup>,
    pub disabled: bool,
    pub attrs: AttrMap,
}

impl RiskGroup {
    pub fn new(name: impl Into<String>) -> Self {
        RiskGroup {
            name: name.into(),
            children: Vec::new(),
            disabled: false,
            attrs: AttrMap::new(),
        }
    }

    fn find<'a>(&'a self, name: &str) -> Option<&'a RiskGroup> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(name))
    }

    fn find_mut<'a>(&'a mut self, name: &str) -> Option<&'a mut RiskGroup> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter_mut().find_map(|c| c.find_mut(name))
    }

    fn collect_names(&self, recursive: bool, out: &mut Vec<String>) {
        out.push(self.name.clone());
        if recursive {
            for child in &self.children {
                child.collect_names(true, out);
            }
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Network {
    pub nodes: IndexMap<String, Node>,
    pub links: IndexMap<String, Link>,
    pub risk_groups: IndexMap<String, RiskGroup>,
    pub attrs: AttrMap,
}

impl Network {
    pub fn new() -> Self {
        Network::default()
    }

    pub fn add_node(&mut self, name: impl Into<String>, attrs: AttrMap) -> GraphResult<&Node> {
        let name = name.into();
        if self.nodes.contains_key(&name) {
            return Err(GraphError::duplicate_entity(format!("node '{name}' already exists"))
                .with_context("node", &name));
        }
        let mut node = Node::new(name.clone());
        node.attrs = attrs;
        self.nodes.insert(name.clone(), node);
        Ok(&self.nodes[&name])
    }

    /// Adds a link, assigning it a stable, unique id. Returns the id.
    pub fn add_link(
        &mut self,
        source: impl Into<String>,
        target: impl Into<String>,
        cost: f64,
        capacity: f64,
        attrs: AttrMap,
    ) -> GraphResult<String> {
        let source = source.into();
        let target = target.into();
        if !self.nodes.contains_key(&source) {
            return Err(GraphError::unknown_entity(format!("node '{source}' does not exist")));
        }
        if !self.nodes.contains_key(&target) {
            return Err(GraphError::unknown_entity(format!("node '{target}' does not exist")));
        }

        let mut id = random_link_id(&source, &target);
        while self.links.contains_key(&id) {
            id = random_link_id(&source, &target);
        }

        self.links.insert(
            id.clone(),
            Link {
                id: id.clone(),
                source,
                target,
                capacity,
                cost,
                disabled: false,
                risk_groups: IndexSet::new(),
                attrs,
            },
        );
        Ok(id)
    }

    pub fn add_risk_group(&mut self, group: RiskGroup) -> GraphResult<()> {
        if self.risk_groups.contains_key(&group.name) {
            return Err(GraphError::duplicate_entity(format!(
                "risk group '{}' already exists",
                group.name
            )));
        }
        self.risk_groups.insert(group.name.clone(), group);
        Ok(())
    }

    pub fn enable_node(&mut self, name: &str) -> GraphResult<()> {
        self.node_mut(name)?.disabled = false;
        Ok(())
    }

    pub fn disable_node(&mut self, name: &str) -> GraphResult<()> {
        self.node_mut(name)?.disabled = true;
        Ok(())
    }

    pub fn enable_link(&mut self, id: &str) -> GraphResult<()> {
        self.link_mut(id)?.disabled = false;
        Ok(())
    }

    pub fn disable_link(&mut self, id: &str) -> GraphResult<()> {
        self.link_mut(id)?.disabled = true;
        Ok(())
    }

    fn node_mut(&mut self, name: &str) -> GraphResult<&mut Node> {
        self.nodes
            .get_mut(name)
            .ok_or_else(|| GraphError::unknown_entity(format!("node '{name}' does not exist")))
    }

    fn link_mut(&mut self, id: &str) -> GraphResult<&mut Link> {
        self.links
            .get_mut(id)
            .ok_or_else(|| GraphError::unknown_entity(format!("link '{id}' does not exist")))
    }

    /// Disables every node/link tagged with risk group `name` (and, if
    /// `recursive`, every tagged with a descendant risk group).
    pub fn disable_risk_group(&mut self, name: &str, recursive: bool) -> GraphResult<()> {
        let mut names = Vec::new();
        {
            let group = self
                .risk_groups
                .values()
                .find_map(|g| g.find(name))
                .ok_or_else(|| GraphError::unknown_entity(format!("risk group '{name}' does not exist")))?;
            group.collect_names(recursive, &mut names);
        }

        for group_name in &names {
            if let Some(group) = self.risk_groups.values_mut().find_map(|g| g.find_mut(group_name)) {
                group.disabled = true;
            }
        }

        let name_set: IndexSet<&str> = names.iter().map(|s| s.as_str()).collect();
        for node in self.nodes.values_mut() {
            if node.risk_groups.iter().any(|rg| name_set.contains(rg.as_str())) {
                node.disabled = true;
            }
        }
        for link in self.links.values_mut() {
            if link.risk_groups.iter().any(|rg| name_set.contains(rg.as_str())) {
                link.disabled = true;
            }
        }
        Ok(())
    }

    pub fn find_links<F>(&self, pred: F) -> Vec<&Link>
    where
        F: Fn(&Link) -> bool,
    {
        self.links.values().filter(|l| pred(l)).collect()
    }

    pub fn get_links_between(&self, source: &str, target: &str) -> Vec<&Link> {
        self.links
            .values()
            .filter(|l| l.source == source && l.target == target)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_network() -> Network {
        let mut net = Network::new();
        net.add_node("A", AttrMap::new()).unwrap();
        net.add_node("B", AttrMap::new()).unwrap();
        net.add_link("A", "B", 1.0, 10.0, AttrMap::new()).unwrap();
        net
    }

    #[test]
    fn add_node_rejects_duplicates() {
        let mut net = sample_network();
        assert!(net.add_node("A", AttrMap::new()).is_err());
    }

    #[test]
    fn add_link_requires_known_endpoints() {
        let mut net = sample_network();
        assert!(net.add_link("A", "ghost", 1.0, 1.0, AttrMap::new()).is_err());
    }

    #[test]
    fn link_ids_are_unique_and_stable() {
        let mut net = sample_network();
        let id2 = net.add_link("A", "B", 1.0, 10.0, AttrMap::new()).unwrap();
        assert_ne!(id2, net.links.keys().next().unwrap().clone());
        assert!(id2.starts_with("A|B|"));
    }

    #[test]
    fn disable_risk_group_cascades_to_tagged_entities() {
        let mut net = sample_network();
        net.nodes.get_mut("B").unwrap().risk_groups.insert("rack1".to_string());
        net.add_risk_group(RiskGroup::new("rack1")).unwrap();

        net.disable_risk_group("rack1", false).unwrap();
        assert!(net.nodes["B"].disabled);
        assert!(!net.nodes["A"].disabled);
    }

    #[test]
    fn disable_risk_group_recursive_reaches_children() {
        let mut net = sample_network();
        net.nodes.get_mut("A").unwrap().risk_groups.insert("child".to_string());

        let mut parent = RiskGroup::new("parent");
        parent.children.push(RiskGroup::new("child"));
        net.add_risk_group(parent).unwrap();

        net.disable_risk_group("parent", true).unwrap();
        assert!(net.nodes["A"].disabled);
    }
}
