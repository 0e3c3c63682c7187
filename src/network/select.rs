//! Node-group selection (§4.2).
//!
//! `select_node_groups_by_path` groups nodes either by an anchored regex
//! (with capture-group labels) or, for `attr:<name>` patterns, by the value
//! of a node attribute.

use indexmap::IndexMap;
use regex::Regex;

use crate::error::{GraphError, GraphResult};

use super::Node;

const ATTR_PREFIX: &str = "attr:";

/// Groups `nodes` by `pattern`, preserving first-match insertion order.
/// Never errors on "zero matches" — callers that need `NoMatch` semantics
/// check for an empty result themselves, since some call sites (e.g.
/// optional group expansion) tolerate an empty match and others don't.
pub fn select_node_groups_by_path<'a>(
    nodes: impl Iterator<Item = &'a Node>,
    pattern: &str,
) -> GraphResult<IndexMap<String, Vec<&'a Node>>> {
    let mut groups: IndexMap<String, Vec<&'a Node>> = IndexMap::new();

    if let Some(attr_name) = pattern.strip_prefix(ATTR_PREFIX) {
        for node in nodes {
            if let Some(value) = node.attrs.get(attr_name) {
                groups.entry(value.to_string()).or_default().push(node);
            }
        }
        return Ok(groups);
    }

    let anchored = format!(r"\A(?:{pattern})");
    let re = Regex::new(&anchored)
        .map_err(|e| GraphError::invalid_argument(format!("invalid node selection regex '{pattern}': {e}")))?;
    let has_groups = re.captures_len() > 1;

    for node in nodes {
        let Some(caps) = re.captures(&node.name) else {
            continue;
        };

        let label = if has_groups {
            caps.iter()
                .skip(1)
                .filter_map(|m| m.map(|m| m.as_str()))
                .collect::<Vec<_>>()
                .join("|")
        } else {
            pattern.to_string()
        };

        groups.entry(label).or_default().push(node);
    }

    Ok(groups)
}
