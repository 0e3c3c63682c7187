//! The identity of a single placed flow.
//!
//! A [`FlowIndex`] is created when [`crate::policy::FlowPolicy`] places a
//! flow and is used as the key into the per-edge and per-node `flows` maps
//! carried by [`crate::graph::StrictMultiDiGraph`]. It lives in its own
//! module (rather than under `policy`) because both the graph layer and the
//! policy layer need it without creating a dependency cycle.

use serde::{Deserialize, Serialize};

/// `(src, dst, flow_class, flow_id)`, unique within a policy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FlowIndex {
    pub src: String,
    pub dst: String,
    pub flow_class: String,
    pub flow_id: u64,
}

impl FlowIndex {
    pub fn new(src: impl Into<String>, dst: impl Into<String>, flow_class: impl Into<String>, flow_id: u64) -> Self {
        FlowIndex {
            src: src.into(),
            dst: dst.into(),
            flow_class: flow_class.into(),
            flow_id,
        }
    }
}

impl std::fmt::Display for FlowIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}->{}[{}]#{}", self.src, self.dst, self.flow_class, self.flow_id)
    }
}
