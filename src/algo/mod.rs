//! Shortest-path, blocking-flow, and max-flow algorithms (§4.3–§4.5).

pub mod capacity;
pub mod ksp;
pub mod maxflow;
pub mod path;
pub mod spf;

pub use capacity::{calc_graph_capacity, FlowPlacement};
pub use ksp::{ksp, KspPath};
pub use maxflow::{
    calc_max_flow, max_flow, max_flow_detailed, max_flow_with_summary, run_sensitivity, saturated_edges, CostKey,
    FlowSummary, GroupMode, MaxFlowOptions, MaxFlowResult,
};
pub use path::{resolve_to_paths, PathBundle, PathTuple};
pub use spf::{spf, EdgeSelect, PredMap};
