//! NetGraph: a network scenario analysis engine.
//!
//! Computes max flows, flow-policy placements, and Monte-Carlo
//! failure-scenario distributions over declarative network topologies.
//!
//! The crate is layered bottom-up:
//! - [`graph`] — `StrictMultiDiGraph`, the directed multigraph every
//!   algorithm runs over.
//! - [`network`] — `Network`/`NetworkView`, the authoritative topology and
//!   its read-only exclusion overlays.
//! - [`algo`] — shortest paths, k-shortest paths, blocking-flow capacity,
//!   and the max-flow driver.
//! - [`policy`] — `FlowPolicy`, converting demands into placed flows.
//! - [`demand`] — `DemandManager`, expanding and scheduling traffic
//!   demands across policies.
//! - [`failure`] — `FailurePolicy`/`FailureManager`, Monte-Carlo
//!   failure-scenario sampling and dispatch.
//! - [`seed`] — deterministic seed derivation shared by the above.
//! - [`results`] — JSON-serializable output shapes.
//! - [`config`] — ambient engine tunables.

pub mod algo;
pub mod attrs;
pub mod config;
pub mod demand;
pub mod error;
pub mod failure;
pub mod flow_index;
pub mod graph;
pub mod network;
pub mod policy;
pub mod results;
pub mod seed;

pub use attrs::{AttrMap, AttrValue};
pub use error::{GraphError, GraphResult};
pub use flow_index::FlowIndex;
pub use graph::{EdgeData, EdgeId, NodeData, StrictMultiDiGraph};
pub use network::{Link, Network, NetworkView, Node, RiskGroup};
