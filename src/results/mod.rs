//! JSON-serializable result shapes for the external interface (§6).
//!
//! These types are plain projections of the algorithm layer's native
//! results (`algo::FlowSummary`, Monte-Carlo sample vectors, failure
//! exclusion sets) into shapes with string-keyed maps, since JSON object
//! keys must be strings. Edge ids and float bit patterns are both encoded
//! so the compatibility requirements in §6 (edge-key and capacity-key
//! round-tripping) hold exactly.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::algo::FlowSummary as AlgoFlowSummary;
use crate::graph::EdgeId;

/// Canonical, exact string encoding of an `f64`'s bit pattern, used as a
/// JSON object key wherever the specification requires "numeric keys
/// preserved bit-for-bit" (§6 compatibility requirements).
pub fn encode_f64_key(value: f64) -> String {
    format!("{:016x}", value.to_bits())
}

/// Inverse of [`encode_f64_key`].
pub fn decode_f64_key(key: &str) -> Option<f64> {
    u64::from_str_radix(key, 16).ok().map(f64::from_bits)
}

/// JSON projection of [`AlgoFlowSummary`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowSummary {
    pub total_flow: f64,
    pub edge_flow: BTreeMap<String, f64>,
    pub residual_cap: BTreeMap<String, f64>,
    pub reachable: Vec<String>,
    pub min_cut: Vec<String>,
    pub cost_distribution: BTreeMap<String, f64>,
}

impl From<&AlgoFlowSummary> for FlowSummary {
    fn from(s: &AlgoFlowSummary) -> Self {
        FlowSummary {
            total_flow: s.total_flow,
            edge_flow: s.edge_flow.iter().map(|(id, v)| (id.to_string(), *v)).collect(),
            residual_cap: s.residual_capacity.iter().map(|(id, v)| (id.to_string(), *v)).collect(),
            reachable: {
                let mut v: Vec<String> = s.reachable.iter().cloned().collect();
                v.sort();
                v
            },
            min_cut: s.min_cut.iter().map(EdgeId::to_string).collect(),
            cost_distribution: s
                .cost_distribution
                .iter()
                .map(|(cost, v)| (encode_f64_key(cost.0), *v))
                .collect(),
        }
    }
}

/// A frequency histogram over Monte-Carlo capacity samples (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapacityEnvelope {
    pub source_pattern: String,
    pub sink_pattern: String,
    pub mode: String,
    pub frequencies: BTreeMap<String, u64>,
    pub min_capacity: f64,
    pub max_capacity: f64,
    pub mean_capacity: f64,
    pub stdev_capacity: f64,
    pub total_samples: u64,
    pub flow_summary_stats: Option<BTreeMap<String, f64>>,
}

impl CapacityEnvelope {
    pub fn from_samples(source_pattern: impl Into<String>, sink_pattern: impl Into<String>, mode: impl Into<String>, samples: &[f64]) -> Self {
        let mut frequencies: BTreeMap<String, u64> = BTreeMap::new();
        for &v in samples {
            *frequencies.entry(encode_f64_key(v)).or_insert(0) += 1;
        }

        let total_samples = samples.len() as u64;
        let (min_capacity, max_capacity, mean_capacity, stdev_capacity) = if samples.is_empty() {
            (0.0, 0.0, 0.0, 0.0)
        } else {
            let min = samples.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = samples.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let mean = samples.iter().sum::<f64>() / samples.len() as f64;
            let variance = samples.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / samples.len() as f64;
            (min, max, mean, variance.sqrt())
        };

        CapacityEnvelope {
            source_pattern: source_pattern.into(),
            sink_pattern: sink_pattern.into(),
            mode: mode.into(),
            frequencies,
            min_capacity,
            max_capacity,
            mean_capacity,
            stdev_capacity,
            total_samples,
            flow_summary_stats: None,
        }
    }
}

/// One unique failure-exclusion pattern and its aggregated outcome (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailurePatternResult {
    pub excluded_nodes: Vec<String>,
    pub excluded_links: Vec<String>,
    pub capacity_matrix: BTreeMap<String, f64>,
    pub count: usize,
    pub is_baseline: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn f64_key_round_trips_exactly() {
        let v = 12.5_f64;
        let key = encode_f64_key(v);
        assert_eq!(decode_f64_key(&key), Some(v));
    }

    #[test]
    fn capacity_envelope_aggregates_basic_stats() {
        let samples = vec![10.0, 10.0, 20.0];
        let env = CapacityEnvelope::from_samples("^s", "^t", "combine", &samples);
        assert_eq!(env.total_samples, 3);
        assert_eq!(env.frequencies[&encode_f64_key(10.0)], 2);
        assert_eq!(env.frequencies[&encode_f64_key(20.0)], 1);
        assert!((env.mean_capacity - 40.0 / 3.0).abs() < 1e-9);
        assert_eq!(env.min_capacity, 10.0);
        assert_eq!(env.max_capacity, 20.0);
    }

    #[test]
    fn empty_samples_yield_zeroed_stats() {
        let env = CapacityEnvelope::from_samples("^s", "^t", "combine", &[]);
        assert_eq!(env.total_samples, 0);
        assert_eq!(env.mean_capacity, 0.0);
    }
}
