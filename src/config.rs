//! Ambient engine tunables, loaded independently of any one analysis run.
//!
//! These are the knobs that don't belong to a particular `Network`,
//! `NetworkView`, or `FlowPolicy` instance but govern how the engine as a
//! whole behaves: default numerical tolerances, how much parallelism a
//! Monte-Carlo run defaults to, and how large per-view working-graph
//! caches are allowed to grow.

use serde::{Deserialize, Serialize};

fn default_tolerance() -> f64 {
    1e-9
}

fn default_parallelism() -> usize {
    1
}

fn default_view_cache_capacity() -> usize {
    1000
}

/// Engine-wide defaults, typically loaded once at process start and
/// threaded through to `MaxFlowOptions`/`FailureManager` call sites that
/// don't specify an override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_tolerance")]
    pub default_tolerance: f64,

    #[serde(default = "default_parallelism")]
    pub default_parallelism: usize,

    #[serde(default = "default_view_cache_capacity")]
    pub view_cache_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            default_tolerance: default_tolerance(),
            default_parallelism: default_parallelism(),
            view_cache_capacity: default_view_cache_capacity(),
        }
    }
}

impl EngineConfig {
    /// Parses a config from its JSON representation, falling back to
    /// defaults for any missing field.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
