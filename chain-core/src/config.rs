//! Deterministic resource bounds (spec.md §5) and the request-scoped
//! configuration that carries them. Bounds are compile-time constants — the
//! spec is explicit that they are "deterministic, not tuned per-request" —
//! but `ChainConfig` lets a caller override them (e.g. in tests) without
//! reaching into the pipeline internals.

/// Upward walk depth guard during root identification.
pub const MAX_TRAVERSE_DEPTH: u32 = 50;
/// Per-node log cap before the log-accumulation policy starts dropping
/// non-privileged logs (§4.3.1).
pub const MAX_LOGS_PER_NODE: usize = 1000;
/// Node count ceiling that triggers the pruner (§4.7).
pub const MAX_NODE_COUNT: usize = 400;
/// Upward extension depth (§4.6).
pub const MAX_EXT_DEPTH: u32 = 2;
/// Upper bound on a single facade query's result size.
pub const MAX_QUERY_SIZE: usize = 10_000;

/// Request-scoped configuration. `chain-core` never reads the environment
/// directly; the caller (`chain-server`) is responsible for loading these
/// from configuration and passing the result in by value.
#[derive(Clone, Copy, Debug)]
pub struct ChainConfig {
    pub max_traverse_depth: u32,
    pub max_logs_per_node: usize,
    pub max_node_count: usize,
    pub max_ext_depth: u32,
    pub max_query_size: usize,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            max_traverse_depth: MAX_TRAVERSE_DEPTH,
            max_logs_per_node: MAX_LOGS_PER_NODE,
            max_node_count: MAX_NODE_COUNT,
            max_ext_depth: MAX_EXT_DEPTH,
            max_query_size: MAX_QUERY_SIZE,
        }
    }
}
