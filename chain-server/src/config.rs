//! Environment-driven configuration (SPEC_FULL.md §5 [AMBIENT]).
//!
//! `chain-core` never reads the environment itself — this struct collects
//! the five deterministic resource bounds (with the core's own defaults)
//! plus the facade's base URL and request timeout, loaded once at process
//! start the way the teacher loads Proxmox/AI settings in `main()`: a
//! `dotenv().ok()` followed by scattered `env::var(...).unwrap_or_else(...)`.

use std::env;
use std::time::Duration;

use chain_core::ChainConfig;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub chain: ChainConfig,
    pub index_base_url: String,
    pub request_timeout: Duration,
    pub bind_addr: String,
    pub bind_port: u16,
    /// How far back the alarm query window reaches, since neither inbound
    /// endpoint in spec.md §6 takes an explicit time range.
    pub alarm_window_hours: i64,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let defaults = ChainConfig::default();
        let chain = ChainConfig {
            max_traverse_depth: env_or("MAX_TRAVERSE_DEPTH", defaults.max_traverse_depth),
            max_logs_per_node: env_or("MAX_LOGS_PER_NODE", defaults.max_logs_per_node),
            max_node_count: env_or("MAX_NODE_COUNT", defaults.max_node_count),
            max_ext_depth: env_or("MAX_EXT_DEPTH", defaults.max_ext_depth),
            max_query_size: env_or("MAX_QUERY_SIZE", defaults.max_query_size),
        };

        Self {
            chain,
            index_base_url: env::var("INDEX_BASE_URL").unwrap_or_else(|_| "http://localhost:9200".to_string()),
            request_timeout: Duration::from_secs(env_or("INDEX_QUERY_TIMEOUT_SECS", 10u64)),
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0".to_string()),
            bind_port: env_or("BIND_PORT", 8080u16),
            alarm_window_hours: env_or("ALARM_WINDOW_HOURS", 24i64),
        }
    }
}
