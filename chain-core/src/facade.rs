//! The query facade (§4.1): the only part of the pipeline that suspends
//! (spec.md §5). `chain-core` depends only on the [`IndexFacade`] trait —
//! concrete backends (a real search index, an in-memory fixture store) are
//! deliberately out of scope for this crate (spec.md §1) and live in the
//! binary that wires the pipeline to the outside world.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::model::{HostAddress, ProcessGuid, RawAlarm, RawLog, TraceId};

/// Inclusive time window for the alarm query, epoch milliseconds.
#[derive(Clone, Copy, Debug)]
pub struct TimeWindow {
    pub start_ms: i64,
    pub end_ms: i64,
}

/// Three batched lookups, matching spec.md §4.1 verbatim. None of these
/// methods return `Result`: per spec, a query failure or timeout is
/// swallowed by the facade and surfaces as an empty result plus a logged
/// failure mode — "the caller never sees a partial exception."
#[async_trait]
pub trait IndexFacade: Send + Sync {
    /// Per-IP result ordered by severity desc, then time asc.
    async fn batch_query_alarms(
        &self,
        ips: &[HostAddress],
        window: TimeWindow,
    ) -> HashMap<HostAddress, Vec<RawAlarm>>;

    /// One bulk call filtered by `traceId`, `hostAddress`, and
    /// `logType ∈ BUILDER_LOG_TYPES`.
    async fn batch_query_logs(&self, host_to_trace: &HashMap<HostAddress, TraceId>) -> Vec<RawLog>;

    /// Used only by the upward extender (§4.6): follows `parentProcessGuid`
    /// up to `max_levels` across trace boundaries, scoped to `host`.
    async fn query_logs_by_process_guids(
        &self,
        host: &HostAddress,
        process_guids: &[ProcessGuid],
        max_levels: u32,
    ) -> Vec<RawLog>;
}

/// Defensive second filter (spec.md §4.1 rationale): even though the index
/// query itself filters by `logType`, every facade re-checks here before
/// handing logs to the builder.
pub fn filter_recognized_logs(logs: Vec<RawLog>) -> Vec<RawLog> {
    logs.into_iter().filter(|l| l.log_type.is_recognized()).collect()
}

/// An in-memory facade over pre-loaded fixtures. This is the facade every
/// seed scenario in spec.md §8 and every integration test in this workspace
/// runs against; it is also a reasonable stand-in for a cached snapshot in
/// a demo deployment.
#[derive(Clone, Debug, Default)]
pub struct InMemoryIndexFacade {
    alarms_by_host: HashMap<HostAddress, Vec<RawAlarm>>,
    logs: Vec<RawLog>,
}

impl InMemoryIndexFacade {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_alarms(mut self, host: HostAddress, alarms: Vec<RawAlarm>) -> Self {
        self.alarms_by_host.entry(host).or_default().extend(alarms);
        self
    }

    pub fn with_logs(mut self, logs: Vec<RawLog>) -> Self {
        self.logs.extend(logs);
        self
    }

    fn log_for(&self, host: &HostAddress, guid: &ProcessGuid) -> Option<&RawLog> {
        self.logs
            .iter()
            .find(|l| &l.host_address == host && &l.process_guid == guid)
    }
}

#[async_trait]
impl IndexFacade for InMemoryIndexFacade {
    async fn batch_query_alarms(
        &self,
        ips: &[HostAddress],
        window: TimeWindow,
    ) -> HashMap<HostAddress, Vec<RawAlarm>> {
        let mut out = HashMap::new();
        for ip in ips {
            let mut alarms: Vec<RawAlarm> = self
                .alarms_by_host
                .get(ip)
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .filter(|a| a.timestamp >= window.start_ms && a.timestamp <= window.end_ms)
                .collect();
            alarms.sort_by(|a, b| b.severity.cmp(&a.severity).then(a.timestamp.cmp(&b.timestamp)));
            out.insert(ip.clone(), alarms);
        }
        out
    }

    async fn batch_query_logs(&self, host_to_trace: &HashMap<HostAddress, TraceId>) -> Vec<RawLog> {
        let logs = self
            .logs
            .iter()
            .filter(|l| {
                host_to_trace
                    .get(&l.host_address)
                    .map(|t| t == &l.trace_id)
                    .unwrap_or(false)
            })
            .cloned()
            .collect();
        filter_recognized_logs(logs)
    }

    async fn query_logs_by_process_guids(
        &self,
        host: &HostAddress,
        process_guids: &[ProcessGuid],
        max_levels: u32,
    ) -> Vec<RawLog> {
        let mut result = Vec::new();
        let mut frontier: Vec<ProcessGuid> = process_guids.to_vec();

        for _ in 0..max_levels {
            let mut next_frontier = Vec::new();
            for guid in &frontier {
                let Some(child_log) = self.log_for(host, guid) else {
                    continue;
                };
                let Some(parent_guid) = child_log.parent_process_guid.clone() else {
                    continue;
                };
                if let Some(parent_log) = self.log_for(host, &parent_guid) {
                    result.push(parent_log.clone());
                    next_frontier.push(parent_guid);
                }
            }
            if next_frontier.is_empty() {
                break;
            }
            frontier = next_frontier;
        }

        result
    }
}
