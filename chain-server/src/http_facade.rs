//! `HttpIndexFacade`: a thin `reqwest` client implementing [`IndexFacade`]
//! against a configurable search-index backend.
//!
//! Modeled on the teacher's `ProxmoxClient` (a typed `reqwest::Client`
//! wrapper whose methods deserialize a `{ data: T }` response envelope) —
//! see SPEC_FULL.md §4.1a. Query shapes follow spec.md §6's "reference
//! only" search-index shape: three POST endpoints under a configurable
//! base URL, each filtered server-side the way spec.md §4.1 describes.
//!
//! Per spec.md §4.1's guarantee, none of these methods ever surfaces a
//! transport error to the pipeline: a timeout or non-2xx response is
//! logged at warn and degrades to an empty result, exactly like the
//! teacher's `ai::provider` HTTP clients degrade on a failed upstream call.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chain_core::facade::{IndexFacade, TimeWindow};
use chain_core::model::{HostAddress, ProcessGuid, RawAlarm, RawLog, TraceId};
use serde::{Deserialize, Serialize};

pub struct HttpIndexFacade {
    base_url: String,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Serialize)]
struct AlarmQuery<'a> {
    ips: &'a [HostAddress],
    start_ms: i64,
    end_ms: i64,
}

#[derive(Debug, Serialize)]
struct LogQuery<'a> {
    host_to_trace: &'a HashMap<HostAddress, TraceId>,
}

#[derive(Debug, Serialize)]
struct AncestorQuery<'a> {
    host: &'a HostAddress,
    process_guids: &'a [ProcessGuid],
    max_levels: u32,
}

impl HttpIndexFacade {
    pub fn new(base_url: String, timeout: Duration) -> Self {
        Self {
            base_url,
            http: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .expect("reqwest client builds with a plain timeout"),
        }
    }
}

#[async_trait]
impl IndexFacade for HttpIndexFacade {
    async fn batch_query_alarms(&self, ips: &[HostAddress], window: TimeWindow) -> HashMap<HostAddress, Vec<RawAlarm>> {
        let url = format!("{}/alarms/batch", self.base_url);
        let body = AlarmQuery {
            ips,
            start_ms: window.start_ms,
            end_ms: window.end_ms,
        };

        match self.http.post(&url).json(&body).send().await {
            Ok(resp) if resp.status().is_success() => match resp.json::<Envelope<HashMap<HostAddress, Vec<RawAlarm>>>>().await {
                Ok(envelope) => envelope.data,
                Err(e) => {
                    log::warn!("batch_query_alarms: failed to decode index response: {e}");
                    HashMap::new()
                }
            },
            Ok(resp) => {
                log::warn!("batch_query_alarms: index returned {}", resp.status());
                HashMap::new()
            }
            Err(e) => {
                log::warn!("batch_query_alarms: index query failed or timed out: {e}");
                HashMap::new()
            }
        }
    }

    async fn batch_query_logs(&self, host_to_trace: &HashMap<HostAddress, TraceId>) -> Vec<RawLog> {
        let url = format!("{}/logs/batch", self.base_url);
        let body = LogQuery { host_to_trace };

        match self.http.post(&url).json(&body).send().await {
            Ok(resp) if resp.status().is_success() => match resp.json::<Envelope<Vec<RawLog>>>().await {
                Ok(envelope) => envelope.data,
                Err(e) => {
                    log::warn!("batch_query_logs: failed to decode index response: {e}");
                    Vec::new()
                }
            },
            Ok(resp) => {
                log::warn!("batch_query_logs: index returned {}", resp.status());
                Vec::new()
            }
            Err(e) => {
                log::warn!("batch_query_logs: index query failed or timed out: {e}");
                Vec::new()
            }
        }
    }

    async fn query_logs_by_process_guids(&self, host: &HostAddress, process_guids: &[ProcessGuid], max_levels: u32) -> Vec<RawLog> {
        let url = format!("{}/logs/ancestors", self.base_url);
        let body = AncestorQuery {
            host,
            process_guids,
            max_levels,
        };

        match self.http.post(&url).json(&body).send().await {
            Ok(resp) if resp.status().is_success() => match resp.json::<Envelope<Vec<RawLog>>>().await {
                Ok(envelope) => envelope.data,
                Err(e) => {
                    log::warn!("query_logs_by_process_guids: failed to decode index response: {e}");
                    Vec::new()
                }
            },
            Ok(resp) => {
                log::warn!("query_logs_by_process_guids: index returned {}", resp.status());
                Vec::new()
            }
            Err(e) => {
                log::warn!("query_logs_by_process_guids: index query failed or timed out: {e}");
                Vec::new()
            }
        }
    }
}
