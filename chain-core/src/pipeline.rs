//! Pipeline orchestration: wires every phase together in the strict order
//! spec.md §5 mandates, and converts the internal [`ChainGraph`] into the
//! wire-level [`IncidentProcessChain`] shape.
//!
//! This is the only place in `chain-core` that owns the full phase
//! sequence; callers (the HTTP layer) never reach into individual phases
//! directly.

use std::collections::{HashMap, HashSet};

use crate::builder;
use crate::config::ChainConfig;
use crate::elector;
use crate::entity;
use crate::error::ChainResult;
use crate::explore_root;
use crate::extender;
use crate::facade::{filter_recognized_logs, IndexFacade, TimeWindow};
use crate::identifier;
use crate::merger;
use crate::model::{
    AlarmNodeInfo, ChainNodeInfo, EventId, HostAddress, IncidentProcessChain, IpMappingRelation, ProcessEdge,
    ProcessNode, Severity, TraceId,
};
use crate::pruner;
use crate::role_corrector;
use crate::virtual_parent;

/// Full result of running the reconstruction pipeline once: the servable
/// chain plus the two internal maps the merger needs (spec.md §4.9) but
/// which `IncidentProcessChain` intentionally excludes (spec.md §3).
pub struct GenerateOutcome {
    pub chain: IncidentProcessChain,
    pub host_to_trace: HashMap<HostAddress, TraceId>,
    pub trace_root: crate::model::TraceRootMap,
}

/// `POST /api/processchain/batch-generate` (spec.md §6).
///
/// Returns `Ok(None)` for the documented "empty input" case: an empty or
/// missing `ipAndAssociation` map, which the HTTP layer renders as `200`
/// with a `null` body rather than any 4xx (spec.md §6, §7).
pub async fn generate(
    facade: &dyn IndexFacade,
    ip_mapping: &IpMappingRelation,
    window: TimeWindow,
    config: &ChainConfig,
) -> ChainResult<Option<IncidentProcessChain>> {
    Ok(generate_outcome(facade, ip_mapping, window, config).await?.map(|o| o.chain))
}

/// Runs the same reconstruction as [`generate`] but also returns
/// `host_to_trace` and the builder's `traceIdToRootNodeMap`, so a caller that
/// needs both the chain and the merger's inputs (i.e. `merge_chain` below)
/// doesn't have to re-run election and graph assembly a second time.
pub async fn generate_outcome(
    facade: &dyn IndexFacade,
    ip_mapping: &IpMappingRelation,
    window: TimeWindow,
    config: &ChainConfig,
) -> ChainResult<Option<GenerateOutcome>> {
    if ip_mapping.ip_and_association.is_empty() {
        log::error!("batch-generate called with an empty ipAndAssociation map");
        return Ok(None);
    }

    let ips: Vec<HostAddress> = ip_mapping.ip_and_association.keys().map(|ip| HostAddress::from(ip.clone())).collect();
    let alarms_by_host = facade.batch_query_alarms(&ips, window).await;

    let mut host_to_trace: HashMap<HostAddress, TraceId> = HashMap::new();
    let mut elected_alarms = Vec::new();

    for ip in &ips {
        let Some(association) = ip_mapping.ip_and_association.get(ip.as_str()) else {
            continue;
        };
        let host_alarms = alarms_by_host.get(ip).cloned().unwrap_or_default();
        if host_alarms.is_empty() {
            log::error!("host {ip} contributed no alarms in the query window; skipped");
            continue;
        }

        let elected = elector::elect(&host_alarms, association.associated_event_id.as_ref(), association.has_association);
        if let Some(first) = elected.first() {
            host_to_trace.insert(ip.clone(), first.trace_id.clone());
        }
        elected_alarms.extend(elected);
    }

    if host_to_trace.is_empty() {
        log::error!("no host elected a trace; nothing to reconstruct");
        return Ok(None);
    }

    let raw_logs = facade.batch_query_logs(&host_to_trace).await;
    let logs = filter_recognized_logs(raw_logs);

    let network_associated_event_ids: HashSet<EventId> = ip_mapping
        .ip_and_association
        .values()
        .filter(|a| a.has_association)
        .filter_map(|a| a.associated_event_id.clone())
        .collect();

    let trace_ids: HashSet<TraceId> = host_to_trace.values().cloned().collect();
    let mut graph = builder::build(elected_alarms, logs, &trace_ids, &network_associated_event_ids)?;

    virtual_parent::synthesize(&mut graph);
    identifier::refresh_broken(&mut graph.index);

    explore_root::synthesize(&mut graph, &trace_ids);

    extender::extend(&mut graph, facade, &host_to_trace, config.max_ext_depth).await;
    identifier::refresh_broken(&mut graph.index);

    virtual_parent::post_link_adjustment(&mut graph);
    identifier::refresh_broken(&mut graph.index);

    entity::extract(&mut graph);

    if pruner::prune(&mut graph, config.max_node_count, config.max_traverse_depth, &network_associated_event_ids) {
        identifier::refresh_broken(&mut graph.index);
        explore_root::synthesize(&mut graph, &trace_ids);
    }

    let chain = to_incident_process_chain(&graph, &trace_ids);
    Ok(Some(GenerateOutcome {
        chain,
        host_to_trace,
        trace_root: graph.trace_root,
    }))
}

/// `POST /api/processchain/merge-chain` (spec.md §6): re-runs the same
/// reconstruction as [`generate`], applies an optional role-focus
/// correction to the network-side story graph, then unions it in and
/// bridges victims against the corrected labels.
pub async fn merge_chain(
    facade: &dyn IndexFacade,
    ip_mapping: &IpMappingRelation,
    window: TimeWindow,
    config: &ChainConfig,
    network_nodes: Option<Vec<ProcessNode>>,
    network_edges: Option<Vec<ProcessEdge>>,
    focus: Option<(&str, &str)>,
) -> ChainResult<Option<IncidentProcessChain>> {
    let Some(outcome) = generate_outcome(facade, ip_mapping, window, config).await? else {
        return Ok(None);
    };

    // Role correction (§4.10) must run on the network-side story graph
    // *before* the merger inserts victim bridges (§4.9): a node that is
    // only a victim after correction still needs its bridge edge, and the
    // merger decides what to bridge from the labels it's handed.
    let mut network_nodes = network_nodes.unwrap_or_default();
    let mut network_edges = network_edges.unwrap_or_default();

    if let Some((focus_ip, focus_object)) = focus {
        role_corrector::correct_roles(&mut network_nodes, &mut network_edges, focus_ip, focus_object);
    }

    let merged = merger::merge(
        Some(network_nodes),
        Some(network_edges),
        outcome.chain,
        &outcome.host_to_trace,
        &outcome.trace_root,
    );

    Ok(Some(merged))
}

fn to_incident_process_chain(graph: &crate::graph::ChainGraph, trace_ids: &HashSet<TraceId>) -> IncidentProcessChain {
    let mut nodes: Vec<ProcessNode> = graph
        .index
        .iter()
        .map(|n| {
            let alarm_node_info = if n.alarms.is_empty() {
                None
            } else {
                Some(AlarmNodeInfo {
                    event_ids: n.alarms.iter().map(|a| a.event_id.to_string()).collect(),
                    severities: n.alarms.iter().map(|a| a.severity).collect(),
                })
            };
            ProcessNode {
                node_id: n.process_guid.to_string(),
                is_chain_node: true,
                log_type: n.effective_log_type(),
                node_threat_severity: n.max_alarm_severity(),
                chain_node: Some(ChainNodeInfo {
                    is_root: n.is_root,
                    is_broken: n.is_broken,
                    is_alarm: n.is_alarm,
                    is_extension_node: n.is_extension_node,
                    extension_depth: n.extension_depth,
                    is_virtual: n.is_virtual,
                    process_entity: n.entity_key.is_some(),
                    alarm_node_info,
                }),
                story_node: None,
            }
        })
        .collect();
    nodes.sort_by(|a, b| a.node_id.cmp(&b.node_id));

    let mut edges: Vec<ProcessEdge> = graph.edges.iter().map(ProcessEdge::from_builder).collect();
    edges.sort_by(|a, b| (a.source.as_str(), a.target.as_str()).cmp(&(b.source.as_str(), b.target.as_str())));

    let mut host_addresses: Vec<String> = graph.index.iter().map(|n| n.host_address.to_string()).collect();
    host_addresses.sort();
    host_addresses.dedup();

    let mut trace_id_strings: Vec<String> = trace_ids.iter().map(|t| t.to_string()).collect();
    trace_id_strings.sort();

    let threat_severity = graph
        .index
        .iter()
        .filter_map(|n| n.max_alarm_severity())
        .max()
        .unwrap_or(Severity::Low);

    IncidentProcessChain {
        nodes,
        edges,
        trace_ids: trace_id_strings,
        host_addresses,
        threat_severity,
    }
}
