//! Graph builder (§4.3, late-entity-extraction variant): merges elected
//! alarms and raw logs for the same `processGuid` into a single node, then
//! emits deduplicated `parent -> child` edges.
//!
//! spec.md §9 collapses the historical multiple overloaded entry points
//! into one authoritative signature: `build(alarms, logs, traceIds,
//! associatedEventIds)`.

use std::collections::HashSet;

use crate::error::{ChainError, ChainResult};
use crate::graph::ChainGraph;
use crate::identifier::identify_roots_and_broken;
use crate::model::{BuilderNode, EdgeAnnotation, EventId, HostAddress, ProcessGuid, RawAlarm, RawLog, TraceId};

/// Build the process-centric graph for one request. `trace_ids` is the full
/// set of traces this request covers (spanning every host); `alarms` and
/// `logs` may themselves span multiple hosts.
///
/// File/domain/network/registry entities are *not* materialized here — see
/// `entity` for the late-extraction pass that runs once the process graph
/// is stable.
pub fn build(
    alarms: Vec<RawAlarm>,
    logs: Vec<RawLog>,
    trace_ids: &HashSet<TraceId>,
    network_associated_event_ids: &HashSet<EventId>,
) -> ChainResult<ChainGraph> {
    let mut graph = ChainGraph::new();

    for alarm in alarms {
        let guid = alarm.process_guid.clone();
        let trace_id = alarm.trace_id.clone();
        let host = alarm.host_address.clone();
        ensure_node(&mut graph, &guid, &trace_id, &host, alarm.parent_process_guid.clone())?;

        let node = graph
            .index
            .get_mut(&guid)
            .expect("ensure_node just inserted or confirmed this node");
        node.push_alarm(alarm);
        graph.index.set_alarm(&guid, true);
    }

    for log in logs {
        if !log.log_type.is_recognized() {
            continue; // defensive second filter, spec.md §4.1 rationale
        }
        let guid = log.process_guid.clone();
        let trace_id = log.trace_id.clone();
        let host = log.host_address.clone();
        ensure_node(&mut graph, &guid, &trace_id, &host, log.parent_process_guid.clone())?;

        let privileged = network_associated_event_ids.contains(&log.event_id);
        let node = graph
            .index
            .get_mut(&guid)
            .expect("ensure_node just inserted or confirmed this node");
        node.accumulate_log(log, privileged);
    }

    emit_parent_child_edges(&mut graph);
    identify_roots_and_broken(&mut graph.index, trace_ids);

    Ok(graph)
}

/// Create-or-fetch the node for `guid`. Refuses to silently merge a
/// `processGuid` observed under two different `traceId`s in the same
/// request (spec.md §9 Open Question 3: treated one-to-one upstream;
/// collisions are refused with an error here rather than merged).
///
/// `parent` is the `parentProcessGuid` carried on the alarm/log that
/// prompted this call. The node's own `parent_process_guid` is populated
/// from the first record that carries one — the same "first writer wins"
/// adoption rule as the process attributes in
/// [`BuilderNode::accumulate_log`] — since every record for a given
/// `processGuid` is expected to agree on its parent.
fn ensure_node(
    graph: &mut ChainGraph,
    guid: &ProcessGuid,
    trace_id: &TraceId,
    host: &HostAddress,
    parent: Option<ProcessGuid>,
) -> ChainResult<()> {
    if let Some(existing) = graph.index.get(guid) {
        if &existing.trace_id != trace_id {
            return Err(ChainError::CrossTraceCollision {
                guid: guid.to_string(),
                first: existing.trace_id.to_string(),
                second: trace_id.to_string(),
            });
        }
        if parent.is_some() {
            let node = graph.index.get_mut(guid).expect("just confirmed present");
            if node.parent_process_guid.is_none() {
                node.parent_process_guid = parent;
            }
        }
        return Ok(());
    }
    let mut node = BuilderNode::new(guid.clone(), trace_id.clone(), host.clone());
    node.parent_process_guid = parent;
    graph.index.insert(node);
    Ok(())
}

fn emit_parent_child_edges(graph: &mut ChainGraph) {
    let pairs: Vec<(ProcessGuid, ProcessGuid)> = graph
        .index
        .iter()
        .filter_map(|n| {
            n.parent_process_guid
                .as_ref()
                .filter(|p| graph.index.contains(p))
                .map(|p| (p.clone(), n.process_guid.clone()))
        })
        .collect();

    for (parent, child) in pairs {
        graph.add_edge(parent, child, EdgeAnnotation::Ordinary);
    }
}
