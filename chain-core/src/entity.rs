//! Entity extractor (§4.8): turns non-process logs hanging off an already
//! stable process graph into their own file/domain/network/registry nodes.
//!
//! Runs once the process graph is stable — after the extender, before the
//! pruner (spec.md §5) — so the pruner's node-count accounting and
//! importance scoring see entity nodes too.

use std::collections::HashMap;

use crate::graph::ChainGraph;
use crate::model::{BuilderNode, EdgeAnnotation, LogType, ProcessGuid};

/// Materialize one entity node per distinct `(logType, salientKey)` pair
/// found across every process node's accumulated logs, with a
/// `process -> entity` edge per occurrence. Entity nodes are looked up by
/// their reserved id (`{logType}_entity:{key}`, spec.md §6) so the same
/// entity referenced from two processes merges into one node.
pub fn extract(graph: &mut ChainGraph) {
    let process_logs: Vec<(ProcessGuid, Vec<(LogType, String, Option<String>)>)> = graph
        .index
        .iter()
        .filter(|n| n.log_type.is_none()) // ordinary process nodes only; entities/explore nodes carry no logs of their own
        .map(|n| {
            let entries = n
                .logs
                .iter()
                .filter(|l| l.log_type != LogType::Process)
                .filter_map(|l| {
                    l.entity_key()
                        .filter(|k| !k.is_empty())
                        .map(|k| (l.log_type, k, l.op_type.clone()))
                })
                .collect();
            (n.process_guid.clone(), entries)
        })
        .collect();

    let mut seen: HashMap<String, ProcessGuid> = HashMap::new();

    for (process_guid, entries) in process_logs {
        for (log_type, key, op_type) in entries {
            let entity_id = format!("{log_type}_entity:{key}");
            let entity_guid = seen
                .entry(entity_id.clone())
                .or_insert_with(|| ProcessGuid::from(entity_id.clone()))
                .clone();

            if !graph.index.contains(&entity_guid) {
                let node = graph.index.get(&process_guid).expect("guid came from this index");
                let trace_id = node.trace_id.clone();
                let host_address = node.host_address.clone();
                let mut entity_node = BuilderNode::new(entity_guid.clone(), trace_id, host_address);
                entity_node.log_type = Some(log_type);
                entity_node.entity_key = Some(key);
                graph.index.insert(entity_node);
            }

            let annotation = match op_type {
                Some(op) => EdgeAnnotation::Custom(op),
                None => EdgeAnnotation::None,
            };
            graph.add_edge(process_guid.clone(), entity_guid, annotation);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BuilderNode, EventId, HostAddress, RawLog, TraceId};

    fn file_log(process_guid: &str, md5: &str) -> RawLog {
        RawLog {
            event_id: EventId::from(format!("E_{process_guid}_{md5}")),
            trace_id: TraceId::from("T001"),
            host_address: HostAddress::from("10.0.0.1"),
            process_guid: ProcessGuid::from(process_guid),
            parent_process_guid: None,
            log_type: LogType::File,
            op_type: Some("create".to_string()),
            file_md5: Some(md5.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn same_file_from_two_processes_merges_into_one_entity() {
        let mut graph = ChainGraph::new();
        let mut a = BuilderNode::new(ProcessGuid::from("A"), TraceId::from("T001"), HostAddress::from("10.0.0.1"));
        a.logs.push(file_log("A", "deadbeef"));
        let mut b = BuilderNode::new(ProcessGuid::from("B"), TraceId::from("T001"), HostAddress::from("10.0.0.1"));
        b.logs.push(file_log("B", "deadbeef"));
        graph.index.insert(a);
        graph.index.insert(b);

        extract(&mut graph);

        let entity_id = ProcessGuid::from("file_entity:deadbeef");
        assert!(graph.index.contains(&entity_id));
        assert_eq!(graph.index.len(), 3); // A, B, one shared entity
        assert!(graph.edges.iter().any(|e| e.source == ProcessGuid::from("A") && e.target == entity_id));
        assert!(graph.edges.iter().any(|e| e.source == ProcessGuid::from("B") && e.target == entity_id));
    }
}
