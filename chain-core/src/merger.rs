//! Merger (§4.9): unions an optional network-side story graph into the
//! reconstructed process chain and bridges `victim` nodes to the process
//! root of their host's trace.

use crate::model::{HostAddress, IncidentProcessChain, ProcessEdge, ProcessNode, TraceId, TraceRootMap};
use std::collections::HashMap;

/// Merge `network_nodes`/`network_edges` (if present) into `endpoint_chain`.
/// `trace_root` is the builder's `traceIdToRootNodeMap`, taken directly —
/// not recomputed from `endpoint_chain` (spec.md §4.9 inputs list).
pub fn merge(
    network_nodes: Option<Vec<ProcessNode>>,
    network_edges: Option<Vec<ProcessEdge>>,
    endpoint_chain: IncidentProcessChain,
    host_to_trace: &HashMap<HostAddress, TraceId>,
    trace_root: &TraceRootMap,
) -> IncidentProcessChain {
    let network_nodes = network_nodes.unwrap_or_default();
    let network_edges = network_edges.unwrap_or_default();

    let mut nodes = network_nodes.clone();
    nodes.extend(endpoint_chain.nodes);
    let mut edges = network_edges;
    edges.extend(endpoint_chain.edges);

    if trace_root.is_empty() {
        log::warn!("merge-chain: traceIdToRootNodeMap is empty; omitting all victim bridges");
    } else {
        for node in &network_nodes {
            let Some(story) = &node.story_node else { continue };
            if story.node_type != "victim" {
                continue;
            }
            let host = HostAddress::from(story.node.clone());
            let Some(trace_id) = host_to_trace.get(&host) else { continue };
            let Some(root) = trace_root.get(trace_id) else { continue };
            edges.push(ProcessEdge {
                source: node.node_id.clone(),
                target: root.to_string(),
                val: String::new(),
            });
        }
    }

    IncidentProcessChain {
        nodes,
        edges,
        trace_ids: endpoint_chain.trace_ids,
        host_addresses: endpoint_chain.host_addresses,
        threat_severity: endpoint_chain.threat_severity,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LogType, Severity, StoryNodeInfo};

    fn victim_node(id: &str, ip: &str) -> ProcessNode {
        ProcessNode {
            node_id: id.to_string(),
            is_chain_node: false,
            log_type: LogType::Process,
            node_threat_severity: None,
            chain_node: None,
            story_node: Some(StoryNodeInfo {
                node_type: "victim".to_string(),
                node: ip.to_string(),
                other: None,
            }),
        }
    }

    fn empty_endpoint_chain() -> IncidentProcessChain {
        IncidentProcessChain {
            nodes: vec![],
            edges: vec![],
            trace_ids: vec!["T001".to_string()],
            host_addresses: vec!["10.0.0.1".to_string()],
            threat_severity: Severity::High,
        }
    }

    #[test]
    fn victim_bridges_to_trace_root() {
        let host_to_trace: HashMap<HostAddress, TraceId> =
            [(HostAddress::from("10.0.0.1"), TraceId::from("T001"))].into_iter().collect();
        let mut trace_root = TraceRootMap::new();
        trace_root.insert(TraceId::from("T001"), crate::model::ProcessGuid::from("ROOT"));

        let merged = merge(
            Some(vec![victim_node("victim1", "10.0.0.1")]),
            None,
            empty_endpoint_chain(),
            &host_to_trace,
            &trace_root,
        );

        assert!(merged
            .edges
            .iter()
            .any(|e| e.source == "victim1" && e.target == "ROOT" && e.val.is_empty()));
    }

    #[test]
    fn empty_trace_root_map_omits_bridges_without_failing() {
        let host_to_trace: HashMap<HostAddress, TraceId> =
            [(HostAddress::from("10.0.0.1"), TraceId::from("T001"))].into_iter().collect();

        let merged = merge(
            Some(vec![victim_node("victim1", "10.0.0.1")]),
            None,
            empty_endpoint_chain(),
            &host_to_trace,
            &TraceRootMap::new(),
        );

        assert!(merged.edges.is_empty());
        assert_eq!(merged.nodes.len(), 1);
    }
}
