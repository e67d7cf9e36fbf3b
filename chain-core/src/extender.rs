//! Upward extender (§4.6): walks past a trace's current root to show the
//! ancestry that led to it, up to `MAX_EXT_DEPTH` hops.
//!
//! This is the one phase besides the query facade itself that talks to
//! [`IndexFacade`] — `query_logs_by_process_guids` is its sole consumer.

use std::collections::HashMap;

use crate::facade::IndexFacade;
use crate::graph::ChainGraph;
use crate::model::{BuilderNode, EdgeAnnotation, HostAddress, ProcessGuid, TraceId};

/// Extend every trace's current root upward, in place.
///
/// `host_to_trace` is the same host→trace mapping the query facade was
/// given for this request. Explore roots are never extended (spec.md §4.11:
/// `EXPLORE_ROOT` is terminal).
pub async fn extend(
    graph: &mut ChainGraph,
    facade: &dyn IndexFacade,
    host_to_trace: &HashMap<HostAddress, TraceId>,
    max_ext_depth: u32,
) {
    let triples: Vec<(HostAddress, TraceId, ProcessGuid)> = host_to_trace
        .iter()
        .filter_map(|(host, trace_id)| {
            let root = graph.trace_root.get(trace_id)?;
            if root.is_explore_root() {
                return None;
            }
            Some((host.clone(), trace_id.clone(), root.clone()))
        })
        .collect();

    for (host, trace_id, current_root) in triples {
        let ancestor_logs = facade
            .query_logs_by_process_guids(&host, &[current_root.clone()], max_ext_depth)
            .await;
        if ancestor_logs.is_empty() {
            continue; // non-destructive: nothing mutated for this branch
        }

        let mut chain_child = current_root.clone();
        let mut topmost: Option<ProcessGuid> = None;
        let mut depth: u32 = 0;

        for log in ancestor_logs.into_iter().take(max_ext_depth as usize) {
            let ancestor_guid = log.process_guid.clone();
            if ancestor_guid.is_explore_root() {
                break;
            }
            if let Some(existing) = graph.index.get(&ancestor_guid) {
                if existing.is_broken {
                    break;
                }
            }

            depth += 1;
            if !graph.index.contains(&ancestor_guid) {
                let mut node = BuilderNode::new(ancestor_guid.clone(), trace_id.clone(), log.host_address.clone());
                node.parent_process_guid = log.parent_process_guid.clone();
                node.process_name = log.process_name.clone();
                node.image = log.image.clone();
                node.command_line = log.command_line.clone();
                node.process_md5 = log.process_md5.clone();
                node.process_id = log.process_id;
                node.is_extension_node = true;
                node.extension_depth = depth;
                graph.index.insert(node);
            } else if let Some(node) = graph.index.get_mut(&ancestor_guid) {
                node.is_extension_node = true;
                node.extension_depth = depth;
            }

            graph.add_edge(ancestor_guid.clone(), chain_child.clone(), EdgeAnnotation::Ordinary);
            chain_child = ancestor_guid.clone();
            topmost = Some(ancestor_guid);
        }

        if let Some(new_root) = topmost {
            graph.index.set_root(&current_root, false);
            graph.index.set_root(&new_root, true);
            graph.trace_root.insert(trace_id, new_root);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facade::InMemoryIndexFacade;
    use crate::model::{EventId, LogType, RawLog, TraceId};

    fn log(guid: &str, parent: Option<&str>, trace: &str) -> RawLog {
        RawLog {
            event_id: EventId::from(format!("E_{guid}")),
            trace_id: TraceId::from(trace),
            host_address: HostAddress::from("10.0.0.1"),
            process_guid: ProcessGuid::from(guid),
            parent_process_guid: parent.map(ProcessGuid::from),
            log_type: LogType::Process,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn extends_root_one_level_and_relocates_root_flag() {
        let mut graph = ChainGraph::new();
        let mut root = BuilderNode::new(ProcessGuid::from("ROOT"), TraceId::from("T001"), HostAddress::from("10.0.0.1"));
        root.is_root = true;
        graph.index.insert(root);
        graph.index.set_root(&ProcessGuid::from("ROOT"), true);
        graph.trace_root.insert(TraceId::from("T001"), ProcessGuid::from("ROOT"));

        let facade = InMemoryIndexFacade::new().with_logs(vec![
            log("ROOT", Some("GRANDPARENT"), "T001"),
            log("GRANDPARENT", None, "T001"),
        ]);
        let host_to_trace: HashMap<HostAddress, TraceId> =
            [(HostAddress::from("10.0.0.1"), TraceId::from("T001"))].into_iter().collect();

        extend(&mut graph, &facade, &host_to_trace, 2).await;

        assert!(!graph.index.get(&ProcessGuid::from("ROOT")).unwrap().is_root);
        let new_root = ProcessGuid::from("GRANDPARENT");
        assert!(graph.index.get(&new_root).unwrap().is_root);
        assert_eq!(graph.trace_root.get(&TraceId::from("T001")), Some(&new_root));
        assert!(graph.edges.iter().any(|e| e.source == new_root && e.target == ProcessGuid::from("ROOT")));
    }

    #[tokio::test]
    async fn explore_root_is_never_extended() {
        let mut graph = ChainGraph::new();
        let explore_guid = TraceId::from("T001").explore_root_id();
        graph.trace_root.insert(TraceId::from("T001"), explore_guid.clone());

        let facade = InMemoryIndexFacade::new();
        let host_to_trace: HashMap<HostAddress, TraceId> =
            [(HostAddress::from("10.0.0.1"), TraceId::from("T001"))].into_iter().collect();

        extend(&mut graph, &facade, &host_to_trace, 2).await;
        assert_eq!(graph.trace_root.get(&TraceId::from("T001")), Some(&explore_guid));
    }
}
