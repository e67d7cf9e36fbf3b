//! Pruner (§4.7): enforces `MAX_NODE_COUNT` by dropping the lowest-scoring
//! non-mandatory nodes, with an atomic snapshot/rollback around the whole
//! operation so a failed prune never leaves a half-trimmed graph.

use std::collections::HashSet;

use crate::graph::ChainGraph;
use crate::identifier::{walk_upward, WalkOutcome};
use crate::model::{BuilderNode, EventId, LogType, ProcessGuid, Severity};

const NETWORK_ASSOCIATED_SCORE: i64 = 1000;
const SEVERITY_HIGH_SCORE: i64 = 100;
const SEVERITY_MEDIUM_SCORE: i64 = 50;
const SEVERITY_LOW_SCORE: i64 = 20;
const ROOT_SCORE: i64 = 80;
const OUT_DEGREE_PER_NEIGHBOR: i64 = 2;
const OUT_DEGREE_CAP: i64 = 30;
const HAS_LOG_SCORE: i64 = 10;
const PROCESS_TYPE_SCORE: i64 = 5;

/// Prune `graph` in place if `graph.node_count() > max_node_count`.
///
/// Returns `true` if nodes were actually dropped, `false` if the graph was
/// already within bounds (spec.md §8 property 5: idempotent) or a
/// validation failure forced a rollback (spec.md §8 property 6: `graph`
/// then equals its pre-prune state, bit for bit).
pub fn prune(
    graph: &mut ChainGraph,
    max_node_count: usize,
    max_traverse_depth: u32,
    network_associated_event_ids: &HashSet<EventId>,
) -> bool {
    if graph.node_count() <= max_node_count {
        return false;
    }

    let snapshot = graph.clone();

    let mandatory = mandatory_keep_set(graph, max_traverse_depth, network_associated_event_ids);
    let mut scored: Vec<(ProcessGuid, i64)> = graph
        .index
        .iter()
        .filter(|n| !mandatory.contains(&n.process_guid))
        .map(|n| (n.process_guid.clone(), score(graph, n, network_associated_event_ids)))
        .collect();
    scored.sort_by_key(|(_, s)| *s);

    let mut to_remove = graph.node_count().saturating_sub(max_node_count);
    for (guid, _) in scored {
        if to_remove == 0 {
            break;
        }
        graph.index.remove(&guid);
        graph.remove_edges_touching(&guid);
        to_remove -= 1;
    }

    if validate(graph, &snapshot, network_associated_event_ids) {
        true
    } else {
        log::error!("裁剪失败回滚");
        *graph = snapshot;
        false
    }
}

fn mandatory_keep_set(
    graph: &ChainGraph,
    max_traverse_depth: u32,
    network_associated_event_ids: &HashSet<EventId>,
) -> HashSet<ProcessGuid> {
    let mut keep = HashSet::new();
    let mut alarm_guids = Vec::new();

    for node in graph.index.iter() {
        if node.is_root || node.is_alarm {
            keep.insert(node.process_guid.clone());
        }
        if has_network_associated_event(node, network_associated_event_ids) {
            keep.insert(node.process_guid.clone());
        }
        if node.is_alarm {
            alarm_guids.push(node.process_guid.clone());
        }
    }

    for guid in alarm_guids {
        let outcome = walk_upward(&graph.index, &guid, max_traverse_depth);
        match outcome {
            WalkOutcome::ReachedRoot { path, .. } | WalkOutcome::ReachedBroken { path, .. } => {
                keep.extend(path);
            }
            WalkOutcome::DepthExceeded { path } | WalkOutcome::CycleDetected { path, .. } => {
                keep.extend(path);
            }
        }
    }

    keep
}

fn has_network_associated_event(node: &BuilderNode, network_associated_event_ids: &HashSet<EventId>) -> bool {
    node.alarms.iter().any(|a| network_associated_event_ids.contains(&a.event_id))
        || node.logs.iter().any(|l| network_associated_event_ids.contains(&l.event_id))
}

fn score(graph: &ChainGraph, node: &BuilderNode, network_associated_event_ids: &HashSet<EventId>) -> i64 {
    let mut total = 0i64;

    if has_network_associated_event(node, network_associated_event_ids) {
        total += NETWORK_ASSOCIATED_SCORE;
    }
    total += match node.max_alarm_severity() {
        Some(Severity::High) => SEVERITY_HIGH_SCORE,
        Some(Severity::Medium) => SEVERITY_MEDIUM_SCORE,
        Some(Severity::Low) => SEVERITY_LOW_SCORE,
        None => 0,
    };
    if node.is_root {
        total += ROOT_SCORE;
    }
    let degree_bonus = graph.out_degree(&node.process_guid) as i64 * OUT_DEGREE_PER_NEIGHBOR;
    total += degree_bonus.min(OUT_DEGREE_CAP);
    if !node.logs.is_empty() {
        total += HAS_LOG_SCORE;
    }
    if node.effective_log_type() == LogType::Process {
        total += PROCESS_TYPE_SCORE;
    }

    total
}

/// Re-checks, against the pre-prune `snapshot`, that every root and every
/// network-associated node is still present post-removal (spec.md §4.7
/// step 3) rather than trusting that the removal loop respected the
/// mandatory-keep set it was built from.
fn validate(graph: &ChainGraph, snapshot: &ChainGraph, network_associated_event_ids: &HashSet<EventId>) -> bool {
    if graph.index.is_empty() {
        return false;
    }
    if snapshot.trace_root.values().any(|root| !graph.index.contains(root)) {
        return false;
    }
    let snapshot_network_associated = snapshot
        .index
        .iter()
        .filter(|n| has_network_associated_event(n, network_associated_event_ids));
    for node in snapshot_network_associated {
        if !graph.index.contains(&node.process_guid) {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{HostAddress, TraceId};

    fn node(guid: &str, is_root: bool) -> BuilderNode {
        let mut n = BuilderNode::new(ProcessGuid::from(guid), TraceId::from("T001"), HostAddress::from("10.0.0.1"));
        n.is_root = is_root;
        n
    }

    #[test]
    fn idempotent_below_threshold() {
        let mut graph = ChainGraph::new();
        graph.index.insert(node("A", true));
        let before = graph.clone();

        let pruned = prune(&mut graph, 400, 50, &HashSet::new());
        assert!(!pruned);
        assert_eq!(graph.index.len(), before.index.len());
    }

    #[test]
    fn drops_low_scoring_nodes_down_to_the_cap() {
        let mut graph = ChainGraph::new();
        graph.index.insert(node("ROOT", true));
        graph.index.set_root(&ProcessGuid::from("ROOT"), true);
        graph.trace_root.insert(TraceId::from("T001"), ProcessGuid::from("ROOT"));
        for i in 0..10 {
            let guid = format!("LEAF_{i}");
            graph.index.insert(node(&guid, false));
        }

        let pruned = prune(&mut graph, 5, 50, &HashSet::new());
        assert!(pruned);
        assert!(graph.index.len() <= 5);
        assert!(graph.index.contains(&ProcessGuid::from("ROOT")));
    }

    #[test]
    fn rolls_back_to_exact_snapshot_when_pruning_would_empty_the_graph() {
        let mut graph = ChainGraph::new();
        for i in 0..5 {
            graph.index.insert(node(&format!("LEAF_{i}"), false));
        }
        let before = graph.clone();

        // No root, no alarms: nothing is mandatory, so a 0-node cap would
        // remove every node and fail the non-empty-graph check.
        let pruned = prune(&mut graph, 0, 50, &HashSet::new());
        assert!(!pruned);
        assert_eq!(graph.index.len(), before.index.len());
    }
}
