//! Explore-root synthesizer (§4.5): guarantees every `traceId` ends up with
//! exactly one root node, even when no real or virtual root could be found.
//!
//! Runs after §4.4 and is also where `ChainGraph::trace_root` — the
//! `traceIdToRootNodeMap` every later phase (extender, merger) depends on —
//! gets its first full population: one entry per `traceId`, real root or
//! synthetic.

use std::collections::HashSet;

use crate::graph::ChainGraph;
use crate::model::{BuilderNode, EdgeAnnotation, LogType, ProcessGuid, TraceId};

/// For every `trace_id` with no current root node, synthesize
/// `EXPLORE_ROOT_{traceId}`; for traces that already have one (real,
/// virtual, or extended), just record it. Either way, wire every currently
/// broken node of that trace to the root via a `"断链"` edge.
///
/// Idempotent and safe to re-run after the pruner (spec.md §4.7: pruning
/// may orphan nodes into new broken ones, and "the explore-root
/// synthesizer is re-invoked ... so such broken nodes get attached to the
/// appropriate [root]") — `add_edge` no-ops on an edge that already exists,
/// and a trace with a standing root is left alone apart from the new
/// broken-chain wiring.
///
/// Postcondition (spec.md §4.5): `graph.trace_root` is total over
/// `trace_ids` and never maps two traces to the same node.
pub fn synthesize(graph: &mut ChainGraph, trace_ids: &HashSet<TraceId>) {
    for trace_id in trace_ids {
        let root_guid = match graph
            .index
            .iter()
            .find(|n| n.is_root && &n.trace_id == trace_id)
            .map(|n| n.process_guid.clone())
        {
            Some(root) => root,
            None => {
                let explore_guid = trace_id.explore_root_id();
                let mut explore_node =
                    BuilderNode::new(explore_guid.clone(), trace_id.clone(), default_host(graph, trace_id));
                explore_node.is_root = true;
                explore_node.log_type = Some(LogType::Explore);
                graph.index.insert(explore_node);
                graph.index.set_root(&explore_guid, true);
                explore_guid
            }
        };
        graph.trace_root.insert(trace_id.clone(), root_guid.clone());

        let broken: Vec<ProcessGuid> = graph
            .index
            .iter()
            .filter(|n| n.is_broken && &n.trace_id == trace_id)
            .map(|n| n.process_guid.clone())
            .collect();
        for node in broken {
            graph.add_edge(root_guid.clone(), node, EdgeAnnotation::BrokenChain);
        }
    }
}

/// The synthetic explore root doesn't correspond to a real host, but
/// `BuilderNode` requires one for index bookkeeping — borrow the host of any
/// existing node of this trace, falling back to an empty placeholder when
/// the trace has no nodes at all.
fn default_host(graph: &ChainGraph, trace_id: &TraceId) -> crate::model::HostAddress {
    graph
        .index
        .iter()
        .find(|n| &n.trace_id == trace_id)
        .map(|n| n.host_address.clone())
        .unwrap_or_else(|| crate::model::HostAddress::from(""))
}
