//! Virtual-parent synthesizer (§4.4): for nodes whose `parentProcessGuid`
//! never resolves within the graph but whose record carries the parent's
//! attributes along, synthesize that parent as a node rather than leaving
//! the chain broken.
//!
//! spec.md §9 names the special-root case — `processGuid == parentProcessGuid
//! == traceId` — as the dominant trigger: a root's own `parentProcessGuid`
//! field points back at itself, which never resolves to a *distinct* parent,
//! yet the record still carries real parent attributes worth surfacing. The
//! same mechanism also covers ordinary broken nodes whose missing parent's
//! attributes were carried along on a child log or alarm.

use crate::graph::ChainGraph;
use crate::model::{BuilderNode, EdgeAnnotation, ParentCarryAlong, ProcessGuid};

/// Run virtual-parent synthesis over every node currently in `graph`.
/// Must run after the root/broken identifier's initial pass and before the
/// explore-root synthesizer (§4.5) (spec.md §5 ordering).
pub fn synthesize(graph: &mut ChainGraph) {
    let candidates: Vec<(ProcessGuid, ProcessGuid, bool, bool)> = graph
        .index
        .iter()
        .filter_map(|n| {
            let parent_guid = n.parent_process_guid.clone()?;
            Some((n.process_guid.clone(), parent_guid, n.is_root, n.is_broken))
        })
        .collect();

    for (guid, parent_guid, is_root, is_broken) in candidates {
        let special_root = is_root && parent_guid == guid;
        let needs_virtual_parent = special_root || (is_broken && !graph.index.contains(&parent_guid));
        if !needs_virtual_parent {
            continue;
        }

        let node = graph.index.get(&guid).expect("guid came from this index");
        let Some(carry_along) = find_parent_carry_along(node) else {
            continue; // no attributes to synthesize from; stays broken for the explore-root pass
        };
        let trace_id = node.trace_id.clone();
        let host_address = node.host_address.clone();

        let virtual_guid = if special_root {
            guid.virtual_root_parent_id()
        } else {
            parent_guid.clone()
        };

        if !graph.index.contains(&virtual_guid) {
            let mut virtual_node = BuilderNode::new(virtual_guid.clone(), trace_id, host_address);
            virtual_node.process_name = carry_along.parent_process_name.clone();
            virtual_node.image = carry_along.parent_image.clone();
            virtual_node.command_line = carry_along.parent_command_line.clone();
            virtual_node.process_md5 = carry_along.parent_process_md5.clone();
            virtual_node.process_id = carry_along.parent_process_id;
            virtual_node.is_virtual = true;
            virtual_node.is_root = true;
            graph.index.insert(virtual_node);
            graph.index.set_root(&virtual_guid, true);

            if special_root {
                graph.virtual_root_parent.insert(guid.clone(), virtual_guid.clone());
            }
        }

        graph.add_edge(virtual_guid.clone(), guid.clone(), EdgeAnnotation::Ordinary);

        if special_root {
            graph.index.set_root(&guid, false);
        }
    }
}

/// Post-link adjustment (§4.4, run after the upward extender per spec.md
/// §5): if a virtual parent's `traceId` turns out to have a real root
/// elsewhere (`processGuid == traceId`), rewire it under that real root
/// instead of leaving two roots for the same trace.
pub fn post_link_adjustment(graph: &mut ChainGraph) {
    let virtual_roots: Vec<ProcessGuid> = graph
        .index
        .iter()
        .filter(|n| n.is_virtual && n.is_root)
        .map(|n| n.process_guid.clone())
        .collect();

    for guid in virtual_roots {
        let trace_id = graph
            .index
            .get(&guid)
            .expect("guid came from this index")
            .trace_id
            .clone();

        // `n.is_root` is load-bearing: a special-root node shares its
        // `processGuid` with `traceId` too, and `synthesize` only demotes
        // its `is_root` flag, never its guid. Without this check the
        // demoted node is mistaken for a distinct real root of its own
        // trace and the virtual parent — now the trace's only root — gets
        // wrongly demoted in turn, leaving the trace with no root at all.
        let real_root = graph
            .index
            .iter()
            .find(|n| n.is_root && n.trace_id == trace_id && n.process_guid.as_str() == trace_id.as_str())
            .map(|n| n.process_guid.clone());

        let Some(real_root) = real_root else { continue };
        if real_root == guid {
            continue;
        }

        if let Some(node) = graph.index.get_mut(&guid) {
            node.parent_process_guid = Some(real_root.clone());
        }
        graph.index.set_root(&guid, false);
        graph.add_edge(real_root.clone(), guid, EdgeAnnotation::Ordinary);
        graph.trace_root.insert(trace_id, real_root);
    }
}

fn find_parent_carry_along(node: &BuilderNode) -> Option<ParentCarryAlong> {
    for log in &node.logs {
        if has_any_field(&log.parent) {
            return Some(log.parent.clone());
        }
    }
    for alarm in &node.alarms {
        if has_any_field(&alarm.parent) {
            return Some(alarm.parent.clone());
        }
    }
    None
}

fn has_any_field(carry: &ParentCarryAlong) -> bool {
    carry.parent_process_name.is_some()
        || carry.parent_image.is_some()
        || carry.parent_command_line.is_some()
        || carry.parent_process_md5.is_some()
        || carry.parent_process_id.is_some()
}
