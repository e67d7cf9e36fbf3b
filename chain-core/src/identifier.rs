//! Root/broken identifier (§4.3.2) and the shared upward-walk primitive used
//! by it, by the pruner's alarm-path computation (§4.7), and by the upward
//! extender (§4.6).
//!
//! spec.md §9 calls for the historically recursive upward walk to become an
//! "iterative walk over an explicit stack; cycle set carried on the stack
//! frame; depth counter returns early at 50." [`walk_upward`] is that
//! primitive, shared by every phase that needs to walk `parentProcessGuid`
//! links.

use std::collections::HashSet;

use crate::model::{NodeIndex, ProcessGuid, TraceId};

/// Outcome of walking `parentProcessGuid` links upward from a node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WalkOutcome {
    /// Reached a node with `is_root = true`.
    ReachedRoot {
        root: ProcessGuid,
        path: Vec<ProcessGuid>,
    },
    /// Reached a node flagged broken (parent unresolved).
    ReachedBroken {
        broken: ProcessGuid,
        path: Vec<ProcessGuid>,
    },
    /// `max_depth` links were followed without reaching a root or a broken
    /// node. Per spec.md §7 this halts the walk; the node where it stopped
    /// is *not* marked broken — it is a safety guard, not a data error.
    DepthExceeded { path: Vec<ProcessGuid> },
    /// The same guid was visited twice while walking upward. Per spec.md
    /// §9 this is the re-architected cycle guard; callers treat it as fatal
    /// (`ChainError::CorruptGraph`) rather than looping forever.
    CycleDetected { at: ProcessGuid, path: Vec<ProcessGuid> },
}

/// Walk `parentProcessGuid` links upward from `start`, inclusive of `start`
/// itself in the returned path.
pub fn walk_upward(index: &NodeIndex, start: &ProcessGuid, max_depth: u32) -> WalkOutcome {
    let mut path = Vec::new();
    let mut visited = HashSet::new();
    let mut current = start.clone();

    for _ in 0..=max_depth {
        if !visited.insert(current.clone()) {
            return WalkOutcome::CycleDetected { at: current, path };
        }
        path.push(current.clone());

        let Some(node) = index.get(&current) else {
            // Shouldn't happen for a guid already in the graph, but treat
            // as depth-exceeded rather than panicking.
            return WalkOutcome::DepthExceeded { path };
        };

        if node.is_root {
            return WalkOutcome::ReachedRoot {
                root: current,
                path,
            };
        }
        if node.is_broken {
            return WalkOutcome::ReachedBroken {
                broken: current,
                path,
            };
        }

        match &node.parent_process_guid {
            Some(parent) if index.contains(parent) => {
                current = parent.clone();
            }
            _ => {
                // No parent, or parent unresolved but not (yet) flagged
                // broken — nothing more to walk.
                return WalkOutcome::DepthExceeded { path };
            }
        }
    }

    WalkOutcome::DepthExceeded { path }
}

/// Run root/broken identification over every node currently in `index`
/// (spec.md §4.3.2). Must be re-run after any phase that adds or removes
/// nodes (§4.4, §4.5, §4.6, §4.7 per spec.md §5's ordering rule).
///
/// A node is a root iff `process_guid ∈ trace_ids`. A node is broken iff
/// (not a root) AND `parent_process_guid` is `Some` AND it does not resolve
/// within `index`.
pub fn identify_roots_and_broken(index: &mut NodeIndex, trace_ids: &HashSet<TraceId>) {
    let guids: Vec<ProcessGuid> = index.guids().cloned().collect();

    for guid in &guids {
        let is_root = trace_ids
            .iter()
            .any(|t| t.as_str() == guid.as_str());
        index.set_root(guid, is_root);
    }

    refresh_broken(index);
}

/// Recompute `is_broken` for every node from its *current* `is_root` flag
/// and parent resolution, without touching `is_root`.
///
/// Unlike [`identify_roots_and_broken`] (which also (re)derives `is_root`
/// from trace membership and is only valid before any synthetic root
/// exists), this is the re-run spec.md §5 calls for after §4.4/§4.5/§4.6/
/// §4.7: those phases manage `is_root` transitions on virtual, explore and
/// extension nodes explicitly, and only need broken-ness resynchronized
/// around their edits.
pub fn refresh_broken(index: &mut NodeIndex) {
    let guids: Vec<ProcessGuid> = index.guids().cloned().collect();

    for guid in &guids {
        let (is_root, parent) = {
            let node = index.get(guid).expect("guid came from this index");
            (node.is_root, node.parent_process_guid.clone())
        };
        let is_broken = !is_root
            && match &parent {
                Some(p) => !index.contains(p),
                None => false,
            };
        index.set_broken(guid, is_broken);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BuilderNode, HostAddress};

    fn node(guid: &str, parent: Option<&str>, trace: &str) -> BuilderNode {
        let mut n = BuilderNode::new(
            ProcessGuid::from(guid),
            TraceId::from(trace),
            HostAddress::from("10.0.0.1"),
        );
        n.parent_process_guid = parent.map(ProcessGuid::from);
        n
    }

    #[test]
    fn marks_root_by_trace_membership() {
        let mut index = NodeIndex::new();
        index.insert(node("T001", None, "T001"));
        index.insert(node("CHILD", Some("T001"), "T001"));

        let trace_ids: HashSet<TraceId> = [TraceId::from("T001")].into_iter().collect();
        identify_roots_and_broken(&mut index, &trace_ids);

        assert!(index.get(&ProcessGuid::from("T001")).unwrap().is_root);
        assert!(!index.get(&ProcessGuid::from("CHILD")).unwrap().is_root);
        index.assert_consistent();
    }

    #[test]
    fn marks_broken_when_parent_unresolved() {
        let mut index = NodeIndex::new();
        index.insert(node("MIDDLE", Some("MISSING_PARENT"), "T001"));
        index.insert(node("CHILD", Some("MIDDLE"), "T001"));

        let trace_ids: HashSet<TraceId> = [TraceId::from("T001")].into_iter().collect();
        identify_roots_and_broken(&mut index, &trace_ids);

        assert!(index.get(&ProcessGuid::from("MIDDLE")).unwrap().is_broken);
        assert!(!index.get(&ProcessGuid::from("CHILD")).unwrap().is_broken);
        index.assert_consistent();
    }

    #[test]
    fn walk_upward_detects_cycle() {
        let mut index = NodeIndex::new();
        index.insert(node("A", Some("B"), "T001"));
        index.insert(node("B", Some("A"), "T001"));
        // Neither is a root or broken: A's parent B resolves, B's parent A
        // resolves, so plain identification would mark neither broken.

        let outcome = walk_upward(&index, &ProcessGuid::from("A"), 50);
        assert!(matches!(outcome, WalkOutcome::CycleDetected { .. }));
    }
}
