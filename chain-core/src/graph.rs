//! The per-request graph container: `NodeIndex` plus the edge list and the
//! two cross-cutting maps (`traceId -> root`, and the special-root virtual
//! parent map) that later phases need.
//!
//! This is the re-architected `TraversalContext` called for in spec.md §9
//! ("pass a per-request TraversalContext struct explicitly; the NodeIndex
//! lives inside it; no process-wide state") — every phase in the pipeline
//! takes `&mut ChainGraph` rather than reading or writing any shared/global
//! state.

use std::collections::{HashMap, HashSet};

use crate::model::{BuilderEdge, EdgeAnnotation, NodeIndex, ProcessGuid, TraceId, TraceRootMap};

#[derive(Debug, Default, Clone)]
pub struct ChainGraph {
    pub index: NodeIndex,
    pub edges: Vec<BuilderEdge>,
    edge_set: HashSet<(ProcessGuid, ProcessGuid)>,
    pub trace_root: TraceRootMap,
    /// `processGuid -> VIRTUAL_ROOT_PARENT_{guid}`, recorded for the
    /// special-root case (§4.4 step 2) where the real `parentProcessGuid`
    /// equals the node's own guid.
    pub virtual_root_parent: HashMap<ProcessGuid, ProcessGuid>,
}

impl ChainGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit `source -> target`. No self-edges, no duplicate `(source,
    /// target)` pairs within one assembly (spec.md §3). Returns whether the
    /// edge was newly added.
    pub fn add_edge(&mut self, source: ProcessGuid, target: ProcessGuid, annotation: EdgeAnnotation) -> bool {
        if source == target {
            return false;
        }
        let key = (source.clone(), target.clone());
        if self.edge_set.contains(&key) {
            return false;
        }
        self.edge_set.insert(key);
        self.edges.push(BuilderEdge {
            source,
            target,
            annotation,
        });
        true
    }

    /// Drop every edge touching `guid` (used by the pruner, §4.7).
    pub fn remove_edges_touching(&mut self, guid: &ProcessGuid) {
        self.edges
            .retain(|e| &e.source != guid && &e.target != guid);
        self.edge_set.retain(|(s, t)| s != guid && t != guid);
    }

    pub fn out_degree(&self, guid: &ProcessGuid) -> usize {
        self.edges.iter().filter(|e| &e.source == guid).count()
    }

    /// Direct parent-by-edge lookup (distinct from `parent_process_guid`,
    /// which may point at a node outside the extracted subgraph).
    pub fn parent_of(&self, guid: &ProcessGuid) -> Option<&ProcessGuid> {
        self.edges
            .iter()
            .find(|e| &e.target == guid)
            .map(|e| &e.source)
    }

    pub fn children_of(&self, guid: &ProcessGuid) -> Vec<&ProcessGuid> {
        self.edges
            .iter()
            .filter(|e| &e.source == guid)
            .map(|e| &e.target)
            .collect()
    }

    /// Total node count across all traces (the pruner's trigger condition).
    pub fn node_count(&self) -> usize {
        self.index.len()
    }

    /// Every `traceId` currently represented in the graph.
    pub fn trace_ids(&self) -> HashSet<TraceId> {
        self.index.iter().map(|n| n.trace_id.clone()).collect()
    }
}
