//! Data model: input DTOs, the builder's internal graph representation, and
//! the output shapes returned to callers.
//!
//! Field names are `camelCase` on the wire (matching the upstream log
//! schema) and `snake_case` in Rust, via `#[serde(rename_all = "camelCase")]`.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

// ─── Identifier newtypes ───────────────────────────────────────────────────
//
// `processGuid`, `traceId`, `hostAddress` and `eventId` are all opaque
// strings on the wire, but they are never interchangeable: a `TraceId`
// handed to a function expecting a `ProcessGuid` is a bug, not a valid
// call. Wrapping each in its own type makes that bug a compile error.

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

string_id!(ProcessGuid);
string_id!(TraceId);
string_id!(HostAddress);
string_id!(EventId);

/// Reserved prefix for per-trace explore roots (§4.5).
pub const EXPLORE_ROOT_PREFIX: &str = "EXPLORE_ROOT_";
/// Reserved prefix for special-root virtual parents (§4.4).
pub const VIRTUAL_ROOT_PARENT_PREFIX: &str = "VIRTUAL_ROOT_PARENT_";

impl TraceId {
    pub fn explore_root_id(&self) -> ProcessGuid {
        ProcessGuid(format!("{EXPLORE_ROOT_PREFIX}{}", self.0))
    }
}

impl ProcessGuid {
    pub fn virtual_root_parent_id(&self) -> ProcessGuid {
        ProcessGuid(format!("{VIRTUAL_ROOT_PARENT_PREFIX}{}", self.0))
    }

    pub fn is_explore_root(&self) -> bool {
        self.0.starts_with(EXPLORE_ROOT_PREFIX)
    }
}

// ─── Severity ───────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
        };
        f.write_str(s)
    }
}

// ─── Log type ───────────────────────────────────────────────────────────────

/// The five recognized raw-log/alarm types, plus the internal `EXPLORE`
/// marker used on synthetic explore-root nodes (never present on input).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogType {
    Process,
    File,
    Network,
    Domain,
    Registry,
    #[serde(rename = "EXPLORE")]
    Explore,
}

impl LogType {
    /// The five types the query facade and the graph builder recognize.
    /// `Explore` is never a recognized input type.
    pub const BUILDER_LOG_TYPES: [LogType; 5] = [
        LogType::Process,
        LogType::File,
        LogType::Network,
        LogType::Domain,
        LogType::Registry,
    ];

    pub fn is_recognized(&self) -> bool {
        !matches!(self, LogType::Explore)
    }
}

impl fmt::Display for LogType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogType::Process => "process",
            LogType::File => "file",
            LogType::Network => "network",
            LogType::Domain => "domain",
            LogType::Registry => "registry",
            LogType::Explore => "EXPLORE",
        };
        f.write_str(s)
    }
}

// ─── Parent carry-along (shared by RawAlarm and RawLog) ────────────────────

/// Attributes of the parent process, carried on the child's record. Used by
/// the virtual-parent synthesizer (§4.4) when the parent itself was never
/// captured as its own node.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentCarryAlong {
    pub parent_process_name: Option<String>,
    pub parent_image: Option<String>,
    pub parent_command_line: Option<String>,
    pub parent_process_md5: Option<String>,
    pub parent_process_id: Option<i64>,
}

// ─── RawAlarm ───────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAlarm {
    pub event_id: EventId,
    pub trace_id: TraceId,
    pub host_address: HostAddress,
    pub process_guid: ProcessGuid,
    pub parent_process_guid: Option<ProcessGuid>,
    pub log_type: LogType,
    pub severity: Severity,
    /// Epoch milliseconds.
    pub timestamp: i64,
    #[serde(flatten)]
    pub parent: ParentCarryAlong,
}

// ─── RawLog ─────────────────────────────────────────────────────────────────

/// Type-specific fields. All optional; only the fields relevant to
/// `log_type` are populated by a well-formed producer, but the builder never
/// assumes that — it reads only the fields it needs for a given `log_type`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLog {
    pub event_id: EventId,
    pub trace_id: TraceId,
    pub host_address: HostAddress,
    pub process_guid: ProcessGuid,
    pub parent_process_guid: Option<ProcessGuid>,
    pub log_type: LogType,
    pub timestamp: i64,
    #[serde(flatten)]
    pub parent: ParentCarryAlong,

    /// Edge annotation hint for entity extraction (§4.8): e.g. "create",
    /// "modify", "query". Absent on process logs.
    pub op_type: Option<String>,

    // process
    pub process_name: Option<String>,
    pub image: Option<String>,
    pub command_line: Option<String>,
    pub process_md5: Option<String>,
    pub process_id: Option<i64>,

    // file
    pub file_name: Option<String>,
    pub target_filename: Option<String>,
    pub file_md5: Option<String>,

    // network
    pub src_address: Option<String>,
    pub src_port: Option<i32>,
    pub dest_address: Option<String>,
    pub dest_port: Option<i32>,
    pub trans_protocol: Option<String>,

    // domain
    pub request_domain: Option<String>,
    pub query_results: Option<String>,

    // registry
    pub registry_path: Option<String>,
    pub registry_value: Option<String>,
}

impl RawLog {
    /// Salient key used by the entity extractor (§4.8) to merge duplicate
    /// entities of the same type.
    pub fn entity_key(&self) -> Option<String> {
        match self.log_type {
            LogType::File => Some(
                self.file_md5
                    .clone()
                    .or_else(|| self.target_filename.clone())
                    .unwrap_or_default(),
            ),
            LogType::Domain => Some(self.request_domain.clone().unwrap_or_default()),
            LogType::Network => Some(format!(
                "{}:{}",
                self.dest_address.clone().unwrap_or_default(),
                self.dest_port.map(|p| p.to_string()).unwrap_or_default()
            )),
            LogType::Registry => Some(format!(
                "{}|{}",
                self.registry_path.clone().unwrap_or_default(),
                self.registry_value.clone().unwrap_or_default()
            )),
            LogType::Process | LogType::Explore => None,
        }
    }
}

// ─── Edge annotation ────────────────────────────────────────────────────────

/// Edge annotation values named in spec.md §6: default, ordinary
/// parent-child, or explore-to-broken-chain. Entity edges carry a custom
/// annotation taken from the log's `opType`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EdgeAnnotation {
    None,
    Ordinary,
    BrokenChain,
    Custom(String),
}

impl EdgeAnnotation {
    pub fn as_str(&self) -> &str {
        match self {
            EdgeAnnotation::None => "",
            EdgeAnnotation::Ordinary => "1",
            EdgeAnnotation::BrokenChain => "断链",
            EdgeAnnotation::Custom(s) => s.as_str(),
        }
    }
}

impl fmt::Display for EdgeAnnotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── BuilderNode ────────────────────────────────────────────────────────────

/// One process node in the assembled graph. Keyed externally by
/// `process_guid` inside `NodeIndex`.
#[derive(Clone, Debug)]
pub struct BuilderNode {
    pub process_guid: ProcessGuid,
    pub parent_process_guid: Option<ProcessGuid>,
    pub trace_id: TraceId,
    pub host_address: HostAddress,

    // Process attributes, taken from whichever alarm/log first populated
    // this node.
    pub process_name: Option<String>,
    pub image: Option<String>,
    pub command_line: Option<String>,
    pub process_md5: Option<String>,
    pub process_id: Option<i64>,

    pub alarms: Vec<RawAlarm>,
    pub logs: Vec<RawLog>,

    pub is_root: bool,
    pub is_broken: bool,
    pub is_alarm: bool,
    pub is_extension_node: bool,
    pub is_virtual: bool,
    pub extension_depth: u32,
    pub log_limit_reached: bool,

    /// `None` means "an ordinary process node" (`LogType::Process` on the
    /// wire). Set explicitly by the explore-root synthesizer (§4.5, always
    /// `Explore`) and the entity extractor (§4.8, the entity's own type).
    pub log_type: Option<LogType>,
    /// Salient dedup key for entity nodes (§4.8); `None` for process nodes.
    pub entity_key: Option<String>,
}

impl BuilderNode {
    pub fn new(process_guid: ProcessGuid, trace_id: TraceId, host_address: HostAddress) -> Self {
        Self {
            process_guid,
            parent_process_guid: None,
            trace_id,
            host_address,
            process_name: None,
            image: None,
            command_line: None,
            process_md5: None,
            process_id: None,
            alarms: Vec::new(),
            logs: Vec::new(),
            is_root: false,
            is_broken: false,
            is_alarm: false,
            is_extension_node: false,
            is_virtual: false,
            extension_depth: 0,
            log_limit_reached: false,
            log_type: None,
            entity_key: None,
        }
    }

    /// The node's effective `logType` for output purposes: its own if set
    /// (explore/entity nodes), else the implicit `process`.
    pub fn effective_log_type(&self) -> LogType {
        self.log_type.unwrap_or(LogType::Process)
    }

    /// Highest severity across this node's alarms, if any.
    pub fn max_alarm_severity(&self) -> Option<Severity> {
        self.alarms.iter().map(|a| a.severity).max()
    }

    fn adopt_process_attrs_from_log(&mut self, log: &RawLog) {
        if log.log_type != LogType::Process {
            return;
        }
        self.process_name = self.process_name.take().or_else(|| log.process_name.clone());
        self.image = self.image.take().or_else(|| log.image.clone());
        self.command_line = self.command_line.take().or_else(|| log.command_line.clone());
        self.process_md5 = self.process_md5.take().or_else(|| log.process_md5.clone());
        self.process_id = self.process_id.or(log.process_id);
    }

    /// Accumulate one log onto this node per the log-accumulation policy
    /// (§4.3.1). `privileged` is true when the log's `eventId` is in the
    /// request's network-associated set.
    ///
    /// Returns true if the log was accepted.
    pub fn accumulate_log(&mut self, log: RawLog, privileged: bool) -> bool {
        self.adopt_process_attrs_from_log(&log);

        if self.is_alarm || privileged {
            self.logs.push(log);
            return true;
        }
        if self.log_limit_reached {
            return false;
        }
        if self.logs.len() < super::config::MAX_LOGS_PER_NODE {
            self.logs.push(log);
            true
        } else {
            log::warn!(
                "process node {} reached MAX_LOGS_PER_NODE ({}); further non-privileged logs are dropped",
                self.process_guid,
                super::config::MAX_LOGS_PER_NODE
            );
            self.log_limit_reached = true;
            false
        }
    }

    /// `RawAlarm` carries no attributes of its own process (only its
    /// parent's, via [`ParentCarryAlong`] — used by the virtual-parent
    /// synthesizer, not here), so unlike [`accumulate_log`] this never
    /// touches `process_name`/`image`/etc.; those are populated exclusively
    /// from a `process`-typed [`RawLog`].
    pub fn push_alarm(&mut self, alarm: RawAlarm) {
        self.is_alarm = true;
        self.alarms.push(alarm);
    }
}

// ─── BuilderEdge ────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct BuilderEdge {
    pub source: ProcessGuid,
    pub target: ProcessGuid,
    pub annotation: EdgeAnnotation,
}

// ─── NodeIndex ──────────────────────────────────────────────────────────────

/// Owning map of every `BuilderNode`, plus derived (never authoritative)
/// secondary indices. Every flag transition on a node must go through
/// [`NodeIndex::set_root`], [`NodeIndex::set_broken`] or
/// [`NodeIndex::set_alarm`] so the secondary sets never drift from node
/// state (spec.md §9: "attach the flag setter to a single function that
/// always re-synchronizes the index").
#[derive(Debug, Default, Clone)]
pub struct NodeIndex {
    nodes: HashMap<ProcessGuid, BuilderNode>,
    by_trace: HashMap<TraceId, HashSet<ProcessGuid>>,
    by_host: HashMap<HostAddress, HashSet<ProcessGuid>>,
    root_nodes: HashSet<ProcessGuid>,
    broken_nodes: HashSet<ProcessGuid>,
    alarm_nodes: HashSet<ProcessGuid>,
}

impl NodeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, guid: &ProcessGuid) -> bool {
        self.nodes.contains_key(guid)
    }

    pub fn get(&self, guid: &ProcessGuid) -> Option<&BuilderNode> {
        self.nodes.get(guid)
    }

    pub fn get_mut(&mut self, guid: &ProcessGuid) -> Option<&mut BuilderNode> {
        self.nodes.get_mut(guid)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BuilderNode> {
        self.nodes.values()
    }

    pub fn guids(&self) -> impl Iterator<Item = &ProcessGuid> {
        self.nodes.keys()
    }

    /// Insert a brand-new node. The node's flags must already reflect its
    /// initial (all-false) state; use the `set_*` methods to flip flags
    /// afterwards so the secondary sets stay synchronized.
    pub fn insert(&mut self, node: BuilderNode) {
        let guid = node.process_guid.clone();
        self.by_trace
            .entry(node.trace_id.clone())
            .or_default()
            .insert(guid.clone());
        self.by_host
            .entry(node.host_address.clone())
            .or_default()
            .insert(guid.clone());
        if node.is_root {
            self.root_nodes.insert(guid.clone());
        }
        if node.is_broken {
            self.broken_nodes.insert(guid.clone());
        }
        if node.is_alarm {
            self.alarm_nodes.insert(guid.clone());
        }
        self.nodes.insert(guid, node);
    }

    /// Remove a node entirely (used by the pruner). Returns the removed
    /// node, if present.
    pub fn remove(&mut self, guid: &ProcessGuid) -> Option<BuilderNode> {
        let node = self.nodes.remove(guid)?;
        if let Some(set) = self.by_trace.get_mut(&node.trace_id) {
            set.remove(guid);
        }
        if let Some(set) = self.by_host.get_mut(&node.host_address) {
            set.remove(guid);
        }
        self.root_nodes.remove(guid);
        self.broken_nodes.remove(guid);
        self.alarm_nodes.remove(guid);
        Some(node)
    }

    pub fn set_root(&mut self, guid: &ProcessGuid, value: bool) {
        if let Some(node) = self.nodes.get_mut(guid) {
            node.is_root = value;
        }
        if value {
            self.root_nodes.insert(guid.clone());
        } else {
            self.root_nodes.remove(guid);
        }
    }

    pub fn set_broken(&mut self, guid: &ProcessGuid, value: bool) {
        if let Some(node) = self.nodes.get_mut(guid) {
            node.is_broken = value;
        }
        if value {
            self.broken_nodes.insert(guid.clone());
        } else {
            self.broken_nodes.remove(guid);
        }
    }

    pub fn set_alarm(&mut self, guid: &ProcessGuid, value: bool) {
        if let Some(node) = self.nodes.get_mut(guid) {
            node.is_alarm = value;
        }
        if value {
            self.alarm_nodes.insert(guid.clone());
        } else {
            self.alarm_nodes.remove(guid);
        }
    }

    pub fn root_nodes(&self) -> &HashSet<ProcessGuid> {
        &self.root_nodes
    }

    pub fn broken_nodes(&self) -> &HashSet<ProcessGuid> {
        &self.broken_nodes
    }

    pub fn alarm_nodes(&self) -> &HashSet<ProcessGuid> {
        &self.alarm_nodes
    }

    pub fn nodes_for_trace(&self, trace_id: &TraceId) -> Vec<&ProcessGuid> {
        self.by_trace
            .get(trace_id)
            .map(|s| s.iter().collect())
            .unwrap_or_default()
    }

    pub fn nodes_for_host(&self, host: &HostAddress) -> Vec<&ProcessGuid> {
        self.by_host
            .get(host)
            .map(|s| s.iter().collect())
            .unwrap_or_default()
    }

    /// Re-validates that every secondary set equals the set of nodes with
    /// the corresponding flag set. Used by tests (spec.md §8 property 4).
    pub fn assert_consistent(&self) {
        let roots: HashSet<_> = self
            .nodes
            .values()
            .filter(|n| n.is_root)
            .map(|n| n.process_guid.clone())
            .collect();
        debug_assert_eq!(roots, self.root_nodes, "root index desynchronized");

        let broken: HashSet<_> = self
            .nodes
            .values()
            .filter(|n| n.is_broken)
            .map(|n| n.process_guid.clone())
            .collect();
        debug_assert_eq!(broken, self.broken_nodes, "broken index desynchronized");

        let alarms: HashSet<_> = self
            .nodes
            .values()
            .filter(|n| n.is_alarm)
            .map(|n| n.process_guid.clone())
            .collect();
        debug_assert_eq!(alarms, self.alarm_nodes, "alarm index desynchronized");
    }
}

// ─── IpMappingRelation ──────────────────────────────────────────────────────

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpAssociation {
    pub associated_event_id: Option<EventId>,
    #[serde(default)]
    pub has_association: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpMappingRelation {
    pub ip_and_association: HashMap<String, IpAssociation>,
}

// ─── Output shapes ──────────────────────────────────────────────────────────

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlarmNodeInfo {
    pub event_ids: Vec<String>,
    pub severities: Vec<Severity>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainNodeInfo {
    pub is_root: bool,
    pub is_broken: bool,
    pub is_alarm: bool,
    pub is_extension_node: bool,
    pub extension_depth: u32,
    pub is_virtual: bool,
    pub process_entity: bool,
    pub alarm_node_info: Option<AlarmNodeInfo>,
}

/// Network-side node shape produced by the merger's upstream collaborator
/// (§4.9). Opaque to the core beyond `role` and the id it bridges by.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryNodeInfo {
    /// "attacker" | "victim" | "server".
    #[serde(rename = "type")]
    pub node_type: String,
    /// The ip or hostname this node represents.
    pub node: String,
    pub other: Option<serde_json::Value>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessNode {
    pub node_id: String,
    pub is_chain_node: bool,
    pub log_type: LogType,
    pub node_threat_severity: Option<Severity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_node: Option<ChainNodeInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub story_node: Option<StoryNodeInfo>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessEdge {
    pub source: String,
    pub target: String,
    pub val: String,
}

impl ProcessEdge {
    pub fn from_builder(edge: &BuilderEdge) -> Self {
        Self {
            source: edge.source.to_string(),
            target: edge.target.to_string(),
            val: edge.annotation.to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentProcessChain {
    pub nodes: Vec<ProcessNode>,
    pub edges: Vec<ProcessEdge>,
    pub trace_ids: Vec<String>,
    pub host_addresses: Vec<String>,
    pub threat_severity: Severity,
}

/// `traceId -> rootNodeId`. Intentionally excluded from
/// `IncidentProcessChain`: the merger needs it but it is plumbed as a
/// separate parameter rather than business output (spec.md §3).
pub type TraceRootMap = HashMap<TraceId, ProcessGuid>;
