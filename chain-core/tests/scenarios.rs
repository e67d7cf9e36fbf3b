//! End-to-end seed scenarios (spec.md §8, scenarios C through G) run through
//! the public pipeline entry point against [`InMemoryIndexFacade`].
//!
//! Scenarios A and B are covered inline in `src/pipeline.rs` next to the
//! code they exercise; the remaining scenarios live here because each needs
//! its own multi-host fixture setup.

use chain_core::config::ChainConfig;
use chain_core::facade::{InMemoryIndexFacade, TimeWindow};
use chain_core::model::{
    EventId, HostAddress, IpAssociation, IpMappingRelation, LogType, ParentCarryAlong, ProcessGuid, RawAlarm, RawLog,
    Severity, TraceId,
};
use chain_core::pipeline::generate;

fn alarm(process_guid: &str, trace_id: &str, host: &str, severity: Severity) -> RawAlarm {
    RawAlarm {
        event_id: EventId::from(format!("E_{process_guid}")),
        trace_id: TraceId::from(trace_id),
        host_address: HostAddress::from(host),
        process_guid: ProcessGuid::from(process_guid),
        parent_process_guid: None,
        log_type: LogType::Process,
        severity,
        timestamp: 0,
        parent: ParentCarryAlong::default(),
    }
}

fn log(process_guid: &str, parent: Option<&str>, trace_id: &str, host: &str) -> RawLog {
    RawLog {
        event_id: EventId::from(format!("L_{process_guid}")),
        trace_id: TraceId::from(trace_id),
        host_address: HostAddress::from(host),
        process_guid: ProcessGuid::from(process_guid),
        parent_process_guid: parent.map(ProcessGuid::from),
        log_type: LogType::Process,
        ..Default::default()
    }
}

fn association(event_id: Option<&str>, has_association: bool) -> IpAssociation {
    IpAssociation {
        associated_event_id: event_id.map(EventId::from),
        has_association,
    }
}

fn window() -> TimeWindow {
    TimeWindow { start_ms: 0, end_ms: i64::MAX }
}

/// Scenario C — multiple traces, all real roots.
#[tokio::test]
async fn scenario_c_multiple_traces_all_real_roots() {
    let facade = InMemoryIndexFacade::new()
        .with_alarms(HostAddress::from("10.0.0.1"), vec![alarm("T001", "T001", "10.0.0.1", Severity::High)])
        .with_alarms(HostAddress::from("10.0.0.2"), vec![alarm("T002", "T002", "10.0.0.2", Severity::High)])
        .with_alarms(HostAddress::from("10.0.0.3"), vec![alarm("T003", "T003", "10.0.0.3", Severity::High)])
        .with_logs(vec![
            log("T001", None, "T001", "10.0.0.1"),
            log("T002", None, "T002", "10.0.0.2"),
            log("T003", None, "T003", "10.0.0.3"),
        ]);

    let mut ip_mapping = IpMappingRelation::default();
    for ip in ["10.0.0.1", "10.0.0.2", "10.0.0.3"] {
        ip_mapping.ip_and_association.insert(ip.to_string(), association(None, false));
    }

    let config = ChainConfig::default();
    let chain = generate(&facade, &ip_mapping, window(), &config).await.unwrap().unwrap();

    for trace in ["T001", "T002", "T003"] {
        let root = chain.nodes.iter().find(|n| n.node_id == trace).unwrap();
        assert!(root.chain_node.as_ref().unwrap().is_root);
    }
    assert!(chain.nodes.iter().all(|n| !n.node_id.starts_with("EXPLORE_ROOT_")));
}

/// Scenario D — multiple broken chains sharing one trace collapse onto a
/// single explore root.
#[tokio::test]
async fn scenario_d_multiple_broken_chains_share_one_explore_root() {
    let facade = InMemoryIndexFacade::new()
        .with_alarms(HostAddress::from("10.0.0.4"), vec![alarm("BRANCH_A", "T001", "10.0.0.4", Severity::Medium)])
        .with_logs(vec![
            log("BRANCH_A", Some("MISSING_A"), "T001", "10.0.0.4"),
            log("BRANCH_B", Some("MISSING_B"), "T001", "10.0.0.4"),
            log("BRANCH_C", Some("MISSING_C"), "T001", "10.0.0.4"),
        ]);

    let mut ip_mapping = IpMappingRelation::default();
    ip_mapping.ip_and_association.insert("10.0.0.4".to_string(), association(None, false));

    let config = ChainConfig::default();
    let chain = generate(&facade, &ip_mapping, window(), &config).await.unwrap().unwrap();

    let explore_id = TraceId::from("T001").explore_root_id().to_string();
    let explore_roots: Vec<_> = chain.nodes.iter().filter(|n| n.node_id.starts_with("EXPLORE_ROOT_")).collect();
    assert_eq!(explore_roots.len(), 1);
    assert_eq!(explore_roots[0].node_id, explore_id);

    let broken_edges = chain.edges.iter().filter(|e| e.source == explore_id && e.val == "断链").count();
    assert_eq!(broken_edges, 3);
}

/// Scenario E — mixed real and broken traces; `traceIdToRootNodeMap` is
/// total and single-valued over every trace.
#[tokio::test]
async fn scenario_e_mixed_real_and_broken_traces() {
    let facade = InMemoryIndexFacade::new()
        .with_alarms(HostAddress::from("10.0.0.1"), vec![alarm("T001", "T001", "10.0.0.1", Severity::High)])
        .with_alarms(HostAddress::from("10.0.0.2"), vec![alarm("NODE_2", "T002", "10.0.0.2", Severity::Medium)])
        .with_alarms(HostAddress::from("10.0.0.3"), vec![alarm("NODE_3", "T003", "10.0.0.3", Severity::Low)])
        .with_logs(vec![
            log("T001", None, "T001", "10.0.0.1"),
            log("NODE_2", Some("MISSING_2"), "T002", "10.0.0.2"),
            log("NODE_3", Some("MISSING_3"), "T003", "10.0.0.3"),
        ]);

    let mut ip_mapping = IpMappingRelation::default();
    for ip in ["10.0.0.1", "10.0.0.2", "10.0.0.3"] {
        ip_mapping.ip_and_association.insert(ip.to_string(), association(None, false));
    }

    let config = ChainConfig::default();
    let chain = generate(&facade, &ip_mapping, window(), &config).await.unwrap().unwrap();

    let root_ids: Vec<&str> = chain
        .nodes
        .iter()
        .filter(|n| n.chain_node.as_ref().map(|c| c.is_root).unwrap_or(false))
        .map(|n| n.node_id.as_str())
        .collect();

    assert!(root_ids.contains(&"T001"));
    assert!(root_ids.contains(&TraceId::from("T002").explore_root_id().to_string().as_str()));
    assert!(root_ids.contains(&TraceId::from("T003").explore_root_id().to_string().as_str()));
    assert_eq!(root_ids.len(), 3); // exactly one root per trace
}

/// Scenario F — upward extension relocates the root flag two levels up.
#[tokio::test]
async fn scenario_f_upward_extension_with_skip() {
    let facade = InMemoryIndexFacade::new()
        .with_alarms(HostAddress::from("10.0.0.5"), vec![alarm("ROOT_001", "ROOT_001", "10.0.0.5", Severity::High)])
        .with_logs(vec![
            log("ROOT_001", Some("PARENT_001"), "ROOT_001", "10.0.0.5"),
            log("PARENT_001", Some("GRAND_001"), "ROOT_001", "10.0.0.5"),
            log("GRAND_001", None, "ROOT_001", "10.0.0.5"),
        ]);

    let mut ip_mapping = IpMappingRelation::default();
    ip_mapping.ip_and_association.insert("10.0.0.5".to_string(), association(None, false));

    let config = ChainConfig::default();
    let chain = generate(&facade, &ip_mapping, window(), &config).await.unwrap().unwrap();

    let root_001 = chain.nodes.iter().find(|n| n.node_id == "ROOT_001").unwrap();
    assert!(!root_001.chain_node.as_ref().unwrap().is_root);

    let grand_001 = chain.nodes.iter().find(|n| n.node_id == "GRAND_001").unwrap();
    let grand_info = grand_001.chain_node.as_ref().unwrap();
    assert!(grand_info.is_root);
    assert_eq!(grand_info.extension_depth, 2);

    let parent_001 = chain.nodes.iter().find(|n| n.node_id == "PARENT_001").unwrap();
    assert_eq!(parent_001.chain_node.as_ref().unwrap().extension_depth, 1);

    let extension_nodes = chain
        .nodes
        .iter()
        .filter(|n| n.chain_node.as_ref().map(|c| c.is_extension_node).unwrap_or(false))
        .count();
    assert_eq!(extension_nodes, 2);
}

/// Scenario G — network/endpoint merge with role correction, driven through
/// `merge_chain` directly (the HTTP layer is out of scope for this crate).
#[tokio::test]
async fn scenario_g_merge_and_role_correction() {
    use chain_core::model::{ProcessEdge, ProcessNode, StoryNodeInfo};
    use chain_core::pipeline::merge_chain;

    let facade = InMemoryIndexFacade::new()
        .with_alarms(HostAddress::from("10.50.86.171"), vec![alarm("ROOT_A", "ROOT_A", "10.50.86.171", Severity::High)])
        .with_alarms(HostAddress::from("10.50.86.52"), vec![alarm("ROOT_B", "ROOT_B", "10.50.86.52", Severity::High)])
        .with_logs(vec![
            log("ROOT_A", None, "ROOT_A", "10.50.86.171"),
            log("ROOT_B", None, "ROOT_B", "10.50.86.52"),
        ]);

    let mut ip_mapping = IpMappingRelation::default();
    ip_mapping.ip_and_association.insert("10.50.86.171".to_string(), association(None, false));
    ip_mapping.ip_and_association.insert("10.50.86.52".to_string(), association(None, false));

    let config = ChainConfig::default();

    let network_nodes = vec![
        ProcessNode {
            node_id: "attacker_10.50.86.35".to_string(),
            is_chain_node: false,
            log_type: LogType::Process,
            node_threat_severity: None,
            chain_node: None,
            story_node: Some(StoryNodeInfo {
                node_type: "attacker".to_string(),
                node: "10.50.86.35".to_string(),
                other: None,
            }),
        },
        ProcessNode {
            node_id: "victim_10.50.86.171".to_string(),
            is_chain_node: false,
            log_type: LogType::Process,
            node_threat_severity: None,
            chain_node: None,
            story_node: Some(StoryNodeInfo {
                node_type: "victim".to_string(),
                node: "10.50.86.171".to_string(),
                other: None,
            }),
        },
        ProcessNode {
            node_id: "attacker_10.50.86.52".to_string(),
            is_chain_node: false,
            log_type: LogType::Process,
            node_threat_severity: None,
            chain_node: None,
            story_node: Some(StoryNodeInfo {
                node_type: "attacker".to_string(),
                node: "10.50.86.52".to_string(),
                other: None,
            }),
        },
    ];
    let network_edges: Vec<ProcessEdge> = vec![];

    // The incident's focus declares 10.50.86.52 should be a victim, which
    // contradicts its "attacker" label above (spec.md §4.10).
    let merged = merge_chain(
        &facade,
        &ip_mapping,
        window(),
        &config,
        Some(network_nodes),
        Some(network_edges),
        Some(("10.50.86.52", "victim")),
    )
    .await
    .unwrap()
    .unwrap();

    let bridges: Vec<&ProcessEdge> = merged
        .edges
        .iter()
        .filter(|e| e.val.is_empty() && (e.source == "victim_10.50.86.171" || e.source.contains("10.50.86.52")))
        .collect();
    assert_eq!(bridges.len(), 2, "one bridge edge per victim node");

    let corrected = merged.nodes.iter().find(|n| n.node_id == "victim_10.50.86.52").unwrap();
    assert_eq!(corrected.story_node.as_ref().unwrap().node_type, "victim");
}

/// Universal invariant (spec.md §8 property 1 & 3): exactly one root per
/// trace, never simultaneously broken.
#[tokio::test]
async fn no_node_is_root_and_broken_simultaneously() {
    let facade = InMemoryIndexFacade::new()
        .with_alarms(HostAddress::from("10.0.0.9"), vec![alarm("MID", "T009", "10.0.0.9", Severity::Medium)])
        .with_logs(vec![
            log("MID", Some("GHOST_PARENT"), "T009", "10.0.0.9"),
            log("CHILD", Some("MID"), "T009", "10.0.0.9"),
        ]);

    let mut ip_mapping = IpMappingRelation::default();
    ip_mapping.ip_and_association.insert("10.0.0.9".to_string(), association(None, false));

    let config = ChainConfig::default();
    let chain = generate(&facade, &ip_mapping, window(), &config).await.unwrap().unwrap();

    for node in &chain.nodes {
        if let Some(c) = &node.chain_node {
            assert!(!(c.is_root && c.is_broken), "node {} is both root and broken", node.node_id);
        }
    }
}
