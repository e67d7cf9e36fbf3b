//! Role corrector (§4.10): re-labels network story nodes against an
//! analyst-supplied focus (an ip list plus which role those ips should
//! carry), then reverse-corrects directly connected neighbors that shared
//! the focus node's old, wrong label.

use std::collections::{HashMap, HashSet};

use crate::model::{ProcessEdge, ProcessNode};

fn opposite_role(role: &str) -> &'static str {
    if role == "attacker" {
        "victim"
    } else {
        "attacker"
    }
}

/// `focus_ip` is comma-separated; `focus_object` is `"attacker"` or
/// `"victim"`. Server nodes are never touched, neither as a focus nor as a
/// reverse-correction target (spec.md §4.10).
pub fn correct_roles(nodes: &mut [ProcessNode], edges: &mut [ProcessEdge], focus_ip: &str, focus_object: &str) {
    let focus_ips: HashSet<String> = focus_ip
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if focus_ips.is_empty() {
        return;
    }

    let mut original_role_by_id: HashMap<String, String> = nodes
        .iter()
        .filter_map(|n| n.story_node.as_ref().map(|s| (n.node_id.clone(), s.node_type.clone())))
        .collect();

    let mut id_rename: HashMap<String, String> = HashMap::new();
    let mut focus_nodes: Vec<(String, String)> = Vec::new(); // (node_id after rename, old_role)

    for node in nodes.iter_mut() {
        let original_id = node.node_id.clone();
        let Some(story) = &mut node.story_node else { continue };
        if story.node_type == "server" || !focus_ips.contains(&story.node) || story.node_type == focus_object {
            continue;
        }

        let old_role = std::mem::replace(&mut story.node_type, focus_object.to_string());
        if node.node_id.contains(&old_role) {
            let new_id = node.node_id.replace(&old_role, focus_object);
            id_rename.insert(original_id, new_id.clone());
            node.node_id = new_id;
        }
        focus_nodes.push((node.node_id.clone(), old_role));
    }

    rename_ids_in_edges(edges, &id_rename);
    for (old_id, new_id) in &id_rename {
        if let Some(role) = original_role_by_id.remove(old_id) {
            original_role_by_id.insert(new_id.clone(), role);
        }
    }

    for (focus_node_id, old_role) in focus_nodes {
        let neighbor_ids: HashSet<String> = edges
            .iter()
            .filter_map(|e| {
                if e.source == focus_node_id {
                    Some(e.target.clone())
                } else if e.target == focus_node_id {
                    Some(e.source.clone())
                } else {
                    None
                }
            })
            .collect();

        let mut neighbor_rename: HashMap<String, String> = HashMap::new();
        for node in nodes.iter_mut() {
            if !neighbor_ids.contains(&node.node_id) {
                continue;
            }
            let Some(story) = &mut node.story_node else { continue };
            if story.node_type == "server" {
                continue;
            }
            if original_role_by_id.get(&node.node_id) != Some(&old_role) {
                continue;
            }
            let new_role = opposite_role(&story.node_type).to_string();
            let old_id = node.node_id.clone();
            let previous_role = std::mem::replace(&mut story.node_type, new_role.clone());
            if node.node_id.contains(&previous_role) {
                let new_id = node.node_id.replace(&previous_role, &new_role);
                neighbor_rename.insert(old_id, new_id.clone());
                node.node_id = new_id;
            }
        }
        rename_ids_in_edges(edges, &neighbor_rename);
    }
}

fn rename_ids_in_edges(edges: &mut [ProcessEdge], rename: &HashMap<String, String>) {
    if rename.is_empty() {
        return;
    }
    for edge in edges.iter_mut() {
        if let Some(new_id) = rename.get(&edge.source) {
            edge.source = new_id.clone();
        }
        if let Some(new_id) = rename.get(&edge.target) {
            edge.target = new_id.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LogType, StoryNodeInfo};

    fn story_node(id: &str, role: &str, ip: &str) -> ProcessNode {
        ProcessNode {
            node_id: id.to_string(),
            is_chain_node: false,
            log_type: LogType::Process,
            node_threat_severity: None,
            chain_node: None,
            story_node: Some(StoryNodeInfo {
                node_type: role.to_string(),
                node: ip.to_string(),
                other: None,
            }),
        }
    }

    #[test]
    fn focus_node_swaps_role_and_id() {
        let mut nodes = vec![story_node("attacker_10.0.0.5", "attacker", "10.0.0.5")];
        let mut edges = vec![];

        correct_roles(&mut nodes, &mut edges, "10.0.0.5", "victim");

        assert_eq!(nodes[0].story_node.as_ref().unwrap().node_type, "victim");
        assert_eq!(nodes[0].node_id, "victim_10.0.0.5");
    }

    #[test]
    fn connected_neighbor_with_matching_old_role_is_reverse_corrected() {
        let mut nodes = vec![
            story_node("attacker_10.0.0.5", "attacker", "10.0.0.5"),
            story_node("attacker_10.0.0.9", "attacker", "10.0.0.9"),
        ];
        let mut edges = vec![ProcessEdge {
            source: "attacker_10.0.0.5".to_string(),
            target: "attacker_10.0.0.9".to_string(),
            val: "1".to_string(),
        }];

        correct_roles(&mut nodes, &mut edges, "10.0.0.5", "victim");

        let neighbor = nodes.iter().find(|n| n.story_node.as_ref().unwrap().node == "10.0.0.9").unwrap();
        assert_eq!(neighbor.story_node.as_ref().unwrap().node_type, "victim");
        assert!(edges.iter().any(|e| e.target == neighbor.node_id || e.source == neighbor.node_id));
    }

    #[test]
    fn server_nodes_are_never_touched() {
        let mut nodes = vec![story_node("server_10.0.0.1", "server", "10.0.0.1")];
        let mut edges = vec![];
        correct_roles(&mut nodes, &mut edges, "10.0.0.1", "victim");
        assert_eq!(nodes[0].story_node.as_ref().unwrap().node_type, "server");
    }
}
