//! Node table validation and splitting

use crate::data::{ConnectorRecord, NodeId, NodeRecord, SkeletonId};
use crate::error::GraphError;
use std::collections::HashMap;

/// Check that a node table forms a single rooted tree.
///
/// Returns the row index of every treenode id. Records of other skeletons are
/// rejected first; root errors take precedence over duplicate, dangling and
/// cycle errors.
pub fn validate_node_table(
    skeleton_id: SkeletonId,
    nodes: &[NodeRecord],
) -> Result<HashMap<NodeId, usize>, GraphError> {
    if let Some(foreign) = nodes.iter().find(|n| n.skeleton_id != skeleton_id) {
        return Err(GraphError::ForeignNode {
            skeleton_id,
            node_id: foreign.treenode_id,
            found: foreign.skeleton_id,
        });
    }

    let roots: Vec<NodeId> = nodes
        .iter()
        .filter(|n| n.is_root())
        .map(|n| n.treenode_id)
        .collect();

    match roots.len() {
        0 => return Err(GraphError::NoRoot { skeleton_id }),
        1 => {}
        _ => return Err(GraphError::MultipleRoots { skeleton_id, roots }),
    }

    let mut row_of: HashMap<NodeId, usize> = HashMap::with_capacity(nodes.len());
    for (row, node) in nodes.iter().enumerate() {
        if row_of.insert(node.treenode_id, row).is_some() {
            return Err(GraphError::DuplicateNode {
                skeleton_id,
                node_id: node.treenode_id,
            });
        }
    }

    for node in nodes {
        if let Some(parent_id) = node.parent_id {
            if !row_of.contains_key(&parent_id) {
                return Err(GraphError::DanglingParent {
                    skeleton_id,
                    node_id: node.treenode_id,
                    parent_id,
                });
            }
        }
    }

    check_acyclic(skeleton_id, nodes, &row_of)?;

    Ok(row_of)
}

/// Every node must reach the root by following parents
fn check_acyclic(
    skeleton_id: SkeletonId,
    nodes: &[NodeRecord],
    row_of: &HashMap<NodeId, usize>,
) -> Result<(), GraphError> {
    // 0 = unvisited, 1 = on current walk, 2 = known to reach the root
    let mut state = vec![0u8; nodes.len()];
    let mut walk = Vec::new();

    for start in 0..nodes.len() {
        let mut row = start;
        walk.clear();
        loop {
            match state[row] {
                2 => break,
                1 => {
                    return Err(GraphError::Cycle {
                        skeleton_id,
                        node_id: nodes[row].treenode_id,
                    })
                }
                _ => {}
            }
            state[row] = 1;
            walk.push(row);
            match nodes[row].parent_id {
                None => break,
                Some(parent_id) => row = row_of[&parent_id],
            }
        }
        for &visited in &walk {
            state[visited] = 2;
        }
    }

    Ok(())
}

/// Split a multi-skeleton node table into per-skeleton tables.
///
/// Skeletons appear in order of first occurrence; rows keep their order.
pub fn split_by_skeleton(nodes: Vec<NodeRecord>) -> Vec<(SkeletonId, Vec<NodeRecord>)> {
    let mut position: HashMap<SkeletonId, usize> = HashMap::new();
    let mut tables: Vec<(SkeletonId, Vec<NodeRecord>)> = Vec::new();

    for node in nodes {
        let idx = *position.entry(node.skeleton_id).or_insert_with(|| {
            tables.push((node.skeleton_id, Vec::new()));
            tables.len() - 1
        });
        tables[idx].1.push(node);
    }

    tables
}

/// Drop connectors that sit on treenodes missing from the node table
pub fn filter_connectors(
    nodes: &[NodeRecord],
    connectors: Vec<ConnectorRecord>,
) -> Vec<ConnectorRecord> {
    let known: std::collections::HashSet<NodeId> =
        nodes.iter().map(|n| n.treenode_id).collect();
    let before = connectors.len();
    let kept: Vec<ConnectorRecord> = connectors
        .into_iter()
        .filter(|c| known.contains(&c.treenode_id))
        .collect();
    if kept.len() < before {
        log::warn!(
            "Dropped {} connectors attached to unknown treenodes",
            before - kept.len()
        );
    }
    kept
}
