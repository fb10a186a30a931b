//! Tree-to-graph conversion

use crate::data::preprocessing::validate_node_table;
use crate::data::{Neuron, NodeRecord, SkeletonId};
use crate::error::GraphError;
use crate::graph::skeleton::{SkeletonGraph, TreeVertex};
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

/// Build the graph of a single skeleton from its node table.
///
/// Vertices follow row order; every non-root node gets one edge to its
/// parent weighted by the Euclidean distance between the two positions.
/// Synapse flags are left unset.
pub fn nodes_to_graph(
    skeleton_id: SkeletonId,
    nodes: &[NodeRecord],
) -> Result<SkeletonGraph, GraphError> {
    log::debug!("Generating graph from skeleton data of #{}...", skeleton_id);

    let row_of = validate_node_table(skeleton_id, nodes)?;

    let mut graph: DiGraph<TreeVertex, f64> =
        DiGraph::with_capacity(nodes.len(), nodes.len().saturating_sub(1));
    for node in nodes {
        graph.add_node(TreeVertex {
            node_id: node.treenode_id,
            parent_id: node.parent_id,
            position: node.position,
            has_synapse: None,
        });
    }

    for (row, node) in nodes.iter().enumerate() {
        let Some(parent_id) = node.parent_id else {
            continue;
        };
        let parent_row = row_of[&parent_id];
        let weight = node.position.distance(&nodes[parent_row].position);
        graph.add_edge(NodeIndex::new(row), NodeIndex::new(parent_row), weight);
    }

    let index_of: HashMap<_, _> = row_of
        .into_iter()
        .map(|(node_id, row)| (node_id, NodeIndex::new(row)))
        .collect();

    log::debug!(
        "Built graph with {} vertices and {} edges",
        graph.node_count(),
        graph.edge_count()
    );

    Ok(SkeletonGraph {
        skeleton_id,
        graph,
        index_of,
    })
}

/// Build a neuron's graph and flag the treenodes that carry connectors
pub fn neuron_to_graph(neuron: &Neuron) -> Result<SkeletonGraph, GraphError> {
    let mut graph = nodes_to_graph(neuron.skeleton_id, &neuron.nodes)?;
    graph.set_synapse_flags(&neuron.synapse_nodes());
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{ConnectorRecord, NodeId, SynapseRelation};
    use proptest::prelude::*;

    fn chain() -> Vec<NodeRecord> {
        vec![
            NodeRecord::new(1, 1, None, [0.0, 0.0, 0.0]),
            NodeRecord::new(1, 2, Some(1), [0.0, 0.0, 10.0]),
            NodeRecord::new(1, 3, Some(2), [0.0, 0.0, 20.0]),
            NodeRecord::new(1, 4, Some(3), [0.0, 0.0, 30.0]),
        ]
    }

    #[test]
    fn builds_one_edge_per_child() {
        let graph = nodes_to_graph(1, &chain()).expect("valid chain");

        assert_eq!(graph.vertex_count(), 4);
        assert_eq!(graph.edge_count(), 3);
        let edges: Vec<_> = graph.edges().collect();
        assert_eq!(edges, vec![(2, 1, 10.0), (3, 2, 10.0), (4, 3, 10.0)]);
        assert_eq!(graph.cable_length(), 30.0);
    }

    #[test]
    fn vertex_order_follows_rows() {
        let mut nodes = chain();
        nodes.reverse();
        let graph = nodes_to_graph(1, &nodes).expect("valid chain");

        let ids: Vec<NodeId> = graph.vertices().map(|v| v.node_id).collect();
        assert_eq!(ids, vec![4, 3, 2, 1]);
        assert_eq!(graph.index_of(1), Some(3));
        assert_eq!(graph.root().expect("root").index(), 3);
    }

    #[test]
    fn unsigned_coordinates_give_true_lengths() {
        let nodes = vec![
            NodeRecord::new(1, 1, None, [5u32, 5, 10]),
            NodeRecord::new(1, 2, Some(1), [5u32, 5, 4]),
        ];
        let graph = nodes_to_graph(1, &nodes).expect("valid tree");
        assert_eq!(graph.edges().next().map(|e| e.2), Some(6.0));
    }

    #[test]
    fn duplicated_root_produces_no_graph() {
        let mut nodes = chain();
        nodes[2].parent_id = None;
        let err = nodes_to_graph(1, &nodes).expect_err("two roots");
        assert_eq!(
            err,
            GraphError::MultipleRoots {
                skeleton_id: 1,
                roots: vec![1, 3]
            }
        );
    }

    #[test]
    fn neuron_graph_flags_synapses() {
        let neuron = Neuron::new(1, chain()).with_connectors(vec![ConnectorRecord {
            treenode_id: 3,
            connector_id: 99,
            relation: SynapseRelation::Postsynaptic,
        }]);
        let graph = neuron_to_graph(&neuron).expect("valid neuron");

        let flags: Vec<_> = graph.vertices().map(|v| v.has_synapse).collect();
        assert_eq!(flags, vec![Some(false), Some(false), Some(true), Some(false)]);
        assert_eq!(graph.synapse_indices(), vec![2]);
    }

    #[test]
    fn neighbors_ignore_direction() {
        let graph = nodes_to_graph(1, &chain()).expect("valid chain");
        let mut around_two = graph.neighbors(2).expect("known node");
        around_two.sort_unstable();
        assert_eq!(around_two, vec![1, 3]);
        assert_eq!(graph.children(1).expect("known node"), vec![2]);
        assert!(graph.neighbors(42).is_err());
    }

    /// Random trees: node `i` hangs off some earlier node.
    fn random_tree() -> impl Strategy<Value = Vec<NodeRecord>> {
        prop::collection::vec((any::<prop::sample::Index>(), -1e4f64..1e4, -1e4f64..1e4, -1e4f64..1e4), 1..40)
            .prop_map(|rows| {
                rows.into_iter()
                    .enumerate()
                    .map(|(i, (pick, x, y, z))| {
                        let parent = (i > 0).then(|| pick.index(i) as NodeId + 1);
                        NodeRecord::new(1, i as NodeId + 1, parent, [x, y, z])
                    })
                    .collect()
            })
    }

    proptest! {
        #[test]
        fn tree_has_n_minus_one_edges(nodes in random_tree()) {
            let graph = nodes_to_graph(1, &nodes).expect("generated trees are valid");
            prop_assert_eq!(graph.vertex_count(), nodes.len());
            prop_assert_eq!(graph.edge_count(), nodes.len() - 1);
            prop_assert_eq!(graph.vertices().filter(|v| v.parent_id.is_none()).count(), 1);
        }

        #[test]
        fn weights_survive_translation_and_relabeling(
            nodes in random_tree(),
            shift in (-1e3f64..1e3, -1e3f64..1e3, -1e3f64..1e3),
            offset in 1i64..1_000_000,
        ) {
            let moved: Vec<NodeRecord> = nodes
                .iter()
                .map(|n| {
                    let mut m = n.clone();
                    m.treenode_id += offset;
                    m.parent_id = n.parent_id.map(|p| p + offset);
                    m.position.x += shift.0;
                    m.position.y += shift.1;
                    m.position.z += shift.2;
                    m
                })
                .collect();

            let original = nodes_to_graph(1, &nodes).expect("valid");
            let shifted = nodes_to_graph(1, &moved).expect("valid");
            for ((_, _, a), (_, _, b)) in original.edges().zip(shifted.edges()) {
                prop_assert!((a - b).abs() <= 1e-6 * a.max(1.0));
            }
        }
    }
}
