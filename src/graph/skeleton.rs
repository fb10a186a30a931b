//! Tree graph of a single skeleton

use crate::data::{NodeId, Position, SkeletonId};
use crate::error::GraphError;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Attributes carried by each vertex of a skeleton graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeVertex {
    pub node_id: NodeId,
    pub parent_id: Option<NodeId>,
    pub position: Position,
    /// `None` when synapse information was never attached
    pub has_synapse: Option<bool>,
}

/// Directed graph of a skeleton: one edge per child pointing to its parent,
/// weighted by the Euclidean length of the segment.
///
/// Vertex `i` corresponds to row `i` of the node table the graph was built
/// from. Only [`crate::graph::builder`] creates these.
#[derive(Debug, Clone)]
pub struct SkeletonGraph {
    pub(crate) skeleton_id: SkeletonId,
    pub(crate) graph: DiGraph<TreeVertex, f64>,
    pub(crate) index_of: HashMap<NodeId, NodeIndex>,
}

impl SkeletonGraph {
    pub fn skeleton_id(&self) -> SkeletonId {
        self.skeleton_id
    }

    pub fn vertex_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// The underlying petgraph structure
    pub fn inner(&self) -> &DiGraph<TreeVertex, f64> {
        &self.graph
    }

    /// Vertices in node-table order
    pub fn vertices(&self) -> impl Iterator<Item = &TreeVertex> + '_ {
        self.graph.node_weights()
    }

    pub fn vertex(&self, index: usize) -> Option<&TreeVertex> {
        self.graph.node_weight(NodeIndex::new(index))
    }

    /// Position of a treenode in vertex order
    pub fn index_of(&self, node_id: NodeId) -> Option<usize> {
        self.index_of.get(&node_id).map(|idx| idx.index())
    }

    /// `(child, parent, weight)` for every edge
    pub fn edges(&self) -> impl Iterator<Item = (NodeId, NodeId, f64)> + '_ {
        self.graph.edge_references().map(move |e| {
            (
                self.graph[e.source()].node_id,
                self.graph[e.target()].node_id,
                *e.weight(),
            )
        })
    }

    /// Treenodes adjacent to `node_id`, regardless of edge direction
    pub fn neighbors(&self, node_id: NodeId) -> Result<Vec<NodeId>, GraphError> {
        let idx = self.require(node_id)?;
        Ok(self
            .graph
            .neighbors_undirected(idx)
            .map(|n| self.graph[n].node_id)
            .collect())
    }

    /// Children of `node_id` (vertices whose edge points at it)
    pub fn children(&self, node_id: NodeId) -> Result<Vec<NodeId>, GraphError> {
        let idx = self.require(node_id)?;
        Ok(self
            .graph
            .neighbors_directed(idx, Direction::Incoming)
            .map(|n| self.graph[n].node_id)
            .collect())
    }

    /// The vertex whose parent attribute is null
    pub fn root(&self) -> Result<NodeIndex, GraphError> {
        self.graph
            .node_indices()
            .find(|&idx| self.graph[idx].parent_id.is_none())
            .ok_or(GraphError::NoRootFound {
                skeleton_id: self.skeleton_id,
            })
    }

    /// Set the synapse flag on every vertex: true for `synapses`, false otherwise
    pub fn set_synapse_flags(&mut self, synapses: &HashSet<NodeId>) {
        for vertex in self.graph.node_weights_mut() {
            vertex.has_synapse = Some(synapses.contains(&vertex.node_id));
        }
    }

    /// Vertex indices flagged as carrying a synapse; an absent flag counts as false
    pub fn synapse_indices(&self) -> Vec<usize> {
        self.graph
            .node_indices()
            .filter(|&idx| self.graph[idx].has_synapse == Some(true))
            .map(|idx| idx.index())
            .collect()
    }

    /// Node ids flagged as carrying a synapse
    pub fn synapse_nodes(&self) -> HashSet<NodeId> {
        self.vertices()
            .filter(|v| v.has_synapse == Some(true))
            .map(|v| v.node_id)
            .collect()
    }

    /// Sum of all edge weights (cable length)
    pub fn cable_length(&self) -> f64 {
        self.graph.edge_weights().sum()
    }

    pub(crate) fn require(&self, node_id: NodeId) -> Result<NodeIndex, GraphError> {
        self.index_of
            .get(&node_id)
            .copied()
            .ok_or(GraphError::UnknownNode {
                skeleton_id: self.skeleton_id,
                node_id,
            })
    }
}
