//! Skeleton and network data as delivered by the fetch collaborator

pub mod parquet;
pub mod preprocessing;

use crate::graph::SkeletonGraph;
use crate::intersect::Volume;
use anyhow::Result;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};

/// Identifier of a treenode, unique within a skeleton
pub type NodeId = i64;

/// Identifier of a skeleton (one neuron)
pub type SkeletonId = i64;

/// A position in annotation space (nm).
///
/// Coordinates are stored as `f64` so differences between integer-stored
/// coordinates cannot wrap.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance to another position
    pub fn distance(&self, other: &Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

impl<T: Into<f64> + Copy> From<[T; 3]> for Position {
    fn from(coords: [T; 3]) -> Self {
        Self::new(coords[0].into(), coords[1].into(), coords[2].into())
    }
}

/// One row of a skeleton's node table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub treenode_id: NodeId,
    /// `None` marks the root
    pub parent_id: Option<NodeId>,
    pub position: Position,
    pub skeleton_id: SkeletonId,
}

impl NodeRecord {
    pub fn new(
        skeleton_id: SkeletonId,
        treenode_id: NodeId,
        parent_id: Option<NodeId>,
        position: impl Into<Position>,
    ) -> Self {
        Self {
            treenode_id,
            parent_id,
            position: position.into(),
            skeleton_id,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Direction of a synapse relative to the treenode carrying it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SynapseRelation {
    Presynaptic,
    Postsynaptic,
    Other,
}

impl SynapseRelation {
    /// Decode the annotation service's numeric relation code
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => Self::Presynaptic,
            1 => Self::Postsynaptic,
            _ => Self::Other,
        }
    }
}

/// A connector (synapse) attached to a treenode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectorRecord {
    pub treenode_id: NodeId,
    pub connector_id: i64,
    pub relation: SynapseRelation,
}

/// A reconstructed neuron: node table plus synapses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neuron {
    pub skeleton_id: SkeletonId,
    pub name: Option<String>,
    pub nodes: Vec<NodeRecord>,
    pub connectors: Vec<ConnectorRecord>,
}

impl Neuron {
    pub fn new(skeleton_id: SkeletonId, nodes: Vec<NodeRecord>) -> Self {
        Self {
            skeleton_id,
            name: None,
            nodes,
            connectors: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_connectors(mut self, connectors: Vec<ConnectorRecord>) -> Self {
        self.connectors = connectors;
        self
    }

    /// Treenodes that carry at least one connector
    pub fn synapse_nodes(&self) -> HashSet<NodeId> {
        self.connectors.iter().map(|c| c.treenode_id).collect()
    }

    /// Hash of the node table; changes whenever ids, parents or positions change
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.skeleton_id.hash(&mut hasher);
        self.nodes.len().hash(&mut hasher);
        for node in &self.nodes {
            node.treenode_id.hash(&mut hasher);
            node.parent_id.hash(&mut hasher);
            node.position.x.to_bits().hash(&mut hasher);
            node.position.y.to_bits().hash(&mut hasher);
            node.position.z.to_bits().hash(&mut hasher);
        }
        let mut synapses: Vec<NodeId> = self.synapse_nodes().into_iter().collect();
        synapses.sort_unstable();
        synapses.hash(&mut hasher);
        hasher.finish()
    }

    /// Human-readable description for log messages
    pub fn describe(&self) -> String {
        match &self.name {
            Some(name) => format!("{} #{}", name, self.skeleton_id),
            None => format!("#{}", self.skeleton_id),
        }
    }
}

/// A directed connection between two neurons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkEdge {
    pub source: SkeletonId,
    pub target: SkeletonId,
    /// Number of synapses
    pub weight: u32,
}

/// Neurons plus the connections between them
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EdgeTable {
    pub skeleton_ids: Vec<SkeletonId>,
    pub names: HashMap<SkeletonId, String>,
    pub edges: Vec<NetworkEdge>,
}

/// Dense connectivity: rows are sources, columns are targets
#[derive(Debug, Clone, PartialEq)]
pub struct AdjacencyMatrix {
    pub rows: Vec<SkeletonId>,
    pub cols: Vec<SkeletonId>,
    pub values: Array2<u32>,
}

impl AdjacencyMatrix {
    /// Create a matrix, checking that the labels match the value shape
    pub fn new(
        rows: Vec<SkeletonId>,
        cols: Vec<SkeletonId>,
        values: Array2<u32>,
    ) -> Result<Self, crate::error::GraphError> {
        if values.dim() != (rows.len(), cols.len()) {
            return Err(crate::error::GraphError::InvalidMatrix(format!(
                "{} row and {} column labels for a {:?} matrix",
                rows.len(),
                cols.len(),
                values.dim()
            )));
        }
        Ok(Self { rows, cols, values })
    }
}

/// Anything the analyses know how to turn into graphs
#[derive(Debug, Clone, Copy)]
pub enum GraphInput<'a> {
    Neuron(&'a Neuron),
    Neurons(&'a [Neuron]),
    Graph(&'a SkeletonGraph),
    AdjacencyMatrix(&'a AdjacencyMatrix),
    EdgeTable(&'a EdgeTable),
}

impl GraphInput<'_> {
    /// Short name of the variant for error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Neuron(_) => "a single neuron",
            Self::Neurons(_) => "a neuron collection",
            Self::Graph(_) => "a skeleton graph",
            Self::AdjacencyMatrix(_) => "an adjacency matrix",
            Self::EdgeTable(_) => "an edge table",
        }
    }
}

impl<'a> From<&'a Neuron> for GraphInput<'a> {
    fn from(neuron: &'a Neuron) -> Self {
        Self::Neuron(neuron)
    }
}

impl<'a> From<&'a [Neuron]> for GraphInput<'a> {
    fn from(neurons: &'a [Neuron]) -> Self {
        Self::Neurons(neurons)
    }
}

impl<'a> From<&'a SkeletonGraph> for GraphInput<'a> {
    fn from(graph: &'a SkeletonGraph) -> Self {
        Self::Graph(graph)
    }
}

impl<'a> From<&'a AdjacencyMatrix> for GraphInput<'a> {
    fn from(matrix: &'a AdjacencyMatrix) -> Self {
        Self::AdjacencyMatrix(matrix)
    }
}

impl<'a> From<&'a EdgeTable> for GraphInput<'a> {
    fn from(table: &'a EdgeTable) -> Self {
        Self::EdgeTable(table)
    }
}

/// Access to remotely stored skeletons.
///
/// Callers pass an implementation explicitly to every operation that fetches.
pub trait SkeletonSource {
    /// Fetch one neuron's node table and connectors
    fn neuron(&self, skeleton_id: SkeletonId) -> Result<Neuron>;

    /// Fetch display names; neurons without a name are left out
    fn names(&self, skeleton_ids: &[SkeletonId]) -> Result<HashMap<SkeletonId, String>>;

    /// Fetch connections among the given neurons
    fn edges(&self, skeleton_ids: &[SkeletonId]) -> Result<Vec<NetworkEdge>>;

    /// Fetch a named mesh volume
    fn volume(&self, name: &str) -> Result<Volume>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsigned_coordinates_do_not_wrap() {
        let child = Position::from([0u32, 0, 0]);
        let parent = Position::from([0u32, 0, 10]);

        assert_eq!(child.distance(&parent), 10.0);
        assert_eq!(parent.distance(&child), 10.0);
    }

    #[test]
    fn fingerprint_tracks_node_table_changes() {
        let mut neuron = Neuron::new(
            7,
            vec![
                NodeRecord::new(7, 1, None, [0.0, 0.0, 0.0]),
                NodeRecord::new(7, 2, Some(1), [0.0, 0.0, 5.0]),
            ],
        );
        let before = neuron.fingerprint();
        assert_eq!(before, neuron.clone().fingerprint());

        neuron.nodes[1].position.z = 6.0;
        assert_ne!(before, neuron.fingerprint());
    }

    #[test]
    fn adjacency_matrix_rejects_mismatched_labels() {
        let err = AdjacencyMatrix::new(vec![1, 2], vec![1], Array2::zeros((2, 2)))
            .expect_err("shape mismatch");
        assert!(matches!(err, crate::error::GraphError::InvalidMatrix(_)));
    }
}
