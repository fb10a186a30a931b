//! Neuron-level network graphs

use crate::data::{AdjacencyMatrix, EdgeTable, SkeletonId, SkeletonSource};
use anyhow::Result;
use itertools::Itertools;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A whole neuron as a network vertex
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeuronVertex {
    pub skeleton_id: SkeletonId,
    pub label: Option<String>,
}

/// Directed connectivity graph; edge weights are synapse counts
#[derive(Debug, Clone)]
pub struct NetworkGraph {
    graph: DiGraph<NeuronVertex, u32>,
}

impl NetworkGraph {
    /// Add one vertex per id, skipping repeats
    fn with_vertices(ids: impl IntoIterator<Item = SkeletonId>) -> (Self, HashMap<SkeletonId, NodeIndex>) {
        let mut graph = DiGraph::new();
        let mut index_of = HashMap::new();
        for id in ids.into_iter().unique() {
            let idx = graph.add_node(NeuronVertex {
                skeleton_id: id,
                label: None,
            });
            index_of.insert(id, idx);
        }
        (Self { graph }, index_of)
    }

    pub fn vertex_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn inner(&self) -> &DiGraph<NeuronVertex, u32> {
        &self.graph
    }

    /// Vertices in index order
    pub fn vertices(&self) -> impl Iterator<Item = &NeuronVertex> + '_ {
        self.graph.node_weights()
    }

    /// `(source, target, weight)` in insertion order
    pub fn edges(&self) -> impl Iterator<Item = (SkeletonId, SkeletonId, u32)> + '_ {
        self.graph.edge_references().map(move |e| {
            (
                self.graph[e.source()].skeleton_id,
                self.graph[e.target()].skeleton_id,
                *e.weight(),
            )
        })
    }

    /// Total synapse count over all edges
    pub fn total_weight(&self) -> u64 {
        self.graph.edge_weights().map(|&w| u64::from(w)).sum()
    }
}

/// Build a network from neuron ids and a pairwise edge table.
///
/// Vertices follow `table.skeleton_ids`; edges keep table order and need
/// `weight >= threshold`.
pub fn from_edge_table(table: &EdgeTable, threshold: u32) -> NetworkGraph {
    log::info!("Generating network from {} skeleton IDs...", table.skeleton_ids.len());

    let (mut network, index_of) = NetworkGraph::with_vertices(table.skeleton_ids.iter().copied());
    for vertex in network.graph.node_weights_mut() {
        vertex.label = table.names.get(&vertex.skeleton_id).cloned();
    }

    let mut skipped = 0usize;
    for edge in table.edges.iter().filter(|e| e.weight >= threshold) {
        match (index_of.get(&edge.source), index_of.get(&edge.target)) {
            (Some(&src), Some(&dst)) => {
                network.graph.add_edge(src, dst, edge.weight);
            }
            _ => skipped += 1,
        }
    }
    if skipped > 0 {
        log::warn!("Skipped {} edges between neurons outside the requested set", skipped);
    }

    network
}

/// Fetch names and edges for `skeleton_ids`, then build the network
pub fn from_skeleton_ids(
    skeleton_ids: &[SkeletonId],
    source: &dyn SkeletonSource,
    threshold: u32,
) -> Result<NetworkGraph> {
    let skeleton_ids: Vec<SkeletonId> = skeleton_ids.iter().copied().unique().collect();
    let table = EdgeTable {
        names: source.names(&skeleton_ids)?,
        edges: source.edges(&skeleton_ids)?,
        skeleton_ids,
    };
    Ok(from_edge_table(&table, threshold))
}

/// Build a network from a dense adjacency matrix.
///
/// Vertices are the row ids followed by column ids not already present.
/// Cells `>= threshold` become edges in row-major order, capped at `cutoff`.
pub fn from_matrix(matrix: &AdjacencyMatrix, threshold: u32, cutoff: Option<u32>) -> NetworkGraph {
    log::info!("Generating network from adjacency matrix...");

    let (mut network, index_of) =
        NetworkGraph::with_vertices(matrix.rows.iter().chain(matrix.cols.iter()).copied());
    for vertex in network.graph.node_weights_mut() {
        vertex.label = Some(vertex.skeleton_id.to_string());
    }

    for ((r, c), &value) in matrix.values.indexed_iter() {
        if value < threshold {
            continue;
        }
        let weight = cutoff.map_or(value, |cap| value.min(cap));
        let src = index_of[&matrix.rows[r]];
        let dst = index_of[&matrix.cols[c]];
        network.graph.add_edge(src, dst, weight);
    }

    network
}
