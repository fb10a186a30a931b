//! Per-skeleton graph cache

use crate::data::{Neuron, SkeletonId};
use crate::error::GraphError;
use crate::graph::builder::neuron_to_graph;
use crate::graph::SkeletonGraph;
use std::collections::HashMap;

struct CachedGraph {
    fingerprint: u64,
    graph: SkeletonGraph,
}

/// Graphs keyed by skeleton id.
///
/// An entry is reused only while the neuron's node table fingerprint is
/// unchanged; otherwise it is rebuilt and overwritten.
#[derive(Default)]
pub struct GraphCache {
    entries: HashMap<SkeletonId, CachedGraph>,
}

impl GraphCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached graph for `neuron`, building it if missing or stale
    pub fn get_or_build(&mut self, neuron: &Neuron) -> Result<&SkeletonGraph, GraphError> {
        let fingerprint = neuron.fingerprint();
        let fresh = self
            .entries
            .get(&neuron.skeleton_id)
            .is_some_and(|entry| entry.fingerprint == fingerprint);

        if !fresh {
            log::debug!("Caching graph for neuron {}", neuron.describe());
            let graph = neuron_to_graph(neuron)?;
            self.entries
                .insert(neuron.skeleton_id, CachedGraph { fingerprint, graph });
        }

        Ok(&self.entries[&neuron.skeleton_id].graph)
    }

    /// Store a graph built elsewhere for `neuron`, replacing any previous one
    pub fn insert(&mut self, neuron: &Neuron, graph: SkeletonGraph) {
        self.entries.insert(
            neuron.skeleton_id,
            CachedGraph {
                fingerprint: neuron.fingerprint(),
                graph,
            },
        );
    }

    /// The cached graph, if it still matches `neuron`
    pub fn get(&self, neuron: &Neuron) -> Option<&SkeletonGraph> {
        self.entries
            .get(&neuron.skeleton_id)
            .filter(|entry| entry.fingerprint == neuron.fingerprint())
            .map(|entry| &entry.graph)
    }

    /// Drop the entry for one skeleton; returns whether one existed
    pub fn invalidate(&mut self, skeleton_id: SkeletonId) -> bool {
        self.entries.remove(&skeleton_id).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
