//! Distance-to-root and synapse clustering over any supported input

use crate::cluster::{euclidean_rows, ward, Linkage};
use crate::config::{AnalysisConfig, WardInput};
use crate::data::{GraphInput, Neuron, NodeId};
use crate::error::GraphError;
use crate::graph::algorithms::{distances_to_root, shortest_path_matrix, DistanceMap};
use crate::graph::builder::neuron_to_graph;
use crate::graph::{GraphCache, SkeletonGraph};
use crate::viz::{DendrogramHeatmap, PlotSink};
use ndarray::{Array2, Axis};
use std::borrow::Cow;
use std::collections::HashSet;

/// Distances for one skeleton, or one map per neuron of a collection
#[derive(Debug, Clone, PartialEq)]
pub enum DistanceResult {
    Single(DistanceMap),
    Many(Vec<DistanceMap>),
}

impl DistanceResult {
    /// All maps in input order
    pub fn into_maps(self) -> Vec<DistanceMap> {
        match self {
            Self::Single(map) => vec![map],
            Self::Many(maps) => maps,
        }
    }
}

/// Graph for a neuron, from the cache when one is supplied
fn graph_for<'a>(
    neuron: &Neuron,
    cache: Option<&'a mut GraphCache>,
) -> Result<Cow<'a, SkeletonGraph>, GraphError> {
    match cache {
        Some(cache) => cache.get_or_build(neuron).map(Cow::Borrowed),
        None => neuron_to_graph(neuron).map(Cow::Owned),
    }
}

fn neuron_distances(
    neuron: &Neuron,
    config: &AnalysisConfig,
    cache: Option<&mut GraphCache>,
) -> Result<DistanceMap, GraphError> {
    log::info!("Generating distances to root for neuron {}...", neuron.describe());
    let graph = graph_for(neuron, cache)?;
    let synapses = config.synapses_only.then(|| neuron.synapse_nodes());
    distances_to_root(&graph, config.distance_method, synapses.as_ref())
}

/// Geodesic distance to the root for every treenode.
///
/// With `synapses_only`, neurons report only their connector-bearing
/// treenodes and graphs only their synapse-flagged vertices.
pub fn dist_from_root(
    input: GraphInput<'_>,
    config: &AnalysisConfig,
    mut cache: Option<&mut GraphCache>,
) -> Result<DistanceResult, GraphError> {
    match input {
        GraphInput::Neuron(neuron) => neuron_distances(neuron, config, cache).map(DistanceResult::Single),
        GraphInput::Neurons(neurons) => neurons
            .iter()
            .map(|neuron| neuron_distances(neuron, config, cache.as_deref_mut()))
            .collect::<Result<Vec<_>, _>>()
            .map(DistanceResult::Many),
        GraphInput::Graph(graph) => {
            log::info!("Generating distances to root for graph of #{}...", graph.skeleton_id());
            let synapses = config.synapses_only.then(|| graph.synapse_nodes());
            distances_to_root(graph, config.distance_method, synapses.as_ref())
                .map(DistanceResult::Single)
        }
        other => Err(GraphError::UnsupportedInput {
            operation: "dist_from_root",
            input: other.kind().to_string(),
        }),
    }
}

/// Keep only the listed rows and columns
fn restrict(matrix: &Array2<f64>, keep: &[usize]) -> Array2<f64> {
    matrix.select(Axis(0), keep).select(Axis(1), keep)
}

fn linkage_for(matrix: &Array2<f64>, mode: WardInput) -> Result<Linkage, GraphError> {
    match mode {
        WardInput::Observations => ward(euclidean_rows(matrix.view()).view()),
        WardInput::Dissimilarity => ward(matrix.view()),
    }
}

/// Ward clustering of synapse-bearing treenodes by geodesic distance.
///
/// Vertices whose synapse flag is unset count as synapse-free. With `plot`
/// set, a dendrogram heatmap is handed to `sink`; plotting problems are
/// logged and never change the returned linkage.
pub fn cluster_nodes_w_synapses(
    input: GraphInput<'_>,
    config: &AnalysisConfig,
    sink: Option<&mut dyn PlotSink>,
) -> Result<Linkage, GraphError> {
    let graph: Cow<'_, SkeletonGraph> = match input {
        GraphInput::Graph(graph) => Cow::Borrowed(graph),
        GraphInput::Neuron(neuron) => Cow::Owned(neuron_to_graph(neuron)?),
        GraphInput::Neurons([neuron]) => Cow::Owned(neuron_to_graph(neuron)?),
        other => {
            return Err(GraphError::UnsupportedInput {
                operation: "cluster_nodes_w_synapses",
                input: match other {
                    GraphInput::Neurons(neurons) => format!("{} neurons; provide a single neuron", neurons.len()),
                    _ => other.kind().to_string(),
                },
            })
        }
    };

    let synapses = graph.synapse_indices();
    if synapses.len() < 2 {
        return Err(GraphError::EmptyClusterInput {
            found: synapses.len(),
        });
    }

    let distances = shortest_path_matrix(&graph);
    let reduced = restrict(&distances, &synapses);

    log::info!("Clustering {} nodes with synapses...", synapses.len());
    let linkage = linkage_for(&reduced, config.ward_input)?;

    if config.plot {
        match sink {
            Some(sink) => render(sink, &graph, &distances, &synapses, &linkage, config.ward_input),
            None => log::warn!(
                "{}",
                GraphError::MissingOptionalDependency("no plot sink supplied".to_string())
            ),
        }
    }

    Ok(linkage)
}

fn render(
    sink: &mut dyn PlotSink,
    graph: &SkeletonGraph,
    distances: &Array2<f64>,
    synapses: &[usize],
    linkage: &Linkage,
    mode: WardInput,
) {
    log::debug!("Plotting graph");
    let row_linkage = match linkage_for(distances, mode) {
        Ok(linkage) => linkage,
        Err(err) => {
            log::warn!("Skipping plot: {}", err);
            return;
        }
    };
    let node_ids: Vec<NodeId> = graph.vertices().map(|v| v.node_id).collect();
    let plot = DendrogramHeatmap::new(distances, &node_ids, synapses, row_linkage, linkage.clone());

    if let Err(err) = sink.dendrogram_heatmap(&plot) {
        log::warn!("Failed to render dendrogram heatmap: {:#}", err);
    }
}

/// Node ids of the vertices a clustering was run on, in observation order
pub fn synapse_node_ids(graph: &SkeletonGraph) -> Vec<NodeId> {
    let flagged: HashSet<usize> = graph.synapse_indices().into_iter().collect();
    graph
        .vertices()
        .enumerate()
        .filter(|(i, _)| flagged.contains(i))
        .map(|(_, v)| v.node_id)
        .collect()
}
