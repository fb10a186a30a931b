//! Graph algorithms for skeleton analysis

use crate::config::DistanceMethod;
use crate::data::NodeId;
use crate::error::GraphError;
use crate::graph::SkeletonGraph;
use ndarray::Array2;
use petgraph::algo::dijkstra;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{BTreeMap, HashSet};

/// Geodesic distance to the root, keyed by treenode id
pub type DistanceMap = BTreeMap<NodeId, f64>;

/// The skeleton as an undirected graph with the same vertex indices
fn undirected(graph: &SkeletonGraph) -> UnGraph<(), f64> {
    graph
        .inner()
        .map(|_, _| (), |_, &w| w)
        .into_edge_type()
}

/// Dijkstra distances from `source` to every vertex; unreachable is `+inf`
fn distances_from(graph: &UnGraph<(), f64>, source: NodeIndex) -> Vec<f64> {
    let reached = dijkstra(graph, source, None, |e| *e.weight());
    let mut row = vec![f64::INFINITY; graph.node_count()];
    for (idx, dist) in reached {
        row[idx.index()] = dist;
    }
    row
}

/// All-pairs geodesic distances; edges are traversed in both directions.
///
/// Row `i` holds the distances from vertex `i`.
pub fn shortest_path_matrix(graph: &SkeletonGraph) -> Array2<f64> {
    log::info!(
        "Generating distance matrix for skeleton #{} ({} nodes)...",
        graph.skeleton_id(),
        graph.vertex_count()
    );

    let ungraph = undirected(graph);
    let n = ungraph.node_count();
    let mut matrix = Array2::from_elem((n, n), f64::INFINITY);
    for source in ungraph.node_indices() {
        let row = distances_from(&ungraph, source);
        for (target, dist) in row.into_iter().enumerate() {
            matrix[[source.index(), target]] = dist;
        }
    }
    matrix
}

/// Distance from every vertex to the root.
///
/// Both methods read distances measured from the root, so they agree
/// exactly. `only` restricts which node ids are reported, never which
/// vertices the search may pass through.
pub fn distances_to_root(
    graph: &SkeletonGraph,
    method: DistanceMethod,
    only: Option<&HashSet<NodeId>>,
) -> Result<DistanceMap, GraphError> {
    let root = graph.root()?;

    let from_root: Vec<f64> = match method {
        DistanceMethod::FullMatrix => shortest_path_matrix(graph).row(root.index()).to_vec(),
        DistanceMethod::SingleSource => {
            log::info!(
                "Computing distances from root of skeleton #{}...",
                graph.skeleton_id()
            );
            distances_from(&undirected(graph), root)
        }
    };

    Ok(graph
        .vertices()
        .zip(from_root)
        .filter(|(vertex, _)| only.map_or(true, |keep| keep.contains(&vertex.node_id)))
        .map(|(vertex, dist)| (vertex.node_id, dist))
        .collect())
}

/// Which edges a path may follow
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum PathMode {
    /// Child to parent
    Outgoing,
    /// Parent to child
    Incoming,
    /// Either way
    All,
}

/// Enumerate every simple path from `start` to `end`.
///
/// A path is only extended while it holds at most `max_len` vertices, so
/// returned paths have up to `max_len + 1` vertices. Without a bound the
/// number of paths can grow exponentially on graphs with cycles.
pub fn find_all_paths(
    graph: &SkeletonGraph,
    start: NodeId,
    end: NodeId,
    mode: PathMode,
    max_len: Option<usize>,
) -> Result<Vec<Vec<NodeId>>, GraphError> {
    if max_len.is_none() {
        log::warn!("Enumerating paths without a length bound; this may be slow");
    }

    let inner = graph.inner();
    let start_idx = graph.require(start)?;
    let end_idx = graph.require(end)?;

    let neighbors = |idx: NodeIndex| -> Vec<NodeIndex> {
        match mode {
            PathMode::Outgoing => inner.neighbors_directed(idx, Direction::Outgoing).collect(),
            PathMode::Incoming => inner.neighbors_directed(idx, Direction::Incoming).collect(),
            PathMode::All => inner.neighbors_undirected(idx).collect(),
        }
    };

    let mut paths = Vec::new();
    // Each frame owns the path leading to it, so branches never share a visited set
    let mut stack: Vec<Vec<NodeIndex>> = vec![vec![start_idx]];
    while let Some(path) = stack.pop() {
        let Some(&tip) = path.last() else {
            continue;
        };
        if tip == end_idx {
            paths.push(path.iter().map(|&idx| inner[idx].node_id).collect());
            continue;
        }
        if max_len.is_some_and(|limit| path.len() > limit) {
            continue;
        }
        let on_path: HashSet<NodeIndex> = path.iter().copied().collect();
        for next in neighbors(tip).into_iter().filter(|n| !on_path.contains(n)) {
            let mut extended = path.clone();
            extended.push(next);
            stack.push(extended);
        }
    }

    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::NodeRecord;
    use crate::graph::builder::nodes_to_graph;
    use petgraph::graph::DiGraph;
    use proptest::prelude::*;
    use std::collections::HashMap;

    fn chain() -> SkeletonGraph {
        nodes_to_graph(
            1,
            &[
                NodeRecord::new(1, 1, None, [0.0, 0.0, 0.0]),
                NodeRecord::new(1, 2, Some(1), [0.0, 0.0, 10.0]),
                NodeRecord::new(1, 3, Some(2), [0.0, 0.0, 20.0]),
                NodeRecord::new(1, 4, Some(3), [0.0, 0.0, 30.0]),
            ],
        )
        .expect("valid chain")
    }

    /// Root 1 with two branches: 1-2-3 and 1-4
    fn fork() -> SkeletonGraph {
        nodes_to_graph(
            1,
            &[
                NodeRecord::new(1, 2, Some(1), [3.0, 4.0, 0.0]),
                NodeRecord::new(1, 1, None, [0.0, 0.0, 0.0]),
                NodeRecord::new(1, 3, Some(2), [3.0, 4.0, 12.0]),
                NodeRecord::new(1, 4, Some(1), [-1.0, 0.0, 0.0]),
            ],
        )
        .expect("valid fork")
    }

    #[test]
    fn chain_distances() {
        let distances = distances_to_root(&chain(), DistanceMethod::SingleSource, None)
            .expect("has root");
        assert_eq!(
            distances,
            DistanceMap::from([(1, 0.0), (2, 10.0), (3, 20.0), (4, 30.0)])
        );
    }

    #[test]
    fn fork_distances_follow_the_tree() {
        let distances =
            distances_to_root(&fork(), DistanceMethod::FullMatrix, None).expect("has root");
        assert_eq!(distances[&1], 0.0);
        assert_eq!(distances[&2], 5.0);
        assert_eq!(distances[&3], 17.0);
        assert_eq!(distances[&4], 1.0);
    }

    #[test]
    fn filter_only_limits_reported_nodes() {
        let only = HashSet::from([3]);
        let distances = distances_to_root(&fork(), DistanceMethod::SingleSource, Some(&only))
            .expect("has root");
        assert_eq!(distances, DistanceMap::from([(3, 17.0)]));
    }

    #[test]
    fn matrix_is_symmetric_with_zero_diagonal() {
        let matrix = shortest_path_matrix(&fork());
        assert_eq!(matrix.dim(), (4, 4));
        for i in 0..4 {
            assert_eq!(matrix[[i, i]], 0.0);
        }
        // vertex 2 is node 3, vertex 3 is node 4: 12 + 5 + 1
        assert_eq!(matrix[[2, 3]], 18.0);
        assert_eq!(matrix[[3, 2]], 18.0);
    }

    #[test]
    fn missing_root_is_reported() {
        let mut graph = DiGraph::new();
        graph.add_node(crate::graph::TreeVertex {
            node_id: 1,
            parent_id: Some(2),
            position: Default::default(),
            has_synapse: None,
        });
        let rootless = SkeletonGraph {
            skeleton_id: 3,
            graph,
            index_of: HashMap::from([(1, NodeIndex::new(0))]),
        };

        assert_eq!(
            distances_to_root(&rootless, DistanceMethod::SingleSource, None),
            Err(GraphError::NoRootFound { skeleton_id: 3 })
        );
    }

    #[test]
    fn paths_follow_mode() {
        let graph = fork();
        assert_eq!(
            find_all_paths(&graph, 3, 1, PathMode::Outgoing, None).expect("known nodes"),
            vec![vec![3, 2, 1]]
        );
        assert!(find_all_paths(&graph, 1, 3, PathMode::Outgoing, None)
            .expect("known nodes")
            .is_empty());
        assert_eq!(
            find_all_paths(&graph, 3, 4, PathMode::All, None).expect("known nodes"),
            vec![vec![3, 2, 1, 4]]
        );
    }

    #[test]
    fn paths_respect_length_bound() {
        let graph = fork();
        // 3-2-1-4 has four vertices: reached once the three-vertex prefix may grow
        assert!(find_all_paths(&graph, 3, 4, PathMode::All, Some(2))
            .expect("known nodes")
            .is_empty());
        assert_eq!(
            find_all_paths(&graph, 3, 4, PathMode::All, Some(3)).expect("known nodes"),
            vec![vec![3, 2, 1, 4]]
        );
        assert!(find_all_paths(&graph, 3, 99, PathMode::All, None).is_err());
    }

    fn random_tree() -> impl Strategy<Value = Vec<NodeRecord>> {
        prop::collection::vec((any::<prop::sample::Index>(), 0u32..1000, 0u32..1000, 0u32..1000), 1..30)
            .prop_map(|rows| {
                rows.into_iter()
                    .enumerate()
                    .map(|(i, (pick, x, y, z))| {
                        let parent = (i > 0).then(|| pick.index(i) as NodeId);
                        // distinct heights keep every edge longer than zero
                        NodeRecord::new(1, i as NodeId, parent, [x, y, z + 1000 * i as u32])
                    })
                    .collect()
            })
    }

    proptest! {
        #[test]
        fn both_methods_agree_exactly(nodes in random_tree()) {
            let graph = nodes_to_graph(1, &nodes).expect("valid tree");
            let full = distances_to_root(&graph, DistanceMethod::FullMatrix, None).expect("root");
            let single = distances_to_root(&graph, DistanceMethod::SingleSource, None).expect("root");
            prop_assert_eq!(&full, &single);
            prop_assert_eq!(full[&0], 0.0);
            for (node_id, d) in &full {
                prop_assert!(d.is_finite());
                if *node_id != 0 {
                    prop_assert!(*d > 0.0, "node {} at distance {}", node_id, d);
                }
            }
        }

        #[test]
        fn triangle_inequality_holds(nodes in random_tree()) {
            let graph = nodes_to_graph(1, &nodes).expect("valid tree");
            let m = shortest_path_matrix(&graph);
            let n = graph.vertex_count();
            for i in 0..n {
                for j in 0..n {
                    for k in 0..n {
                        prop_assert!(m[[i, j]] <= m[[i, k]] + m[[k, j]] + 1e-9);
                    }
                }
            }
        }
    }
}
