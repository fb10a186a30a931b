//! Results persistence module

use crate::cluster::Linkage;
use crate::data::{Neuron, SkeletonId};
use crate::graph::algorithms::DistanceMap;
use crate::graph::NetworkGraph;
use anyhow::{Context, Result};
use serde_json::{json, to_string_pretty};
use std::fs;
use std::path::{Path, PathBuf};

fn write_json(path: &Path, value: &serde_json::Value) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    fs::write(path, to_string_pretty(value)?)
        .with_context(|| format!("Failed to write {}", path.display()))
}

/// Save one skeleton's distances to root
pub fn save_distances(
    skeleton_id: SkeletonId,
    distances: &DistanceMap,
    output_dir: &Path,
) -> Result<PathBuf> {
    log::info!("Saving {} distances for skeleton #{}", distances.len(), skeleton_id);

    let max = distances.values().copied().fold(0.0_f64, f64::max);
    let summary = json!({
        "skeleton_id": skeleton_id,
        "node_count": distances.len(),
        "max_distance": max,
        "distances": distances
            .iter()
            .map(|(node_id, dist)| json!({ "treenode_id": node_id, "dist_to_root": dist }))
            .collect::<Vec<_>>(),
    });

    let path = output_dir.join(format!("dist_to_root_{}.json", skeleton_id));
    write_json(&path, &summary)?;
    Ok(path)
}

/// Save a synapse clustering with the node ids of its observations
pub fn save_linkage(
    skeleton_id: SkeletonId,
    node_ids: &[i64],
    linkage: &Linkage,
    output_dir: &Path,
) -> Result<PathBuf> {
    log::info!("Saving linkage with {} merges for skeleton #{}", linkage.len(), skeleton_id);

    let summary = json!({
        "skeleton_id": skeleton_id,
        "observations": node_ids,
        "leaves": linkage.leaves(),
        "linkage": linkage.steps,
    });

    let path = output_dir.join(format!("linkage_{}.json", skeleton_id));
    write_json(&path, &summary)?;
    Ok(path)
}

/// Save vertices, edges and totals of a network graph
pub fn save_network_summary(network: &NetworkGraph, output_dir: &Path) -> Result<PathBuf> {
    log::info!(
        "Saving network with {} neurons and {} connections",
        network.vertex_count(),
        network.edge_count()
    );

    let summary = json!({
        "graph_stats": {
            "node_count": network.vertex_count(),
            "edge_count": network.edge_count(),
            "total_synapses": network.total_weight(),
        },
        "neurons": network.vertices().collect::<Vec<_>>(),
        "edges": network
            .edges()
            .map(|(source, target, weight)| json!({ "source": source, "target": target, "weight": weight }))
            .collect::<Vec<_>>(),
    });

    let path = output_dir.join("network.json");
    write_json(&path, &summary)?;
    Ok(path)
}

/// Save enumerated paths between two treenodes
pub fn save_paths(skeleton_id: SkeletonId, paths: &[Vec<i64>], output_dir: &Path) -> Result<PathBuf> {
    let summary = json!({
        "skeleton_id": skeleton_id,
        "path_count": paths.len(),
        "paths": paths,
    });

    let path = output_dir.join(format!("paths_{}.json", skeleton_id));
    write_json(&path, &summary)?;
    Ok(path)
}

/// Save which treenodes of a neuron lie inside a volume, with the pruned
/// node table
pub fn save_volume_membership(
    neuron: &Neuron,
    volume_name: &str,
    inside: &[bool],
    pruned: &Neuron,
    output_dir: &Path,
) -> Result<PathBuf> {
    log::info!(
        "Saving volume {} membership for {}",
        volume_name,
        neuron.describe()
    );

    let summary = json!({
        "skeleton_id": neuron.skeleton_id,
        "volume": volume_name,
        "inside_count": inside.iter().filter(|&&is_in| is_in).count(),
        "membership": neuron
            .nodes
            .iter()
            .zip(inside)
            .map(|(node, is_in)| json!({ "treenode_id": node.treenode_id, "inside": is_in }))
            .collect::<Vec<_>>(),
        "pruned": pruned.nodes,
    });

    let path = output_dir.join(format!("volume_{}_{}.json", volume_name, neuron.skeleton_id));
    write_json(&path, &summary)?;
    Ok(path)
}
