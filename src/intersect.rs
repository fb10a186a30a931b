//! Point-in-volume tests against triangle meshes, and pruning of neurons to a
//! volume

use crate::data::{Neuron, Position};
use crate::error::GraphError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// A closed triangle mesh, e.g. a neuropil outline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Volume {
    pub name: String,
    pub vertices: Vec<Position>,
    /// Vertex indices of each triangle
    pub faces: Vec<[usize; 3]>,
}

impl Volume {
    pub fn new(
        name: impl Into<String>,
        vertices: Vec<Position>,
        faces: Vec<[usize; 3]>,
    ) -> Result<Self, GraphError> {
        let volume = Self {
            name: name.into(),
            vertices,
            faces,
        };
        volume.validate()?;
        Ok(volume)
    }

    /// Every face must reference existing vertices
    pub fn validate(&self) -> Result<(), GraphError> {
        if let Some((face, corner)) = self
            .faces
            .iter()
            .enumerate()
            .find_map(|(i, f)| f.iter().find(|&&v| v >= self.vertices.len()).map(|&v| (i, v)))
        {
            return Err(GraphError::InvalidVolume {
                name: self.name.clone(),
                reason: format!(
                    "face {} references vertex {} of {}",
                    face,
                    corner,
                    self.vertices.len()
                ),
            });
        }
        Ok(())
    }

    /// Axis-aligned bounding box as (min, max)
    fn bounds(&self) -> Option<([f64; 3], [f64; 3])> {
        let first = self.vertices.first()?;
        let init = (coords(first), coords(first));
        Some(self.vertices.iter().fold(init, |(mut lo, mut hi), v| {
            for (axis, c) in coords(v).into_iter().enumerate() {
                lo[axis] = lo[axis].min(c);
                hi[axis] = hi[axis].max(c);
            }
            (lo, hi)
        }))
    }
}

/// Which side of a volume to keep when pruning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum VolumeMode {
    /// Keep treenodes inside the volume
    #[default]
    In,
    /// Keep treenodes outside the volume
    Out,
}

// Upward, tilted off the z axis so rays cannot run along axis-aligned edges
const RAY: [f64; 3] = [1.414_213_6e-4, 1.732_050_8e-4, 1.0];

fn coords(p: &Position) -> [f64; 3] {
    [p.x, p.y, p.z]
}

fn sub(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

/// Möller-Trumbore: does the ray from `origin` along `RAY` cross the triangle
/// at or beyond its origin?
fn ray_crosses(origin: [f64; 3], a: [f64; 3], b: [f64; 3], c: [f64; 3]) -> bool {
    let e1 = sub(b, a);
    let e2 = sub(c, a);
    let p = cross(RAY, e2);
    let det = dot(e1, p);
    if det == 0.0 {
        return false;
    }

    let inv = 1.0 / det;
    let s = sub(origin, a);
    let u = dot(s, p) * inv;
    if !(0.0..=1.0).contains(&u) {
        return false;
    }
    let q = cross(s, e1);
    let v = dot(RAY, q) * inv;
    if v < 0.0 || u + v > 1.0 {
        return false;
    }
    dot(e2, q) * inv >= 0.0
}

fn contains(volume: &Volume, bounds: &([f64; 3], [f64; 3]), point: &Position) -> bool {
    let origin = coords(point);
    let (lo, hi) = bounds;
    if (0..3).any(|axis| origin[axis] < lo[axis] || origin[axis] > hi[axis]) {
        return false;
    }

    let crossings = volume
        .faces
        .iter()
        .filter(|[a, b, c]| {
            ray_crosses(
                origin,
                coords(&volume.vertices[*a]),
                coords(&volume.vertices[*b]),
                coords(&volume.vertices[*c]),
            )
        })
        .count();
    crossings % 2 == 1
}

/// Whether each point lies inside the volume.
///
/// Counts mesh crossings of an upward ray, so concave meshes are handled.
pub fn in_volume(points: &[Position], volume: &Volume) -> Vec<bool> {
    let Some(bounds) = volume.bounds() else {
        log::warn!("Volume {} has no vertices", volume.name);
        return vec![false; points.len()];
    };
    log::debug!(
        "Testing {} points against volume {} ({} faces)",
        points.len(),
        volume.name,
        volume.faces.len()
    );
    points
        .iter()
        .map(|p| contains(volume, &bounds, p))
        .collect()
}

/// [`in_volume`] against several volumes, keyed by volume name
pub fn in_volumes(points: &[Position], volumes: &[Volume]) -> BTreeMap<String, Vec<bool>> {
    volumes
        .iter()
        .map(|v| (v.name.clone(), in_volume(points, v)))
        .collect()
}

/// Per-treenode membership, in node table order
pub fn neuron_in_volume(neuron: &Neuron, volume: &Volume) -> Vec<bool> {
    let points: Vec<Position> = neuron.nodes.iter().map(|n| n.position).collect();
    in_volume(&points, volume)
}

/// A copy of `neuron` restricted to the treenodes on the `mode` side of
/// `volume`.
///
/// Kept nodes whose parent was dropped become roots, so the result may have
/// several fragments. Connectors on dropped nodes are removed.
pub fn prune_to_volume(neuron: &Neuron, volume: &Volume, mode: VolumeMode) -> Neuron {
    let inside = neuron_in_volume(neuron, volume);
    let keep_inside = mode == VolumeMode::In;

    let kept: HashSet<_> = neuron
        .nodes
        .iter()
        .zip(&inside)
        .filter(|(_, is_in)| **is_in == keep_inside)
        .map(|(n, _)| n.treenode_id)
        .collect();

    let nodes = neuron
        .nodes
        .iter()
        .filter(|n| kept.contains(&n.treenode_id))
        .map(|n| {
            let mut node = n.clone();
            node.parent_id = n.parent_id.filter(|p| kept.contains(p));
            node
        })
        .collect::<Vec<_>>();

    log::info!(
        "Kept {} of {} treenodes of {} {} volume {}",
        nodes.len(),
        neuron.nodes.len(),
        neuron.describe(),
        if keep_inside { "inside" } else { "outside" },
        volume.name
    );

    let mut pruned = neuron.clone();
    pruned.connectors.retain(|c| kept.contains(&c.treenode_id));
    pruned.nodes = nodes;
    pruned
}
