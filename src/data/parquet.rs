//! Parquet-backed skeleton source
//!
//! A data directory holds `nodes.parquet` (skeleton_id, treenode_id,
//! parent_id, x, y, z), `edges.parquet` (source_skid, target_skid, weight) and,
//! optionally, `connectors.parquet` (skeleton_id, treenode_id, connector_id,
//! relation) and `names.parquet` (skeleton_id, neuron_name). Mesh volumes are
//! JSON files under `volumes/<name>.json`.

use crate::data::preprocessing::{filter_connectors, split_by_skeleton};
use crate::intersect::Volume;
use crate::data::{
    AdjacencyMatrix, ConnectorRecord, NetworkEdge, Neuron, NodeRecord, Position, SkeletonId,
    SkeletonSource, SynapseRelation,
};
use anyhow::{anyhow, Context, Result};
use ndarray::Array2;
use polars::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Reads skeletons from a directory of parquet files
pub struct ParquetSource {
    dir: PathBuf,
}

impl ParquetSource {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(anyhow!("Data directory not found: {}", dir.display()));
        }
        Ok(Self { dir })
    }

    fn file(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Scan a file, keeping rows whose `column` is one of `ids`
    fn scan_filtered(&self, name: &str, column: &str, ids: &[SkeletonId]) -> Result<DataFrame> {
        let path = self.file(name);
        log::debug!("Reading parquet file: {}", path.display());

        let mut predicate: Option<Expr> = None;
        for &id in ids {
            let eq = col(column).cast(DataType::Int64).eq(lit(id));
            predicate = Some(match predicate {
                Some(acc) => acc.or(eq),
                None => eq,
            });
        }

        let mut frame = LazyFrame::scan_parquet(&path, Default::default())
            .with_context(|| format!("Failed to scan {}", path.display()))?;
        if let Some(predicate) = predicate {
            frame = frame.filter(predicate);
        }
        frame
            .collect()
            .with_context(|| format!("Failed to read {}", path.display()))
    }

    /// Load every skeleton in `nodes.parquet`
    pub fn all_neurons(&self) -> Result<Vec<Neuron>> {
        let df = self.scan_filtered("nodes.parquet", "skeleton_id", &[])?;
        let nodes = node_records(&df)?;
        log::info!("Loaded {} treenodes", nodes.len());

        let mut neurons = Vec::new();
        for (skeleton_id, table) in split_by_skeleton(nodes) {
            neurons.push(self.attach_metadata(Neuron::new(skeleton_id, table))?);
        }
        Ok(neurons)
    }

    fn attach_metadata(&self, neuron: Neuron) -> Result<Neuron> {
        let skeleton_id = neuron.skeleton_id;
        let connectors = if self.file("connectors.parquet").exists() {
            let df = self.scan_filtered("connectors.parquet", "skeleton_id", &[skeleton_id])?;
            filter_connectors(&neuron.nodes, connector_records(&df)?)
        } else {
            Vec::new()
        };
        let name = self.names(&[skeleton_id])?.remove(&skeleton_id);

        let mut neuron = neuron.with_connectors(connectors);
        neuron.name = name;
        Ok(neuron)
    }
}

impl SkeletonSource for ParquetSource {
    fn neuron(&self, skeleton_id: SkeletonId) -> Result<Neuron> {
        let df = self.scan_filtered("nodes.parquet", "skeleton_id", &[skeleton_id])?;
        if df.height() == 0 {
            return Err(anyhow!("Skeleton {} not found in {}", skeleton_id, self.dir.display()));
        }
        let nodes = node_records(&df)?;
        log::info!("Loaded {} treenodes for skeleton #{}", nodes.len(), skeleton_id);

        self.attach_metadata(Neuron::new(skeleton_id, nodes))
    }

    fn names(&self, skeleton_ids: &[SkeletonId]) -> Result<HashMap<SkeletonId, String>> {
        if !self.file("names.parquet").exists() {
            return Ok(HashMap::new());
        }
        let df = self.scan_filtered("names.parquet", "skeleton_id", skeleton_ids)?;
        let ids = int_column(&df, "skeleton_id")?;
        let names = df.column("neuron_name")?.str()?;

        let mut out = HashMap::with_capacity(df.height());
        for i in 0..df.height() {
            if let (Some(id), Some(name)) = (ids.get(i), names.get(i)) {
                out.insert(id, name.to_string());
            }
        }
        Ok(out)
    }

    fn edges(&self, skeleton_ids: &[SkeletonId]) -> Result<Vec<NetworkEdge>> {
        let df = self.scan_filtered("edges.parquet", "source_skid", skeleton_ids)?;
        let sources = int_column(&df, "source_skid")?;
        let targets = int_column(&df, "target_skid")?;
        let weights = int_column(&df, "weight")?;

        let mut edges = Vec::with_capacity(df.height());
        for i in 0..df.height() {
            let (Some(source), Some(target)) = (sources.get(i), targets.get(i)) else {
                continue;
            };
            if !skeleton_ids.contains(&target) {
                continue;
            }
            let weight = u32::try_from(weights.get(i).unwrap_or(0))
                .with_context(|| format!("Invalid weight on edge {} -> {}", source, target))?;
            edges.push(NetworkEdge { source, target, weight });
        }
        log::info!("Loaded {} edges among {} neurons", edges.len(), skeleton_ids.len());
        Ok(edges)
    }

    fn volume(&self, name: &str) -> Result<Volume> {
        let path = self.dir.join("volumes").join(format!("{}.json", name));
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Volume {:?} not found at {}", name, path.display()))?;
        let volume: Volume = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse volume {}", path.display()))?;
        volume.validate()?;
        log::info!(
            "Loaded volume {} ({} vertices, {} faces)",
            volume.name,
            volume.vertices.len(),
            volume.faces.len()
        );
        Ok(volume)
    }
}

/// Load a dense adjacency matrix.
///
/// Column `skeleton_id` labels the rows; every other column is named by the
/// target skeleton id.
pub fn load_adjacency_matrix(path: &Path) -> Result<AdjacencyMatrix> {
    log::info!("Reading adjacency matrix: {}", path.display());
    let df = LazyFrame::scan_parquet(path, Default::default())?
        .collect()
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let row_ids = int_column(&df, "skeleton_id")?;
    let rows: Vec<SkeletonId> = (0..df.height())
        .map(|i| row_ids.get(i).ok_or_else(|| anyhow!("Missing row label at row {}", i)))
        .collect::<Result<_>>()?;

    let target_names: Vec<String> = df
        .get_column_names()
        .into_iter()
        .filter(|name| name.as_str() != "skeleton_id")
        .map(|name| name.to_string())
        .collect();
    let cols: Vec<SkeletonId> = target_names
        .iter()
        .map(|name| {
            name.parse::<SkeletonId>()
                .with_context(|| format!("Column {:?} is not a skeleton id", name))
        })
        .collect::<Result<_>>()?;

    let mut values = Array2::<u32>::zeros((rows.len(), cols.len()));
    for (c, name) in target_names.iter().enumerate() {
        let column = int_column(&df, name)?;
        for r in 0..rows.len() {
            let value = column.get(r).unwrap_or(0);
            values[[r, c]] = u32::try_from(value)
                .with_context(|| format!("Invalid synapse count {} in column {}", value, name))?;
        }
    }

    Ok(AdjacencyMatrix::new(rows, cols, values)?)
}

fn int_column(df: &DataFrame, name: &str) -> Result<Int64Chunked> {
    let column = df
        .column(name)
        .with_context(|| format!("Missing column {:?}", name))?
        .cast(&DataType::Int64)?;
    Ok(column.i64()?.clone())
}

fn float_column(df: &DataFrame, name: &str) -> Result<Float64Chunked> {
    // Casting first keeps unsigned coordinates from wrapping on subtraction
    let column = df
        .column(name)
        .with_context(|| format!("Missing column {:?}", name))?
        .cast(&DataType::Float64)?;
    Ok(column.f64()?.clone())
}

fn node_records(df: &DataFrame) -> Result<Vec<NodeRecord>> {
    let skeleton_ids = int_column(df, "skeleton_id")?;
    let treenode_ids = int_column(df, "treenode_id")?;
    let parent_ids = int_column(df, "parent_id")?;
    let xs = float_column(df, "x")?;
    let ys = float_column(df, "y")?;
    let zs = float_column(df, "z")?;

    (0..df.height())
        .map(|i| {
            let skeleton_id = skeleton_ids
                .get(i)
                .ok_or_else(|| anyhow!("Missing skeleton_id at row {}", i))?;
            let treenode_id = treenode_ids
                .get(i)
                .ok_or_else(|| anyhow!("Missing treenode_id at row {}", i))?;
            let position = match (xs.get(i), ys.get(i), zs.get(i)) {
                (Some(x), Some(y), Some(z)) => Position::new(x, y, z),
                _ => return Err(anyhow!("Missing coordinate for treenode {}", treenode_id)),
            };
            Ok(NodeRecord {
                treenode_id,
                parent_id: parent_ids.get(i),
                position,
                skeleton_id,
            })
        })
        .collect()
}

fn connector_records(df: &DataFrame) -> Result<Vec<ConnectorRecord>> {
    let treenode_ids = int_column(df, "treenode_id")?;
    let connector_ids = int_column(df, "connector_id")?;
    let relations = int_column(df, "relation")?;

    let mut out = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        if let (Some(treenode_id), Some(connector_id)) = (treenode_ids.get(i), connector_ids.get(i)) {
            out.push(ConnectorRecord {
                treenode_id,
                connector_id,
                relation: relations.get(i).map_or(SynapseRelation::Other, SynapseRelation::from_code),
            });
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    fn write_parquet(path: &Path, df: &mut DataFrame) {
        let file = File::create(path).expect("create parquet file");
        ParquetWriter::new(file).finish(df).expect("write parquet");
    }

    fn fixture_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("tempdir");

        let mut nodes = df!(
            "skeleton_id" => &[10i64, 10, 10, 20, 20],
            "treenode_id" => &[1i64, 2, 3, 7, 8],
            "parent_id" => &[None, Some(1i64), Some(2), None, Some(7)],
            "x" => &[0u32, 0, 0, 5, 5],
            "y" => &[0u32, 0, 0, 5, 5],
            "z" => &[20u32, 10, 0, 0, 3],
        )
        .expect("nodes frame");
        write_parquet(&dir.path().join("nodes.parquet"), &mut nodes);

        let mut connectors = df!(
            "skeleton_id" => &[10i64, 10],
            "treenode_id" => &[2i64, 3],
            "connector_id" => &[500i64, 501],
            "relation" => &[0i64, 1],
        )
        .expect("connectors frame");
        write_parquet(&dir.path().join("connectors.parquet"), &mut connectors);

        let mut names = df!(
            "skeleton_id" => &[10i64, 20],
            "neuron_name" => &["PN left", "PN right"],
        )
        .expect("names frame");
        write_parquet(&dir.path().join("names.parquet"), &mut names);

        let mut edges = df!(
            "source_skid" => &[10i64, 20, 10],
            "target_skid" => &[20i64, 10, 30],
            "weight" => &[4i64, 1, 9],
        )
        .expect("edges frame");
        write_parquet(&dir.path().join("edges.parquet"), &mut edges);

        dir
    }

    #[test]
    fn loads_one_neuron_with_metadata() {
        let dir = fixture_dir();
        let source = ParquetSource::new(dir.path()).expect("source");

        let neuron = source.neuron(10).expect("neuron");
        assert_eq!(neuron.nodes.len(), 3);
        assert_eq!(neuron.name.as_deref(), Some("PN left"));
        assert_eq!(neuron.connectors.len(), 2);
        assert_eq!(neuron.nodes[0].parent_id, None);
        // Unsigned z coordinates were widened before any subtraction
        assert_eq!(neuron.nodes[1].position.distance(&neuron.nodes[0].position), 10.0);
    }

    #[test]
    fn loads_all_neurons_in_file_order() {
        let dir = fixture_dir();
        let source = ParquetSource::new(dir.path()).expect("source");

        let neurons = source.all_neurons().expect("neurons");
        let ids: Vec<SkeletonId> = neurons.iter().map(|n| n.skeleton_id).collect();
        assert_eq!(ids, vec![10, 20]);
        assert!(neurons[1].connectors.is_empty());
    }

    #[test]
    fn edges_are_restricted_to_requested_neurons() {
        let dir = fixture_dir();
        let source = ParquetSource::new(dir.path()).expect("source");

        let edges = source.edges(&[10, 20]).expect("edges");
        assert_eq!(edges.len(), 2);
        assert!(edges.iter().all(|e| e.target != 30));
    }

    #[test]
    fn missing_skeleton_is_an_error() {
        let dir = fixture_dir();
        let source = ParquetSource::new(dir.path()).expect("source");
        assert!(source.neuron(99).is_err());
    }

    #[test]
    fn reads_and_validates_volumes() {
        let dir = fixture_dir();
        let volumes = dir.path().join("volumes");
        std::fs::create_dir_all(&volumes).expect("volumes dir");
        let tetra = serde_json::json!({
            "name": "LH_R",
            "vertices": [
                {"x": 0.0, "y": 0.0, "z": 0.0},
                {"x": 4.0, "y": 0.0, "z": 0.0},
                {"x": 0.0, "y": 4.0, "z": 0.0},
                {"x": 0.0, "y": 0.0, "z": 4.0}
            ],
            "faces": [[0, 1, 2], [0, 1, 3], [0, 2, 3], [1, 2, 3]]
        });
        std::fs::write(volumes.join("LH_R.json"), tetra.to_string()).expect("write volume");
        let mut broken = tetra.clone();
        broken["faces"] = serde_json::json!([[0, 1, 7]]);
        std::fs::write(volumes.join("broken.json"), broken.to_string()).expect("write volume");

        let source = ParquetSource::new(dir.path()).expect("source");
        let volume = source.volume("LH_R").expect("volume");
        assert_eq!(volume.faces.len(), 4);

        let err = source.volume("broken").expect_err("dangling face");
        assert!(matches!(
            err.downcast_ref::<crate::error::GraphError>(),
            Some(crate::error::GraphError::InvalidVolume { .. })
        ));
        assert!(source.volume("AL_R").is_err());
    }

    #[test]
    fn reads_adjacency_matrix() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("matrix.parquet");
        let mut df = df!(
            "skeleton_id" => &[1i64, 2],
            "1" => &[0i64, 3],
            "3" => &[5i64, 0],
        )
        .expect("matrix frame");
        write_parquet(&path, &mut df);

        let matrix = load_adjacency_matrix(&path).expect("matrix");
        assert_eq!(matrix.rows, vec![1, 2]);
        assert_eq!(matrix.cols, vec![1, 3]);
        assert_eq!(matrix.values[[0, 1]], 5);
        assert_eq!(matrix.values[[1, 0]], 3);
    }
}
