//! Visualization sinks

use crate::cluster::Linkage;
use crate::data::NodeId;
use crate::graph::{NetworkGraph, SkeletonGraph};
use anyhow::{Context, Result};
use itertools::Itertools;
use ndarray::Array2;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Everything needed to draw a dendrogram-plus-heatmap figure.
///
/// `heatmap` rows are all vertices in `row_linkage` leaf order; columns are
/// synapse-bearing vertices in `column_linkage` leaf order.
#[derive(Debug, Clone)]
pub struct DendrogramHeatmap {
    pub row_linkage: Linkage,
    pub column_linkage: Linkage,
    pub row_nodes: Vec<NodeId>,
    pub column_nodes: Vec<NodeId>,
    pub heatmap: Array2<f64>,
}

impl DendrogramHeatmap {
    /// Reorder a full distance matrix by both dendrograms.
    ///
    /// `node_ids` labels the rows of `distances`; `synapse_columns` are the
    /// vertex indices kept as columns, in `column_linkage` observation order.
    pub fn new(
        distances: &Array2<f64>,
        node_ids: &[NodeId],
        synapse_columns: &[usize],
        row_linkage: Linkage,
        column_linkage: Linkage,
    ) -> Self {
        let row_order = row_linkage.leaves();
        let column_order: Vec<usize> = column_linkage
            .leaves()
            .into_iter()
            .map(|leaf| synapse_columns[leaf])
            .collect();

        let heatmap = Array2::from_shape_fn((row_order.len(), column_order.len()), |(r, c)| {
            distances[[row_order[r], column_order[c]]]
        });

        Self {
            row_nodes: row_order.iter().map(|&r| node_ids[r]).collect(),
            column_nodes: column_order.iter().map(|&c| node_ids[c]).collect(),
            row_linkage,
            column_linkage,
            heatmap,
        }
    }
}

/// Receiver for figures; rendering never feeds back into analysis results
pub trait PlotSink {
    fn dendrogram_heatmap(&mut self, plot: &DendrogramHeatmap) -> Result<()>;

    fn skeleton(&mut self, graph: &SkeletonGraph) -> Result<()>;

    fn network(&mut self, graph: &NetworkGraph) -> Result<()>;
}

/// Writes plot data as CSV and graphs as GraphML into a directory
pub struct FilePlotSink {
    dir: PathBuf,
}

impl FilePlotSink {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn create(&self, name: &str) -> Result<BufWriter<File>> {
        let path = self.dir.join(name);
        let file = File::create(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        Ok(BufWriter::new(file))
    }
}

fn write_linkage(out: &mut impl Write, linkage: &Linkage) -> Result<()> {
    writeln!(out, "left,right,distance,size")?;
    for step in &linkage.steps {
        writeln!(out, "{},{},{},{}", step.left, step.right, step.distance, step.size)?;
    }
    Ok(())
}

impl PlotSink for FilePlotSink {
    fn dendrogram_heatmap(&mut self, plot: &DendrogramHeatmap) -> Result<()> {
        log::info!("Writing dendrogram heatmap to {}", self.dir.display());

        let mut heatmap = self.create("heatmap.csv")?;
        writeln!(heatmap, "node_id,{}", plot.column_nodes.iter().join(","))?;
        for (node_id, row) in plot.row_nodes.iter().zip(plot.heatmap.rows()) {
            writeln!(heatmap, "{},{}", node_id, row.iter().join(","))?;
        }
        heatmap.flush()?;

        let mut rows = self.create("row_linkage.csv")?;
        write_linkage(&mut rows, &plot.row_linkage)?;
        rows.flush()?;

        let mut cols = self.create("column_linkage.csv")?;
        write_linkage(&mut cols, &plot.column_linkage)?;
        cols.flush()?;

        Ok(())
    }

    fn skeleton(&mut self, graph: &SkeletonGraph) -> Result<()> {
        let mut file = self.create(&format!("skeleton_{}.graphml", graph.skeleton_id()))?;

        writeln!(file, "<?xml version=\"1.0\" encoding=\"UTF-8\"?>")?;
        writeln!(file, "<graphml xmlns=\"http://graphml.graphdrawing.org/xmlns\">")?;
        writeln!(file, "  <key id=\"weight\" for=\"edge\" attr.name=\"weight\" attr.type=\"double\"/>")?;
        writeln!(file, "  <key id=\"synapse\" for=\"node\" attr.name=\"has_synapse\" attr.type=\"boolean\"/>")?;
        writeln!(file, "  <graph id=\"G\" edgedefault=\"directed\">")?;

        for vertex in graph.vertices() {
            match vertex.has_synapse {
                Some(flag) => writeln!(
                    file,
                    "    <node id=\"n{}\">\n      <data key=\"synapse\">{}</data>\n    </node>",
                    vertex.node_id, flag
                )?,
                None => writeln!(file, "    <node id=\"n{}\"/>", vertex.node_id)?,
            }
        }
        for (edge_id, (child, parent, weight)) in graph.edges().enumerate() {
            writeln!(
                file,
                "    <edge id=\"e{}\" source=\"n{}\" target=\"n{}\">\n      <data key=\"weight\">{}</data>\n    </edge>",
                edge_id, child, parent, weight
            )?;
        }

        writeln!(file, "  </graph>")?;
        writeln!(file, "</graphml>")?;
        file.flush()?;
        Ok(())
    }

    fn network(&mut self, graph: &NetworkGraph) -> Result<()> {
        let mut file = self.create("network.graphml")?;

        writeln!(file, "<?xml version=\"1.0\" encoding=\"UTF-8\"?>")?;
        writeln!(file, "<graphml xmlns=\"http://graphml.graphdrawing.org/xmlns\">")?;
        writeln!(file, "  <key id=\"label\" for=\"node\" attr.name=\"label\" attr.type=\"string\"/>")?;
        writeln!(file, "  <key id=\"weight\" for=\"edge\" attr.name=\"weight\" attr.type=\"int\"/>")?;
        writeln!(file, "  <graph id=\"G\" edgedefault=\"directed\">")?;

        for vertex in graph.vertices() {
            let label = vertex
                .label
                .clone()
                .unwrap_or_else(|| vertex.skeleton_id.to_string());
            writeln!(
                file,
                "    <node id=\"n{}\">\n      <data key=\"label\">{}</data>\n    </node>",
                vertex.skeleton_id,
                escape_xml(&label)
            )?;
        }
        for (edge_id, (src, dst, weight)) in graph.edges().enumerate() {
            writeln!(
                file,
                "    <edge id=\"e{}\" source=\"n{}\" target=\"n{}\">\n      <data key=\"weight\">{}</data>\n    </edge>",
                edge_id, src, dst, weight
            )?;
        }

        writeln!(file, "  </graph>")?;
        writeln!(file, "</graphml>")?;
        file.flush()?;
        Ok(())
    }
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
